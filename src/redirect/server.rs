use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::RowError;
use crate::report::{RowStatus, StageOutput, StageReport};
use crate::pipeline::Stage;
use crate::retry::{classify_http_status, ErrorKind, RetryDecision, RetryPolicy};
use crate::rows::Row;

/// What a GET with redirect following came back with. The body is not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub status: u16,
    pub final_url: String,
    /// At least one redirect was followed.
    pub redirected: bool,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> anyhow::Result<Fetched>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(ua_generator::ua::spoof_ua())
            .redirect(reqwest::redirect::Policy::limited(10))
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> anyhow::Result<Fetched> {
        let resp = self.client.get(url).send().await?;
        let final_url = resp.url().clone();
        // reqwest normalizes the request URL, so compare parsed forms.
        let redirected = url::Url::parse(url)
            .map(|u| u != final_url)
            .unwrap_or(true);
        Ok(Fetched {
            status: resp.status().as_u16(),
            final_url: final_url.to_string(),
            redirected,
        })
    }
}

/// Stage 1: follow HTTP redirects for each row, backing off on 429.
pub struct ServerRedirectResolver<'a, T: ?Sized> {
    transport: &'a T,
    policy: RetryPolicy,
}

impl<'a, T: Transport + ?Sized> ServerRedirectResolver<'a, T> {
    pub fn new(transport: &'a T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// The URL `url` redirects to, or `None` when the server answered
    /// without redirecting.
    pub async fn resolve(&self, url: &str) -> Result<Option<String>, RowError> {
        let fetched = self.fetch_with_retry(url).await?;
        Ok(fetched.redirected.then_some(fetched.final_url))
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<Fetched, RowError> {
        let mut attempt = 1u32;
        loop {
            let fetched = self
                .transport
                .get(url)
                .await
                .map_err(|e| RowError::Transport(format!("{e:#}")))?;
            if fetched.status == 200 {
                return Ok(fetched);
            }

            let kind = classify_http_status(fetched.status);
            match self.policy.decide(attempt, kind) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        status = fetched.status,
                        attempt,
                        "throttled, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::NoRetry if kind == ErrorKind::Throttled => {
                    return Err(RowError::RetriesExhausted { attempts: attempt });
                }
                RetryDecision::NoRetry => return Err(RowError::Status(fetched.status)),
            }
        }
    }

    /// Every row comes back, in order; failed rows keep their original URL.
    pub async fn run(&self, rows: &[Row]) -> StageOutput {
        let mut report = StageReport::new(Stage::Server);
        let mut out = Vec::with_capacity(rows.len());

        for row in rows {
            match self.resolve(&row.url).await {
                Ok(Some(url)) => {
                    info!(id = %row.id, %url, "redirected");
                    out.push(row.with_url(url));
                    report.record(&row.id, RowStatus::Changed);
                }
                Ok(None) => {
                    debug!(id = %row.id, "no redirect");
                    out.push(row.clone());
                    report.record(&row.id, RowStatus::Unchanged);
                }
                Err(e) => {
                    warn!(id = %row.id, url = %row.url, "keeping original url: {e}");
                    out.push(row.clone());
                    report.record(&row.id, RowStatus::failed(&e));
                }
            }
        }

        StageOutput { rows: out, report }
    }
}

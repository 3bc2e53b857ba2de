use std::time::Duration;
use tracing::{info, warn};

use crate::browser::BrowserSession;
use crate::error::RowError;
use crate::pipeline::Stage;
use crate::report::{RowStatus, StageOutput, StageReport};
use crate::rows::Row;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Substring that marks a fully resolved directions URL.
    pub url_pattern: String,
    pub wait: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            url_pattern: "/dir/".to_string(),
            wait: Duration::from_secs(10),
        }
    }
}

/// Stage 2: let the page scripts run until the location shows the
/// directions form, then keep that location.
pub struct ClientRedirectResolver<'a> {
    session: &'a dyn BrowserSession,
    options: &'a ClientOptions,
}

impl<'a> ClientRedirectResolver<'a> {
    pub fn new(session: &'a dyn BrowserSession, options: &'a ClientOptions) -> Self {
        Self { session, options }
    }

    pub fn resolve(&self, url: &str) -> Result<String, RowError> {
        self.session.navigate(url)?;
        self.session
            .wait_for_url_containing(&self.options.url_pattern, self.options.wait)?;
        Ok(self.session.current_url()?)
    }

    pub fn run(&self, rows: &[Row]) -> StageOutput {
        let mut report = StageReport::new(Stage::Client);
        let mut out = Vec::with_capacity(rows.len());

        for row in rows {
            match self.resolve(&row.url) {
                Ok(url) => {
                    info!(id = %row.id, %url, "resolved in browser");
                    let status = if url == row.url {
                        RowStatus::Unchanged
                    } else {
                        RowStatus::Changed
                    };
                    out.push(row.with_url(url));
                    report.record(&row.id, status);
                }
                Err(e) => {
                    warn!(id = %row.id, url = %row.url, "passing through unresolved: {e}");
                    out.push(row.clone());
                    report.record(&row.id, RowStatus::failed(&e));
                }
            }
        }

        StageOutput { rows: out, report }
    }
}

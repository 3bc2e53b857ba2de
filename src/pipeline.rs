//! Runs the stages in order, threading the rows and the browser session
//! through them and writing each stage-boundary file.

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::fmt;
use tracing::info;

use crate::browser::BrowserSession;
use crate::config::{Config, Paths};
use crate::download::DownloadDriver;
use crate::redirect::{ClientRedirectResolver, ServerRedirectResolver, Transport};
use crate::report::{RunReport, StageOutput, StageReport};
use crate::rows::{self, PipelineFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Follow HTTP redirects.
    Server,
    /// Follow script-driven redirects in Chrome.
    Client,
    /// Build conversion-service URLs.
    Convert,
    /// Submit the conversion form and collect the GPX files.
    Download,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Server, Stage::Client, Stage::Convert, Stage::Download];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Server => "server",
            Stage::Client => "client",
            Stage::Convert => "convert",
            Stage::Download => "download",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type Session = Box<dyn BrowserSession>;

pub struct Pipeline<T, L> {
    config: Config,
    transport: T,
    launch: L,
    session: Option<Session>,
}

impl<T, L> Pipeline<T, L>
where
    T: Transport,
    L: FnMut() -> Result<Session>,
{
    /// `launch` is only called once a browser stage is reached.
    pub fn new(config: Config, transport: T, launch: L) -> Self {
        Self {
            config,
            transport,
            launch,
            session: None,
        }
    }

    pub async fn run(&mut self) -> Result<RunReport> {
        let (from, to) = (self.config.from, self.config.to);
        let input = self.config.paths.stage_input(from);
        let mut file = rows::read_rows(&input)?;
        info!(path = %input.display(), rows = file.rows.len(), "loaded rows");

        let mut report = RunReport::start();
        for stage in Stage::ALL.into_iter().filter(|s| (from..=to).contains(s)) {
            info!(%stage, "stage starting");
            let stage_report = match stage {
                Stage::Server => {
                    let out = ServerRedirectResolver::new(&self.transport, self.config.retry)
                        .run(&file.rows)
                        .await;
                    advance(&self.config.paths, stage, &mut file, out)?
                }
                Stage::Client => {
                    let session = ensure_session(&mut self.session, &mut self.launch)?;
                    let out = ClientRedirectResolver::new(session, &self.config.client)
                        .run(&file.rows);
                    advance(&self.config.paths, stage, &mut file, out)?
                }
                Stage::Convert => {
                    let template = self
                        .config
                        .convert_template
                        .as_ref()
                        .ok_or_else(|| anyhow!("no conversion URL template configured"))?;
                    let out = template.run(&file.rows);
                    advance(&self.config.paths, stage, &mut file, out)?
                }
                Stage::Download => {
                    let api_key = self
                        .config
                        .api_key
                        .as_ref()
                        .ok_or_else(|| anyhow!("no API key configured"))?;
                    let session = ensure_session(&mut self.session, &mut self.launch)?;
                    DownloadDriver::new(session, &self.config.download, api_key).run(&file.rows)
                }
            };
            info!(
                %stage,
                rows = stage_report.total(),
                changed = stage_report.changed,
                unchanged = stage_report.unchanged,
                failed = stage_report.failed,
                "stage finished"
            );
            report.push(stage_report);
        }

        Ok(report.finish())
    }
}

fn ensure_session<'s, L>(
    slot: &'s mut Option<Session>,
    launch: &mut L,
) -> Result<&'s dyn BrowserSession>
where
    L: FnMut() -> Result<Session>,
{
    if slot.is_none() {
        *slot = Some(launch().context("starting browser session")?);
    }
    slot.as_deref()
        .ok_or_else(|| anyhow!("browser session unavailable"))
}

/// Replaces the rows with the stage's output and writes its boundary file.
fn advance(
    paths: &Paths,
    stage: Stage,
    file: &mut PipelineFile,
    out: StageOutput,
) -> Result<StageReport> {
    debug_assert_eq!(file.rows.len(), out.rows.len());
    file.rows = out.rows;
    if let Some(path) = paths.stage_output(stage) {
        rows::write_rows(&path, file)?;
        info!(%stage, path = %path.display(), "wrote rows");
    }
    Ok(out.report)
}

//! Stage 4: drive the conversion form and collect each row's GPX file.

mod pick;

pub use pick::{relocate, wait_for_download, DirSnapshot};

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::browser::BrowserSession;
use crate::error::RowError;
use crate::pipeline::Stage;
use crate::report::{RowStatus, StageReport};
use crate::rows::Row;

/// Page elements of the conversion form.
pub mod selectors {
    /// Tabbing out of this field reveals the API key input.
    pub const REMOTE_DATA_INPUT: &str = "#remote_data_input";
    pub const API_KEY_INPUT: &str = r#"[id="input:google_api_key"]"#;
    pub const SUBMIT: &str = ".gpsv_submit";
    /// The results page embeds the rendered map in a frame.
    pub const RESULT_FRAME: &str = "iframe";
    pub const DOWNLOAD_LINK_TEXT: &str = "data.gpx";
}

/// The credential typed into the conversion form. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub download_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Bound on waiting for the result frame.
    pub element_wait: Duration,
    /// Pause after tabbing out of the remote data field.
    pub reveal_delay: Duration,
    /// Pause after clicking the download link.
    pub settle_delay: Duration,
    /// How long to keep looking for the downloaded file after the pause.
    pub download_timeout: Duration,
}

pub struct DownloadDriver<'a> {
    session: &'a dyn BrowserSession,
    options: &'a DownloadOptions,
    api_key: &'a ApiKey,
}

impl<'a> DownloadDriver<'a> {
    pub fn new(
        session: &'a dyn BrowserSession,
        options: &'a DownloadOptions,
        api_key: &'a ApiKey,
    ) -> Self {
        Self {
            session,
            options,
            api_key,
        }
    }

    /// Runs the form for one row and returns where its track was saved.
    pub fn fetch(&self, row: &Row) -> Result<PathBuf, RowError> {
        if !pick::is_safe_file_stem(&row.id) {
            return Err(RowError::InvalidIdentifier(row.id.clone()));
        }
        let s = self.session;

        s.navigate(&row.url)?;
        s.focus_and_press(selectors::REMOTE_DATA_INPUT, "Tab")?;
        std::thread::sleep(self.options.reveal_delay);

        s.fill(selectors::API_KEY_INPUT, self.api_key.expose())?;
        s.click(selectors::SUBMIT)?;
        s.wait_for_element(selectors::RESULT_FRAME, self.options.element_wait)?;

        let before = DirSnapshot::take(&self.options.download_dir)?;
        s.click_link_containing(selectors::DOWNLOAD_LINK_TEXT)?;
        std::thread::sleep(self.options.settle_delay);

        let downloaded = wait_for_download(
            &self.options.download_dir,
            &before,
            self.options.download_timeout,
        )?
        .ok_or_else(|| RowError::NoDownload(self.options.download_dir.clone()))?;

        Ok(relocate(&downloaded, &self.options.output_dir, &row.id)?)
    }

    /// A failing row is logged and skipped; the rest still run.
    pub fn run(&self, rows: &[Row]) -> StageReport {
        let mut report = StageReport::new(Stage::Download);
        for row in rows {
            match self.fetch(row) {
                Ok(path) => {
                    info!(id = %row.id, path = %path.display(), "saved track");
                    report.record(&row.id, RowStatus::Changed);
                    report.saved.push(path);
                }
                Err(e) => {
                    warn!(id = %row.id, "skipping: {e}");
                    report.record(&row.id, RowStatus::failed(&e));
                }
            }
        }
        report
    }
}

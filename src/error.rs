use std::path::PathBuf;
use thiserror::Error;

use crate::browser::BrowserError;

/// Why a single row could not be advanced by a stage. These never abort a
/// run; the row is passed through (or skipped) and the reason lands in the
/// stage report.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("exceeded maximum number of retries ({attempts} requests)")]
    RetriesExhausted { attempts: u32 },
    #[error("transport: {0}")]
    Transport(String),
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("no new download appeared in {}", .0.display())]
    NoDownload(PathBuf),
    #[error("identifier {0:?} cannot be used as a file name")]
    InvalidIdentifier(String),
    #[error("moving download: {0}")]
    Io(#[from] std::io::Error),
}

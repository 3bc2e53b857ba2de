//! Stage 3: map URL to conversion-service URL.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;
use tracing::debug;

use crate::pipeline::Stage;
use crate::report::{RowStatus, StageOutput, StageReport};
use crate::rows::Row;

const SLOT: &str = "{}";

/// Everything but `[A-Za-z0-9_.~-]`, the set Python's `quote_plus` escapes.
const QUOTE_PLUS: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~');

#[derive(Debug, Error, PartialEq, Eq)]
#[error("conversion URL template {0:?} has no {{}} slot for the map URL")]
pub struct MissingSlot(pub String);

/// A URL with one `{}` slot that receives the form-encoded map URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertTemplate(String);

impl ConvertTemplate {
    pub fn parse(template: &str) -> Result<Self, MissingSlot> {
        if template.contains(SLOT) {
            Ok(Self(template.to_string()))
        } else {
            Err(MissingSlot(template.to_string()))
        }
    }

    /// Only the first slot is filled.
    pub fn build(&self, map_url: &str) -> String {
        self.0.replacen(SLOT, &encode(map_url), 1)
    }

    pub fn run(&self, rows: &[Row]) -> StageOutput {
        let mut report = StageReport::new(Stage::Convert);
        let out = rows
            .iter()
            .map(|row| {
                let url = self.build(&row.url);
                debug!(id = %row.id, %url, "conversion url");
                report.record(&row.id, RowStatus::Changed);
                row.with_url(url)
            })
            .collect();
        StageOutput { rows: out, report }
    }
}

/// Query-value encoding: spaces become `+`, every UTF-8 byte outside
/// `[A-Za-z0-9_.~-]` becomes `%XX`.
pub fn encode(s: &str) -> String {
    utf8_percent_encode(s, QUOTE_PLUS)
        .to_string()
        .replace("%20", "+")
}

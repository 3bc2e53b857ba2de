//! Pipeline files: a header record followed by `(id, url)` rows.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::Path;

/// One map link tracked through the pipeline. `id` never changes between
/// stages; `url` is rewritten by each of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub id: String,
    pub url: String,
}

impl Row {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }

    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self {
            id: self.id.clone(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineFile {
    /// Header record as found in the seed file, copied verbatim downstream.
    pub header: Vec<String>,
    pub rows: Vec<Row>,
}

pub fn read_rows(path: &Path) -> Result<PipelineFile> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let header = rdr
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("reading {}", path.display()))?;
        // Line 1 is the header.
        let line = i + 2;
        match (record.get(0), record.get(1)) {
            (Some(id), Some(url)) => rows.push(Row::new(id, url)),
            _ => bail!(
                "{}:{}: expected an id and a url, got {} field(s)",
                path.display(),
                line,
                record.len()
            ),
        }
    }

    Ok(PipelineFile { header, rows })
}

/// Overwrites `path` with `file`.
pub fn write_rows(path: &Path, file: &PipelineFile) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    if !file.header.is_empty() {
        w.write_record(&file.header)?;
    }
    for row in &file.rows {
        w.write_record([row.id.as_str(), row.url.as_str()])?;
    }
    w.flush()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

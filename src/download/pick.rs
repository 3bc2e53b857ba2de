//! Finding the file a click just downloaded and filing it under its row id.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Browsers write to these while a download is still in flight.
const PARTIAL_EXTENSIONS: &[&str] = &["crdownload", "part", "tmp"];

/// Names present in the download directory before the click.
#[derive(Debug, Default)]
pub struct DirSnapshot {
    seen: HashSet<OsString>,
}

impl DirSnapshot {
    /// A missing directory snapshots as empty.
    pub fn take(dir: &Path) -> io::Result<Self> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e),
        };
        let mut seen = HashSet::new();
        for entry in entries {
            seen.insert(entry?.file_name());
        }
        Ok(Self { seen })
    }

    pub fn contains(&self, name: &std::ffi::OsStr) -> bool {
        self.seen.contains(name)
    }
}

pub fn is_partial(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| PARTIAL_EXTENSIONS.iter().any(|p| e.eq_ignore_ascii_case(p)))
        .unwrap_or(false)
}

/// The most recently modified completed file in `dir` that is not in
/// `before`.
pub fn newest_new_file(dir: &Path, before: &DirSnapshot) -> io::Result<Option<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut best: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry?;
        if before.contains(&entry.file_name()) {
            continue;
        }
        let path = entry.path();
        let meta = entry.metadata()?;
        if !meta.is_file() || is_partial(&path) {
            continue;
        }
        let mtime = meta.modified()?;
        if best.as_ref().map_or(true, |(t, _)| mtime > *t) {
            best = Some((mtime, path));
        }
    }
    Ok(best.map(|(_, p)| p))
}

/// Polls until a new completed file shows up or `timeout` elapses.
pub fn wait_for_download(
    dir: &Path,
    before: &DirSnapshot,
    timeout: Duration,
) -> io::Result<Option<PathBuf>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(p) = newest_new_file(dir, before)? {
            return Ok(Some(p));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Moves `src` to `{output_dir}/{id}.gpx`, replacing any earlier file.
pub fn relocate(src: &Path, output_dir: &Path, id: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let dest = output_dir.join(format!("{id}.gpx"));
    if let Err(e) = fs::rename(src, &dest) {
        // Cross-device moves cannot be renamed.
        tracing::debug!("rename failed ({e}), copying instead");
        copy_then_remove(src, &dest, |p| fs::remove_file(p))?;
    }
    Ok(dest)
}

/// Once `dest` is written the move counts as done; a source that cannot be
/// removed is only logged.
fn copy_then_remove(
    src: &Path,
    dest: &Path,
    remove: impl FnOnce(&Path) -> io::Result<()>,
) -> io::Result<()> {
    fs::copy(src, dest)?;
    if let Err(e) = remove(src) {
        tracing::warn!(
            src = %src.display(),
            dest = %dest.display(),
            "left download behind: {e}"
        );
    }
    Ok(())
}

/// Row ids become file names, so they must be a single plain path component.
pub fn is_safe_file_stem(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\', '\0'])
}

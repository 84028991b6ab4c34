//! Filesystem artifacts: dataset JSON files, logo images, and the issue
//! job's digest file.
//!
//! Dataset files are removed and rewritten in place, mirroring how the
//! static site has always been updated; the git layer downstream is what
//! makes a torn write visible rather than permanent.

use crate::models::IssueDigestEntry;
use serde_json::Value;
use std::error::Error;
use std::fs as stdfs;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// Ensure a directory exists and is writable, probing with a throwaway
/// file so permission problems surface before any scraping starts.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Overwrite one dataset file with pretty-printed rows.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), filename))]
pub async fn write_dataset_json(
    dir: &Path,
    filename: &str,
    rows: &[Value],
) -> Result<PathBuf, Box<dyn Error>> {
    let path = dir.join(filename);
    if path.exists() {
        fs::remove_file(&path).await?;
    }
    let json = serde_json::to_string_pretty(rows)?;
    fs::write(&path, json).await?;
    info!(path = %path.display(), rows = rows.len(), "Wrote dataset JSON");
    Ok(path)
}

/// Resolve an artifact directory, nesting it inside the publish working
/// tree when one is configured.
pub fn resolve_artifact_dir(repo: Option<&Path>, dir: &Path) -> PathBuf {
    match repo {
        Some(repo) => repo.join(dir),
        None => dir.to_path_buf(),
    }
}

/// Write the issue job's digest artifact, `{start}.json`, listing the
/// code/content pairs that were persisted this run.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), %start))]
pub async fn write_issue_digest(
    dir: &Path,
    start: &str,
    entries: &[IssueDigestEntry],
) -> Result<PathBuf, Box<dyn Error>> {
    fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{start}.json"));
    let json = serde_json::to_string_pretty(entries)?;
    fs::write(&path, json).await?;
    info!(path = %path.display(), count = entries.len(), "Wrote issue digest");
    Ok(path)
}

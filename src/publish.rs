//! Artifact publication: mirror KRX datasets into the working tree of a
//! git-hosted static site, then commit and push.
//!
//! The working tree is a shared mutable resource with no locking, so the
//! job pulls (rebase) before writing anything. Unlike the shell scripts
//! this replaces, the push is a plain fast-forward push: if the remote has
//! diverged the push fails loudly instead of silently overwriting remote
//! history.

use crate::outputs::{ensure_writable_dir, write_dataset_json};
use crate::scrapers::krx::{self, Dataset, DATASETS};
use futures::stream::{self, StreamExt};
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{error, info, instrument, warn};

/// How many logo downloads are in flight at once. The logo CDN is static
/// hosting; a small fan-out keeps a multi-thousand-item run tolerable
/// without hammering it.
const LOGO_DOWNLOAD_CONCURRENCY: usize = 4;

/// Git-side settings of the publish job.
#[derive(Debug, Clone)]
pub struct Publisher {
    pub repo: PathBuf,
    /// SSH identity file; becomes `GIT_SSH_COMMAND='ssh -i <path>'`.
    pub ssh_identity: Option<PathBuf>,
    pub remote: String,
    pub branch: String,
}

/// Per-run outcome counts for the dataset mirror phase.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub datasets_written: usize,
    pub datasets_failed: usize,
    pub logos_downloaded: usize,
    pub logos_failed: usize,
}

pub fn commit_message(trade_date: &str) -> String {
    format!("{trade_date} updated.")
}

/// True when `git status --porcelain` reports anything at all.
pub fn needs_commit(porcelain: &str) -> bool {
    !porcelain.trim().is_empty()
}

impl Publisher {
    async fn git(&self, args: &[&str]) -> Result<String, Box<dyn Error>> {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.repo).args(args);
        if let Some(identity) = &self.ssh_identity {
            cmd.env("GIT_SSH_COMMAND", format!("ssh -i {}", identity.display()));
        }

        let output = cmd.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "git {} failed ({}): {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Bring the working tree up to date before writing into it.
    #[instrument(level = "info", skip_all, fields(repo = %self.repo.display()))]
    pub async fn pull_rebase(&self) -> Result<(), Box<dyn Error>> {
        self.git(&["pull", "--rebase", &self.remote, &self.branch])
            .await?;
        info!("Working tree rebased onto remote");
        Ok(())
    }

    /// Stage, commit, and push if the tree changed. Returns whether a
    /// commit was made. A diverged remote fails the push here; that is
    /// the intended failure mode, not something to paper over.
    #[instrument(level = "info", skip_all, fields(repo = %self.repo.display(), trade_date))]
    pub async fn commit_and_push(&self, trade_date: &str) -> Result<bool, Box<dyn Error>> {
        let status = self.git(&["status", "--porcelain"]).await?;
        if !needs_commit(&status) {
            info!("No changes; skipping commit and push");
            return Ok(false);
        }

        self.git(&["add", "-A"]).await?;
        self.git(&["commit", "-m", &commit_message(trade_date)])
            .await?;
        self.git(&["push", &self.remote, &self.branch]).await?;
        info!("Pushed artifact update");
        Ok(true)
    }
}

/// Fetch every dataset, write its JSON file, and download its logos.
///
/// A dataset that fails validation writes nothing and triggers no image
/// downloads; the remaining datasets still run. Individual logo failures
/// are logged and skipped.
#[instrument(level = "info", skip_all, fields(trade_date))]
pub async fn mirror_datasets(
    client: &crate::fetch::Client,
    json_dir: &Path,
    logo_dir: &Path,
    trade_date: &str,
) -> Result<MirrorStats, Box<dyn Error>> {
    ensure_writable_dir(json_dir).await?;
    ensure_writable_dir(logo_dir).await?;

    let mut stats = MirrorStats::default();
    for dataset in &DATASETS {
        match mirror_one(client, dataset, json_dir, logo_dir, trade_date, &mut stats).await {
            Ok(()) => stats.datasets_written += 1,
            Err(e) => {
                error!(dataset = dataset.name, error = %e, "Dataset failed; continuing with the next one");
                stats.datasets_failed += 1;
            }
        }
    }

    info!(?stats, "Dataset mirror pass complete");
    Ok(stats)
}

async fn mirror_one(
    client: &crate::fetch::Client,
    dataset: &Dataset,
    json_dir: &Path,
    logo_dir: &Path,
    trade_date: &str,
    stats: &mut MirrorStats,
) -> Result<(), Box<dyn Error>> {
    let rows = krx::fetch_dataset(client, dataset, trade_date).await?;
    write_dataset_json(json_dir, dataset.filename, &rows).await?;

    let targets: Vec<(String, String)> = rows
        .iter()
        .filter_map(|row| krx::logo_target(dataset.kind, row))
        .collect();

    let results: Vec<bool> = stream::iter(targets)
        .map(|(url, filename)| async move {
            match download_logo(client, &url, &logo_dir.join(&filename)).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(%url, error = %e, "Logo download failed; skipping");
                    false
                }
            }
        })
        .buffer_unordered(LOGO_DOWNLOAD_CONCURRENCY)
        .collect()
        .await;

    stats.logos_downloaded += results.iter().filter(|ok| **ok).count();
    stats.logos_failed += results.iter().filter(|ok| !**ok).count();
    Ok(())
}

async fn download_logo(
    client: &crate::fetch::Client,
    url: &str,
    path: &Path,
) -> Result<(), Box<dyn Error>> {
    let bytes = client.get_bytes(url).await?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_commit_on_porcelain_output() {
        assert!(needs_commit(" M json/etf.json\n?? logo/069500.svg\n"));
        assert!(!needs_commit(""));
        assert!(!needs_commit("  \n"));
    }

    #[test]
    fn test_commit_message_is_date_stamped() {
        assert_eq!(commit_message("20250321"), "20250321 updated.");
    }
}

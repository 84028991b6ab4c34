//! # Stock Collector
//!
//! Batch collectors for Korean stock-market data. Each subcommand is one
//! independent job, run from cron with no shared state between runs:
//!
//! - **issue**: walks the mk.co.kr infostock listing, extracts
//!   market-summary bulletin records, filters them by date range, and
//!   persists them as `stock_history` rows (plus a JSON digest artifact)
//! - **report**: walks a date range over the FnGuide report-summary
//!   endpoint and persists analyst report rows
//! - **calendar**: collects one month of economic-calendar events into
//!   `stock_calendar`
//! - **publish**: mirrors three KRX datasets and their logo images into a
//!   static-site working tree and pushes the result
//!
//! ## Usage
//!
//! ```sh
//! stock_collector issue 20250321 20250321
//! stock_collector publish --repo ~/jubjub-static
//! ```
//!
//! ## Architecture
//!
//! Every job is the same linear pipeline: fetch → extract → filter →
//! persist (→ publish). Network I/O goes through one retrying HTTP
//! client; database writes go through one run-scoped connection with
//! per-row error isolation.

use clap::Parser;
use regex::Regex;
use std::error::Error;
use std::path::Path;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod dates;
mod db;
mod extract;
mod fetch;
mod models;
mod outputs;
mod publish;
mod scrapers;

use cli::{Cli, Command};
use config::DbConfig;
use dates::{DateRange, DateStamp};
use models::{HistoryKind, IssueDigestEntry, StockHistoryRecord};
use publish::Publisher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("stock_collector starting up");

    let args = Cli::parse();
    let client = fetch::Client::new()?;

    match args.command {
        Command::Issue {
            start,
            end,
            max_pages,
            pattern,
            include_falling,
            digest_dir,
            repo,
            ssh_identity,
            remote,
            branch,
        } => {
            let range = DateRange::from_args(start, end);
            let pattern = Regex::new(&pattern)?;
            let publisher = repo.map(|repo| Publisher {
                repo,
                ssh_identity,
                remote,
                branch,
            });
            run_issue(
                &client,
                range,
                max_pages,
                &pattern,
                include_falling,
                &digest_dir,
                publisher.as_ref(),
            )
            .await?;
        }
        Command::Report { start, end } => {
            let range = DateRange::from_args(start, end);
            run_report(&client, range).await?;
        }
        Command::Calendar { year, month, dry_run } => {
            run_calendar(&client, year, month, dry_run).await?;
        }
        Command::Publish {
            repo,
            ssh_identity,
            json_dir,
            logo_dir,
            remote,
            branch,
            trade_date,
        } => {
            let publisher = Publisher {
                repo,
                ssh_identity,
                remote,
                branch,
            };
            let trade_date = trade_date.unwrap_or_else(DateStamp::today_kst);
            run_publish(&client, &publisher, &json_dir, &logo_dir, &trade_date).await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Walk the bulletin listing, persist in-range records, write the digest
/// and, when a publish repo is configured, commit and push it.
#[instrument(level = "info", skip_all, fields(start = %range.start, end = %range.end, max_pages))]
async fn run_issue(
    client: &fetch::Client,
    range: DateRange,
    max_pages: u32,
    pattern: &Regex,
    include_falling: bool,
    digest_dir: &Path,
    publisher: Option<&Publisher>,
) -> Result<(), Box<dyn Error>> {
    let db_cfg = DbConfig::from_env()?;
    let pool = db::connect(&db_cfg).await?;

    if let Some(publisher) = publisher {
        // Same pull policy as the dataset mirror: a stale tree is
        // tolerable, a diverged one fails at push time.
        if let Err(e) = publisher.pull_rebase().await {
            warn!(error = %e, "Pull --rebase failed; continuing with a possibly stale tree");
        }
    }

    let mut digest: Vec<IssueDigestEntry> = Vec::new();
    let mut stored = 0usize;

    for page in 1..=max_pages {
        let links = match scrapers::infostock::index_summary_links(client, page, pattern).await {
            Ok(links) => links,
            Err(e) => {
                error!(page, error = %e, "Listing page fetch failed; skipping page");
                continue;
            }
        };
        if links.is_empty() {
            info!(page, "No summary bulletins on this page");
            continue;
        }

        for link in links {
            let bulletin = match scrapers::infostock::fetch_bulletin(
                client,
                &link.url,
                !include_falling,
            )
            .await
            {
                Ok(bulletin) => bulletin,
                Err(e) => {
                    error!(url = %link.url, error = %e, "Bulletin fetch failed; skipping");
                    continue;
                }
            };

            let Some(date) = bulletin.date else {
                warn!(url = %link.url, "Bulletin without a publication date; skipping");
                continue;
            };
            if !range.contains(&date) {
                info!(%date, start = %range.start, end = %range.end, "Bulletin outside range; skipping");
                continue;
            }

            let records: Vec<StockHistoryRecord> = bulletin
                .items
                .iter()
                .map(|item| StockHistoryRecord {
                    kind: HistoryKind::Issue,
                    title: item.title.clone(),
                    content: item.content.clone(),
                    date: date.clone(),
                    code: item.code.clone(),
                })
                .collect();

            stored += db::insert_history(&pool, &records).await;
            digest.extend(bulletin.items.into_iter().map(|item| IssueDigestEntry {
                code: item.code,
                content: item.content,
            }));
        }
    }

    let digest_dir =
        outputs::resolve_artifact_dir(publisher.map(|p| p.repo.as_path()), digest_dir);
    outputs::write_issue_digest(&digest_dir, range.start.as_str(), &digest).await?;

    pool.close().await;

    if let Some(publisher) = publisher {
        let committed = publisher.commit_and_push(range.start.as_str()).await?;
        info!(committed, "Digest published");
    }

    info!(stored, digest = digest.len(), "Issue run finished");
    Ok(())
}

/// Walk the date range newest-first and persist each day's reports.
#[instrument(level = "info", skip_all, fields(start = %range.start, end = %range.end))]
async fn run_report(client: &fetch::Client, range: DateRange) -> Result<(), Box<dyn Error>> {
    let db_cfg = DbConfig::from_env()?;
    let pool = db::connect(&db_cfg).await?;

    let mut stored = 0usize;
    for day in range.days_desc() {
        info!(%day, "Processing report day");
        let records = match scrapers::fnguide::fetch_reports(client, &day).await {
            Ok(records) => records,
            Err(e) => {
                error!(%day, error = %e, "Report day failed; continuing with the next day");
                continue;
            }
        };
        if records.is_empty() {
            info!(%day, "No reports for this day");
            continue;
        }
        stored += db::insert_history(&pool, &records).await;
    }

    pool.close().await;
    info!(stored, "Report run finished");
    Ok(())
}

/// Collect one month of calendar events; `--dry-run` previews without a
/// database connection.
#[instrument(level = "info", skip_all, fields(year, month, dry_run))]
async fn run_calendar(
    client: &fetch::Client,
    year: Option<u16>,
    month: Option<u8>,
    dry_run: bool,
) -> Result<(), Box<dyn Error>> {
    let today = DateStamp::today_kst();
    let year = match year {
        Some(y) => y,
        None => today.as_str()[0..4].parse()?,
    };
    let month = match month {
        Some(m) => m,
        None => today.as_str()[4..6].parse()?,
    };

    let events = scrapers::koscom::fetch_events(client, year, month).await?;
    if events.is_empty() {
        info!(year, month, "No calendar events to store");
        return Ok(());
    }

    for event in &events {
        info!(
            date = %event.start_date,
            nation = event.nation.as_str(),
            content = %event.content,
            "Calendar event"
        );
    }

    if dry_run {
        info!(count = events.len(), "Dry run; nothing inserted");
        return Ok(());
    }

    let db_cfg = DbConfig::from_env()?;
    let pool = db::connect(&db_cfg).await?;
    let stored = db::insert_calendar(&pool, &events).await;
    pool.close().await;
    info!(stored, "Calendar run finished");
    Ok(())
}

/// Mirror the KRX datasets into the static-site tree and push the result.
#[instrument(level = "info", skip_all, fields(repo = %publisher.repo.display(), trade_date = %trade_date))]
async fn run_publish(
    client: &fetch::Client,
    publisher: &Publisher,
    json_dir: &str,
    logo_dir: &str,
    trade_date: &DateStamp,
) -> Result<(), Box<dyn Error>> {
    // A failed pull is logged but does not stop the mirror; a diverged
    // tree will still fail loudly at push time.
    if let Err(e) = publisher.pull_rebase().await {
        warn!(error = %e, "Pull --rebase failed; continuing with a possibly stale tree");
    }

    let stats = publish::mirror_datasets(
        client,
        &publisher.repo.join(json_dir),
        &publisher.repo.join(logo_dir),
        trade_date.as_str(),
    )
    .await?;

    if stats.datasets_written == 0 {
        error!(?stats, "Every dataset failed; skipping commit and push");
        return Err("no dataset could be mirrored".into());
    }

    let committed = publisher.commit_and_push(trade_date.as_str()).await?;
    info!(committed, ?stats, "Publish run finished");
    Ok(())
}

//! Command-line interface definitions for the collectors.
//!
//! One subcommand per batch job. The scraping jobs take their date range
//! as optional positional arguments (both `20250321` and `2025-03-21`
//! forms are accepted) and default to today in Asia/Seoul, which is what
//! the nightly cron invocations rely on.

use crate::dates::DateStamp;
use crate::scrapers::infostock::DEFAULT_SUMMARY_PATTERN;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the stock collectors.
///
/// # Examples
///
/// ```sh
/// # Today's bulletins and reports (cron form)
/// stock_collector issue
/// stock_collector report
///
/// # Backfill a range
/// stock_collector issue 20250301 20250321
/// stock_collector report 2025-01-01 2025-02-28
///
/// # Preview a month of calendar events without inserting
/// stock_collector calendar --year 2025 --month 12 --dry-run
///
/// # Mirror KRX data and push the static site
/// stock_collector publish --repo ~/jubjub-static
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape market-summary bulletins into stock_history (type 'issue')
    Issue {
        /// Start date, YYYYMMDD or YYYY-MM-DD (default: today KST)
        start: Option<DateStamp>,

        /// End date, inclusive (default: today KST)
        end: Option<DateStamp>,

        /// How many listing pages to walk
        #[arg(long, default_value_t = 5)]
        max_pages: u32,

        /// Anchor-text pattern selecting bulletin variants
        #[arg(long, default_value = DEFAULT_SUMMARY_PATTERN)]
        pattern: String,

        /// Keep securities with flat or negative change rates too
        #[arg(long)]
        include_falling: bool,

        /// Directory for the {start}.json digest artifact, relative to
        /// --repo when one is given
        #[arg(long, default_value = "naver-finance")]
        digest_dir: PathBuf,

        /// Static-site git working tree to publish the digest into.
        /// Without it the digest is written locally and not published.
        #[arg(long, env = "PUBLISH_REPO")]
        repo: Option<PathBuf>,

        /// SSH identity file used for pull and push
        #[arg(long, env = "PUBLISH_SSH_IDENTITY")]
        ssh_identity: Option<PathBuf>,

        /// Git remote to pull from and push to
        #[arg(long, default_value = "origin")]
        remote: String,

        /// Branch the static site serves
        #[arg(long, default_value = "main")]
        branch: String,
    },

    /// Scrape analyst report summaries into stock_history (type 'report')
    Report {
        /// Start date, YYYYMMDD or YYYY-MM-DD (default: today KST)
        start: Option<DateStamp>,

        /// End date, inclusive (default: today KST)
        end: Option<DateStamp>,
    },

    /// Collect a month of economic-calendar events into stock_calendar
    Calendar {
        /// Calendar year (default: current year KST)
        #[arg(long)]
        year: Option<u16>,

        /// Calendar month 1-12 (default: current month KST)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=12))]
        month: Option<u8>,

        /// Log the mapped events without inserting anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Mirror KRX datasets and logos into the static-site repo and push
    Publish {
        /// Static-site git working tree
        #[arg(short, long, env = "PUBLISH_REPO")]
        repo: PathBuf,

        /// SSH identity file used for pull and push
        #[arg(long, env = "PUBLISH_SSH_IDENTITY")]
        ssh_identity: Option<PathBuf>,

        /// Dataset JSON directory, relative to the repo
        #[arg(long, default_value = "json")]
        json_dir: String,

        /// Logo image directory, relative to the repo
        #[arg(long, default_value = "logo")]
        logo_dir: String,

        /// Git remote to pull from and push to
        #[arg(long, default_value = "origin")]
        remote: String,

        /// Branch the static site serves
        #[arg(long, default_value = "main")]
        branch: String,

        /// Trade date for the datasets (default: today KST)
        #[arg(long)]
        trade_date: Option<DateStamp>,
    },
}

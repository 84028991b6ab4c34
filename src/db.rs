//! Persistence sink for the two collector tables.
//!
//! Both tables are external collaborators with pre-existing schemas; this
//! module is a pure producer. One pooled connection is opened per run and
//! dropped when the run ends.
//!
//! Inserts are deliberately plain `INSERT` with no conflict clause: the
//! tables are append-only logs, and re-running a job over an already
//! processed date range produces duplicate rows. Downstream consumers own
//! deduplication (see DESIGN.md).

use crate::config::DbConfig;
use crate::models::{CalendarEvent, StockHistoryRecord};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::error::Error;
use tracing::{error, info, instrument};

pub(crate) const INSERT_HISTORY: &str =
    "INSERT INTO stock_history (type, title, content, date, code) VALUES ($1, $2, $3, $4, $5)";

pub(crate) const INSERT_CALENDAR: &str =
    "INSERT INTO stock_calendar (event_type, nation, content, start_date, end_date) \
     VALUES ($1, $2, $3, $4, $5)";

/// Open the run-scoped connection pool.
#[instrument(level = "info", skip_all, fields(host = %cfg.host, database = %cfg.database))]
pub async fn connect(cfg: &DbConfig) -> Result<PgPool, Box<dyn Error>> {
    let options = PgConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.user)
        .password(&cfg.password)
        .database(&cfg.database);

    // The jobs are strictly sequential; one connection is all they use.
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    info!("Database connection established");
    Ok(pool)
}

/// Insert a batch of history rows one statement at a time.
///
/// A failed row is logged and skipped; the batch keeps going. Returns the
/// number of rows that actually landed.
#[instrument(level = "info", skip_all, fields(count = records.len()))]
pub async fn insert_history(pool: &PgPool, records: &[StockHistoryRecord]) -> usize {
    let mut inserted = 0usize;
    for record in records {
        let result = sqlx::query(INSERT_HISTORY)
            .bind(record.kind.as_str())
            .bind(&record.title)
            .bind(&record.content)
            .bind(record.date.as_str())
            .bind(&record.code)
            .execute(pool)
            .await;

        match result {
            Ok(_) => {
                info!(code = %record.code, date = %record.date, title = %record.title, "Stored history row");
                inserted += 1;
            }
            Err(e) => {
                error!(code = %record.code, date = %record.date, error = %e, "History insert failed; continuing");
            }
        }
    }
    inserted
}

/// Insert calendar events with the same per-row, keep-going semantics.
#[instrument(level = "info", skip_all, fields(count = events.len()))]
pub async fn insert_calendar(pool: &PgPool, events: &[CalendarEvent]) -> usize {
    let mut inserted = 0usize;
    for event in events {
        let result = sqlx::query(INSERT_CALENDAR)
            .bind(event.event_type)
            .bind(event.nation.as_str())
            .bind(&event.content)
            .bind(event.start_date.as_str())
            .bind(event.end_date.as_str())
            .execute(pool)
            .await;

        match result {
            Ok(_) => {
                info!(date = %event.start_date, nation = event.nation.as_str(), content = %event.content, "Stored calendar row");
                inserted += 1;
            }
            Err(e) => {
                error!(date = %event.start_date, error = %e, "Calendar insert failed; continuing");
            }
        }
    }
    inserted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inserts_are_parameterized_five_ways() {
        for sql in [INSERT_HISTORY, INSERT_CALENDAR] {
            for n in 1..=5 {
                assert!(sql.contains(&format!("${n}")), "missing ${n} in {sql}");
            }
            assert!(!sql.contains("$6"));
        }
    }

    /// Append-only policy: reruns over the same date range insert duplicate
    /// rows on purpose. If a uniqueness constraint ever becomes the policy,
    /// this test is the place that decision has to be made explicit.
    #[test]
    fn test_inserts_carry_no_conflict_clause() {
        assert!(!INSERT_HISTORY.contains("ON CONFLICT"));
        assert!(!INSERT_CALENDAR.contains("ON CONFLICT"));
    }
}

//! Data models for scraped records.
//!
//! Two persisted shapes, both flat and insert-only:
//! - [`StockHistoryRecord`]: one news/report item tied to a security code
//! - [`CalendarEvent`]: one economic-calendar entry tied to a nation
//!
//! Plus [`IssueDigestEntry`], the JSON artifact row the issue job writes
//! alongside its database inserts.

use crate::dates::DateStamp;
use serde::Serialize;

/// Which scrape produced a `stock_history` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    /// Market-summary bulletin item (infostock).
    Issue,
    /// Analyst report summary (FnGuide).
    Report,
}

impl HistoryKind {
    /// The `type` column value.
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryKind::Issue => "issue",
            HistoryKind::Report => "report",
        }
    }
}

/// One row of the `stock_history` table.
#[derive(Debug, Clone)]
pub struct StockHistoryRecord {
    pub kind: HistoryKind,
    pub title: String,
    /// Normalized body text; for reports, newline-joined paragraphs plus a
    /// trailing slash-joined metadata fragment.
    pub content: String,
    pub date: DateStamp,
    /// 6-digit security code.
    pub code: String,
}

/// Calendar nations the sources report on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nation {
    UnitedStates,
    Japan,
    China,
    SouthKorea,
}

impl Nation {
    /// The `nation` column value.
    pub fn as_str(self) -> &'static str {
        match self {
            Nation::UnitedStates => "united-states",
            Nation::Japan => "japan",
            Nation::China => "china",
            Nation::SouthKorea => "south-korea",
        }
    }

    /// Map the calendar API's Korean class name. Classes outside the three
    /// tracked foreign markets are dropped by the caller.
    pub fn from_class_name(class_nm: &str) -> Option<Self> {
        match class_nm {
            "미국" => Some(Nation::UnitedStates),
            "일본" => Some(Nation::Japan),
            "중국" => Some(Nation::China),
            _ => None,
        }
    }
}

/// One row of the `stock_calendar` table. `start_date == end_date` for
/// single-day events, which is everything the monthly feed produces.
#[derive(Debug, Clone)]
pub struct CalendarEvent {
    /// Constant "index" for the economic-indicator feed.
    pub event_type: &'static str,
    pub nation: Nation,
    pub content: String,
    pub start_date: DateStamp,
    pub end_date: DateStamp,
}

/// One entry of the issue job's JSON digest artifact.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IssueDigestEntry {
    pub code: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_kind_column_values() {
        assert_eq!(HistoryKind::Issue.as_str(), "issue");
        assert_eq!(HistoryKind::Report.as_str(), "report");
    }

    #[test]
    fn test_nation_column_values() {
        assert_eq!(Nation::UnitedStates.as_str(), "united-states");
        assert_eq!(Nation::SouthKorea.as_str(), "south-korea");
    }

    #[test]
    fn test_nation_from_class_name() {
        assert_eq!(Nation::from_class_name("미국"), Some(Nation::UnitedStates));
        assert_eq!(Nation::from_class_name("일본"), Some(Nation::Japan));
        assert_eq!(Nation::from_class_name("중국"), Some(Nation::China));
        // The domestic market never comes through the API feed.
        assert_eq!(Nation::from_class_name("한국"), None);
        assert_eq!(Nation::from_class_name("유럽"), None);
    }

    #[test]
    fn test_digest_entry_serializes_flat() {
        let entry = IssueDigestEntry {
            code: "005930".to_string(),
            content: "목표가 상향".to_string(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"code":"005930","content":"목표가 상향"}"#);
    }
}

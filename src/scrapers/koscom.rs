//! Economic-calendar feed from the KOSCOM check-calendar endpoint.
//!
//! One POST per month returns every tracked indicator event. Only the
//! three foreign markets (미국/일본/중국) come from this feed; the
//! domestic rate-decision entries are maintained by hand in the database
//! and never pass through this job.

use crate::dates::DateStamp;
use crate::models::{CalendarEvent, Nation};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::error::Error;
use tracing::{debug, info, instrument, warn};

pub const CALENDAR_URL: &str = "https://checkmall.koscom.co.kr/checkmall/checkCalendar/list.json";

/// Indicator classes 002-004 of group G101, one month at a time; the
/// endpoint's own query grammar, carried over verbatim.
const EVENT_GROUP: &str = "[{ group: 'G101', cls: '002,003,004' }]";

/// `MM/DD` fragment inside the feed's display date.
static MONTH_DAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{2})/(\d{2})").unwrap());

#[derive(Debug, Deserialize)]
struct CalendarResponse {
    #[serde(rename = "eventList", default)]
    event_list: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "eventContent", default)]
    content: Option<String>,
    #[serde(rename = "eventDate", default)]
    date: String,
    #[serde(rename = "classNm", default)]
    class_nm: String,
}

/// Fetch one month of calendar events.
#[instrument(level = "info", skip_all, fields(year, month))]
pub async fn fetch_events(
    client: &crate::fetch::Client,
    year: u16,
    month: u8,
) -> Result<Vec<CalendarEvent>, Box<dyn Error>> {
    let on_date = format!("{year}{month:02}01");
    let form: [(&str, &str); 4] = [
        ("disType", "m"),
        ("eventGroup", EVENT_GROUP),
        ("onDate", &on_date),
        ("searchWrd", ""),
    ];
    let body = client.post_form(CALENDAR_URL, &form).await?;
    let events = parse_events(&body, year)?;
    info!(count = events.len(), "Parsed calendar events");
    Ok(events)
}

/// Map the feed payload to calendar rows. Events with no content, an
/// untracked nation class, or an unreadable date are dropped with a log
/// line; the feed's year is not in the payload and comes from the caller.
pub fn parse_events(body: &str, year: u16) -> Result<Vec<CalendarEvent>, Box<dyn Error>> {
    let response: CalendarResponse = serde_json::from_str(body)?;

    let mut events = Vec::new();
    for raw in response.event_list {
        let Some(content) = raw.content.filter(|c| !c.is_empty()) else {
            continue;
        };
        let Some(nation) = Nation::from_class_name(&raw.class_nm) else {
            debug!(class = %raw.class_nm, "Untracked nation class; skipping event");
            continue;
        };
        let Some(caps) = MONTH_DAY.captures(&raw.date) else {
            warn!(date = %raw.date, "Event date without MM/DD token; skipping event");
            continue;
        };
        let stamp: DateStamp = match format!("{year}{}{}", &caps[1], &caps[2]).parse() {
            Ok(stamp) => stamp,
            Err(e) => {
                warn!(date = %raw.date, error = %e, "Event date outside the calendar; skipping event");
                continue;
            }
        };

        events.push(CalendarEvent {
            event_type: "index",
            nation,
            content,
            start_date: stamp.clone(),
            end_date: stamp,
        });
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"{
        "eventList": [
            {"eventContent": "소비자물가지수(CPI)", "eventDate": "03/12 (수)", "classNm": "미국"},
            {"eventContent": "단칸 대형제조업지수", "eventDate": "04/01 (화)", "classNm": "일본"},
            {"eventContent": "차이신 제조업 PMI", "eventDate": "03/03 (월)", "classNm": "중국"},
            {"eventContent": "무역수지", "eventDate": "03/05 (수)", "classNm": "유럽"},
            {"eventContent": "", "eventDate": "03/07 (금)", "classNm": "미국"},
            {"eventContent": "날짜 불명 이벤트", "eventDate": "미정", "classNm": "미국"}
        ]
    }"#;

    #[test]
    fn test_parse_events_maps_tracked_nations() {
        let events = parse_events(FEED, 2025).unwrap();
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].event_type, "index");
        assert_eq!(events[0].nation, Nation::UnitedStates);
        assert_eq!(events[0].content, "소비자물가지수(CPI)");
        assert_eq!(events[0].start_date.as_str(), "20250312");
        // Single-day events: both bounds equal.
        assert_eq!(events[0].start_date, events[0].end_date);

        assert_eq!(events[1].nation, Nation::Japan);
        assert_eq!(events[1].start_date.as_str(), "20250401");
        assert_eq!(events[2].nation, Nation::China);
    }

    #[test]
    fn test_parse_events_drops_untracked_empty_and_dateless() {
        let events = parse_events(FEED, 2025).unwrap();
        assert!(events.iter().all(|e| e.nation != Nation::SouthKorea));
        assert!(events.iter().all(|e| !e.content.is_empty()));
        assert!(events.iter().all(|e| e.content != "무역수지"));
        assert!(events.iter().all(|e| e.content != "날짜 불명 이벤트"));
    }

    #[test]
    fn test_parse_events_empty_list() {
        assert!(parse_events(r#"{"eventList": []}"#, 2025).unwrap().is_empty());
        assert!(parse_events(r#"{}"#, 2025).unwrap().is_empty());
    }

    #[test]
    fn test_parse_events_bad_json_is_an_error() {
        assert!(parse_events("not json", 2025).is_err());
    }
}

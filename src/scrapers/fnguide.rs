//! Analyst report-summary scraper for the FnGuide daily endpoint.
//!
//! The endpoint is keyed by a single trade date, so the report job walks
//! its date range one day at a time instead of paging. Each
//! `dl.um_tdinsm` block is one report; the block's trailing metadata
//! (publisher, analyst, rating) sits outside the block, in the third
//! `<span>` sibling that follows it.

use crate::dates::DateStamp;
use crate::extract::{capture, schema_selector, select_text, ExtractError};
use crate::models::{HistoryKind, StockHistoryRecord};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::error::Error;
use tracing::{debug, info, instrument, warn};

mod schema {
    pub const REPORT_BLOCK: &str = "dl.um_tdinsm";
    pub const CODE_NODE: &str = "dt a .txt1";
    pub const TITLE_NODE: &str = "dt .txt2";
    pub const BODY_NODE: &str = "dd";
}

static CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{6})").unwrap());
static TRAILING_PERIOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.$").unwrap());

pub fn report_url(date: &DateStamp) -> String {
    format!(
        "https://comp.fnguide.com/SVO2/asp/SVD_Report_Summary_Data.asp?fr_dt={d}&to_dt={d}&stext=&check=all",
        d = date.as_str()
    )
}

/// Fetch and extract one day's report records.
#[instrument(level = "info", skip_all, fields(date = %date))]
pub async fn fetch_reports(
    client: &crate::fetch::Client,
    date: &DateStamp,
) -> Result<Vec<StockHistoryRecord>, Box<dyn Error>> {
    let html = client.get_text(&report_url(date)).await?;
    let records = parse_reports(&html, date);
    info!(count = records.len(), "Parsed report records");
    Ok(records)
}

/// Extract report records from a day page. Blocks without a derivable title
/// or security code are discarded.
pub fn parse_reports(html: &str, date: &DateStamp) -> Vec<StockHistoryRecord> {
    let document = Html::parse_document(html);
    let block_sel = schema_selector(schema::REPORT_BLOCK);

    let mut records = Vec::new();
    for block in document.select(&block_sel) {
        match parse_block(block, date) {
            Ok(record) => records.push(record),
            Err(e) => debug!(error = %e, "Dropping report block"),
        }
    }
    records
}

fn parse_block(
    block: ElementRef<'_>,
    date: &DateStamp,
) -> Result<StockHistoryRecord, ExtractError> {
    let code_text = select_text(block, "code", schema::CODE_NODE)?;
    let code = capture("code", &CODE, &code_text)?;

    // Title text is "회사명 - 제목"; keep the part after the first dash.
    let title_text = select_text(block, "title", schema::TITLE_NODE)?;
    let title = title_text
        .split('-')
        .nth(1)
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if title.is_empty() {
        return Err(ExtractError::NoMatch {
            field: "title",
            text: title_text,
        });
    }

    let body_sel = schema_selector(schema::BODY_NODE);
    let mut content = block
        .select(&body_sel)
        .map(|dd| {
            let text = dd.text().collect::<String>();
            TRAILING_PERIOD.replace(text.trim(), "").into_owned()
        })
        .join("\n");

    content.push_str("\n\n");
    content.push_str(&trailing_metadata(block));

    Ok(StockHistoryRecord {
        kind: HistoryKind::Report,
        title,
        content,
        date: date.clone(),
        code,
    })
}

/// Text of the third `<span>` element-sibling after the block, whitespace
/// tokens re-joined with ` / `. Missing siblings degrade to an empty
/// fragment, which is logged rather than silently absorbed.
fn trailing_metadata(block: ElementRef<'_>) -> String {
    let third_span = block
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "span")
        .nth(2);

    match third_span {
        Some(span) => {
            let text = span.text().collect::<String>();
            text.split_whitespace().join(" / ")
        }
        None => {
            warn!(field = "metadata", "No third span sibling after report block");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> DateStamp {
        "20250321".parse().unwrap()
    }

    const REPORT_HTML: &str = r#"
        <div>
          <dl class="um_tdinsm">
            <dt><a>삼성전자 <span class="txt1">(005930)</span></a>
                <span class="txt2">삼성전자 - 반도체 업황 개선 기대</span></dt>
            <dd>1분기 실적은 시장 기대치 상회.</dd>
            <dd>메모리 가격 반등 구간 진입.</dd>
          </dl>
          <span>키움증권</span>
          <span>김철수</span>
          <span>매수 유지 TP 90,000</span>
          <dl class="um_tdinsm">
            <dt><a>무제목 <span class="txt1">(000660)</span></a>
                <span class="txt2">제목 구분자가 없는 행</span></dt>
            <dd>본문.</dd>
          </dl>
          <span>a</span><span>b</span><span>c</span>
        </div>
    "#;

    #[test]
    fn test_parse_reports_builds_joined_content() {
        let records = parse_reports(REPORT_HTML, &day());
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.kind, HistoryKind::Report);
        assert_eq!(record.code, "005930");
        assert_eq!(record.title, "반도체 업황 개선 기대");
        assert_eq!(record.date, day());
        assert_eq!(
            record.content,
            "1분기 실적은 시장 기대치 상회\n메모리 가격 반등 구간 진입\n\n매수 / 유지 / TP / 90,000"
        );
    }

    #[test]
    fn test_block_without_dash_title_is_discarded() {
        // The second block in REPORT_HTML has no dash-delimited title.
        let records = parse_reports(REPORT_HTML, &day());
        assert!(records.iter().all(|r| r.code != "000660"));
    }

    #[test]
    fn test_block_without_code_is_discarded() {
        let html = r#"
            <dl class="um_tdinsm">
              <dt><a><span class="txt1">코드아님</span></a>
                  <span class="txt2">회사 - 제목</span></dt>
              <dd>본문.</dd>
            </dl>
        "#;
        assert!(parse_reports(html, &day()).is_empty());
    }

    #[test]
    fn test_missing_metadata_spans_leave_empty_fragment() {
        let html = r#"
            <dl class="um_tdinsm">
              <dt><a><span class="txt1">(005930)</span></a>
                  <span class="txt2">회사 - 제목</span></dt>
              <dd>본문.</dd>
            </dl>
        "#;
        let records = parse_reports(html, &day());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "본문\n\n");
    }

    #[test]
    fn test_empty_day_page() {
        assert!(parse_reports("<div>조회 결과가 없습니다</div>", &day()).is_empty());
    }
}

//! Market-summary bulletin scraper for the mk.co.kr infostock listing.
//!
//! Two-phase, like every scraper here: index the paginated listing for
//! bulletin links whose anchor text matches the summary pattern, then fetch
//! each bulletin page and extract per-security records from its table.
//!
//! # Markup assumptions (schema, not algorithm)
//!
//! Listing: `table tr`, first `<a>` per row, anchor text like `증시요약(4)`.
//! Bulletin: publication time in `.time_info span`; records in `.tbl tr`
//! where a row with a `td[rowspan="2"] b` code cell holds code/rate/title
//! and the following row holds the body text.

use crate::dates::{find_stamp, DateStamp};
use crate::extract::{capture, normalize_content, schema_selector, select_text};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::error::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const LISTING_URL: &str = "https://stock.mk.co.kr/news/media/infostock";

/// Default anchor-text marker: market-summary bulletins, variant classes 4-5.
pub const DEFAULT_SUMMARY_PATTERN: &str = r"증시요약\([4-5]\)";

mod schema {
    pub const LIST_ROW: &str = "table tr";
    pub const LIST_LINK: &str = "a[href]";
    pub const DATE_NODE: &str = ".time_info span";
    pub const RECORD_ROW: &str = ".tbl tr";
    pub const CODE_CELL: &str = r#"td[rowspan="2"] b"#;
    pub const BODY_CELL: &str = "td";
}

/// `종목명(005930)(+1.2%)` style code cell fragments.
static CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d{6})\)").unwrap());
static RATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([+-])[\d.]+%\)").unwrap());

/// A candidate bulletin discovered on the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLink {
    pub title: String,
    pub url: String,
}

/// One extracted per-security record, before the date filter decides its fate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulletinItem {
    pub code: String,
    pub title: String,
    pub content: String,
}

/// An extracted bulletin page: its publication date plus its records.
#[derive(Debug)]
pub struct Bulletin {
    /// `None` when the page carries no recognizable date token; such
    /// bulletins always fail the range filter.
    pub date: Option<DateStamp>,
    pub items: Vec<BulletinItem>,
}

pub fn listing_url(page: u32) -> String {
    format!("{LISTING_URL}?page={page}")
}

/// Index one listing page for bulletin links matching `pattern`.
#[instrument(level = "info", skip_all, fields(page))]
pub async fn index_summary_links(
    client: &crate::fetch::Client,
    page: u32,
    pattern: &Regex,
) -> Result<Vec<SummaryLink>, Box<dyn Error>> {
    let url = listing_url(page);
    let html = client.get_text(&url).await?;
    let links = parse_listing(&html, &url, pattern)?;
    info!(count = links.len(), page, "Indexed summary links");
    debug!(?links, "Summary links");
    Ok(links)
}

/// Extract matching bulletin links from listing HTML. Relative hrefs are
/// resolved against `page_url`.
pub fn parse_listing(
    html: &str,
    page_url: &str,
    pattern: &Regex,
) -> Result<Vec<SummaryLink>, Box<dyn Error>> {
    let base = Url::parse(page_url)?;
    let document = Html::parse_document(html);
    let row_sel = schema_selector(schema::LIST_ROW);
    let link_sel = schema_selector(schema::LIST_LINK);

    let mut links = Vec::new();
    for row in document.select(&row_sel) {
        let Some(anchor) = row.select(&link_sel).next() else {
            continue;
        };
        let text = anchor.text().collect::<String>();
        if !pattern.is_match(&text) {
            continue;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if let Ok(resolved) = base.join(href) {
            links.push(SummaryLink {
                title: text.trim().to_string(),
                url: resolved.to_string(),
            });
        }
    }
    Ok(links)
}

/// Fetch one bulletin page and extract its records.
///
/// `positive_only` keeps only securities whose change-rate token carries a
/// `+` sign; this is a business rule of the issue feed, not a structural
/// requirement, and is switched off by `issue --include-falling`.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn fetch_bulletin(
    client: &crate::fetch::Client,
    url: &str,
    positive_only: bool,
) -> Result<Bulletin, Box<dyn Error>> {
    let html = client.get_text(url).await?;
    let bulletin = parse_bulletin(&html, positive_only);
    info!(
        date = bulletin.date.as_ref().map(|d| d.as_str()).unwrap_or("none"),
        items = bulletin.items.len(),
        "Parsed bulletin"
    );
    Ok(bulletin)
}

/// Extract the publication date and per-security records from bulletin HTML.
pub fn parse_bulletin(html: &str, positive_only: bool) -> Bulletin {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let date = match select_text(root, "date", schema::DATE_NODE) {
        Ok(text) => {
            let stamp = find_stamp(&text);
            if stamp.is_none() {
                warn!(text = %text, "Bulletin time text carries no date token");
            }
            stamp
        }
        Err(e) => {
            warn!(error = %e, "Bulletin date extraction failed");
            None
        }
    };

    let row_sel = schema_selector(schema::RECORD_ROW);
    let code_sel = schema_selector(schema::CODE_CELL);
    let body_sel = schema_selector(schema::BODY_CELL);
    let rows: Vec<ElementRef> = document.select(&row_sel).collect();

    let mut items = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let Some(code_cell) = row.select(&code_sel).next() else {
            continue;
        };
        let code_text = code_cell.text().collect::<String>();

        let code = match capture("code", &CODE, &code_text) {
            Ok(code) => code,
            Err(e) => {
                // No code, no row.
                debug!(error = %e, "Code cell without a security code; dropping row");
                continue;
            }
        };

        if positive_only {
            let is_positive = RATE
                .captures(&code_text)
                .map(|c| &c[1] == "+")
                .unwrap_or(false);
            if !is_positive {
                debug!(code = %code, "Dropping non-positive change row");
                continue;
            }
        }

        let title = row
            .select(&body_sel)
            .nth(1)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .unwrap_or_else(|| {
                warn!(code = %code, field = "title", "Extraction failed; keeping row with empty title");
                String::new()
            });

        // Body text lives in the first cell of the row after the code row.
        let raw_content = rows
            .get(i + 1)
            .and_then(|next| next.select(&body_sel).next())
            .map(|cell| cell.text().collect::<String>())
            .unwrap_or_default();
        let content = normalize_content(&raw_content);

        items.push(BulletinItem { code, title, content });
    }

    Bulletin { date, items }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_pattern() -> Regex {
        Regex::new(DEFAULT_SUMMARY_PATTERN).unwrap()
    }

    const LISTING_HTML: &str = r#"
        <table>
          <tr><td><a href="/news/1001">증시요약(4) 특징 종목</a></td></tr>
          <tr><td><a href="/news/1002">증시요약(6) 시간외 특징주</a></td></tr>
          <tr><td><a href="https://stock.mk.co.kr/news/1003">증시요약(5) 특징 상한가</a></td></tr>
          <tr><td><a href="/news/1004">코스피 마감 시황</a></td></tr>
          <tr><td>링크 없는 행</td></tr>
        </table>
    "#;

    #[test]
    fn test_parse_listing_keeps_only_matching_variants() {
        let links =
            parse_listing(LISTING_HTML, &listing_url(1), &summary_pattern()).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "https://stock.mk.co.kr/news/1001");
        assert_eq!(links[0].title, "증시요약(4) 특징 종목");
        assert_eq!(links[1].url, "https://stock.mk.co.kr/news/1003");
    }

    #[test]
    fn test_parse_listing_pattern_is_configuration() {
        let variant_six = Regex::new(r"증시요약\([6]\)").unwrap();
        let links = parse_listing(LISTING_HTML, &listing_url(1), &variant_six).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://stock.mk.co.kr/news/1002");
    }

    #[test]
    fn test_parse_listing_empty_page() {
        let links = parse_listing(
            "<table></table>",
            &listing_url(99),
            &summary_pattern(),
        )
        .unwrap();
        assert!(links.is_empty());
    }

    const BULLETIN_HTML: &str = r#"
        <div class="time_info"><span>입력 2025.03.21 15:10</span></div>
        <table class="tbl">
          <tr>
            <td rowspan="2"><b>기아차(005930)(+2.15%)</b></td>
            <td>기아차 강세</td>
          </tr>
          <tr><td>특징주 ▷목표가 상향.</td></tr>
          <tr>
            <td rowspan="2"><b>한화오션(042660)(-1.30%)</b></td>
            <td>한화오션 약세</td>
          </tr>
          <tr><td>▷수주 지연 우려.</td></tr>
          <tr>
            <td rowspan="2"><b>코드 없는 종목</b></td>
            <td>무시되어야 함</td>
          </tr>
          <tr><td>본문</td></tr>
        </table>
    "#;

    #[test]
    fn test_parse_bulletin_end_to_end_record() {
        let bulletin = parse_bulletin(BULLETIN_HTML, true);
        assert_eq!(bulletin.date, Some("20250321".parse().unwrap()));
        assert_eq!(
            bulletin.items,
            vec![BulletinItem {
                code: "005930".to_string(),
                title: "기아차 강세".to_string(),
                content: "목표가 상향".to_string(),
            }]
        );
    }

    #[test]
    fn test_parse_bulletin_include_falling_keeps_negative_rows() {
        let bulletin = parse_bulletin(BULLETIN_HTML, false);
        let codes: Vec<&str> = bulletin.items.iter().map(|i| i.code.as_str()).collect();
        // The codeless row stays dropped either way.
        assert_eq!(codes, vec!["005930", "042660"]);
        assert_eq!(bulletin.items[1].content, "수주 지연 우려");
    }

    #[test]
    fn test_parse_bulletin_without_date_token() {
        let html = r#"
            <div class="time_info"><span>시간 정보 없음</span></div>
            <table class="tbl">
              <tr><td rowspan="2"><b>A(005930)(+1.0%)</b></td><td>t</td></tr>
              <tr><td>c</td></tr>
            </table>
        "#;
        let bulletin = parse_bulletin(html, true);
        assert_eq!(bulletin.date, None);
        assert_eq!(bulletin.items.len(), 1);
    }

    #[test]
    fn test_parse_bulletin_rate_token_required_for_positive_filter() {
        let html = r#"
            <table class="tbl">
              <tr><td rowspan="2"><b>무등락(005930)</b></td><td>t</td></tr>
              <tr><td>c</td></tr>
            </table>
        "#;
        // No rate token at all: dropped under the positive-only rule,
        // kept when the filter is off.
        assert!(parse_bulletin(html, true).items.is_empty());
        assert_eq!(parse_bulletin(html, false).items.len(), 1);
    }
}

//! Field extraction helpers shared by the HTML scrapers.
//!
//! The source sites offer no markup stability contract, so every selector
//! and pattern lives in the scraper modules as data and flows through the
//! helpers here. A node that is missing or a pattern that does not match is
//! an explicit [`ExtractError`], never a silent empty string; the caller
//! decides whether a partial record is kept or discarded.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use thiserror::Error;

/// Leading clause delimiter in bulletin body text. Text before it is a
/// boilerplate header and is dropped.
pub const CLAUSE_DELIMITER: char = '▷';

static TRAILING_PERIOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.$").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("missing field {field:?} (selector {selector:?} matched nothing)")]
    MissingField {
        field: &'static str,
        selector: &'static str,
    },
    #[error("field {field:?} did not match its pattern: {text:?}")]
    NoMatch { field: &'static str, text: String },
}

/// Parse a selector that is part of this crate's extraction schema.
/// Schema selectors are compile-time constants; an invalid one is a bug.
pub fn schema_selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap()
}

/// Whitespace-normalized text content of the first node matching `selector`
/// under `scope`, as an explicit result.
pub fn select_text(
    scope: ElementRef<'_>,
    field: &'static str,
    selector: &'static str,
) -> Result<String, ExtractError> {
    let sel = schema_selector(selector);
    let node = scope
        .select(&sel)
        .next()
        .ok_or(ExtractError::MissingField { field, selector })?;
    Ok(node.text().collect::<String>().trim().to_string())
}

/// First capture group of `pattern` inside `text`.
pub fn capture(
    field: &'static str,
    pattern: &Regex,
    text: &str,
) -> Result<String, ExtractError> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ExtractError::NoMatch {
            field,
            text: text.to_string(),
        })
}

/// Normalize bulletin body text.
///
/// Keeps the part after [`CLAUSE_DELIMITER`] when present (the part before
/// it is a repeated header clause), strips one trailing period, and trims
/// surrounding whitespace. When the delimited part is empty after
/// normalization the whole text is kept instead, so a bulletin whose body
/// is only a header clause still yields its text.
pub fn normalize_content(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some((_, after)) = trimmed.split_once(CLAUSE_DELIMITER) {
        let kept = TRAILING_PERIOD.replace(after.trim(), "").trim().to_string();
        if !kept.is_empty() {
            return kept;
        }
    }
    TRAILING_PERIOD.replace(trimmed, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_normalize_content_drops_leading_clause() {
        assert_eq!(normalize_content("특징주 ▷목표가 상향."), "목표가 상향");
    }

    #[test]
    fn test_normalize_content_without_delimiter() {
        assert_eq!(normalize_content("  목표가 상향.  "), "목표가 상향");
        assert_eq!(normalize_content("목표가 상향"), "목표가 상향");
    }

    #[test]
    fn test_normalize_content_empty_clause_keeps_whole_text() {
        // Nothing usable after the delimiter: fall back to the full text.
        assert_eq!(normalize_content("특징주 ▷."), "특징주 ▷");
        assert_eq!(normalize_content("특징주 ▷"), "특징주 ▷");
    }

    #[test]
    fn test_normalize_content_strips_single_trailing_period() {
        // Only the final sentence period goes; interior ones stay.
        assert_eq!(normalize_content("▷A사. B사 상승."), "A사. B사 상승");
    }

    #[test]
    fn test_select_text_missing_node_is_explicit() {
        let html = Html::parse_document("<div><p>hi</p></div>");
        let root = html.root_element();
        let err = select_text(root, "date", ".time_info span").unwrap_err();
        assert_eq!(
            err,
            ExtractError::MissingField {
                field: "date",
                selector: ".time_info span"
            }
        );
    }

    #[test]
    fn test_select_text_trims() {
        let html = Html::parse_document("<div><span class='t'>  삼성전자  </span></div>");
        let root = html.root_element();
        assert_eq!(select_text(root, "title", ".t").unwrap(), "삼성전자");
    }

    #[test]
    fn test_capture_code() {
        let code = Regex::new(r"\((\d{6})\)").unwrap();
        assert_eq!(
            capture("code", &code, "기아차(000270)(+2.1%)").unwrap(),
            "000270"
        );
        assert!(capture("code", &code, "코드 없음").is_err());
    }
}

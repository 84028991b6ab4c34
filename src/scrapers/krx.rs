//! KRX market-data API client for the publish job.
//!
//! Three fixed datasets per trade date: the full ETF roster plus the
//! KOSPI and KOSDAQ stock rosters. Rows arrive under `output` for the ETF
//! statistics block and `OutBlock_1` for the market rosters; both are
//! accepted for every dataset since KRX has swapped them before.

use serde_json::Value;
use std::error::Error;
use thiserror::Error as ThisError;
use tracing::{info, instrument};

const BASE_URL: &str = "https://data.krx.co.kr/comm/bldAttendant/getJsonData.cmd";
const LOGO_BASE: &str = "https://ssl.pstatic.net/imgstock/fn/real/logo";

/// Top-level field names the API uses for its row array.
const ROW_FIELDS: [&str; 2] = ["output", "OutBlock_1"];

#[derive(Debug, ThisError)]
pub enum DatasetError {
    #[error("dataset {0} returned invalid JSON: {1}")]
    BadJson(&'static str, #[source] serde_json::Error),
    #[error("dataset {0} response carries no row array")]
    NotAnArray(&'static str),
    #[error("dataset {0} row array is empty")]
    Empty(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Etf,
    Kospi,
    Kosdaq,
}

/// One of the three fixed datasets the publish job mirrors.
#[derive(Debug, Clone, Copy)]
pub struct Dataset {
    pub kind: DatasetKind,
    pub name: &'static str,
    pub filename: &'static str,
}

pub const DATASETS: [Dataset; 3] = [
    Dataset {
        kind: DatasetKind::Etf,
        name: "ETF",
        filename: "etf.json",
    },
    Dataset {
        kind: DatasetKind::Kospi,
        name: "KOSPI",
        filename: "kospi.json",
    },
    Dataset {
        kind: DatasetKind::Kosdaq,
        name: "KOSDAQ",
        filename: "kosdaq.json",
    },
];

impl Dataset {
    pub fn url(&self, trade_date: &str) -> String {
        match self.kind {
            DatasetKind::Etf => format!(
                "{BASE_URL}?bld=dbms/MDC/STAT/standard/MDCSTAT04601&locale=ko_KR&share=1&csvxls_isNo=false&trdDd={trade_date}"
            ),
            DatasetKind::Kospi => format!(
                "{BASE_URL}?bld=dbms/MDC/STAT/standard/MDCSTAT01901&locale=ko_KR&mktId=STK&share=1&csvxls_isNo=false&trdDd={trade_date}"
            ),
            DatasetKind::Kosdaq => format!(
                "{BASE_URL}?bld=dbms/MDC/STAT/standard/MDCSTAT01901&locale=ko_KR&mktId=KSQ&segTpCd=ALL&share=1&csvxls_isNo=false&trdDd={trade_date}"
            ),
        }
    }
}

/// Fetch one dataset's rows.
#[instrument(level = "info", skip_all, fields(dataset = dataset.name, trade_date))]
pub async fn fetch_dataset(
    client: &crate::fetch::Client,
    dataset: &Dataset,
    trade_date: &str,
) -> Result<Vec<Value>, Box<dyn Error>> {
    let body = client.get_text_krx(&dataset.url(trade_date)).await?;
    let rows = dataset_rows(&body, dataset.name)?;
    info!(count = rows.len(), "Fetched dataset rows");
    Ok(rows)
}

/// Pull the non-empty row array out of a dataset response. Anything else
/// (bad JSON, missing field, non-array, empty array) fails the dataset.
pub fn dataset_rows(body: &str, name: &'static str) -> Result<Vec<Value>, DatasetError> {
    let parsed: Value =
        serde_json::from_str(body).map_err(|e| DatasetError::BadJson(name, e))?;

    let rows = ROW_FIELDS
        .iter()
        .find_map(|field| parsed.get(field))
        .and_then(Value::as_array)
        .ok_or(DatasetError::NotAnArray(name))?;

    if rows.is_empty() {
        return Err(DatasetError::Empty(name));
    }
    Ok(rows.clone())
}

/// Derive the logo image URL and local file name for one dataset row.
///
/// ETFs share family logos keyed by the first word of the abbreviated
/// name; stocks are keyed by their security code. Rows without a code get
/// no logo.
pub fn logo_target(kind: DatasetKind, item: &Value) -> Option<(String, String)> {
    let code = item.get("ISU_SRT_CD")?.as_str()?;
    if code.is_empty() {
        return None;
    }

    let url = match kind {
        DatasetKind::Etf => {
            let family = item
                .get("ISU_ABBRV")
                .and_then(Value::as_str)
                .and_then(|name| name.split_whitespace().next())
                .unwrap_or("Unknown");
            format!("{LOGO_BASE}/etf/StockKRETF{family}.svg")
        }
        DatasetKind::Kospi | DatasetKind::Kosdaq => {
            format!("{LOGO_BASE}/stock/Stock{code}.svg")
        }
    };
    Some((url, format!("{code}.svg")))
}

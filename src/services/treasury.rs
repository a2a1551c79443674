// src/services/treasury.rs
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use csv::Reader;
use log::{error, info, warn};

use super::http::Http;
use super::{trim_base, SourceClient};
use crate::error::{Result, SourceError};
use crate::models::{DataDomain, Patch};

/// Treasury CSV column → our tenor key
const COLUMNS: [(&str, &str); 11] = [
    ("1 Mo", "m1"),
    ("3 Mo", "m3"),
    ("6 Mo", "m6"),
    ("1 Yr", "y1"),
    ("2 Yr", "US2Y"),
    ("3 Yr", "y3"),
    ("5 Yr", "US5Y"),
    ("7 Yr", "y7"),
    ("10 Yr", "US10Y"),
    ("20 Yr", "US20Y"),
    ("30 Yr", "US30Y"),
];

/// Official daily par yield curve from home.treasury.gov.
pub struct TreasuryClient {
    http: Http,
    base: String,
}

impl TreasuryClient {
    pub fn new(http: Http, base: &str) -> Self {
        TreasuryClient {
            http,
            base: trim_base(base),
        }
    }

    fn url(&self, year: i32) -> String {
        format!(
            "{base}/resource-center/data-chart-center/interest-rates/\
daily-treasury-rates.csv/{year}/all?_format=csv\
&field_tdr_date_value={year}\
&type=daily_treasury_yield_curve",
            base = self.base,
            year = year
        )
    }

    /// `Ok(None)` when the year has no rows yet (first days of January).
    async fn fetch_year(&self, year: i32) -> Result<Option<Patch>> {
        let url = self.url(year);
        info!("[Yields] fetching Treasury CSV from URL: {}", url);
        let csv_text = self.http.get_text(self.name(), &url, "text/csv, */*").await?;
        parse_curve(&csv_text)
    }
}

/// Reads the most recent row (the first data row) of a yield curve CSV.
pub fn parse_curve(csv_text: &str) -> Result<Option<Patch>> {
    let mut rdr = Reader::from_reader(csv_text.as_bytes());
    let headers = rdr.headers()?.clone();

    let idx_10y = headers.iter().position(|h| h.trim() == "10 Yr");
    if idx_10y.is_none() {
        return Err(SourceError::Schema("no '10 Yr' column in Treasury CSV".into()));
    }

    let row = match rdr.records().next() {
        Some(record) => record?,
        None => return Ok(None),
    };

    let mut patch = Patch::default();
    for (column, key) in COLUMNS {
        let idx = match headers.iter().position(|h| h.trim() == column) {
            Some(idx) => idx,
            None => continue,
        };
        let cell = row.get(idx).unwrap_or("").trim();
        if cell.is_empty() || cell == "N/A" {
            continue;
        }
        match cell.parse::<f64>() {
            Ok(v) => {
                patch.yields.insert(key.to_string(), v);
            }
            Err(_) => {
                warn!("[Yields] unparseable {} value '{}'", column, cell);
                patch.errors.insert(key.to_string(), format!("bad value '{}'", cell));
            }
        }
    }

    if let Some(date) = row.get(0) {
        info!("[Yields] Treasury curve as of {}", date.trim());
    }
    if !patch.yields.contains_key("US10Y") {
        return Err(SourceError::Empty("Treasury row has no 10Y yield".into()));
    }
    Ok(Some(patch))
}

#[async_trait]
impl SourceClient for TreasuryClient {
    fn name(&self) -> &'static str {
        "Treasury"
    }

    fn domain(&self) -> DataDomain {
        DataDomain::Yields
    }

    async fn fetch(&self) -> Result<Patch> {
        let year = Utc::now().year();
        if let Some(patch) = self.fetch_year(year).await? {
            return Ok(patch);
        }
        warn!("[Yields] no {} rows yet, trying {}", year, year - 1);
        match self.fetch_year(year - 1).await? {
            Some(patch) => Ok(patch),
            None => {
                error!("[Yields] no data rows in Treasury CSV");
                Err(SourceError::Empty("no valid Treasury yield data found".into()))
            }
        }
    }
}

// src/services/cb_rates.rs
use async_trait::async_trait;
use csv::Reader;
use log::{error, info};
use serde::Deserialize;
use serde_json::Value;

use super::http::Http;
use super::{trim_base, SourceClient};
use crate::error::{Result, SourceError};
use crate::models::{DataDomain, Patch};

/// Policy rates that have a public machine-readable source: ECB, BoC, SNB.
pub struct CbRatesClient {
    http: Http,
    ecb: String,
    boc: String,
    snb: String,
}

#[derive(Debug, Deserialize)]
struct ValetResponse {
    #[serde(default)]
    observations: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SnbResponse {
    #[serde(default)]
    rows: Vec<SnbRow>,
}

#[derive(Debug, Deserialize)]
struct SnbRow {
    #[serde(default)]
    values: Vec<Value>,
}

fn as_rate(v: f64) -> String {
    format!("{:.2}%", v)
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Deposit facility rate from ECB csvdata; the last data line is the latest.
pub fn parse_ecb(csv_text: &str) -> Result<f64> {
    let mut rdr = Reader::from_reader(csv_text.as_bytes());
    let headers = rdr.headers()?.clone();
    let obs_idx = headers.iter().position(|h| h.trim() == "OBS_VALUE");

    let mut latest = None;
    for record in rdr.records() {
        let row = record?;
        let idx = obs_idx.unwrap_or_else(|| row.len().saturating_sub(1));
        if let Some(v) = row.get(idx).and_then(|c| c.trim().parse::<f64>().ok()) {
            latest = Some(v);
        }
    }
    latest.ok_or_else(|| SourceError::Empty("ECB empty response".into()))
}

/// Overnight target from a BoC Valet response; picks the newest observation by date.
pub fn parse_boc(body: &str) -> Result<f64> {
    let resp: ValetResponse = serde_json::from_str(body)?;
    let newest = resp
        .observations
        .iter()
        .max_by(|a, b| {
            let da = a.get("d").and_then(Value::as_str).unwrap_or("");
            let db = b.get("d").and_then(Value::as_str).unwrap_or("");
            da.cmp(db)
        })
        .ok_or_else(|| SourceError::Empty("BoC empty observations".into()))?;
    newest
        .get("AUCRT")
        .and_then(|o| o.get("v"))
        .and_then(number)
        .ok_or_else(|| SourceError::Parse("BoC observation has no AUCRT value".into()))
}

/// SNB policy rate; last row is the most recent.
pub fn parse_snb(body: &str) -> Result<f64> {
    let resp: SnbResponse = serde_json::from_str(body)?;
    let last = resp
        .rows
        .last()
        .ok_or_else(|| SourceError::Empty("SNB empty rows".into()))?;
    last.values
        .first()
        .and_then(number)
        .ok_or_else(|| SourceError::Parse("SNB row has no value".into()))
}

impl CbRatesClient {
    pub fn new(http: Http, ecb: &str, boc: &str, snb: &str) -> Self {
        CbRatesClient {
            http,
            ecb: trim_base(ecb),
            boc: trim_base(boc),
            snb: trim_base(snb),
        }
    }

    async fn fetch_ecb(&self) -> Result<f64> {
        let url = format!(
            "{}/service/data/FM/B.U2.EUR.4F.KR.DFR.LEV?format=csvdata&lastNObservations=1",
            self.ecb
        );
        let text = self.http.get_text("ECB", &url, "text/csv, */*").await?;
        parse_ecb(&text)
    }

    async fn fetch_boc(&self) -> Result<f64> {
        let url = format!("{}/valet/observations/AUCRT/json?recent=2", self.boc);
        let text = self.http.get_text("BoC", &url, "application/json").await?;
        parse_boc(&text)
    }

    async fn fetch_snb(&self) -> Result<f64> {
        let url = format!("{}/api/data/ZIMOM/json", self.snb);
        match self.http.get_text("SNB", &url, "application/json").await {
            Ok(text) => match parse_snb(&text) {
                Ok(rate) => return Ok(rate),
                Err(e) => info!("[CB] SNB primary parse failed ({}), trying dated endpoint", e),
            },
            Err(e) => info!("[CB] SNB primary failed ({}), trying dated endpoint", e),
        }
        let fallback = format!("{}/api/data/ZIMOM/json?startDate=2024-01-01", self.snb);
        let text = self.http.get_text("SNB", &fallback, "application/json").await?;
        parse_snb(&text)
    }
}

#[async_trait]
impl SourceClient for CbRatesClient {
    fn name(&self) -> &'static str {
        "CB rates"
    }

    fn domain(&self) -> DataDomain {
        DataDomain::CbRates
    }

    async fn fetch(&self) -> Result<Patch> {
        let (ecb, boc, snb) = tokio::join!(self.fetch_ecb(), self.fetch_boc(), self.fetch_snb());

        let mut patch = Patch::default();
        for (ccy, result) in [("EUR", ecb), ("CAD", boc), ("CHF", snb)] {
            match result {
                Ok(rate) => {
                    patch.cb_rates.insert(ccy.to_string(), as_rate(rate));
                }
                Err(e) => {
                    error!("[CB] {} failed: {}", ccy, e);
                    patch.errors.insert(ccy.to_string(), e.to_string());
                }
            }
        }

        if patch.cb_rates.is_empty() {
            return Err(SourceError::Empty("all CB rate sources failed".into()));
        }
        info!("[CB] rates: {:?}", patch.cb_rates);
        Ok(patch)
    }
}

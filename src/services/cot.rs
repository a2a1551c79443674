// src/services/cot.rs
use async_trait::async_trait;
use futures::future::join_all;
use log::{error, info};
use serde::Deserialize;

use super::http::{encode_component, Http};
use super::{trim_base, SourceClient};
use crate::error::{Result, SourceError};
use crate::models::{CotPosition, DataDomain, Patch};

/// CFTC market name → currency code
pub const CONTRACTS: [(&str, &str); 9] = [
    ("EURO FX - CHICAGO MERCANTILE EXCHANGE", "EUR"),
    ("JAPANESE YEN - CHICAGO MERCANTILE EXCHANGE", "JPY"),
    ("BRITISH POUND STERLING - CHICAGO MERCANTILE EXCHANGE", "GBP"),
    ("SWISS FRANC - CHICAGO MERCANTILE EXCHANGE", "CHF"),
    ("CANADIAN DOLLAR - CHICAGO MERCANTILE EXCHANGE", "CAD"),
    ("AUSTRALIAN DOLLAR - CHICAGO MERCANTILE EXCHANGE", "AUD"),
    ("NEW ZEALAND DOLLAR - CHICAGO MERCANTILE EXCHANGE", "NZD"),
    ("U.S. DOLLAR INDEX - ICE FUTURES U.S.", "USD"),
    ("GOLD - COMMODITY EXCHANGE INC.", "XAU"),
];

/// One Socrata row; numbers arrive as strings.
#[derive(Debug, Deserialize)]
pub struct CotRow {
    #[serde(default)]
    pub as_of_date_in_form_yyyy_mm_dd: Option<String>,
    #[serde(default)]
    pub open_interest_all: Option<String>,
    #[serde(default)]
    pub noncomm_positions_long_all: Option<String>,
    #[serde(default)]
    pub noncomm_positions_short_all: Option<String>,
}

fn field(v: &Option<String>) -> Option<f64> {
    v.as_deref().and_then(|s| s.trim().parse::<f64>().ok())
}

/// Non-commercial net as a rounded percentage of open interest.
pub fn net_percent(row: &CotRow) -> Option<i64> {
    let oi = field(&row.open_interest_all).filter(|oi| *oi != 0.0)?;
    let long = field(&row.noncomm_positions_long_all)?;
    let short = field(&row.noncomm_positions_short_all)?;
    Some(((long - short) / oi * 100.0).round() as i64)
}

/// Latest and prior week from rows ordered newest first.
pub fn position_from(rows: &[CotRow]) -> Result<CotPosition> {
    let latest = rows
        .first()
        .ok_or_else(|| SourceError::Empty("empty".into()))?;
    let net = net_percent(latest).ok_or_else(|| SourceError::Parse("zero OI".into()))?;
    let prev = rows.get(1).and_then(net_percent).unwrap_or(net);
    Ok(CotPosition { net, prev })
}

/// Weekly Commitments of Traders from the CFTC public reporting API.
pub struct CftcCotClient {
    http: Http,
    base: String,
}

impl CftcCotClient {
    pub fn new(http: Http, base: &str) -> Self {
        CftcCotClient {
            http,
            base: trim_base(base),
        }
    }

    async fn fetch_contract(&self, market: &str) -> Result<Vec<CotRow>> {
        let url = format!(
            "{}/resource/gpe5-46if.json?market_and_exchange_names={}\
&$order=as_of_date_in_form_yyyy_mm_dd%20DESC&$limit=2\
&$select=as_of_date_in_form_yyyy_mm_dd,open_interest_all,noncomm_positions_long_all,noncomm_positions_short_all",
            self.base,
            encode_component(market)
        );
        self.http.get_json("CFTC", &url).await
    }
}

#[async_trait]
impl SourceClient for CftcCotClient {
    fn name(&self) -> &'static str {
        "CFTC COT"
    }

    fn domain(&self) -> DataDomain {
        DataDomain::Cot
    }

    async fn fetch(&self) -> Result<Patch> {
        let results = join_all(CONTRACTS.iter().map(|(market, _)| self.fetch_contract(market))).await;

        let mut patch = Patch::default();
        for ((_, ccy), result) in CONTRACTS.iter().zip(results) {
            let outcome = result.and_then(|rows| {
                let position = position_from(&rows)?;
                Ok((position, rows.into_iter().next().and_then(|r| r.as_of_date_in_form_yyyy_mm_dd)))
            });
            match outcome {
                Ok((position, as_of)) => {
                    patch.cot.insert(ccy.to_string(), position);
                    if patch.cot_as_of.is_none() {
                        patch.cot_as_of = as_of.map(|d| d.chars().take(10).collect());
                    }
                }
                Err(e) => {
                    error!("[COT {}] {}", ccy, e);
                    patch.errors.insert(ccy.to_string(), e.to_string());
                }
            }
        }

        if patch.cot.is_empty() {
            return Err(SourceError::Empty("all CFTC contracts failed".into()));
        }
        info!("[COT] {} contracts, as of {:?}", patch.cot.len(), patch.cot_as_of);
        Ok(patch)
    }
}

// src/services/markets.rs
use async_trait::async_trait;
use futures::future::join_all;
use log::{error, info};
use serde::Deserialize;

use super::http::{encode_component, Http};
use super::{trim_base, SourceClient};
use crate::error::{Result, SourceError};
use crate::models::{DataDomain, MarketQuote, Patch};

/// Yahoo symbol → gauge key
pub const SYMBOLS: [(&str, &str); 7] = [
    ("GC=F", "xau"),
    ("CL=F", "wti"),
    ("^GSPC", "spx"),
    ("^VIX", "vix"),
    ("DX-Y.NYB", "dxy"),
    ("HG=F", "copper"),
    ("SI=F", "silver"),
];

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Debug, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
    #[serde(default)]
    pub indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub regular_market_price: Option<f64>,
    pub chart_previous_close: Option<f64>,
    pub previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<Ohlc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Ohlc {
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
}

impl ChartResponse {
    pub fn first(self) -> Result<ChartResult> {
        self.chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| SourceError::Empty("no chart result".into()))
    }
}

/// Yahoo chart v8 URL for one symbol.
pub fn chart_url(base: &str, symbol: &str, range: &str) -> String {
    format!(
        "{}/v8/finance/chart/{}?interval=1d&range={}",
        base,
        encode_component(symbol),
        range
    )
}

/// Price, previous close and change from a chart's meta block.
pub fn quote_from(meta: &ChartMeta) -> Result<MarketQuote> {
    let price = meta
        .regular_market_price
        .filter(|p| *p > 0.0)
        .ok_or_else(|| SourceError::Empty("no price".into()))?;
    let prev = meta
        .chart_previous_close
        .or(meta.previous_close)
        .filter(|p| *p > 0.0)
        .unwrap_or(price);
    let change = price - prev;
    let change_pct = if prev > 0.0 { change / prev * 100.0 } else { 0.0 };
    Ok(MarketQuote {
        price,
        prev,
        change,
        change_pct,
    })
}

/// Gauges (gold, oil, S&P 500, VIX, DXY, copper, silver) from Yahoo Finance.
pub struct YahooMarketsClient {
    http: Http,
    base: String,
}

impl YahooMarketsClient {
    pub fn new(http: Http, base: &str) -> Self {
        YahooMarketsClient {
            http,
            base: trim_base(base),
        }
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<MarketQuote> {
        let url = chart_url(&self.base, symbol, "2d");
        let resp: ChartResponse = self.http.get_json("Yahoo", &url).await?;
        quote_from(&resp.first()?.meta)
    }
}

#[async_trait]
impl SourceClient for YahooMarketsClient {
    fn name(&self) -> &'static str {
        "Yahoo markets"
    }

    fn domain(&self) -> DataDomain {
        DataDomain::Markets
    }

    async fn fetch(&self) -> Result<Patch> {
        let results = join_all(SYMBOLS.iter().map(|(sym, _)| self.fetch_quote(sym))).await;

        let mut patch = Patch::default();
        for ((sym, key), result) in SYMBOLS.iter().zip(results) {
            match result {
                Ok(quote) => {
                    patch.markets.insert(key.to_string(), quote);
                }
                Err(e) => {
                    error!("[Markets] {} failed: {}", sym, e);
                    patch.errors.insert(key.to_string(), e.to_string());
                }
            }
        }

        if patch.markets.is_empty() {
            return Err(SourceError::Empty("all Yahoo Finance quotes failed".into()));
        }
        info!("[Markets] {} of {} quotes", patch.markets.len(), SYMBOLS.len());
        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_quote_from_meta() {
        let meta = ChartMeta {
            regular_market_price: Some(2950.0),
            chart_previous_close: None,
            previous_close: Some(2936.0),
        };
        let q = quote_from(&meta).unwrap();
        assert_eq!(q.change, 14.0);
        assert!((q.change_pct - 0.4768).abs() < 0.001);

        let empty = ChartMeta {
            regular_market_price: None,
            chart_previous_close: None,
            previous_close: None,
        };
        assert!(quote_from(&empty).is_err());
    }

    #[tokio::test]
    async fn test_failed_symbols_are_reported_per_key() {
        let mut server = mockito::Server::new_async().await;
        let _gold = server
            .mock("GET", "/v8/finance/chart/GC%3DF")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"chart":{"result":[{"meta":{"regularMarketPrice":2950.5,"chartPreviousClose":2936.0}}],"error":null}}"#)
            .create_async()
            .await;
        let _rest = server
            .mock("GET", mockito::Matcher::Regex(r"^/v8/finance/chart/[^G]".to_string()))
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let client = YahooMarketsClient::new(Http::new(Duration::from_secs(5)).unwrap(), &server.url());
        let patch = client.fetch().await.unwrap();
        assert_eq!(patch.markets["xau"].price, 2950.5);
        assert_eq!(patch.errors.len(), 6);
    }
}

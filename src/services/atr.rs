// src/services/atr.rs
use async_trait::async_trait;
use futures::future::join_all;
use log::{error, info};

use super::http::Http;
use super::markets::{chart_url, ChartResponse, Ohlc};
use super::{trim_base, SourceClient};
use crate::error::{Result, SourceError};
use crate::models::{AtrReading, DataDomain, Patch, VolLabel};

const PERIOD: usize = 14;

/// Pair → Yahoo symbol
pub const PAIRS: [(&str, &str); 8] = [
    ("EUR/USD", "EURUSD=X"),
    ("GBP/USD", "GBPUSD=X"),
    ("USD/JPY", "JPY=X"),
    ("USD/CHF", "CHF=X"),
    ("USD/CAD", "CAD=X"),
    ("AUD/USD", "AUDUSD=X"),
    ("NZD/USD", "NZDUSD=X"),
    ("GBP/JPY", "GBPJPY=X"),
];

fn pip_multiplier(pair: &str) -> f64 {
    if pair.contains("JPY") {
        100.0
    } else {
        10_000.0
    }
}

/// 14-session average true range in pips from daily bars.
///
/// Bars with any missing high/low/close are skipped; at least two complete
/// bars are needed for one true range.
pub fn atr_pips(pair: &str, bars: &Ohlc) -> Result<AtrReading> {
    let rows: Vec<(f64, f64, f64)> = bars
        .high
        .iter()
        .zip(&bars.low)
        .zip(&bars.close)
        .filter_map(|((h, l), c)| Some(((*h)?, (*l)?, (*c)?)))
        .collect();
    if rows.len() < 2 {
        return Err(SourceError::Empty(format!("not enough bars for {}", pair)));
    }

    let ranges: Vec<f64> = rows
        .windows(2)
        .map(|w| {
            let (_, _, prev_close) = w[0];
            let (high, low, _) = w[1];
            (high - low)
                .max((high - prev_close).abs())
                .max((low - prev_close).abs())
        })
        .collect();

    let recent = &ranges[ranges.len().saturating_sub(PERIOD)..];
    let avg = recent.iter().sum::<f64>() / recent.len() as f64;
    let atr = ((avg * pip_multiplier(pair)).round() as u32).max(1);
    Ok(AtrReading {
        atr,
        vol: VolLabel::from_pips(atr),
    })
}

/// Daily ranges for the majors and GBP/JPY from Yahoo chart bars.
pub struct YahooAtrClient {
    http: Http,
    base: String,
}

impl YahooAtrClient {
    pub fn new(http: Http, base: &str) -> Self {
        YahooAtrClient {
            http,
            base: trim_base(base),
        }
    }

    async fn fetch_pair(&self, pair: &str, symbol: &str) -> Result<AtrReading> {
        let url = chart_url(&self.base, symbol, "30d");
        let resp: ChartResponse = self.http.get_json("Yahoo", &url).await?;
        let bars = resp
            .first()?
            .indicators
            .and_then(|i| i.quote.into_iter().next())
            .ok_or_else(|| SourceError::Schema(format!("no quote bars for {}", symbol)))?;
        atr_pips(pair, &bars)
    }
}

#[async_trait]
impl SourceClient for YahooAtrClient {
    fn name(&self) -> &'static str {
        "Yahoo ATR"
    }

    fn domain(&self) -> DataDomain {
        DataDomain::Atr
    }

    async fn fetch(&self) -> Result<Patch> {
        let results = join_all(PAIRS.iter().map(|(pair, sym)| self.fetch_pair(pair, sym))).await;

        let mut patch = Patch::default();
        for ((pair, _), result) in PAIRS.iter().zip(results) {
            match result {
                Ok(reading) => {
                    patch.atr.insert(pair.to_string(), reading);
                }
                Err(e) => {
                    error!("[ATR] {} failed: {}", pair, e);
                    patch.errors.insert(pair.to_string(), e.to_string());
                }
            }
        }

        if patch.atr.is_empty() {
            return Err(SourceError::Empty("all ATR pairs failed".into()));
        }
        info!("[ATR] {} pairs", patch.atr.len());
        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn bars(rows: &[(f64, f64, f64)]) -> Ohlc {
        Ohlc {
            high: rows.iter().map(|r| Some(r.0)).collect(),
            low: rows.iter().map(|r| Some(r.1)).collect(),
            close: rows.iter().map(|r| Some(r.2)).collect(),
        }
    }

    #[test]
    fn test_true_range_uses_previous_close() {
        // second bar gaps up: |high - prev close| dominates
        let b = bars(&[(1.0850, 1.0800, 1.0810), (1.0900, 1.0860, 1.0880)]);
        let r = atr_pips("EUR/USD", &b).unwrap();
        assert_eq!(r.atr, 90);
        assert_eq!(r.vol, VolLabel::High);
    }

    #[test]
    fn test_jpy_pairs_use_hundredths() {
        let b = bars(&[(150.00, 149.00, 149.50), (150.20, 149.80, 150.00)]);
        assert_eq!(atr_pips("USD/JPY", &b).unwrap().atr, 70);
    }

    #[test]
    fn test_incomplete_bars_are_skipped() {
        let mut b = bars(&[(1.10, 1.09, 1.095), (1.0, 1.0, 1.0), (1.0995, 1.0955, 1.097)]);
        b.close[1] = None;
        let r = atr_pips("EUR/USD", &b).unwrap();
        assert_eq!(r.atr, 45);

        let single = bars(&[(1.1, 1.0, 1.05)]);
        assert!(atr_pips("EUR/USD", &single).is_err());
    }

    #[test]
    fn test_atr_is_at_least_one_pip() {
        let b = bars(&[(1.0, 1.0, 1.0), (1.0, 1.0, 1.0)]);
        assert_eq!(atr_pips("EUR/USD", &b).unwrap().atr, 1);
    }

    #[tokio::test]
    async fn test_fetch_reads_quote_bars() {
        let mut server = mockito::Server::new_async().await;
        let _eur = server
            .mock("GET", "/v8/finance/chart/EURUSD%3DX")
            .match_query(mockito::Matcher::Any)
            .with_body(
                r#"{"chart":{"result":[{"meta":{"regularMarketPrice":1.088},"indicators":{"quote":[{"high":[1.0850,null,1.0900],"low":[1.0800,1.0,1.0860],"close":[1.0810,1.0,1.0880]}]}}]}}"#,
            )
            .create_async()
            .await;
        let _rest = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let client = YahooAtrClient::new(Http::new(Duration::from_secs(5)).unwrap(), &server.url());
        let patch = client.fetch().await.unwrap();
        assert_eq!(patch.atr["EUR/USD"].atr, 90);
        assert_eq!(patch.errors.len(), 7);
    }
}

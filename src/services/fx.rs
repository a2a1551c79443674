// src/services/fx.rs
use async_trait::async_trait;
use log::{info, warn};
use serde::Deserialize;
use std::collections::BTreeMap;

use super::http::Http;
use super::{trim_base, SourceClient};
use crate::error::{Result, SourceError};
use crate::models::{DataDomain, Patch};

/// (pair, quote currency in the USD-based response, invert, decimals)
const PAIRS: [(&str, &str, bool, i32); 7] = [
    ("EUR/USD", "EUR", true, 4),
    ("GBP/USD", "GBP", true, 4),
    ("USD/JPY", "JPY", false, 2),
    ("USD/CHF", "CHF", false, 4),
    ("USD/CAD", "CAD", false, 4),
    ("AUD/USD", "AUD", true, 4),
    ("NZD/USD", "NZD", true, 4),
];

#[derive(Debug, Deserialize)]
struct LatestResponse {
    rates: BTreeMap<String, f64>,
}

/// ECB reference spot rates from Frankfurter, quoted in market convention.
pub struct FrankfurterClient {
    http: Http,
    base: String,
}

impl FrankfurterClient {
    pub fn new(http: Http, base: &str) -> Self {
        FrankfurterClient {
            http,
            base: trim_base(base),
        }
    }
}

fn round_dp(x: f64, dp: i32) -> f64 {
    let f = 10f64.powi(dp);
    (x * f).round() / f
}

#[async_trait]
impl SourceClient for FrankfurterClient {
    fn name(&self) -> &'static str {
        "Frankfurter"
    }

    fn domain(&self) -> DataDomain {
        DataDomain::Fx
    }

    async fn fetch(&self) -> Result<Patch> {
        let url = format!(
            "{}/latest?from=USD&to=EUR,GBP,JPY,CHF,CAD,AUD,NZD",
            self.base
        );
        let body: LatestResponse = self.http.get_json(self.name(), &url).await?;

        let mut patch = Patch::default();
        for (pair, ccy, invert, dp) in PAIRS {
            match body.rates.get(ccy).copied().filter(|r| *r > 0.0) {
                Some(rate) => {
                    let quoted = if invert { 1.0 / rate } else { rate };
                    patch.fx.insert(pair.to_string(), round_dp(quoted, dp));
                }
                None => {
                    warn!("[FX] no usable {} rate in Frankfurter response", ccy);
                    patch.errors.insert(pair.to_string(), format!("missing {} rate", ccy));
                }
            }
        }

        if patch.fx.is_empty() {
            return Err(SourceError::Empty("Frankfurter returned no rates".into()));
        }
        info!("[FX] {} pairs from Frankfurter", patch.fx.len());
        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client(url: &str) -> FrankfurterClient {
        FrankfurterClient::new(Http::new(Duration::from_secs(5)).unwrap(), url)
    }

    #[tokio::test]
    async fn test_rates_are_inverted_to_market_convention() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/latest")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"amount":1.0,"base":"USD","rates":{"EUR":0.92,"GBP":0.79,"JPY":149.834,"CHF":0.8812,"CAD":1.3521,"AUD":1.5625,"NZD":1.7}}"#,
            )
            .create_async()
            .await;

        let patch = client(&server.url()).fetch().await.unwrap();
        assert_eq!(patch.fx["EUR/USD"], 1.087);
        assert_eq!(patch.fx["USD/JPY"], 149.83);
        assert_eq!(patch.fx["AUD/USD"], 0.64);
        assert!(!patch.is_partial());
    }

    #[tokio::test]
    async fn test_missing_currency_is_partial_not_fatal() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/latest")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"rates":{"EUR":0.92}}"#)
            .create_async()
            .await;

        let patch = client(&server.url()).fetch().await.unwrap();
        assert_eq!(patch.fx.len(), 1);
        assert!(patch.errors.contains_key("USD/JPY"));
        assert!(patch.is_partial());
    }
}

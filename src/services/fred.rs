// src/services/fred.rs
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use futures::future::join_all;
use log::{error, info};
use serde::Deserialize;

use super::http::{encode_component, Http};
use super::{trim_base, SourceClient};
use crate::config::Credential;
use crate::error::{Result, SourceError};
use crate::models::{DataDomain, IntlMacro, Patch};

/// How a series is turned into a single reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    Level,
    YearOnYear,
}

/// us_macro key → (series id, transform)
pub const US_SERIES: [(&str, &str, Transform); 3] = [
    ("cpi", "CPIAUCSL", Transform::YearOnYear),
    ("unemployment", "UNRATE", Transform::Level),
    ("corePce", "PCEPILFE", Transform::YearOnYear),
];

/// currency → (CPI growth series, unemployment series); OECD mirrors on FRED
pub const INTL_SERIES: [(&str, &str, &str); 7] = [
    ("AUD", "CPALTT01AUQ659N", "LRUNTTTTAUM156S"),
    ("EUR", "CPALTT01EZM659N", "LRHUTTTTEZM156S"),
    ("GBP", "CPALTT01GBM659N", "LRHUTTTTGBM156S"),
    ("JPY", "CPALTT01JPM659N", "LRUN64TTJPM156S"),
    ("CHF", "CPALTT01CHM659N", "LRUNTTTTCHQ156S"),
    ("CAD", "CPALTT01CAM659N", "LRUNTTTTCAM156S"),
    ("NZD", "CPALTT01NZQ659N", "LRUNTTTTNZQ156S"),
];

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

/// Parses an observations body, newest first, dropping FRED's "." gaps.
pub fn parse_observations(body: &str) -> Result<Vec<Observation>> {
    let resp: ObservationsResponse = serde_json::from_str(body)?;
    let mut obs: Vec<Observation> = resp
        .observations
        .into_iter()
        .filter_map(|o| {
            let date = NaiveDate::parse_from_str(&o.date, "%Y-%m-%d").ok()?;
            let value = o.value.trim().parse::<f64>().ok()?;
            Some(Observation { date, value })
        })
        .collect();
    obs.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(obs)
}

/// Reduces a newest-first series to one reading, rounded to 0.1.
pub fn reading(obs: &[Observation], transform: Transform) -> Result<f64> {
    let latest = obs
        .first()
        .ok_or_else(|| SourceError::Empty("no observations".into()))?;
    let value = match transform {
        Transform::Level => latest.value,
        Transform::YearOnYear => {
            let year_ago = latest
                .date
                .with_year(latest.date.year() - 1)
                .ok_or_else(|| SourceError::Parse(format!("bad date {}", latest.date)))?;
            let base = obs
                .iter()
                .find(|o| o.date == year_ago)
                .filter(|o| o.value != 0.0)
                .ok_or_else(|| SourceError::Empty(format!("no observation for {}", year_ago)))?;
            (latest.value / base.value - 1.0) * 100.0
        }
    };
    Ok((value * 10.0).round() / 10.0)
}

/// Thin observations API wrapper shared by both FRED clients.
struct FredApi {
    http: Http,
    base: String,
    api_key: Option<String>,
}

impl FredApi {
    fn new(http: Http, base: &str, api_key: Option<String>) -> Self {
        FredApi {
            http,
            base: trim_base(base),
            api_key,
        }
    }

    async fn observations(&self, series_id: &str) -> Result<Vec<Observation>> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(SourceError::MissingCredential("FRED_API_KEY"))?;
        let url = format!(
            "{}/fred/series/observations?series_id={}&api_key={}&file_type=json&sort_order=desc&limit=13",
            self.base,
            series_id,
            encode_component(key)
        );
        let text = self.http.get_text("FRED", &url, "application/json").await?;
        parse_observations(&text)
    }

    async fn reading(&self, series_id: &str, transform: Transform) -> Result<f64> {
        let obs = self.observations(series_id).await?;
        reading(&obs, transform)
    }
}

/// US CPI, unemployment and core PCE.
pub struct FredUsMacroClient {
    api: FredApi,
}

impl FredUsMacroClient {
    pub fn new(http: Http, base: &str, api_key: Option<String>) -> Self {
        FredUsMacroClient {
            api: FredApi::new(http, base, api_key),
        }
    }
}

#[async_trait]
impl SourceClient for FredUsMacroClient {
    fn name(&self) -> &'static str {
        "FRED US"
    }

    fn domain(&self) -> DataDomain {
        DataDomain::UsMacro
    }

    fn credential(&self) -> Option<Credential> {
        Some(Credential::Fred)
    }

    async fn fetch(&self) -> Result<Patch> {
        if self.api.api_key.is_none() {
            return Err(SourceError::MissingCredential("FRED_API_KEY"));
        }
        let results = join_all(US_SERIES.iter().map(|(_, id, t)| self.api.reading(id, *t))).await;

        let mut patch = Patch::default();
        for ((key, id, _), result) in US_SERIES.iter().zip(results) {
            match result {
                Ok(v) => {
                    patch.us_macro.insert(key.to_string(), v);
                }
                Err(e) => {
                    error!("[FRED] {} failed: {}", id, e);
                    patch.errors.insert(key.to_string(), e.to_string());
                }
            }
        }
        if patch.us_macro.is_empty() {
            return Err(SourceError::Empty("no US macro series".into()));
        }
        info!("[FRED] US macro: {:?}", patch.us_macro);
        Ok(patch)
    }
}

/// CPI and unemployment for the non-USD majors.
pub struct FredIntlMacroClient {
    api: FredApi,
}

impl FredIntlMacroClient {
    pub fn new(http: Http, base: &str, api_key: Option<String>) -> Self {
        FredIntlMacroClient {
            api: FredApi::new(http, base, api_key),
        }
    }

    async fn fetch_currency(&self, cpi_id: &str, unemp_id: &str) -> (Result<f64>, Result<f64>) {
        tokio::join!(
            self.api.reading(cpi_id, Transform::Level),
            self.api.reading(unemp_id, Transform::Level)
        )
    }
}

#[async_trait]
impl SourceClient for FredIntlMacroClient {
    fn name(&self) -> &'static str {
        "FRED Intl"
    }

    fn domain(&self) -> DataDomain {
        DataDomain::IntlMacro
    }

    fn credential(&self) -> Option<Credential> {
        Some(Credential::Fred)
    }

    async fn fetch(&self) -> Result<Patch> {
        if self.api.api_key.is_none() {
            return Err(SourceError::MissingCredential("FRED_API_KEY"));
        }
        let results = join_all(
            INTL_SERIES
                .iter()
                .map(|(_, cpi, unemp)| self.fetch_currency(cpi, unemp)),
        )
        .await;

        let mut patch = Patch::default();
        for ((ccy, _, _), (cpi, unemp)) in INTL_SERIES.iter().zip(results) {
            let mut reading = IntlMacro::default();
            match cpi {
                Ok(v) => reading.cpi = Some(v),
                Err(e) => {
                    patch.errors.insert(format!("{} cpi", ccy), e.to_string());
                }
            }
            match unemp {
                Ok(v) => reading.unemployment = Some(v),
                Err(e) => {
                    patch.errors.insert(format!("{} unemployment", ccy), e.to_string());
                }
            }
            if reading.cpi.is_some() || reading.unemployment.is_some() {
                patch.intl_macro.insert(ccy.to_string(), reading);
            } else {
                error!("[FRED] no macro readings for {}", ccy);
            }
        }
        if patch.intl_macro.is_empty() {
            return Err(SourceError::Empty("no international macro series".into()));
        }
        info!("[FRED] intl macro for {} currencies", patch.intl_macro.len());
        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const CPI: &str = r#"{"observations":[
        {"date":"2026-01-01","value":"320.0"},
        {"date":"2025-12-01","value":"."},
        {"date":"2025-01-01","value":"311.0"}
    ]}"#;

    #[test]
    fn test_year_on_year_matches_same_month() {
        let obs = parse_observations(CPI).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(reading(&obs, Transform::YearOnYear).unwrap(), 2.9);
        assert_eq!(reading(&obs, Transform::Level).unwrap(), 320.0);
    }

    #[test]
    fn test_year_on_year_needs_base_month() {
        let obs = parse_observations(r#"{"observations":[{"date":"2026-01-01","value":"320.0"}]}"#).unwrap();
        assert!(reading(&obs, Transform::YearOnYear).is_err());
    }

    #[tokio::test]
    async fn test_missing_key_is_a_credential_error() {
        let client = FredUsMacroClient::new(Http::new(Duration::from_secs(5)).unwrap(), "http://127.0.0.1:9", None);
        let err = client.fetch().await.unwrap_err();
        assert!(matches!(err, SourceError::MissingCredential(_)));
    }

    #[tokio::test]
    async fn test_us_series_with_one_failure_is_partial() {
        let mut server = mockito::Server::new_async().await;
        let _cpi = server
            .mock("GET", "/fred/series/observations")
            .match_query(mockito::Matcher::UrlEncoded("series_id".into(), "CPIAUCSL".into()))
            .with_body(CPI)
            .create_async()
            .await;
        let _unrate = server
            .mock("GET", "/fred/series/observations")
            .match_query(mockito::Matcher::UrlEncoded("series_id".into(), "UNRATE".into()))
            .with_body(r#"{"observations":[{"date":"2026-01-01","value":"4.1"}]}"#)
            .create_async()
            .await;
        let _pce = server
            .mock("GET", "/fred/series/observations")
            .match_query(mockito::Matcher::UrlEncoded("series_id".into(), "PCEPILFE".into()))
            .with_status(500)
            .create_async()
            .await;

        let client = FredUsMacroClient::new(
            Http::new(Duration::from_secs(5)).unwrap(),
            &server.url(),
            Some("k".into()),
        );
        let patch = client.fetch().await.unwrap();
        assert_eq!(patch.us_macro["cpi"], 2.9);
        assert_eq!(patch.us_macro["unemployment"], 4.1);
        assert!(patch.errors.contains_key("corePce"));
    }
}

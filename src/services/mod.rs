// src/services/mod.rs
pub mod ai;
pub mod atr;
pub mod briefs;
pub mod calendar;
pub mod cb_rates;
pub mod cot;
pub mod fred;
pub mod fx;
pub mod http;
pub mod markets;
pub mod news;
pub mod treasury;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{Credential, Settings};
use crate::error::Result;
use crate::models::{DataDomain, Patch};

use http::Http;

/// One external provider, producing one patch per run.
///
/// Clients never retry and never touch shared state; the orchestrator applies
/// whatever they return.
#[async_trait]
pub trait SourceClient: Send + Sync {
    fn name(&self) -> &'static str;

    /// Domain whose freshness tag a successful run earns.
    fn domain(&self) -> DataDomain;

    /// Credential the client needs; `None` means always eligible.
    fn credential(&self) -> Option<Credential> {
        None
    }

    async fn fetch(&self) -> Result<Patch>;
}

/// Every client the dashboard knows about, eligible or not.
pub fn default_clients(settings: &Settings) -> Result<Vec<Arc<dyn SourceClient>>> {
    let http = Http::new(settings.request_timeout)?;
    let ep = &settings.endpoints;

    let clients: Vec<Arc<dyn SourceClient>> = vec![
        Arc::new(fx::FrankfurterClient::new(http.clone(), &ep.frankfurter)),
        Arc::new(treasury::TreasuryClient::new(http.clone(), &ep.treasury)),
        Arc::new(cb_rates::CbRatesClient::new(http.clone(), &ep.ecb, &ep.boc, &ep.snb)),
        Arc::new(markets::YahooMarketsClient::new(http.clone(), &ep.yahoo)),
        Arc::new(cot::CftcCotClient::new(http.clone(), &ep.cftc)),
        Arc::new(atr::YahooAtrClient::new(http.clone(), &ep.yahoo)),
        Arc::new(calendar::ForexFactoryClient::new(
            http.clone(),
            &ep.forex_factory,
            settings.display_tz,
        )),
        Arc::new(news::RssNewsClient::new(
            http.clone(),
            news::default_feeds(ep),
        )),
        Arc::new(fred::FredUsMacroClient::new(
            http.clone(),
            &ep.fred,
            settings.fred_api_key.clone(),
        )),
        Arc::new(fred::FredIntlMacroClient::new(
            http,
            &ep.fred,
            settings.fred_api_key.clone(),
        )),
    ];
    Ok(clients)
}

/// Base URL without a trailing slash.
pub(crate) fn trim_base(base: &str) -> String {
    base.trim_end_matches('/').to_string()
}

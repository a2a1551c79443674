// src/app.rs
//
// Everything a request handler needs, built once at startup.
use log::{info, warn};
use std::sync::Arc;

use crate::baseline::Baseline;
use crate::cache::storage::KeyValueStore;
use crate::cache::{ContentKind, Enricher, Enrichment, EnrichmentCache};
use crate::config::{Clock, Settings};
use crate::error::Result;
use crate::merge::currency::interest_rate;
use crate::merge::Enrichments;
use crate::orchestrator::FetchOrchestrator;
use crate::services::ai::{AiRelay, AiRelayClient};
use crate::services::briefs::{
    CalendarTriggerRequest, CurrencyBriefRequest, GlobalBriefRequest, MatrixRequest,
};
use crate::services::http::Http;
use crate::services::{default_clients, SourceClient};
use crate::store::{LiveState, LiveStore};

pub struct AppContext {
    pub settings: Arc<Settings>,
    pub baseline: Arc<Baseline>,
    pub store: Arc<LiveStore>,
    pub orchestrator: Arc<FetchOrchestrator>,
    /// `None` when no AI relay is configured; AI sections then stay on the baseline.
    pub enricher: Option<Arc<Enricher>>,
    pub clock: Arc<dyn Clock>,
}

impl AppContext {
    /// Wires the default source clients and, when configured, the AI relay.
    pub fn build(
        settings: Settings,
        baseline: Baseline,
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let clients = default_clients(&settings)?;
        let relay: Option<Arc<dyn AiRelay>> = match &settings.ai_relay_url {
            Some(url) => {
                let http = Http::new(settings.request_timeout)?;
                Some(Arc::new(AiRelayClient::new(http, url.clone(), settings.ai_model.clone())))
            }
            None => {
                warn!("AI_RELAY_URL not set, AI sections will show baseline content");
                None
            }
        };
        Ok(Self::with_parts(settings, baseline, storage, clock, clients, relay))
    }

    pub fn with_parts(
        settings: Settings,
        baseline: Baseline,
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        clients: Vec<Arc<dyn SourceClient>>,
        relay: Option<Arc<dyn AiRelay>>,
    ) -> Self {
        let settings = Arc::new(settings);
        let store = Arc::new(LiveStore::new(clock.clone(), storage.clone()));
        let orchestrator = Arc::new(FetchOrchestrator::new(
            clients,
            settings.clone(),
            store.clone(),
        ));
        let enricher = relay.map(|relay| {
            let cache = EnrichmentCache::new(storage, clock.clone());
            Arc::new(Enricher::new(relay, cache, clock.clone()))
        });

        AppContext {
            settings,
            baseline: Arc::new(baseline),
            store,
            orchestrator,
            enricher,
            clock,
        }
    }

    /// Starts a fetch cycle in the background unless one is already running.
    pub fn spawn_fetch(&self) -> bool {
        if !self.store.try_begin_cycle() {
            info!("[Fetch] cycle already running, refresh ignored");
            return false;
        }
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            orchestrator.fetch_all().await;
        });
        true
    }

    /// Session-level AI content: global brief and matrix classification.
    pub fn spawn_session_briefs(&self) {
        if let Some(enricher) = &self.enricher {
            let today = self.clock.now().date_naive();
            enricher.spawn_enrich(GlobalBriefRequest { today });
            enricher.spawn_enrich(MatrixRequest::from_baseline(&self.baseline));
        }
    }

    /// Current AI content for a currency view. Anything not yet trusted is
    /// requested in the background and shows as loading until it lands.
    pub fn enrichments(&self, ccy: &str, state: &LiveState) -> Enrichments {
        let enricher = match &self.enricher {
            Some(e) => e,
            None => return Enrichments::default(),
        };
        let today = self.clock.now().date_naive();
        let mut out = Enrichments::default();

        let rate = interest_rate(ccy, &self.baseline, state).v;
        let cot = state.cot.get(ccy).copied();
        if let Some(kind) = CurrencyBriefRequest::new(&self.baseline, ccy, &rate, cot, today) {
            out.brief = current_or_spawn(enricher, kind);
        }
        out.global = current_or_spawn(enricher, GlobalBriefRequest { today });
        out.matrix = current_or_spawn(enricher, MatrixRequest::from_baseline(&self.baseline));

        let events = state.calendar.get(ccy).map(Vec::as_slice).unwrap_or(&[]);
        if let Some(kind) = CalendarTriggerRequest::for_events(ccy, events) {
            out.triggers = current_or_spawn(enricher, kind);
        }

        out
    }
}

/// A failed call is not retried until a manual refresh, or for unpersisted
/// kinds until their inputs change.
fn current_or_spawn<K: ContentKind>(enricher: &Arc<Enricher>, kind: K) -> Enrichment<K::Payload> {
    let mut current = enricher.current(&kind);
    if current.payload.is_none() && !current.loading && current.error.is_none() {
        enricher.spawn_enrich(kind);
        current.loading = true;
    }
    current
}

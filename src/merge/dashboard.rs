// src/merge/dashboard.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::currency::{currency_view, CurrencyView};
use super::execution::{atr_table, AtrView};
use super::markets::{fx_spot, gauges, FxView, GaugeView};
use super::sections::{
    calendar_view, global_view, matrix_view, news_view, CalendarView, GlobalView, MatrixView,
    NewsView,
};
use super::yields::{yields_view, YieldsView};
use crate::baseline::Baseline;
use crate::cache::Enrichment;
use crate::models::{DataDomain, FetchPhase, FreshnessTag};
use crate::services::briefs::{CurrencyBrief, GlobalBrief, MatrixClassification, TriggerMap};
use crate::store::LiveState;

/// Current enrichment for each AI content kind the dashboard shows.
#[derive(Debug, Clone, Default)]
pub struct Enrichments {
    pub brief: Enrichment<CurrencyBrief>,
    pub global: Enrichment<GlobalBrief>,
    pub matrix: Enrichment<MatrixClassification>,
    pub triggers: Enrichment<TriggerMap>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketsView {
    pub yields: YieldsView,
    pub gauges: Vec<GaugeView>,
    pub fx: Vec<FxView>,
    pub atr: Vec<AtrView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub currency: CurrencyView,
    pub markets: MarketsView,
    pub calendar: CalendarView,
    pub news: NewsView,
    pub global: GlobalView,
    pub matrix: MatrixView,
    pub status: BTreeMap<DataDomain, FreshnessTag>,
    pub fetch_phase: FetchPhase,
    pub last_fetch: Option<DateTime<Utc>>,
    pub baseline_reviewed: String,
}

pub fn build_markets(baseline: &Baseline, state: &LiveState) -> MarketsView {
    MarketsView {
        yields: yields_view(baseline, state),
        gauges: gauges(baseline, state),
        fx: fx_spot(baseline, state),
        atr: atr_table(baseline, state),
    }
}

/// Effective tag of every domain, overrides included.
pub fn domain_status(state: &LiveState) -> BTreeMap<DataDomain, FreshnessTag> {
    DataDomain::ALL.iter().map(|d| (*d, state.tag(*d))).collect()
}

/// The whole view for one currency; `None` when the currency is unknown.
pub fn build_dashboard(
    ccy: &str,
    baseline: &Baseline,
    state: &LiveState,
    enrichments: &Enrichments,
    now: DateTime<Utc>,
) -> Option<DashboardView> {
    let currency = currency_view(ccy, baseline, state, &enrichments.brief)?;
    Some(DashboardView {
        currency,
        markets: build_markets(baseline, state),
        calendar: calendar_view(ccy, state, &enrichments.triggers),
        news: news_view(ccy, state, now),
        global: global_view(baseline, &enrichments.global),
        matrix: matrix_view(baseline, &enrichments.matrix),
        status: domain_status(state),
        fetch_phase: state.fetch_phase,
        last_fetch: state.last_fetch,
        baseline_reviewed: baseline.reviewed.clone(),
    })
}

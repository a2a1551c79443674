// src/merge/sections.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::format::time_ago;
use super::PLACEHOLDER;
use crate::baseline::{Baseline, GeoItem, RiskEnvironment};
use crate::cache::Enrichment;
use crate::models::{CalendarEvent, DataDomain, FreshnessTag, NewsArticle};
use crate::services::briefs::{GlobalBrief, MatrixClassification, TriggerHint, TriggerMap};
use crate::store::LiveState;

const NEWS_PER_CURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarRow {
    #[serde(flatten)]
    pub event: CalendarEvent,
    pub trigger: Option<TriggerHint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarView {
    pub events: Vec<CalendarRow>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub src: FreshnessTag,
    pub triggers_src: FreshnessTag,
    pub triggers_loading: bool,
    pub triggers_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsRow {
    #[serde(flatten)]
    pub article: NewsArticle,
    pub time_ago: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsView {
    pub articles: Vec<NewsRow>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub src: FreshnessTag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalView {
    pub risk_environment: RiskEnvironment,
    pub geo_items: Vec<GeoItem>,
    pub carry_commentary: Option<String>,
    pub key_facts: Vec<String>,
    pub generated_at: Option<DateTime<Utc>>,
    pub src: FreshnessTag,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRow {
    pub risk_type: String,
    pub commodity_exposure: String,
    pub src: FreshnessTag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixView {
    pub rows: BTreeMap<String, MatrixRow>,
    pub src: FreshnessTag,
    pub loading: bool,
    pub error: Option<String>,
}

/// Live events for a currency with AI triggers attached by event name.
///
/// Without a live calendar there is nothing to show; the baseline has no events.
pub fn calendar_view(ccy: &str, state: &LiveState, triggers: &Enrichment<TriggerMap>) -> CalendarView {
    let tag = state.fetch_tag(DataDomain::Calendar);
    let live = state.calendar.get(ccy).filter(|_| tag.is_live());
    let hints = triggers.payload.as_ref();

    let events: Vec<CalendarRow> = live
        .map(|events| {
            events
                .iter()
                .map(|e| CalendarRow {
                    trigger: if e.wants_trigger() {
                        hints.and_then(|h| h.get(&e.event)).cloned()
                    } else {
                        None
                    },
                    event: e.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    CalendarView {
        src: if live.is_some() { tag } else { FreshnessTag::Stale },
        fetched_at: live.and(state.calendar_fetched_at),
        events,
        triggers_src: triggers.tag,
        triggers_loading: triggers.loading,
        triggers_error: triggers.error.clone(),
    }
}

pub fn news_view(ccy: &str, state: &LiveState, now: DateTime<Utc>) -> NewsView {
    let tag = state.fetch_tag(DataDomain::News);
    let live = state.news.get(ccy).filter(|_| tag.is_live());
    let articles = live
        .map(|items| {
            items
                .iter()
                .take(NEWS_PER_CURRENCY)
                .map(|a| NewsRow {
                    time_ago: time_ago(a.published_at, now),
                    article: a.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    NewsView {
        articles,
        fetched_at: live.and(state.news_fetched_at),
        src: if live.is_some() { tag } else { FreshnessTag::Stale },
    }
}

/// Global AI brief, or the reviewed risk environment with no geo items.
pub fn global_view(baseline: &Baseline, brief: &Enrichment<GlobalBrief>) -> GlobalView {
    match brief.sourced() {
        Some((b, tag)) => GlobalView {
            risk_environment: b.risk_environment.clone(),
            geo_items: b.geo_items.clone(),
            carry_commentary: b.carry_commentary.clone(),
            key_facts: b.key_facts.clone(),
            generated_at: brief.generated_at,
            src: tag,
            loading: brief.loading,
            error: brief.error.clone(),
        },
        None => GlobalView {
            risk_environment: baseline.risk_environment.clone(),
            geo_items: Vec::new(),
            carry_commentary: None,
            key_facts: Vec::new(),
            generated_at: None,
            src: FreshnessTag::Stale,
            loading: brief.loading,
            error: brief.error.clone(),
        },
    }
}

/// Risk type and commodity exposure per currency; `—` where unclassified.
pub fn matrix_view(baseline: &Baseline, matrix: &Enrichment<MatrixClassification>) -> MatrixView {
    let sourced = matrix.sourced();
    let rows = baseline
        .currencies
        .keys()
        .map(|ccy| {
            let row = match sourced.and_then(|(m, tag)| m.get(ccy).map(|e| (e, tag))) {
                Some((entry, tag)) => MatrixRow {
                    risk_type: entry.risk_type.clone(),
                    commodity_exposure: entry.commodity_exposure.clone(),
                    src: tag,
                },
                None => MatrixRow {
                    risk_type: PLACEHOLDER.to_string(),
                    commodity_exposure: PLACEHOLDER.to_string(),
                    src: FreshnessTag::Stale,
                },
            };
            (ccy.clone(), row)
        })
        .collect();

    MatrixView {
        rows,
        src: matrix.tag,
        loading: matrix.loading,
        error: matrix.error.clone(),
    }
}

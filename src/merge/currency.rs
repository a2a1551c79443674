// src/merge/currency.rs
use serde::Serialize;

use super::format::{direction, signed};
use super::{Field, Sources};
use crate::baseline::{
    parse_display_number, Baseline, CbSpeech, CurrencyProfile, GeoItem, PairThesis, PolicyBias,
    TriadReading,
};
use crate::cache::Enrichment;
use crate::models::{DataDomain, Direction, FreshnessTag};
use crate::services::briefs::CurrencyBrief;
use crate::store::LiveState;

const TOP_PAIRS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreView {
    pub total: i32,
    pub monetary: i32,
    pub growth: i32,
    pub inflation: i32,
    pub risk: i32,
    pub commodity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriadReadingView {
    pub label: String,
    pub v: String,
    pub c: String,
    pub d: Direction,
    pub src: FreshnessTag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriadView {
    pub inflation: Option<TriadReadingView>,
    pub employment: Option<TriadReadingView>,
    pub src: FreshnessTag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CotView {
    pub net: i64,
    pub prev: i64,
    /// Week-on-week change in percentage points.
    pub change: i64,
    pub label: String,
    pub detail: String,
    pub commentary: Option<String>,
    pub as_of: String,
    pub src: FreshnessTag,
}

/// A list section fed by an AI brief with a baseline fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub src: FreshnessTag,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopPair {
    pub ccy: String,
    pub pair: String,
    /// Absolute score divergence.
    pub spread: i32,
    pub thesis: PairThesis,
    pub src: FreshnessTag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyView {
    pub code: String,
    pub full: String,
    pub country: String,
    pub central_bank: String,
    pub interest_rate: Field,
    pub bias: PolicyBias,
    pub score: ScoreView,
    pub triad: TriadView,
    pub cot: Option<CotView>,
    pub speeches: Listing<CbSpeech>,
    pub geopolitical: Listing<GeoItem>,
    pub pair_theses: Listing<PairThesis>,
    pub top_pairs: Vec<TopPair>,
}

/// `monetary*2 + growth + inflation + risk + commodity`, monetary from the bias unless set.
pub fn score(profile: &CurrencyProfile) -> ScoreView {
    let s = &profile.score;
    let monetary = s.monetary.unwrap_or_else(|| profile.bias.monetary_score());
    ScoreView {
        total: monetary * 2 + s.growth + s.inflation + s.risk + s.commodity,
        monetary,
        growth: s.growth,
        inflation: s.inflation,
        risk: s.risk,
        commodity: s.commodity,
    }
}

/// CB rate: manual override, then live, then the reviewed baseline.
pub fn interest_rate(ccy: &str, baseline: &Baseline, state: &LiveState) -> Field {
    Sources {
        manual: state.overrides.cb_rates.get(ccy).cloned(),
        live: state
            .cb_rates
            .get(ccy)
            .map(|r| (r.clone(), state.fetch_tag(DataDomain::CbRates))),
        enriched: None,
        baseline: baseline.currency(ccy).map(|p| p.interest_rate.clone()),
    }
    .resolve()
    .into()
}

/// Replaces a triad headline with a live reading, rounded to 0.1.
fn merge_reading(base: &TriadReading, live: Option<f64>, tag: FreshnessTag) -> TriadReadingView {
    let prev = parse_display_number(&base.v);
    match (live.filter(|_| tag.is_live()), prev) {
        (Some(live), Some(prev)) => {
            let live = (live * 10.0).round() / 10.0;
            let chg = ((live - prev) * 10.0).round() / 10.0;
            TriadReadingView {
                label: base.label.clone(),
                v: format!("{}%", super::format::trim_number(live, 1)),
                c: signed(chg, 1, "%"),
                d: direction(chg),
                src: tag,
            }
        }
        _ => TriadReadingView {
            label: base.label.clone(),
            v: base.v.clone(),
            c: base.c.clone(),
            d: base.d,
            src: FreshnessTag::Stale,
        },
    }
}

pub fn triad(ccy: &str, profile: &CurrencyProfile, state: &LiveState) -> TriadView {
    let (cpi, unemployment, tag) = if ccy == "USD" {
        (
            state.us_macro.get("cpi").copied(),
            state.us_macro.get("unemployment").copied(),
            state.fetch_tag(DataDomain::UsMacro),
        )
    } else {
        let m = state.intl_macro.get(ccy).copied().unwrap_or_default();
        (m.cpi, m.unemployment, state.fetch_tag(DataDomain::IntlMacro))
    };

    let inflation = profile
        .triad
        .inflation
        .as_ref()
        .map(|b| merge_reading(b, cpi, tag));
    let employment = profile
        .triad
        .employment
        .as_ref()
        .map(|b| merge_reading(b, unemployment, tag));
    let src = inflation
        .iter()
        .chain(employment.iter())
        .map(|r| r.src)
        .max()
        .unwrap_or(FreshnessTag::Stale);
    TriadView {
        inflation,
        employment,
        src,
    }
}

pub fn cot(
    ccy: &str,
    baseline: &Baseline,
    state: &LiveState,
    brief: &Enrichment<CurrencyBrief>,
) -> Option<CotView> {
    let base = baseline.cot.get(ccy);
    let resolved = Sources {
        live: state
            .cot
            .get(ccy)
            .map(|p| (*p, state.fetch_tag(DataDomain::Cot))),
        baseline: base.map(|b| crate::models::CotPosition {
            net: b.net,
            prev: b.prev,
        }),
        ..Sources::default()
    }
    .resolve()?;

    let as_of = if resolved.tag.is_live() {
        state.cot_as_of.clone()
    } else {
        None
    }
    .unwrap_or_else(|| baseline.cot_as_of.clone());

    Some(CotView {
        net: resolved.value.net,
        prev: resolved.value.prev,
        change: resolved.value.net - resolved.value.prev,
        label: base.map(|b| b.label.clone()).unwrap_or_else(|| ccy.to_string()),
        detail: base.map(|b| b.detail.clone()).unwrap_or_default(),
        commentary: brief
            .payload
            .as_ref()
            .and_then(|b| b.cot_commentary.clone())
            .filter(|c| !c.trim().is_empty()),
        as_of,
        src: resolved.tag,
    })
}

/// AI list when it has items, otherwise the baseline list.
fn listing<T: Clone>(
    enriched: Option<(&Vec<T>, FreshnessTag)>,
    baseline: &[T],
    brief: &Enrichment<CurrencyBrief>,
) -> Listing<T> {
    let (items, src) = match enriched.filter(|(items, _)| !items.is_empty()) {
        Some((items, tag)) => (items.clone(), tag),
        None => (baseline.to_vec(), FreshnessTag::Stale),
    };
    Listing {
        items,
        src,
        loading: brief.loading,
        error: brief.error.clone(),
    }
}

/// Baseline theses for the currencies whose scores diverge most from `ccy`.
pub fn top_pairs(ccy: &str, baseline: &Baseline) -> Vec<TopPair> {
    let own = match baseline.currency(ccy) {
        Some(p) => score(p).total,
        None => return Vec::new(),
    };
    let mut pairs: Vec<TopPair> = baseline
        .currencies
        .iter()
        .filter(|(other, _)| other.as_str() != ccy)
        .filter_map(|(other, profile)| {
            let (pair, thesis) = baseline.pair_thesis(ccy, other)?;
            Some(TopPair {
                ccy: other.clone(),
                pair: pair.to_string(),
                spread: (own - score(profile).total).abs(),
                thesis: thesis.clone(),
                // both scores come from the reviewed baseline
                src: FreshnessTag::Stale,
            })
        })
        .collect();
    pairs.sort_by(|a, b| b.spread.cmp(&a.spread));
    pairs.truncate(TOP_PAIRS);
    pairs
}

pub fn currency_view(
    ccy: &str,
    baseline: &Baseline,
    state: &LiveState,
    brief: &Enrichment<CurrencyBrief>,
) -> Option<CurrencyView> {
    let profile = baseline.currency(ccy)?;
    let payload = brief.sourced();

    let baseline_theses: Vec<PairThesis> = top_pairs(ccy, baseline)
        .into_iter()
        .map(|p| PairThesis {
            pair: Some(p.pair),
            ..p.thesis
        })
        .collect();

    Some(CurrencyView {
        code: ccy.to_string(),
        full: profile.full.clone(),
        country: profile.country.clone(),
        central_bank: profile.central_bank.clone(),
        interest_rate: interest_rate(ccy, baseline, state),
        bias: profile.bias,
        score: score(profile),
        triad: triad(ccy, profile, state),
        cot: cot(ccy, baseline, state, brief),
        speeches: listing(payload.map(|(b, t)| (&b.cb_speeches, t)), &profile.speeches, brief),
        geopolitical: listing(
            payload.map(|(b, t)| (&b.geopolitical, t)),
            &profile.geopolitical,
            brief,
        ),
        pair_theses: listing(payload.map(|(b, t)| (&b.pair_thesis, t)), &baseline_theses, brief),
        top_pairs: top_pairs(ccy, baseline),
    })
}

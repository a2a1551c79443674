// src/merge/markets.rs
use serde::Serialize;

use super::format::{direction, signed, signed_money, thousands};
use super::{Sources, PLACEHOLDER};
use crate::baseline::Baseline;
use crate::models::{DataDomain, Direction, FreshnessTag, MarketQuote};
use crate::store::LiveState;

/// Display order of the gauges.
pub const GAUGES: [&str; 7] = ["vix", "dxy", "spx", "xau", "wti", "copper", "silver"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeView {
    pub key: String,
    pub label: String,
    pub v: String,
    pub chg: String,
    pub dir: Direction,
    pub signal: String,
    pub note: String,
    pub src: FreshnessTag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FxView {
    pub pair: String,
    pub rate: Option<f64>,
    pub v: String,
    pub src: FreshnessTag,
}

fn default_label(key: &str) -> &'static str {
    match key {
        "vix" => "VIX",
        "dxy" => "DXY",
        "spx" => "S&P 500",
        "xau" => "Gold",
        "wti" => "WTI Crude",
        "copper" => "Copper",
        "silver" => "Silver",
        _ => "",
    }
}

/// Price and change strings in each gauge's own convention.
pub fn format_quote(key: &str, q: &MarketQuote) -> (String, String) {
    match key {
        "spx" => (
            thousands(q.price.round() as i64),
            signed(q.change.round(), 0, ""),
        ),
        "xau" => (
            format!("${}", thousands(q.price.round() as i64)),
            signed_money(q.change, 0),
        ),
        "wti" | "silver" => (format!("${:.2}", q.price), signed_money(q.change, 2)),
        "copper" => (format!("${:.2}/lb", q.price), signed_money(q.change, 2)),
        _ => (format!("{:.1}", q.price), signed(q.change, 1, "")),
    }
}

pub fn gauge_view(key: &str, baseline: &Baseline, state: &LiveState) -> Option<GaugeView> {
    let base = baseline.markets.get(key);
    let resolved = Sources {
        live: state
            .markets
            .get(key)
            .map(|q| (q, state.fetch_tag(DataDomain::Markets))),
        ..Sources::default()
    }
    .resolve();

    let (label, signal, note) = match base {
        Some(b) => (b.label.clone(), b.signal.clone(), b.note.clone()),
        None => (default_label(key).to_string(), PLACEHOLDER.to_string(), String::new()),
    };

    match (resolved, base) {
        (Some(r), _) => {
            let (v, chg) = format_quote(key, r.value);
            Some(GaugeView {
                key: key.to_string(),
                label,
                v,
                chg,
                dir: direction(r.value.change),
                signal,
                note,
                src: r.tag,
            })
        }
        (None, Some(b)) => Some(GaugeView {
            key: key.to_string(),
            label,
            v: b.v.clone(),
            chg: b.chg.clone(),
            dir: b.dir,
            signal,
            note,
            src: FreshnessTag::Stale,
        }),
        (None, None) => None,
    }
}

pub fn gauges(baseline: &Baseline, state: &LiveState) -> Vec<GaugeView> {
    GAUGES
        .iter()
        .filter_map(|key| gauge_view(key, baseline, state))
        .collect()
}

fn format_rate(pair: &str, rate: f64) -> String {
    if pair.contains("JPY") {
        format!("{:.2}", rate)
    } else {
        format!("{:.4}", rate)
    }
}

/// Spot rates for every pair known live or in the baseline.
pub fn fx_spot(baseline: &Baseline, state: &LiveState) -> Vec<FxView> {
    let mut pairs: Vec<&String> = baseline.fx.keys().chain(state.fx.keys()).collect();
    pairs.sort();
    pairs.dedup();

    pairs
        .into_iter()
        .map(|pair| {
            let resolved = Sources {
                live: state
                    .fx
                    .get(pair)
                    .map(|r| (*r, state.fetch_tag(DataDomain::Fx))),
                baseline: baseline.fx.get(pair).copied(),
                ..Sources::default()
            }
            .resolve();
            match resolved {
                Some(r) => FxView {
                    pair: pair.clone(),
                    rate: Some(r.value),
                    v: format_rate(pair, r.value),
                    src: r.tag,
                },
                None => FxView {
                    pair: pair.clone(),
                    rate: None,
                    v: PLACEHOLDER.to_string(),
                    src: FreshnessTag::Stale,
                },
            }
        })
        .collect()
}

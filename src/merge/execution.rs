// src/merge/execution.rs
use serde::{Deserialize, Serialize};

use super::{weakest_link, Resolved, Sources};
use crate::baseline::Baseline;
use crate::models::{AtrReading, DataDomain, FreshnessTag};
use crate::store::LiveState;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionInput {
    pub pair: String,
    pub account: f64,
    /// Percent of the account risked on the trade.
    pub risk_pct: f64,
    pub stop_pips: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskRating {
    Conservative,
    Moderate,
    Aggressive,
}

impl RiskRating {
    pub fn from_pct(risk_pct: f64) -> Self {
        if risk_pct <= 1.0 {
            RiskRating::Conservative
        } else if risk_pct <= 2.0 {
            RiskRating::Moderate
        } else {
            RiskRating::Aggressive
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtrView {
    pub pair: String,
    #[serde(flatten)]
    pub reading: AtrReading,
    pub src: FreshnessTag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionPlan {
    pub risk_amount: f64,
    pub lots: f64,
    pub mini_lots: f64,
    /// 1.25x ATR, or the entered stop when no ATR is known.
    pub suggested_stop: u32,
    pub stop_ok: bool,
    pub rating: RiskRating,
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub atr: Option<AtrView>,
    pub src: FreshnessTag,
}

pub fn resolve_atr(pair: &str, baseline: &Baseline, state: &LiveState) -> Option<Resolved<AtrReading>> {
    Sources {
        live: state
            .atr
            .get(pair)
            .map(|a| (*a, state.fetch_tag(DataDomain::Atr))),
        baseline: baseline.atr.get(pair).copied(),
        ..Sources::default()
    }
    .resolve()
}

/// ATR table for every pair known live or in the baseline.
pub fn atr_table(baseline: &Baseline, state: &LiveState) -> Vec<AtrView> {
    let mut pairs: Vec<&String> = baseline.atr.keys().chain(state.atr.keys()).collect();
    pairs.sort();
    pairs.dedup();
    pairs
        .into_iter()
        .filter_map(|pair| {
            resolve_atr(pair, baseline, state).map(|r| AtrView {
                pair: pair.clone(),
                reading: r.value,
                src: r.tag,
            })
        })
        .collect()
}

/// Position size for a fixed-risk trade with a 10 USD/pip standard lot.
pub fn position_plan(input: &PositionInput, baseline: &Baseline, state: &LiveState) -> PositionPlan {
    let risk_amount = input.account * input.risk_pct / 100.0;
    let lots = if input.stop_pips > 0.0 {
        risk_amount / (input.stop_pips * 10.0)
    } else {
        0.0
    };
    let atr = resolve_atr(&input.pair, baseline, state);

    let (suggested_stop, stop_ok) = match &atr {
        Some(r) => (
            (r.value.atr as f64 * 1.25).round() as u32,
            input.stop_pips >= r.value.atr as f64,
        ),
        None => (input.stop_pips.max(0.0).round() as u32, true),
    };

    PositionPlan {
        risk_amount,
        lots,
        mini_lots: (lots * 10.0 * 10.0).round() / 10.0,
        suggested_stop,
        stop_ok,
        rating: RiskRating::from_pct(input.risk_pct),
        max_drawdown: risk_amount * 5.0,
        max_drawdown_pct: input.risk_pct * 5.0,
        src: weakest_link(atr.iter().map(|r| r.tag)),
        atr: atr.map(|r| AtrView {
            pair: input.pair.clone(),
            reading: r.value,
            src: r.tag,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VolLabel;

    fn input(pair: &str, risk_pct: f64, stop_pips: f64) -> PositionInput {
        PositionInput {
            pair: pair.into(),
            account: 10_000.0,
            risk_pct,
            stop_pips,
        }
    }

    #[test]
    fn test_sizing_from_baseline_atr() {
        let baseline = Baseline::bundled().unwrap();
        let plan = position_plan(&input("EUR/USD", 1.0, 80.0), &baseline, &LiveState::default());
        assert_eq!(plan.risk_amount, 100.0);
        assert_eq!(plan.lots, 0.125);
        assert_eq!(plan.mini_lots, 1.3);
        // baseline EUR/USD ATR is 68
        assert_eq!(plan.suggested_stop, 85);
        assert!(plan.stop_ok);
        assert_eq!(plan.rating, RiskRating::Conservative);
        assert_eq!(plan.max_drawdown, 500.0);
        assert_eq!(plan.src, FreshnessTag::Stale);
    }

    #[test]
    fn test_live_atr_drives_tag_and_stop_check() {
        let baseline = Baseline::bundled().unwrap();
        let mut state = LiveState::default();
        state.atr.insert(
            "GBP/JPY".into(),
            AtrReading {
                atr: 160,
                vol: VolLabel::High,
            },
        );
        state.status.insert(DataDomain::Atr, FreshnessTag::LivePartial);

        let plan = position_plan(&input("GBP/JPY", 2.5, 120.0), &baseline, &state);
        assert!(!plan.stop_ok);
        assert_eq!(plan.suggested_stop, 200);
        assert_eq!(plan.rating, RiskRating::Aggressive);
        assert_eq!(plan.src, FreshnessTag::LivePartial);
    }

    #[test]
    fn test_unknown_pair_keeps_entered_stop() {
        let baseline = Baseline::bundled().unwrap();
        let plan = position_plan(&input("EUR/NZD", 1.5, 90.0), &baseline, &LiveState::default());
        assert!(plan.atr.is_none());
        assert_eq!(plan.suggested_stop, 90);
        assert!(plan.stop_ok);
        assert_eq!(plan.rating, RiskRating::Moderate);
        assert_eq!(plan.src, FreshnessTag::Stale);
    }
}

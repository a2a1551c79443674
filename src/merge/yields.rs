// src/merge/yields.rs
use serde::Serialize;

use super::format::{signed, signed_fixed, up_down};
use super::{weakest_link, Resolved, Sources, PLACEHOLDER};
use crate::baseline::{parse_display_number, Baseline};
use crate::models::{DataDomain, Direction, FreshnessTag};
use crate::store::LiveState;

pub const TENORS: [&str; 4] = ["US2Y", "US5Y", "US10Y", "US30Y"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldView {
    pub v: String,
    pub chg: String,
    pub dir: Direction,
    pub interp: String,
    pub src: FreshnessTag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadView {
    pub v: String,
    pub direction: String,
    pub signal: String,
    pub note: String,
    pub src: FreshnessTag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealRateView {
    pub v: String,
    pub chg: String,
    pub dir: Direction,
    pub note: String,
    pub src: FreshnessTag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldsView {
    #[serde(rename = "US2Y")]
    pub us2y: YieldView,
    #[serde(rename = "US5Y")]
    pub us5y: YieldView,
    #[serde(rename = "US10Y")]
    pub us10y: YieldView,
    #[serde(rename = "US30Y")]
    pub us30y: YieldView,
    pub spread2s10s: SpreadView,
    pub real_rate10y: RealRateView,
}

/// Numeric yield for a tenor: manual override, then live, then baseline.
pub fn resolve_yield(tenor: &str, baseline: &Baseline, state: &LiveState) -> Option<Resolved<f64>> {
    Sources {
        manual: state.overrides.yields.get(tenor).copied(),
        live: state
            .yields
            .get(tenor)
            .map(|v| (*v, state.fetch_tag(DataDomain::Yields))),
        enriched: None,
        baseline: baseline
            .yields
            .get(tenor)
            .and_then(|b| parse_display_number(&b.v)),
    }
    .resolve()
}

pub fn yield_view(tenor: &str, baseline: &Baseline, state: &LiveState) -> YieldView {
    let base = baseline.yields.get(tenor);
    let resolved = resolve_yield(tenor, baseline, state);

    match (resolved, base) {
        (Some(r), Some(b)) if r.tag == FreshnessTag::Stale => YieldView {
            v: b.v.clone(),
            chg: b.chg.clone(),
            dir: b.dir,
            interp: b.interp.clone(),
            src: FreshnessTag::Stale,
        },
        (Some(r), base) => {
            let prev = base.and_then(|b| parse_display_number(&b.v));
            let (chg, dir) = match prev {
                Some(prev) => {
                    let delta = ((r.value - prev) * 100.0).round() / 100.0;
                    (signed(delta, 2, "%"), up_down(delta))
                }
                None => (PLACEHOLDER.to_string(), Direction::Flat),
            };
            YieldView {
                v: format!("{:.2}%", r.value),
                chg,
                interp: match dir {
                    Direction::Up => "hawk",
                    Direction::Down => "dove",
                    Direction::Flat => PLACEHOLDER,
                }
                .to_string(),
                dir,
                src: r.tag,
            }
        }
        (None, _) => YieldView {
            v: PLACEHOLDER.to_string(),
            chg: PLACEHOLDER.to_string(),
            dir: Direction::Flat,
            interp: PLACEHOLDER.to_string(),
            src: FreshnessTag::Stale,
        },
    }
}

/// 10Y minus 2Y in basis points, tagged by the weaker of its two inputs.
pub fn spread_view(baseline: &Baseline, state: &LiveState) -> SpreadView {
    let base = &baseline.spread2s10s;
    let t10 = resolve_yield("US10Y", baseline, state);
    let t2 = resolve_yield("US2Y", baseline, state);

    let (t10, t2) = match (t10, t2) {
        (Some(t10), Some(t2)) => (t10, t2),
        _ => {
            return SpreadView {
                v: PLACEHOLDER.to_string(),
                direction: PLACEHOLDER.to_string(),
                signal: PLACEHOLDER.to_string(),
                note: base.note.clone(),
                src: FreshnessTag::Stale,
            }
        }
    };
    let src = weakest_link([t10.tag, t2.tag]);
    if t10.tag == FreshnessTag::Stale && t2.tag == FreshnessTag::Stale {
        return SpreadView {
            v: base.v.clone(),
            direction: base.direction.clone(),
            signal: base.signal.clone(),
            note: base.note.clone(),
            src,
        };
    }

    let bp = ((t10.value - t2.value) * 100.0).round();
    let normal = t10.value > t2.value;
    SpreadView {
        v: signed(bp, 0, "bp"),
        direction: if normal { "Normal" } else { "Inverted" }.to_string(),
        signal: if normal { "norm" } else { "inv" }.to_string(),
        note: base.note.clone(),
        src,
    }
}

/// Nominal 10Y minus US CPI y/y.
pub fn real_rate_view(baseline: &Baseline, state: &LiveState) -> RealRateView {
    let base = &baseline.real_rate10y;
    let nominal = resolve_yield("US10Y", baseline, state);
    let cpi = Sources {
        live: state
            .us_macro
            .get("cpi")
            .map(|v| (*v, state.fetch_tag(DataDomain::UsMacro))),
        baseline: baseline.us_macro.get("cpi").copied(),
        ..Sources::default()
    }
    .resolve();

    let (nominal, cpi) = match (nominal, cpi) {
        (Some(n), Some(c)) => (n, c),
        _ => {
            return RealRateView {
                v: PLACEHOLDER.to_string(),
                chg: PLACEHOLDER.to_string(),
                dir: Direction::Flat,
                note: base.note.clone(),
                src: FreshnessTag::Stale,
            }
        }
    };
    let src = weakest_link([nominal.tag, cpi.tag]);
    if nominal.tag == FreshnessTag::Stale && cpi.tag == FreshnessTag::Stale {
        return RealRateView {
            v: base.v.clone(),
            chg: base.chg.clone(),
            dir: base.dir,
            note: base.note.clone(),
            src,
        };
    }

    let real = nominal.value - cpi.value;
    let (chg, dir) = match parse_display_number(&base.v) {
        Some(prev) => (signed(real - prev, 2, "%"), up_down(real - prev)),
        None => (PLACEHOLDER.to_string(), Direction::Flat),
    };
    RealRateView {
        v: signed_fixed(real, 2, "%"),
        chg,
        dir,
        note: base.note.clone(),
        src,
    }
}

pub fn yields_view(baseline: &Baseline, state: &LiveState) -> YieldsView {
    YieldsView {
        us2y: yield_view("US2Y", baseline, state),
        us5y: yield_view("US5Y", baseline, state),
        us10y: yield_view("US10Y", baseline, state),
        us30y: yield_view("US30Y", baseline, state),
        spread2s10s: spread_view(baseline, state),
        real_rate10y: real_rate_view(baseline, state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_state(yields: &[(&str, f64)], tag: FreshnessTag) -> LiveState {
        let mut state = LiveState::default();
        for (k, v) in yields {
            state.yields.insert(k.to_string(), *v);
        }
        state.status.insert(DataDomain::Yields, tag);
        state
    }

    #[test]
    fn test_live_ten_year_over_baseline() {
        let baseline = Baseline::bundled().unwrap();
        let state = live_state(&[("US10Y", 4.50)], FreshnessTag::Live);
        let view = yield_view("US10Y", &baseline, &state);
        assert_eq!(view.v, "4.50%");
        assert_eq!(view.chg, "+0.08%");
        assert_eq!(view.dir, Direction::Up);
        assert_eq!(view.interp, "hawk");
        assert_eq!(view.src, FreshnessTag::Live);
    }

    #[test]
    fn test_no_live_yields_stays_on_baseline() {
        let baseline = Baseline::bundled().unwrap();
        let view = yield_view("US10Y", &baseline, &LiveState::default());
        assert_eq!(view.v, "4.42%");
        assert_eq!(view.src, FreshnessTag::Stale);

        let real = real_rate_view(&baseline, &LiveState::default());
        assert_eq!(real.v, baseline.real_rate10y.v);
        assert_eq!(real.src, FreshnessTag::Stale);
    }

    #[test]
    fn test_manual_yield_override_wins() {
        let baseline = Baseline::bundled().unwrap();
        let mut state = live_state(&[("US2Y", 4.10)], FreshnessTag::Live);
        state.overrides.yields.insert("US2Y".into(), 4.25);
        let view = yield_view("US2Y", &baseline, &state);
        assert_eq!(view.v, "4.25%");
        assert_eq!(view.chg, "+0.05%");
        assert_eq!(view.src, FreshnessTag::Manual);
    }

    #[test]
    fn test_spread_takes_weakest_input_tag() {
        let baseline = Baseline::bundled().unwrap();
        let state = live_state(&[("US10Y", 4.50)], FreshnessTag::Live);
        let spread = spread_view(&baseline, &state);
        // live 10Y against baseline 2Y (4.20)
        assert_eq!(spread.v, "+30bp");
        assert_eq!(spread.direction, "Normal");
        assert_eq!(spread.src, FreshnessTag::Stale);

        let both = live_state(&[("US10Y", 4.00), ("US2Y", 4.12)], FreshnessTag::LivePartial);
        let spread = spread_view(&baseline, &both);
        assert_eq!(spread.v, "-12bp");
        assert_eq!(spread.signal, "inv");
        assert_eq!(spread.src, FreshnessTag::LivePartial);
    }

    #[test]
    fn test_real_rate_from_live_inputs() {
        let baseline = Baseline::bundled().unwrap();
        let mut state = live_state(&[("US10Y", 4.50)], FreshnessTag::Live);
        state.us_macro.insert("cpi".into(), 3.0);
        state.status.insert(DataDomain::UsMacro, FreshnessTag::Live);
        let real = real_rate_view(&baseline, &state);
        assert_eq!(real.v, "+1.50%");
        assert_eq!(real.chg, "-0.02%");
        assert_eq!(real.dir, Direction::Down);
        assert_eq!(real.src, FreshnessTag::Live);

        // live nominal over baseline CPI is only as good as the baseline
        state.us_macro.clear();
        state.status.remove(&DataDomain::UsMacro);
        assert_eq!(real_rate_view(&baseline, &state).src, FreshnessTag::Stale);
    }

    #[test]
    fn test_direction_follows_rounded_change() {
        let baseline = Baseline::bundled().unwrap();
        let state = live_state(&[("US10Y", 4.4199)], FreshnessTag::Live);
        let view = yield_view("US10Y", &baseline, &state);
        assert_eq!(view.chg, "+0%");
        assert_eq!(view.dir, Direction::Up);
        assert_eq!(view.interp, "hawk");

        let state = live_state(&[("US10Y", 4.41)], FreshnessTag::Live);
        let view = yield_view("US10Y", &baseline, &state);
        assert_eq!(view.chg, "-0.01%");
        assert_eq!(view.dir, Direction::Down);
    }
}

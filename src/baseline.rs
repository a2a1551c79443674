// src/baseline.rs
//
// Hardcoded fallback values, reviewed by hand. Every merged field falls back
// here when no override, live value or enrichment is available.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{AtrReading, Direction};

const BASELINE_JSON: &str = include_str!("../config/baseline.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldBaseline {
    pub v: String,
    pub chg: String,
    pub dir: Direction,
    pub interp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadBaseline {
    pub v: String,
    pub direction: String,
    pub signal: String,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealRateBaseline {
    pub v: String,
    pub chg: String,
    pub dir: Direction,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaugeBaseline {
    pub label: String,
    pub v: String,
    pub chg: String,
    pub dir: Direction,
    pub signal: String,
    pub note: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyBias {
    Hawkish,
    Neutral,
    Hold,
    Dovish,
}

impl PolicyBias {
    /// Fixed mapping from stance to the monetary score pillar.
    pub fn monetary_score(self) -> i32 {
        match self {
            PolicyBias::Hawkish => 3,
            PolicyBias::Neutral | PolicyBias::Hold => 0,
            PolicyBias::Dovish => -2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComponents {
    /// Explicit override of the bias-derived monetary pillar.
    #[serde(default)]
    pub monetary: Option<i32>,
    pub growth: i32,
    pub inflation: i32,
    pub risk: i32,
    pub commodity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriadReading {
    pub label: String,
    pub v: String,
    pub c: String,
    pub d: Direction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Triad {
    pub inflation: Option<TriadReading>,
    pub employment: Option<TriadReading>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CbSpeech {
    pub speaker: String,
    pub date: String,
    pub text: String,
    pub implication: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoItem {
    #[serde(default)]
    pub category: Option<String>,
    pub title: String,
    pub effect: String,
    pub analysis: String,
    #[serde(default)]
    pub affected_currencies: Vec<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairThesis {
    #[serde(default)]
    pub pair: Option<String>,
    pub dir: String,
    #[serde(default)]
    pub summary: Option<String>,
    pub thesis: String,
    #[serde(default)]
    pub chain: Vec<String>,
    pub catalyst: String,
    pub timeframe: String,
    pub entry: String,
    pub target: String,
    pub stop: String,
    #[serde(default)]
    pub conviction: Option<u8>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskEnvironment {
    pub sentiment: String,
    pub tag: String,
    pub name: String,
    pub desc: String,
    #[serde(default)]
    pub week_of: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyProfile {
    pub full: String,
    pub country: String,
    pub central_bank: String,
    pub interest_rate: String,
    pub bias: PolicyBias,
    pub score: ScoreComponents,
    #[serde(default)]
    pub triad: Triad,
    #[serde(default)]
    pub speeches: Vec<CbSpeech>,
    #[serde(default)]
    pub geopolitical: Vec<GeoItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CotBaseline {
    pub net: i64,
    pub prev: i64,
    pub label: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
    /// Date of the last manual review.
    pub reviewed: String,
    pub yields: BTreeMap<String, YieldBaseline>,
    pub spread2s10s: SpreadBaseline,
    pub real_rate10y: RealRateBaseline,
    /// Keyed by the same symbol keys the markets client produces.
    pub markets: BTreeMap<String, GaugeBaseline>,
    #[serde(default)]
    pub fx: BTreeMap<String, f64>,
    #[serde(default)]
    pub us_macro: BTreeMap<String, f64>,
    pub currencies: BTreeMap<String, CurrencyProfile>,
    pub cot_as_of: String,
    pub cot: BTreeMap<String, CotBaseline>,
    pub atr: BTreeMap<String, AtrReading>,
    pub pair_thesis: BTreeMap<String, PairThesis>,
    pub risk_environment: RiskEnvironment,
}

impl Baseline {
    /// Parses the baseline bundled into the binary.
    pub fn bundled() -> Result<Self> {
        Self::from_json(BASELINE_JSON).context("bundled config/baseline.json is invalid")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn currency(&self, ccy: &str) -> Option<&CurrencyProfile> {
        self.currencies.get(ccy)
    }

    /// Looks a thesis up in either quoting order; returns the stored pair label with it.
    pub fn pair_thesis(&self, a: &str, b: &str) -> Option<(&str, &PairThesis)> {
        self.pair_thesis
            .get_key_value(&format!("{}/{}", a, b))
            .or_else(|| self.pair_thesis.get_key_value(&format!("{}/{}", b, a)))
            .map(|(pair, thesis)| (pair.as_str(), thesis))
    }
}

/// Parses the numeric part of a display string like `4.42%`, `+24bp`, `$2,936` or `$4.62/lb`.
pub fn parse_display_number(v: &str) -> Option<f64> {
    let cleaned: String = v
        .chars()
        .take_while(|c| *c != '/' && *c != '–')
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+')
        .collect();
    cleaned.parse::<f64>().ok()
}

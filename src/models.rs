// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Every slice of live data the store tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataDomain {
    Yields,
    CbRates,
    Markets,
    Fx,
    Cot,
    Calendar,
    News,
    Atr,
    UsMacro,
    IntlMacro,
}

impl DataDomain {
    pub const ALL: [DataDomain; 10] = [
        DataDomain::Yields,
        DataDomain::CbRates,
        DataDomain::Markets,
        DataDomain::Fx,
        DataDomain::Cot,
        DataDomain::Calendar,
        DataDomain::News,
        DataDomain::Atr,
        DataDomain::UsMacro,
        DataDomain::IntlMacro,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataDomain::Yields => "yields",
            DataDomain::CbRates => "cbRates",
            DataDomain::Markets => "markets",
            DataDomain::Fx => "fx",
            DataDomain::Cot => "cot",
            DataDomain::Calendar => "calendar",
            DataDomain::News => "news",
            DataDomain::Atr => "atr",
            DataDomain::UsMacro => "usMacro",
            DataDomain::IntlMacro => "intlMacro",
        }
    }
}

impl fmt::Display for DataDomain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provenance of a displayed value.
///
/// Ordered by authority: `live > live-partial > manual > cache > stale`.
/// The ordering is the one used for domain-level precedence and for the
/// weakest-link rule on derived values. Per-field, a user override still wins
/// over a live value; that decision lives in the merge functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FreshnessTag {
    Live,
    LivePartial,
    Manual,
    Cache,
    #[default]
    Stale,
}

impl FreshnessTag {
    pub fn rank(self) -> u8 {
        match self {
            FreshnessTag::Live => 4,
            FreshnessTag::LivePartial => 3,
            FreshnessTag::Manual => 2,
            FreshnessTag::Cache => 1,
            FreshnessTag::Stale => 0,
        }
    }

    pub fn is_live(self) -> bool {
        matches!(self, FreshnessTag::Live | FreshnessTag::LivePartial)
    }

    /// The less authoritative of the two tags.
    pub fn weakest(self, other: FreshnessTag) -> FreshnessTag {
        if self.rank() <= other.rank() {
            self
        } else {
            other
        }
    }

    pub fn strongest(self, other: FreshnessTag) -> FreshnessTag {
        if self.rank() >= other.rank() {
            self
        } else {
            other
        }
    }
}

impl PartialOrd for FreshnessTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FreshnessTag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for FreshnessTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            FreshnessTag::Live => "live",
            FreshnessTag::LivePartial => "live-partial",
            FreshnessTag::Manual => "manual",
            FreshnessTag::Cache => "cache",
            FreshnessTag::Stale => "stale",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchPhase {
    #[default]
    Idle,
    Loading,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketQuote {
    pub price: f64,
    pub prev: f64,
    pub change: f64,
    pub change_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CotPosition {
    /// Non-commercial net as a percentage of open interest.
    pub net: i64,
    pub prev: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolLabel {
    Low,
    Medium,
    High,
}

impl VolLabel {
    pub fn from_pips(pips: u32) -> Self {
        if pips < 50 {
            VolLabel::Low
        } else if pips < 90 {
            VolLabel::Medium
        } else {
            VolLabel::High
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtrReading {
    /// 14-session average true range in pips.
    pub atr: u32,
    pub vol: VolLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Impact {
    pub fn normalise(raw: &str) -> Self {
        let s = raw.to_lowercase();
        if s.contains("high") {
            Impact::High
        } else if s.contains("medium") || s.contains("moderate") {
            Impact::Medium
        } else {
            Impact::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub currency: String,
    pub date: String,
    pub time: String,
    pub iso_date: Option<String>,
    pub event: String,
    pub impact: Impact,
    pub forecast: String,
    pub previous: String,
    pub actual: Option<String>,
}

impl CalendarEvent {
    pub fn is_released(&self) -> bool {
        match self.actual.as_deref() {
            Some(a) => !a.trim().is_empty() && a != "—",
            None => false,
        }
    }

    /// Unreleased high/medium-impact events are the ones worth a trade trigger.
    pub fn wants_trigger(&self) -> bool {
        !self.is_released() && matches!(self.impact, Impact::High | Impact::Medium)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub title: String,
    pub description: String,
    pub link: String,
    pub pub_date: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source: String,
    pub currencies: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntlMacro {
    pub cpi: Option<f64>,
    pub unemployment: Option<f64>,
}

/// A partial update produced by one source client.
///
/// Every section is keyed by entity code (currency, pair, tenor, symbol) so
/// that applying it is a per-key shallow merge. Keys absent from a patch are
/// never removed from the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Patch {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub yields: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub cb_rates: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub markets: BTreeMap<String, MarketQuote>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fx: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub cot: BTreeMap<String, CotPosition>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub calendar: BTreeMap<String, Vec<CalendarEvent>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub news: BTreeMap<String, Vec<NewsArticle>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub atr: BTreeMap<String, AtrReading>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub us_macro: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub intl_macro: BTreeMap<String, IntlMacro>,

    /// Sub-source failures keyed by entity; non-empty means live-partial.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cot_as_of: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_fetched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub news_fetched_at: Option<DateTime<Utc>>,
}

impl Patch {
    pub fn touches(&self, domain: DataDomain) -> bool {
        match domain {
            DataDomain::Yields => !self.yields.is_empty(),
            DataDomain::CbRates => !self.cb_rates.is_empty(),
            DataDomain::Markets => !self.markets.is_empty(),
            DataDomain::Fx => !self.fx.is_empty(),
            DataDomain::Cot => !self.cot.is_empty(),
            DataDomain::Calendar => !self.calendar.is_empty(),
            DataDomain::News => !self.news.is_empty(),
            DataDomain::Atr => !self.atr.is_empty(),
            DataDomain::UsMacro => !self.us_macro.is_empty(),
            DataDomain::IntlMacro => !self.intl_macro.is_empty(),
        }
    }

    pub fn domains(&self) -> Vec<DataDomain> {
        DataDomain::ALL
            .iter()
            .copied()
            .filter(|d| self.touches(*d))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.domains().is_empty()
    }

    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Tag earned by a successful fetch that produced this patch.
    pub fn earned_tag(&self) -> FreshnessTag {
        if self.is_partial() {
            FreshnessTag::LivePartial
        } else {
            FreshnessTag::Live
        }
    }
}

// src/services/briefs.rs
//
// The four kinds of AI content the dashboard asks the relay for, with their
// payload schemas and cache identities.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::ai::{extract_array, extract_object, require_keys, RelayRequest, RelayResponse};
use crate::baseline::{Baseline, CbSpeech, GeoItem, PairThesis, RiskEnvironment};
use crate::cache::{ContentKind, TtlClass};
use crate::error::{Result, SourceError};
use crate::models::{CalendarEvent, CotPosition};

pub const BRIEF_KEY_PREFIX: &str = "fx_aib_v1_";
pub const GLOBAL_KEY: &str = "fx_global_v1";
pub const MATRIX_KEY: &str = "fx_matrix_v1";
pub const TRIGGERS_KEY_PREFIX: &str = "fx_triggers_v1_";

/// Web-search briefs.
pub const ANALYST_MODEL: &str = "claude-sonnet-4-20250514";
/// Short structured answers that run on every currency switch.
pub const FAST_MODEL: &str = "claude-haiku-4-5-20251001";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyBrief {
    pub cb_speeches: Vec<CbSpeech>,
    pub geopolitical: Vec<GeoItem>,
    pub pair_thesis: Vec<PairThesis>,
    #[serde(default)]
    pub cot_commentary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalBrief {
    pub risk_environment: RiskEnvironment,
    pub geo_items: Vec<GeoItem>,
    #[serde(default)]
    pub carry_commentary: Option<String>,
    #[serde(default)]
    pub key_facts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixEntry {
    pub risk_type: String,
    pub commodity_exposure: String,
}

pub type MatrixClassification = BTreeMap<String, MatrixEntry>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerHint {
    pub trigger: String,
    pub direction: String,
}

/// Event name to trade trigger.
pub type TriggerMap = BTreeMap<String, TriggerHint>;

const BRIEF_SCHEMA: &str = r#"{
  "cbSpeeches": [{"speaker": "", "date": "Month DD, YYYY", "text": "", "implication": ""}],
  "geopolitical": [{"title": "", "effect": "bullish|bearish|mixed", "analysis": ""}],
  "pairThesis": [{"pair": "CCY1/CCY2", "dir": "long|short", "summary": "", "thesis": "",
    "chain": [""], "catalyst": "", "timeframe": "", "entry": "", "target": "", "stop": "",
    "conviction": 65, "risks": [""], "tags": [""]}],
  "cotCommentary": ""
}"#;

const GLOBAL_SCHEMA: &str = r#"{
  "riskEnvironment": {"sentiment": "risk-off|risk-on|neutral", "tag": "", "name": "", "desc": "", "weekOf": ""},
  "geoItems": [{"category": "TARIFF|WAR|GEOPOLITICAL|MACRO", "title": "", "effect": "bullish|bearish|mixed",
    "affectedCurrencies": ["USD"], "analysis": "", "detail": "", "severity": "high|medium|low"}],
  "carryCommentary": "",
  "keyFacts": [""]
}"#;

/// Live brief for one currency: CB language, geopolitical risks, pair ideas, COT read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyBriefRequest {
    pub currency: String,
    pub full: String,
    pub central_bank: String,
    pub interest_rate: String,
    pub bias: String,
    pub cot: Option<CotPosition>,
    pub today: NaiveDate,
}

impl CurrencyBriefRequest {
    /// `None` for currencies without a profile.
    pub fn new(
        baseline: &Baseline,
        ccy: &str,
        interest_rate: &str,
        cot: Option<CotPosition>,
        today: NaiveDate,
    ) -> Option<Self> {
        let profile = baseline.currency(ccy)?;
        let bias = serde_json::to_value(profile.bias)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        Some(CurrencyBriefRequest {
            currency: ccy.to_string(),
            full: profile.full.clone(),
            central_bank: profile.central_bank.clone(),
            interest_rate: interest_rate.to_string(),
            bias,
            cot,
            today,
        })
    }
}

impl ContentKind for CurrencyBriefRequest {
    type Payload = CurrencyBrief;

    fn cache_key(&self) -> String {
        format!("{}{}", BRIEF_KEY_PREFIX, self.currency)
    }

    fn ttl(&self) -> TtlClass {
        TtlClass::PerCurrency
    }

    fn fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.currency.clone())
    }

    fn request(&self) -> RelayRequest {
        let system = format!(
            "You are a senior FX macro analyst writing a live brief for professional traders. \
Search the web for the latest central bank decision, the material geopolitical and macro risks, \
and current trade setups for the currency. Every sentence must cite a number, event or level.\n\
Return ONLY valid JSON matching this schema, no markdown:\n{}\n\
cbSpeeches: 1 entry. geopolitical: 2-4 entries. pairThesis: 2-3 pairs with the strongest divergence. \
cotCommentary: interpret the COT numbers given.",
            BRIEF_SCHEMA
        );
        let cot = match self.cot {
            Some(c) => format!("net {}%, prior {}%", c.net, c.prev),
            None => "unavailable".to_string(),
        };
        let user = format!(
            "Generate a live FX brief for {} ({}).\nTODAY: {}\nCentral bank: {}\nRate: {} | Bias: {}\n\
COT positioning: {}\nOnly reference events that have already happened. Return ONLY the JSON.",
            self.currency,
            self.full,
            self.today.format("%B %-d, %Y"),
            self.central_bank,
            self.interest_rate,
            self.bias,
            cot
        );
        RelayRequest::new(system, user, 3000)
            .with_model(ANALYST_MODEL)
            .with_web_search(5)
    }

    fn parse(&self, response: &RelayResponse) -> Result<CurrencyBrief> {
        let value = extract_object(response.last_text()?)?;
        require_keys(&value, &["cbSpeeches", "geopolitical", "pairThesis"])?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Once-per-session global risk brief.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalBriefRequest {
    pub today: NaiveDate,
}

impl ContentKind for GlobalBriefRequest {
    type Payload = GlobalBrief;

    fn cache_key(&self) -> String {
        GLOBAL_KEY.to_string()
    }

    fn ttl(&self) -> TtlClass {
        TtlClass::Global
    }

    fn fingerprint(&self) -> String {
        self.today.to_string()
    }

    fn request(&self) -> RelayRequest {
        let system = format!(
            "You are a senior FX macro strategist producing a global risk brief for currency traders. \
Use web search; cover only the past 7 days: tariffs, active conflicts, geopolitical risk, global macro. \
Name the pairs affected and the direction. Severity: high moves markets 0.5%+ intraday, medium 0.2-0.5%, low is background.\n\
Return ONLY valid JSON matching this schema, no markdown:\n{}\n\
geoItems: 4-7 entries. keyFacts: 4-6 verifiable facts.",
            GLOBAL_SCHEMA
        );
        let user = format!(
            "Generate a live global FX macro and geopolitical risk brief.\nTODAY: {}\n\
Use G10 codes (USD EUR GBP JPY CHF CAD AUD NZD) for affectedCurrencies. Return ONLY the JSON.",
            self.today.format("%B %-d, %Y")
        );
        RelayRequest::new(system, user, 4000)
            .with_model(ANALYST_MODEL)
            .with_web_search(5)
    }

    fn parse(&self, response: &RelayResponse) -> Result<GlobalBrief> {
        let value = extract_object(response.last_text()?)?;
        require_keys(&value, &["riskEnvironment", "geoItems"])?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Risk type and commodity exposure per currency for the divergence matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixRequest {
    pub summary: String,
}

impl MatrixRequest {
    pub fn from_baseline(baseline: &Baseline) -> Self {
        let summary = baseline
            .currencies
            .iter()
            .map(|(ccy, p)| {
                format!(
                    "{}: country={}, centralBank={}, rate={}, bias={:?}",
                    ccy, p.country, p.central_bank, p.interest_rate, p.bias
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        MatrixRequest { summary }
    }
}

impl ContentKind for MatrixRequest {
    type Payload = MatrixClassification;

    fn cache_key(&self) -> String {
        MATRIX_KEY.to_string()
    }

    fn ttl(&self) -> TtlClass {
        TtlClass::Session
    }

    fn fingerprint(&self) -> String {
        self.summary.clone()
    }

    fn request(&self) -> RelayRequest {
        let system = "You classify G10 currencies for an FX divergence matrix.\n\
riskType is exactly one of \"safe-haven\", \"risk-on\", \"commodity\". \
commodityExposure is a 3-6 word label for the dominant commodity theme.\n\
Return ONLY a JSON object keyed by currency code: \
{\"USD\": {\"riskType\": \"\", \"commodityExposure\": \"\"}, ...}";
        let user = format!(
            "Classify these G10 currencies:\n\n{}\n\nReturn ONLY the JSON object.",
            self.summary
        );
        RelayRequest::new(system, user, 600).with_model(FAST_MODEL)
    }

    fn parse(&self, response: &RelayResponse) -> Result<MatrixClassification> {
        let value = extract_object(&response.joined_text()?)?;
        require_keys(&value, &["USD", "EUR"])?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Trade triggers for one currency's unreleased high/medium-impact events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarTriggerRequest {
    pub currency: String,
    pub events: Vec<CalendarEvent>,
}

impl CalendarTriggerRequest {
    /// `None` when no event qualifies for a trigger.
    pub fn for_events(ccy: &str, events: &[CalendarEvent]) -> Option<Self> {
        let events: Vec<CalendarEvent> = events.iter().filter(|e| e.wants_trigger()).cloned().collect();
        if events.is_empty() {
            return None;
        }
        Some(CalendarTriggerRequest {
            currency: ccy.to_string(),
            events,
        })
    }

    /// `CCY::` plus the sorted `event:forecast` set; changes whenever a forecast is revised.
    pub fn run_key(&self) -> String {
        let mut parts: Vec<String> = self
            .events
            .iter()
            .map(|e| {
                let forecast = if e.forecast.is_empty() { "?" } else { e.forecast.as_str() };
                format!("{}:{}", e.event, forecast)
            })
            .collect();
        parts.sort();
        format!("{}::{}", self.currency, parts.join("|"))
    }
}

impl ContentKind for CalendarTriggerRequest {
    type Payload = TriggerMap;

    fn cache_key(&self) -> String {
        format!("{}{}", TRIGGERS_KEY_PREFIX, self.currency)
    }

    fn ttl(&self) -> TtlClass {
        TtlClass::None
    }

    fn fingerprint(&self) -> String {
        self.run_key()
    }

    fn request(&self) -> RelayRequest {
        let system = "You are a professional FX macro trader writing trade trigger notes for data releases. \
For each event give the bullish threshold, the bearish threshold, the expected direction and any asymmetry \
in the reaction, in 2-3 sentences with specific numbers.\n\
Return ONLY a JSON array: [{\"event\": \"exact event name\", \"trigger\": \"\", \"direction\": \"bullish|bearish|neutral\"}]";
        let lines = self
            .events
            .iter()
            .map(|e| {
                format!(
                    "- Event: \"{}\" | Forecast: {} | Prior: {} | Impact: {:?}",
                    e.event,
                    if e.forecast.is_empty() { "?" } else { e.forecast.as_str() },
                    if e.previous.is_empty() { "?" } else { e.previous.as_str() },
                    e.impact
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let user = format!(
            "Generate FX trade triggers for these upcoming {} events:\n\n{}\n\nReturn ONLY the JSON array.",
            self.currency, lines
        );
        RelayRequest::new(system, user, 800).with_model(FAST_MODEL)
    }

    fn parse(&self, response: &RelayResponse) -> Result<TriggerMap> {
        let value = extract_array(&response.joined_text()?)?;
        let items = value
            .as_array()
            .ok_or_else(|| SourceError::Schema("trigger response is not an array".into()))?;

        let mut map = TriggerMap::new();
        for item in items {
            let event = item.get("event").and_then(Value::as_str);
            let trigger = item.get("trigger").and_then(Value::as_str);
            if let (Some(event), Some(trigger)) = (event, trigger) {
                let direction = item
                    .get("direction")
                    .and_then(Value::as_str)
                    .unwrap_or("neutral");
                map.insert(
                    event.to_string(),
                    TriggerHint {
                        trigger: trigger.to_string(),
                        direction: direction.to_string(),
                    },
                );
            }
        }
        Ok(map)
    }
}

// src/store.rs
//
// The live state for the process: one instance, shared by handle, written only
// through `apply_patch` and the override setters.
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::storage::KeyValueStore;
use crate::config::Clock;
use crate::models::{
    AtrReading, CalendarEvent, CotPosition, DataDomain, FetchPhase, FreshnessTag, IntlMacro,
    MarketQuote, NewsArticle, Patch,
};

const OVERRIDES_KEY: &str = "ldf_overrides_v1";

/// User-entered values. They beat live values for the same field until cleared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManualOverrides {
    pub cb_rates: BTreeMap<String, String>,
    pub yields: BTreeMap<String, f64>,
}

impl ManualOverrides {
    pub fn covers(&self, domain: DataDomain) -> bool {
        match domain {
            DataDomain::CbRates => !self.cb_rates.is_empty(),
            DataDomain::Yields => !self.yields.is_empty(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveState {
    pub yields: BTreeMap<String, f64>,
    pub cb_rates: BTreeMap<String, String>,
    pub markets: BTreeMap<String, MarketQuote>,
    pub fx: BTreeMap<String, f64>,
    pub cot: BTreeMap<String, CotPosition>,
    pub calendar: BTreeMap<String, Vec<CalendarEvent>>,
    pub news: BTreeMap<String, Vec<NewsArticle>>,
    pub atr: BTreeMap<String, AtrReading>,
    pub us_macro: BTreeMap<String, f64>,
    pub intl_macro: BTreeMap<String, IntlMacro>,

    /// Tags earned by fetches only; overrides are folded in by `tag`.
    pub status: BTreeMap<DataDomain, FreshnessTag>,
    pub overrides: ManualOverrides,

    pub cot_as_of: Option<String>,
    pub calendar_fetched_at: Option<DateTime<Utc>>,
    pub news_fetched_at: Option<DateTime<Utc>>,
    pub last_fetch: Option<DateTime<Utc>>,
    pub fetch_phase: FetchPhase,
}

impl LiveState {
    /// Tag earned by this session's fetches for a domain.
    pub fn fetch_tag(&self, domain: DataDomain) -> FreshnessTag {
        self.status.get(&domain).copied().unwrap_or_default()
    }

    /// Effective domain tag: the fetch tag, lifted to `manual` while overrides exist.
    pub fn tag(&self, domain: DataDomain) -> FreshnessTag {
        let fetched = self.fetch_tag(domain);
        if self.overrides.covers(domain) {
            fetched.strongest(FreshnessTag::Manual)
        } else {
            fetched
        }
    }

    fn merge(&mut self, patch: Patch) {
        self.yields.extend(patch.yields);
        self.cb_rates.extend(patch.cb_rates);
        self.markets.extend(patch.markets);
        self.fx.extend(patch.fx);
        self.cot.extend(patch.cot);
        self.calendar.extend(patch.calendar);
        self.news.extend(patch.news);
        self.atr.extend(patch.atr);
        self.us_macro.extend(patch.us_macro);
        self.intl_macro.extend(patch.intl_macro);

        if patch.cot_as_of.is_some() {
            self.cot_as_of = patch.cot_as_of;
        }
        if patch.calendar_fetched_at.is_some() {
            self.calendar_fetched_at = patch.calendar_fetched_at;
        }
        if patch.news_fetched_at.is_some() {
            self.news_fetched_at = patch.news_fetched_at;
        }
    }

    fn entries(&self, domain: DataDomain) -> BTreeMap<String, Value> {
        fn to_values<T: Serialize>(map: &BTreeMap<String, T>) -> BTreeMap<String, Value> {
            map.iter()
                .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|v| (k.clone(), v)))
                .collect()
        }
        match domain {
            DataDomain::Yields => to_values(&self.yields),
            DataDomain::CbRates => to_values(&self.cb_rates),
            DataDomain::Markets => to_values(&self.markets),
            DataDomain::Fx => to_values(&self.fx),
            DataDomain::Cot => to_values(&self.cot),
            DataDomain::Calendar => to_values(&self.calendar),
            DataDomain::News => to_values(&self.news),
            DataDomain::Atr => to_values(&self.atr),
            DataDomain::UsMacro => to_values(&self.us_macro),
            DataDomain::IntlMacro => to_values(&self.intl_macro),
        }
    }
}

/// What `LiveStore::read` hands back for one domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainRead {
    pub domain: DataDomain,
    pub tag: FreshnessTag,
    pub entries: BTreeMap<String, Value>,
}

pub struct LiveStore {
    state: RwLock<LiveState>,
    clock: Arc<dyn Clock>,
    storage: Arc<dyn KeyValueStore>,
}

impl LiveStore {
    /// Builds the store and reloads any persisted manual overrides.
    pub fn new(clock: Arc<dyn Clock>, storage: Arc<dyn KeyValueStore>) -> Self {
        let overrides = match storage.get(OVERRIDES_KEY) {
            Some(raw) => serde_json::from_str::<ManualOverrides>(&raw).unwrap_or_else(|e| {
                warn!("Ignoring unreadable stored overrides: {}", e);
                ManualOverrides::default()
            }),
            None => ManualOverrides::default(),
        };
        if !overrides.cb_rates.is_empty() || !overrides.yields.is_empty() {
            info!(
                "Restored manual overrides: {} CB rates, {} yields",
                overrides.cb_rates.len(),
                overrides.yields.len()
            );
        }

        LiveStore {
            state: RwLock::new(LiveState {
                overrides,
                ..LiveState::default()
            }),
            clock,
            storage,
        }
    }

    /// The single write path for fetched data.
    ///
    /// Shallow-merges every section of `patch` by key, lifts `domain`'s tag to
    /// `tag` if that is more authoritative (never lowers it), and stamps
    /// `last_fetch`.
    pub fn apply_patch(&self, domain: DataDomain, patch: Patch, tag: FreshnessTag) {
        let now = self.clock.now();
        let mut state = self.state.write();
        state.merge(patch);
        let tag_now = {
            let current = state.status.entry(domain).or_default();
            *current = current.strongest(tag);
            *current
        };
        state.last_fetch = Some(now);
        debug!("Applied {} patch, tag now {}", domain, tag_now);
    }

    pub fn read(&self, domain: DataDomain) -> DomainRead {
        let state = self.state.read();
        DomainRead {
            domain,
            tag: state.tag(domain),
            entries: state.entries(domain),
        }
    }

    pub fn snapshot(&self) -> LiveState {
        self.state.read().clone()
    }

    pub fn tag(&self, domain: DataDomain) -> FreshnessTag {
        self.state.read().tag(domain)
    }

    pub fn fetch_phase(&self) -> FetchPhase {
        self.state.read().fetch_phase
    }

    pub fn begin_cycle(&self) {
        self.state.write().fetch_phase = FetchPhase::Loading;
    }

    /// Moves to `Loading` unless a cycle already holds it. Returns whether this caller won.
    pub fn try_begin_cycle(&self) -> bool {
        let mut state = self.state.write();
        if state.fetch_phase == FetchPhase::Loading {
            return false;
        }
        state.fetch_phase = FetchPhase::Loading;
        true
    }

    pub fn finish_cycle(&self) {
        self.state.write().fetch_phase = FetchPhase::Done;
    }

    pub fn set_cb_override(&self, ccy: &str, rate: &str) {
        self.update_overrides(|o| {
            o.cb_rates.insert(ccy.to_string(), rate.trim().to_string());
        });
    }

    pub fn clear_cb_override(&self, ccy: &str) {
        self.update_overrides(|o| {
            o.cb_rates.remove(ccy);
        });
    }

    pub fn set_yield_override(&self, tenor: &str, value: f64) {
        self.update_overrides(|o| {
            o.yields.insert(tenor.to_string(), value);
        });
    }

    pub fn clear_yield_override(&self, tenor: &str) {
        self.update_overrides(|o| {
            o.yields.remove(tenor);
        });
    }

    /// Explicit reset: the only way a domain's effective tag can drop.
    pub fn clear_overrides(&self) {
        self.update_overrides(|o| *o = ManualOverrides::default());
    }

    pub fn overrides(&self) -> ManualOverrides {
        self.state.read().overrides.clone()
    }

    fn update_overrides(&self, change: impl FnOnce(&mut ManualOverrides)) {
        let snapshot = {
            let mut state = self.state.write();
            change(&mut state.overrides);
            state.overrides.clone()
        };
        match serde_json::to_string(&snapshot) {
            Ok(raw) => {
                if let Err(e) = self.storage.set(OVERRIDES_KEY, &raw) {
                    warn!("Failed to persist manual overrides: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize manual overrides: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::storage::MemoryStore;
    use crate::config::ManualClock;

    fn store() -> LiveStore {
        let at = DateTime::parse_from_rfc3339("2026-02-24T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        LiveStore::new(Arc::new(ManualClock::new(at)), Arc::new(MemoryStore::new()))
    }

    fn yields_patch(pairs: &[(&str, f64)]) -> Patch {
        let mut patch = Patch::default();
        for (k, v) in pairs {
            patch.yields.insert(k.to_string(), *v);
        }
        patch
    }

    #[test]
    fn test_apply_patch_shallow_merges_by_key() {
        let store = store();
        store.apply_patch(DataDomain::Yields, yields_patch(&[("US2Y", 4.1), ("US10Y", 4.4)]), FreshnessTag::Live);
        store.apply_patch(DataDomain::Yields, yields_patch(&[("US10Y", 4.5)]), FreshnessTag::Live);

        let state = store.snapshot();
        assert_eq!(state.yields["US2Y"], 4.1);
        assert_eq!(state.yields["US10Y"], 4.5);
        assert!(state.last_fetch.is_some());
    }

    #[test]
    fn test_patches_are_idempotent_and_commute() {
        let a = yields_patch(&[("US2Y", 4.1)]);
        let mut b = Patch::default();
        b.cb_rates.insert("EUR".into(), "2.40%".into());

        let once = store();
        once.apply_patch(DataDomain::Yields, a.clone(), FreshnessTag::Live);
        let twice = store();
        twice.apply_patch(DataDomain::Yields, a.clone(), FreshnessTag::Live);
        twice.apply_patch(DataDomain::Yields, a.clone(), FreshnessTag::Live);
        assert_eq!(once.snapshot(), twice.snapshot());

        let ab = store();
        ab.apply_patch(DataDomain::Yields, a.clone(), FreshnessTag::Live);
        ab.apply_patch(DataDomain::CbRates, b.clone(), FreshnessTag::LivePartial);
        let ba = store();
        ba.apply_patch(DataDomain::CbRates, b, FreshnessTag::LivePartial);
        ba.apply_patch(DataDomain::Yields, a, FreshnessTag::Live);
        assert_eq!(ab.snapshot(), ba.snapshot());
    }

    #[test]
    fn test_tag_never_downgrades() {
        let store = store();
        store.apply_patch(DataDomain::Yields, yields_patch(&[("US10Y", 4.5)]), FreshnessTag::Live);
        store.apply_patch(DataDomain::Yields, yields_patch(&[("US2Y", 4.1)]), FreshnessTag::LivePartial);
        assert_eq!(store.tag(DataDomain::Yields), FreshnessTag::Live);

        store.apply_patch(DataDomain::Yields, Patch::default(), FreshnessTag::Stale);
        assert_eq!(store.tag(DataDomain::Yields), FreshnessTag::Live);
    }

    #[test]
    fn test_partial_upgrades_to_live() {
        let store = store();
        store.apply_patch(DataDomain::CbRates, Patch::default(), FreshnessTag::LivePartial);
        assert_eq!(store.tag(DataDomain::CbRates), FreshnessTag::LivePartial);
        store.apply_patch(DataDomain::CbRates, Patch::default(), FreshnessTag::Live);
        assert_eq!(store.tag(DataDomain::CbRates), FreshnessTag::Live);
    }

    #[test]
    fn test_overrides_lift_tag_until_cleared() {
        let store = store();
        assert_eq!(store.tag(DataDomain::CbRates), FreshnessTag::Stale);

        store.set_cb_override("EUR", "2.50%");
        assert_eq!(store.tag(DataDomain::CbRates), FreshnessTag::Manual);

        store.clear_cb_override("EUR");
        assert_eq!(store.tag(DataDomain::CbRates), FreshnessTag::Stale);
    }

    #[test]
    fn test_overrides_persist_across_instances() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));

        let first = LiveStore::new(clock.clone(), storage.clone());
        first.set_cb_override("EUR", " 2.50% ");
        first.set_yield_override("US10Y", 4.6);

        let second = LiveStore::new(clock, storage);
        let overrides = second.overrides();
        assert_eq!(overrides.cb_rates["EUR"], "2.50%");
        assert_eq!(overrides.yields["US10Y"], 4.6);
    }

    #[test]
    fn test_read_returns_entries_and_tag() {
        let store = store();
        store.apply_patch(DataDomain::Yields, yields_patch(&[("US10Y", 4.5)]), FreshnessTag::Live);
        let read = store.read(DataDomain::Yields);
        assert_eq!(read.tag, FreshnessTag::Live);
        assert_eq!(read.entries["US10Y"], serde_json::json!(4.5));
        assert!(store.read(DataDomain::News).entries.is_empty());
    }

    #[test]
    fn test_fetch_phase_cycle() {
        let store = store();
        assert_eq!(store.fetch_phase(), FetchPhase::Idle);
        store.begin_cycle();
        assert_eq!(store.fetch_phase(), FetchPhase::Loading);
        store.finish_cycle();
        assert_eq!(store.fetch_phase(), FetchPhase::Done);
        store.begin_cycle();
        assert_eq!(store.fetch_phase(), FetchPhase::Loading);
    }

    #[test]
    fn test_apply_patch_stamps_last_fetch_from_clock() {
        let store = store();
        store.apply_patch(DataDomain::CbRates, Patch::default(), FreshnessTag::LivePartial);
        let state = store.snapshot();
        assert_eq!(state.fetch_tag(DataDomain::CbRates), FreshnessTag::LivePartial);
        assert_eq!(
            state.last_fetch.map(|t| t.to_rfc3339()),
            Some("2026-02-24T09:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_only_one_caller_begins_a_cycle() {
        let store = store();
        assert!(store.try_begin_cycle());
        assert!(!store.try_begin_cycle());
        assert_eq!(store.fetch_phase(), FetchPhase::Loading);
        store.finish_cycle();
        assert!(store.try_begin_cycle());
    }
}

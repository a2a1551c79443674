// src/cache/enricher.rs
//
// One pattern for every AI-backed section: read the cache, otherwise make a
// single relay call per request signature, validate, write through.
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::inflight::{request_signature, InFlight};
use super::{CacheEntry, Enrichment, EnrichmentCache, TtlClass};
use crate::config::Clock;
use crate::error::SourceError;
use crate::services::ai::{AiRelay, RelayRequest, RelayResponse};

/// A kind of AI content: where it is cached, how long it lives, how to ask for it.
pub trait ContentKind: Clone + Send + Sync + 'static {
    type Payload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    fn cache_key(&self) -> String;
    fn ttl(&self) -> TtlClass;
    /// Identity of the inputs the request is built from.
    fn fingerprint(&self) -> String;
    fn request(&self) -> RelayRequest;
    /// Validation failure here counts as a failed fetch.
    fn parse(&self, response: &RelayResponse) -> Result<Self::Payload, SourceError>;
}

struct Failure {
    tick: u64,
    fingerprint: String,
    reason: String,
}

struct Accepted {
    tick: u64,
    fingerprint: String,
    payload: Value,
    generated_at: DateTime<Utc>,
}

pub struct Enricher {
    relay: Arc<dyn AiRelay>,
    cache: EnrichmentCache,
    clock: Arc<dyn Clock>,
    inflight: InFlight<(Value, DateTime<Utc>)>,
    ticks: Mutex<HashMap<String, u64>>,
    accepted: Mutex<HashMap<String, Accepted>>,
    failures: Mutex<HashMap<String, Failure>>,
}

impl Enricher {
    pub fn new(relay: Arc<dyn AiRelay>, cache: EnrichmentCache, clock: Arc<dyn Clock>) -> Self {
        Enricher {
            relay,
            cache,
            clock,
            inflight: InFlight::new(),
            ticks: Mutex::new(HashMap::new()),
            accepted: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn tick(&self, key: &str) -> u64 {
        self.ticks.lock().get(key).copied().unwrap_or(0)
    }

    /// Relay calls actually made.
    pub fn calls_made(&self) -> u64 {
        self.inflight.launched()
    }

    fn signature<K: ContentKind>(&self, kind: &K, tick: u64) -> String {
        request_signature(&kind.cache_key(), &kind.fingerprint(), tick)
    }

    /// What is trusted right now, without touching the network.
    pub fn current<K: ContentKind>(&self, kind: &K) -> Enrichment<K::Payload> {
        let key = kind.cache_key();
        let ttl = kind.ttl();
        let now = self.clock.now();

        {
            let accepted = self.accepted.lock();
            if let Some(a) = accepted.get(&key) {
                let same_inputs = ttl.persisted() || a.fingerprint == kind.fingerprint();
                if same_inputs && !ttl.is_expired(a.generated_at, now) {
                    match serde_json::from_value(a.payload.clone()) {
                        Ok(payload) => return Enrichment::fresh(payload, a.generated_at),
                        Err(e) => debug!("Accepted payload for {} no longer parses: {}", key, e),
                    }
                }
            }
        }

        if ttl.persisted() {
            if let Some(entry) = self.cache.read(&key, ttl) {
                match serde_json::from_value(entry.payload) {
                    Ok(payload) => return Enrichment::cached(payload, entry.generated_at),
                    Err(e) => debug!("Cached payload for {} does not match schema: {}", key, e),
                }
            }
        }

        let tick = self.tick(&key);
        let mut out = Enrichment::absent();
        out.loading = self.inflight.contains(&self.signature(kind, tick));
        // A failure only sticks to the inputs it was made for.
        if let Some(f) = self.failures.lock().get(&key) {
            let same_inputs = ttl.persisted() || f.fingerprint == kind.fingerprint();
            if f.tick == tick && same_inputs {
                out.error = Some(format!("AI unavailable: {}", f.reason));
            }
        }
        out
    }

    /// Returns trusted content, calling the relay at most once per signature.
    pub async fn enrich<K: ContentKind>(&self, kind: &K) -> Enrichment<K::Payload> {
        let current = self.current(kind);
        if current.payload.is_some() {
            return current;
        }

        let key = kind.cache_key();
        let tick = self.tick(&key);
        let signature = self.signature(kind, tick);

        let relay = self.relay.clone();
        let clock = self.clock.clone();
        let call_kind = kind.clone();
        let outcome = self
            .inflight
            .run(&signature, move || async move {
                let response = relay.complete(&call_kind.request()).await?;
                let payload = call_kind.parse(&response)?;
                Ok((serde_json::to_value(payload)?, clock.now()))
            })
            .await;

        match outcome {
            Ok((payload, generated_at)) => {
                self.accept(kind, tick, payload, generated_at);
                self.failures.lock().remove(&key);
            }
            Err(e) => {
                warn!("[Enrich] {} failed: {}", key, e);
                self.failures.lock().insert(
                    key,
                    Failure {
                        tick,
                        fingerprint: kind.fingerprint(),
                        reason: e.to_string(),
                    },
                );
            }
        }
        self.current(kind)
    }

    /// Keeps the newest-tick result; an older tick never replaces a newer one.
    fn accept<K: ContentKind>(&self, kind: &K, tick: u64, payload: Value, generated_at: DateTime<Utc>) {
        let key = kind.cache_key();
        let fingerprint = kind.fingerprint();
        let mut accepted = self.accepted.lock();
        if let Some(existing) = accepted.get(&key) {
            if existing.tick > tick {
                debug!("Dropping {} result from tick {} (have tick {})", key, tick, existing.tick);
                return;
            }
            // Every caller sharing one call lands here with the same result.
            if existing.tick == tick
                && existing.generated_at == generated_at
                && existing.fingerprint == fingerprint
                && existing.payload == payload
            {
                return;
            }
        }

        if kind.ttl().persisted() {
            self.cache.write_entry(&CacheEntry {
                key: key.clone(),
                payload: payload.clone(),
                generated_at,
            });
        }
        info!("[Enrich] {} generated (tick {})", key, tick);
        accepted.insert(
            key,
            Accepted {
                tick,
                fingerprint,
                payload,
                generated_at,
            },
        );
    }

    /// Manual refresh: drop the cached copy and move to a new tick.
    pub fn refresh(&self, key: &str) -> u64 {
        self.cache.invalidate(key);
        self.accepted.lock().remove(key);
        self.failures.lock().remove(key);
        let mut ticks = self.ticks.lock();
        let tick = ticks.entry(key.to_string()).or_insert(0);
        *tick += 1;
        info!("[Enrich] {} refreshed, tick {}", key, *tick);
        *tick
    }

    /// Starts `enrich` in the background; callers read the outcome later via `current`.
    pub fn spawn_enrich<K: ContentKind>(self: &Arc<Self>, kind: K) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.enrich(&kind).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::storage::{KeyValueStore, MemoryStore};
    use crate::config::ManualClock;
    use crate::services::ai::{extract_object, require_keys};
    use async_trait::async_trait;
    use chrono::Duration;
    use serde::Deserialize;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies in order from a script of (delay ms, text) pairs.
    struct ScriptedRelay {
        calls: AtomicUsize,
        script: Mutex<VecDeque<(u64, String)>>,
    }

    impl ScriptedRelay {
        fn new(script: &[(u64, &str)]) -> Arc<Self> {
            Arc::new(ScriptedRelay {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script.iter().map(|(d, t)| (*d, t.to_string())).collect()),
            })
        }
    }

    #[async_trait]
    impl AiRelay for ScriptedRelay {
        async fn complete(&self, _request: &RelayRequest) -> crate::error::Result<RelayResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().pop_front();
            let (delay, text) = next.unwrap_or((0, "{\"note\": \"default\"}".to_string()));
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            Ok(RelayResponse::from_text(&text))
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        note: String,
    }

    #[derive(Clone)]
    struct NoteKind {
        ttl: TtlClass,
        input: String,
    }

    impl ContentKind for NoteKind {
        type Payload = Note;
        fn cache_key(&self) -> String {
            "fx_note_v1".to_string()
        }
        fn ttl(&self) -> TtlClass {
            self.ttl
        }
        fn fingerprint(&self) -> String {
            self.input.clone()
        }
        fn request(&self) -> RelayRequest {
            RelayRequest::new("system", self.input.clone(), 100)
        }
        fn parse(&self, response: &RelayResponse) -> Result<Note, SourceError> {
            let value = extract_object(response.last_text()?)?;
            require_keys(&value, &["note"])?;
            Ok(serde_json::from_value(value)?)
        }
    }

    fn kind(ttl: TtlClass) -> NoteKind {
        NoteKind {
            ttl,
            input: "inputs".to_string(),
        }
    }

    fn enricher(
        relay: Arc<ScriptedRelay>,
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<ManualClock>,
    ) -> Enricher {
        let cache = EnrichmentCache::new(storage, clock.clone());
        Enricher::new(relay, cache, clock)
    }

    #[tokio::test]
    async fn test_concurrent_requests_make_one_call() {
        let relay = ScriptedRelay::new(&[(40, "{\"note\": \"one\"}")]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let e = enricher(relay.clone(), Arc::new(MemoryStore::new()), clock);

        let k = kind(TtlClass::PerCurrency);
        let (a, b) = tokio::join!(e.enrich(&k), e.enrich(&k));

        assert_eq!(relay.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.payload.unwrap().note, "one");
        assert_eq!(b.payload.unwrap().note, "one");
        assert_eq!(a.tag, crate::models::FreshnessTag::Live);
    }

    #[tokio::test]
    async fn test_brief_older_than_ttl_triggers_new_call() {
        let relay = ScriptedRelay::new(&[(0, "{\"note\": \"first\"}"), (0, "{\"note\": \"second\"}")]);
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let k = kind(TtlClass::PerCurrency);

        let first = enricher(relay.clone(), storage.clone(), clock.clone());
        assert_eq!(first.enrich(&k).await.payload.unwrap().note, "first");

        // A new session reads the persisted copy as cache.
        clock.set(start + Duration::hours(23));
        let second = enricher(relay.clone(), storage.clone(), clock.clone());
        let cached = second.enrich(&k).await;
        assert_eq!(cached.tag, crate::models::FreshnessTag::Cache);
        assert_eq!(relay.calls.load(Ordering::SeqCst), 1);

        clock.set(start + Duration::hours(25));
        let third = enricher(relay.clone(), storage, clock);
        let fresh = third.enrich(&k).await;
        assert_eq!(fresh.payload.unwrap().note, "second");
        assert_eq!(fresh.tag, crate::models::FreshnessTag::Live);
        assert_eq!(relay.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_payload_is_a_failure_and_not_cached() {
        let relay = ScriptedRelay::new(&[(0, "{\"other\": 1}")]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let e = enricher(relay, storage.clone(), clock);

        let out = e.enrich(&kind(TtlClass::PerCurrency)).await;
        assert!(out.payload.is_none());
        assert!(out.error.unwrap().starts_with("AI unavailable: "));
        assert!(storage.get("fx_note_v1").is_none());
    }

    #[tokio::test]
    async fn test_older_tick_never_replaces_newer() {
        // Tick 0 call is slow, tick 1 call is fast.
        let relay = ScriptedRelay::new(&[(120, "{\"note\": \"old\"}"), (10, "{\"note\": \"new\"}")]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let e = Arc::new(enricher(relay, Arc::new(MemoryStore::new()), clock));
        let k = kind(TtlClass::PerCurrency);

        let slow = {
            let e = e.clone();
            let k = k.clone();
            tokio::spawn(async move { e.enrich(&k).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        e.refresh("fx_note_v1");
        let fast = e.enrich(&k).await;
        assert_eq!(fast.payload.unwrap().note, "new");

        slow.await.unwrap();
        assert_eq!(e.current(&k).payload.unwrap().note, "new");
    }

    #[tokio::test]
    async fn test_unpersisted_kind_memoises_by_inputs() {
        let relay = ScriptedRelay::new(&[(0, "{\"note\": \"a\"}"), (0, "{\"note\": \"b\"}")]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let e = enricher(relay.clone(), storage.clone(), clock);

        let k = kind(TtlClass::None);
        assert_eq!(e.enrich(&k).await.payload.unwrap().note, "a");
        assert_eq!(e.enrich(&k).await.payload.unwrap().note, "a");
        assert_eq!(relay.calls.load(Ordering::SeqCst), 1);
        assert!(storage.get("fx_note_v1").is_none());

        let changed = NoteKind {
            ttl: TtlClass::None,
            input: "new inputs".to_string(),
        };
        assert!(e.current(&changed).payload.is_none());
        assert_eq!(e.enrich(&changed).await.payload.unwrap().note, "b");
        assert_eq!(relay.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unpersisted_failure_clears_when_inputs_change() {
        let relay = ScriptedRelay::new(&[(0, "{\"other\": 1}"), (0, "{\"note\": \"retried\"}")]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let e = enricher(relay.clone(), Arc::new(MemoryStore::new()), clock);

        let k = kind(TtlClass::None);
        assert!(e.enrich(&k).await.error.is_some());
        assert!(e.current(&k).error.is_some());

        let changed = NoteKind {
            ttl: TtlClass::None,
            input: "new event set".to_string(),
        };
        let before = e.current(&changed);
        assert!(before.payload.is_none());
        assert!(before.error.is_none());
        assert!(!before.loading);

        assert_eq!(e.enrich(&changed).await.payload.unwrap().note, "retried");
        assert_eq!(relay.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_persisted_failure_holds_until_refresh() {
        let relay = ScriptedRelay::new(&[(0, "{\"other\": 1}"), (0, "{\"note\": \"after refresh\"}")]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let e = enricher(relay, Arc::new(MemoryStore::new()), clock);

        let k = kind(TtlClass::PerCurrency);
        e.enrich(&k).await;
        let changed = NoteKind {
            ttl: TtlClass::PerCurrency,
            input: "other inputs".to_string(),
        };
        assert!(e.current(&changed).error.is_some());

        e.refresh("fx_note_v1");
        assert!(e.current(&k).error.is_none());
        assert_eq!(e.enrich(&k).await.payload.unwrap().note, "after refresh");
    }
}

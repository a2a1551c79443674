// src/cache/mod.rs
//
// TTL cache for AI enrichment payloads, persisted through a `KeyValueStore`.
pub mod enricher;
pub mod inflight;
pub mod storage;

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::config::Clock;
use crate::models::FreshnessTag;
use storage::KeyValueStore;

pub use enricher::{ContentKind, Enricher};
pub use inflight::InFlight;

/// How long an enrichment payload stays trustworthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TtlClass {
    /// Per-currency brief.
    PerCurrency,
    /// Global brief.
    Global,
    /// Persisted with no expiry; replaced only by a manual refresh.
    Session,
    /// Never persisted; memoised in memory by input fingerprint.
    None,
}

impl TtlClass {
    pub fn ttl(self) -> Option<Duration> {
        match self {
            TtlClass::PerCurrency => Some(Duration::hours(24)),
            TtlClass::Global => Some(Duration::hours(4)),
            TtlClass::Session | TtlClass::None => None,
        }
    }

    pub fn persisted(self) -> bool {
        !matches!(self, TtlClass::None)
    }

    /// Expired iff `now - generated_at > ttl`. Exactly at the TTL is still fresh.
    pub fn is_expired(self, generated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.ttl() {
            Some(ttl) => now - generated_at > ttl,
            None => false,
        }
    }
}

/// The persisted shape: `{ "key", "payload", "generatedAt" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub payload: Value,
    pub generated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct EnrichmentCache {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl EnrichmentCache {
    pub fn new(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        EnrichmentCache { storage, clock }
    }

    /// Returns the entry only if it parses and has not expired. Expired entries stay on disk.
    pub fn read(&self, key: &str, ttl: TtlClass) -> Option<CacheEntry> {
        let raw = self.storage.get(key)?;
        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Cache entry {} unreadable, treating as miss: {}", key, e);
                return None;
            }
        };
        if entry.key != key {
            debug!("Cache entry under {} carries key {}, treating as miss", key, entry.key);
            return None;
        }
        if ttl.is_expired(entry.generated_at, self.clock.now()) {
            debug!("Cache entry {} expired (generated {})", key, entry.generated_at);
            return None;
        }
        Some(entry)
    }

    /// Stamps `generatedAt` with the current time and persists. Last write wins.
    pub fn write(&self, key: &str, payload: Value) -> DateTime<Utc> {
        let generated_at = self.clock.now();
        self.write_entry(&CacheEntry {
            key: key.to_string(),
            payload,
            generated_at,
        });
        generated_at
    }

    /// Persists an entry whose timestamp was taken elsewhere. Failures are logged and dropped.
    pub fn write_entry(&self, entry: &CacheEntry) {
        let raw = match serde_json::to_string(entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize cache entry {}: {}", entry.key, e);
                return;
            }
        };
        if let Err(e) = self.storage.set(&entry.key, &raw) {
            warn!("Failed to persist cache entry {}: {}", entry.key, e);
        }
    }

    pub fn invalidate(&self, key: &str) {
        if let Err(e) = self.storage.remove(key) {
            warn!("Failed to invalidate cache entry {}: {}", key, e);
        }
    }
}

/// Trusted enrichment for one content key as handed to merge functions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrichment<T> {
    pub payload: Option<T>,
    pub tag: FreshnessTag,
    pub generated_at: Option<DateTime<Utc>>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for Enrichment<T> {
    fn default() -> Self {
        Enrichment {
            payload: None,
            tag: FreshnessTag::Stale,
            generated_at: None,
            loading: false,
            error: None,
        }
    }
}

impl<T> Enrichment<T> {
    pub fn absent() -> Self {
        Self::default()
    }

    /// Generated during this session.
    pub fn fresh(payload: T, generated_at: DateTime<Utc>) -> Self {
        Enrichment {
            payload: Some(payload),
            tag: FreshnessTag::Live,
            generated_at: Some(generated_at),
            ..Self::default()
        }
    }

    /// Read back from persisted storage.
    pub fn cached(payload: T, generated_at: DateTime<Utc>) -> Self {
        Enrichment {
            payload: Some(payload),
            tag: FreshnessTag::Cache,
            generated_at: Some(generated_at),
            ..Self::default()
        }
    }

    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Enrichment {
            error: Some(format!("AI unavailable: {}", reason)),
            ..Self::default()
        }
    }

    /// The payload together with the tag it earns in a merge.
    pub fn sourced(&self) -> Option<(&T, FreshnessTag)> {
        self.payload.as_ref().map(|p| (p, self.tag))
    }
}

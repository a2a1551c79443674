// src/merge/mod.rs
//
// Pure functions from (baseline, live state, enrichment) to view models.
// Nothing here touches the network, the clock or the store lock.
pub mod currency;
pub mod dashboard;
pub mod execution;
pub mod format;
pub mod markets;
pub mod sections;
pub mod yields;

use serde::Serialize;

use crate::models::FreshnessTag;

pub use dashboard::{build_dashboard, build_markets, DashboardView, Enrichments, MarketsView};

/// Shown when not even a baseline value exists.
pub const PLACEHOLDER: &str = "—";

/// Every candidate value for one displayed field, strongest first.
#[derive(Debug, Clone)]
pub struct Sources<T> {
    pub manual: Option<T>,
    /// Value from the store with the domain's fetch tag.
    pub live: Option<(T, FreshnessTag)>,
    /// Value from an AI enrichment with its provenance tag.
    pub enriched: Option<(T, FreshnessTag)>,
    pub baseline: Option<T>,
}

impl<T> Default for Sources<T> {
    fn default() -> Self {
        Sources {
            manual: None,
            live: None,
            enriched: None,
            baseline: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved<T> {
    pub value: T,
    pub tag: FreshnessTag,
}

impl<T> Sources<T> {
    pub fn resolve(self) -> Option<Resolved<T>> {
        if let Some(value) = self.manual {
            return Some(Resolved {
                value,
                tag: FreshnessTag::Manual,
            });
        }
        if let Some((value, tag)) = self.live.filter(|(_, tag)| tag.is_live()) {
            return Some(Resolved { value, tag });
        }
        if let Some((value, tag)) = self.enriched {
            return Some(Resolved { value, tag });
        }
        self.baseline.map(|value| Resolved {
            value,
            tag: FreshnessTag::Stale,
        })
    }
}

/// Tag of a value derived from several inputs: the least authoritative one.
pub fn weakest_link<I: IntoIterator<Item = FreshnessTag>>(tags: I) -> FreshnessTag {
    tags.into_iter()
        .reduce(FreshnessTag::weakest)
        .unwrap_or(FreshnessTag::Stale)
}

/// A displayed string and its provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub v: String,
    pub src: FreshnessTag,
}

impl Field {
    pub fn placeholder() -> Self {
        Field {
            v: PLACEHOLDER.to_string(),
            src: FreshnessTag::Stale,
        }
    }
}

impl From<Option<Resolved<String>>> for Field {
    fn from(r: Option<Resolved<String>>) -> Self {
        match r {
            Some(r) => Field {
                v: r.value,
                src: r.tag,
            },
            None => Field::placeholder(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> Sources<&'static str> {
        Sources {
            manual: Some("2.50%"),
            live: Some(("2.40%", FreshnessTag::Live)),
            enriched: Some(("2.45%", FreshnessTag::Cache)),
            baseline: Some("2.65%"),
        }
    }

    #[test]
    fn test_manual_beats_live() {
        let r = sources().resolve().unwrap();
        assert_eq!(r.value, "2.50%");
        assert_eq!(r.tag, FreshnessTag::Manual);
    }

    #[test]
    fn test_precedence_falls_through_in_order() {
        let mut s = sources();
        s.manual = None;
        assert_eq!(s.clone().resolve().unwrap().tag, FreshnessTag::Live);

        s.live = None;
        assert_eq!(s.clone().resolve().unwrap().value, "2.45%");

        s.enriched = None;
        let r = s.clone().resolve().unwrap();
        assert_eq!((r.value, r.tag), ("2.65%", FreshnessTag::Stale));

        s.baseline = None;
        assert!(s.resolve().is_none());
        assert_eq!(Field::from(None).v, PLACEHOLDER);
    }

    #[test]
    fn test_non_live_store_value_is_not_live() {
        let s = Sources {
            live: Some(("2.40%", FreshnessTag::Stale)),
            baseline: Some("2.65%"),
            ..Sources::default()
        };
        assert_eq!(s.resolve().unwrap().value, "2.65%");
    }

    #[test]
    fn test_weakest_link() {
        use FreshnessTag::*;
        assert_eq!(weakest_link([Live, Stale]), Stale);
        assert_eq!(weakest_link([Live, LivePartial]), LivePartial);
        assert_eq!(weakest_link([Manual, Live]), Manual);
        assert_eq!(weakest_link([Cache, Manual]), Cache);
        assert_eq!(weakest_link(Vec::new()), Stale);
    }
}

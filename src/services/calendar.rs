// src/services/calendar.rs
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use chrono_tz::Tz;
use log::{error, info, warn};
use serde::Deserialize;

use super::http::Http;
use super::{trim_base, SourceClient};
use crate::error::{Result, SourceError};
use crate::models::{CalendarEvent, DataDomain, Impact, Patch};

pub const G10: [&str; 8] = ["AUD", "USD", "EUR", "GBP", "JPY", "CHF", "CAD", "NZD"];

const PLACEHOLDER: &str = "—";

/// One row of the ForexFactory weekly feed.
#[derive(Debug, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub forecast: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub actual: Option<String>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Display date and time for an event timestamp.
///
/// Midnight UTC marks an all-day event and keeps its UTC date.
pub fn format_when(ts: &DateTime<FixedOffset>, tz: Tz) -> (String, String) {
    let utc = ts.with_timezone(&Utc);
    if utc.hour() == 0 && utc.minute() == 0 {
        return (utc.format("%a, %b %-d").to_string(), "All Day".to_string());
    }
    let local = ts.with_timezone(&tz);
    (
        local.format("%a, %b %-d").to_string(),
        local.format("%-I:%M%P %Z").to_string(),
    )
}

/// Keeps G10 events and shapes them for display.
pub fn transform(raw: Vec<RawEvent>, tz: Tz) -> Vec<CalendarEvent> {
    raw.into_iter()
        .filter_map(|e| {
            let currency = e.country.trim().to_uppercase();
            if !G10.contains(&currency.as_str()) {
                return None;
            }
            let parsed = e
                .date
                .as_deref()
                .and_then(|d| DateTime::parse_from_rfc3339(d).ok());
            let (date, time) = match &parsed {
                Some(ts) => format_when(ts, tz),
                None => (e.date.clone().unwrap_or_default(), String::new()),
            };
            Some(CalendarEvent {
                currency,
                date,
                time,
                iso_date: e.date,
                event: e.title.trim().to_string(),
                impact: Impact::normalise(&e.impact),
                forecast: non_empty(e.forecast).unwrap_or_else(|| PLACEHOLDER.to_string()),
                previous: non_empty(e.previous).unwrap_or_else(|| PLACEHOLDER.to_string()),
                actual: non_empty(e.actual),
            })
        })
        .collect()
}

/// This week and next week of G10 events from the ForexFactory JSON feed.
pub struct ForexFactoryClient {
    http: Http,
    base: String,
    tz: Tz,
}

impl ForexFactoryClient {
    pub fn new(http: Http, base: &str, tz: Tz) -> Self {
        ForexFactoryClient {
            http,
            base: trim_base(base),
            tz,
        }
    }

    async fn fetch_week(&self, which: &str) -> Result<Vec<RawEvent>> {
        let urls = [
            format!("{}/ff_calendar_{}week.json?timezone=UTC", self.base, which),
            format!("{}/ff_calendar_{}week.json", self.base, which),
        ];
        let mut last_err = None;
        for url in &urls {
            match self.http.get_json::<Vec<RawEvent>>("ForexFactory", url).await {
                Ok(events) => return Ok(events),
                Err(e) => {
                    warn!("[Calendar] {} failed: {}", url, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| SourceError::Empty(format!("{}week", which))))
    }
}

#[async_trait]
impl SourceClient for ForexFactoryClient {
    fn name(&self) -> &'static str {
        "ForexFactory"
    }

    fn domain(&self) -> DataDomain {
        DataDomain::Calendar
    }

    async fn fetch(&self) -> Result<Patch> {
        let (this_week, next_week) = tokio::join!(self.fetch_week("this"), self.fetch_week("next"));

        let mut patch = Patch::default();
        let mut raw = Vec::new();
        for (which, result) in [("thisweek", this_week), ("nextweek", next_week)] {
            match result {
                Ok(mut events) => raw.append(&mut events),
                Err(e) => {
                    error!("[Calendar] {}: {}", which, e);
                    patch.errors.insert(which.to_string(), e.to_string());
                }
            }
        }
        if raw.is_empty() && patch.errors.len() == 2 {
            return Err(SourceError::Empty("ForexFactory calendar unavailable".into()));
        }

        let events = transform(raw, self.tz);
        for ev in events {
            patch.calendar.entry(ev.currency.clone()).or_default().push(ev);
        }
        patch.calendar_fetched_at = Some(Utc::now());
        info!(
            "[Calendar] {} currencies, {} events",
            patch.calendar.len(),
            patch.calendar.values().map(Vec::len).sum::<usize>()
        );
        Ok(patch)
    }
}

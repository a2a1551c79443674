// src/config.rs
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::{info, warn};
use parking_lot::Mutex;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Credentials a source client may need before it is eligible to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    Fred,
    TwelveData,
    AiRelay,
}

impl Credential {
    pub fn env_var(&self) -> &'static str {
        match self {
            Credential::Fred => "FRED_API_KEY",
            Credential::TwelveData => "TWELVE_DATA_KEY",
            Credential::AiRelay => "AI_RELAY_URL",
        }
    }
}

/// Upstream base URLs. Overridable so tests can point clients at a mock server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub frankfurter: String,
    pub treasury: String,
    pub ecb: String,
    pub boc: String,
    pub snb: String,
    pub yahoo: String,
    pub cftc: String,
    pub forex_factory: String,
    pub fred: String,
    pub fxstreet_rss: String,
    pub forexlive_rss: String,
    pub dailyfx_rss: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            frankfurter: "https://api.frankfurter.app".to_string(),
            treasury: "https://home.treasury.gov".to_string(),
            ecb: "https://data-api.ecb.europa.eu".to_string(),
            boc: "https://www.bankofcanada.ca".to_string(),
            snb: "https://data.snb.ch".to_string(),
            yahoo: "https://query1.finance.yahoo.com".to_string(),
            cftc: "https://publicreporting.cftc.gov".to_string(),
            forex_factory: "https://nfs.faireconomy.media".to_string(),
            fred: "https://api.stlouisfed.org".to_string(),
            fxstreet_rss: "https://www.fxstreet.com/rss/news".to_string(),
            forexlive_rss: "https://forexlive.com/feed/news".to_string(),
            dailyfx_rss: "https://www.dailyfx.com/feeds/all".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub fred_api_key: Option<String>,
    pub twelve_data_key: Option<String>,
    pub ai_relay_url: Option<String>,
    /// Forces one model for every relay call; otherwise each content kind picks its own.
    pub ai_model: Option<String>,
    pub storage_path: PathBuf,
    /// Bound on every single HTTP request.
    pub request_timeout: Duration,
    /// Bound on one source client's whole run inside a fetch cycle.
    pub client_deadline: Duration,
    pub display_tz: Tz,
    pub endpoints: Endpoints,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            port: 3030,
            fred_api_key: None,
            twelve_data_key: None,
            ai_relay_url: None,
            ai_model: None,
            storage_path: PathBuf::from("data/storage.json"),
            request_timeout: Duration::from_secs(8),
            client_deadline: Duration::from_secs(25),
            display_tz: Tz::UTC,
            endpoints: Endpoints::default(),
        }
    }
}

fn non_empty(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Settings {
    /// Reads the environment (after `dotenv`), falling back to defaults with a warning.
    pub fn from_env() -> Self {
        let defaults = Settings::default();

        let port = match non_empty("PORT") {
            Some(p) => p.parse().unwrap_or_else(|_| {
                warn!("PORT '{}' is not a number, defaulting to {}", p, defaults.port);
                defaults.port
            }),
            None => {
                warn!("$PORT not set, defaulting to {}", defaults.port);
                defaults.port
            }
        };

        let secs = |var: &str, fallback: Duration| -> Duration {
            non_empty(var)
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };

        let display_tz = match non_empty("DISPLAY_TZ") {
            Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
                warn!("Unknown DISPLAY_TZ '{}', using UTC", name);
                Tz::UTC
            }),
            None => Tz::UTC,
        };

        let mut endpoints = Endpoints::default();
        if let Some(url) = non_empty("TREASURY_BASE_URL") {
            endpoints.treasury = url;
        }
        if let Some(url) = non_empty("YAHOO_BASE_URL") {
            endpoints.yahoo = url;
        }

        let settings = Settings {
            port,
            fred_api_key: non_empty("FRED_API_KEY"),
            twelve_data_key: non_empty("TWELVE_DATA_KEY"),
            ai_relay_url: non_empty("AI_RELAY_URL"),
            ai_model: non_empty("AI_MODEL"),
            storage_path: non_empty("STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_path),
            request_timeout: secs("FETCH_TIMEOUT_SECS", defaults.request_timeout),
            client_deadline: secs("CLIENT_DEADLINE_SECS", defaults.client_deadline),
            display_tz,
            endpoints,
        };

        info!(
            "Settings loaded: port={}, fred={}, ai_relay={}, storage={}",
            settings.port,
            settings.has(Credential::Fred),
            settings.has(Credential::AiRelay),
            settings.storage_path.display()
        );
        settings
    }

    /// Presence of a credential is the only thing configuration gates.
    pub fn has(&self, credential: Credential) -> bool {
        match credential {
            Credential::Fred => self.fred_api_key.is_some(),
            Credential::TwelveData => self.twelve_data_key.is_some(),
            Credential::AiRelay => self.ai_relay_url.is_some(),
        }
    }
}

/// Source of "now" for TTL checks and fetch timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock { now: Mutex::new(start) }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

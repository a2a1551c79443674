//! End-to-end flow through the HTTP routes: fetch cycle, merge, overrides and
//! AI enrichment, with every external service faked or served by mockito.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use fx_dashboard::app::AppContext;
use fx_dashboard::baseline::Baseline;
use fx_dashboard::cache::storage::{KeyValueStore, MemoryStore};
use fx_dashboard::cache::CacheEntry;
use fx_dashboard::config::{ManualClock, Settings};
use fx_dashboard::error::{Result, SourceError};
use fx_dashboard::models::{CalendarEvent, DataDomain, Impact, Patch};
use fx_dashboard::routes::routes;
use fx_dashboard::services::ai::{AiRelay, RelayRequest, RelayResponse};
use fx_dashboard::services::fred::FredUsMacroClient;
use fx_dashboard::services::http::Http;
use fx_dashboard::services::treasury::TreasuryClient;
use fx_dashboard::services::SourceClient;

// =============================================================================
// Fakes
// =============================================================================

struct StaticClient {
    name: &'static str,
    domain: DataDomain,
    patch: std::result::Result<Patch, &'static str>,
}

#[async_trait]
impl SourceClient for StaticClient {
    fn name(&self) -> &'static str {
        self.name
    }

    fn domain(&self) -> DataDomain {
        self.domain
    }

    async fn fetch(&self) -> Result<Patch> {
        self.patch
            .clone()
            .map_err(|e| SourceError::Empty(e.to_string()))
    }
}

/// Gives every relay call the same reply, or fails them all when there is none.
struct FixedRelay {
    calls: AtomicUsize,
    reply: Option<String>,
}

impl FixedRelay {
    fn new(reply: Option<&str>) -> Arc<Self> {
        Arc::new(FixedRelay {
            calls: AtomicUsize::new(0),
            reply: reply.map(String::from),
        })
    }
}

#[async_trait]
impl AiRelay for FixedRelay {
    async fn complete(&self, _request: &RelayRequest) -> Result<RelayResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Some(text) => Ok(RelayResponse::from_text(text)),
            None => Err(SourceError::Status {
                source_name: "AI relay".into(),
                status: 529,
            }),
        }
    }
}

/// Fails the first trigger call and answers the rest; every other kind fails.
struct TriggerRelay {
    trigger_calls: AtomicUsize,
}

#[async_trait]
impl AiRelay for TriggerRelay {
    async fn complete(&self, request: &RelayRequest) -> Result<RelayResponse> {
        let overloaded = SourceError::Status {
            source_name: "AI relay".into(),
            status: 529,
        };
        if !request.system.contains("trade trigger") {
            return Err(overloaded);
        }
        if self.trigger_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(overloaded);
        }
        Ok(RelayResponse::from_text(
            r#"[{"event": "CPI Flash Estimate y/y", "trigger": "Above 2.5% lifts EUR", "direction": "bullish"}]"#,
        ))
    }
}

const BRIEF: &str = r#"{
  "cbSpeeches": [{"speaker": "Lagarde", "date": "February 20, 2026", "text": "Policy is in a good place.", "implication": "Hold"}],
  "geopolitical": [{"title": "US tariff threat", "effect": "bearish", "analysis": "EU exporters exposed"}],
  "pairThesis": [],
  "cotCommentary": "Specs trimmed longs."
}"#;

fn start() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 24, 9, 0, 0).unwrap()
}

fn context(
    clients: Vec<Arc<dyn SourceClient>>,
    relay: Option<Arc<dyn AiRelay>>,
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<ManualClock>,
) -> Arc<AppContext> {
    Arc::new(AppContext::with_parts(
        Settings::default(),
        Baseline::bundled().unwrap(),
        storage,
        clock,
        clients,
        relay,
    ))
}

async fn get(ctx: &Arc<AppContext>, path: &str) -> (u16, Value) {
    let resp = warp::test::request()
        .method("GET")
        .path(path)
        .reply(&routes(ctx.clone()))
        .await;
    let body = serde_json::from_slice(resp.body()).unwrap_or(Value::Null);
    (resp.status().as_u16(), body)
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_treasury_patch_shows_live_yield() {
    let mut server = mockito::Server::new_async().await;
    let _curve = server
        .mock("GET", mockito::Matcher::Regex("daily-treasury-rates".into()))
        .match_query(mockito::Matcher::Any)
        .with_body("Date,\"2 Yr\",\"5 Yr\",\"10 Yr\",\"30 Yr\"\n02/23/2026,4.20,4.25,4.50,4.75\n")
        .create_async()
        .await;

    let http = Http::new(Duration::from_secs(5)).unwrap();
    let clients: Vec<Arc<dyn SourceClient>> = vec![Arc::new(TreasuryClient::new(http, &server.url()))];
    let ctx = context(
        clients,
        None,
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::new(start())),
    );

    let report = ctx.orchestrator.fetch_all().await;
    assert_eq!(report.applied(), 1);

    let (status, markets) = get(&ctx, "/api/v1/markets").await;
    assert_eq!(status, 200);
    let ten = &markets["yields"]["US10Y"];
    assert_eq!(ten["v"], "4.50%");
    assert_eq!(ten["chg"], "+0.08%");
    assert_eq!(ten["dir"], "up");
    assert_eq!(ten["src"], "live");
}

#[tokio::test]
async fn test_without_fred_key_yields_stay_on_baseline() {
    let http = Http::new(Duration::from_secs(1)).unwrap();
    let clients: Vec<Arc<dyn SourceClient>> = vec![
        Arc::new(FredUsMacroClient::new(http, "http://127.0.0.1:9", None)),
        Arc::new(StaticClient {
            name: "Treasury",
            domain: DataDomain::Yields,
            patch: Err("HTTP 503"),
        }),
    ];
    let ctx = context(
        clients,
        None,
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::new(start())),
    );

    let report = ctx.orchestrator.fetch_all().await;
    assert_eq!((report.applied(), report.failed(), report.skipped()), (0, 1, 1));

    let (_, markets) = get(&ctx, "/api/v1/markets").await;
    assert_eq!(markets["yields"]["US10Y"]["v"], "4.42%");
    assert_eq!(markets["yields"]["US10Y"]["src"], "stale");
    assert_eq!(markets["yields"]["realRate10y"]["src"], "stale");

    let (_, status) = get(&ctx, "/api/v1/status").await;
    assert_eq!(status["status"]["usMacro"], "stale");
    assert_eq!(status["fetchPhase"], "done");
}

#[tokio::test]
async fn test_manual_rate_beats_live_rate() {
    let mut rates = Patch::default();
    rates.cb_rates.insert("EUR".into(), "2.40%".into());
    let clients: Vec<Arc<dyn SourceClient>> = vec![Arc::new(StaticClient {
        name: "CB rates",
        domain: DataDomain::CbRates,
        patch: Ok(rates),
    })];
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(start()));
    let ctx = context(clients, None, storage.clone(), clock.clone());
    ctx.orchestrator.fetch_all().await;

    let (_, before) = get(&ctx, "/api/v1/dashboard/eur").await;
    assert_eq!(before["currency"]["interestRate"]["v"], "2.40%");
    assert_eq!(before["currency"]["interestRate"]["src"], "live");

    let resp = warp::test::request()
        .method("PUT")
        .path("/api/v1/overrides/cb/eur")
        .json(&json!({ "rate": "2.50%" }))
        .reply(&routes(ctx.clone()))
        .await;
    assert_eq!(resp.status().as_u16(), 200);

    let (_, after) = get(&ctx, "/api/v1/dashboard/EUR").await;
    assert_eq!(after["currency"]["interestRate"]["v"], "2.50%");
    assert_eq!(after["currency"]["interestRate"]["src"], "manual");

    // the override outlives the session
    let restarted = context(Vec::new(), None, storage, clock);
    let (_, reloaded) = get(&restarted, "/api/v1/dashboard/EUR").await;
    assert_eq!(reloaded["currency"]["interestRate"]["v"], "2.50%");
}

#[tokio::test]
async fn test_expired_brief_is_requested_again() {
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(start()));
    let old = CacheEntry {
        key: "fx_aib_v1_EUR".into(),
        payload: serde_json::from_str(BRIEF).unwrap(),
        generated_at: start() - chrono::Duration::hours(25),
    };
    storage
        .set(&old.key, &serde_json::to_string(&old).unwrap())
        .unwrap();

    // global brief and matrix are requested too; they reject this reply
    let relay = FixedRelay::new(Some(BRIEF));
    let ctx = context(Vec::new(), Some(relay.clone()), storage, clock);

    let (_, first) = get(&ctx, "/api/v1/dashboard/EUR").await;
    assert_eq!(first["currency"]["geopolitical"]["src"], "stale");
    assert_eq!(first["currency"]["geopolitical"]["loading"], true);

    let mut brief_src = Value::Null;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let (_, view) = get(&ctx, "/api/v1/dashboard/EUR").await;
        brief_src = view["currency"]["geopolitical"]["src"].clone();
        if brief_src == "live" {
            assert_eq!(
                view["currency"]["geopolitical"]["items"][0]["title"],
                "US tariff threat"
            );
            break;
        }
    }
    assert_eq!(brief_src, "live");
    assert!(relay.calls.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_ai_failure_surfaces_as_message() {
    let relay = FixedRelay::new(None);
    let ctx = context(
        Vec::new(),
        Some(relay),
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::new(start())),
    );

    get(&ctx, "/api/v1/dashboard/USD").await;
    let mut error = Value::Null;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let (_, view) = get(&ctx, "/api/v1/dashboard/USD").await;
        error = view["global"]["error"].clone();
        if !error.is_null() {
            break;
        }
    }
    assert_eq!(error, "AI unavailable: AI relay HTTP 529");
}

#[tokio::test]
async fn test_rejections_carry_status_and_message() {
    let ctx = context(
        Vec::new(),
        None,
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::new(start())),
    );

    let (status, body) = get(&ctx, "/api/v1/dashboard/XYZ").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "Unknown currency: XYZ");

    let resp = warp::test::request()
        .method("PUT")
        .path("/api/v1/overrides/yields/us7y")
        .json(&json!({ "value": 4.1 }))
        .reply(&routes(ctx.clone()))
        .await;
    assert_eq!(resp.status().as_u16(), 400);

    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/briefs/global/refresh")
        .reply(&routes(ctx.clone()))
        .await;
    assert_eq!(resp.status().as_u16(), 503);
}

#[tokio::test]
async fn test_position_plan_endpoint() {
    let ctx = context(
        Vec::new(),
        None,
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::new(start())),
    );
    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/execution/position")
        .json(&json!({ "pair": "EUR/USD", "account": 10000.0, "riskPct": 1.0, "stopPips": 80.0 }))
        .reply(&routes(ctx))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let plan: Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(plan["riskAmount"], 100.0);
    assert_eq!(plan["suggestedStop"], 85);
    assert_eq!(plan["rating"], "conservative");
    assert_eq!(plan["src"], "stale");
}

#[tokio::test]
async fn test_failed_triggers_recover_after_refresh() {
    let mut calendar = Patch::default();
    calendar.calendar.insert(
        "EUR".into(),
        vec![CalendarEvent {
            currency: "EUR".into(),
            date: "Tue, Mar 3".into(),
            time: "10:00am UTC".into(),
            iso_date: None,
            event: "CPI Flash Estimate y/y".into(),
            impact: Impact::High,
            forecast: "2.3%".into(),
            previous: "2.2%".into(),
            actual: None,
        }],
    );
    let clients: Vec<Arc<dyn SourceClient>> = vec![Arc::new(StaticClient {
        name: "ForexFactory",
        domain: DataDomain::Calendar,
        patch: Ok(calendar),
    })];
    let relay = Arc::new(TriggerRelay {
        trigger_calls: AtomicUsize::new(0),
    });
    let ctx = context(
        clients,
        Some(relay.clone()),
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::new(start())),
    );
    ctx.orchestrator.fetch_all().await;

    get(&ctx, "/api/v1/dashboard/EUR").await;
    let mut error = Value::Null;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let (_, view) = get(&ctx, "/api/v1/dashboard/EUR").await;
        error = view["calendar"]["triggersError"].clone();
        if !error.is_null() {
            break;
        }
    }
    assert_eq!(error, "AI unavailable: AI relay HTTP 529");

    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/briefs/triggers/eur/refresh")
        .reply(&routes(ctx.clone()))
        .await;
    assert_eq!(resp.status().as_u16(), 202);

    let mut view = Value::Null;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        view = get(&ctx, "/api/v1/dashboard/EUR").await.1;
        if view["calendar"]["triggersSrc"] == "live" {
            break;
        }
    }
    assert_eq!(view["calendar"]["triggersSrc"], "live");
    assert!(view["calendar"]["triggersError"].is_null());
    assert_eq!(view["calendar"]["events"][0]["trigger"]["direction"], "bullish");
    assert_eq!(relay.trigger_calls.load(Ordering::SeqCst), 2);

    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/briefs/triggers/jpy/refresh")
        .reply(&routes(ctx.clone()))
        .await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn test_back_to_back_refresh_starts_one_cycle() {
    let ctx = context(
        Vec::new(),
        None,
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::new(start())),
    );
    assert!(ctx.spawn_fetch());
    assert!(!ctx.spawn_fetch());
}

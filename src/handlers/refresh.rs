// src/handlers/refresh.rs
use log::info;
use serde_json::json;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::with_status;
use warp::Rejection;

use super::error::ApiError;
use crate::app::AppContext;
use crate::cache::{ContentKind, Enricher};
use crate::merge::currency::interest_rate;
use crate::services::briefs::{
    CalendarTriggerRequest, CurrencyBriefRequest, GlobalBriefRequest, MatrixRequest,
};

pub async fn post_refresh(ctx: Arc<AppContext>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling request to refresh live data");
    let started = ctx.spawn_fetch();
    Ok(with_status(
        warp::reply::json(&json!({
            "started": started,
            "fetchPhase": ctx.store.fetch_phase(),
        })),
        StatusCode::ACCEPTED,
    ))
}

fn enricher(ctx: &AppContext) -> Result<&Arc<Enricher>, Rejection> {
    ctx.enricher
        .as_ref()
        .ok_or_else(|| warp::reject::custom(ApiError::unavailable("AI relay not configured")))
}

/// Bumps the key's tick and asks again right away.
fn restart<K: ContentKind>(enricher: &Arc<Enricher>, kind: K) -> impl warp::Reply {
    let key = kind.cache_key();
    let tick = enricher.refresh(&key);
    enricher.spawn_enrich(kind);
    with_status(
        warp::reply::json(&json!({ "key": key, "tick": tick })),
        StatusCode::ACCEPTED,
    )
}

pub async fn post_brief_refresh(ccy: String, ctx: Arc<AppContext>) -> Result<impl warp::Reply, Rejection> {
    let ccy = ccy.to_uppercase();
    let enricher = enricher(&ctx)?;
    let state = ctx.store.snapshot();
    let rate = interest_rate(&ccy, &ctx.baseline, &state).v;
    let today = ctx.clock.now().date_naive();
    let kind = CurrencyBriefRequest::new(&ctx.baseline, &ccy, &rate, state.cot.get(&ccy).copied(), today)
        .ok_or_else(|| warp::reject::custom(ApiError::unknown_currency(&ccy)))?;
    info!("Refreshing {} brief", ccy);
    Ok(restart(enricher, kind))
}

pub async fn post_global_refresh(ctx: Arc<AppContext>) -> Result<impl warp::Reply, Rejection> {
    let enricher = enricher(&ctx)?;
    info!("Refreshing global brief");
    let today = ctx.clock.now().date_naive();
    Ok(restart(enricher, GlobalBriefRequest { today }))
}

pub async fn post_matrix_refresh(ctx: Arc<AppContext>) -> Result<impl warp::Reply, Rejection> {
    let enricher = enricher(&ctx)?;
    info!("Refreshing matrix classification");
    Ok(restart(enricher, MatrixRequest::from_baseline(&ctx.baseline)))
}

pub async fn post_triggers_refresh(ccy: String, ctx: Arc<AppContext>) -> Result<impl warp::Reply, Rejection> {
    let ccy = ccy.to_uppercase();
    let enricher = enricher(&ctx)?;
    if ctx.baseline.currency(&ccy).is_none() {
        return Err(warp::reject::custom(ApiError::unknown_currency(&ccy)));
    }
    let state = ctx.store.snapshot();
    let events = state.calendar.get(&ccy).map(Vec::as_slice).unwrap_or(&[]);
    let kind = CalendarTriggerRequest::for_events(&ccy, events).ok_or_else(|| {
        warp::reject::custom(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("No pending events for {}", ccy),
        ))
    })?;
    info!("Refreshing {} calendar triggers", ccy);
    Ok(restart(enricher, kind))
}

// src/handlers/dashboard.rs
use log::{debug, info};
use serde_json::json;
use std::sync::Arc;
use warp::Rejection;

use super::error::ApiError;
use crate::app::AppContext;
use crate::merge::dashboard::domain_status;
use crate::merge::{build_dashboard, build_markets};

pub async fn get_dashboard(ccy: String, ctx: Arc<AppContext>) -> Result<impl warp::Reply, Rejection> {
    let ccy = ccy.to_uppercase();
    info!("Handling request for {} dashboard", ccy);

    let state = ctx.store.snapshot();
    let enrichments = ctx.enrichments(&ccy, &state);
    let now = ctx.clock.now();

    match build_dashboard(&ccy, &ctx.baseline, &state, &enrichments, now) {
        Some(view) => {
            debug!("{} dashboard built, fetch phase {:?}", ccy, view.fetch_phase);
            Ok(warp::reply::json(&view))
        }
        None => Err(warp::reject::custom(ApiError::unknown_currency(&ccy))),
    }
}

pub async fn get_markets(ctx: Arc<AppContext>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling request for market data");
    let state = ctx.store.snapshot();
    Ok(warp::reply::json(&build_markets(&ctx.baseline, &state)))
}

pub async fn get_status(ctx: Arc<AppContext>) -> Result<impl warp::Reply, Rejection> {
    let state = ctx.store.snapshot();
    Ok(warp::reply::json(&json!({
        "status": domain_status(&state),
        "fetchPhase": state.fetch_phase,
        "lastFetch": state.last_fetch,
        "overrides": state.overrides,
        "aiEnabled": ctx.enricher.is_some(),
    })))
}

// src/handlers/execution.rs
use log::info;
use std::sync::Arc;
use warp::Rejection;

use super::error::ApiError;
use crate::app::AppContext;
use crate::merge::execution::{position_plan, PositionInput};

pub async fn post_position(input: PositionInput, ctx: Arc<AppContext>) -> Result<impl warp::Reply, Rejection> {
    if input.account <= 0.0 || input.risk_pct <= 0.0 || input.stop_pips <= 0.0 {
        return Err(warp::reject::custom(ApiError::bad_request(
            "account, riskPct and stopPips must be positive",
        )));
    }
    info!(
        "Sizing {} at {}% risk, {} pip stop",
        input.pair, input.risk_pct, input.stop_pips
    );
    let state = ctx.store.snapshot();
    Ok(warp::reply::json(&position_plan(&input, &ctx.baseline, &state)))
}

// src/handlers/overrides.rs
use log::info;
use serde::Deserialize;
use std::sync::Arc;
use warp::Rejection;

use super::error::ApiError;
use crate::app::AppContext;
use crate::baseline::parse_display_number;
use crate::merge::yields::TENORS;

#[derive(Debug, Deserialize)]
pub struct CbRateBody {
    pub rate: String,
}

#[derive(Debug, Deserialize)]
pub struct YieldBody {
    pub value: f64,
}

fn known_currency(ctx: &AppContext, ccy: &str) -> Result<String, Rejection> {
    let ccy = ccy.to_uppercase();
    if ctx.baseline.currency(&ccy).is_none() {
        return Err(warp::reject::custom(ApiError::unknown_currency(&ccy)));
    }
    Ok(ccy)
}

fn known_tenor(tenor: &str) -> Result<String, Rejection> {
    let tenor = tenor.to_uppercase();
    if !TENORS.contains(&tenor.as_str()) {
        return Err(warp::reject::custom(ApiError::bad_request(format!(
            "Unknown tenor: {}",
            tenor
        ))));
    }
    Ok(tenor)
}

pub async fn put_cb_override(
    ccy: String,
    body: CbRateBody,
    ctx: Arc<AppContext>,
) -> Result<impl warp::Reply, Rejection> {
    let ccy = known_currency(&ctx, &ccy)?;
    if parse_display_number(&body.rate).is_none() {
        return Err(warp::reject::custom(ApiError::bad_request(format!(
            "Not a rate: {}",
            body.rate
        ))));
    }
    info!("Manual {} policy rate set to {}", ccy, body.rate);
    ctx.store.set_cb_override(&ccy, &body.rate);
    Ok(warp::reply::json(&ctx.store.overrides()))
}

pub async fn delete_cb_override(ccy: String, ctx: Arc<AppContext>) -> Result<impl warp::Reply, Rejection> {
    let ccy = known_currency(&ctx, &ccy)?;
    info!("Manual {} policy rate cleared", ccy);
    ctx.store.clear_cb_override(&ccy);
    Ok(warp::reply::json(&ctx.store.overrides()))
}

pub async fn put_yield_override(
    tenor: String,
    body: YieldBody,
    ctx: Arc<AppContext>,
) -> Result<impl warp::Reply, Rejection> {
    let tenor = known_tenor(&tenor)?;
    if !body.value.is_finite() {
        return Err(warp::reject::custom(ApiError::bad_request("Yield must be a number")));
    }
    info!("Manual {} yield set to {}", tenor, body.value);
    ctx.store.set_yield_override(&tenor, body.value);
    Ok(warp::reply::json(&ctx.store.overrides()))
}

pub async fn delete_yield_override(tenor: String, ctx: Arc<AppContext>) -> Result<impl warp::Reply, Rejection> {
    let tenor = known_tenor(&tenor)?;
    info!("Manual {} yield cleared", tenor);
    ctx.store.clear_yield_override(&tenor);
    Ok(warp::reply::json(&ctx.store.overrides()))
}

pub async fn reset_overrides(ctx: Arc<AppContext>) -> Result<impl warp::Reply, Rejection> {
    info!("All manual overrides cleared");
    ctx.store.clear_overrides();
    Ok(warp::reply::json(&ctx.store.overrides()))
}

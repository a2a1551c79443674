// src/routes.rs
use log::info;
use std::convert::Infallible;
use std::sync::Arc;
use warp::reject::Rejection;
use warp::{Filter, Reply};

use crate::app::AppContext;
use crate::handlers::dashboard::{get_dashboard, get_markets, get_status};
use crate::handlers::error::ApiError;
use crate::handlers::execution::post_position;
use crate::handlers::overrides::{
    delete_cb_override, delete_yield_override, put_cb_override, put_yield_override,
    reset_overrides,
};
use crate::handlers::refresh::{
    post_brief_refresh, post_global_refresh, post_matrix_refresh, post_refresh,
    post_triggers_refresh,
};

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = api_error.status;
        message = api_error.message.clone();
    } else if let Some(body_error) = err.find::<warp::filters::body::BodyDeserializeError>() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = body_error.to_string();
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = warp::http::StatusCode::METHOD_NOT_ALLOWED;
        message = "Method Not Allowed".to_string();
    } else {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(ctx: Arc<AppContext>) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let ctx_filter = warp::any().map(move || ctx.clone());

    let dashboard_route = warp::path!("api" / "v1" / "dashboard" / String)
        .and(warp::get())
        .and(ctx_filter.clone())
        .and_then(get_dashboard);

    let markets_route = warp::path!("api" / "v1" / "markets")
        .and(warp::get())
        .and(ctx_filter.clone())
        .and_then(get_markets);

    let status_route = warp::path!("api" / "v1" / "status")
        .and(warp::get())
        .and(ctx_filter.clone())
        .and_then(get_status);

    let refresh_route = warp::path!("api" / "v1" / "refresh")
        .and(warp::post())
        .and(ctx_filter.clone())
        .and_then(post_refresh);

    let cb_put_route = warp::path!("api" / "v1" / "overrides" / "cb" / String)
        .and(warp::put())
        .and(warp::body::json())
        .and(ctx_filter.clone())
        .and_then(put_cb_override);

    let cb_delete_route = warp::path!("api" / "v1" / "overrides" / "cb" / String)
        .and(warp::delete())
        .and(ctx_filter.clone())
        .and_then(delete_cb_override);

    let yield_put_route = warp::path!("api" / "v1" / "overrides" / "yields" / String)
        .and(warp::put())
        .and(warp::body::json())
        .and(ctx_filter.clone())
        .and_then(put_yield_override);

    let yield_delete_route = warp::path!("api" / "v1" / "overrides" / "yields" / String)
        .and(warp::delete())
        .and(ctx_filter.clone())
        .and_then(delete_yield_override);

    let reset_route = warp::path!("api" / "v1" / "overrides")
        .and(warp::delete())
        .and(ctx_filter.clone())
        .and_then(reset_overrides);

    // literal segments first so "global" and "matrix" never reach the currency route
    let global_refresh_route = warp::path!("api" / "v1" / "briefs" / "global" / "refresh")
        .and(warp::post())
        .and(ctx_filter.clone())
        .and_then(post_global_refresh);

    let matrix_refresh_route = warp::path!("api" / "v1" / "briefs" / "matrix" / "refresh")
        .and(warp::post())
        .and(ctx_filter.clone())
        .and_then(post_matrix_refresh);

    let triggers_refresh_route = warp::path!("api" / "v1" / "briefs" / "triggers" / String / "refresh")
        .and(warp::post())
        .and(ctx_filter.clone())
        .and_then(post_triggers_refresh);

    let brief_refresh_route = warp::path!("api" / "v1" / "briefs" / String / "refresh")
        .and(warp::post())
        .and(ctx_filter.clone())
        .and_then(post_brief_refresh);

    let position_route = warp::path!("api" / "v1" / "execution" / "position")
        .and(warp::post())
        .and(warp::body::json())
        .and(ctx_filter.clone())
        .and_then(post_position);

    info!("All routes configured successfully.");

    dashboard_route
        .or(markets_route)
        .or(status_route)
        .or(refresh_route)
        .or(cb_put_route)
        .or(cb_delete_route)
        .or(yield_put_route)
        .or(yield_delete_route)
        .or(reset_route)
        .or(global_refresh_route)
        .or(matrix_refresh_route)
        .or(triggers_refresh_route)
        .or(brief_refresh_route)
        .or(position_route)
        .recover(handle_rejection)
}

//! `/api` endpoints.
//!
//! # Endpoints
//!
//! ### `GET /api/get_params?<name>=&<name>=...`
//! Returns a JSON object with every requested parameter that exists and is
//! readable. Values in the query are ignored; only the names select.
//!
//! ### `POST /api/set_params`
//! Body is a JSON object of name/value pairs. Every pair is attempted;
//! the response is `400` if any was rejected, `200` otherwise.
//!
//! ### `GET /api/get_log?pos=<offset>&nmr=<count>`
//! A page of the device log, newest first.

use axum::{
    extract::{Query, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use coopdash_core::log::{LogLevel, LogPage};
use coopdash_core::ParameterSet;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::AppState;

/// Log entries returned when `nmr` is absent.
const DEFAULT_LOG_PAGE: usize = 20;

/// Create API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/get_params", get(get_params))
        .route("/set_params", post(set_params))
        .route("/get_log", get(get_log))
}

/// GET /api/get_params
async fn get_params(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<ParameterSet>, StatusCode> {
    let pairs: Vec<(String, String)> = match query.as_deref() {
        Some(query) => serde_urlencoded::from_str(query).map_err(|e| {
            warn!("Malformed get_params query: {}", e);
            StatusCode::BAD_REQUEST
        })?,
        None => Vec::new(),
    };

    let registry = state.registry.read().await;
    let response = registry.read_many(pairs.iter().map(|(name, _)| name.as_str()));
    debug!("get_params: {} of {} names", response.len(), pairs.len());
    Ok(Json(response))
}

/// POST /api/set_params
async fn set_params(State(state): State<AppState>, Json(params): Json<ParameterSet>) -> Response {
    let errors = state.registry.write().await.write_many(&params);

    if errors.is_empty() {
        debug!("set_params: {} values written", params.len());
        return StatusCode::OK.into_response();
    }

    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    {
        let mut log = state.log.write().await;
        for message in &messages {
            warn!("set_params: {}", message);
            log.push(LogLevel::Warn, message.clone());
        }
    }
    (StatusCode::BAD_REQUEST, Json(json!({ "errors": messages }))).into_response()
}

#[derive(Debug, Deserialize)]
struct LogQuery {
    pos: Option<usize>,
    nmr: Option<usize>,
}

/// GET /api/get_log
async fn get_log(State(state): State<AppState>, Query(query): Query<LogQuery>) -> Json<LogPage> {
    let log = state.log.read().await;
    Json(log.page(
        query.pos.unwrap_or(0),
        query.nmr.unwrap_or(DEFAULT_LOG_PAGE),
    ))
}

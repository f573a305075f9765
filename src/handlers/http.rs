use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply, reply};

use crate::error::Error;
use crate::service::dispatch_service::CallDispatcher;

pub struct AppState {
    pub dispatcher: Arc<CallDispatcher>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(dispatcher: Arc<CallDispatcher>) -> Self {
        Self {
            dispatcher,
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub timestamp: String,
    /// Seconds since the server started.
    pub uptime: f64,
}

pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: Arc<AppState>| reply::json(&health_status(&state)));

    let trigger = warp::path("trigger")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_trigger);

    let test_event = warp::path("test-event")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_test_event);

    let call_status = warp::path!("calls" / String)
        .and(warp::get())
        .and(with_state(state))
        .and_then(handle_call_status);

    health.or(trigger).or(test_event).or(call_status)
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn health_status(state: &AppState) -> HealthStatus {
    HealthStatus {
        status: "OK",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime: state.started_at.elapsed().as_secs_f64(),
    }
}

async fn handle_trigger(state: Arc<AppState>) -> Result<impl Reply, Infallible> {
    info!("manual trigger requested");
    match state.dispatcher.run_cycle(Utc::now()).await {
        Ok(report) => Ok(reply::with_status(
            reply::json(&json!({
                "success": true,
                "message": "Workflow triggered successfully",
                "report": report,
            })),
            StatusCode::OK,
        )),
        Err(err) => Ok(reply::with_status(
            reply::json(&json!({ "success": false, "error": err.to_string() })),
            StatusCode::INTERNAL_SERVER_ERROR,
        )),
    }
}

async fn handle_test_event(state: Arc<AppState>) -> Result<impl Reply, Infallible> {
    match state.dispatcher.preview(Utc::now()).await {
        Ok(previews) => Ok(reply::with_status(reply::json(&previews), StatusCode::OK)),
        Err(err) => {
            error!(error = %err, "failed to list events for diagnostics");
            Ok(reply::with_status(
                reply::json(&json!({ "error": err.to_string() })),
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_call_status(
    call_id: String,
    state: Arc<AppState>,
) -> Result<impl Reply, Infallible> {
    match state.dispatcher.voice().call_status(&call_id).await {
        Ok(call) => Ok(reply::with_status(reply::json(&call), StatusCode::OK)),
        Err(err) => {
            error!(call_id = %call_id, error = %err, "failed to get call status");
            let status = match &err {
                Error::Provider { status: 404, .. } => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_GATEWAY,
            };
            Ok(reply::with_status(
                reply::json(&json!({ "error": err.to_string() })),
                status,
            ))
        }
    }
}

//! Operational HTTP surface
//!
//! Read the progress of the current run, start a manual run, reset the
//! progress snapshot, inspect a day's schedule and scrape metrics.

pub mod server;

pub use server::{ApiServer, ServerError};

use axum::{
    extract::{MatchedPath, Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::error::{DailypressErrorTrait, Error, ErrorCategory};
use crate::metrics;
use crate::models::{ScheduleSlot, SlotKey};
use crate::orchestrator::{Orchestrator, ProgressState, RunRequest, RunTrigger};
use crate::scheduler::TriggerClock;
use crate::storage::ScheduleRepository;

// ============================================================================
// App State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,

    /// Resolves "today" in the publishing time zone
    pub clock: TriggerClock,

    pub start_time: Instant,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, clock: TriggerClock) -> Self {
        Self {
            orchestrator,
            clock,
            start_time: Instant::now(),
        }
    }
}

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub run_active: bool,
}

/// Body of `POST /api/runs`; every field is optional
#[derive(Debug, Default, Deserialize)]
pub struct StartRunBody {
    /// Defaults to today in the publishing time zone
    pub date: Option<NaiveDate>,

    /// Restrict the run to these slots
    pub keys: Option<Vec<SlotKey>>,
}

#[derive(Debug, Serialize)]
pub struct RunStarted {
    pub run_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub date: NaiveDate,
    pub slots: Vec<ScheduleSlot>,
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/progress", get(get_progress))
        .route("/api/progress/reset", post(reset_progress))
        .route("/api/runs", post(start_run))
        .route("/api/schedule/{date}", get(get_schedule))
        .route("/metrics", get(get_metrics))
        .layer(middleware::from_fn(track_requests))
        .with_state(state)
}

async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| String::from("unmatched"));
    let start = Instant::now();

    let response = next.run(request).await;

    metrics::record_api_request(
        &endpoint,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self.category() {
            ErrorCategory::Conflict => StatusCode::CONFLICT,
            ErrorCategory::Input => StatusCode::BAD_REQUEST,
            ErrorCategory::Network | ErrorCategory::Llm | ErrorCategory::Platform => {
                StatusCode::BAD_GATEWAY
            }
            ErrorCategory::Storage | ErrorCategory::Config | ErrorCategory::Scheduler => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!(
                error = %self,
                category = self.category().as_str(),
                recoverable = self.is_recoverable(),
                "Request failed"
            );
        }
        (status, Json(ApiResponse::<()>::error(self.to_string()))).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        run_active: state.orchestrator.tracker().is_active(),
    }))
}

async fn get_progress(State(state): State<AppState>) -> Json<ProgressState> {
    Json(state.orchestrator.tracker().snapshot())
}

async fn reset_progress(State(state): State<AppState>) -> Result<impl IntoResponse, Error> {
    state.orchestrator.tracker().reset()?;
    Ok(Json(ApiResponse::success("reset")))
}

async fn start_run(
    State(state): State<AppState>,
    body: Option<Json<StartRunBody>>,
) -> Result<impl IntoResponse, Error> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let date = body.date.unwrap_or_else(|| state.clock.today(Utc::now()));
    let request = match body.keys {
        Some(keys) => RunRequest::restricted(date, RunTrigger::Manual, keys),
        None => RunRequest::full(date, RunTrigger::Manual),
    };

    let run_id = state.orchestrator.try_start(request)?;
    tracing::info!(%run_id, %date, "Manual run started over HTTP");
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(RunStarted { run_id, date })),
    ))
}

async fn get_schedule(
    State(state): State<AppState>,
    Path(date_str): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|_| {
        Error::invalid_input(format!("invalid date '{date_str}', expected YYYY-MM-DD"))
    })?;
    let slots = state.orchestrator.store().get_slots_for_day(date)?;
    Ok(Json(ApiResponse::success(ScheduleResponse { date, slots })))
}

async fn get_metrics() -> Response {
    match metrics::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

//! REST API handlers.
//!
//! Each handler calls into the `Monitor` and returns the JSON envelope
//! `{success, data?, error?, code?}`.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::error;

use upwatch_core::NewService;
use upwatch_scheduler::MonitorError;

use crate::ApiState;

/// History entries returned when the request sets no `limit`.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;
/// Upper bound on `limit`.
pub const MAX_HISTORY_LIMIT: usize = 1_000;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// Machine-readable error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        })
    }
}

pub(crate) fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    coded_error(msg, None, status)
}

fn coded_error(msg: &str, code: Option<&'static str>, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
            code,
        }),
    )
}

fn monitor_error(e: MonitorError) -> Response {
    match &e {
        MonitorError::Validation(v) => {
            coded_error(&e.to_string(), Some(v.code()), StatusCode::BAD_REQUEST).into_response()
        }
        MonitorError::NotFound(_) => {
            coded_error(&e.to_string(), Some("not_found"), StatusCode::NOT_FOUND).into_response()
        }
        MonitorError::Storage(_) => {
            error!(error = %e, "request failed on storage");
            coded_error(
                &e.to_string(),
                Some("storage"),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
            .into_response()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

impl HistoryQuery {
    fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .min(MAX_HISTORY_LIMIT)
    }
}

// ── Liveness ───────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    ApiResponse::ok("ok")
}

// ── Services ───────────────────────────────────────────────────

/// GET /api/v1/services
pub async fn list_services(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.monitor.list_services().await)
}

/// POST /api/v1/services
pub async fn create_service(
    State(state): State<ApiState>,
    body: Result<Json<NewService>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return coded_error(
                &rejection.body_text(),
                Some("invalid_json"),
                StatusCode::BAD_REQUEST,
            )
            .into_response();
        }
    };
    match state.monitor.add_service(request).await {
        Ok(snapshot) => (StatusCode::CREATED, ApiResponse::ok(snapshot)).into_response(),
        Err(e) => monitor_error(e),
    }
}

/// GET /api/v1/services/{id}
pub async fn get_service(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.monitor.get_service(&id).await {
        Ok(snapshot) => ApiResponse::ok(snapshot).into_response(),
        Err(e) => monitor_error(e),
    }
}

/// DELETE /api/v1/services/{id}
pub async fn delete_service(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.monitor.delete_service(&id).await {
        Ok(()) => ApiResponse::ok("deleted").into_response(),
        Err(e) => monitor_error(e),
    }
}

/// POST /api/v1/services/{id}/reset
pub async fn reset_service(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.monitor.reset_service(&id).await {
        Ok(()) => ApiResponse::ok("reset").into_response(),
        Err(e) => monitor_error(e),
    }
}

/// POST /api/v1/services/{id}/check
pub async fn trigger_check(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.monitor.trigger_check(&id).await {
        Ok(()) => (StatusCode::ACCEPTED, ApiResponse::ok("scheduled")).into_response(),
        Err(e) => monitor_error(e),
    }
}

// ── History ────────────────────────────────────────────────────

/// GET /api/v1/services/{id}/outcomes?limit=
pub async fn list_outcomes(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    match state.monitor.list_outcomes(&id, query.limit()).await {
        Ok(outcomes) => ApiResponse::ok(outcomes).into_response(),
        Err(e) => monitor_error(e),
    }
}

/// GET /api/v1/services/{id}/incidents?limit=
pub async fn list_incidents(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    match state.monitor.list_state_changes(&id, query.limit()).await {
        Ok(changes) => ApiResponse::ok(changes).into_response(),
        Err(e) => monitor_error(e),
    }
}

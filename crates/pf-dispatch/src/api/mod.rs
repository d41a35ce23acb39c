//! HTTP API - job submission and progress polling
//!
//! Endpoints:
//! - POST /api/send-notifications: validate and accept a dispatch job
//! - GET /api/notifications-progress/:job_id: read a job's progress snapshot
//! - GET /health: liveness probe

pub mod model;

use crate::progress::ProgressStore;
use crate::submitter::JobSubmitter;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use model::{ErrorResponse, ProgressResponse, SendNotificationsRequest, SendNotificationsResponse};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Error body returned for any rejected submission
const INVALID_PARAMETERS: &str = "Invalid parameters";

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub submitter: Arc<JobSubmitter>,
    pub store: Arc<ProgressStore>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Create the API router
pub fn create_router(submitter: Arc<JobSubmitter>, store: Arc<ProgressStore>) -> Router {
    let state = AppState { submitter, store };

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/send-notifications", post(send_notifications))
        .route(
            "/api/notifications-progress/:job_id",
            get(notifications_progress),
        )
        .with_state(state)
}

/// Health check endpoint
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Accept a notification dispatch job
async fn send_notifications(
    State(state): State<AppState>,
    payload: Result<Json<SendNotificationsRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected unreadable submission body");
            return invalid_parameters();
        }
    };

    let dispatch = match request.into_dispatch_request() {
        Ok(dispatch) => dispatch,
        Err(e) => {
            warn!(error = %e, "Rejected invalid submission");
            return invalid_parameters();
        }
    };

    match state.submitter.submit(dispatch) {
        Ok(ticket) => {
            // The join handle is dropped here; the job keeps running and its
            // progress stays observable through the store.
            (
                StatusCode::OK,
                Json(SendNotificationsResponse {
                    message: "Notification processing started".to_string(),
                    job_id: ticket.job_id,
                }),
            )
                .into_response()
        }
        Err(e) => {
            warn!(error = %e, "Rejected invalid submission");
            invalid_parameters()
        }
    }
}

/// Read a job's dispatch progress
async fn notifications_progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Json<ProgressResponse> {
    let snapshot = state.store.snapshot(&job_id);
    debug!(
        job_id = %job_id,
        progress = snapshot.progress,
        total = snapshot.total,
        "Progress polled"
    );

    Json(ProgressResponse {
        progress: snapshot.progress,
        total: snapshot.total,
        error: snapshot.error.map(|failure| failure.message),
    })
}

fn invalid_parameters() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: INVALID_PARAMETERS.to_string(),
        }),
    )
        .into_response()
}

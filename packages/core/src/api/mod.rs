//! HTTP surface.
//!
//! [`create_router`] assembles every route used by `main.rs` and the
//! integration tests. Scheduling errors map onto status codes in
//! [`error_response`]:
//!
//! | error               | status |
//! |---------------------|--------|
//! | `Validation`        | 400    |
//! | `NotFound`          | 404    |
//! | `SlotConflict`      | 409    |
//! | `InvalidTransition` | 422    |
//! | `Storage`           | 500    |

pub mod appointments;
pub mod health;
pub mod providers;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};

use crate::metrics::AppMetrics;
use crate::scheduling::{Scheduler, SchedulingError};

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub metrics: Arc<AppMetrics>,
}

impl AppState {
    pub fn new(scheduler: Arc<Scheduler>, metrics: Arc<AppMetrics>) -> Self {
        Self { scheduler, metrics }
    }
}

/// Error shape returned by every handler.
pub type ApiError = (StatusCode, Json<Value>);

/// Create the full API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(render_metrics))
        .route("/appointments", post(appointments::create_appointment))
        .route("/appointments/:id", get(appointments::get_appointment))
        .route("/appointments/:id/schedule", put(appointments::reschedule_appointment))
        .route("/appointments/:id/cancel", post(appointments::cancel_appointment))
        .route("/appointments/:id/complete", post(appointments::complete_appointment))
        .route("/customers/:id/appointments", get(appointments::customer_appointments))
        .route("/providers/:id/schedule", get(providers::provider_schedule))
        .route("/providers/:id/availability", get(providers::provider_availability))
        .layer(middleware::from_fn_with_state(state.clone(), track_metrics))
        .with_state(state)
}

/// Translate a scheduling failure into a status code and JSON body.
pub fn error_response(err: SchedulingError) -> ApiError {
    let status = match &err {
        SchedulingError::Validation { .. } => StatusCode::BAD_REQUEST,
        SchedulingError::NotFound { .. } => StatusCode::NOT_FOUND,
        SchedulingError::SlotConflict { .. } => StatusCode::CONFLICT,
        SchedulingError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SchedulingError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    }

    (
        status,
        Json(json!({ "error": err.to_string(), "kind": err.kind() })),
    )
}

/// `GET /metrics` — Prometheus text exposition.
async fn render_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Body::from(body))
            .expect("metrics response should be valid"),
        Err(err) => {
            tracing::error!("Failed to render metrics: {}", err);
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("metrics error"))
                .expect("metrics error response should be valid")
        }
    }
}

/// Record request count and latency, labelled by the matched route.
async fn track_metrics(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let started = Instant::now();

    let response = next.run(request).await;

    state
        .metrics
        .http_requests_total
        .with_label_values(&[method.as_str(), path.as_str(), response.status().as_str()])
        .inc();
    state
        .metrics
        .http_request_duration
        .observe(started.elapsed().as_secs_f64());

    response
}

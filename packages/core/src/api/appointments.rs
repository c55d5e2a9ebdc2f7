//! Appointment endpoints.
//!
//! Routes:
//! - `POST /appointments`                   — book a slot
//! - `GET  /appointments/:id`               — fetch one appointment
//! - `PUT  /appointments/:id/schedule`      — move to a new provider/date/time
//! - `POST /appointments/:id/cancel`        — cancel (idempotent)
//! - `POST /appointments/:id/complete`      — mark completed (idempotent)
//! - `GET  /customers/:id/appointments`     — a customer's history, newest first

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use super::{error_response, ApiError, AppState};
use crate::scheduling::{
    Appointment, AppointmentDraft, AppointmentId, AppointmentStatus, CustomerId,
    RescheduleDraft, SchedulingError,
};

#[derive(Debug, Serialize)]
pub struct CreateAppointmentResponse {
    pub id: AppointmentId,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub id: AppointmentId,
    pub status: AppointmentStatus,
}

fn count_conflict(state: &AppState, err: &SchedulingError) {
    if matches!(err, SchedulingError::SlotConflict { .. }) {
        state.metrics.slot_conflicts_total.inc();
    }
}

/// `POST /appointments` — validate and book.
pub async fn create_appointment(
    State(state): State<AppState>,
    Json(body): Json<AppointmentDraft>,
) -> Result<(StatusCode, Json<CreateAppointmentResponse>), ApiError> {
    let id = state.scheduler.create(body).await.map_err(|err| {
        count_conflict(&state, &err);
        error_response(err)
    })?;

    state.metrics.appointments_created_total.inc();
    Ok((StatusCode::CREATED, Json(CreateAppointmentResponse { id })))
}

/// `GET /appointments/:id`
pub async fn get_appointment(
    State(state): State<AppState>,
    Path(id): Path<AppointmentId>,
) -> Result<Json<Appointment>, ApiError> {
    let appointment = state.scheduler.find(id).await.map_err(error_response)?;
    Ok(Json(appointment))
}

/// `PUT /appointments/:id/schedule` — re-checked against current bookings.
pub async fn reschedule_appointment(
    State(state): State<AppState>,
    Path(id): Path<AppointmentId>,
    Json(body): Json<RescheduleDraft>,
) -> Result<StatusCode, ApiError> {
    state.scheduler.reschedule(id, body).await.map_err(|err| {
        count_conflict(&state, &err);
        error_response(err)
    })?;

    state.metrics.appointments_rescheduled_total.inc();
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /appointments/:id/cancel`
pub async fn cancel_appointment(
    State(state): State<AppState>,
    Path(id): Path<AppointmentId>,
) -> Result<Json<StatusResponse>, ApiError> {
    let before = state.scheduler.find(id).await.map_err(error_response)?;
    let status = state.scheduler.cancel(id).await.map_err(error_response)?;

    if before.status != status {
        state.metrics.appointments_cancelled_total.inc();
    }
    Ok(Json(StatusResponse { id, status }))
}

/// `POST /appointments/:id/complete`
pub async fn complete_appointment(
    State(state): State<AppState>,
    Path(id): Path<AppointmentId>,
) -> Result<Json<StatusResponse>, ApiError> {
    let before = state.scheduler.find(id).await.map_err(error_response)?;
    let status = state.scheduler.complete(id).await.map_err(error_response)?;

    if before.status != status {
        state.metrics.appointments_completed_total.inc();
    }
    Ok(Json(StatusResponse { id, status }))
}

/// `GET /customers/:id/appointments` — ordered by date, newest first.
pub async fn customer_appointments(
    State(state): State<AppState>,
    Path(customer_id): Path<CustomerId>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let appointments = state
        .scheduler
        .find_by_customer(customer_id)
        .await
        .map_err(error_response)?;
    Ok(Json(appointments))
}

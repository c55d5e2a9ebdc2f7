//! Provider (employee) schedule and availability endpoints.
//!
//! - `GET /providers/:id/schedule?date=YYYY-MM-DD`
//! - `GET /providers/:id/availability?date=YYYY-MM-DD&start=HH:MM&end=HH:MM`

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{error_response, ApiError, AppState};
use crate::scheduling::types::{parse_date, parse_time};
use crate::scheduling::{Appointment, EmployeeId, SchedulingError};

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub start: String,
    pub end: String,
    pub available: bool,
}

fn required(field: &str, value: Option<String>) -> Result<String, ApiError> {
    value.ok_or_else(|| error_response(SchedulingError::validation(format!("{} is required", field))))
}

/// `GET /providers/:id/schedule` — live bookings for the day, earliest first.
pub async fn provider_schedule(
    State(state): State<AppState>,
    Path(employee_id): Path<EmployeeId>,
    Query(params): Query<ScheduleQuery>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let date = parse_date("date", required("date", params.date)?).map_err(error_response)?;

    let schedule = state
        .scheduler
        .provider_schedule(employee_id, date)
        .await
        .map_err(error_response)?;
    Ok(Json(schedule))
}

/// `GET /providers/:id/availability` — advisory check of `[start, end)`.
pub async fn provider_availability(
    State(state): State<AppState>,
    Path(employee_id): Path<EmployeeId>,
    Query(params): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let date = parse_date("date", required("date", params.date)?).map_err(error_response)?;
    let start = parse_time("start", required("start", params.start)?).map_err(error_response)?;
    let end = parse_time("end", required("end", params.end)?).map_err(error_response)?;

    let available = state
        .scheduler
        .is_slot_available(employee_id, date, start, end)
        .await
        .map_err(error_response)?;

    Ok(Json(AvailabilityResponse {
        employee_id,
        date,
        start: start.format("%H:%M:%S").to_string(),
        end: end.format("%H:%M:%S").to_string(),
        available,
    }))
}

//! Core data types for appointment scheduling

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::SchedulingError;

pub type AppointmentId = i64;
pub type CustomerId = i64;
pub type EmployeeId = i64;

/// Longest booking accepted, in minutes. A booking may not end at or past
/// midnight, so even one starting at 00:00 tops out a minute short of a day.
pub const MAX_DURATION_MINUTES: i64 = 24 * 60 - 1;

/// Lifecycle state of an appointment.
///
/// `Cancelled` and `Completed` are terminal: nothing leaves them, and an
/// appointment in either state no longer occupies its provider's time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppointmentStatus::Scheduled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "completed" => Ok(AppointmentStatus::Completed),
            other => Err(format!("unknown appointment status '{}'", other)),
        }
    }
}

/// Half-open interval `[start, end)` within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Range starting at `start` lasting `minutes`.
    /// Returns `None` when the range would run past midnight.
    pub fn from_duration(start: NaiveTime, minutes: u32) -> Option<Self> {
        let (end, wrapped) = start.overflowing_add_signed(Duration::minutes(minutes as i64));
        if wrapped != 0 {
            return None;
        }
        Some(Self { start, end })
    }

    /// A zero-length range occupies no time.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Strict overlap: `[s1, e1)` and `[s2, e2)` overlap iff `s1 < e2 && e1 > s2`.
    /// Touching ranges never overlap, and a zero-length range overlaps
    /// nothing, wherever it sits.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && self.end > other.start
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// A (provider, date, time range) tuple being evaluated for booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub range: TimeRange,
}

impl Slot {
    pub fn new(employee_id: EmployeeId, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            employee_id,
            date,
            range: TimeRange::new(start, end),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "employee {} on {} {}", self.employee_id, self.date, self.range)
    }
}

/// A persisted appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub customer_id: CustomerId,
    pub employee_id: EmployeeId,
    #[serde(rename = "appointment_date")]
    pub date: NaiveDate,
    #[serde(rename = "appointment_time")]
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Occupied interval. Rows are validated on the way in, so the end never
    /// wraps; if it would, the range is clamped to the end of the day.
    pub fn time_range(&self) -> TimeRange {
        TimeRange::from_duration(self.start_time, self.duration_minutes).unwrap_or_else(|| {
            TimeRange::new(self.start_time, end_of_day())
        })
    }

    pub fn end_time(&self) -> NaiveTime {
        self.time_range().end
    }

    /// Only non-terminal appointments block their provider's time.
    pub fn occupies_time(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// A validated booking, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub customer_id: CustomerId,
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
    pub note: Option<String>,
}

impl NewAppointment {
    pub fn slot(&self) -> Slot {
        slot_for(self.employee_id, self.date, self.start_time, self.duration_minutes)
    }
}

/// A validated change of provider, date and time for an existing appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleChange {
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
}

impl ScheduleChange {
    pub fn slot(&self) -> Slot {
        slot_for(self.employee_id, self.date, self.start_time, self.duration_minutes)
    }
}

/// Raw booking request as received from a client. Every field is optional
/// so that missing values are reported as validation errors rather than
/// deserialisation failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentDraft {
    pub customer_id: Option<i64>,
    pub employee_id: Option<i64>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub duration_minutes: Option<i64>,
    pub note: Option<String>,
}

impl AppointmentDraft {
    pub fn validate(self) -> Result<NewAppointment, SchedulingError> {
        let customer_id = require_id("customer_id", self.customer_id)?;
        let employee_id = require_id("employee_id", self.employee_id)?;
        let date = parse_date("appointment_date", require("appointment_date", self.appointment_date)?)?;
        let start_time = parse_time("appointment_time", require("appointment_time", self.appointment_time)?)?;
        let duration_minutes = parse_duration(require("duration_minutes", self.duration_minutes)?)?;
        ensure_same_day(start_time, duration_minutes)?;

        let note = self
            .note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Ok(NewAppointment {
            customer_id,
            employee_id,
            date,
            start_time,
            duration_minutes,
            note,
        })
    }
}

/// Raw reschedule request. Date, time and provider are required; duration
/// falls back to the appointment's current duration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RescheduleDraft {
    pub employee_id: Option<i64>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub duration_minutes: Option<i64>,
}

impl RescheduleDraft {
    pub fn validate(self, current: &Appointment) -> Result<ScheduleChange, SchedulingError> {
        let employee_id = require_id("employee_id", self.employee_id)?;
        let date = parse_date("appointment_date", require("appointment_date", self.appointment_date)?)?;
        let start_time = parse_time("appointment_time", require("appointment_time", self.appointment_time)?)?;
        let duration_minutes = match self.duration_minutes {
            Some(minutes) => parse_duration(minutes)?,
            None => current.duration_minutes,
        };
        ensure_same_day(start_time, duration_minutes)?;

        Ok(ScheduleChange {
            employee_id,
            date,
            start_time,
            duration_minutes,
        })
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(field: &str, raw: String) -> Result<NaiveDate, SchedulingError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        SchedulingError::validation(format!("{} must be a date in YYYY-MM-DD format, got '{}'", field, raw))
    })
}

/// Parse an `HH:MM` or `HH:MM:SS` time of day.
pub fn parse_time(field: &str, raw: String) -> Result<NaiveTime, SchedulingError> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| {
            SchedulingError::validation(format!("{} must be a time in HH:MM or HH:MM:SS format, got '{}'", field, raw))
        })
}

fn require<T>(field: &str, value: Option<T>) -> Result<T, SchedulingError> {
    value.ok_or_else(|| SchedulingError::validation(format!("{} is required", field)))
}

fn require_id(field: &str, value: Option<i64>) -> Result<i64, SchedulingError> {
    let id = require(field, value)?;
    if id <= 0 {
        return Err(SchedulingError::validation(format!("{} must be a positive id, got {}", field, id)));
    }
    Ok(id)
}

fn parse_duration(minutes: i64) -> Result<u32, SchedulingError> {
    if !(0..=MAX_DURATION_MINUTES).contains(&minutes) {
        return Err(SchedulingError::validation(format!(
            "duration_minutes must be between 0 and {}, got {}",
            MAX_DURATION_MINUTES, minutes
        )));
    }
    Ok(minutes as u32)
}

fn ensure_same_day(start: NaiveTime, minutes: u32) -> Result<(), SchedulingError> {
    TimeRange::from_duration(start, minutes).map(|_| ()).ok_or_else(|| {
        SchedulingError::validation(format!(
            "appointment starting at {} for {} minutes runs past midnight",
            start.format("%H:%M"),
            minutes
        ))
    })
}

fn slot_for(employee_id: EmployeeId, date: NaiveDate, start: NaiveTime, minutes: u32) -> Slot {
    let range = TimeRange::from_duration(start, minutes)
        .unwrap_or_else(|| TimeRange::new(start, end_of_day()));
    Slot { employee_id, date, range }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or_default()
}

//! Error types for scheduling operations

use thiserror::Error;

use super::types::{AppointmentId, AppointmentStatus, Slot};
use crate::store::StoreError;

/// Errors surfaced by [`Scheduler`](super::Scheduler) operations.
///
/// The availability engine itself never fails; only the operations that
/// read or write the store do.
#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Invalid appointment data: {message}")]
    Validation { message: String },

    #[error("Slot is already booked: {slot}")]
    SlotConflict { slot: Slot },

    #[error("Appointment {id} not found")]
    NotFound { id: AppointmentId },

    #[error("Appointment {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: AppointmentId,
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Storage error: {source}")]
    Storage { source: StoreError },
}

impl SchedulingError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn slot_conflict(slot: Slot) -> Self {
        Self::SlotConflict { slot }
    }

    pub fn not_found(id: AppointmentId) -> Self {
        Self::NotFound { id }
    }

    pub fn invalid_transition(id: AppointmentId, from: AppointmentStatus, to: AppointmentStatus) -> Self {
        Self::InvalidTransition { id, from, to }
    }

    /// Map a store failure for a write against `slot`. A uniqueness
    /// violation raised by the store is the same condition as a conflict
    /// detected by the engine.
    pub fn from_store(source: StoreError, slot: Slot) -> Self {
        match source {
            StoreError::SlotTaken => Self::SlotConflict { slot },
            source => Self::Storage { source },
        }
    }

    /// Stable machine-readable name, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::SlotConflict { .. } => "slot_conflict",
            Self::NotFound { .. } => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Storage { .. } => "storage_error",
        }
    }
}

impl From<StoreError> for SchedulingError {
    fn from(source: StoreError) -> Self {
        Self::Storage { source }
    }
}

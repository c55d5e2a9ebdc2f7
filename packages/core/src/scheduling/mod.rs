//! Appointment Scheduling Module
//!
//! Slot-conflict detection and the create/reschedule/cancel/complete
//! workflows that enforce the no-double-booking invariant.

pub mod availability;
pub mod error;
pub mod service;
pub mod types;


pub use error::SchedulingError;
pub use service::Scheduler;
pub use types::*;

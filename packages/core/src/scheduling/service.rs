//! Scheduling operations.
//!
//! [`Scheduler`] owns the appointment lifecycle:
//!
//! ```text
//! {} --create--> scheduled --reschedule--> scheduled
//!                scheduled --cancel------> cancelled
//!                scheduled --complete----> completed
//! ```
//!
//! Every write that claims provider time hands the availability engine to
//! the store as a guard, so the check and the write happen inside one
//! store transaction. Nothing leaves `cancelled` or `completed`.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use super::availability;
use super::error::SchedulingError;
use super::types::{
    Appointment, AppointmentDraft, AppointmentId, AppointmentStatus, CustomerId, EmployeeId,
    RescheduleDraft, Slot,
};
use crate::store::{AppointmentStore, ScheduleWrite};

pub struct Scheduler {
    store: Arc<dyn AppointmentStore>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// Validate `draft` and book it if the provider is free for the whole
    /// interval. Returns the id assigned by the store.
    pub async fn create(&self, draft: AppointmentDraft) -> Result<AppointmentId, SchedulingError> {
        let new = draft.validate()?;
        let slot = new.slot();
        let guard = move |existing: &[Appointment]| availability::is_available(&slot, existing);

        match self.store.insert(&new, &guard).await {
            Ok(Some(id)) => {
                tracing::info!("Appointment {} booked for customer {}: {}", id, new.customer_id, slot);
                Ok(id)
            }
            Ok(None) => {
                tracing::info!("Booking rejected, slot taken: {}", slot);
                Err(SchedulingError::slot_conflict(slot))
            }
            Err(err) => Err(SchedulingError::from_store(err, slot)),
        }
    }

    /// Move a scheduled appointment to a new provider, date and time.
    ///
    /// The target slot is checked against the day's bookings with the
    /// appointment's own record left out, so shifting within its current
    /// interval is allowed.
    pub async fn reschedule(
        &self,
        id: AppointmentId,
        draft: RescheduleDraft,
    ) -> Result<(), SchedulingError> {
        let current = self.find(id).await?;
        if current.status.is_terminal() {
            return Err(SchedulingError::invalid_transition(
                id,
                current.status,
                AppointmentStatus::Scheduled,
            ));
        }

        let change = draft.validate(&current)?;
        let slot = change.slot();
        let guard =
            move |existing: &[Appointment]| availability::is_available_ignoring(&slot, existing, id);

        match self.store.update_schedule(id, &change, &guard).await {
            Ok(ScheduleWrite::Updated) => {
                tracing::info!("Appointment {} rescheduled to {}", id, slot);
                Ok(())
            }
            Ok(ScheduleWrite::SlotTaken) => {
                tracing::info!("Reschedule of appointment {} rejected, slot taken: {}", id, slot);
                Err(SchedulingError::slot_conflict(slot))
            }
            // Raced with a cancel/complete (or a delete) since it was read.
            Ok(ScheduleWrite::NotScheduled) => match self.store.find_by_id(id).await? {
                Some(latest) => Err(SchedulingError::invalid_transition(
                    id,
                    latest.status,
                    AppointmentStatus::Scheduled,
                )),
                None => Err(SchedulingError::not_found(id)),
            },
            Err(err) => Err(SchedulingError::from_store(err, slot)),
        }
    }

    /// Cancel an appointment. Cancelling twice is a no-op; cancelling a
    /// completed appointment is an [`SchedulingError::InvalidTransition`].
    pub async fn cancel(&self, id: AppointmentId) -> Result<AppointmentStatus, SchedulingError> {
        self.finish(id, AppointmentStatus::Cancelled).await
    }

    /// Mark an appointment completed. Completing twice is a no-op;
    /// completing a cancelled appointment is an
    /// [`SchedulingError::InvalidTransition`].
    pub async fn complete(&self, id: AppointmentId) -> Result<AppointmentStatus, SchedulingError> {
        self.finish(id, AppointmentStatus::Completed).await
    }

    async fn finish(
        &self,
        id: AppointmentId,
        target: AppointmentStatus,
    ) -> Result<AppointmentStatus, SchedulingError> {
        let current = self.find(id).await?;

        if current.status == AppointmentStatus::Scheduled
            && self
                .store
                .transition_status(id, AppointmentStatus::Scheduled, target)
                .await?
        {
            tracing::info!("Appointment {} {}", id, target);
            return Ok(target);
        }

        // Either already terminal, or it became terminal since it was read.
        let latest = if current.status == AppointmentStatus::Scheduled {
            self.find(id).await?
        } else {
            current
        };

        if latest.status == target {
            tracing::debug!("Appointment {} already {}", id, target);
            Ok(target)
        } else {
            Err(SchedulingError::invalid_transition(id, latest.status, target))
        }
    }

    pub async fn find(&self, id: AppointmentId) -> Result<Appointment, SchedulingError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| SchedulingError::not_found(id))
    }

    /// All of a customer's appointments, newest date first.
    pub async fn find_by_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut appointments = self.store.find_by_customer(customer_id).await?;
        appointments.sort_by(|a, b| (b.date, b.start_time, b.id).cmp(&(a.date, a.start_time, a.id)));
        Ok(appointments)
    }

    /// A provider's live bookings on `date`, earliest first.
    pub async fn provider_schedule(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let appointments = self.store.find_by_provider_and_date(employee_id, date).await?;
        Ok(availability::provider_schedule(employee_id, date, appointments))
    }

    /// Whether `[start, end)` is free for the provider on `date` right now.
    /// Purely advisory: `create` re-checks inside the store transaction.
    pub async fn is_slot_available(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<bool, SchedulingError> {
        if end < start {
            return Err(SchedulingError::validation("end must not be before start"));
        }
        let slot = Slot::new(employee_id, date, start, end);
        let existing = self.store.find_by_provider_and_date(employee_id, date).await?;
        Ok(availability::is_available(&slot, &existing))
    }
}

//! Appointment persistence boundary.
//!
//! [`AppointmentStore`] is the narrow interface the scheduler writes
//! through. It holds no scheduling policy: writes that claim provider time
//! take a [`SlotGuard`] from the caller and evaluate it against the
//! provider's bookings for the day *inside* the store's own write boundary,
//! which turns check-then-insert into a single compare-and-insert.
//!
//! Two implementations exist: the SQLite-backed
//! [`SqliteAppointmentStore`](crate::repository::SqliteAppointmentStore)
//! and [`MemoryAppointmentStore`] below, which keeps everything in a
//! `BTreeMap` behind a Tokio `RwLock`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::scheduling::types::{
    Appointment, AppointmentId, AppointmentStatus, CustomerId, EmployeeId, NewAppointment,
    ScheduleChange,
};

/// Predicate over a provider's bookings for one day. Returns `true` when
/// the pending write may proceed.
pub type SlotGuard<'a> = &'a (dyn Fn(&[Appointment]) -> bool + Send + Sync);

/// Errors raised by store implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A live booking already holds this provider/date/start time.
    #[error("slot already taken")]
    SlotTaken,

    #[error("corrupt appointment row: {message}")]
    Corrupt { message: String },

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt { message: message.into() }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::SlotTaken,
            _ => StoreError::Database(err),
        }
    }
}

/// Outcome of a guarded schedule update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleWrite {
    Updated,
    /// The guard rejected the target slot; nothing was written.
    SlotTaken,
    /// No `scheduled` appointment with that id exists.
    NotScheduled,
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Insert `new` with status `scheduled` if `guard` admits the provider's
    /// current bookings for that date. Returns the assigned id, or `None`
    /// when the guard rejected the write.
    async fn insert(
        &self,
        new: &NewAppointment,
        guard: SlotGuard<'_>,
    ) -> Result<Option<AppointmentId>, StoreError>;

    /// Move a `scheduled` appointment to the provider/date/time in `change`
    /// if `guard` admits the target day's bookings.
    async fn update_schedule(
        &self,
        id: AppointmentId,
        change: &ScheduleChange,
        guard: SlotGuard<'_>,
    ) -> Result<ScheduleWrite, StoreError>;

    /// Set the status to `to` only if it is currently `from`.
    /// Returns `true` when a row was updated.
    async fn transition_status(
        &self,
        id: AppointmentId,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<bool, StoreError>;

    async fn find_by_id(&self, id: AppointmentId) -> Result<Option<Appointment>, StoreError>;

    /// All appointments (any status) for a provider on a date, ordered by
    /// start time.
    async fn find_by_provider_and_date(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// All appointments for a customer, newest date first.
    async fn find_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Appointment>, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    last_id: AppointmentId,
    rows: BTreeMap<AppointmentId, Appointment>,
}

impl MemoryState {
    fn provider_day(&self, employee_id: EmployeeId, date: NaiveDate) -> Vec<Appointment> {
        let mut rows: Vec<Appointment> = self
            .rows
            .values()
            .filter(|a| a.employee_id == employee_id && a.date == date)
            .cloned()
            .collect();
        rows.sort_by_key(|a| (a.start_time, a.id));
        rows
    }
}

/// In-memory [`AppointmentStore`]. The guard runs while the write lock is
/// held, so concurrent writers are fully serialised.
#[derive(Debug, Default)]
pub struct MemoryAppointmentStore {
    state: RwLock<MemoryState>,
}

impl MemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of appointments held, in any status.
    pub async fn len(&self) -> usize {
        self.state.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.rows.is_empty()
    }
}

#[async_trait]
impl AppointmentStore for MemoryAppointmentStore {
    async fn insert(
        &self,
        new: &NewAppointment,
        guard: SlotGuard<'_>,
    ) -> Result<Option<AppointmentId>, StoreError> {
        let mut state = self.state.write().await;

        if !guard(&state.provider_day(new.employee_id, new.date)) {
            return Ok(None);
        }

        state.last_id += 1;
        let id = state.last_id;
        let now = Utc::now();
        state.rows.insert(
            id,
            Appointment {
                id,
                customer_id: new.customer_id,
                employee_id: new.employee_id,
                date: new.date,
                start_time: new.start_time,
                duration_minutes: new.duration_minutes,
                status: AppointmentStatus::Scheduled,
                note: new.note.clone(),
                created_at: now,
                updated_at: now,
            },
        );

        Ok(Some(id))
    }

    async fn update_schedule(
        &self,
        id: AppointmentId,
        change: &ScheduleChange,
        guard: SlotGuard<'_>,
    ) -> Result<ScheduleWrite, StoreError> {
        let mut state = self.state.write().await;

        if !guard(&state.provider_day(change.employee_id, change.date)) {
            return Ok(ScheduleWrite::SlotTaken);
        }

        match state.rows.get_mut(&id) {
            Some(appt) if appt.status == AppointmentStatus::Scheduled => {
                appt.employee_id = change.employee_id;
                appt.date = change.date;
                appt.start_time = change.start_time;
                appt.duration_minutes = change.duration_minutes;
                appt.updated_at = Utc::now();
                Ok(ScheduleWrite::Updated)
            }
            _ => Ok(ScheduleWrite::NotScheduled),
        }
    }

    async fn transition_status(
        &self,
        id: AppointmentId,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.rows.get_mut(&id) {
            Some(appt) if appt.status == from => {
                appt.status = to;
                appt.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_by_id(&self, id: AppointmentId) -> Result<Option<Appointment>, StoreError> {
        Ok(self.state.read().await.rows.get(&id).cloned())
    }

    async fn find_by_provider_and_date(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        Ok(self.state.read().await.provider_day(employee_id, date))
    }

    async fn find_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Appointment>, StoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<Appointment> = state
            .rows
            .values()
            .filter(|a| a.customer_id == customer_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (b.date, b.start_time, b.id).cmp(&(a.date, a.start_time, a.id))
        });
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn admit_all(_: &[Appointment]) -> bool {
        true
    }

    fn reject_all(_: &[Appointment]) -> bool {
        false
    }

    fn new_appt(customer_id: CustomerId, date: &str, time: &str) -> NewAppointment {
        NewAppointment {
            customer_id,
            employee_id: 5,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            start_time: NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
            duration_minutes: 30,
            note: None,
        }
    }

    // ---- insert ----

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let store = MemoryAppointmentStore::new();
        let first = store.insert(&new_appt(1, "2024-01-10", "09:00"), &admit_all).await.unwrap();
        let second = store.insert(&new_appt(1, "2024-01-10", "10:00"), &admit_all).await.unwrap();
        assert_eq!(first, Some(1));
        assert_eq!(second, Some(2));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn insert_starts_scheduled() {
        let store = MemoryAppointmentStore::new();
        let id = store
            .insert(&new_appt(1, "2024-01-10", "09:00"), &admit_all)
            .await
            .unwrap()
            .unwrap();
        let appt = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
    }

    #[tokio::test]
    async fn rejected_insert_writes_nothing() {
        let store = MemoryAppointmentStore::new();
        let result = store.insert(&new_appt(1, "2024-01-10", "09:00"), &reject_all).await.unwrap();
        assert!(result.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn guard_sees_only_the_target_provider_day() {
        let store = MemoryAppointmentStore::new();
        store.insert(&new_appt(1, "2024-01-10", "09:00"), &admit_all).await.unwrap();
        store.insert(&new_appt(1, "2024-01-11", "09:00"), &admit_all).await.unwrap();

        let seen = std::sync::Mutex::new(0usize);
        let counting = |rows: &[Appointment]| {
            *seen.lock().unwrap() = rows.len();
            true
        };
        store.insert(&new_appt(1, "2024-01-10", "11:00"), &counting).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    // ---- update_schedule / transition_status ----

    #[tokio::test]
    async fn update_schedule_moves_scheduled_appointment() {
        let store = MemoryAppointmentStore::new();
        let id = store
            .insert(&new_appt(1, "2024-01-10", "09:00"), &admit_all)
            .await
            .unwrap()
            .unwrap();
        let change = ScheduleChange {
            employee_id: 6,
            date: NaiveDate::from_ymd_opt(2024, 1, 12).unwrap(),
            start_time: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            duration_minutes: 60,
        };

        let outcome = store.update_schedule(id, &change, &admit_all).await.unwrap();
        assert_eq!(outcome, ScheduleWrite::Updated);

        let appt = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(appt.employee_id, 6);
        assert_eq!(appt.duration_minutes, 60);
    }

    #[tokio::test]
    async fn update_schedule_skips_terminal_and_missing_rows() {
        let store = MemoryAppointmentStore::new();
        let id = store
            .insert(&new_appt(1, "2024-01-10", "09:00"), &admit_all)
            .await
            .unwrap()
            .unwrap();
        store
            .transition_status(id, AppointmentStatus::Scheduled, AppointmentStatus::Cancelled)
            .await
            .unwrap();

        let change = ScheduleChange {
            employee_id: 5,
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            start_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            duration_minutes: 30,
        };
        assert_eq!(
            store.update_schedule(id, &change, &admit_all).await.unwrap(),
            ScheduleWrite::NotScheduled
        );
        assert_eq!(
            store.update_schedule(999, &change, &admit_all).await.unwrap(),
            ScheduleWrite::NotScheduled
        );
        assert_eq!(
            store.update_schedule(id, &change, &reject_all).await.unwrap(),
            ScheduleWrite::SlotTaken
        );
    }

    #[tokio::test]
    async fn transition_status_requires_expected_from_state() {
        let store = MemoryAppointmentStore::new();
        let id = store
            .insert(&new_appt(1, "2024-01-10", "09:00"), &admit_all)
            .await
            .unwrap()
            .unwrap();

        assert!(!store
            .transition_status(id, AppointmentStatus::Completed, AppointmentStatus::Cancelled)
            .await
            .unwrap());
        assert!(store
            .transition_status(id, AppointmentStatus::Scheduled, AppointmentStatus::Completed)
            .await
            .unwrap());
        assert_eq!(
            store.find_by_id(id).await.unwrap().unwrap().status,
            AppointmentStatus::Completed
        );
    }

    // ---- finders ----

    #[tokio::test]
    async fn find_by_provider_and_date_orders_by_start_time() {
        let store = MemoryAppointmentStore::new();
        store.insert(&new_appt(1, "2024-01-10", "14:00"), &admit_all).await.unwrap();
        store.insert(&new_appt(2, "2024-01-10", "09:00"), &admit_all).await.unwrap();
        store.insert(&new_appt(3, "2024-01-11", "08:00"), &admit_all).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let rows = store.find_by_provider_and_date(5, day).await.unwrap();
        let customers: Vec<_> = rows.iter().map(|a| a.customer_id).collect();
        assert_eq!(customers, vec![2, 1]);
    }

    #[tokio::test]
    async fn find_by_customer_returns_newest_date_first() {
        let store = MemoryAppointmentStore::new();
        store.insert(&new_appt(42, "2024-01-01", "09:00"), &admit_all).await.unwrap();
        store.insert(&new_appt(42, "2024-02-01", "09:00"), &admit_all).await.unwrap();
        store.insert(&new_appt(7, "2024-03-01", "09:00"), &admit_all).await.unwrap();

        let rows = store.find_by_customer(42).await.unwrap();
        let dates: Vec<_> = rows.iter().map(|a| a.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-02-01", "2024-01-01"]);
    }

    #[tokio::test]
    async fn find_by_id_missing_returns_none() {
        let store = MemoryAppointmentStore::new();
        assert!(store.find_by_id(1).await.unwrap().is_none());
    }
}

//! SQLite-backed appointment repository.
//!
//! All SQLite read/write logic lives here. Dates are stored as
//! `YYYY-MM-DD`, times as `HH:MM:SS` (both sort lexically), and audit
//! timestamps as RFC 3339 strings.
//!
//! Guarded writes run in one transaction whose first statement bumps the
//! `schedule_versions` row for the target provider/day. That write takes
//! SQLite's write lock before the day's bookings are read, so two writers
//! can never both pass the guard on the same snapshot. The partial unique
//! index on live `(employee_id, appointment_date, appointment_time)` is a
//! second line of defence and surfaces as [`StoreError::SlotTaken`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::sqlite::{Sqlite, SqliteConnection, SqliteRow};
use sqlx::{Executor, Row, SqlitePool};

use crate::scheduling::types::{
    Appointment, AppointmentId, AppointmentStatus, CustomerId, EmployeeId, NewAppointment,
    ScheduleChange,
};
use crate::store::{AppointmentStore, ScheduleWrite, SlotGuard, StoreError};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

const SELECT_COLUMNS: &str = "SELECT id, customer_id, employee_id, appointment_date, appointment_time,
        duration_minutes, status, note, created_at, updated_at
 FROM appointments";

/// Repository for reading and writing appointments to SQLite.
pub struct SqliteAppointmentStore {
    pool: SqlitePool,
}

impl SqliteAppointmentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn appointment_from_row(row: &SqliteRow) -> Result<Appointment, StoreError> {
    let id: i64 = row.try_get("id")?;
    let customer_id: i64 = row.try_get("customer_id")?;
    let employee_id: i64 = row.try_get("employee_id")?;
    let date: String = row.try_get("appointment_date")?;
    let time: String = row.try_get("appointment_time")?;
    let duration_minutes: i64 = row.try_get("duration_minutes")?;
    let status: String = row.try_get("status")?;
    let note: Option<String> = row.try_get("note")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    let corrupt = |what: &str, value: &str| {
        StoreError::corrupt(format!("appointment {}: bad {} '{}'", id, what, value))
    };

    Ok(Appointment {
        id,
        customer_id,
        employee_id,
        date: NaiveDate::parse_from_str(&date, DATE_FORMAT).map_err(|_| corrupt("date", &date))?,
        start_time: NaiveTime::parse_from_str(&time, TIME_FORMAT).map_err(|_| corrupt("time", &time))?,
        duration_minutes: u32::try_from(duration_minutes)
            .map_err(|_| corrupt("duration", &duration_minutes.to_string()))?,
        status: status.parse().map_err(|_| corrupt("status", &status))?,
        note,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|_| corrupt("created_at", &created_at))?
            .with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|_| corrupt("updated_at", &updated_at))?
            .with_timezone(&Utc),
    })
}

async fn select_provider_day<'e, E>(
    executor: E,
    employee_id: EmployeeId,
    date: NaiveDate,
) -> Result<Vec<Appointment>, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "{} WHERE employee_id = ? AND appointment_date = ? ORDER BY appointment_time ASC, id ASC",
        SELECT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(employee_id)
        .bind(format_date(date))
        .fetch_all(executor)
        .await?;

    rows.iter().map(appointment_from_row).collect()
}

/// Take the write lock for a provider/day by bumping its version row.
async fn lock_provider_day(
    conn: &mut SqliteConnection,
    employee_id: EmployeeId,
    date: NaiveDate,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO schedule_versions (employee_id, appointment_date, version)
         VALUES (?, ?, 1)
         ON CONFLICT (employee_id, appointment_date) DO UPDATE SET version = version + 1",
    )
    .bind(employee_id)
    .bind(format_date(date))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl AppointmentStore for SqliteAppointmentStore {
    async fn insert(
        &self,
        new: &NewAppointment,
        guard: SlotGuard<'_>,
    ) -> Result<Option<AppointmentId>, StoreError> {
        let mut tx = self.pool.begin().await?;

        lock_provider_day(&mut tx, new.employee_id, new.date).await?;
        let existing = select_provider_day(&mut *tx, new.employee_id, new.date).await?;
        if !guard(&existing) {
            // Dropping `tx` rolls the version bump back.
            return Ok(None);
        }

        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO appointments
             (customer_id, employee_id, appointment_date, appointment_time, duration_minutes,
              status, note, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new.customer_id)
        .bind(new.employee_id)
        .bind(format_date(new.date))
        .bind(format_time(new.start_time))
        .bind(new.duration_minutes as i64)
        .bind(AppointmentStatus::Scheduled.as_str())
        .bind(&new.note)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(result.last_insert_rowid()))
    }

    async fn update_schedule(
        &self,
        id: AppointmentId,
        change: &ScheduleChange,
        guard: SlotGuard<'_>,
    ) -> Result<ScheduleWrite, StoreError> {
        let mut tx = self.pool.begin().await?;

        lock_provider_day(&mut tx, change.employee_id, change.date).await?;
        let existing = select_provider_day(&mut *tx, change.employee_id, change.date).await?;
        if !guard(&existing) {
            return Ok(ScheduleWrite::SlotTaken);
        }

        let result = sqlx::query(
            "UPDATE appointments
             SET employee_id = ?, appointment_date = ?, appointment_time = ?,
                 duration_minutes = ?, updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(change.employee_id)
        .bind(format_date(change.date))
        .bind(format_time(change.start_time))
        .bind(change.duration_minutes as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(AppointmentStatus::Scheduled.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(ScheduleWrite::NotScheduled);
        }

        tx.commit().await?;
        Ok(ScheduleWrite::Updated)
    }

    async fn transition_status(
        &self,
        id: AppointmentId,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE appointments SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: AppointmentId) -> Result<Option<Appointment>, StoreError> {
        let sql = format!("{} WHERE id = ?", SELECT_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(appointment_from_row).transpose()
    }

    async fn find_by_provider_and_date(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        select_provider_day(&self.pool, employee_id, date).await
    }

    async fn find_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Appointment>, StoreError> {
        let sql = format!(
            "{} WHERE customer_id = ?
             ORDER BY appointment_date DESC, appointment_time DESC, id DESC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(appointment_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::db::create_pool;

    async fn make_repo() -> SqliteAppointmentStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        SqliteAppointmentStore::new(pool)
    }

    fn admit_all(_: &[Appointment]) -> bool {
        true
    }

    fn reject_all(_: &[Appointment]) -> bool {
        false
    }

    fn new_appt(customer_id: CustomerId, date: &str, time: &str, minutes: u32) -> NewAppointment {
        NewAppointment {
            customer_id,
            employee_id: 5,
            date: NaiveDate::parse_from_str(date, DATE_FORMAT).unwrap(),
            start_time: NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
            duration_minutes: minutes,
            note: Some("bring x-rays".into()),
        }
    }

    fn day(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, DATE_FORMAT).unwrap()
    }

    #[tokio::test]
    async fn insert_and_find_roundtrip() {
        let repo = make_repo().await;
        let new = new_appt(42, "2024-01-10", "10:00", 30);

        let id = repo.insert(&new, &admit_all).await.unwrap().unwrap();
        assert!(id > 0);

        let appt = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(appt.customer_id, 42);
        assert_eq!(appt.employee_id, 5);
        assert_eq!(appt.date, day("2024-01-10"));
        assert_eq!(appt.start_time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(appt.duration_minutes, 30);
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
        assert_eq!(appt.note.as_deref(), Some("bring x-rays"));
    }

    #[tokio::test]
    async fn rejected_insert_leaves_table_unchanged() {
        let repo = make_repo().await;
        let result = repo.insert(&new_appt(42, "2024-01-10", "10:00", 30), &reject_all).await.unwrap();
        assert!(result.is_none());
        assert!(repo.find_by_customer(42).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn guard_receives_provider_day_bookings() {
        let repo = make_repo().await;
        repo.insert(&new_appt(1, "2024-01-10", "09:00", 30), &admit_all).await.unwrap();
        repo.insert(&new_appt(2, "2024-01-10", "11:00", 30), &admit_all).await.unwrap();
        repo.insert(&new_appt(3, "2024-01-11", "09:00", 30), &admit_all).await.unwrap();

        let seen = std::sync::Mutex::new(Vec::new());
        let recording = |rows: &[Appointment]| {
            *seen.lock().unwrap() = rows.iter().map(|a| a.customer_id).collect::<Vec<_>>();
            false
        };
        repo.insert(&new_appt(4, "2024-01-10", "13:00", 30), &recording).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn unique_index_rejects_second_live_booking_at_same_start() {
        let repo = make_repo().await;
        repo.insert(&new_appt(1, "2024-01-10", "10:00", 30), &admit_all).await.unwrap();

        let err = repo
            .insert(&new_appt(2, "2024-01-10", "10:00", 30), &admit_all)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SlotTaken));
    }

    #[tokio::test]
    async fn unique_index_ignores_cancelled_bookings() {
        let repo = make_repo().await;
        let id = repo
            .insert(&new_appt(1, "2024-01-10", "10:00", 30), &admit_all)
            .await
            .unwrap()
            .unwrap();
        repo.transition_status(id, AppointmentStatus::Scheduled, AppointmentStatus::Cancelled)
            .await
            .unwrap();

        let again = repo.insert(&new_appt(2, "2024-01-10", "10:00", 30), &admit_all).await.unwrap();
        assert!(again.is_some());
    }

    #[tokio::test]
    async fn unique_index_ignores_zero_length_bookings() {
        let repo = make_repo().await;
        repo.insert(&new_appt(1, "2024-01-10", "10:00", 0), &admit_all).await.unwrap();

        let again = repo.insert(&new_appt(2, "2024-01-10", "10:00", 30), &admit_all).await.unwrap();
        assert!(again.is_some());
    }

    #[tokio::test]
    async fn find_by_provider_and_date_orders_by_time() {
        let repo = make_repo().await;
        repo.insert(&new_appt(1, "2024-01-10", "15:00", 30), &admit_all).await.unwrap();
        repo.insert(&new_appt(2, "2024-01-10", "08:30", 30), &admit_all).await.unwrap();
        repo.insert(&new_appt(3, "2024-01-10", "12:00", 30), &admit_all).await.unwrap();

        let rows = repo.find_by_provider_and_date(5, day("2024-01-10")).await.unwrap();
        let customers: Vec<_> = rows.iter().map(|a| a.customer_id).collect();
        assert_eq!(customers, vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn find_by_customer_orders_newest_date_first() {
        let repo = make_repo().await;
        repo.insert(&new_appt(42, "2024-01-01", "09:00", 30), &admit_all).await.unwrap();
        repo.insert(&new_appt(42, "2024-02-01", "09:00", 30), &admit_all).await.unwrap();
        repo.insert(&new_appt(43, "2024-03-01", "09:00", 30), &admit_all).await.unwrap();

        let rows = repo.find_by_customer(42).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, day("2024-02-01"));
        assert_eq!(rows[1].date, day("2024-01-01"));
    }

    #[tokio::test]
    async fn update_schedule_moves_appointment() {
        let repo = make_repo().await;
        let id = repo
            .insert(&new_appt(1, "2024-01-10", "09:00", 30), &admit_all)
            .await
            .unwrap()
            .unwrap();
        let change = ScheduleChange {
            employee_id: 8,
            date: day("2024-01-15"),
            start_time: NaiveTime::from_hms_opt(16, 15, 0).unwrap(),
            duration_minutes: 45,
        };

        let outcome = repo.update_schedule(id, &change, &admit_all).await.unwrap();
        assert_eq!(outcome, ScheduleWrite::Updated);

        let appt = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(appt.employee_id, 8);
        assert_eq!(appt.date, day("2024-01-15"));
        assert_eq!(appt.start_time, NaiveTime::from_hms_opt(16, 15, 0).unwrap());
        assert_eq!(appt.duration_minutes, 45);
    }

    #[tokio::test]
    async fn update_schedule_reports_rejection_and_terminal_rows() {
        let repo = make_repo().await;
        let id = repo
            .insert(&new_appt(1, "2024-01-10", "09:00", 30), &admit_all)
            .await
            .unwrap()
            .unwrap();
        let change = ScheduleChange {
            employee_id: 5,
            date: day("2024-01-10"),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            duration_minutes: 30,
        };

        assert_eq!(
            repo.update_schedule(id, &change, &reject_all).await.unwrap(),
            ScheduleWrite::SlotTaken
        );
        assert_eq!(
            repo.find_by_id(id).await.unwrap().unwrap().start_time,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );

        repo.transition_status(id, AppointmentStatus::Scheduled, AppointmentStatus::Completed)
            .await
            .unwrap();
        assert_eq!(
            repo.update_schedule(id, &change, &admit_all).await.unwrap(),
            ScheduleWrite::NotScheduled
        );
        assert_eq!(
            repo.update_schedule(9999, &change, &admit_all).await.unwrap(),
            ScheduleWrite::NotScheduled
        );
    }

    #[tokio::test]
    async fn transition_status_is_conditional() {
        let repo = make_repo().await;
        let id = repo
            .insert(&new_appt(1, "2024-01-10", "09:00", 30), &admit_all)
            .await
            .unwrap()
            .unwrap();

        assert!(repo
            .transition_status(id, AppointmentStatus::Scheduled, AppointmentStatus::Cancelled)
            .await
            .unwrap());
        assert!(!repo
            .transition_status(id, AppointmentStatus::Scheduled, AppointmentStatus::Completed)
            .await
            .unwrap());
        assert!(!repo
            .transition_status(9999, AppointmentStatus::Scheduled, AppointmentStatus::Cancelled)
            .await
            .unwrap());
        assert_eq!(
            repo.find_by_id(id).await.unwrap().unwrap().status,
            AppointmentStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn corrupt_row_is_reported_not_skipped() {
        let repo = make_repo().await;
        sqlx::query(
            "INSERT INTO appointments
             (customer_id, employee_id, appointment_date, appointment_time, duration_minutes,
              status, note, created_at, updated_at)
             VALUES (1, 5, 'not-a-date', '09:00:00', 30, 'scheduled', NULL, ?, ?)",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&repo.pool)
        .await
        .unwrap();

        let err = repo.find_by_customer(1).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn find_by_id_missing_returns_none() {
        let repo = make_repo().await;
        assert!(repo.find_by_id(1).await.unwrap().is_none());
    }
}

//! Availability engine.
//!
//! Pure functions that decide whether a [`Slot`] is free given the
//! appointments already on the books. Nothing here touches the store or
//! holds state, so every function is safe to call from any number of
//! tasks at once.
//!
//! The engine does its own filtering: callers may hand it the bookings for
//! exactly one provider/day or a wider list. An appointment blocks a slot
//! only when it belongs to the same provider, falls on the same date, is
//! not in a terminal status, and its interval strictly overlaps the
//! candidate (`s1 < e2 && e1 > s2`). Zero-length intervals block nothing
//! and are never blocked.

use chrono::NaiveDate;

use super::types::{Appointment, AppointmentId, EmployeeId, Slot};

/// Every appointment in `existing` that blocks `slot`, in input order.
/// `ignore` skips one appointment id, so an appointment being moved does
/// not conflict with itself.
pub fn conflicts<'a>(
    slot: &'a Slot,
    existing: &'a [Appointment],
    ignore: Option<AppointmentId>,
) -> impl Iterator<Item = &'a Appointment> + 'a {
    existing.iter().filter(move |appt| {
        Some(appt.id) != ignore
            && appt.employee_id == slot.employee_id
            && appt.date == slot.date
            && appt.occupies_time()
            && appt.time_range().overlaps(&slot.range)
    })
}

/// `true` when no appointment in `existing` blocks `slot`.
pub fn is_available(slot: &Slot, existing: &[Appointment]) -> bool {
    conflicts(slot, existing, None).next().is_none()
}

/// Like [`is_available`], but disregards the appointment with id `ignore`.
pub fn is_available_ignoring(slot: &Slot, existing: &[Appointment], ignore: AppointmentId) -> bool {
    conflicts(slot, existing, Some(ignore)).next().is_none()
}

/// The live bookings of one provider on one date, earliest first.
pub fn provider_schedule(
    employee_id: EmployeeId,
    date: NaiveDate,
    appointments: impl IntoIterator<Item = Appointment>,
) -> Vec<Appointment> {
    let mut schedule: Vec<Appointment> = appointments
        .into_iter()
        .filter(|a| a.employee_id == employee_id && a.date == date && a.occupies_time())
        .collect();
    schedule.sort_by_key(|a| (a.start_time, a.id));
    schedule
}

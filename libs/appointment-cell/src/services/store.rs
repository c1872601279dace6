use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::models::{
    Appointment, AppointmentDraft, AppointmentError, AppointmentId, AppointmentStatus,
    Occupant, Slot, SlotTime,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SlotBookingOutcome {
    Booked(Slot),
    AlreadyBooked,
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppointmentInsert {
    Inserted(Appointment),
    Conflict,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusTransition {
    Applied(Appointment),
    /// The appointment exists but was not in the expected status.
    Unchanged(Appointment),
    NotFound,
}

/// Durable home of the slot table, the appointment ledger and the booking counter.
///
/// Implementations serialize every mutation: `book_slot`, `insert_appointment` and
/// `transition_appointment` each check and write in one atomic step.
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    /// Creates the missing slots of `day`. Returns how many rows were created.
    async fn populate_day(&self, day: NaiveDate, times: &[SlotTime]) -> Result<usize, AppointmentError>;

    /// Books the slot if it is still available, drawing the next booking number.
    async fn book_slot(
        &self,
        day: NaiveDate,
        time: SlotTime,
        occupant: Occupant,
    ) -> Result<SlotBookingOutcome, AppointmentError>;

    /// Slots of `day` in time order.
    async fn slots_for_day(&self, day: NaiveDate) -> Result<Vec<Slot>, AppointmentError>;

    /// Every booked slot ordered by day then time.
    async fn booked_slots(&self) -> Result<Vec<Slot>, AppointmentError>;

    /// Inserts unless the draft's interval overlaps a non-cancelled appointment.
    async fn insert_appointment(&self, draft: AppointmentDraft) -> Result<AppointmentInsert, AppointmentError>;

    async fn appointment(&self, id: AppointmentId) -> Result<Option<Appointment>, AppointmentError>;

    /// Moves the appointment from `from` to `to`; any other current status leaves it untouched.
    async fn transition_appointment(
        &self,
        id: AppointmentId,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<StatusTransition, AppointmentError>;

    /// Appointments of any status starting in `[from, to)`, ordered by start.
    async fn appointments_starting_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, AppointmentError>;
}

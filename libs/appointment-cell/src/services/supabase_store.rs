use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, warn};

use shared_database::SupabaseClient;

use crate::models::{
    Appointment, AppointmentDraft, AppointmentError, AppointmentId, AppointmentStatus,
    BookingNumber, Occupant, Slot, SlotStatus, SlotTime,
};
use crate::services::store::{AppointmentInsert, SchedulingStore, SlotBookingOutcome, StatusTransition};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A row of the `slots` table.
#[derive(Debug, Deserialize)]
struct SlotRow {
    booking_number: Option<String>,
    day: NaiveDate,
    time: NaiveTime,
    status: SlotStatus,
    patient_name: Option<String>,
    patient_contact: Option<String>,
}

impl TryFrom<SlotRow> for Slot {
    type Error = AppointmentError;

    fn try_from(row: SlotRow) -> Result<Self, Self::Error> {
        let booking_number = row
            .booking_number
            .as_deref()
            .map(str::parse::<BookingNumber>)
            .transpose()?;
        let occupant = match (row.patient_name, row.patient_contact) {
            (Some(name), Some(contact)) => Some(Occupant { name, contact }),
            _ => None,
        };

        Ok(Slot {
            booking_number,
            day: row.day,
            time: SlotTime::new(row.time)?,
            status: row.status,
            occupant,
        })
    }
}

fn db_error(context: &str, e: anyhow::Error) -> AppointmentError {
    error!("Supabase {} failed: {:#}", context, e);
    AppointmentError::DatabaseError(format!("{} failed", context))
}

fn into_slots(rows: Vec<SlotRow>) -> Result<Vec<Slot>, AppointmentError> {
    rows.into_iter().map(Slot::try_from).collect()
}

/// Scheduling store backed by Supabase tables.
///
/// Booking and appointment insertion run as stored procedures (`book_slot`,
/// `schedule_appointment`) so the check and the write share one transaction.
pub struct SupabaseStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn slot(&self, day: NaiveDate, time: SlotTime) -> Result<Option<Slot>, AppointmentError> {
        let path = format!(
            "/rest/v1/slots?day=eq.{}&time=eq.{}",
            day,
            time.time().format("%H:%M:%S")
        );
        let rows: Vec<SlotRow> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| db_error("slot lookup", e))?;

        into_slots(rows).map(|slots| slots.into_iter().next())
    }
}

#[async_trait]
impl SchedulingStore for SupabaseStore {
    async fn populate_day(&self, day: NaiveDate, times: &[SlotTime]) -> Result<usize, AppointmentError> {
        let rows: Vec<_> = times
            .iter()
            .map(|time| {
                json!({
                    "day": day,
                    "time": time.time().format("%H:%M:%S").to_string(),
                    "status": SlotStatus::Available,
                })
            })
            .collect();

        let created: Vec<SlotRow> = self
            .supabase
            .insert_ignoring_duplicates("slots", json!(rows), "day,time")
            .await
            .map_err(|e| db_error("slot population", e))?;

        debug!("Populated {} new slots on {}", created.len(), day);
        Ok(created.len())
    }

    async fn book_slot(
        &self,
        day: NaiveDate,
        time: SlotTime,
        occupant: Occupant,
    ) -> Result<SlotBookingOutcome, AppointmentError> {
        let args = json!({
            "p_day": day,
            "p_time": time.time().format("%H:%M:%S").to_string(),
            "p_name": occupant.name,
            "p_contact": occupant.contact,
        });

        let booked: Vec<SlotRow> = self
            .supabase
            .rpc("book_slot", args)
            .await
            .map_err(|e| db_error("slot booking", e))?;

        if let Some(row) = booked.into_iter().next() {
            return Ok(SlotBookingOutcome::Booked(Slot::try_from(row)?));
        }

        // Nothing was updated: tell a taken slot apart from a missing one.
        match self.slot(day, time).await? {
            Some(_) => Ok(SlotBookingOutcome::AlreadyBooked),
            None => Ok(SlotBookingOutcome::Missing),
        }
    }

    async fn slots_for_day(&self, day: NaiveDate) -> Result<Vec<Slot>, AppointmentError> {
        let path = format!("/rest/v1/slots?day=eq.{}&order=time.asc", day);
        let rows: Vec<SlotRow> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| db_error("slot listing", e))?;

        into_slots(rows)
    }

    async fn booked_slots(&self) -> Result<Vec<Slot>, AppointmentError> {
        let path = "/rest/v1/slots?booking_number=not.is.null&order=day.asc,time.asc";
        let rows: Vec<SlotRow> = self
            .supabase
            .request(Method::GET, path, None)
            .await
            .map_err(|e| db_error("booking listing", e))?;

        into_slots(rows)
    }

    async fn insert_appointment(&self, draft: AppointmentDraft) -> Result<AppointmentInsert, AppointmentError> {
        let args = json!({
            "p_patient_name": draft.patient_name,
            "p_contact_email": draft.contact_email,
            "p_moment": draft.moment.format(TIMESTAMP_FORMAT).to_string(),
            "p_duration_minutes": draft.duration_minutes,
            "p_doctor": draft.doctor,
            "p_reason": draft.reason,
            "p_urgency": draft.urgency,
            "p_request_time": draft.request_time.format(TIMESTAMP_FORMAT).to_string(),
            "p_is_preferred_time": draft.is_preferred_time,
        });

        let inserted: Vec<Appointment> = self
            .supabase
            .rpc("schedule_appointment", args)
            .await
            .map_err(|e| db_error("appointment insert", e))?;

        match inserted.into_iter().next() {
            Some(appointment) => Ok(AppointmentInsert::Inserted(appointment)),
            None => {
                warn!("Appointment at {} rejected by overlap check", draft.moment);
                Ok(AppointmentInsert::Conflict)
            }
        }
    }

    async fn appointment(&self, id: AppointmentId) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| db_error("appointment lookup", e))?;

        Ok(rows.into_iter().next())
    }

    async fn transition_appointment(
        &self,
        id: AppointmentId,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<StatusTransition, AppointmentError> {
        let filter = format!("id=eq.{}&status=eq.{}", id, from);
        let updated: Vec<Appointment> = self
            .supabase
            .update_returning("appointments", &filter, json!({ "status": to }))
            .await
            .map_err(|e| db_error("appointment status update", e))?;

        if let Some(appointment) = updated.into_iter().next() {
            return Ok(StatusTransition::Applied(appointment));
        }

        Ok(match self.appointment(id).await? {
            Some(appointment) => StatusTransition::Unchanged(appointment),
            None => StatusTransition::NotFound,
        })
    }

    async fn appointments_starting_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?moment=gte.{}&moment=lt.{}&order=moment.asc,id.asc",
            from.format(TIMESTAMP_FORMAT),
            to.format(TIMESTAMP_FORMAT)
        );

        self.supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| db_error("appointment range query", e))
    }
}

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentId, BookingNumber, DayPart, NearbySlots, SlotTime, TimeRequest,
};

/// Per-conversation booking context. Each connection owns one; nothing is shared.
#[derive(Debug, Clone)]
pub struct BookingSession {
    pub id: Uuid,
    pub(crate) day: Option<NaiveDate>,
    pub(crate) time: Option<TimeRequest>,
    pub(crate) held: Option<(NaiveDate, SlotTime)>,
    pub(crate) suggestions: Vec<SlotTime>,
    pub(crate) patient_name: Option<String>,
    pub(crate) contact_phone: Option<String>,
}

impl BookingSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            day: None,
            time: None,
            held: None,
            suggestions: Vec::new(),
            patient_name: None,
            contact_phone: None,
        }
    }

    /// The slot waiting for contact details, if any.
    pub fn held_slot(&self) -> Option<(NaiveDate, SlotTime)> {
        self.held
    }

    pub fn suggestions(&self) -> &[SlotTime] {
        &self.suggestions
    }

    pub fn is_idle(&self) -> bool {
        self.day.is_none() && self.time.is_none() && self.held.is_none() && self.suggestions.is_empty()
    }

    pub(crate) fn contact_details(&self) -> Option<(&str, &str)> {
        Some((self.patient_name.as_deref()?, self.contact_phone.as_deref()?))
    }

    pub(crate) fn hold(&mut self, day: NaiveDate, time: SlotTime) {
        self.held = Some((day, time));
        self.suggestions.clear();
    }

    pub(crate) fn suggest(&mut self, day: NaiveDate, nearby: &NearbySlots) {
        self.day = Some(day);
        self.time = None;
        self.held = None;
        self.suggestions = nearby.times();
    }

    /// Forgets the pending booking after it is confirmed.
    pub(crate) fn reset(&mut self) {
        self.day = None;
        self.time = None;
        self.held = None;
        self.suggestions.clear();
    }
}

impl Default for BookingSession {
    fn default() -> Self {
        Self::new()
    }
}

/// What the conversation should tell the caller next.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionReply {
    NeedDate,
    NeedTime {
        day: NaiveDate,
    },
    NeedContactDetails {
        day: NaiveDate,
        time: SlotTime,
    },
    Confirmed {
        booking_number: BookingNumber,
        day: NaiveDate,
        time: SlotTime,
    },
    Unavailable {
        day: NaiveDate,
        time: SlotTime,
        nearby: NearbySlots,
    },
    NoSlot {
        day: NaiveDate,
        time: SlotTime,
    },
    NoSlotInRange {
        day: NaiveDate,
        part: DayPart,
    },
    Appointments {
        day: NaiveDate,
        appointments: Vec<Appointment>,
    },
    NeedAppointmentId,
    Cancelled {
        appointment_id: AppointmentId,
    },
    AppointmentNotFound {
        appointment_id: AppointmentId,
    },
}

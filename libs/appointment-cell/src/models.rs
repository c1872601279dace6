// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use learning_cell::{Prioritized, Urgency};
use shared_config::SchedulingConfig;

pub type AppointmentId = u64;

// ==============================================================================
// SLOT GRID
// ==============================================================================

/// A time of day on the booking grid, shown on a 12-hour clock ("02:30 PM").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    pub fn new(time: NaiveTime) -> Result<Self, AppointmentError> {
        if time.second() != 0 || time.nanosecond() != 0 {
            return Err(AppointmentError::InvalidTime(format!(
                "{} is not on a whole minute", time
            )));
        }
        Ok(Self(time))
    }

    pub fn from_hm(hour: u32, minute: u32) -> Result<Self, AppointmentError> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| AppointmentError::InvalidTime(format!("{:02}:{:02}", hour, minute)))
            .and_then(Self::new)
    }

    pub fn time(self) -> NaiveTime {
        self.0
    }

    pub fn on(self, day: NaiveDate) -> NaiveDateTime {
        day.and_time(self.0)
    }

    pub fn is_on_grid(self, slot_minutes: u32) -> bool {
        slot_minutes > 0 && self.0.minute() % slot_minutes == 0
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%I:%M %p"))
    }
}

impl FromStr for SlotTime {
    type Err = AppointmentError;

    /// Accepts "09:30 AM", "9:30 pm", "9:30PM" and 24-hour "14:30".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact = s.trim().to_uppercase().replace(' ', "");

        let parsed = if compact.ends_with("AM") || compact.ends_with("PM") {
            NaiveTime::parse_from_str(&compact, "%I:%M%p")
        } else {
            NaiveTime::parse_from_str(&compact, "%H:%M")
        };

        parsed
            .map_err(|_| AppointmentError::InvalidTime(format!("cannot parse {:?}", s)))
            .and_then(Self::new)
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Every slot start from `slot_day_start` to `slot_day_end` inclusive.
pub fn slot_table_grid(config: &SchedulingConfig) -> Vec<SlotTime> {
    let step = config.slot_duration();
    let mut times = Vec::new();
    let mut current = config.slot_day_start;

    while current <= config.slot_day_end {
        if let Ok(time) = SlotTime::new(current) {
            times.push(time);
        }
        let (next, wrapped) = current.overflowing_add_signed(step);
        if wrapped != 0 || next <= current {
            break;
        }
        current = next;
    }

    times
}

/// `moment + span`, pinned to the ends of the calendar instead of overflowing.
pub fn saturating_shift(moment: NaiveDateTime, span: Duration) -> NaiveDateTime {
    match moment.checked_add_signed(span) {
        Some(shifted) => shifted,
        None if span < Duration::zero() => NaiveDateTime::MIN,
        None => NaiveDateTime::MAX,
    }
}

/// Appointment starts on `day` within business hours (closing hour exclusive).
/// Starts whose slot would end past the last representable instant are left out.
pub fn business_grid(config: &SchedulingConfig, day: NaiveDate) -> Vec<NaiveDateTime> {
    let step = config.slot_duration();
    let Some(open) = day.and_hms_opt(config.business_start_hour, 0, 0) else {
        return Vec::new();
    };
    let close = saturating_shift(
        day.and_time(NaiveTime::MIN),
        Duration::hours(i64::from(config.business_end_hour)),
    );

    let mut moments = Vec::new();
    let mut current = open;
    while current < close {
        let Some(next) = current.checked_add_signed(step) else {
            break;
        };
        moments.push(current);
        current = next;
    }
    moments
}

/// Named part of the day a caller can ask for instead of an exact time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPart {
    Morning,
    Afternoon,
    Evening,
}

impl DayPart {
    /// Inclusive bounds of the part.
    pub fn bounds(self) -> (NaiveTime, NaiveTime) {
        let hm = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN);
        match self {
            DayPart::Morning => (hm(9, 0), hm(12, 0)),
            DayPart::Afternoon => (hm(12, 30), hm(16, 0)),
            DayPart::Evening => (hm(16, 30), hm(19, 30)),
        }
    }

    pub fn contains(self, time: SlotTime) -> bool {
        let (start, end) = self.bounds();
        start <= time.time() && time.time() <= end
    }
}

impl fmt::Display for DayPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayPart::Morning => write!(f, "morning"),
            DayPart::Afternoon => write!(f, "afternoon"),
            DayPart::Evening => write!(f, "evening"),
        }
    }
}

// ==============================================================================
// SLOT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    Available,
    Booked,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotStatus::Available => write!(f, "Available"),
            SlotStatus::Booked => write!(f, "Booked"),
        }
    }
}

/// Store-wide booking number, rendered as `BOOK-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BookingNumber(pub u64);

impl fmt::Display for BookingNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BOOK-{}", self.0)
    }
}

impl FromStr for BookingNumber {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("BOOK-")
            .and_then(|n| n.parse().ok())
            .map(BookingNumber)
            .ok_or_else(|| AppointmentError::ValidationError(format!("invalid booking number {:?}", s)))
    }
}

impl Serialize for BookingNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BookingNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub name: String,
    pub contact: String,
}

/// One cell of the slot table. `booking_number` and `occupant` are set exactly when booked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub booking_number: Option<BookingNumber>,
    pub day: NaiveDate,
    pub time: SlotTime,
    pub status: SlotStatus,
    pub occupant: Option<Occupant>,
}

impl Slot {
    pub fn available(day: NaiveDate, time: SlotTime) -> Self {
        Self {
            booking_number: None,
            day,
            time,
            status: SlotStatus::Available,
            occupant: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == SlotStatus::Available
    }

    /// Flips an available slot to booked; a booked slot is left untouched.
    pub fn book(&mut self, number: BookingNumber, occupant: Occupant) -> bool {
        if !self.is_available() {
            return false;
        }
        self.status = SlotStatus::Booked;
        self.booking_number = Some(number);
        self.occupant = Some(occupant);
        true
    }
}

/// Open neighbours of a taken slot on the same day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearbySlots {
    pub predecessor: Option<SlotTime>,
    pub successor: Option<SlotTime>,
}

impl NearbySlots {
    pub fn is_empty(&self) -> bool {
        self.predecessor.is_none() && self.successor.is_none()
    }

    pub fn times(&self) -> Vec<SlotTime> {
        self.predecessor.into_iter().chain(self.successor).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSlotRequest {
    pub time: SlotTime,
    pub name: String,
    pub contact: String,
}

// ==============================================================================
// APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Cancelled,
    Completed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub patient_name: String,
    pub contact_email: Option<String>,
    pub moment: NaiveDateTime,
    pub duration_minutes: u32,
    pub doctor: String,
    pub status: AppointmentStatus,
    pub reason: String,
    pub urgency: Urgency,
    pub request_time: NaiveDateTime,
    pub is_preferred_time: bool,
}

impl Appointment {
    pub fn end(&self) -> NaiveDateTime {
        saturating_shift(self.moment, Duration::minutes(i64::from(self.duration_minutes)))
    }

    /// Cancelled appointments no longer hold their interval.
    pub fn is_active(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }

    /// Half-open interval overlap with `[start, end)`.
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.moment < end && start < self.end()
    }
}

/// Everything but the store-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentDraft {
    pub patient_name: String,
    pub contact_email: Option<String>,
    pub moment: NaiveDateTime,
    pub duration_minutes: u32,
    pub doctor: String,
    pub reason: String,
    pub urgency: Urgency,
    pub request_time: NaiveDateTime,
    pub is_preferred_time: bool,
}

impl AppointmentDraft {
    pub fn end(&self) -> NaiveDateTime {
        saturating_shift(self.moment, Duration::minutes(i64::from(self.duration_minutes)))
    }

    pub fn into_appointment(self, id: AppointmentId) -> Appointment {
        Appointment {
            id,
            patient_name: self.patient_name,
            contact_email: self.contact_email,
            moment: self.moment,
            duration_minutes: self.duration_minutes,
            doctor: self.doctor,
            status: AppointmentStatus::Scheduled,
            reason: self.reason,
            urgency: self.urgency,
            request_time: self.request_time,
            is_preferred_time: self.is_preferred_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleAppointmentRequest {
    pub patient_name: String,
    pub moment: NaiveDateTime,
    pub doctor: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextAvailableQuery {
    pub preferred_start: NaiveDateTime,
    #[serde(default)]
    pub urgency: Urgency,
}

// ==============================================================================
// BATCH ALLOCATION MODELS
// ==============================================================================

/// A pending appointment request competing for the next free slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRequest {
    #[serde(default = "Uuid::new_v4")]
    pub request_id: Uuid,
    pub patient_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub doctor: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub urgency: Urgency,
    pub preferred_start: NaiveDateTime,
    pub request_time: NaiveDateTime,
    #[serde(skip)]
    pub success_probability: f64,
    #[serde(skip)]
    pub preferred_time_free: bool,
    #[serde(default)]
    pub priority_score: Option<f64>,
}

impl Prioritized for AppointmentRequest {
    fn urgency(&self) -> Urgency {
        self.urgency
    }

    fn success_probability(&self) -> f64 {
        self.success_probability
    }

    fn request_time(&self) -> NaiveDateTime {
        self.request_time
    }

    fn is_preferred_time(&self) -> bool {
        self.preferred_time_free
    }

    fn set_priority_score(&mut self, score: f64) {
        self.priority_score = Some(score);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub request_id: Uuid,
    pub priority_score: f64,
    pub appointment: Option<Appointment>,
}

// ==============================================================================
// RESOLVED CONVERSATIONAL REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Schedule,
    Cancel,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRequest {
    At(SlotTime),
    Range(DayPart),
}

/// A request already resolved from free text by the language layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedRequest {
    pub intent: Intent,
    #[serde(default)]
    pub day: Option<NaiveDate>,
    #[serde(default)]
    pub time: Option<TimeRequest>,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    pub doctor: String,
    #[serde(default)]
    pub appointment_id: Option<AppointmentId>,
}

static PHONE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\d{3}[-\s]?\d{3}[-\s]?\d{4}$").ok());

/// Normalises a ten digit phone number, dropping dashes and spaces.
pub fn normalize_phone(raw: &str) -> Result<String, AppointmentError> {
    let trimmed = raw.trim();
    let matches = PHONE_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(trimmed));
    if !matches {
        return Err(AppointmentError::ValidationError(format!(
            "{:?} is not a 10-digit phone number", raw
        )));
    }
    Ok(trimmed.chars().filter(char::is_ascii_digit).collect())
}

impl ResolvedRequest {
    pub fn new(intent: Intent, doctor: impl Into<String>) -> Self {
        Self {
            intent,
            day: None,
            time: None,
            urgency: Urgency::default(),
            patient_name: None,
            contact_phone: None,
            doctor: doctor.into(),
            appointment_id: None,
        }
    }

    pub fn on(mut self, day: NaiveDate) -> Self {
        self.day = Some(day);
        self
    }

    pub fn at(mut self, time: SlotTime) -> Self {
        self.time = Some(TimeRequest::At(time));
        self
    }

    pub fn during(mut self, part: DayPart) -> Self {
        self.time = Some(TimeRequest::Range(part));
        self
    }

    pub fn from_patient(mut self, name: impl Into<String>, phone: impl Into<String>) -> Self {
        self.patient_name = Some(name.into());
        self.contact_phone = Some(phone.into());
        self
    }

    /// Checks the request against the slot grid and normalises free-form fields.
    pub fn validate(mut self, config: &SchedulingConfig) -> Result<Self, AppointmentError> {
        if let Some(TimeRequest::At(time)) = self.time {
            if !time.is_on_grid(config.slot_duration_minutes) {
                return Err(AppointmentError::InvalidTime(format!(
                    "{} is not on the {}-minute grid", time, config.slot_duration_minutes
                )));
            }
        }

        self.patient_name = self
            .patient_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        self.contact_phone = self
            .contact_phone
            .as_deref()
            .map(normalize_phone)
            .transpose()?;

        if self.doctor.trim().is_empty() {
            return Err(AppointmentError::ValidationError("doctor is required".to_string()));
        }

        Ok(self)
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("No slot exists on {day} at {time}")]
    SlotNotFound { day: NaiveDate, time: SlotTime },

    #[error("Slot on {day} at {time} is already booked")]
    SlotNotAvailable {
        day: NaiveDate,
        time: SlotTime,
        nearby: NearbySlots,
    },

    #[error("Appointment conflicts with existing booking")]
    ConflictDetected,

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

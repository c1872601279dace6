#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use appointment_cell::*;
use learning_cell::{OutcomeTracker, Urgency};
use shared_config::SchedulingConfig;

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(day: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    day.and_hms_opt(hour, minute, 0).unwrap()
}

pub fn slot(hour: u32, minute: u32) -> SlotTime {
    SlotTime::from_hm(hour, minute).unwrap()
}

/// Learner double that answers a fixed probability and records every reported outcome.
pub struct RecordingTracker {
    pub probability: f64,
    pub outcomes: Mutex<Vec<(NaiveDateTime, Urgency, bool)>>,
}

impl RecordingTracker {
    pub fn new(probability: f64) -> Self {
        Self {
            probability,
            outcomes: Mutex::new(Vec::new()),
        }
    }

    pub fn outcomes(&self) -> Vec<(NaiveDateTime, Urgency, bool)> {
        self.outcomes.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutcomeTracker for RecordingTracker {
    fn predict_success_probability(&self, _moment: NaiveDateTime, _urgency: Urgency) -> f64 {
        self.probability
    }

    async fn learn(&self, moment: NaiveDateTime, urgency: Urgency, success: bool) {
        self.outcomes.lock().unwrap().push((moment, urgency, success));
    }
}

pub struct Harness {
    pub service: Arc<BookingService>,
    pub store: Arc<FileStore>,
    pub tracker: Arc<RecordingTracker>,
}

/// In-memory service whose clock is frozen at `now`.
pub fn harness_at(now: NaiveDateTime) -> Harness {
    let store = Arc::new(FileStore::in_memory());
    let tracker = Arc::new(RecordingTracker::new(0.5));
    let service = Arc::new(BookingService::with_clock(
        SchedulingConfig::default(),
        store.clone(),
        tracker.clone(),
        Arc::new(FixedClock(now)),
    ));

    Harness { service, store, tracker }
}

pub fn appointment_at(moment: NaiveDateTime, patient: &str) -> ScheduleAppointmentRequest {
    ScheduleAppointmentRequest {
        patient_name: patient.to_string(),
        moment,
        doctor: "Dr. Smith".to_string(),
        reason: "checkup".to_string(),
        urgency: Urgency::new(3).unwrap(),
        email: None,
    }
}

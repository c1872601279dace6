use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use tracing::{debug, instrument, warn};

use learning_cell::{OutcomeTracker, Urgency, DEFAULT_SUCCESS_PROBABILITY};
use shared_config::SchedulingConfig;

use crate::models::{business_grid, saturating_shift, Appointment, AppointmentError};
use crate::services::clock::Clock;
use crate::services::store::SchedulingStore;

/// Overlap checks and free-slot search over the appointment ledger.
pub struct AvailabilityService {
    store: Arc<dyn SchedulingStore>,
    learner: Arc<dyn OutcomeTracker>,
    config: SchedulingConfig,
    clock: Arc<dyn Clock>,
}

impl AvailabilityService {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        learner: Arc<dyn OutcomeTracker>,
        config: SchedulingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, learner, config, clock }
    }

    /// Whether a non-cancelled appointment overlaps one slot starting at `moment`.
    pub async fn is_slot_taken(&self, moment: NaiveDateTime) -> Result<bool, AppointmentError> {
        let end = saturating_shift(moment, self.config.slot_duration());
        let active = self
            .active_between(saturating_shift(moment, -Duration::days(1)), end)
            .await?;
        Ok(Self::overlaps_any(&active, moment, end))
    }

    /// First free business-hour slot from the day of `preferred_start` onwards,
    /// skipping weekends and moments already in the past.
    #[instrument(skip(self))]
    pub async fn next_available_slot(
        &self,
        preferred_start: NaiveDateTime,
        urgency: Urgency,
    ) -> Result<Option<NaiveDateTime>, AppointmentError> {
        let now = self.clock.now();
        let horizon = i64::from(self.config.search_horizon_days);
        let first_day = preferred_start.date();
        let step = self.config.slot_duration();

        let first_midnight = first_day.and_time(NaiveTime::MIN);
        let window_start = saturating_shift(first_midnight, -Duration::days(1));
        let window_end = saturating_shift(first_midnight, Duration::days(horizon + 1));
        let active = self.active_between(window_start, window_end).await?;

        for offset in 0..horizon {
            // The calendar ends before the horizon does.
            let Some(day) = first_day.checked_add_signed(Duration::days(offset)) else {
                break;
            };
            if Self::is_weekend(day) {
                continue;
            }

            let free = business_grid(&self.config, day)
                .into_iter()
                .filter(|moment| *moment >= now)
                .find(|moment| !Self::overlaps_any(&active, *moment, saturating_shift(*moment, step)));

            if let Some(moment) = free {
                debug!("Next available slot for urgency {} is {}", urgency, moment);
                return Ok(Some(moment));
            }
        }

        warn!(
            "No free slot within {} days of {}",
            self.config.search_horizon_days, preferred_start
        );
        Ok(None)
    }

    /// Free business-hour moments of `day` that the learner expects to succeed.
    pub async fn available_moments(&self, day: NaiveDate) -> Result<Vec<NaiveDateTime>, AppointmentError> {
        let step = self.config.slot_duration();
        let day_start = day.and_time(NaiveTime::MIN);
        let active = self
            .active_between(
                saturating_shift(day_start, -Duration::days(1)),
                saturating_shift(day_start, Duration::days(1)),
            )
            .await?;

        Ok(business_grid(&self.config, day)
            .into_iter()
            .filter(|moment| !Self::overlaps_any(&active, *moment, saturating_shift(*moment, step)))
            .filter(|moment| {
                self.learner.predict_success_probability(*moment, Urgency::ROUTINE)
                    >= DEFAULT_SUCCESS_PROBABILITY
            })
            .collect())
    }

    async fn active_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut appointments = self.store.appointments_starting_between(from, to).await?;
        appointments.retain(Appointment::is_active);
        Ok(appointments)
    }

    fn overlaps_any(appointments: &[Appointment], start: NaiveDateTime, end: NaiveDateTime) -> bool {
        appointments.iter().any(|a| a.overlaps(start, end))
    }

    fn is_weekend(day: NaiveDate) -> bool {
        matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

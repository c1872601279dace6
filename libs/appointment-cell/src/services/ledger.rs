use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use tracing::{debug, info, instrument, warn};

use learning_cell::OutcomeTracker;
use shared_config::SchedulingConfig;

use crate::models::{
    saturating_shift, Appointment, AppointmentDraft, AppointmentError, AppointmentId,
    AppointmentStatus, ScheduleAppointmentRequest,
};
use crate::services::clock::Clock;
use crate::services::store::{AppointmentInsert, SchedulingStore, StatusTransition};

/// Appointment lifecycle: scheduling, cancellation and completion.
///
/// Terminal transitions report their outcome to the learner exactly once.
pub struct AppointmentLedger {
    store: Arc<dyn SchedulingStore>,
    learner: Arc<dyn OutcomeTracker>,
    config: SchedulingConfig,
    clock: Arc<dyn Clock>,
}

impl AppointmentLedger {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        learner: Arc<dyn OutcomeTracker>,
        config: SchedulingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, learner, config, clock }
    }

    /// Records a new appointment. Returns `None` when the moment is already taken.
    pub async fn schedule_appointment(
        &self,
        request: ScheduleAppointmentRequest,
    ) -> Result<Option<Appointment>, AppointmentError> {
        self.schedule(request, false).await
    }

    pub(crate) async fn schedule(
        &self,
        request: ScheduleAppointmentRequest,
        is_preferred_time: bool,
    ) -> Result<Option<Appointment>, AppointmentError> {
        self.validate(&request)?;

        let draft = AppointmentDraft {
            patient_name: request.patient_name.trim().to_string(),
            contact_email: request.email.filter(|e| !e.trim().is_empty()),
            moment: request.moment,
            duration_minutes: self.config.slot_duration_minutes,
            doctor: request.doctor,
            reason: request.reason,
            urgency: request.urgency,
            request_time: self.clock.now(),
            is_preferred_time,
        };

        match self.store.insert_appointment(draft).await? {
            AppointmentInsert::Inserted(appointment) => {
                info!(
                    "Scheduled appointment {} for {} at {}",
                    appointment.id, appointment.patient_name, appointment.moment
                );
                Ok(Some(appointment))
            }
            AppointmentInsert::Conflict => {
                warn!("Appointment at {} conflicts with an existing one", request.moment);
                Ok(None)
            }
        }
    }

    /// Cancels the appointment and reports a failed outcome. Returns whether the id exists.
    #[instrument(skip(self))]
    pub async fn cancel_appointment(&self, id: AppointmentId) -> Result<bool, AppointmentError> {
        let transition = self
            .store
            .transition_appointment(id, AppointmentStatus::Scheduled, AppointmentStatus::Cancelled)
            .await?;

        match transition {
            StatusTransition::NotFound => Ok(false),
            StatusTransition::Applied(appointment) => {
                info!("Cancelled appointment {}", id);
                self.learner
                    .learn(appointment.moment, appointment.urgency, false)
                    .await;
                Ok(true)
            }
            StatusTransition::Unchanged(appointment) => match appointment.status {
                AppointmentStatus::Cancelled => {
                    debug!("Appointment {} was already cancelled", id);
                    Ok(true)
                }
                status => Err(AppointmentError::InvalidStatusTransition(status)),
            },
        }
    }

    /// Marks the appointment completed and reports a successful outcome.
    #[instrument(skip(self))]
    pub async fn complete_appointment(&self, id: AppointmentId) -> Result<bool, AppointmentError> {
        let transition = self
            .store
            .transition_appointment(id, AppointmentStatus::Scheduled, AppointmentStatus::Completed)
            .await?;

        match transition {
            StatusTransition::NotFound => Ok(false),
            StatusTransition::Applied(appointment) => {
                info!("Completed appointment {}", id);
                self.learner
                    .learn(appointment.moment, appointment.urgency, true)
                    .await;
                Ok(true)
            }
            StatusTransition::Unchanged(appointment) => match appointment.status {
                AppointmentStatus::Completed => {
                    debug!("Appointment {} was already completed", id);
                    Ok(true)
                }
                status => Err(AppointmentError::InvalidStatusTransition(status)),
            },
        }
    }

    pub async fn appointment(&self, id: AppointmentId) -> Result<Appointment, AppointmentError> {
        self.store
            .appointment(id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    /// Every appointment starting on `day`, whatever its status, by start time.
    pub async fn appointments_for_day(&self, day: NaiveDate) -> Result<Vec<Appointment>, AppointmentError> {
        let start = day.and_time(NaiveTime::MIN);
        self.store
            .appointments_starting_between(start, saturating_shift(start, Duration::days(1)))
            .await
    }

    fn validate(&self, request: &ScheduleAppointmentRequest) -> Result<(), AppointmentError> {
        if request.patient_name.trim().is_empty() {
            return Err(AppointmentError::ValidationError("patient name is required".to_string()));
        }
        if request.doctor.trim().is_empty() {
            return Err(AppointmentError::ValidationError("doctor is required".to_string()));
        }

        let moment = request.moment;
        if moment.second() != 0
            || moment.nanosecond() != 0
            || moment.minute() % self.config.slot_duration_minutes != 0
        {
            return Err(AppointmentError::InvalidTime(format!(
                "{} is not on the {}-minute grid",
                moment, self.config.slot_duration_minutes
            )));
        }
        if moment.checked_add_signed(self.config.slot_duration()).is_none() {
            return Err(AppointmentError::InvalidTime(format!(
                "{} leaves no room for a {}-minute slot",
                moment, self.config.slot_duration_minutes
            )));
        }

        Ok(())
    }
}

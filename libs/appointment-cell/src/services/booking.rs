use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use learning_cell::{OutcomeTracker, PriorityScorer};
use shared_config::SchedulingConfig;

use crate::models::{
    Appointment, AppointmentError, AppointmentRequest, BatchOutcome, Intent, ResolvedRequest,
    ScheduleAppointmentRequest, TimeRequest,
};
use crate::services::clock::{Clock, SystemClock};
use crate::services::conflict::AvailabilityService;
use crate::services::ledger::AppointmentLedger;
use crate::services::session::{BookingSession, SessionReply};
use crate::services::slots::SlotService;
use crate::services::store::SchedulingStore;

/// Attempts per batch request when a concurrent writer takes the found slot first.
const BATCH_PLACEMENT_ATTEMPTS: usize = 3;

pub struct BookingService {
    pub slots: SlotService,
    pub availability: AvailabilityService,
    pub ledger: AppointmentLedger,
    learner: Arc<dyn OutcomeTracker>,
    scorer: PriorityScorer,
    config: SchedulingConfig,
    clock: Arc<dyn Clock>,
}

impl BookingService {
    pub fn new(
        config: SchedulingConfig,
        store: Arc<dyn SchedulingStore>,
        learner: Arc<dyn OutcomeTracker>,
    ) -> Self {
        Self::with_clock(config, store, learner, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: SchedulingConfig,
        store: Arc<dyn SchedulingStore>,
        learner: Arc<dyn OutcomeTracker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            slots: SlotService::new(store.clone(), config.clone()),
            availability: AvailabilityService::new(store.clone(), learner.clone(), config.clone(), clock.clone()),
            ledger: AppointmentLedger::new(store, learner.clone(), config.clone(), clock.clone()),
            learner,
            scorer: PriorityScorer::default(),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &SchedulingConfig {
        &self.config
    }

    // ==============================================================================
    // BATCH ALLOCATION
    // ==============================================================================

    /// Predicts, ranks and places a batch of requests, highest priority first.
    /// Outcomes come back in placement order.
    #[instrument(skip(self, requests))]
    pub async fn schedule_batch(
        &self,
        mut requests: Vec<AppointmentRequest>,
    ) -> Result<Vec<BatchOutcome>, AppointmentError> {
        let now = self.clock.now();
        info!("Scheduling batch of {} requests", requests.len());

        let free_checks = join_all(
            requests
                .iter()
                .map(|r| self.availability.is_slot_taken(r.preferred_start)),
        )
        .await;

        for (request, taken) in requests.iter_mut().zip(free_checks) {
            request.success_probability = self
                .learner
                .predict_success_probability(request.preferred_start, request.urgency);
            request.preferred_time_free = request.preferred_start >= now && !taken?;
        }

        let ranked = self.scorer.rank(requests, now);

        let mut outcomes = Vec::with_capacity(ranked.len());
        for request in ranked {
            let appointment = self.place(&request).await?;
            if appointment.is_none() {
                warn!("No slot found for request {}", request.request_id);
            }
            outcomes.push(BatchOutcome {
                request_id: request.request_id,
                priority_score: request.priority_score.unwrap_or_default(),
                appointment,
            });
        }

        Ok(outcomes)
    }

    async fn place(
        &self,
        request: &AppointmentRequest,
    ) -> Result<Option<Appointment>, AppointmentError> {
        for _ in 0..BATCH_PLACEMENT_ATTEMPTS {
            let Some(moment) = self
                .availability
                .next_available_slot(request.preferred_start, request.urgency)
                .await?
            else {
                return Ok(None);
            };

            let scheduled = self
                .ledger
                .schedule(
                    ScheduleAppointmentRequest {
                        patient_name: request.patient_name.clone(),
                        moment,
                        doctor: request.doctor.clone(),
                        reason: request.reason.clone(),
                        urgency: request.urgency,
                        email: request.email.clone(),
                    },
                    moment == request.preferred_start,
                )
                .await?;

            if scheduled.is_some() {
                return Ok(scheduled);
            }
            debug!("Slot {} was taken concurrently, searching again", moment);
        }

        Ok(None)
    }

    // ==============================================================================
    // CONVERSATIONAL BOOKING
    // ==============================================================================

    /// Advances one conversation by a resolved request.
    pub async fn handle(
        &self,
        session: &mut BookingSession,
        request: ResolvedRequest,
    ) -> Result<SessionReply, AppointmentError> {
        let request = request.validate(&self.config)?;

        if let Some(name) = request.patient_name.clone() {
            session.patient_name = Some(name);
        }
        if let Some(phone) = request.contact_phone.clone() {
            session.contact_phone = Some(phone);
        }

        match request.intent {
            Intent::Schedule => self.advance_booking(session, request).await,
            Intent::List => {
                let Some(day) = request.day.or(session.day) else {
                    return Ok(SessionReply::NeedDate);
                };
                let appointments = self.ledger.appointments_for_day(day).await?;
                Ok(SessionReply::Appointments { day, appointments })
            }
            Intent::Cancel => {
                let Some(appointment_id) = request.appointment_id else {
                    return Ok(SessionReply::NeedAppointmentId);
                };
                if self.ledger.cancel_appointment(appointment_id).await? {
                    Ok(SessionReply::Cancelled { appointment_id })
                } else {
                    Ok(SessionReply::AppointmentNotFound { appointment_id })
                }
            }
        }
    }

    async fn advance_booking(
        &self,
        session: &mut BookingSession,
        request: ResolvedRequest,
    ) -> Result<SessionReply, AppointmentError> {
        // Picking one of the alternatives offered for a taken slot.
        if let (Some(TimeRequest::At(time)), Some(day)) = (request.time, session.day) {
            let same_day = request.day.map_or(true, |d| d == day);
            if same_day && session.suggestions.contains(&time) {
                session.hold(day, time);
                return self.confirm_if_ready(session).await;
            }
        }

        if request.day.is_some() || request.time.is_some() {
            if request.day.is_some() {
                session.day = request.day;
            }
            if request.time.is_some() {
                session.time = request.time;
            }
            session.held = None;
            session.suggestions.clear();
        } else if session.held.is_some() {
            return self.confirm_if_ready(session).await;
        }

        let Some(day) = session.day else {
            return Ok(SessionReply::NeedDate);
        };
        let Some(time_request) = session.time else {
            return Ok(SessionReply::NeedTime { day });
        };

        match time_request {
            TimeRequest::At(time) => {
                let slots = self.slots.slots_for_day(day).await?;
                match slots.iter().find(|slot| slot.time == time) {
                    None => {
                        session.time = None;
                        return Ok(SessionReply::NoSlot { day, time });
                    }
                    Some(slot) if slot.is_available() => session.hold(day, time),
                    Some(_) => {
                        let nearby = self.slots.find_nearby_available(day, time).await?;
                        session.suggest(day, &nearby);
                        return Ok(SessionReply::Unavailable { day, time, nearby });
                    }
                }
            }
            TimeRequest::Range(part) => match self.slots.first_available_in(day, part).await? {
                Some(slot) => session.hold(day, slot.time),
                None => {
                    session.time = None;
                    return Ok(SessionReply::NoSlotInRange { day, part });
                }
            },
        }

        self.confirm_if_ready(session).await
    }

    async fn confirm_if_ready(&self, session: &mut BookingSession) -> Result<SessionReply, AppointmentError> {
        let Some((day, time)) = session.held else {
            return Ok(SessionReply::NeedDate);
        };
        let Some((name, phone)) = session
            .contact_details()
            .map(|(name, phone)| (name.to_string(), phone.to_string()))
        else {
            return Ok(SessionReply::NeedContactDetails { day, time });
        };

        match self.slots.book_slot(day, time, &name, &phone).await {
            Ok(booking_number) => {
                session.reset();
                Ok(SessionReply::Confirmed { booking_number, day, time })
            }
            Err(AppointmentError::SlotNotAvailable { day, time, nearby }) => {
                session.suggest(day, &nearby);
                Ok(SessionReply::Unavailable { day, time, nearby })
            }
            Err(e) => Err(e),
        }
    }
}

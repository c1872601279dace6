use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use shared_config::SchedulingConfig;

use crate::models::{
    slot_table_grid, AppointmentError, BookingNumber, DayPart, NearbySlots, Occupant, Slot, SlotTime,
};
use crate::services::store::{SchedulingStore, SlotBookingOutcome};

/// Per-day slot table: population, atomic booking and nearby suggestions.
pub struct SlotService {
    store: Arc<dyn SchedulingStore>,
    config: SchedulingConfig,
}

impl SlotService {
    pub fn new(store: Arc<dyn SchedulingStore>, config: SchedulingConfig) -> Self {
        Self { store, config }
    }

    pub fn grid(&self) -> Vec<SlotTime> {
        slot_table_grid(&self.config)
    }

    /// Creates the day's missing slots; existing rows keep their status.
    pub async fn populate_day(&self, day: NaiveDate) -> Result<usize, AppointmentError> {
        let created = self.store.populate_day(day, &self.grid()).await?;
        if created > 0 {
            info!("Created {} slots for {}", created, day);
        }
        Ok(created)
    }

    /// Books the slot for `name`. A taken slot fails with the open neighbours attached.
    #[instrument(skip(self, contact))]
    pub async fn book_slot(
        &self,
        day: NaiveDate,
        time: SlotTime,
        name: &str,
        contact: &str,
    ) -> Result<BookingNumber, AppointmentError> {
        let name = name.trim();
        let contact = contact.trim();
        if name.is_empty() || contact.is_empty() {
            return Err(AppointmentError::ValidationError(
                "name and contact are required to book a slot".to_string(),
            ));
        }
        if !time.is_on_grid(self.config.slot_duration_minutes) {
            return Err(AppointmentError::InvalidTime(format!(
                "{} is not on the {}-minute grid",
                time, self.config.slot_duration_minutes
            )));
        }

        let occupant = Occupant {
            name: name.to_string(),
            contact: contact.to_string(),
        };

        match self.store.book_slot(day, time, occupant).await? {
            SlotBookingOutcome::Booked(slot) => {
                let number = slot.booking_number.ok_or_else(|| {
                    AppointmentError::DatabaseError("booked slot has no booking number".to_string())
                })?;
                info!("Booked {} at {} as {}", day, time, number);
                Ok(number)
            }
            SlotBookingOutcome::AlreadyBooked => {
                let nearby = self.find_nearby_available(day, time).await?;
                warn!("Slot {} {} already booked, offering {:?}", day, time, nearby.times());
                Err(AppointmentError::SlotNotAvailable { day, time, nearby })
            }
            SlotBookingOutcome::Missing => Err(AppointmentError::SlotNotFound { day, time }),
        }
    }

    pub async fn slots_for_day(&self, day: NaiveDate) -> Result<Vec<Slot>, AppointmentError> {
        self.store.slots_for_day(day).await
    }

    pub async fn booked_slots(&self) -> Result<Vec<Slot>, AppointmentError> {
        self.store.booked_slots().await
    }

    /// Immediate neighbours of `time` on the day's table, kept only when available.
    pub async fn find_nearby_available(
        &self,
        day: NaiveDate,
        time: SlotTime,
    ) -> Result<NearbySlots, AppointmentError> {
        let slots = self.store.slots_for_day(day).await?;
        let index = slots
            .iter()
            .position(|slot| slot.time == time)
            .ok_or(AppointmentError::SlotNotFound { day, time })?;

        let open = |slot: Option<&Slot>| slot.filter(|s| s.is_available()).map(|s| s.time);
        let nearby = NearbySlots {
            predecessor: open(index.checked_sub(1).and_then(|i| slots.get(i))),
            successor: open(slots.get(index + 1)),
        };

        debug!("Nearby open slots around {} {}: {:?}", day, time, nearby);
        Ok(nearby)
    }

    /// Earliest available slot of the day inside `part`.
    pub async fn first_available_in(
        &self,
        day: NaiveDate,
        part: DayPart,
    ) -> Result<Option<Slot>, AppointmentError> {
        let slots = self.store.slots_for_day(day).await?;
        Ok(slots
            .into_iter()
            .find(|slot| slot.is_available() && part.contains(slot.time)))
    }
}

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use shared_database::JsonSnapshot;

use crate::models::{
    Appointment, AppointmentDraft, AppointmentError, AppointmentId, AppointmentStatus,
    BookingNumber, Occupant, Slot, SlotTime,
};
use crate::services::store::{AppointmentInsert, SchedulingStore, SlotBookingOutcome, StatusTransition};

/// On-disk layout of the store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    last_booking_number: u64,
    last_appointment_id: AppointmentId,
    slots: Vec<Slot>,
    appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    last_booking_number: u64,
    last_appointment_id: AppointmentId,
    slots: BTreeMap<(NaiveDate, SlotTime), Slot>,
    appointments: BTreeMap<AppointmentId, Appointment>,
}

impl From<StoreDocument> for Tables {
    fn from(doc: StoreDocument) -> Self {
        let last_booking_number = doc
            .slots
            .iter()
            .filter_map(|slot| slot.booking_number)
            .map(|number| number.0)
            .fold(doc.last_booking_number, u64::max);
        let last_appointment_id = doc
            .appointments
            .iter()
            .map(|a| a.id)
            .fold(doc.last_appointment_id, u64::max);

        Self {
            last_booking_number,
            last_appointment_id,
            slots: doc.slots.into_iter().map(|s| ((s.day, s.time), s)).collect(),
            appointments: doc.appointments.into_iter().map(|a| (a.id, a)).collect(),
        }
    }
}

impl Tables {
    fn to_document(&self) -> StoreDocument {
        StoreDocument {
            last_booking_number: self.last_booking_number,
            last_appointment_id: self.last_appointment_id,
            slots: self.slots.values().cloned().collect(),
            appointments: self.appointments.values().cloned().collect(),
        }
    }
}

/// Scheduling store held in memory behind one lock and snapshotted to a JSON file
/// after every mutation.
#[derive(Debug)]
pub struct FileStore {
    tables: Mutex<Tables>,
    snapshot: Option<JsonSnapshot>,
}

impl FileStore {
    /// A store that never touches the disk.
    pub fn in_memory() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            snapshot: None,
        }
    }

    /// Opens the store file, starting empty when it does not exist yet.
    /// An unreadable file is an error rather than a silent reset.
    pub async fn open(snapshot: JsonSnapshot) -> Result<Self, AppointmentError> {
        let document = snapshot
            .load::<StoreDocument>()
            .await
            .map_err(|e| {
                error!("Failed to open scheduling store {}: {:#}", snapshot.path().display(), e);
                AppointmentError::DatabaseError(format!("{:#}", e))
            })?
            .unwrap_or_default();

        let tables = Tables::from(document);
        info!(
            "Opened scheduling store {} ({} slots, {} appointments)",
            snapshot.path().display(),
            tables.slots.len(),
            tables.appointments.len()
        );

        Ok(Self {
            tables: Mutex::new(tables),
            snapshot: Some(snapshot),
        })
    }

    /// Applies `mutate` to a copy of the tables and only publishes it once it is durable.
    /// `mutate` returns whether it changed anything.
    async fn commit<R>(&self, mutate: impl FnOnce(&mut Tables) -> (R, bool)) -> Result<R, AppointmentError> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();

        let (result, changed) = mutate(&mut next);
        if !changed {
            return Ok(result);
        }

        if let Some(snapshot) = &self.snapshot {
            snapshot.save(&next.to_document()).await.map_err(|e| {
                error!("Failed to persist scheduling store: {:#}", e);
                AppointmentError::DatabaseError("failed to persist scheduling store".to_string())
            })?;
        }

        *tables = next;
        Ok(result)
    }
}

#[async_trait]
impl SchedulingStore for FileStore {
    async fn populate_day(&self, day: NaiveDate, times: &[SlotTime]) -> Result<usize, AppointmentError> {
        let created = self
            .commit(|tables| {
                let mut created = 0;
                for &time in times {
                    if !tables.slots.contains_key(&(day, time)) {
                        tables.slots.insert((day, time), Slot::available(day, time));
                        created += 1;
                    }
                }
                (created, created > 0)
            })
            .await?;

        debug!("Populated {} new slots on {}", created, day);
        Ok(created)
    }

    async fn book_slot(
        &self,
        day: NaiveDate,
        time: SlotTime,
        occupant: Occupant,
    ) -> Result<SlotBookingOutcome, AppointmentError> {
        self.commit(|tables| {
            let number = BookingNumber(tables.last_booking_number + 1);
            let Some(slot) = tables.slots.get_mut(&(day, time)) else {
                return (SlotBookingOutcome::Missing, false);
            };
            if !slot.book(number, occupant) {
                return (SlotBookingOutcome::AlreadyBooked, false);
            }

            let booked = slot.clone();
            tables.last_booking_number = number.0;
            (SlotBookingOutcome::Booked(booked), true)
        })
        .await
    }

    async fn slots_for_day(&self, day: NaiveDate) -> Result<Vec<Slot>, AppointmentError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .slots
            .range((day, SlotTime::from_hm(0, 0)?)..)
            .take_while(|((slot_day, _), _)| *slot_day == day)
            .map(|(_, slot)| slot.clone())
            .collect())
    }

    async fn booked_slots(&self) -> Result<Vec<Slot>, AppointmentError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .slots
            .values()
            .filter(|slot| slot.booking_number.is_some())
            .cloned()
            .collect())
    }

    async fn insert_appointment(&self, draft: AppointmentDraft) -> Result<AppointmentInsert, AppointmentError> {
        self.commit(|tables| {
            let (start, end) = (draft.moment, draft.end());
            let taken = tables
                .appointments
                .values()
                .any(|a| a.is_active() && a.overlaps(start, end));
            if taken {
                return (AppointmentInsert::Conflict, false);
            }

            let id = tables.last_appointment_id + 1;
            let appointment = draft.into_appointment(id);
            tables.last_appointment_id = id;
            tables.appointments.insert(id, appointment.clone());
            (AppointmentInsert::Inserted(appointment), true)
        })
        .await
    }

    async fn appointment(&self, id: AppointmentId) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.tables.lock().await.appointments.get(&id).cloned())
    }

    async fn transition_appointment(
        &self,
        id: AppointmentId,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<StatusTransition, AppointmentError> {
        self.commit(|tables| match tables.appointments.get_mut(&id) {
            None => (StatusTransition::NotFound, false),
            Some(appointment) if appointment.status == from => {
                appointment.status = to;
                (StatusTransition::Applied(appointment.clone()), true)
            }
            Some(appointment) => (StatusTransition::Unchanged(appointment.clone()), false),
        })
        .await
    }

    async fn appointments_starting_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let tables = self.tables.lock().await;
        let mut found: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| from <= a.moment && a.moment < to)
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.moment, a.id));
        Ok(found)
    }
}

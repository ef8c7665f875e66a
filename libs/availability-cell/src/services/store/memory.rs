use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::SchedulingError;
use crate::models::{
    sort_appointments, Appointment, AppointmentFilter, AppointmentParty, AvailabilityDate,
    CasOutcome, ClinicWindows, Slot, SlotChange, SlotKey, SlotStatus,
};

use super::AvailabilityRepository;

type DateKey = (Uuid, NaiveDate);

/// One declared date. Slot cells are locked individually so transitions on
/// different slots of the same date never wait on each other.
struct DateEntry {
    id: Uuid,
    doctor_id: Uuid,
    date: NaiveDate,
    slot_duration_minutes: i64,
    windows: ClinicWindows,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    slots: Vec<Mutex<Slot>>,
    index: HashMap<String, usize>,
}

impl DateEntry {
    fn new(availability: AvailabilityDate) -> Self {
        let index = availability
            .slots
            .iter()
            .enumerate()
            .map(|(position, slot)| (slot.slot_id.clone(), position))
            .collect();

        Self {
            id: availability.id,
            doctor_id: availability.doctor_id,
            date: availability.date,
            slot_duration_minutes: availability.slot_duration_minutes,
            windows: availability.windows,
            created_at: availability.created_at,
            updated_at: availability.updated_at,
            slots: availability.slots.into_iter().map(Mutex::new).collect(),
            index,
        }
    }

    fn slot(&self, slot_id: &str) -> Option<&Mutex<Slot>> {
        self.index.get(slot_id).map(|&position| &self.slots[position])
    }

    async fn slots(&self) -> Vec<Slot> {
        let mut slots = Vec::with_capacity(self.slots.len());
        for cell in &self.slots {
            slots.push(cell.lock().await.clone());
        }
        slots
    }

    async fn snapshot(&self) -> AvailabilityDate {
        AvailabilityDate {
            id: self.id,
            doctor_id: self.doctor_id,
            date: self.date,
            slot_duration_minutes: self.slot_duration_minutes,
            windows: self.windows.clone(),
            slots: self.slots().await,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Appointments still bound to slots, drained when the entry is discarded.
    async fn appointments(&self) -> Vec<Appointment> {
        let mut appointments = Vec::new();
        for cell in &self.slots {
            if let Some(appointment) = cell.lock().await.appointment.clone() {
                appointments.push(appointment);
            }
        }
        appointments
    }

    async fn active_slot_ids(&self) -> Vec<String> {
        let mut active = Vec::new();
        for cell in &self.slots {
            let slot = cell.lock().await;
            if slot.status.is_active() {
                active.push(slot.slot_id.clone());
            }
        }
        active
    }
}

/// Single-process repository.
///
/// Slot transitions hold the map's read lock plus the slot's mutex. Replacing or
/// removing a date takes the write lock, which waits out every in-flight
/// transition, so the active-booking check cannot race a booking.
///
/// Cancelled appointments of a replaced or withdrawn date move to `retired`
/// and stay queryable, matching the appointments table in Supabase.
#[derive(Default)]
pub struct InMemoryAvailabilityRepository {
    dates: RwLock<BTreeMap<DateKey, Arc<DateEntry>>>,
    retired: Mutex<Vec<Appointment>>,
}

impl InMemoryAvailabilityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn doctor_range(doctor_id: Uuid) -> std::ops::RangeInclusive<DateKey> {
        (doctor_id, NaiveDate::MIN)..=(doctor_id, NaiveDate::MAX)
    }

    async fn retire(&self, entry: &DateEntry) {
        let appointments = entry.appointments().await;
        if !appointments.is_empty() {
            debug!(
                "Retiring {} cancelled appointments for doctor {} on {}",
                appointments.len(),
                entry.doctor_id,
                entry.date
            );
            self.retired.lock().await.extend(appointments);
        }
    }

    fn conflict(doctor_id: Uuid, date: NaiveDate, active_slots: Vec<String>) -> SchedulingError {
        warn!(
            "Refusing to replace availability for doctor {} on {}: {} active slots",
            doctor_id,
            date,
            active_slots.len()
        );
        SchedulingError::ConflictingAvailability {
            doctor_id,
            date,
            active_slots,
        }
    }
}

#[async_trait]
impl AvailabilityRepository for InMemoryAvailabilityRepository {
    async fn find_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<AvailabilityDate>, SchedulingError> {
        let dates = self.dates.read().await;
        match dates.get(&(doctor_id, date)) {
            Some(entry) => Ok(Some(entry.snapshot().await)),
            None => Ok(None),
        }
    }

    async fn list_dates(&self, doctor_id: Uuid) -> Result<Vec<AvailabilityDate>, SchedulingError> {
        let dates = self.dates.read().await;
        let mut result = Vec::new();
        for entry in dates.range(Self::doctor_range(doctor_id)).map(|(_, entry)| entry) {
            result.push(entry.snapshot().await);
        }
        Ok(result)
    }

    async fn replace_date(&self, availability: AvailabilityDate) -> Result<AvailabilityDate, SchedulingError> {
        let key = (availability.doctor_id, availability.date);
        let mut dates = self.dates.write().await;

        if let Some(existing) = dates.get(&key) {
            let active = existing.active_slot_ids().await;
            if !active.is_empty() {
                return Err(Self::conflict(key.0, key.1, active));
            }
            debug!("Replacing availability for doctor {} on {}", key.0, key.1);
            self.retire(existing).await;
        }

        dates.insert(key, Arc::new(DateEntry::new(availability.clone())));
        Ok(availability)
    }

    async fn remove_date(&self, doctor_id: Uuid, date: NaiveDate) -> Result<bool, SchedulingError> {
        let key = (doctor_id, date);
        let mut dates = self.dates.write().await;

        let Some(existing) = dates.get(&key) else {
            return Ok(false);
        };

        let active = existing.active_slot_ids().await;
        if !active.is_empty() {
            return Err(Self::conflict(doctor_id, date, active));
        }

        self.retire(existing).await;
        dates.remove(&key);
        Ok(true)
    }

    async fn compare_and_set(
        &self,
        key: &SlotKey,
        expected: SlotStatus,
        change: SlotChange,
    ) -> Result<CasOutcome, SchedulingError> {
        let dates = self.dates.read().await;

        let Some(cell) = dates
            .get(&(key.doctor_id, key.date))
            .and_then(|entry| entry.slot(&key.slot_id))
        else {
            return Ok(CasOutcome::Missing);
        };

        let mut slot = cell.lock().await;
        if slot.status != expected {
            return Ok(CasOutcome::Rejected(slot.clone()));
        }

        slot.apply(&change);
        Ok(CasOutcome::Applied(slot.clone()))
    }

    async fn find_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError> {
        if filter.from > filter.to {
            return Ok(Vec::new());
        }

        let dates = self.dates.read().await;

        let entries: Vec<Arc<DateEntry>> = match filter.party {
            AppointmentParty::Doctor(doctor_id) => dates
                .range((doctor_id, filter.from)..=(doctor_id, filter.to))
                .map(|(_, entry)| Arc::clone(entry))
                .collect(),
            AppointmentParty::Patient(_) => dates
                .values()
                .filter(|entry| entry.date >= filter.from && entry.date <= filter.to)
                .cloned()
                .collect(),
        };

        let mut appointments = Vec::new();
        for entry in &entries {
            for cell in &entry.slots {
                let slot = cell.lock().await;
                if let Some(appointment) = slot.appointment.as_ref().filter(|a| filter.matches(a)) {
                    appointments.push(appointment.clone());
                }
            }
        }

        let retired = self.retired.lock().await;
        appointments.extend(
            retired
                .iter()
                .filter(|a| filter.matches(a))
                .cloned(),
        );

        sort_appointments(&mut appointments);
        Ok(appointments)
    }
}

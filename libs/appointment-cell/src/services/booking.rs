use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use availability_cell::models::{Appointment, CasOutcome, Slot, SlotChange, SlotKey, SlotStatus};
use availability_cell::services::AvailabilityRepository;
use availability_cell::{SchedulingError, SchedulingState};

use crate::models::{CancelAllOutcome, CancelSlotOutcome};
use crate::services::lifecycle::SlotLifecycle;

/// Drives slot transitions through the repository's compare-and-set.
///
/// Every write names the status it expects to replace. A write that loses a
/// race gets the winning slot back and decides again from there; since each
/// transition moves a slot strictly forward this converges.
pub struct BookingCoordinator {
    repository: Arc<dyn AvailabilityRepository>,
    lifecycle: SlotLifecycle,
}

impl BookingCoordinator {
    pub fn new(state: &SchedulingState) -> Self {
        Self::with_repository(Arc::clone(&state.repository))
    }

    pub fn with_repository(repository: Arc<dyn AvailabilityRepository>) -> Self {
        Self {
            repository,
            lifecycle: SlotLifecycle::new(),
        }
    }

    async fn current_slot(&self, key: &SlotKey) -> Result<Slot, SchedulingError> {
        self.repository
            .find_date(key.doctor_id, key.date)
            .await?
            .and_then(|availability| availability.slot(&key.slot_id).cloned())
            .ok_or_else(|| SchedulingError::SlotNotFound(key.clone()))
    }

    /// Bind a new appointment to an open slot.
    #[instrument(skip(self))]
    pub async fn book(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot_id: &str,
        patient_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        let key = SlotKey::new(doctor_id, date, slot_id);
        let slot = self.current_slot(&key).await?;

        if slot.status != SlotStatus::Open {
            return Err(not_available(slot));
        }

        let appointment = Appointment::book(patient_id, &key, slot.start_time, Utc::now());
        match self
            .repository
            .compare_and_set(&key, SlotStatus::Open, SlotChange::bind(appointment))
            .await?
        {
            CasOutcome::Applied(slot) => {
                let appointment = slot.appointment.ok_or_else(|| {
                    SchedulingError::Persistence(format!("slot {} was booked without an appointment", key))
                })?;
                info!(
                    "Appointment {} booked for patient {} in slot {}",
                    appointment.id, patient_id, key
                );
                Ok(appointment)
            }
            CasOutcome::Rejected(slot) => {
                debug!("Lost booking race for slot {}", key);
                Err(not_available(slot))
            }
            CasOutcome::Missing => Err(SchedulingError::SlotNotFound(key)),
        }
    }

    #[instrument(skip(self))]
    pub async fn cancel_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot_id: &str,
    ) -> Result<CancelSlotOutcome, SchedulingError> {
        let key = SlotKey::new(doctor_id, date, slot_id);
        let slot = self.current_slot(&key).await?;
        self.cancel_from(&key, slot).await
    }

    /// Cancel starting from a known snapshot of the slot.
    async fn cancel_from(&self, key: &SlotKey, mut current: Slot) -> Result<CancelSlotOutcome, SchedulingError> {
        loop {
            if current.status == SlotStatus::Cancelled {
                debug!("Slot {} already cancelled", key);
                return Ok(CancelSlotOutcome {
                    slot: current,
                    changed: false,
                });
            }
            self.lifecycle.validate_transition(current.status, SlotStatus::Cancelled)?;

            let change = SlotChange::to(SlotStatus::Cancelled, Utc::now());
            match self.repository.compare_and_set(key, current.status, change).await? {
                CasOutcome::Applied(slot) => {
                    info!("Slot {} cancelled (was {})", key, current.status);
                    return Ok(CancelSlotOutcome { slot, changed: true });
                }
                CasOutcome::Rejected(slot) => {
                    debug!(
                        "Slot {} moved from {} to {} during cancel, re-evaluating",
                        key, current.status, slot.status
                    );
                    current = slot;
                }
                CasOutcome::Missing => return Err(SchedulingError::SlotNotFound(key.clone())),
            }
        }
    }

    /// Cancel every slot of a date that can still be cancelled. Slots that
    /// cannot are reported back instead of failing the whole call.
    #[instrument(skip(self))]
    pub async fn cancel_all_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<CancelAllOutcome, SchedulingError> {
        let Some(availability) = self.repository.find_date(doctor_id, date).await? else {
            debug!("No availability for doctor {} on {}, nothing to cancel", doctor_id, date);
            return Ok(CancelAllOutcome::default());
        };

        let results = join_all(availability.slots.into_iter().map(|slot| async move {
            let key = SlotKey::new(doctor_id, date, slot.slot_id.clone());
            let result = self.cancel_from(&key, slot).await;
            (key.slot_id, result)
        }))
        .await;

        let mut outcome = CancelAllOutcome::default();
        for (slot_id, result) in results {
            match result {
                Ok(_) => outcome.record_cancelled(slot_id),
                Err(e) => {
                    warn!("Skipping slot {} while cancelling {}: {}", slot_id, date, e);
                    outcome.record_skipped(slot_id, e);
                }
            }
        }

        info!(
            "Cancelled {} slots for doctor {} on {} ({} skipped)",
            outcome.cancelled,
            doctor_id,
            date,
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    /// Mark a booked slot as attended. Only allowed once the slot has ended.
    #[instrument(skip(self))]
    pub async fn complete_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Slot, SchedulingError> {
        let key = SlotKey::new(doctor_id, date, slot_id);
        let mut current = self.current_slot(&key).await?;

        loop {
            self.lifecycle.validate_transition(current.status, SlotStatus::Completed)?;
            if now < current.end_time {
                return Err(SchedulingError::SlotNotElapsed {
                    slot_id: key.slot_id.clone(),
                    ends_at: current.end_time,
                });
            }

            let change = SlotChange::to(SlotStatus::Completed, now);
            match self.repository.compare_and_set(&key, SlotStatus::Booked, change).await? {
                CasOutcome::Applied(slot) => {
                    info!("Slot {} completed", key);
                    return Ok(slot);
                }
                CasOutcome::Rejected(slot) => current = slot,
                CasOutcome::Missing => return Err(SchedulingError::SlotNotFound(key)),
            }
        }
    }
}

fn not_available(slot: Slot) -> SchedulingError {
    SchedulingError::SlotNotAvailable {
        slot_id: slot.slot_id,
        status: slot.status,
    }
}

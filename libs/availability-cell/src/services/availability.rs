use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::SchedulingError;
use crate::models::{AvailabilityDate, ClinicWindows, Slot};
use crate::services::directory::DoctorDirectory;
use crate::services::slot_generator::SlotGenerator;
use crate::services::store::AvailabilityRepository;
use crate::state::SchedulingState;

/// The availability aggregate: one set of generated slots per (doctor, date).
pub struct AvailabilityService {
    repository: Arc<dyn AvailabilityRepository>,
    doctors: Arc<dyn DoctorDirectory>,
    generator: SlotGenerator,
    default_slot_duration_minutes: i64,
}

impl AvailabilityService {
    pub fn new(state: &SchedulingState) -> Self {
        Self {
            repository: Arc::clone(&state.repository),
            doctors: Arc::clone(&state.doctors),
            generator: SlotGenerator::from_config(&state.config),
            default_slot_duration_minutes: state.config.default_slot_duration_minutes,
        }
    }

    pub fn with_parts(
        repository: Arc<dyn AvailabilityRepository>,
        doctors: Arc<dyn DoctorDirectory>,
        generator: SlotGenerator,
        default_slot_duration_minutes: i64,
    ) -> Self {
        Self {
            repository,
            doctors,
            generator,
            default_slot_duration_minutes,
        }
    }

    /// Create or replace the slots a doctor offers on `date`.
    #[instrument(skip(self, windows))]
    pub async fn mark_available(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        windows: &ClinicWindows,
        slot_duration_minutes: i64,
    ) -> Result<AvailabilityDate, SchedulingError> {
        let slots = self.generator.generate(date, windows, slot_duration_minutes)?;
        if slots.is_empty() {
            return Err(SchedulingError::InvalidDuration(format!(
                "no {}-minute slot fits in the declared windows",
                slot_duration_minutes
            )));
        }

        let now = Utc::now();
        let availability = AvailabilityDate {
            id: Uuid::new_v4(),
            doctor_id,
            date,
            slot_duration_minutes,
            windows: windows.clone(),
            slots,
            created_at: now,
            updated_at: now,
        };

        let stored = self.repository.replace_date(availability).await?;
        info!(
            "Doctor {} available on {} with {} slots",
            doctor_id,
            date,
            stored.slots.len()
        );
        Ok(stored)
    }

    /// Mark `date` available using the doctor's published working hours.
    /// `slot_duration_minutes` overrides the directory's duration when given.
    pub async fn mark_available_from_directory(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot_duration_minutes: Option<i64>,
    ) -> Result<AvailabilityDate, SchedulingError> {
        let hours = self
            .doctors
            .working_hours(doctor_id)
            .await
            .map_err(|e| SchedulingError::Directory(e.to_string()))?
            .ok_or(SchedulingError::DoctorNotFound(doctor_id))?;

        let windows = hours.windows()?;
        let duration = slot_duration_minutes
            .or(hours.slot_duration_minutes)
            .unwrap_or(self.default_slot_duration_minutes);

        debug!("Using directory hours for doctor {}: {:?}", doctor_id, hours);
        self.mark_available(doctor_id, date, &windows, duration).await
    }

    pub async fn get_available_dates(&self, doctor_id: Uuid) -> Result<Vec<AvailabilityDate>, SchedulingError> {
        self.repository.list_dates(doctor_id).await
    }

    /// Ordered slots for one date; empty when nothing was declared.
    pub async fn get_slots(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Slot>, SchedulingError> {
        Ok(self
            .repository
            .find_date(doctor_id, date)
            .await?
            .map(|availability| availability.slots)
            .unwrap_or_default())
    }

    /// Drop a declared date. Dates with booked or completed slots must be
    /// cancelled first.
    pub async fn withdraw_availability(&self, doctor_id: Uuid, date: NaiveDate) -> Result<bool, SchedulingError> {
        let removed = self.repository.remove_date(doctor_id, date).await?;
        if removed {
            info!("Doctor {} withdrew availability for {}", doctor_id, date);
        } else {
            debug!("No availability declared for doctor {} on {}", doctor_id, date);
        }
        Ok(removed)
    }
}

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::{debug, warn};
use uuid::Uuid;

use availability_cell::models::{
    Appointment, AppointmentFilter, AppointmentParty, AppointmentStatus, Slot,
};
use availability_cell::services::AvailabilityRepository;
use availability_cell::SchedulingError;

use crate::models::{DateRange, SlotView};
use crate::services::patients::PatientDirectory;
use crate::state::AppointmentState;

/// How far ahead "upcoming" looks.
pub const UPCOMING_HORIZON_DAYS: u64 = 365;

/// Appointments that count toward a schedule. Cancelled ones are left out.
const SCHEDULED: [AppointmentStatus; 2] = [AppointmentStatus::Booked, AppointmentStatus::Completed];

pub struct AppointmentQueryService {
    repository: Arc<dyn AvailabilityRepository>,
    patients: Arc<dyn PatientDirectory>,
}

impl AppointmentQueryService {
    pub fn new(state: &AppointmentState) -> Self {
        Self::with_parts(Arc::clone(&state.scheduling.repository), Arc::clone(&state.patients))
    }

    pub fn with_parts(repository: Arc<dyn AvailabilityRepository>, patients: Arc<dyn PatientDirectory>) -> Self {
        Self { repository, patients }
    }

    async fn scheduled(&self, party: AppointmentParty, range: DateRange) -> Result<Vec<Appointment>, SchedulingError> {
        let filter = AppointmentFilter {
            party,
            from: range.from,
            to: range.to,
            statuses: SCHEDULED.to_vec(),
        };
        let appointments = self.repository.find_appointments(&filter).await?;
        debug!("{} appointments for {:?} in {:?}", appointments.len(), party, range);
        Ok(appointments)
    }

    pub async fn appointments_for_doctor(
        &self,
        doctor_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.scheduled(AppointmentParty::Doctor(doctor_id), range).await
    }

    pub async fn appointments_for_patient(
        &self,
        patient_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.scheduled(AppointmentParty::Patient(patient_id), range).await
    }

    pub async fn upcoming_for_patient(
        &self,
        patient_id: Uuid,
        from: NaiveDate,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let to = from
            .checked_add_days(Days::new(UPCOMING_HORIZON_DAYS))
            .unwrap_or(NaiveDate::MAX);
        self.appointments_for_patient(patient_id, DateRange::new(from, to)?).await
    }

    pub async fn slots_on_date(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Slot>, SchedulingError> {
        Ok(self
            .repository
            .find_date(doctor_id, date)
            .await?
            .map(|availability| availability.slots)
            .unwrap_or_default())
    }

    /// Slots of a date with the booked patient attached. A failing patient
    /// lookup only drops the patient details.
    pub async fn slots_on_date_with_patients(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<SlotView>, SchedulingError> {
        let slots = self.slots_on_date(doctor_id, date).await?;

        let patient_ids: Vec<Uuid> = slots
            .iter()
            .filter(|slot| slot.status.is_active())
            .filter_map(|slot| slot.appointment.as_ref().map(|a| a.patient_id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let patients = match self.patients.find_patients(&patient_ids).await {
            Ok(patients) => patients,
            Err(e) => {
                warn!(
                    "Patient lookup failed for doctor {} on {}, returning slots without patients: {}",
                    doctor_id, date, e
                );
                Default::default()
            }
        };

        Ok(slots
            .into_iter()
            .map(|slot| {
                let patient = slot
                    .appointment
                    .as_ref()
                    .filter(|_| slot.status.is_active())
                    .and_then(|appointment| patients.get(&appointment.patient_id).cloned());
                SlotView { slot, patient }
            })
            .collect())
    }
}

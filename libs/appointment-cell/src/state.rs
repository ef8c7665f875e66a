use std::sync::Arc;

use shared_config::StorageBackend;

use availability_cell::SchedulingState;

use crate::services::patients::{PatientDirectory, StaticPatientDirectory, SupabasePatientDirectory};

/// Scheduling handles plus the patient directory used on day sheets.
#[derive(Clone)]
pub struct AppointmentState {
    pub scheduling: Arc<SchedulingState>,
    pub patients: Arc<dyn PatientDirectory>,
}

impl AppointmentState {
    pub fn new(scheduling: Arc<SchedulingState>, patients: Arc<dyn PatientDirectory>) -> Self {
        Self { scheduling, patients }
    }

    /// Share the scheduling state, reading patients from the same backend.
    pub fn from_scheduling(scheduling: Arc<SchedulingState>) -> Self {
        let patients: Arc<dyn PatientDirectory> = match scheduling.config.storage_backend {
            StorageBackend::Supabase => Arc::new(SupabasePatientDirectory::new(&scheduling.config)),
            StorageBackend::Memory => Arc::new(StaticPatientDirectory::new()),
        };
        Self::new(scheduling, patients)
    }
}

use std::sync::Arc;

use tracing::info;

use shared_config::{AppConfig, StorageBackend};

use crate::services::directory::{DoctorDirectory, StaticDoctorDirectory, SupabaseDoctorDirectory};
use crate::services::store::{
    AvailabilityRepository, InMemoryAvailabilityRepository, SupabaseAvailabilityRepository,
};

/// Shared handles behind every scheduling route.
#[derive(Clone)]
pub struct SchedulingState {
    pub config: Arc<AppConfig>,
    pub repository: Arc<dyn AvailabilityRepository>,
    pub doctors: Arc<dyn DoctorDirectory>,
}

impl SchedulingState {
    pub fn new(
        config: AppConfig,
        repository: Arc<dyn AvailabilityRepository>,
        doctors: Arc<dyn DoctorDirectory>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            repository,
            doctors,
        }
    }

    /// Pick the repository and doctor directory named by `SCHEDULING_STORE`.
    pub fn from_config(config: AppConfig) -> Self {
        match config.storage_backend {
            StorageBackend::Memory => Self::in_memory(config),
            StorageBackend::Supabase => {
                info!("Scheduling state persisted in Supabase at {}", config.supabase_url);
                let repository = Arc::new(SupabaseAvailabilityRepository::new(&config));
                let doctors = Arc::new(SupabaseDoctorDirectory::new(&config));
                Self::new(config, repository, doctors)
            }
        }
    }

    pub fn in_memory(config: AppConfig) -> Self {
        info!("Scheduling state held in process memory");
        let doctors = Arc::new(StaticDoctorDirectory::from_config(&config));
        Self::new(config, Arc::new(InMemoryAvailabilityRepository::new()), doctors)
    }
}

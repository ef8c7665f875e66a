use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::WorkingHours;

/// Source of each doctor's clinic hours. Only consulted when a date is marked
/// available without explicit windows.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    /// `Ok(None)` when the doctor is unknown.
    async fn working_hours(&self, doctor_id: Uuid) -> Result<Option<WorkingHours>>;
}

pub struct SupabaseDoctorDirectory {
    supabase: SupabaseClient,
}

impl SupabaseDoctorDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDoctorDirectory {
    async fn working_hours(&self, doctor_id: Uuid) -> Result<Option<WorkingHours>> {
        debug!("Fetching working hours for doctor: {}", doctor_id);

        let path = format!(
            "/rest/v1/doctors?id=eq.{}&select=morning_start_time,morning_end_time,evening_start_time,evening_end_time,slot_duration_minutes",
            doctor_id
        );
        let rows: Vec<WorkingHours> = self
            .supabase
            .request(Method::GET, &path, Some(self.supabase.service_token()), None)
            .await?;

        Ok(rows.into_iter().next())
    }
}

/// Directory held in process: explicit per-doctor hours, falling back to the
/// clinic-wide defaults from configuration for any other doctor.
#[derive(Debug, Clone, Default)]
pub struct StaticDoctorDirectory {
    hours: HashMap<Uuid, WorkingHours>,
    fallback: Option<WorkingHours>,
}

impl StaticDoctorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let fallback = config.has_default_clinic_hours().then(|| WorkingHours {
            morning_start_time: config.clinic_morning_start,
            morning_end_time: config.clinic_morning_end,
            evening_start_time: config.clinic_evening_start,
            evening_end_time: config.clinic_evening_end,
            slot_duration_minutes: Some(config.default_slot_duration_minutes),
        });

        Self {
            hours: HashMap::new(),
            fallback,
        }
    }

    pub fn with_doctor(mut self, doctor_id: Uuid, hours: WorkingHours) -> Self {
        self.hours.insert(doctor_id, hours);
        self
    }
}

#[async_trait]
impl DoctorDirectory for StaticDoctorDirectory {
    async fn working_hours(&self, doctor_id: Uuid) -> Result<Option<WorkingHours>> {
        Ok(self
            .hours
            .get(&doctor_id)
            .cloned()
            .or_else(|| self.fallback.clone()))
    }
}

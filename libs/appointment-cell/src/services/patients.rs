use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::PatientSummary;

/// Display data for patients holding appointments. Lookups are best effort;
/// unknown ids are simply absent from the result.
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn find_patients(&self, patient_ids: &[Uuid]) -> Result<HashMap<Uuid, PatientSummary>>;
}

pub struct SupabasePatientDirectory {
    supabase: SupabaseClient,
}

impl SupabasePatientDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl PatientDirectory for SupabasePatientDirectory {
    async fn find_patients(&self, patient_ids: &[Uuid]) -> Result<HashMap<Uuid, PatientSummary>> {
        if patient_ids.is_empty() {
            return Ok(HashMap::new());
        }

        debug!("Fetching {} patient summaries", patient_ids.len());

        let ids = patient_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let path = format!(
            "/rest/v1/patients?id=in.({})&select=id,first_name,last_name,email,phone_number",
            ids
        );

        let rows: Vec<PatientSummary> = self
            .supabase
            .request(Method::GET, &path, Some(self.supabase.service_token()), None)
            .await?;

        Ok(rows.into_iter().map(|patient| (patient.id, patient)).collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticPatientDirectory {
    patients: HashMap<Uuid, PatientSummary>,
}

impl StaticPatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patient(mut self, patient: PatientSummary) -> Self {
        self.patients.insert(patient.id, patient);
        self
    }
}

#[async_trait]
impl PatientDirectory for StaticPatientDirectory {
    async fn find_patients(&self, patient_ids: &[Uuid]) -> Result<HashMap<Uuid, PatientSummary>> {
        Ok(patient_ids
            .iter()
            .filter_map(|id| self.patients.get(id).map(|patient| (*id, patient.clone())))
            .collect())
    }
}

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::{AppConfig, StorageBackend};

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub storage_backend: StorageBackend,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            storage_backend: StorageBackend::Memory,
        }
    }
}

impl TestConfig {
    /// Config pointed at a wiremock server standing in for Supabase.
    pub fn supabase(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            storage_backend: StorageBackend::Supabase,
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            storage_backend: self.storage_backend,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// Calendar shortcuts shared by the scheduling test suites.
pub struct TestCalendar;

impl TestCalendar {
    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    pub fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid test time")
    }

    /// 2024-06-10, the reference booking day.
    pub fn reference_day() -> NaiveDate {
        Self::date(2024, 6, 10)
    }
}

/// PostgREST payloads shaped like the scheduling tables and RPC replies.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn availability_date_row(doctor_id: &Uuid, date: &str, duration: i64) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "date": date,
            "slot_duration_minutes": duration,
            "morning_start_time": "09:00:00",
            "morning_end_time": "11:00:00",
            "evening_start_time": null,
            "evening_end_time": null,
            "created_at": "2024-06-01T08:00:00Z",
            "updated_at": "2024-06-01T08:00:00Z"
        })
    }

    pub fn slot_row(date: &str, hh_mm: &str, duration: i64, status: &str, appointment: Option<Value>) -> Value {
        let start = format!("{}T{}:00Z", date, hh_mm);
        let end = chrono::DateTime::parse_from_rfc3339(&start)
            .map(|start| start + chrono::Duration::minutes(duration))
            .map(|end| end.to_rfc3339())
            .unwrap_or_else(|_| start.clone());

        json!({
            "slot_id": format!("{}T{}", date, hh_mm),
            "date": date,
            "start_time": start,
            "end_time": end,
            "status": status,
            "appointment": appointment
        })
    }

    pub fn appointment_row(doctor_id: &Uuid, patient_id: &Uuid, date: &str, hh_mm: &str, status: &str) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "date": date,
            "slot_id": format!("{}T{}", date, hh_mm),
            "start_time": format!("{}T{}:00Z", date, hh_mm),
            "status": status,
            "created_at": "2024-06-01T08:00:00Z",
            "updated_at": "2024-06-01T08:00:00Z"
        })
    }

    pub fn transition_reply(outcome: &str, slot: Option<Value>) -> Value {
        json!({
            "outcome": outcome,
            "slot": slot
        })
    }

    pub fn date_write_reply(applied: bool, active_slots: &[&str]) -> Value {
        json!({
            "applied": applied,
            "active_slots": active_slots
        })
    }

    pub fn patient_row(patient_id: &Uuid, first_name: &str, last_name: &str) -> Value {
        json!({
            "id": patient_id,
            "first_name": first_name,
            "last_name": last_name,
            "email": format!("{}.{}@example.com", first_name.to_lowercase(), last_name.to_lowercase()),
            "phone_number": "+353 1 555 0100"
        })
    }
}

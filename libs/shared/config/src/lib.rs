use std::env;
use std::str::FromStr;

use chrono::{FixedOffset, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Where the scheduling engine keeps its availability dates and slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "memory" | "in_memory" => Ok(StorageBackend::Memory),
            "supabase" | "postgrest" => Ok(StorageBackend::Supabase),
            other => Err(format!("Unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub storage_backend: StorageBackend,
    pub clinic_utc_offset_minutes: i32,
    pub clinic_morning_start: Option<NaiveTime>,
    pub clinic_morning_end: Option<NaiveTime>,
    pub clinic_evening_start: Option<NaiveTime>,
    pub clinic_evening_end: Option<NaiveTime>,
    pub default_slot_duration_minutes: i64,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            storage_backend: StorageBackend::Memory,
            clinic_utc_offset_minutes: 0,
            clinic_morning_start: None,
            clinic_morning_end: None,
            clinic_evening_start: None,
            clinic_evening_end: None,
            default_slot_duration_minutes: 30,
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            storage_backend: parse_var("SCHEDULING_STORE", defaults.storage_backend),
            clinic_utc_offset_minutes: parse_var(
                "CLINIC_UTC_OFFSET_MINUTES",
                defaults.clinic_utc_offset_minutes,
            ),
            clinic_morning_start: time_var("CLINIC_MORNING_START"),
            clinic_morning_end: time_var("CLINIC_MORNING_END"),
            clinic_evening_start: time_var("CLINIC_EVENING_START"),
            clinic_evening_end: time_var("CLINIC_EVENING_END"),
            default_slot_duration_minutes: parse_var(
                "DEFAULT_SLOT_DURATION_MINUTES",
                defaults.default_slot_duration_minutes,
            ),
            port: parse_var("PORT", defaults.port),
        };

        if config.storage_backend == StorageBackend::Supabase && !config.is_configured() {
            warn!("Supabase storage selected but not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_service_role_key.is_empty()
    }

    /// The clinic's zone as a fixed offset. Out-of-range values fall back to UTC.
    pub fn clinic_offset(&self) -> FixedOffset {
        let seconds = self.clinic_utc_offset_minutes.checked_mul(60);
        match seconds.and_then(FixedOffset::east_opt) {
            Some(offset) => offset,
            None => {
                warn!(
                    "Clinic UTC offset of {} minutes is out of range, using UTC",
                    self.clinic_utc_offset_minutes
                );
                Utc.fix()
            }
        }
    }

    /// True when at least one clinic-wide default window is declared.
    pub fn has_default_clinic_hours(&self) -> bool {
        (self.clinic_morning_start.is_some() && self.clinic_morning_end.is_some())
            || (self.clinic_evening_start.is_some() && self.clinic_evening_end.is_some())
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {:?}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

fn time_var(name: &str) -> Option<NaiveTime> {
    let raw = env::var(name).ok()?;
    NaiveTime::parse_from_str(&raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
        .map_err(|_| warn!("{} is not a valid HH:MM time: '{}'", name, raw))
        .ok()
}

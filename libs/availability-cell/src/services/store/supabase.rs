use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, PAGE_SIZE};

use crate::error::SchedulingError;
use crate::models::{
    Appointment, AppointmentFilter, AppointmentParty, AvailabilityDate, CasOutcome, ClinicWindows,
    Slot, SlotChange, SlotKey, SlotStatus,
};

use super::AvailabilityRepository;

const SLOT_SELECT: &str = "select=slot_id,date,start_time,end_time,status,appointment:appointments(*)";

#[derive(Debug, Deserialize)]
struct AvailabilityDateRow {
    id: Uuid,
    doctor_id: Uuid,
    date: NaiveDate,
    slot_duration_minutes: i64,
    morning_start_time: Option<NaiveTime>,
    morning_end_time: Option<NaiveTime>,
    evening_start_time: Option<NaiveTime>,
    evening_end_time: Option<NaiveTime>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AvailabilityDateRow {
    fn into_date(self, slots: Vec<Slot>) -> Result<AvailabilityDate, SchedulingError> {
        let windows = ClinicWindows::from_bounds(
            self.morning_start_time,
            self.morning_end_time,
            self.evening_start_time,
            self.evening_end_time,
        )
        .map_err(SchedulingError::persistence)?;

        Ok(AvailabilityDate {
            id: self.id,
            doctor_id: self.doctor_id,
            date: self.date,
            slot_duration_minutes: self.slot_duration_minutes,
            windows,
            slots,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SlotRow {
    slot_id: String,
    date: NaiveDate,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: SlotStatus,
    appointment: Option<Appointment>,
}

impl From<SlotRow> for Slot {
    fn from(row: SlotRow) -> Self {
        Slot {
            slot_id: row.slot_id,
            start_time: row.start_time,
            end_time: row.end_time,
            status: row.status,
            appointment: row.appointment,
        }
    }
}

/// Reply of `replace_availability_date` and `withdraw_availability_date`.
#[derive(Debug, Deserialize)]
struct DateWriteReply {
    applied: bool,
    #[serde(default)]
    active_slots: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TransitionOutcome {
    Applied,
    Rejected,
    Missing,
}

/// Reply of `transition_slot`.
#[derive(Debug, Deserialize)]
struct TransitionReply {
    outcome: TransitionOutcome,
    slot: Option<SlotRow>,
}

#[derive(Debug, Serialize)]
struct NewSlotParam<'a> {
    slot_id: &'a str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

/// Repository backed by Supabase/PostgREST.
///
/// Reads go through plain table endpoints. Every write is a Postgres function
/// (see `supabase/migrations`) so that the status check, the slot update and
/// the appointment row are committed in one transaction.
///
/// Multi-row reads are paged so that a PostgREST `max-rows` cap never
/// truncates them silently.
pub struct SupabaseAvailabilityRepository {
    supabase: SupabaseClient,
    page_size: usize,
}

impl SupabaseAvailabilityRepository {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            page_size: PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    fn token(&self) -> Option<&str> {
        Some(self.supabase.service_token())
    }

    async fn fetch_slots(&self, query: &str) -> Result<Vec<SlotRow>, SchedulingError> {
        let path = format!("/rest/v1/availability_slots?{}&{}", query, SLOT_SELECT);
        self.supabase
            .select_all(&path, self.token(), self.page_size)
            .await
            .map_err(SchedulingError::persistence)
    }

    fn conflict(doctor_id: Uuid, date: NaiveDate, active_slots: Vec<String>) -> SchedulingError {
        warn!(
            "Database refused availability change for doctor {} on {}: {} active slots",
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
impl AvailabilityRepository for SupabaseAvailabilityRepository {
    async fn find_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<AvailabilityDate>, SchedulingError> {
        let path = format!(
            "/rest/v1/availability_dates?doctor_id=eq.{}&date=eq.{}",
            doctor_id, date
        );
        let rows: Vec<AvailabilityDateRow> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(SchedulingError::persistence)?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        let slots = self
            .fetch_slots(&format!(
                "doctor_id=eq.{}&date=eq.{}&order=start_time.asc",
                doctor_id, date
            ))
            .await?;

        row.into_date(slots.into_iter().map(Slot::from).collect()).map(Some)
    }

    async fn list_dates(&self, doctor_id: Uuid) -> Result<Vec<AvailabilityDate>, SchedulingError> {
        let path = format!(
            "/rest/v1/availability_dates?doctor_id=eq.{}&order=date.asc",
            doctor_id
        );
        let rows: Vec<AvailabilityDateRow> = self
            .supabase
            .select_all(&path, self.token(), self.page_size)
            .await
            .map_err(SchedulingError::persistence)?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut slots_by_date: BTreeMap<NaiveDate, Vec<Slot>> = BTreeMap::new();
        for row in self
            .fetch_slots(&format!(
                "doctor_id=eq.{}&order=date.asc,start_time.asc",
                doctor_id
            ))
            .await?
        {
            slots_by_date.entry(row.date).or_default().push(Slot::from(row));
        }

        rows.into_iter()
            .map(|row| {
                let slots = slots_by_date.remove(&row.date).unwrap_or_default();
                row.into_date(slots)
            })
            .collect()
    }

    async fn replace_date(&self, availability: AvailabilityDate) -> Result<AvailabilityDate, SchedulingError> {
        let slots: Vec<NewSlotParam<'_>> = availability
            .slots
            .iter()
            .map(|slot| NewSlotParam {
                slot_id: &slot.slot_id,
                start_time: slot.start_time,
                end_time: slot.end_time,
            })
            .collect();

        let morning = availability.windows.morning;
        let evening = availability.windows.evening;

        let params = json!({
            "p_id": availability.id,
            "p_doctor_id": availability.doctor_id,
            "p_date": availability.date,
            "p_slot_duration_minutes": availability.slot_duration_minutes,
            "p_morning_start_time": morning.map(|w| w.start),
            "p_morning_end_time": morning.map(|w| w.end),
            "p_evening_start_time": evening.map(|w| w.start),
            "p_evening_end_time": evening.map(|w| w.end),
            "p_slots": slots,
            "p_at": availability.updated_at,
        });

        let reply: DateWriteReply = self
            .supabase
            .rpc("replace_availability_date", self.token(), params)
            .await
            .map_err(SchedulingError::persistence)?;

        if !reply.applied {
            return Err(Self::conflict(availability.doctor_id, availability.date, reply.active_slots));
        }

        debug!(
            "Stored {} slots for doctor {} on {}",
            availability.slots.len(),
            availability.doctor_id,
            availability.date
        );
        Ok(availability)
    }

    async fn remove_date(&self, doctor_id: Uuid, date: NaiveDate) -> Result<bool, SchedulingError> {
        let params = json!({
            "p_doctor_id": doctor_id,
            "p_date": date,
        });

        let reply: Option<DateWriteReply> = self
            .supabase
            .rpc("withdraw_availability_date", self.token(), params)
            .await
            .map_err(SchedulingError::persistence)?;

        match reply {
            None => Ok(false),
            Some(reply) if reply.applied => Ok(true),
            Some(reply) => Err(Self::conflict(doctor_id, date, reply.active_slots)),
        }
    }

    async fn compare_and_set(
        &self,
        key: &SlotKey,
        expected: SlotStatus,
        change: SlotChange,
    ) -> Result<CasOutcome, SchedulingError> {
        let params = json!({
            "p_doctor_id": key.doctor_id,
            "p_date": key.date,
            "p_slot_id": key.slot_id,
            "p_expected_status": expected,
            "p_next_status": change.status,
            "p_appointment": change.bind,
            "p_at": change.at,
        });

        let reply: TransitionReply = self
            .supabase
            .rpc("transition_slot", self.token(), params)
            .await
            .map_err(SchedulingError::persistence)?;

        let slot = reply.slot.map(Slot::from);
        match (reply.outcome, slot) {
            (TransitionOutcome::Missing, _) => Ok(CasOutcome::Missing),
            (TransitionOutcome::Applied, Some(slot)) => Ok(CasOutcome::Applied(slot)),
            (TransitionOutcome::Rejected, Some(slot)) => Ok(CasOutcome::Rejected(slot)),
            (outcome, None) => Err(SchedulingError::Persistence(format!(
                "transition_slot reported {:?} for {} without returning the slot",
                outcome, key
            ))),
        }
    }

    async fn find_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError> {
        let party = match filter.party {
            AppointmentParty::Doctor(id) => format!("doctor_id=eq.{}", id),
            AppointmentParty::Patient(id) => format!("patient_id=eq.{}", id),
        };
        let statuses = filter
            .statuses
            .iter()
            .map(|status| status.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let path = format!(
            "/rest/v1/appointments?{}&date=gte.{}&date=lte.{}&status=in.({})&order=date.asc,start_time.asc,id.asc",
            party, filter.from, filter.to, statuses
        );

        let rows: Vec<Value> = self
            .supabase
            .select_all(&path, self.token(), self.page_size)
            .await
            .map_err(SchedulingError::persistence)?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(SchedulingError::persistence))
            .collect()
    }
}

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SchedulingError;

// ==============================================================================
// WORKING WINDOWS
// ==============================================================================

/// A wall-clock window in the clinic's local time, start inclusive, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Morning,
    Evening,
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowKind::Morning => write!(f, "morning"),
            WindowKind::Evening => write!(f, "evening"),
        }
    }
}

/// The clinic's two daily sessions. Either may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicWindows {
    pub morning: Option<TimeWindow>,
    pub evening: Option<TimeWindow>,
}

impl ClinicWindows {
    pub fn morning(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            morning: Some(TimeWindow::new(start, end)),
            evening: None,
        }
    }

    pub fn with_evening(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.evening = Some(TimeWindow::new(start, end));
        self
    }

    /// Build from the flat start/end pairs used by the doctor directory and
    /// request payloads. A window with only one bound is rejected.
    pub fn from_bounds(
        morning_start: Option<NaiveTime>,
        morning_end: Option<NaiveTime>,
        evening_start: Option<NaiveTime>,
        evening_end: Option<NaiveTime>,
    ) -> Result<Self, SchedulingError> {
        Ok(Self {
            morning: pair(WindowKind::Morning, morning_start, morning_end)?,
            evening: pair(WindowKind::Evening, evening_start, evening_end)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.morning.is_none() && self.evening.is_none()
    }

    pub fn declared(&self) -> impl Iterator<Item = (WindowKind, TimeWindow)> + '_ {
        self.morning
            .map(|w| (WindowKind::Morning, w))
            .into_iter()
            .chain(self.evening.map(|w| (WindowKind::Evening, w)))
    }
}

fn pair(
    kind: WindowKind,
    start: Option<NaiveTime>,
    end: Option<NaiveTime>,
) -> Result<Option<TimeWindow>, SchedulingError> {
    match (start, end) {
        (Some(start), Some(end)) => Ok(Some(TimeWindow::new(start, end))),
        (None, None) => Ok(None),
        _ => Err(SchedulingError::InvalidWindow(format!(
            "{} window needs both a start and an end time",
            kind
        ))),
    }
}

/// Working-hour configuration published by the doctor directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub morning_start_time: Option<NaiveTime>,
    pub morning_end_time: Option<NaiveTime>,
    pub evening_start_time: Option<NaiveTime>,
    pub evening_end_time: Option<NaiveTime>,
    pub slot_duration_minutes: Option<i64>,
}

impl WorkingHours {
    pub fn windows(&self) -> Result<ClinicWindows, SchedulingError> {
        ClinicWindows::from_bounds(
            self.morning_start_time,
            self.morning_end_time,
            self.evening_start_time,
            self.evening_end_time,
        )
    }
}

// ==============================================================================
// SLOT & APPOINTMENT LIFECYCLE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Open,
    Booked,
    Completed,
    Cancelled,
}

impl SlotStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SlotStatus::Completed | SlotStatus::Cancelled)
    }

    /// Booked or completed slots carry a live appointment and pin their date.
    pub fn is_active(&self) -> bool {
        matches!(self, SlotStatus::Booked | SlotStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Open => "open",
            SlotStatus::Booked => "booked",
            SlotStatus::Completed => "completed",
            SlotStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Booked,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// The appointment status that mirrors a slot status. Open slots have none.
    pub fn for_slot(status: SlotStatus) -> Option<Self> {
        match status {
            SlotStatus::Open => None,
            SlotStatus::Booked => Some(AppointmentStatus::Booked),
            SlotStatus::Completed => Some(AppointmentStatus::Completed),
            SlotStatus::Cancelled => Some(AppointmentStatus::Cancelled),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Booked => "booked",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slot_id: String,
    pub start_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn book(patient_id: Uuid, key: &SlotKey, start_time: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id: key.doctor_id,
            date: key.date,
            slot_id: key.slot_id.clone(),
            start_time,
            status: AppointmentStatus::Booked,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub slot_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SlotStatus,
    pub appointment: Option<Appointment>,
}

impl Slot {
    pub fn open(slot_id: String, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            slot_id,
            start_time,
            end_time,
            status: SlotStatus::Open,
            appointment: None,
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// Apply a committed transition. The bound appointment follows the slot.
    pub fn apply(&mut self, change: &SlotChange) {
        self.status = change.status;

        if let Some(appointment) = &change.bind {
            self.appointment = Some(appointment.clone());
        } else if let Some(appointment) = self.appointment.as_mut() {
            if let Some(status) = AppointmentStatus::for_slot(change.status) {
                appointment.status = status;
                appointment.updated_at = change.at;
            }
        }
    }
}

/// Unique address of a slot: (doctor, date, slot id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slot_id: String,
}

impl SlotKey {
    pub fn new(doctor_id: Uuid, date: NaiveDate, slot_id: impl Into<String>) -> Self {
        Self {
            doctor_id,
            date,
            slot_id: slot_id.into(),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.doctor_id, self.date, self.slot_id)
    }
}

// ==============================================================================
// AVAILABILITY AGGREGATE
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityDate {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slot_duration_minutes: i64,
    pub windows: ClinicWindows,
    pub slots: Vec<Slot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilityDate {
    pub fn slot(&self, slot_id: &str) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.slot_id == slot_id)
    }

    /// Ids of slots that hold a booked or completed appointment.
    pub fn active_slot_ids(&self) -> Vec<String> {
        active_slot_ids(&self.slots)
    }

    pub fn counts(&self) -> SlotCounts {
        SlotCounts::tally(&self.slots)
    }
}

pub fn active_slot_ids(slots: &[Slot]) -> Vec<String> {
    slots
        .iter()
        .filter(|slot| slot.status.is_active())
        .map(|slot| slot.slot_id.clone())
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCounts {
    pub total: usize,
    pub open: usize,
    pub booked: usize,
    pub completed: usize,
    pub cancelled: usize,
}

impl SlotCounts {
    pub fn tally(slots: &[Slot]) -> Self {
        slots.iter().fold(Self::default(), |mut counts, slot| {
            counts.total += 1;
            match slot.status {
                SlotStatus::Open => counts.open += 1,
                SlotStatus::Booked => counts.booked += 1,
                SlotStatus::Completed => counts.completed += 1,
                SlotStatus::Cancelled => counts.cancelled += 1,
            }
            counts
        })
    }
}

// ==============================================================================
// REPOSITORY CONTRACT TYPES
// ==============================================================================

/// A slot transition to commit only if the slot still has the expected status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotChange {
    pub status: SlotStatus,
    pub bind: Option<Appointment>,
    pub at: DateTime<Utc>,
}

impl SlotChange {
    pub fn to(status: SlotStatus, at: DateTime<Utc>) -> Self {
        Self { status, bind: None, at }
    }

    pub fn bind(appointment: Appointment) -> Self {
        Self {
            status: SlotStatus::Booked,
            at: appointment.created_at,
            bind: Some(appointment),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// The swap happened; carries the slot as written.
    Applied(Slot),
    /// The slot was in another state; carries what was found.
    Rejected(Slot),
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AppointmentParty {
    Doctor(Uuid),
    Patient(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentFilter {
    pub party: AppointmentParty,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub statuses: Vec<AppointmentStatus>,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        let party = match self.party {
            AppointmentParty::Doctor(id) => appointment.doctor_id == id,
            AppointmentParty::Patient(id) => appointment.patient_id == id,
        };

        party
            && appointment.date >= self.from
            && appointment.date <= self.to
            && self.statuses.contains(&appointment.status)
    }
}

/// Orders appointments by date, then by slot start time.
pub fn sort_appointments(appointments: &mut [Appointment]) {
    appointments.sort_by(|a, b| (a.date, a.start_time).cmp(&(b.date, b.start_time)));
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Body of a mark-available call. Leaving every window unset defers to the
/// doctor directory's working hours; `slot_duration_minutes` still applies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkAvailabilityRequest {
    pub morning_start_time: Option<NaiveTime>,
    pub morning_end_time: Option<NaiveTime>,
    pub evening_start_time: Option<NaiveTime>,
    pub evening_end_time: Option<NaiveTime>,
    pub slot_duration_minutes: Option<i64>,
}

impl MarkAvailabilityRequest {
    pub fn uses_directory(&self) -> bool {
        self.morning_start_time.is_none()
            && self.morning_end_time.is_none()
            && self.evening_start_time.is_none()
            && self.evening_end_time.is_none()
    }

    pub fn windows(&self) -> Result<ClinicWindows, SchedulingError> {
        ClinicWindows::from_bounds(
            self.morning_start_time,
            self.morning_end_time,
            self.evening_start_time,
            self.evening_end_time,
        )
    }
}

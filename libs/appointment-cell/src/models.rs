use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use availability_cell::models::Slot;
use availability_cell::SchedulingError;

// ==============================================================================
// BOOKING MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSlotRequest {
    pub patient_id: Uuid,
}

/// Result of a single-slot cancel. `changed` is false when the slot was
/// already cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelSlotOutcome {
    pub slot: Slot,
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSlot {
    pub slot_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAllOutcome {
    pub cancelled: usize,
    pub cancelled_slot_ids: Vec<String>,
    pub skipped: Vec<SkippedSlot>,
}

impl CancelAllOutcome {
    pub fn record_cancelled(&mut self, slot_id: String) {
        self.cancelled += 1;
        self.cancelled_slot_ids.push(slot_id);
    }

    pub fn record_skipped(&mut self, slot_id: String, reason: impl ToString) {
        self.skipped.push(SkippedSlot {
            slot_id,
            reason: reason.to_string(),
        });
    }
}

// ==============================================================================
// QUERY MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct DateRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, SchedulingError> {
        if from > to {
            return Err(SchedulingError::InvalidDateRange { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }
}

impl TryFrom<DateRangeQuery> for DateRange {
    type Error = SchedulingError;

    fn try_from(query: DateRangeQuery) -> Result<Self, Self::Error> {
        DateRange::new(query.from, query.to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

impl PatientSummary {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A slot as shown on a doctor's day sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotView {
    #[serde(flatten)]
    pub slot: Slot,
    pub patient: Option<PatientSummary>,
}

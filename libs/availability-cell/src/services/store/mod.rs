pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::SchedulingError;
use crate::models::{Appointment, AppointmentFilter, AvailabilityDate, CasOutcome, SlotChange, SlotKey, SlotStatus};

pub use memory::InMemoryAvailabilityRepository;
pub use supabase::SupabaseAvailabilityRepository;

/// Persistence for availability dates, their slots and the appointments bound
/// to them. A slot and its appointment are always written together.
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    async fn find_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<AvailabilityDate>, SchedulingError>;

    /// Every declared date of a doctor, ascending.
    async fn list_dates(&self, doctor_id: Uuid) -> Result<Vec<AvailabilityDate>, SchedulingError>;

    /// Store `availability` in place of any existing date with the same key.
    /// Fails with `ConflictingAvailability` if the existing date holds booked or
    /// completed slots; the check and the swap are one atomic step.
    /// Cancelled appointments of the replaced date remain visible to
    /// `find_appointments`.
    async fn replace_date(&self, availability: AvailabilityDate) -> Result<AvailabilityDate, SchedulingError>;

    /// Delete a date under the same conflict rule as `replace_date`.
    /// Returns false when nothing was declared for the key.
    async fn remove_date(&self, doctor_id: Uuid, date: NaiveDate) -> Result<bool, SchedulingError>;

    /// Commit `change` only if the slot is currently in `expected`.
    async fn compare_and_set(
        &self,
        key: &SlotKey,
        expected: SlotStatus,
        change: SlotChange,
    ) -> Result<CasOutcome, SchedulingError>;

    /// Matching appointments ordered by date, then start time.
    async fn find_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError>;
}

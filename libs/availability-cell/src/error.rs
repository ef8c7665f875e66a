use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{SlotKey, SlotStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulingError {
    #[error("Invalid availability window: {0}")]
    InvalidWindow(String),

    #[error("Invalid slot duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid date range: {from} is after {to}")]
    InvalidDateRange { from: NaiveDate, to: NaiveDate },

    #[error("Availability for doctor {doctor_id} on {date} has active bookings: {}", .active_slots.join(", "))]
    ConflictingAvailability {
        doctor_id: Uuid,
        date: NaiveDate,
        active_slots: Vec<String>,
    },

    #[error("Slot not found: {0}")]
    SlotNotFound(SlotKey),

    #[error("Slot {slot_id} is not available (currently {status})")]
    SlotNotAvailable { slot_id: String, status: SlotStatus },

    #[error("Invalid slot transition from {from} to {to}")]
    InvalidTransition { from: SlotStatus, to: SlotStatus },

    #[error("Slot {slot_id} cannot be completed before it ends at {ends_at}")]
    SlotNotElapsed { slot_id: String, ends_at: DateTime<Utc> },

    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    #[error("Directory lookup failed: {0}")]
    Directory(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl SchedulingError {
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        SchedulingError::Persistence(err.to_string())
    }
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        let message = err.to_string();
        match err {
            SchedulingError::InvalidWindow(_)
            | SchedulingError::InvalidDuration(_)
            | SchedulingError::InvalidDateRange { .. } => AppError::ValidationError(message),
            SchedulingError::SlotNotFound(_) | SchedulingError::DoctorNotFound(_) => {
                AppError::NotFound(message)
            }
            SchedulingError::ConflictingAvailability { .. }
            | SchedulingError::SlotNotAvailable { .. }
            | SchedulingError::InvalidTransition { .. }
            | SchedulingError::SlotNotElapsed { .. } => AppError::Conflict(message),
            SchedulingError::Directory(_) => AppError::ExternalService(message),
            SchedulingError::Persistence(_) => AppError::Database(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_lists_active_slots() {
        let err = SchedulingError::ConflictingAvailability {
            doctor_id: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            active_slots: vec!["2024-06-10T09:00".into(), "2024-06-10T09:30".into()],
        };
        assert!(err.to_string().ends_with("2024-06-10T09:00, 2024-06-10T09:30"));
        assert!(matches!(AppError::from(err), AppError::Conflict(_)));
    }

    #[test]
    fn business_rejections_are_not_server_errors() {
        let not_available = SchedulingError::SlotNotAvailable {
            slot_id: "2024-06-10T09:00".into(),
            status: SlotStatus::Booked,
        };
        assert!(!AppError::from(not_available).status_code().is_server_error());

        let missing = SchedulingError::SlotNotFound(SlotKey::new(
            Uuid::nil(),
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            "2024-06-10T23:00",
        ));
        assert!(matches!(AppError::from(missing), AppError::NotFound(_)));
    }

    #[test]
    fn persistence_failures_map_to_database_errors() {
        let err = SchedulingError::persistence("connection refused");
        assert_eq!(AppError::from(err), AppError::Database("Persistence error: connection refused".into()));
    }
}

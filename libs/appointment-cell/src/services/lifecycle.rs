use tracing::{debug, warn};

use availability_cell::models::SlotStatus;
use availability_cell::SchedulingError;

/// The slot state machine shared by booking, cancellation and completion.
///
/// ```text
/// open ──book──> booked ──complete──> completed
///   │              │
///   └───cancel─────┴──cancel──> cancelled
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotLifecycle;

impl SlotLifecycle {
    pub fn new() -> Self {
        Self
    }

    pub fn valid_transitions(&self, current: SlotStatus) -> &'static [SlotStatus] {
        match current {
            SlotStatus::Open => &[SlotStatus::Booked, SlotStatus::Cancelled],
            SlotStatus::Booked => &[SlotStatus::Completed, SlotStatus::Cancelled],
            // Terminal states
            SlotStatus::Completed | SlotStatus::Cancelled => &[],
        }
    }

    pub fn validate_transition(&self, current: SlotStatus, next: SlotStatus) -> Result<(), SchedulingError> {
        if !self.valid_transitions(current).contains(&next) {
            warn!("Invalid slot transition attempted: {} -> {}", current, next);
            return Err(SchedulingError::InvalidTransition { from: current, to: next });
        }

        debug!("Slot transition validated: {} -> {}", current, next);
        Ok(())
    }
}

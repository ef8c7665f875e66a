use chrono::{Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use tracing::debug;

use shared_config::AppConfig;

use crate::error::SchedulingError;
use crate::models::{ClinicWindows, Slot, TimeWindow, WindowKind};

/// No window fits inside one day once the step reaches a full day.
const MAX_SLOT_MINUTES: i64 = 24 * 60;

/// Turns a date's working windows into the ordered list of bookable slots.
///
/// Window times are wall-clock times in the clinic's zone, expressed as a fixed
/// UTC offset. Slot timestamps are stored in UTC; slot ids keep the local time so
/// they read naturally in date pickers (`2024-06-10T09:00`).
#[derive(Debug, Clone, Copy)]
pub struct SlotGenerator {
    offset: FixedOffset,
}

impl Default for SlotGenerator {
    fn default() -> Self {
        Self::utc()
    }
}

impl SlotGenerator {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.clinic_offset())
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Stable identifier for the slot starting at `start` local time on `date`.
    pub fn slot_id(date: NaiveDate, start: NaiveTime) -> String {
        format!("{}T{}", date.format("%Y-%m-%d"), start.format("%H:%M"))
    }

    pub fn generate(
        &self,
        date: NaiveDate,
        windows: &ClinicWindows,
        duration_minutes: i64,
    ) -> Result<Vec<Slot>, SchedulingError> {
        validate_duration(duration_minutes)?;
        validate_windows(windows)?;

        let step = Duration::minutes(duration_minutes);
        let mut slots = Vec::new();

        for (kind, window) in windows.declared() {
            let before = slots.len();
            let mut cursor = window.start;

            loop {
                let (end, wrapped) = cursor.overflowing_add_signed(step);
                // A trailing partial slot is dropped rather than truncated.
                if wrapped != 0 || end > window.end {
                    break;
                }
                slots.push(self.slot_at(date, cursor, end)?);
                cursor = end;
            }

            debug!(
                "{} window {}-{} on {} yields {} slots of {} minutes",
                kind,
                window.start.format("%H:%M"),
                window.end.format("%H:%M"),
                date,
                slots.len() - before,
                duration_minutes
            );
        }

        slots.sort_by_key(|slot| slot.start_time);
        Ok(slots)
    }

    fn slot_at(&self, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Result<Slot, SchedulingError> {
        let localize = |time: NaiveTime| {
            self.offset
                .from_local_datetime(&date.and_time(time))
                .single()
                .map(|local| local.with_timezone(&Utc))
                .ok_or_else(|| {
                    SchedulingError::InvalidWindow(format!("{} {} has no single UTC instant", date, time))
                })
        };

        Ok(Slot::open(Self::slot_id(date, start), localize(start)?, localize(end)?))
    }
}

fn validate_duration(duration_minutes: i64) -> Result<(), SchedulingError> {
    if duration_minutes <= 0 {
        return Err(SchedulingError::InvalidDuration(format!(
            "slot duration must be positive, got {} minutes",
            duration_minutes
        )));
    }
    if duration_minutes >= MAX_SLOT_MINUTES {
        return Err(SchedulingError::InvalidDuration(format!(
            "slot duration of {} minutes does not fit in a day",
            duration_minutes
        )));
    }
    Ok(())
}

fn validate_windows(windows: &ClinicWindows) -> Result<(), SchedulingError> {
    if windows.is_empty() {
        return Err(SchedulingError::InvalidWindow(
            "at least one of the morning or evening windows must be declared".to_string(),
        ));
    }

    for (kind, window) in windows.declared() {
        check_window(kind, &window)?;
    }

    if let (Some(morning), Some(evening)) = (&windows.morning, &windows.evening) {
        if morning.overlaps(evening) {
            return Err(SchedulingError::InvalidWindow(format!(
                "morning window {}-{} overlaps evening window {}-{}",
                morning.start.format("%H:%M"),
                morning.end.format("%H:%M"),
                evening.start.format("%H:%M"),
                evening.end.format("%H:%M")
            )));
        }
    }

    Ok(())
}

fn check_window(kind: WindowKind, window: &TimeWindow) -> Result<(), SchedulingError> {
    if window.start >= window.end {
        return Err(SchedulingError::InvalidWindow(format!(
            "{} window starts at {} but ends at {}",
            kind,
            window.start.format("%H:%M"),
            window.end.format("%H:%M")
        )));
    }
    Ok(())
}

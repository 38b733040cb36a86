use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::BookingError;

/// Longest bookable window, one full day.
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// Half-open interval `[start, end)` with `end` strictly after `start`. Both bounds
/// are kept at whole-second precision, the precision the ledger stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, BookingError> {
        let (start, end) = (start.trunc_subsecs(0), end.trunc_subsecs(0));
        if end <= start {
            return Err(BookingError::Validation(format!(
                "interval end {} must be after start {}",
                end.to_rfc3339(),
                start.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    pub fn from_duration(start: DateTime<Utc>, duration_minutes: i64) -> Result<Self, BookingError> {
        if duration_minutes <= 0 {
            return Err(BookingError::Validation(format!(
                "duration must be a positive number of minutes, got {duration_minutes}"
            )));
        }
        if duration_minutes > MAX_DURATION_MINUTES {
            return Err(BookingError::Validation(format!(
                "duration may not exceed {MAX_DURATION_MINUTES} minutes, got {duration_minutes}"
            )));
        }
        let start = start.trunc_subsecs(0);
        let end = Duration::try_minutes(duration_minutes)
            .and_then(|length| start.checked_add_signed(length))
            .ok_or_else(|| out_of_range(start))?;
        Self::new(start, end)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        other.start < self.end && other.end > self.start
    }

    /// Same length, starting at `start`.
    pub fn shifted_to(&self, start: DateTime<Utc>) -> Result<Self, BookingError> {
        let start = start.trunc_subsecs(0);
        let end = start.checked_add_signed(self.end - self.start).ok_or_else(|| out_of_range(start))?;
        Self::new(start, end)
    }
}

fn out_of_range(start: DateTime<Utc>) -> BookingError {
    BookingError::Validation(format!("window starting {} ends out of range", start.to_rfc3339()))
}

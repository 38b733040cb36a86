use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::transaction::{BookingRequest, CommitOutcome};
use super::BookingEngine;
use crate::domain::meeting::{Meeting, MeetingId};
use crate::domain::room::RoomId;
use crate::domain::user::UserId;
use crate::domain::window::TimeWindow;
use crate::errors::{BookingError, StoreError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

impl RecurrencePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
        }
    }

    /// Calendar date of occurrence `index`, counted from `first`.
    fn nth(&self, first: NaiveDate, index: u32) -> Option<NaiveDate> {
        match self {
            Self::Daily => first.checked_add_signed(Duration::days(i64::from(index))),
            Self::Weekly => first.checked_add_signed(Duration::weeks(i64::from(index))),
            Self::Biweekly => first.checked_add_signed(Duration::weeks(2 * i64::from(index))),
            Self::Monthly => first.checked_add_months(Months::new(index)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecurringRequest {
    pub room_id: RoomId,
    pub first_start: DateTime<Utc>,
    pub duration_minutes: i64,
    pub pattern: RecurrencePattern,
    pub occurrences: u32,
    pub user_id: UserId,
    pub title: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum OccurrenceFailure {
    Conflict { blocking: Vec<MeetingId> },
    Closed,
    StoreUnavailable { message: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailedOccurrence {
    pub window: TimeWindow,
    #[serde(flatten)]
    pub reason: OccurrenceFailure,
}

/// Per-occurrence results. One blocked date never undoes the others.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeriesReport {
    pub pattern: RecurrencePattern,
    pub created: Vec<Meeting>,
    pub failed: Vec<FailedOccurrence>,
    pub requested: u32,
    /// Set when the requested count was above the cap and got clamped to it.
    pub capped_at: Option<u32>,
}

fn next_business_day(mut date: NaiveDate) -> NaiveDate {
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    date
}

/// Occurrence dates: weekend dates move to the next business day, and a date
/// already taken by an earlier occurrence moves past it.
pub fn occurrence_dates(first: NaiveDate, pattern: RecurrencePattern, count: u32) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = Vec::with_capacity(count as usize);
    for index in 0..count {
        let Some(raw) = pattern.nth(first, index) else {
            break;
        };
        let mut date = next_business_day(raw);
        if let Some(previous) = dates.last() {
            if date <= *previous {
                match previous.succ_opt() {
                    Some(after) => date = next_business_day(after),
                    None => break,
                }
            }
        }
        dates.push(date);
    }
    dates
}

impl BookingEngine {
    /// Books each occurrence independently and reports both lists.
    pub async fn book_series(&self, request: &RecurringRequest) -> Result<SeriesReport, BookingError> {
        if request.occurrences == 0 {
            return Err(BookingError::Validation("occurrence count must be at least 1".to_string()));
        }
        TimeWindow::from_duration(request.first_start, request.duration_minutes)?;
        self.guarded("get_room", self.rooms.get_room(&request.room_id))
            .await?
            .ok_or_else(|| BookingError::room_not_found(request.room_id.to_string()))?;

        let cap = self.policy.recurrence_cap;
        let count = request.occurrences.min(cap);
        let capped_at = (request.occurrences > cap).then_some(cap);

        let local_first = self.policy.local(request.first_start);
        let time_of_day = local_first.time();
        let dates = occurrence_dates(local_first.date_naive(), request.pattern, count);

        let mut created = Vec::new();
        let mut failed = Vec::new();
        let mut store_failures = 0usize;
        let mut last_failure: Option<StoreError> = None;

        for date in &dates {
            let start = self.policy.instant_at(date.and_time(time_of_day));
            let window = TimeWindow::from_duration(start, request.duration_minutes)?;
            let outcome = self
                .commit(BookingRequest {
                    room_id: request.room_id.clone(),
                    start,
                    duration_minutes: request.duration_minutes,
                    user_id: request.user_id.clone(),
                    title: request.title.clone(),
                })
                .await;

            match outcome {
                Ok(CommitOutcome::Booked { meeting, .. }) => created.push(meeting),
                Ok(CommitOutcome::Conflict { blocking, .. }) => failed.push(FailedOccurrence {
                    window,
                    reason: OccurrenceFailure::Conflict {
                        blocking: blocking.into_iter().map(|meeting| meeting.id).collect(),
                    },
                }),
                Ok(CommitOutcome::OutsideOpeningHours { .. }) => {
                    failed.push(FailedOccurrence { window, reason: OccurrenceFailure::Closed })
                }
                Err(BookingError::Store(error)) => {
                    warn!(
                        event_name = "booking.recurring.occurrence_failed",
                        room_id = %request.room_id,
                        window_start = %start,
                        error = %error,
                        "occurrence could not be booked"
                    );
                    store_failures += 1;
                    failed.push(FailedOccurrence {
                        window,
                        reason: OccurrenceFailure::StoreUnavailable { message: error.to_string() },
                    });
                    last_failure = Some(error);
                }
                Err(other) => return Err(other),
            }
        }

        if let Some(error) = last_failure {
            if store_failures == dates.len() {
                return Err(BookingError::Store(error));
            }
        }

        info!(
            event_name = "booking.recurring.completed",
            room_id = %request.room_id,
            user_id = %request.user_id,
            pattern = request.pattern.as_str(),
            created = created.len(),
            failed = failed.len(),
            "recurring series processed"
        );
        Ok(SeriesReport {
            pattern: request.pattern,
            created,
            failed,
            requested: request.occurrences,
            capped_at,
        })
    }
}

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::catalog::SearchCriteria;
use super::BookingEngine;
use crate::domain::room::{Room, RoomId};
use crate::domain::window::TimeWindow;
use crate::errors::{BookingError, StoreError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstantRequest {
    pub now: DateTime<Utc>,
    pub duration_minutes: i64,
    pub criteria: SearchCriteria,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InstantOption {
    pub room: Room,
    pub free_until: DateTime<Utc>,
    pub free_minutes: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InstantLookup {
    /// `now` rounded up to the next tick.
    pub start: DateTime<Utc>,
    pub options: Vec<InstantOption>,
    pub matched_rooms: usize,
    pub unverified: Vec<RoomId>,
}

/// Rounds up to the next multiple of `minutes`; instants already on a tick stay.
pub fn round_up(instant: DateTime<Utc>, minutes: u32) -> DateTime<Utc> {
    let step = i64::from(minutes.max(1)) * 60;
    let seconds = instant.timestamp();
    let on_tick = seconds % step == 0 && instant.timestamp_subsec_nanos() == 0;
    let rounded = if on_tick { seconds } else { (seconds.div_euclid(step) + 1) * step };
    Utc.timestamp_opt(rounded, 0).single().unwrap_or(instant)
}

impl BookingEngine {
    /// Rooms usable from the next tick for at least the requested duration,
    /// smallest first.
    pub async fn find_room_now(&self, request: &InstantRequest) -> Result<InstantLookup, BookingError> {
        let start = round_up(request.now, self.policy.instant_rounding_minutes);
        let window = TimeWindow::from_duration(start, request.duration_minutes)?;
        let rooms = self.filter_rooms(&request.criteria).await?;
        let matched_rooms = rooms.len();
        let date = self.policy.local_date(start);
        let business_end = self.policy.business_end_on(date);

        let mut options = Vec::new();
        let mut unverified = Vec::new();
        let mut last_failure: Option<StoreError> = None;
        let mut checked = 0usize;

        for room in rooms {
            if request.criteria.exclude_room_ids.contains(&room.id)
                || !self.policy.room_is_open(&room, &window)
            {
                continue;
            }

            checked += 1;
            match self.free_until(&room, &window, business_end).await {
                Ok(Some(free_until)) => {
                    let free_minutes = (free_until - start).num_minutes();
                    if free_minutes >= request.duration_minutes {
                        options.push(InstantOption { room, free_until, free_minutes });
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        event_name = "booking.instant.candidate_unverified",
                        room_id = %room.id,
                        error = %error,
                        "instant lookup skipped a room"
                    );
                    unverified.push(room.id);
                    last_failure = Some(error);
                }
            }
        }

        if let Some(error) = last_failure {
            if unverified.len() == checked {
                return Err(BookingError::Store(error));
            }
        }

        options.sort_by(|left, right| {
            left.room.capacity.cmp(&right.room.capacity).then_with(|| left.room.id.cmp(&right.room.id))
        });
        options.truncate(self.policy.instant_option_limit);

        debug!(
            event_name = "booking.instant.resolved",
            start = %start,
            matched_rooms,
            offered = options.len(),
            "instant lookup completed"
        );
        Ok(InstantLookup { start, options, matched_rooms, unverified })
    }

    /// End of the free stretch starting at `window.start()`, or `None` when the
    /// window itself is taken.
    async fn free_until(
        &self,
        room: &Room,
        window: &TimeWindow,
        business_end: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        if !self.conflicts(&room.id, window, None).await?.is_empty() {
            return Ok(None);
        }

        let closing = self.policy.room_closes_on(room, self.policy.local_date(window.start()));
        let day_end = closing.min(business_end);
        let next = self
            .guarded("next_start_after", self.ledger.next_start_after(&room.id, window.start()))
            .await?;
        Ok(Some(next.map_or(day_end, |next| next.min(day_end))))
    }
}

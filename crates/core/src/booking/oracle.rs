use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::BookingEngine;
use crate::domain::meeting::{Meeting, MeetingId};
use crate::domain::room::{Room, RoomId};
use crate::domain::window::TimeWindow;
use crate::errors::{BookingError, StoreError};

/// Answer for a single room and window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Availability {
    Free { room: Room, window: TimeWindow },
    Booked { room: Room, window: TimeWindow, blocking: Vec<Meeting> },
    Closed { room: Room, window: TimeWindow },
}

impl BookingEngine {
    /// Whether any confirmed meeting of `room_id` intersects `window`.
    ///
    /// A store failure is returned as an error; it is never read as "free".
    pub async fn has_conflict(
        &self,
        room_id: &RoomId,
        window: &TimeWindow,
    ) -> Result<bool, StoreError> {
        Ok(!self.conflicts(room_id, window, None).await?.is_empty())
    }

    /// Meetings blocking `window` in `room_id`, leaving out `ignore` when given.
    pub async fn conflicts(
        &self,
        room_id: &RoomId,
        window: &TimeWindow,
        ignore: Option<&MeetingId>,
    ) -> Result<Vec<Meeting>, StoreError> {
        let found = self
            .guarded("overlapping_for_room", self.ledger.overlapping_for_room(room_id, window))
            .await?;

        // Re-apply the overlap rule so a store returning a superset cannot
        // turn touching endpoints into conflicts.
        let blocking: Vec<Meeting> = found
            .into_iter()
            .filter(|meeting| &meeting.room_id == room_id && meeting.blocks(window))
            .filter(|meeting| Some(&meeting.id) != ignore)
            .collect();

        debug!(
            event_name = "booking.oracle.checked",
            room_id = %room_id,
            window_start = %window.start(),
            window_end = %window.end(),
            blocking = blocking.len(),
            "conflict check completed"
        );
        Ok(blocking)
    }

    /// Free/busy answer for one room, with opening hours applied.
    pub async fn check_availability(
        &self,
        room_id: &RoomId,
        start: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<Availability, BookingError> {
        let window = TimeWindow::from_duration(start, duration_minutes)?;
        let room = self
            .guarded("get_room", self.rooms.get_room(room_id))
            .await?
            .ok_or_else(|| BookingError::room_not_found(room_id.to_string()))?;

        if !self.policy.room_is_open(&room, &window) {
            return Ok(Availability::Closed { room, window });
        }

        let blocking = self.conflicts(room_id, &window, None).await?;
        if blocking.is_empty() {
            Ok(Availability::Free { room, window })
        } else {
            Ok(Availability::Booked { room, window, blocking })
        }
    }
}

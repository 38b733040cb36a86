use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use tracing::info;

use super::{meeting_title, BookingEngine};
use crate::domain::meeting::{Meeting, NewMeeting};
use crate::domain::room::{Room, RoomId};
use crate::domain::user::UserId;
use crate::domain::window::TimeWindow;
use crate::errors::BookingError;
use crate::store::WriteOutcome;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingRequest {
    pub room_id: RoomId,
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
    pub user_id: UserId,
    pub title: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommitOutcome {
    Booked { room: Room, meeting: Meeting },
    /// Another booking holds the room; the caller has to resolve again.
    Conflict { room: Room, window: TimeWindow, blocking: Vec<Meeting> },
    OutsideOpeningHours { room: Room, window: TimeWindow, opens_at: NaiveTime, closes_at: NaiveTime },
}

impl BookingEngine {
    /// Re-checks the room at commit time and writes the booking. A conflict is an
    /// outcome, not an error, and is never retried here.
    pub async fn commit(&self, request: BookingRequest) -> Result<CommitOutcome, BookingError> {
        let window = TimeWindow::from_duration(request.start, request.duration_minutes)?;
        let room = self
            .guarded("get_room", self.rooms.get_room(&request.room_id))
            .await?
            .filter(|room| room.active)
            .ok_or_else(|| BookingError::room_not_found(request.room_id.to_string()))?;

        if !self.policy.room_is_open(&room, &window) {
            return Ok(CommitOutcome::OutsideOpeningHours {
                opens_at: room.opens_at,
                closes_at: room.closes_at,
                room,
                window,
            });
        }

        let blocking = self.conflicts(&room.id, &window, None).await?;
        if !blocking.is_empty() {
            info!(
                event_name = "booking.transaction.conflict",
                room_id = %room.id,
                user_id = %request.user_id,
                blocking = blocking.len(),
                "commit refused by re-validation"
            );
            return Ok(CommitOutcome::Conflict { room, window, blocking });
        }

        let new_meeting = NewMeeting {
            room_id: room.id.clone(),
            user_id: request.user_id,
            title: meeting_title(request.title.as_deref()),
            window,
        };
        match self.guarded("insert_meeting", self.ledger.insert_meeting(new_meeting)).await? {
            WriteOutcome::Written(meeting) => {
                info!(
                    event_name = "booking.transaction.committed",
                    meeting_id = %meeting.id,
                    room_id = %meeting.room_id,
                    user_id = %meeting.user_id,
                    "meeting booked"
                );
                Ok(CommitOutcome::Booked { room, meeting })
            }
            WriteOutcome::Overlap(blocking) => {
                // Lost the race between re-validation and insert.
                info!(
                    event_name = "booking.transaction.store_rejected",
                    room_id = %room.id,
                    blocking = blocking.len(),
                    "store refused an overlapping insert"
                );
                Ok(CommitOutcome::Conflict { room, window, blocking })
            }
        }
    }
}

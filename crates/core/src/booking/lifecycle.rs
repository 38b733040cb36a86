use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::BookingEngine;
use crate::domain::meeting::{Meeting, MeetingId};
use crate::domain::room::{Room, RoomId};
use crate::domain::user::UserId;
use crate::domain::window::TimeWindow;
use crate::errors::BookingError;
use crate::store::WriteOutcome;

/// Furthest ahead an upcoming-meetings listing may look.
pub const MAX_HORIZON_DAYS: i64 = 366;

/// Requested changes. `end` and `duration_minutes` are mutually exclusive; a moved
/// start without either keeps the previous duration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingChanges {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub title: Option<String>,
}

impl MeetingChanges {
    pub fn is_empty(&self) -> bool {
        self.start.is_none()
            && self.end.is_none()
            && self.duration_minutes.is_none()
            && self.room_id.is_none()
            && self.title.as_deref().map(str::trim).filter(|title| !title.is_empty()).is_none()
    }

    fn window_for(&self, current: &TimeWindow) -> Result<TimeWindow, BookingError> {
        let start = self.start.unwrap_or_else(|| current.start());
        match (self.end, self.duration_minutes) {
            (Some(_), Some(_)) => Err(BookingError::Validation(
                "give either an end time or a duration, not both".to_string(),
            )),
            (Some(end), None) => TimeWindow::new(start, end),
            (None, Some(minutes)) => TimeWindow::from_duration(start, minutes),
            (None, None) => current.shifted_to(start),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateOutcome {
    Updated { previous: Meeting, meeting: Meeting },
    Conflict { window: TimeWindow, blocking: Vec<Meeting> },
    OutsideOpeningHours { room: Room, window: TimeWindow },
}

impl BookingEngine {
    /// Loads a meeting and checks the caller owns it. Ownership failures are
    /// reported as such, never as a missing meeting.
    async fn owned_meeting(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
    ) -> Result<Meeting, BookingError> {
        let meeting = self
            .guarded("find_meeting", self.ledger.find_meeting(meeting_id))
            .await?
            .ok_or_else(|| BookingError::meeting_not_found(meeting_id.to_string()))?;

        if &meeting.user_id != user_id {
            info!(
                event_name = "booking.lifecycle.ownership_denied",
                meeting_id = %meeting_id,
                user_id = %user_id,
                "caller does not own the meeting"
            );
            return Err(BookingError::Unauthorized {
                user_id: user_id.clone(),
                meeting_id: meeting_id.clone(),
            });
        }
        Ok(meeting)
    }

    pub async fn update(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
        changes: MeetingChanges,
    ) -> Result<UpdateOutcome, BookingError> {
        if changes.is_empty() {
            return Err(BookingError::Validation("no changes were requested".to_string()));
        }

        let current = self.owned_meeting(meeting_id, user_id).await?;
        let window = changes.window_for(&current.window)?;
        let room_id = changes.room_id.clone().unwrap_or_else(|| current.room_id.clone());
        let title = changes
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| current.title.clone());

        let moved = window != current.window || room_id != current.room_id;
        if moved {
            let room = self
                .guarded("get_room", self.rooms.get_room(&room_id))
                .await?
                .filter(|room| room.active)
                .ok_or_else(|| BookingError::room_not_found(room_id.to_string()))?;
            if !self.policy.room_is_open(&room, &window) {
                return Ok(UpdateOutcome::OutsideOpeningHours { room, window });
            }

            let blocking = self.conflicts(&room_id, &window, Some(&current.id)).await?;
            if !blocking.is_empty() {
                return Ok(UpdateOutcome::Conflict { window, blocking });
            }
        }

        let candidate = Meeting { room_id, title, window, ..current.clone() };
        match self.guarded("move_meeting", self.ledger.move_meeting(candidate)).await? {
            WriteOutcome::Written(meeting) => {
                info!(
                    event_name = "booking.lifecycle.updated",
                    meeting_id = %meeting.id,
                    room_id = %meeting.room_id,
                    user_id = %user_id,
                    moved,
                    "meeting updated"
                );
                Ok(UpdateOutcome::Updated { previous: current, meeting })
            }
            WriteOutcome::Overlap(blocking) => Ok(UpdateOutcome::Conflict { window, blocking }),
        }
    }

    /// Deletes a meeting owned by `user_id` and returns what was removed.
    pub async fn cancel(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
    ) -> Result<Meeting, BookingError> {
        let meeting = self.owned_meeting(meeting_id, user_id).await?;
        let deleted = self.guarded("delete_meeting", self.ledger.delete_meeting(meeting_id)).await?;
        if !deleted {
            return Err(BookingError::meeting_not_found(meeting_id.to_string()));
        }

        info!(
            event_name = "booking.lifecycle.cancelled",
            meeting_id = %meeting.id,
            room_id = %meeting.room_id,
            user_id = %user_id,
            "meeting cancelled"
        );
        Ok(meeting)
    }

    /// Meetings of `user_id` that have not ended at `from`, earliest first.
    pub async fn upcoming_for_user(
        &self,
        user_id: &UserId,
        from: DateTime<Utc>,
        horizon_days: Option<i64>,
    ) -> Result<Vec<Meeting>, BookingError> {
        let until = match horizon_days.filter(|days| *days > 0) {
            Some(days) if days > MAX_HORIZON_DAYS => {
                return Err(BookingError::Validation(format!(
                    "horizon may cover at most {MAX_HORIZON_DAYS} days, got {days}"
                )))
            }
            Some(days) => Some(
                Duration::try_days(days)
                    .and_then(|span| from.checked_add_signed(span))
                    .ok_or_else(|| BookingError::Validation(format!("horizon of {days} days is out of range")))?,
            ),
            None => None,
        };
        let meetings =
            self.guarded("meetings_for_user", self.ledger.meetings_for_user(user_id, from)).await?;
        Ok(meetings
            .into_iter()
            .filter(|meeting| until.map_or(true, |limit| meeting.window.start() < limit))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{MeetingChanges, UpdateOutcome, MAX_HORIZON_DAYS};
    use crate::booking::testing::{book, engine_over, room, utc};
    use crate::domain::meeting::MeetingId;
    use crate::domain::room::RoomId;
    use crate::domain::user::UserId;
    use crate::errors::BookingError;
    use crate::store::{BookingLedger, InMemoryStore};

    const DAY: (i32, u32, u32) = (2025, 12, 15);

    fn store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::new(
            vec![room("r", "R", 4, "RDC", &[]), room("s", "S", 8, "1er", &[])],
            Vec::new(),
        ))
    }

    fn owner() -> UserId {
        UserId("owner".to_string())
    }

    #[tokio::test]
    async fn moving_a_meeting_over_its_own_slot_succeeds() {
        let store = store();
        let meeting = book(&store, "r", "owner", utc(DAY, 9, 0), 60).await;
        let engine = engine_over(store);

        let outcome = engine
            .update(
                &meeting.id,
                &owner(),
                MeetingChanges { start: Some(utc(DAY, 9, 30)), ..MeetingChanges::default() },
            )
            .await
            .expect("update");

        let UpdateOutcome::Updated { meeting: moved, previous } = outcome else {
            panic!("expected update, got {outcome:?}");
        };
        assert_eq!(previous.window.start(), utc(DAY, 9, 0));
        assert_eq!(moved.window.start(), utc(DAY, 9, 30));
        assert_eq!(moved.window.end(), utc(DAY, 10, 30));
    }

    #[tokio::test]
    async fn moving_onto_another_booking_conflicts() {
        let store = store();
        let meeting = book(&store, "r", "owner", utc(DAY, 9, 0), 60).await;
        book(&store, "s", "someone", utc(DAY, 9, 0), 120).await;
        let engine = engine_over(store);

        let outcome = engine
            .update(
                &meeting.id,
                &owner(),
                MeetingChanges { room_id: Some(RoomId("s".to_string())), ..MeetingChanges::default() },
            )
            .await
            .expect("update");
        assert!(matches!(outcome, UpdateOutcome::Conflict { ref blocking, .. } if blocking.len() == 1));
    }

    #[tokio::test]
    async fn other_users_cannot_update_or_cancel() {
        let store = store();
        let meeting = book(&store, "r", "owner", utc(DAY, 9, 0), 60).await;
        let engine = engine_over(store.clone());
        let intruder = UserId("intruder".to_string());

        let update = engine
            .update(
                &meeting.id,
                &intruder,
                MeetingChanges { title: Some("Hijacked".to_string()), ..MeetingChanges::default() },
            )
            .await;
        assert!(matches!(update, Err(BookingError::Unauthorized { .. })));

        let cancel = engine.cancel(&meeting.id, &intruder).await;
        assert!(matches!(cancel, Err(BookingError::Unauthorized { .. })));

        let untouched = store.find_meeting(&meeting.id).await.expect("find").expect("still there");
        assert_eq!(untouched.title, "Existing");
    }

    #[tokio::test]
    async fn title_only_change_keeps_the_window() {
        let store = store();
        let meeting = book(&store, "r", "owner", utc(DAY, 9, 0), 60).await;
        let engine = engine_over(store);

        let outcome = engine
            .update(
                &meeting.id,
                &owner(),
                MeetingChanges { title: Some("Retro".to_string()), ..MeetingChanges::default() },
            )
            .await
            .expect("update");
        let UpdateOutcome::Updated { meeting: updated, .. } = outcome else {
            panic!("expected update");
        };
        assert_eq!(updated.title, "Retro");
        assert_eq!(updated.window, meeting.window);
    }

    #[tokio::test]
    async fn invalid_change_sets_are_rejected() {
        let store = store();
        let meeting = book(&store, "r", "owner", utc(DAY, 9, 0), 60).await;
        let engine = engine_over(store);

        let empty = engine.update(&meeting.id, &owner(), MeetingChanges::default()).await;
        assert!(matches!(empty, Err(BookingError::Validation(_))));

        let both = engine
            .update(
                &meeting.id,
                &owner(),
                MeetingChanges {
                    end: Some(utc(DAY, 11, 0)),
                    duration_minutes: Some(30),
                    ..MeetingChanges::default()
                },
            )
            .await;
        assert!(matches!(both, Err(BookingError::Validation(_))));

        let inverted = engine
            .update(
                &meeting.id,
                &owner(),
                MeetingChanges { end: Some(utc(DAY, 8, 0)), ..MeetingChanges::default() },
            )
            .await;
        assert!(matches!(inverted, Err(BookingError::Validation(_))));
    }

    #[tokio::test]
    async fn cancel_removes_the_meeting_and_frees_the_room() {
        let store = store();
        let meeting = book(&store, "r", "owner", utc(DAY, 9, 0), 60).await;
        let engine = engine_over(store);

        let cancelled = engine.cancel(&meeting.id, &owner()).await.expect("cancel");
        assert_eq!(cancelled.id, meeting.id);
        assert!(!engine.has_conflict(&RoomId("r".to_string()), &meeting.window).await.expect("oracle"));

        let again = engine.cancel(&meeting.id, &owner()).await;
        assert!(matches!(again, Err(BookingError::NotFound { entity: "meeting", .. })));

        let unknown = engine.cancel(&MeetingId("nope".to_string()), &owner()).await;
        assert!(matches!(unknown, Err(BookingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn upcoming_meetings_are_sorted_and_bounded() {
        let store = store();
        book(&store, "r", "owner", utc(DAY, 14, 0), 60).await;
        book(&store, "s", "owner", utc(DAY, 9, 0), 60).await;
        book(&store, "r", "owner", utc((2025, 12, 30), 9, 0), 60).await;
        book(&store, "r", "owner", utc((2025, 12, 14), 9, 0), 60).await;
        book(&store, "s", "someone", utc(DAY, 11, 0), 60).await;
        let engine = engine_over(store);

        let upcoming =
            engine.upcoming_for_user(&owner(), utc(DAY, 0, 0), Some(7)).await.expect("upcoming");
        let starts: Vec<_> = upcoming.iter().map(|meeting| meeting.window.start()).collect();
        assert_eq!(starts, vec![utc(DAY, 9, 0), utc(DAY, 14, 0)]);
    }

    #[tokio::test]
    async fn oversized_durations_and_horizons_are_validation_errors() {
        let store = store();
        let meeting = book(&store, "r", "owner", utc(DAY, 9, 0), 60).await;
        let engine = engine_over(store);

        let huge = engine
            .update(
                &meeting.id,
                &owner(),
                MeetingChanges { duration_minutes: Some(i64::MAX), ..MeetingChanges::default() },
            )
            .await;
        assert!(matches!(huge, Err(BookingError::Validation(_))));

        for days in [MAX_HORIZON_DAYS + 1, i64::MAX] {
            let listing = engine.upcoming_for_user(&owner(), utc(DAY, 0, 0), Some(days)).await;
            assert!(matches!(listing, Err(BookingError::Validation(_))), "{days} days");
        }
        let year = engine
            .upcoming_for_user(&owner(), utc(DAY, 0, 0), Some(MAX_HORIZON_DAYS))
            .await
            .expect("a year ahead");
        assert_eq!(year.len(), 1);
    }
}

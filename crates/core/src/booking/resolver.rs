use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::catalog::SearchCriteria;
use super::scoring::{rank, ScoredRoom};
use super::BookingEngine;
use crate::domain::room::{Room, RoomId};
use crate::domain::window::TimeWindow;
use crate::errors::{BookingError, StoreError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotRequest {
    pub criteria: SearchCriteria,
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnavailableReason {
    Booked { busy_until: DateTime<Utc> },
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnavailableRoom {
    pub room: Room,
    #[serde(flatten)]
    pub reason: UnavailableReason,
}

/// Outcome of resolving one window. "Nothing matches" and "everything matching is
/// taken" are separate variants because the recovery differs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Found {
        window: TimeWindow,
        best: ScoredRoom,
        alternatives: Vec<ScoredRoom>,
        /// Candidates skipped because their conflict check failed.
        unverified: Vec<RoomId>,
    },
    /// No room in the inventory satisfies the structural criteria.
    NoMatchingRooms,
    /// Rooms matched, but every one of them is on the exclusion list.
    Exhausted { excluded: Vec<RoomId> },
    /// Rooms matched, none is free for the window.
    AllBusy { window: TimeWindow, unavailable: Vec<UnavailableRoom>, unverified: Vec<RoomId> },
}

impl Resolution {
    pub fn best(&self) -> Option<&ScoredRoom> {
        match self {
            Self::Found { best, .. } => Some(best),
            _ => None,
        }
    }
}

impl BookingEngine {
    /// Best conflict-free room for one window, with ranked alternatives.
    ///
    /// A candidate whose conflict check fails is skipped and logged; only when every
    /// checked candidate fails does the store error surface.
    pub async fn resolve(&self, request: &SlotRequest) -> Result<Resolution, BookingError> {
        let window = TimeWindow::from_duration(request.start, request.duration_minutes)?;
        let matched = self.filter_rooms(&request.criteria).await?;
        if matched.is_empty() {
            return Ok(Resolution::NoMatchingRooms);
        }

        let (excluded, candidates): (Vec<Room>, Vec<Room>) = matched
            .into_iter()
            .partition(|room| request.criteria.exclude_room_ids.contains(&room.id));
        if candidates.is_empty() {
            return Ok(Resolution::Exhausted {
                excluded: excluded.into_iter().map(|room| room.id).collect(),
            });
        }

        let mut free = Vec::new();
        let mut unavailable = Vec::new();
        let mut unverified = Vec::new();
        let mut last_failure: Option<StoreError> = None;
        let mut checked = 0usize;

        for room in candidates {
            if !self.policy.room_is_open(&room, &window) {
                debug!(
                    event_name = "booking.resolver.closed",
                    room_id = %room.id,
                    "candidate closed for the window"
                );
                unavailable.push(UnavailableRoom { room, reason: UnavailableReason::Closed });
                continue;
            }

            checked += 1;
            match self.conflicts(&room.id, &window, None).await {
                Ok(blocking) if blocking.is_empty() => free.push(room),
                Ok(blocking) => {
                    let busy_until = blocking
                        .iter()
                        .map(|meeting| meeting.window.end())
                        .max()
                        .unwrap_or_else(|| window.end());
                    unavailable.push(UnavailableRoom {
                        room,
                        reason: UnavailableReason::Booked { busy_until },
                    });
                }
                Err(error) => {
                    warn!(
                        event_name = "booking.resolver.candidate_unverified",
                        room_id = %room.id,
                        error = %error,
                        "conflict check failed, candidate skipped"
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

        let mut ranked = rank(free, &request.criteria, &self.weights).into_iter();
        let Some(best) = ranked.next() else {
            return Ok(Resolution::AllBusy { window, unavailable, unverified });
        };

        debug!(
            event_name = "booking.resolver.resolved",
            room_id = %best.room.id,
            score = best.score,
            "best room selected"
        );
        Ok(Resolution::Found { window, best, alternatives: ranked.collect(), unverified })
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::room::RoomId;
use crate::domain::user::UserId;
use crate::domain::window::TimeWindow;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MeetingId(pub String);

impl std::fmt::Display for MeetingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cancellation deletes the row, so every stored meeting is confirmed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Confirmed,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "confirmed" => Some(Self::Confirmed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: MeetingId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub title: String,
    pub window: TimeWindow,
    pub status: MeetingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    pub fn blocks(&self, window: &TimeWindow) -> bool {
        self.window.overlaps(window)
    }
}

/// Fields of a meeting before the store assigns its identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMeeting {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub title: String,
    pub window: TimeWindow,
}

//! Boundary contracts for the reservation store.
//!
//! The engine never caches what these return: every conflict decision is taken
//! against a fresh read, and writes carry their own overlap guard so a lost race
//! between check and insert still cannot produce a double booking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::meeting::{Meeting, MeetingId, NewMeeting};
use crate::domain::room::{Room, RoomId};
use crate::domain::user::{User, UserId};
use crate::domain::window::TimeWindow;
use crate::errors::StoreError;

pub mod memory;

pub use memory::InMemoryStore;

/// Result of a guarded write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(Meeting),
    /// The store refused the write because these confirmed meetings overlap it.
    Overlap(Vec<Meeting>),
}

#[async_trait]
pub trait RoomInventory: Send + Sync {
    async fn list_rooms(&self) -> Result<Vec<Room>, StoreError>;
    async fn get_room(&self, id: &RoomId) -> Result<Option<Room>, StoreError>;
}

#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// Confirmed meetings of `room_id` intersecting `window`.
    async fn overlapping_for_room(
        &self,
        room_id: &RoomId,
        window: &TimeWindow,
    ) -> Result<Vec<Meeting>, StoreError>;

    /// Confirmed meetings owned by `user_id` intersecting `window`.
    async fn overlapping_for_user(
        &self,
        user_id: &UserId,
        window: &TimeWindow,
    ) -> Result<Vec<Meeting>, StoreError>;

    /// Start of the earliest confirmed meeting of `room_id` starting at or after `after`.
    async fn next_start_after(
        &self,
        room_id: &RoomId,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn find_meeting(&self, id: &MeetingId) -> Result<Option<Meeting>, StoreError>;

    /// Meetings owned by `user_id` ending after `from`, earliest first.
    async fn meetings_for_user(
        &self,
        user_id: &UserId,
        from: DateTime<Utc>,
    ) -> Result<Vec<Meeting>, StoreError>;

    async fn insert_meeting(&self, meeting: NewMeeting) -> Result<WriteOutcome, StoreError>;

    /// Rewrites room, window and title of an existing meeting. The meeting's own
    /// previous row never counts as an overlap.
    async fn move_meeting(&self, meeting: Meeting) -> Result<WriteOutcome, StoreError>;

    async fn delete_meeting(&self, id: &MeetingId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, StoreError>;
    async fn members_of(&self, organization: &str) -> Result<Vec<User>, StoreError>;
}

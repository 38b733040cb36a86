//! Room-slot resolution and conflict avoidance.
//!
//! `BookingEngine` holds the store ports and the scheduling policy; each
//! component lives in its own module as an `impl BookingEngine` block. No
//! component caches store reads between calls.

pub mod catalog;
pub mod instant;
pub mod lifecycle;
pub mod oracle;
pub mod policy;
pub mod recurring;
pub mod resolver;
pub mod scoring;
pub mod team;
pub mod transaction;

use std::future::Future;
use std::sync::Arc;

use tracing::warn;

use crate::errors::StoreError;
use crate::store::{BookingLedger, Directory, RoomInventory};

pub use catalog::SearchCriteria;
pub use instant::{InstantLookup, InstantOption, InstantRequest};
pub use lifecycle::{MeetingChanges, UpdateOutcome};
pub use oracle::Availability;
pub use policy::SchedulingPolicy;
pub use recurring::{
    FailedOccurrence, OccurrenceFailure, RecurrencePattern, RecurringRequest, SeriesReport,
};
pub use resolver::{Resolution, SlotRequest, UnavailableReason, UnavailableRoom};
pub use scoring::{ScoreWeights, ScoredRoom};
pub use team::{MemberSelector, SlotRoom, TeamScan, TeamScanRequest, TeamSlot};
pub use transaction::{BookingRequest, CommitOutcome};

pub const DEFAULT_MEETING_TITLE: &str = "Meeting";

#[derive(Clone)]
pub struct BookingEngine {
    rooms: Arc<dyn RoomInventory>,
    ledger: Arc<dyn BookingLedger>,
    directory: Arc<dyn Directory>,
    policy: SchedulingPolicy,
    weights: ScoreWeights,
}

impl BookingEngine {
    pub fn new(
        rooms: Arc<dyn RoomInventory>,
        ledger: Arc<dyn BookingLedger>,
        directory: Arc<dyn Directory>,
        policy: SchedulingPolicy,
    ) -> Self {
        Self { rooms, ledger, directory, policy, weights: ScoreWeights::default() }
    }

    /// Builds an engine over a single store implementing every port.
    pub fn from_store<S>(store: Arc<S>, policy: SchedulingPolicy) -> Self
    where
        S: RoomInventory + BookingLedger + Directory + 'static,
    {
        Self::new(store.clone(), store.clone(), store, policy)
    }

    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn policy(&self) -> &SchedulingPolicy {
        &self.policy
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Runs one store round-trip under the configured timeout. An elapsed timer is
    /// a failure to verify, never an empty answer.
    pub(crate) async fn guarded<T, F>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.policy.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = self.policy.store_timeout_ms();
                warn!(
                    event_name = "booking.store.timeout",
                    operation,
                    timeout_ms,
                    "store call timed out"
                );
                Err(StoreError::Timeout { operation, timeout_ms })
            }
        }
    }
}

/// Normalises an optional meeting title.
pub(crate) fn meeting_title(title: Option<&str>) -> String {
    title
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_MEETING_TITLE.to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for engine tests.

    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, NaiveTime, TimeZone, Utc};

    use super::{BookingEngine, SchedulingPolicy};
    use crate::domain::meeting::{Meeting, MeetingId, NewMeeting};
    use crate::domain::room::{Room, RoomId};
    use crate::domain::user::{User, UserId};
    use crate::domain::window::TimeWindow;
    use crate::errors::StoreError;
    use crate::store::{BookingLedger, Directory, InMemoryStore, RoomInventory, WriteOutcome};

    pub fn utc(date: (i32, u32, u32), hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(date.0, date.1, date.2, hour, minute, 0).single().expect("instant")
    }

    pub fn room(id: &str, name: &str, capacity: u32, location: &str, equipment: &[&str]) -> Room {
        Room {
            id: RoomId(id.to_string()),
            name: name.to_string(),
            capacity,
            location: location.to_string(),
            equipment: equipment.iter().map(|tag| tag.to_string()).collect(),
            opens_at: NaiveTime::from_hms_opt(7, 0, 0).expect("time"),
            closes_at: NaiveTime::from_hms_opt(21, 0, 0).expect("time"),
            active: true,
        }
    }

    pub fn user(id: &str, organization: Option<&str>) -> User {
        User {
            id: UserId(id.to_string()),
            display_name: id.to_uppercase(),
            organization: organization.map(str::to_string),
        }
    }

    /// UTC policy so fixture instants read as wall-clock times.
    pub fn utc_policy() -> SchedulingPolicy {
        SchedulingPolicy::default().with_timezone(chrono_tz::UTC)
    }

    pub fn engine_over(store: Arc<InMemoryStore>) -> BookingEngine {
        BookingEngine::from_store(store, utc_policy())
    }

    pub async fn book(
        store: &InMemoryStore,
        room_id: &str,
        user_id: &str,
        start: DateTime<Utc>,
        minutes: i64,
    ) -> Meeting {
        let outcome = store
            .insert_meeting(NewMeeting {
                room_id: RoomId(room_id.to_string()),
                user_id: UserId(user_id.to_string()),
                title: "Existing".to_string(),
                window: TimeWindow::from_duration(start, minutes).expect("window"),
            })
            .await
            .expect("insert");
        match outcome {
            WriteOutcome::Written(meeting) => meeting,
            WriteOutcome::Overlap(_) => panic!("fixture booking overlaps"),
        }
    }

    /// Store wrapper whose ledger reads fail for selected rooms, users or window
    /// starts, or hang.
    pub struct FlakyStore {
        pub inner: InMemoryStore,
        pub failing_rooms: BTreeSet<RoomId>,
        pub failing_room_starts: BTreeSet<DateTime<Utc>>,
        pub failing_users: BTreeSet<UserId>,
        pub hang: AtomicBool,
    }

    impl FlakyStore {
        pub fn new(inner: InMemoryStore) -> Self {
            Self {
                inner,
                failing_rooms: BTreeSet::new(),
                failing_room_starts: BTreeSet::new(),
                failing_users: BTreeSet::new(),
                hang: AtomicBool::new(false),
            }
        }

        async fn maybe_hang(&self) {
            if self.hang.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
    }

    #[async_trait]
    impl RoomInventory for FlakyStore {
        async fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
            self.inner.list_rooms().await
        }

        async fn get_room(&self, id: &RoomId) -> Result<Option<Room>, StoreError> {
            self.inner.get_room(id).await
        }
    }

    #[async_trait]
    impl BookingLedger for FlakyStore {
        async fn overlapping_for_room(
            &self,
            room_id: &RoomId,
            window: &TimeWindow,
        ) -> Result<Vec<Meeting>, StoreError> {
            self.maybe_hang().await;
            if self.failing_rooms.contains(room_id) || self.failing_room_starts.contains(&window.start()) {
                return Err(StoreError::Backend(format!("disk error reading {room_id}")));
            }
            self.inner.overlapping_for_room(room_id, window).await
        }

        async fn overlapping_for_user(
            &self,
            user_id: &UserId,
            window: &TimeWindow,
        ) -> Result<Vec<Meeting>, StoreError> {
            self.maybe_hang().await;
            if self.failing_users.contains(user_id) {
                return Err(StoreError::Backend(format!("calendar of {user_id} unreadable")));
            }
            self.inner.overlapping_for_user(user_id, window).await
        }

        async fn next_start_after(
            &self,
            room_id: &RoomId,
            after: DateTime<Utc>,
        ) -> Result<Option<DateTime<Utc>>, StoreError> {
            self.inner.next_start_after(room_id, after).await
        }

        async fn find_meeting(&self, id: &MeetingId) -> Result<Option<Meeting>, StoreError> {
            self.inner.find_meeting(id).await
        }

        async fn meetings_for_user(
            &self,
            user_id: &UserId,
            from: DateTime<Utc>,
        ) -> Result<Vec<Meeting>, StoreError> {
            self.inner.meetings_for_user(user_id, from).await
        }

        async fn insert_meeting(&self, meeting: NewMeeting) -> Result<WriteOutcome, StoreError> {
            self.inner.insert_meeting(meeting).await
        }

        async fn move_meeting(&self, meeting: Meeting) -> Result<WriteOutcome, StoreError> {
            self.inner.move_meeting(meeting).await
        }

        async fn delete_meeting(&self, id: &MeetingId) -> Result<bool, StoreError> {
            self.inner.delete_meeting(id).await
        }
    }

    #[async_trait]
    impl Directory for FlakyStore {
        async fn find_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
            self.inner.find_user(id).await
        }

        async fn members_of(&self, organization: &str) -> Result<Vec<User>, StoreError> {
            self.inner.members_of(organization).await
        }
    }
}

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::meeting::{Meeting, MeetingId, MeetingStatus, NewMeeting};
use crate::domain::room::{Room, RoomId};
use crate::domain::user::{User, UserId};
use crate::domain::window::TimeWindow;
use crate::errors::StoreError;

use super::{BookingLedger, Directory, RoomInventory, WriteOutcome};

#[derive(Default)]
struct Ledger {
    meetings: BTreeMap<MeetingId, Meeting>,
    next_sequence: u64,
}

/// Process-local store. Writes are checked for overlap under the write lock,
/// which gives the same exclusion guarantee the SQL store gets from its triggers.
#[derive(Default)]
pub struct InMemoryStore {
    rooms: RwLock<BTreeMap<RoomId, Room>>,
    users: RwLock<BTreeMap<UserId, User>>,
    ledger: RwLock<Ledger>,
}

impl InMemoryStore {
    pub fn new(rooms: Vec<Room>, users: Vec<User>) -> Self {
        Self {
            rooms: RwLock::new(rooms.into_iter().map(|room| (room.id.clone(), room)).collect()),
            users: RwLock::new(users.into_iter().map(|user| (user.id.clone(), user)).collect()),
            ledger: RwLock::new(Ledger::default()),
        }
    }

    pub async fn save_room(&self, room: Room) {
        self.rooms.write().await.insert(room.id.clone(), room);
    }

    pub async fn save_user(&self, user: User) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    pub async fn meeting_count(&self) -> usize {
        self.ledger.read().await.meetings.len()
    }
}

fn blocking<'a>(
    meetings: impl Iterator<Item = &'a Meeting>,
    room_id: &RoomId,
    window: &TimeWindow,
    ignore: Option<&MeetingId>,
) -> Vec<Meeting> {
    meetings
        .filter(|meeting| &meeting.room_id == room_id && meeting.blocks(window))
        .filter(|meeting| Some(&meeting.id) != ignore)
        .cloned()
        .collect()
}

#[async_trait]
impl RoomInventory for InMemoryStore {
    async fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        Ok(self.rooms.read().await.values().cloned().collect())
    }

    async fn get_room(&self, id: &RoomId) -> Result<Option<Room>, StoreError> {
        Ok(self.rooms.read().await.get(id).cloned())
    }
}

#[async_trait]
impl BookingLedger for InMemoryStore {
    async fn overlapping_for_room(
        &self,
        room_id: &RoomId,
        window: &TimeWindow,
    ) -> Result<Vec<Meeting>, StoreError> {
        let ledger = self.ledger.read().await;
        Ok(blocking(ledger.meetings.values(), room_id, window, None))
    }

    async fn overlapping_for_user(
        &self,
        user_id: &UserId,
        window: &TimeWindow,
    ) -> Result<Vec<Meeting>, StoreError> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .meetings
            .values()
            .filter(|meeting| &meeting.user_id == user_id && meeting.blocks(window))
            .cloned()
            .collect())
    }

    async fn next_start_after(
        &self,
        room_id: &RoomId,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .meetings
            .values()
            .filter(|meeting| {
                &meeting.room_id == room_id && meeting.window.start() >= after
            })
            .map(|meeting| meeting.window.start())
            .min())
    }

    async fn find_meeting(&self, id: &MeetingId) -> Result<Option<Meeting>, StoreError> {
        Ok(self.ledger.read().await.meetings.get(id).cloned())
    }

    async fn meetings_for_user(
        &self,
        user_id: &UserId,
        from: DateTime<Utc>,
    ) -> Result<Vec<Meeting>, StoreError> {
        let ledger = self.ledger.read().await;
        let mut meetings: Vec<Meeting> = ledger
            .meetings
            .values()
            .filter(|meeting| &meeting.user_id == user_id && meeting.window.end() > from)
            .cloned()
            .collect();
        meetings.sort_by(|a, b| a.window.start().cmp(&b.window.start()).then(a.id.cmp(&b.id)));
        Ok(meetings)
    }

    async fn insert_meeting(&self, meeting: NewMeeting) -> Result<WriteOutcome, StoreError> {
        let mut ledger = self.ledger.write().await;
        let overlapping = blocking(ledger.meetings.values(), &meeting.room_id, &meeting.window, None);
        if !overlapping.is_empty() {
            return Ok(WriteOutcome::Overlap(overlapping));
        }

        ledger.next_sequence += 1;
        let now = Utc::now();
        let stored = Meeting {
            id: MeetingId(format!("mtg-{:04}", ledger.next_sequence)),
            room_id: meeting.room_id,
            user_id: meeting.user_id,
            title: meeting.title,
            window: meeting.window,
            status: MeetingStatus::Confirmed,
            created_at: now,
            updated_at: now,
        };
        ledger.meetings.insert(stored.id.clone(), stored.clone());
        Ok(WriteOutcome::Written(stored))
    }

    async fn move_meeting(&self, meeting: Meeting) -> Result<WriteOutcome, StoreError> {
        let mut ledger = self.ledger.write().await;
        if !ledger.meetings.contains_key(&meeting.id) {
            return Err(StoreError::Backend(format!("meeting `{}` vanished during update", meeting.id)));
        }

        let overlapping = blocking(
            ledger.meetings.values(),
            &meeting.room_id,
            &meeting.window,
            Some(&meeting.id),
        );
        if !overlapping.is_empty() {
            return Ok(WriteOutcome::Overlap(overlapping));
        }

        let stored = Meeting { updated_at: Utc::now(), ..meeting };
        ledger.meetings.insert(stored.id.clone(), stored.clone());
        Ok(WriteOutcome::Written(stored))
    }

    async fn delete_meeting(&self, id: &MeetingId) -> Result<bool, StoreError> {
        Ok(self.ledger.write().await.meetings.remove(id).is_some())
    }
}

#[async_trait]
impl Directory for InMemoryStore {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn members_of(&self, organization: &str) -> Result<Vec<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|user| user.belongs_to(organization))
            .cloned()
            .collect())
    }
}

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BookingEngine;
use crate::domain::room::{Room, RoomId};
use crate::errors::BookingError;

/// Minimum length of a request word that may match on its own inside an owned tag.
const EQUIPMENT_WORD_MIN_CHARS: usize = 4;

/// Structural room criteria. Time plays no part here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default)]
    pub min_capacity: Option<u32>,
    #[serde(default)]
    pub max_capacity: Option<u32>,
    #[serde(default)]
    pub equipment: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub exclude_room_ids: BTreeSet<RoomId>,
}

impl SearchCriteria {
    pub fn with_capacity(min_capacity: u32) -> Self {
        Self { min_capacity: Some(min_capacity), ..Self::default() }
    }

    pub fn validate(&self) -> Result<(), BookingError> {
        if let (Some(min), Some(max)) = (self.min_capacity, self.max_capacity) {
            if min > max {
                return Err(BookingError::Validation(format!(
                    "minimum capacity {min} is above maximum capacity {max}"
                )));
            }
        }
        if self.max_capacity == Some(0) {
            return Err(BookingError::Validation("maximum capacity must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn name_filter(&self) -> Option<String> {
        normalized(self.name.as_deref())
    }

    pub fn location_filter(&self) -> Option<String> {
        normalized(self.location.as_deref())
    }

    pub fn equipment_filter(&self) -> Vec<String> {
        self.equipment.iter().filter_map(|tag| normalized(Some(tag))).collect()
    }

    /// Structural match of one room.
    pub fn matches(&self, room: &Room) -> bool {
        if !room.active {
            return false;
        }
        if self.min_capacity.is_some_and(|min| room.capacity < min) {
            return false;
        }
        if self.max_capacity.is_some_and(|max| room.capacity > max) {
            return false;
        }
        if let Some(name) = self.name_filter() {
            if !room.name.to_lowercase().contains(&name) {
                return false;
            }
        }
        if let Some(location) = self.location_filter() {
            if !room.location.to_lowercase().contains(&location) {
                return false;
            }
        }
        self.equipment_filter().iter().all(|requested| equipment_matches(&room.equipment, requested))
    }
}

fn normalized(value: Option<&str>) -> Option<String> {
    value.map(|raw| raw.trim().to_lowercase()).filter(|value| !value.is_empty())
}

/// Case-insensitive tolerant tag match: either tag contains the other, or a
/// significant word of the request appears in an owned tag.
pub fn equipment_matches(owned: &[String], requested: &str) -> bool {
    let requested = requested.trim().to_lowercase();
    if requested.is_empty() {
        return true;
    }

    let words: Vec<&str> = requested
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| word.chars().count() >= EQUIPMENT_WORD_MIN_CHARS)
        .collect();

    owned.iter().any(|tag| {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            return false;
        }
        tag.contains(&requested)
            || requested.contains(&tag)
            || words.iter().any(|word| tag.contains(word))
    })
}

/// Filters an inventory snapshot, ordered by room id.
pub fn filter_rooms(rooms: Vec<Room>, criteria: &SearchCriteria) -> Vec<Room> {
    let mut matched: Vec<Room> = rooms.into_iter().filter(|room| criteria.matches(room)).collect();
    matched.sort_by(|left, right| left.id.cmp(&right.id));
    matched
}

impl BookingEngine {
    /// Rooms satisfying `criteria`, read fresh from the inventory. An empty list is a
    /// normal answer.
    pub async fn filter_rooms(&self, criteria: &SearchCriteria) -> Result<Vec<Room>, BookingError> {
        criteria.validate()?;
        let rooms = self.guarded("list_rooms", self.rooms.list_rooms()).await?;
        let total = rooms.len();
        let matched = filter_rooms(rooms, criteria);

        debug!(
            event_name = "booking.catalog.filtered",
            inventory = total,
            matched = matched.len(),
            "catalog filter applied"
        );
        Ok(matched)
    }
}

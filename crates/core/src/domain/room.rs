use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub capacity: u32,
    pub location: String,
    pub equipment: Vec<String>,
    pub opens_at: NaiveTime,
    pub closes_at: NaiveTime,
    pub active: bool,
}

impl Room {
    /// Opening hours are half-open on the closing side: a meeting may end exactly at `closes_at`.
    pub fn is_open_between(&self, start: NaiveTime, end: NaiveTime) -> bool {
        start >= self.opens_at && end <= self.closes_at && start < end
    }

    pub fn equipment_label(&self) -> String {
        if self.equipment.is_empty() {
            "none".to_string()
        } else {
            self.equipment.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::{Room, RoomId};

    fn room() -> Room {
        Room {
            id: RoomId("room-aquarium".to_string()),
            name: "Aquarium".to_string(),
            capacity: 6,
            location: "1st floor".to_string(),
            equipment: vec!["screen".to_string(), "wifi".to_string()],
            opens_at: NaiveTime::from_hms_opt(8, 0, 0).expect("valid time"),
            closes_at: NaiveTime::from_hms_opt(20, 0, 0).expect("valid time"),
            active: true,
        }
    }

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
    }

    #[test]
    fn meeting_may_end_exactly_at_closing_time() {
        assert!(room().is_open_between(at(19, 0), at(20, 0)));
        assert!(!room().is_open_between(at(19, 30), at(20, 30)));
    }

    #[test]
    fn meeting_before_opening_is_rejected() {
        assert!(!room().is_open_between(at(7, 30), at(8, 30)));
    }

    #[test]
    fn window_wrapping_past_midnight_is_rejected() {
        assert!(!room().is_open_between(at(19, 0), at(1, 0)));
    }
}

//! Relevance ranking of conflict-free candidates.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::catalog::{equipment_matches, SearchCriteria};
use crate::domain::room::Room;

/// Integer weights so equal inputs always produce equal scores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Points per requested equipment tag the room owns (dominant term).
    pub equipment_per_tag: i64,
    /// Points for a room whose capacity equals the requested minimum.
    pub capacity_fit: i64,
    /// Points lost per seat above the requested minimum.
    pub capacity_penalty_per_seat: i64,
    /// Ceiling on the oversize penalty.
    pub capacity_penalty_cap: i64,
    pub name_match: i64,
    pub location_match: i64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            equipment_per_tag: 100,
            capacity_fit: 50,
            capacity_penalty_per_seat: 5,
            capacity_penalty_cap: 60,
            name_match: 30,
            location_match: 20,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScoredRoom {
    pub room: Room,
    pub score: i64,
}

pub fn score(room: &Room, criteria: &SearchCriteria, weights: &ScoreWeights) -> i64 {
    let matched_tags = criteria
        .equipment_filter()
        .iter()
        .filter(|requested| equipment_matches(&room.equipment, requested))
        .count() as i64;
    let mut total = matched_tags * weights.equipment_per_tag;

    if let Some(min) = criteria.min_capacity {
        let surplus = i64::from(room.capacity) - i64::from(min);
        if surplus >= 0 {
            let penalty =
                (surplus * weights.capacity_penalty_per_seat).min(weights.capacity_penalty_cap);
            total += weights.capacity_fit - penalty;
        }
    }

    if criteria.name_filter().is_some_and(|name| room.name.to_lowercase().contains(&name)) {
        total += weights.name_match;
    }
    if criteria
        .location_filter()
        .is_some_and(|location| room.location.to_lowercase().contains(&location))
    {
        total += weights.location_match;
    }

    total
}

/// Descending by score, then ascending by room id.
pub fn rank(rooms: Vec<Room>, criteria: &SearchCriteria, weights: &ScoreWeights) -> Vec<ScoredRoom> {
    let mut scored: Vec<ScoredRoom> = rooms
        .into_iter()
        .map(|room| {
            let score = score(&room, criteria, weights);
            ScoredRoom { room, score }
        })
        .collect();
    scored.sort_by(compare);
    scored
}

fn compare(left: &ScoredRoom, right: &ScoredRoom) -> Ordering {
    right.score.cmp(&left.score).then_with(|| left.room.id.cmp(&right.room.id))
}

#[cfg(test)]
mod tests {
    use super::{rank, score, ScoreWeights};
    use crate::booking::catalog::SearchCriteria;
    use crate::booking::testing::room;

    #[test]
    fn equipment_dominates_capacity_fit() {
        let weights = ScoreWeights::default();
        let criteria = SearchCriteria {
            min_capacity: Some(4),
            equipment: vec!["visio".to_string()],
            ..SearchCriteria::default()
        };
        let equipped_but_large = room("b", "B", 20, "", &["visio"]);
        let snug_without_equipment = room("a", "A", 4, "", &[]);

        assert!(score(&equipped_but_large, &criteria, &weights) > score(&snug_without_equipment, &criteria, &weights));
    }

    #[test]
    fn oversized_rooms_score_below_snug_rooms() {
        let weights = ScoreWeights::default();
        let criteria = SearchCriteria::with_capacity(2);

        let snug = score(&room("a", "A", 2, "", &[]), &criteria, &weights);
        let slightly_bigger = score(&room("b", "B", 4, "", &[]), &criteria, &weights);
        let hall = score(&room("c", "C", 20, "", &[]), &criteria, &weights);

        assert_eq!(snug, 50);
        assert_eq!(slightly_bigger, 40);
        assert_eq!(hall, -10);
    }

    #[test]
    fn name_and_location_break_ties() {
        let weights = ScoreWeights::default();
        let criteria = SearchCriteria {
            name: Some("agora".to_string()),
            location: Some("rdc".to_string()),
            ..SearchCriteria::default()
        };
        assert_eq!(score(&room("a", "Agora", 12, "RDC", &[]), &criteria, &weights), 50);
    }

    #[test]
    fn ranking_is_stable_on_equal_scores() {
        let weights = ScoreWeights::default();
        let criteria = SearchCriteria::with_capacity(4);
        let rooms = vec![
            room("room-c", "C", 4, "", &[]),
            room("room-a", "A", 4, "", &[]),
            room("room-b", "B", 6, "", &[]),
        ];

        for offset in 0..rooms.len() {
            let mut shuffled = rooms.clone();
            shuffled.rotate_left(offset);
            let order: Vec<String> =
                rank(shuffled, &criteria, &weights).into_iter().map(|scored| scored.room.id.0).collect();
            assert_eq!(order, vec!["room-a", "room-c", "room-b"]);
        }
    }
}

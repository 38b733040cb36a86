//! Read-only tools. None of them writes to the ledger, so guests may use them.

use async_trait::async_trait;
use chrono::NaiveDate;
use roomwise_core::booking::{
    Availability, InstantRequest, MemberSelector, Resolution, SearchCriteria, SlotRequest, SlotRoom,
    TeamScanRequest, TeamSlot, UnavailableReason,
};
use roomwise_core::domain::room::RoomId;
use roomwise_core::domain::user::UserId;
use serde::Deserialize;
use serde_json::Value;

use super::{parse_input, parse_instant, Tool, ToolContext, ToolError};
use crate::guardrails::ToolAccess;
use crate::render::{busy_windows, opening_hours, plural, room_details, room_line, room_lines};
use crate::reply::{ToolOutcome, ToolReply};

pub struct SearchCatalog;

#[async_trait]
impl Tool for SearchCatalog {
    fn name(&self) -> &'static str {
        "search_catalog"
    }

    fn description(&self) -> &'static str {
        "List rooms matching capacity, equipment, location or name, without checking any time window."
    }

    fn access(&self) -> ToolAccess {
        ToolAccess::ReadOnly
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<ToolReply, ToolError> {
        let criteria: SearchCriteria = parse_input(input)?;
        let rooms = ctx.engine.filter_rooms(&criteria).await?;

        if rooms.is_empty() {
            return Ok(ToolReply::with_data(
                ToolOutcome::NotFound,
                "No room matches those criteria.",
                &rooms,
            ));
        }
        let summary = format!(
            "{} matching your criteria:\n{}",
            plural(rooms.len(), "room", "rooms"),
            room_lines(&rooms)
        );
        Ok(ToolReply::with_data(ToolOutcome::Found, summary, &rooms))
    }
}

#[derive(Debug, Deserialize)]
struct SlotInput {
    start: String,
    duration_minutes: i64,
    #[serde(flatten)]
    criteria: SearchCriteria,
}

pub struct FindRooms;

#[async_trait]
impl Tool for FindRooms {
    fn name(&self) -> &'static str {
        "find_rooms"
    }

    fn description(&self) -> &'static str {
        "Find the best free room for a start time and duration. Pass exclude_room_ids to ask for another room."
    }

    fn access(&self) -> ToolAccess {
        ToolAccess::ReadOnly
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<ToolReply, ToolError> {
        let input: SlotInput = parse_input(input)?;
        let start = parse_instant(ctx.policy(), &input.start)?;
        let resolution = ctx
            .engine
            .resolve(&SlotRequest {
                criteria: input.criteria,
                start,
                duration_minutes: input.duration_minutes,
            })
            .await?;

        let policy = ctx.policy();
        let (outcome, summary) = match &resolution {
            Resolution::Found { window, best, alternatives, .. } => {
                let mut summary = format!(
                    "**{}** is free on {}.\n{}",
                    best.room.name,
                    policy.window_label(window),
                    room_line(&best.room)
                );
                if !alternatives.is_empty() {
                    summary.push_str("\n\nOther free rooms:\n");
                    summary.push_str(&room_lines(alternatives.iter().map(|scored| &scored.room)));
                }
                (ToolOutcome::Found, summary)
            }
            Resolution::NoMatchingRooms => {
                (ToolOutcome::NotFound, "No room matches those criteria.".to_string())
            }
            Resolution::Exhausted { excluded } => (
                ToolOutcome::NotFound,
                format!(
                    "There is no other room matching those criteria ({} already set aside).",
                    plural(excluded.len(), "room", "rooms")
                ),
            ),
            Resolution::AllBusy { window, unavailable, .. } => {
                let lines = unavailable
                    .iter()
                    .map(|entry| match &entry.reason {
                        UnavailableReason::Booked { busy_until } => format!(
                            "{} (busy until {})",
                            room_line(&entry.room),
                            policy.time_label(*busy_until)
                        ),
                        UnavailableReason::Closed => format!(
                            "{} (open {})",
                            room_line(&entry.room),
                            opening_hours(&entry.room)
                        ),
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                (
                    ToolOutcome::Unavailable,
                    format!(
                        "Every matching room is taken on {}:\n{lines}",
                        policy.window_label(window)
                    ),
                )
            }
        };
        Ok(ToolReply::with_data(outcome, summary, &resolution))
    }
}

#[derive(Debug, Deserialize)]
struct RoomSlotInput {
    room_id: RoomId,
    start: String,
    duration_minutes: i64,
}

pub struct CheckAvailability;

#[async_trait]
impl Tool for CheckAvailability {
    fn name(&self) -> &'static str {
        "check_availability"
    }

    fn description(&self) -> &'static str {
        "Check whether one room is free for a start time and duration."
    }

    fn access(&self) -> ToolAccess {
        ToolAccess::ReadOnly
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<ToolReply, ToolError> {
        let input: RoomSlotInput = parse_input(input)?;
        let start = parse_instant(ctx.policy(), &input.start)?;
        let availability =
            ctx.engine.check_availability(&input.room_id, start, input.duration_minutes).await?;

        let policy = ctx.policy();
        let (outcome, summary) = match &availability {
            Availability::Free { room, window } => (
                ToolOutcome::Found,
                format!("**{}** is free on {}.", room.name, policy.window_label(window)),
            ),
            Availability::Booked { room, window, blocking } => (
                ToolOutcome::Conflict,
                format!(
                    "**{}** is already booked on {}:\n{}",
                    room.name,
                    policy.window_label(window),
                    busy_windows(policy, blocking)
                ),
            ),
            Availability::Closed { room, window } => (
                ToolOutcome::Unavailable,
                format!(
                    "**{}** is closed on {}. It is open {}.",
                    room.name,
                    policy.window_label(window),
                    opening_hours(room)
                ),
            ),
        };
        Ok(ToolReply::with_data(outcome, summary, &availability))
    }
}

/// Re-checks the room right before showing it, so a proposal is never stale.
pub struct ProposeRoom;

#[async_trait]
impl Tool for ProposeRoom {
    fn name(&self) -> &'static str {
        "propose_room"
    }

    fn description(&self) -> &'static str {
        "Show the full details of a free room and ask the user to confirm the booking."
    }

    fn access(&self) -> ToolAccess {
        ToolAccess::ReadOnly
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<ToolReply, ToolError> {
        let input: RoomSlotInput = parse_input(input)?;
        let start = parse_instant(ctx.policy(), &input.start)?;
        let availability =
            ctx.engine.check_availability(&input.room_id, start, input.duration_minutes).await?;

        let policy = ctx.policy();
        let (outcome, summary) = match &availability {
            Availability::Free { room, window } => (
                ToolOutcome::Found,
                format!("{}\n\nShall I book this room?", room_details(policy, room, window)),
            ),
            Availability::Booked { room, blocking, .. } => (
                ToolOutcome::Conflict,
                format!(
                    "**{}** was booked in the meantime:\n{}\nShall I look for another room?",
                    room.name,
                    busy_windows(policy, blocking)
                ),
            ),
            Availability::Closed { room, .. } => (
                ToolOutcome::Unavailable,
                format!("**{}** is only open {}.", room.name, opening_hours(room)),
            ),
        };
        Ok(ToolReply::with_data(outcome, summary, &availability))
    }
}

#[derive(Debug, Deserialize)]
struct NowInput {
    duration_minutes: i64,
    #[serde(flatten)]
    criteria: SearchCriteria,
}

pub struct FindRoomNow;

#[async_trait]
impl Tool for FindRoomNow {
    fn name(&self) -> &'static str {
        "find_room_now"
    }

    fn description(&self) -> &'static str {
        "Find rooms free right now for the given duration, with how long each stays free."
    }

    fn access(&self) -> ToolAccess {
        ToolAccess::ReadOnly
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<ToolReply, ToolError> {
        let input: NowInput = parse_input(input)?;
        let lookup = ctx
            .engine
            .find_room_now(&InstantRequest {
                now: ctx.session.now,
                duration_minutes: input.duration_minutes,
                criteria: input.criteria,
            })
            .await?;

        let policy = ctx.policy();
        if lookup.options.is_empty() {
            let summary = if lookup.matched_rooms == 0 {
                "No room matches those criteria.".to_string()
            } else {
                format!(
                    "None of the {} is free from {} for {} minutes.",
                    plural(lookup.matched_rooms, "matching room", "matching rooms"),
                    policy.time_label(lookup.start),
                    input.duration_minutes
                )
            };
            let outcome = if lookup.matched_rooms == 0 {
                ToolOutcome::NotFound
            } else {
                ToolOutcome::Unavailable
            };
            return Ok(ToolReply::with_data(outcome, summary, &lookup));
        }

        let lines = lookup
            .options
            .iter()
            .map(|option| {
                format!(
                    "{} (free until {}, {} min)",
                    room_line(&option.room),
                    policy.time_label(option.free_until),
                    option.free_minutes
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let summary = format!("Free from {}:\n{lines}", policy.time_label(lookup.start));
        Ok(ToolReply::with_data(ToolOutcome::Found, summary, &lookup))
    }
}

fn full_availability() -> f64 {
    100.0
}

#[derive(Debug, Deserialize)]
struct TeamInput {
    #[serde(default)]
    organization: Option<String>,
    #[serde(default)]
    user_ids: Vec<UserId>,
    from: NaiveDate,
    to: NaiveDate,
    duration_minutes: i64,
    #[serde(default = "full_availability")]
    min_availability_percent: f64,
    #[serde(default)]
    equipment: Vec<String>,
    #[serde(default)]
    team_size: Option<u32>,
}

impl TeamInput {
    fn selector(&self) -> Result<MemberSelector, ToolError> {
        match (&self.organization, self.user_ids.is_empty()) {
            (Some(organization), true) => Ok(MemberSelector::Organization(organization.clone())),
            (None, false) => Ok(MemberSelector::Users(self.user_ids.clone())),
            (Some(_), false) => Err(ToolError::InvalidInput(
                "give either an organization or a list of user_ids, not both".to_string(),
            )),
            (None, true) => Err(ToolError::InvalidInput(
                "give an organization or a list of user_ids to scan".to_string(),
            )),
        }
    }
}

pub struct FindTeamSlots;

#[async_trait]
impl Tool for FindTeamSlots {
    fn name(&self) -> &'static str {
        "find_team_slots"
    }

    fn description(&self) -> &'static str {
        "Find business-hours slots where enough team members are free, each paired with a free room."
    }

    fn access(&self) -> ToolAccess {
        ToolAccess::ReadOnly
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<ToolReply, ToolError> {
        let input: TeamInput = parse_input(input)?;
        let members = input.selector()?;
        let scan = ctx
            .engine
            .scan_team(&TeamScanRequest {
                members,
                from: input.from,
                to: input.to,
                duration_minutes: input.duration_minutes,
                min_availability_percent: input.min_availability_percent,
                equipment: input.equipment,
                team_size_hint: input.team_size,
            })
            .await?;

        if scan.slots.is_empty() {
            let summary = format!(
                "No slot between {} and {} reaches {}% availability for a team of {}.",
                input.from.format("%d/%m/%Y"),
                input.to.format("%d/%m/%Y"),
                input.min_availability_percent,
                scan.member_count
            );
            return Ok(ToolReply::with_data(ToolOutcome::Unavailable, summary, &scan));
        }

        let lines = scan.slots.iter().map(team_slot_line).collect::<Vec<_>>().join("\n");
        let mut summary = format!(
            "Best slots for a team of {}:\n{lines}",
            scan.member_count
        );
        if scan.assumed_team_size {
            summary.push_str("\n(team size assumed from your request)");
        }
        let unverified = scan.slots.iter().filter(|slot| slot.room.is_unverified()).count();
        if unverified > 0 {
            summary.push_str(&format!(
                "\nRooms could not be checked for {}; ask again before booking.",
                plural(unverified, "slot", "slots")
            ));
        }
        if !scan.unreadable_members.is_empty() {
            summary.push_str(&format!(
                "\n{} could not be read and {} counted as busy.",
                plural(scan.unreadable_members.len(), "calendar", "calendars"),
                if scan.unreadable_members.len() == 1 { "is" } else { "are" }
            ));
        }
        Ok(ToolReply::with_data(ToolOutcome::Found, summary, &scan))
    }
}

fn team_slot_line(slot: &TeamSlot) -> String {
    let room = match &slot.room {
        SlotRoom::Found { room } => format!("**{}** ({} seats)", room.room.name, room.room.capacity),
        SlotRoom::NoneFree => "no free room".to_string(),
        SlotRoom::Unverified { .. } => "room availability unknown".to_string(),
    };
    format!(
        "• {} {} {} • {:.0}% available • {}",
        slot.day_name, slot.date_label, slot.time_label, slot.availability_percent, room
    )
}

#[cfg(test)]
mod tests {
    use roomwise_core::booking::{BookingRequest, SlotRoom, TeamSlot};
    use roomwise_core::domain::room::RoomId;
    use roomwise_core::domain::user::UserId;
    use roomwise_core::domain::window::TimeWindow;
    use serde_json::json;

    use crate::reply::ToolOutcome;
    use super::team_slot_line;
    use crate::tools::testing::{engine, paris, registry_for};

    async fn book(engine: &roomwise_core::booking::BookingEngine, room: &str, hour: u32) {
        engine
            .commit(BookingRequest {
                room_id: RoomId(room.to_string()),
                start: paris(hour, 0),
                duration_minutes: 60,
                user_id: UserId("user-bruno".to_string()),
                title: None,
            })
            .await
            .expect("seed booking");
    }

    #[tokio::test]
    async fn catalog_search_lists_rooms_in_bullet_layout() {
        let engine = engine();
        let reply = registry_for(&engine, None)
            .invoke("search_catalog", json!({ "min_capacity": 5 }))
            .await;

        assert_eq!(reply.outcome, ToolOutcome::Found);
        assert!(reply.summary.starts_with("2 rooms"));
        assert!(reply.summary.contains("• **Aquarium** • 6 seats • RDC"));
        assert!(!reply.summary.contains("Cabine"));
    }

    #[tokio::test]
    async fn find_rooms_skips_excluded_rooms() {
        let engine = engine();
        let registry = registry_for(&engine, None);
        let first = registry
            .invoke(
                "find_rooms",
                json!({ "start": "2025-12-15T14:00", "duration_minutes": 60, "min_capacity": 5 }),
            )
            .await;
        assert_eq!(first.outcome, ToolOutcome::Found);
        let best = first.data["best"]["room"]["id"].as_str().expect("best room").to_string();

        let second = registry
            .invoke(
                "find_rooms",
                json!({
                    "start": "2025-12-15T14:00",
                    "duration_minutes": 60,
                    "min_capacity": 5,
                    "exclude_room_ids": [best.clone()],
                }),
            )
            .await;
        assert_eq!(second.outcome, ToolOutcome::Found);
        assert_ne!(second.data["best"]["room"]["id"], best.as_str());
    }

    #[tokio::test]
    async fn find_rooms_requires_a_duration() {
        let engine = engine();
        let reply = registry_for(&engine, None)
            .invoke("find_rooms", json!({ "start": "2025-12-15T14:00" }))
            .await;
        assert_eq!(reply.outcome, ToolOutcome::Invalid);
    }

    #[tokio::test]
    async fn busy_room_reports_conflict_with_local_times() {
        let engine = engine();
        book(&engine, "room-jupiter", 10).await;

        let reply = registry_for(&engine, None)
            .invoke(
                "check_availability",
                json!({ "room_id": "room-jupiter", "start": "2025-12-15T10:30", "duration_minutes": 30 }),
            )
            .await;
        assert_eq!(reply.outcome, ToolOutcome::Conflict);
        assert!(reply.summary.contains("booked 10:00 to 11:00"));

        // The half-open window ending at 11:00 does not block 11:00.
        let after = registry_for(&engine, None)
            .invoke(
                "check_availability",
                json!({ "room_id": "room-jupiter", "start": "2025-12-15T11:00", "duration_minutes": 30 }),
            )
            .await;
        assert_eq!(after.outcome, ToolOutcome::Found);
    }

    #[tokio::test]
    async fn unknown_room_is_not_found() {
        let engine = engine();
        let reply = registry_for(&engine, None)
            .invoke(
                "check_availability",
                json!({ "room_id": "room-ghost", "start": "2025-12-15T10:00", "duration_minutes": 30 }),
            )
            .await;
        assert_eq!(reply.outcome, ToolOutcome::NotFound);
    }

    #[tokio::test]
    async fn proposal_shows_details_and_asks_for_confirmation() {
        let engine = engine();
        let reply = registry_for(&engine, None)
            .invoke(
                "propose_room",
                json!({ "room_id": "room-aquarium", "start": "2025-12-15T14:00", "duration_minutes": 45 }),
            )
            .await;

        assert_eq!(reply.outcome, ToolOutcome::Found);
        assert!(reply.summary.contains("Date: 15/12/2025"));
        assert!(reply.summary.contains("Time: 14:00 to 14:45 (45 min)"));
        assert!(reply.summary.ends_with("Shall I book this room?"));
    }

    #[tokio::test]
    async fn proposal_outside_opening_hours_is_unavailable() {
        let engine = engine();
        let reply = registry_for(&engine, None)
            .invoke(
                "propose_room",
                json!({ "room_id": "room-aquarium", "start": "2025-12-15T19:30", "duration_minutes": 60 }),
            )
            .await;
        assert_eq!(reply.outcome, ToolOutcome::Unavailable);
        assert!(reply.summary.contains("08:00-20:00"));
    }

    #[tokio::test]
    async fn room_now_starts_at_the_next_tick() {
        let engine = engine();
        // Sessions in tests are pinned to 09:02 Paris time.
        let reply = registry_for(&engine, None)
            .invoke("find_room_now", json!({ "duration_minutes": 30, "min_capacity": 8 }))
            .await;

        assert_eq!(reply.outcome, ToolOutcome::Found);
        assert!(reply.summary.starts_with("Free from 09:05"));
        assert!(reply.summary.contains("Jupiter"));
    }

    #[tokio::test]
    async fn team_slots_pair_each_slot_with_a_room() {
        let engine = engine();
        let reply = registry_for(&engine, None)
            .invoke(
                "find_team_slots",
                json!({
                    "organization": "acme",
                    "from": "2025-12-15",
                    "to": "2025-12-15",
                    "duration_minutes": 60,
                }),
            )
            .await;

        assert_eq!(reply.outcome, ToolOutcome::Found, "{}", reply.summary);
        assert_eq!(reply.data["member_count"], 2);
        assert!(reply.summary.contains("100% available"));
    }

    #[tokio::test]
    async fn team_slots_need_a_member_selection() {
        let engine = engine();
        let reply = registry_for(&engine, None)
            .invoke(
                "find_team_slots",
                json!({ "from": "2025-12-15", "to": "2025-12-15", "duration_minutes": 60 }),
            )
            .await;
        assert_eq!(reply.outcome, ToolOutcome::Invalid);
    }

    #[tokio::test]
    async fn out_of_range_durations_are_invalid_input() {
        let engine = engine();
        let registry = registry_for(&engine, None);

        let find = registry
            .invoke(
                "find_rooms",
                json!({ "start": "2025-12-15T14:00", "duration_minutes": 9_000_000_000_000_000_000i64 }),
            )
            .await;
        assert_eq!(find.outcome, ToolOutcome::Invalid, "{}", find.summary);

        let check = registry
            .invoke(
                "check_availability",
                json!({
                    "room_id": "room-aquarium",
                    "start": "2025-12-15T14:00",
                    "duration_minutes": 100_000_000_000_000i64,
                }),
            )
            .await;
        assert_eq!(check.outcome, ToolOutcome::Invalid, "{}", check.summary);

        let team = registry
            .invoke(
                "find_team_slots",
                json!({
                    "organization": "acme",
                    "from": "2025-12-15",
                    "to": "2025-12-15",
                    "duration_minutes": i64::MAX,
                }),
            )
            .await;
        assert_eq!(team.outcome, ToolOutcome::Invalid, "{}", team.summary);
    }

    #[test]
    fn team_slot_lines_tell_unknown_rooms_from_busy_ones() {
        let window = TimeWindow::from_duration(paris(10, 0), 60).expect("window");
        let mut slot = TeamSlot {
            window,
            day_name: "Monday".to_string(),
            date_label: "15/12/2025".to_string(),
            time_label: "10:00".to_string(),
            member_count: 2,
            unavailable_count: 0,
            unavailable_members: Vec::new(),
            availability_percent: 100.0,
            room: SlotRoom::NoneFree,
            bookable: false,
        };
        assert!(team_slot_line(&slot).ends_with("no free room"));

        slot.room = SlotRoom::Unverified { error: "disk error".to_string() };
        assert!(team_slot_line(&slot).ends_with("room availability unknown"));
    }
}

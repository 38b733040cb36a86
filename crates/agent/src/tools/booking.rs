//! Tools that change the ledger. Each needs a signed-in user; ownership checks
//! happen in the engine.

use async_trait::async_trait;
use roomwise_core::booking::{
    BookingRequest, CommitOutcome, MeetingChanges, OccurrenceFailure, RecurrencePattern,
    RecurringRequest, UpdateOutcome,
};
use roomwise_core::domain::meeting::MeetingId;
use roomwise_core::domain::room::RoomId;
use serde::Deserialize;
use serde_json::Value;

use super::{parse_input, parse_instant, Tool, ToolContext, ToolError};
use crate::guardrails::ToolAccess;
use crate::render::{busy_windows, meeting_line, opening_hours, plural};
use crate::reply::{ToolOutcome, ToolReply};

#[derive(Debug, Deserialize)]
struct CreateInput {
    room_id: RoomId,
    start: String,
    duration_minutes: i64,
    #[serde(default)]
    title: Option<String>,
}

pub struct CreateMeeting;

#[async_trait]
impl Tool for CreateMeeting {
    fn name(&self) -> &'static str {
        "create_meeting"
    }

    fn description(&self) -> &'static str {
        "Book a room for the signed-in user. The room is re-checked at booking time."
    }

    fn access(&self) -> ToolAccess {
        ToolAccess::Write
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<ToolReply, ToolError> {
        let user_id = ctx.user()?.clone();
        let input: CreateInput = parse_input(input)?;
        let start = parse_instant(ctx.policy(), &input.start)?;
        let outcome = ctx
            .engine
            .commit(BookingRequest {
                room_id: input.room_id,
                start,
                duration_minutes: input.duration_minutes,
                user_id,
                title: input.title,
            })
            .await?;

        let policy = ctx.policy();
        let (tag, summary) = match &outcome {
            CommitOutcome::Booked { room, meeting } => (
                ToolOutcome::Done,
                format!(
                    "Booked **{}** for \"{}\" on {}. Reference: {}.",
                    room.name,
                    meeting.title,
                    policy.window_label(&meeting.window),
                    meeting.id
                ),
            ),
            CommitOutcome::Conflict { room, window, blocking } => (
                ToolOutcome::Conflict,
                format!(
                    "**{}** is no longer free on {}:\n{}\nShall I look for another room?",
                    room.name,
                    policy.window_label(window),
                    busy_windows(policy, blocking)
                ),
            ),
            CommitOutcome::OutsideOpeningHours { room, window, .. } => (
                ToolOutcome::Unavailable,
                format!(
                    "**{}** cannot be booked on {}: it is open {}.",
                    room.name,
                    policy.window_label(window),
                    opening_hours(room)
                ),
            ),
        };
        Ok(ToolReply::with_data(tag, summary, &outcome))
    }
}

#[derive(Debug, Deserialize)]
struct RecurringInput {
    room_id: RoomId,
    start: String,
    duration_minutes: i64,
    pattern: RecurrencePattern,
    occurrences: u32,
    #[serde(default)]
    title: Option<String>,
}

pub struct CreateRecurringMeeting;

#[async_trait]
impl Tool for CreateRecurringMeeting {
    fn name(&self) -> &'static str {
        "create_recurring_meeting"
    }

    fn description(&self) -> &'static str {
        "Book a daily, weekly, biweekly or monthly series in one room. Occurrences that cannot be booked are reported, the rest are kept."
    }

    fn access(&self) -> ToolAccess {
        ToolAccess::Write
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<ToolReply, ToolError> {
        let user_id = ctx.user()?.clone();
        let input: RecurringInput = parse_input(input)?;
        let first_start = parse_instant(ctx.policy(), &input.start)?;
        let report = ctx
            .engine
            .book_series(&RecurringRequest {
                room_id: input.room_id,
                first_start,
                duration_minutes: input.duration_minutes,
                pattern: input.pattern,
                occurrences: input.occurrences,
                user_id,
                title: input.title,
            })
            .await?;

        let policy = ctx.policy();
        let attempted = report.created.len() + report.failed.len();
        let mut summary = format!(
            "Booked {} of {} ({}).",
            report.created.len(),
            plural(attempted, "occurrence", "occurrences"),
            report.pattern.as_str()
        );
        if let Some(cap) = report.capped_at {
            summary.push_str(&format!(
                " You asked for {}; a series is limited to {cap}.",
                report.requested
            ));
        }
        for failure in &report.failed {
            let reason = match &failure.reason {
                OccurrenceFailure::Conflict { .. } => "already booked",
                OccurrenceFailure::Closed => "room closed",
                OccurrenceFailure::StoreUnavailable { .. } => "could not be checked",
            };
            summary.push_str(&format!("\n• {} • {reason}", policy.window_label(&failure.window)));
        }

        let outcome = if !report.created.is_empty() {
            ToolOutcome::Done
        } else if report
            .failed
            .iter()
            .all(|failure| matches!(failure.reason, OccurrenceFailure::StoreUnavailable { .. }))
        {
            ToolOutcome::Error
        } else if report
            .failed
            .iter()
            .any(|failure| matches!(failure.reason, OccurrenceFailure::Conflict { .. }))
        {
            ToolOutcome::Conflict
        } else {
            ToolOutcome::Unavailable
        };
        Ok(ToolReply::with_data(outcome, summary, &report))
    }
}

#[derive(Debug, Deserialize)]
struct UpdateInput {
    meeting_id: MeetingId,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    duration_minutes: Option<i64>,
    #[serde(default)]
    room_id: Option<RoomId>,
    #[serde(default)]
    title: Option<String>,
}

pub struct UpdateMeeting;

#[async_trait]
impl Tool for UpdateMeeting {
    fn name(&self) -> &'static str {
        "update_meeting"
    }

    fn description(&self) -> &'static str {
        "Move, resize, rename or change the room of one of the user's meetings."
    }

    fn access(&self) -> ToolAccess {
        ToolAccess::Write
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<ToolReply, ToolError> {
        let user_id = ctx.user()?.clone();
        let input: UpdateInput = parse_input(input)?;
        let policy = ctx.policy();
        let changes = MeetingChanges {
            start: input.start.as_deref().map(|raw| parse_instant(policy, raw)).transpose()?,
            end: input.end.as_deref().map(|raw| parse_instant(policy, raw)).transpose()?,
            duration_minutes: input.duration_minutes,
            room_id: input.room_id,
            title: input.title,
        };
        let outcome = ctx.engine.update(&input.meeting_id, &user_id, changes).await?;

        let (tag, summary) = match &outcome {
            UpdateOutcome::Updated { meeting, .. } => {
                (ToolOutcome::Done, format!("Updated:\n{}", meeting_line(policy, meeting)))
            }
            UpdateOutcome::Conflict { window, blocking } => (
                ToolOutcome::Conflict,
                format!(
                    "The meeting was not changed: {} overlaps\n{}",
                    policy.window_label(window),
                    busy_windows(policy, blocking)
                ),
            ),
            UpdateOutcome::OutsideOpeningHours { room, window } => (
                ToolOutcome::Unavailable,
                format!(
                    "The meeting was not changed: **{}** is open {}, not {}.",
                    room.name,
                    opening_hours(room),
                    policy.window_label(window)
                ),
            ),
        };
        Ok(ToolReply::with_data(tag, summary, &outcome))
    }
}

#[derive(Debug, Deserialize)]
struct CancelInput {
    meeting_id: MeetingId,
}

pub struct CancelMeeting;

#[async_trait]
impl Tool for CancelMeeting {
    fn name(&self) -> &'static str {
        "cancel_meeting"
    }

    fn description(&self) -> &'static str {
        "Cancel one of the user's meetings."
    }

    fn access(&self) -> ToolAccess {
        ToolAccess::Write
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<ToolReply, ToolError> {
        let user_id = ctx.user()?.clone();
        let input: CancelInput = parse_input(input)?;
        let meeting = ctx.engine.cancel(&input.meeting_id, &user_id).await?;
        let summary = format!("Cancelled:\n{}", meeting_line(ctx.policy(), &meeting));
        Ok(ToolReply::with_data(ToolOutcome::Done, summary, &meeting))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListInput {
    #[serde(default)]
    horizon_days: Option<i64>,
}

pub struct ListMyMeetings;

#[async_trait]
impl Tool for ListMyMeetings {
    fn name(&self) -> &'static str {
        "list_my_meetings"
    }

    fn description(&self) -> &'static str {
        "List the signed-in user's upcoming meetings, earliest first."
    }

    fn access(&self) -> ToolAccess {
        ToolAccess::Write
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<ToolReply, ToolError> {
        let user_id = ctx.user()?.clone();
        let input: ListInput = parse_input(input)?;
        let meetings =
            ctx.engine.upcoming_for_user(&user_id, ctx.session.now, input.horizon_days).await?;

        if meetings.is_empty() {
            return Ok(ToolReply::with_data(
                ToolOutcome::NotFound,
                "You have no upcoming meetings.",
                &meetings,
            ));
        }
        let policy = ctx.policy();
        let lines =
            meetings.iter().map(|meeting| meeting_line(policy, meeting)).collect::<Vec<_>>().join("\n");
        let summary =
            format!("You have {}:\n{lines}", plural(meetings.len(), "upcoming meeting", "upcoming meetings"));
        Ok(ToolReply::with_data(ToolOutcome::Found, summary, &meetings))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::reply::ToolOutcome;
    use crate::tools::testing::{engine, registry_for};

    fn booking(start: &str) -> serde_json::Value {
        json!({
            "room_id": "room-aquarium",
            "start": start,
            "duration_minutes": 60,
            "title": "Revue de sprint",
        })
    }

    #[tokio::test]
    async fn booking_then_rebooking_the_same_slot_conflicts() {
        let engine = engine();
        let alice = registry_for(&engine, Some("user-alice"));
        let bruno = registry_for(&engine, Some("user-bruno"));

        let first = alice.invoke("create_meeting", booking("2025-12-15T14:00")).await;
        assert_eq!(first.outcome, ToolOutcome::Done, "{}", first.summary);
        assert!(first.summary.contains("**Aquarium**"));
        assert!(first.summary.contains("15/12/2025 14:00-15:00"));

        let second = bruno.invoke("create_meeting", booking("2025-12-15T14:30")).await;
        assert_eq!(second.outcome, ToolOutcome::Conflict);
        assert!(second.summary.contains("booked 14:00 to 15:00"));

        let adjacent = bruno.invoke("create_meeting", booking("2025-12-15T15:00")).await;
        assert_eq!(adjacent.outcome, ToolOutcome::Done);
    }

    #[tokio::test]
    async fn booking_after_closing_time_is_unavailable() {
        let engine = engine();
        let reply = registry_for(&engine, Some("user-alice"))
            .invoke("create_meeting", booking("2025-12-15T19:30"))
            .await;
        assert_eq!(reply.outcome, ToolOutcome::Unavailable);
    }

    #[tokio::test]
    async fn recurring_series_reports_each_failed_occurrence() {
        let engine = engine();
        let bruno = registry_for(&engine, Some("user-bruno"));
        // Occupy the second weekly occurrence.
        bruno.invoke("create_meeting", booking("2025-12-22T14:00")).await;

        let reply = registry_for(&engine, Some("user-alice"))
            .invoke(
                "create_recurring_meeting",
                json!({
                    "room_id": "room-aquarium",
                    "start": "2025-12-15T14:00",
                    "duration_minutes": 60,
                    "pattern": "weekly",
                    "occurrences": 3,
                }),
            )
            .await;

        assert_eq!(reply.outcome, ToolOutcome::Done, "{}", reply.summary);
        assert!(reply.summary.starts_with("Booked 2 of 3 occurrences (weekly)."));
        assert!(reply.summary.contains("22/12/2025 14:00-15:00 • already booked"));
    }

    #[tokio::test]
    async fn only_the_owner_can_update_or_cancel() {
        let engine = engine();
        let alice = registry_for(&engine, Some("user-alice"));
        let bruno = registry_for(&engine, Some("user-bruno"));

        let created = alice.invoke("create_meeting", booking("2025-12-15T10:00")).await;
        let meeting_id = created.data["meeting"]["id"].as_str().expect("meeting id").to_string();

        let hijack = bruno.invoke("cancel_meeting", json!({ "meeting_id": meeting_id })).await;
        assert_eq!(hijack.outcome, ToolOutcome::Forbidden);

        let moved = alice
            .invoke(
                "update_meeting",
                json!({ "meeting_id": meeting_id, "start": "2025-12-15T11:00", "title": "Point produit" }),
            )
            .await;
        assert_eq!(moved.outcome, ToolOutcome::Done, "{}", moved.summary);
        assert!(moved.summary.contains("15/12/2025 11:00-12:00"));
        assert!(moved.summary.contains("Point produit"));

        let cancelled = alice.invoke("cancel_meeting", json!({ "meeting_id": meeting_id })).await;
        assert_eq!(cancelled.outcome, ToolOutcome::Done);

        let again = alice.invoke("cancel_meeting", json!({ "meeting_id": meeting_id })).await;
        assert_eq!(again.outcome, ToolOutcome::NotFound);
    }

    #[tokio::test]
    async fn upcoming_meetings_are_listed_earliest_first() {
        let engine = engine();
        let alice = registry_for(&engine, Some("user-alice"));

        let empty = alice.invoke("list_my_meetings", serde_json::Value::Null).await;
        assert_eq!(empty.outcome, ToolOutcome::NotFound);

        alice.invoke("create_meeting", booking("2025-12-15T16:00")).await;
        alice.invoke("create_meeting", booking("2025-12-15T11:00")).await;

        let listed = alice.invoke("list_my_meetings", json!({})).await;
        assert_eq!(listed.outcome, ToolOutcome::Found);
        assert!(listed.summary.starts_with("You have 2 upcoming meetings:"));
        let eleven = listed.summary.find("11:00-12:00").expect("11:00 meeting");
        let sixteen = listed.summary.find("16:00-17:00").expect("16:00 meeting");
        assert!(eleven < sixteen);
    }
}

//! Human-readable fragments shared by the tool summaries. Every date and time is
//! shown in the policy's time zone.

use roomwise_core::booking::SchedulingPolicy;
use roomwise_core::domain::meeting::Meeting;
use roomwise_core::domain::room::Room;
use roomwise_core::domain::window::TimeWindow;

pub fn room_line(room: &Room) -> String {
    format!("• **{}** • {} seats • {}", room.name, room.capacity, room.location)
}

pub fn room_lines<'a>(rooms: impl IntoIterator<Item = &'a Room>) -> String {
    rooms.into_iter().map(room_line).collect::<Vec<_>>().join("\n")
}

pub fn plural(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

/// Full room card used when proposing a room.
pub fn room_details(policy: &SchedulingPolicy, room: &Room, window: &TimeWindow) -> String {
    format!(
        "**{}**\n\nDate: {}\nTime: {} to {} ({} min)\nLocation: {}\nCapacity: {} people\nEquipment: {}",
        room.name,
        policy.date_label(window.start()),
        policy.time_label(window.start()),
        policy.time_label(window.end()),
        window.duration_minutes(),
        room.location,
        room.capacity,
        room.equipment_label(),
    )
}

pub fn opening_hours(room: &Room) -> String {
    format!("{}-{}", room.opens_at.format("%H:%M"), room.closes_at.format("%H:%M"))
}

pub fn meeting_line(policy: &SchedulingPolicy, meeting: &Meeting) -> String {
    format!(
        "• **{}** • {} • room {} • ref {}",
        meeting.title,
        policy.window_label(&meeting.window),
        meeting.room_id,
        meeting.id
    )
}

pub fn busy_windows(policy: &SchedulingPolicy, meetings: &[Meeting]) -> String {
    meetings
        .iter()
        .map(|meeting| {
            format!(
                "• booked {} to {}",
                policy.time_label(meeting.window.start()),
                policy.time_label(meeting.window.end())
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

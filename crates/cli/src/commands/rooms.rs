use roomwise_core::domain::room::Room;
use roomwise_db::SqlRoomInventory;

use crate::commands::{open_pool, prepare, CommandResult, EXIT_EXECUTION};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("rooms") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let rooms = SqlRoomInventory::new(pool.clone())
            .find_all()
            .await
            .map_err(|error| ("inventory_read", error.to_string(), EXIT_EXECUTION));
        pool.close().await;
        rooms
    });

    match result {
        Ok(rooms) if rooms.is_empty() => {
            CommandResult::success("rooms", "no rooms in inventory (run `roomwise seed` for demo data)")
        }
        Ok(rooms) => CommandResult::success("rooms", render_rooms(&rooms)),
        Err(failure) => CommandResult::from_step("rooms", failure),
    }
}

fn render_rooms(rooms: &[Room]) -> String {
    let mut lines = vec![format!("{} rooms:", rooms.len())];
    lines.extend(rooms.iter().map(|room| {
        format!(
            "- {} {} ({} seats, {}, {}-{}{}): {}",
            room.id,
            room.name,
            room.capacity,
            room.location,
            room.opens_at.format("%H:%M"),
            room.closes_at.format("%H:%M"),
            if room.active { "" } else { ", inactive" },
            room.equipment_label()
        )
    }));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use roomwise_core::domain::room::{Room, RoomId};

    use super::render_rooms;

    fn cabine(active: bool) -> Room {
        Room {
            id: RoomId("room-cabine".to_string()),
            name: "Cabine".to_string(),
            capacity: 2,
            location: "RDC".to_string(),
            equipment: vec!["téléphone".to_string()],
            opens_at: "08:00:00".parse().expect("time"),
            closes_at: "20:00:00".parse().expect("time"),
            active,
        }
    }

    #[test]
    fn rooms_render_one_line_each() {
        let rendered = render_rooms(&[cabine(true), cabine(false)]);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "2 rooms:");
        assert_eq!(lines[1], "- room-cabine Cabine (2 seats, RDC, 08:00-20:00): téléphone");
        assert!(lines[2].contains(", inactive)"));
    }
}

use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};

use roomwise_core::domain::room::{Room, RoomId};
use roomwise_core::errors::StoreError;
use roomwise_core::store::RoomInventory;

use super::{format_time_of_day, parse_time_of_day, RepositoryError};
use crate::DbPool;

pub struct SqlRoomInventory {
    pool: DbPool,
}

impl SqlRoomInventory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_all(&self) -> Result<Vec<Room>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, capacity, location, equipment_json, opens_at, closes_at, active
             FROM room
             ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(room_from_row).collect()
    }

    pub async fn find_by_id(&self, id: &RoomId) -> Result<Option<Room>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, capacity, location, equipment_json, opens_at, closes_at, active
             FROM room
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(room_from_row).transpose()
    }

    pub async fn save(&self, room: &Room) -> Result<(), RepositoryError> {
        let equipment_json = serde_json::to_string(&room.equipment)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO room (id, name, capacity, location, equipment_json, opens_at, closes_at, active)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                capacity = excluded.capacity,
                location = excluded.location,
                equipment_json = excluded.equipment_json,
                opens_at = excluded.opens_at,
                closes_at = excluded.closes_at,
                active = excluded.active",
        )
        .bind(&room.id.0)
        .bind(&room.name)
        .bind(i64::from(room.capacity))
        .bind(&room.location)
        .bind(equipment_json)
        .bind(format_time_of_day(room.opens_at))
        .bind(format_time_of_day(room.closes_at))
        .bind(room.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RoomInventory for SqlRoomInventory {
    async fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        Ok(self.find_all().await?)
    }

    async fn get_room(&self, id: &RoomId) -> Result<Option<Room>, StoreError> {
        Ok(self.find_by_id(id).await?)
    }
}

fn room_from_row(row: SqliteRow) -> Result<Room, RepositoryError> {
    let capacity_raw = row.try_get::<i64, _>("capacity")?;
    let capacity = u32::try_from(capacity_raw)
        .map_err(|_| RepositoryError::Decode(format!("invalid room capacity `{capacity_raw}`")))?;
    let equipment_json = row.try_get::<String, _>("equipment_json")?;
    let equipment: Vec<String> = serde_json::from_str(&equipment_json)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(Room {
        id: RoomId(row.try_get("id")?),
        name: row.try_get("name")?,
        capacity,
        location: row.try_get("location")?,
        equipment,
        opens_at: parse_time_of_day("opens_at", row.try_get("opens_at")?)?,
        closes_at: parse_time_of_day("closes_at", row.try_get("closes_at")?)?,
        active: row.try_get("active")?,
    })
}

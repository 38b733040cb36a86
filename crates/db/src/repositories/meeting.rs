use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;

use roomwise_core::domain::meeting::{Meeting, MeetingId, MeetingStatus, NewMeeting};
use roomwise_core::domain::room::RoomId;
use roomwise_core::domain::user::UserId;
use roomwise_core::domain::window::TimeWindow;
use roomwise_core::errors::StoreError;
use roomwise_core::store::{BookingLedger, WriteOutcome};

use super::{format_instant, parse_instant, RepositoryError};
use crate::DbPool;

/// Message raised by the overlap triggers in the baseline migration.
const OVERLAP_TRIGGER_MESSAGE: &str = "meeting overlaps an existing booking";

const MEETING_COLUMNS: &str =
    "id, room_id, user_id, title, start_at, end_at, status, created_at, updated_at";

pub struct SqlBookingLedger {
    pool: DbPool,
}

impl SqlBookingLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn blocking_for_room(
        &self,
        room_id: &RoomId,
        window: &TimeWindow,
        ignore: Option<&MeetingId>,
    ) -> Result<Vec<Meeting>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {MEETING_COLUMNS}
             FROM meeting
             WHERE room_id = ?
               AND start_at < ?
               AND end_at > ?
               AND id <> ?
             ORDER BY start_at ASC, id ASC"
        ))
        .bind(&room_id.0)
        .bind(format_instant(window.end()))
        .bind(format_instant(window.start()))
        .bind(ignore.map(|id| id.0.as_str()).unwrap_or(""))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(meeting_from_row).collect()
    }

    async fn try_insert(&self, meeting: &Meeting) -> Result<bool, RepositoryError> {
        let written = sqlx::query(
            "INSERT INTO meeting (id, room_id, user_id, title, start_at, end_at, status, created_at, updated_at)
             SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?
             WHERE NOT EXISTS (
                SELECT 1 FROM meeting existing
                WHERE existing.room_id = ?
                  AND existing.start_at < ?
                  AND existing.end_at > ?
             )",
        )
        .bind(&meeting.id.0)
        .bind(&meeting.room_id.0)
        .bind(&meeting.user_id.0)
        .bind(&meeting.title)
        .bind(format_instant(meeting.window.start()))
        .bind(format_instant(meeting.window.end()))
        .bind(meeting.status.as_str())
        .bind(format_instant(meeting.created_at))
        .bind(format_instant(meeting.updated_at))
        .bind(&meeting.room_id.0)
        .bind(format_instant(meeting.window.end()))
        .bind(format_instant(meeting.window.start()))
        .execute(&self.pool)
        .await;

        settle_guarded_write(written)
    }

    async fn try_move(&self, meeting: &Meeting) -> Result<bool, RepositoryError> {
        let written = sqlx::query(
            "UPDATE meeting
             SET room_id = ?, title = ?, start_at = ?, end_at = ?, updated_at = ?
             WHERE id = ?
               AND NOT EXISTS (
                SELECT 1 FROM meeting existing
                WHERE existing.id <> ?
                  AND existing.room_id = ?
                  AND existing.start_at < ?
                  AND existing.end_at > ?
               )",
        )
        .bind(&meeting.room_id.0)
        .bind(&meeting.title)
        .bind(format_instant(meeting.window.start()))
        .bind(format_instant(meeting.window.end()))
        .bind(format_instant(meeting.updated_at))
        .bind(&meeting.id.0)
        .bind(&meeting.id.0)
        .bind(&meeting.room_id.0)
        .bind(format_instant(meeting.window.end()))
        .bind(format_instant(meeting.window.start()))
        .execute(&self.pool)
        .await;

        settle_guarded_write(written)
    }

    async fn exists(&self, id: &MeetingId) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM meeting WHERE id = ?")
            .bind(&id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("count")? > 0)
    }
}

/// `Ok(false)` when the conditional write matched nothing or a trigger refused it.
fn settle_guarded_write(
    result: Result<sqlx::sqlite::SqliteQueryResult, sqlx::Error>,
) -> Result<bool, RepositoryError> {
    match result {
        Ok(done) => Ok(done.rows_affected() > 0),
        Err(sqlx::Error::Database(error)) if error.message().contains(OVERLAP_TRIGGER_MESSAGE) => {
            Ok(false)
        }
        Err(error) => Err(error.into()),
    }
}

#[async_trait]
impl BookingLedger for SqlBookingLedger {
    async fn overlapping_for_room(
        &self,
        room_id: &RoomId,
        window: &TimeWindow,
    ) -> Result<Vec<Meeting>, StoreError> {
        Ok(self.blocking_for_room(room_id, window, None).await?)
    }

    async fn overlapping_for_user(
        &self,
        user_id: &UserId,
        window: &TimeWindow,
    ) -> Result<Vec<Meeting>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {MEETING_COLUMNS}
             FROM meeting
             WHERE user_id = ?
               AND start_at < ?
               AND end_at > ?
             ORDER BY start_at ASC, id ASC"
        ))
        .bind(&user_id.0)
        .bind(format_instant(window.end()))
        .bind(format_instant(window.start()))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(meeting_from_row).collect::<Result<Vec<_>, RepositoryError>>()?)
    }

    async fn next_start_after(
        &self,
        room_id: &RoomId,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row = sqlx::query(
            "SELECT MIN(start_at) AS next_start
             FROM meeting
             WHERE room_id = ? AND start_at >= ?",
        )
        .bind(&room_id.0)
        .bind(format_instant(after))
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let next = row.try_get::<Option<String>, _>("next_start").map_err(RepositoryError::from)?;
        Ok(next.map(|value| parse_instant("start_at", value)).transpose()?)
    }

    async fn find_meeting(&self, id: &MeetingId) -> Result<Option<Meeting>, StoreError> {
        let row = sqlx::query(&format!("SELECT {MEETING_COLUMNS} FROM meeting WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.map(meeting_from_row).transpose()?)
    }

    async fn meetings_for_user(
        &self,
        user_id: &UserId,
        from: DateTime<Utc>,
    ) -> Result<Vec<Meeting>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {MEETING_COLUMNS}
             FROM meeting
             WHERE user_id = ? AND end_at > ?
             ORDER BY start_at ASC, id ASC"
        ))
        .bind(&user_id.0)
        .bind(format_instant(from))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(meeting_from_row).collect::<Result<Vec<_>, RepositoryError>>()?)
    }

    async fn insert_meeting(&self, meeting: NewMeeting) -> Result<WriteOutcome, StoreError> {
        let now = Utc::now();
        let stored = Meeting {
            id: MeetingId(format!("mtg-{}", uuid::Uuid::new_v4())),
            room_id: meeting.room_id,
            user_id: meeting.user_id,
            title: meeting.title,
            window: meeting.window,
            status: MeetingStatus::Confirmed,
            created_at: now,
            updated_at: now,
        };

        if self.try_insert(&stored).await? {
            debug!(
                event_name = "booking.store.meeting_inserted",
                meeting_id = %stored.id,
                room_id = %stored.room_id,
                "meeting row written"
            );
            // Read back so the returned instants carry the stored precision.
            let reloaded = self.find_meeting(&stored.id).await?;
            return Ok(WriteOutcome::Written(reloaded.unwrap_or(stored)));
        }

        let blocking = self.blocking_for_room(&stored.room_id, &stored.window, None).await?;
        Ok(WriteOutcome::Overlap(blocking))
    }

    async fn move_meeting(&self, meeting: Meeting) -> Result<WriteOutcome, StoreError> {
        let moved = Meeting { updated_at: Utc::now(), ..meeting };
        if self.try_move(&moved).await? {
            let reloaded = self.find_meeting(&moved.id).await?;
            return Ok(WriteOutcome::Written(reloaded.unwrap_or(moved)));
        }

        if !self.exists(&moved.id).await? {
            return Err(StoreError::Backend(format!("meeting `{}` vanished during update", moved.id)));
        }
        let blocking = self.blocking_for_room(&moved.room_id, &moved.window, Some(&moved.id)).await?;
        Ok(WriteOutcome::Overlap(blocking))
    }

    async fn delete_meeting(&self, id: &MeetingId) -> Result<bool, StoreError> {
        let done = sqlx::query("DELETE FROM meeting WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(done.rows_affected() > 0)
    }
}

fn meeting_from_row(row: SqliteRow) -> Result<Meeting, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = MeetingStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown meeting status `{status_raw}`")))?;
    let start = parse_instant("start_at", row.try_get("start_at")?)?;
    let end = parse_instant("end_at", row.try_get("end_at")?)?;
    let window = TimeWindow::new(start, end)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(Meeting {
        id: MeetingId(row.try_get("id")?),
        room_id: RoomId(row.try_get("room_id")?),
        user_id: UserId(row.try_get("user_id")?),
        title: row.try_get("title")?,
        window,
        status,
        created_at: parse_instant("created_at", row.try_get("created_at")?)?,
        updated_at: parse_instant("updated_at", row.try_get("updated_at")?)?,
    })
}

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, SecondsFormat, Utc};
use thiserror::Error;

use roomwise_core::booking::{BookingEngine, SchedulingPolicy};
use roomwise_core::errors::StoreError;

use crate::DbPool;

pub mod meeting;
pub mod room;
pub mod user;

pub use meeting::SqlBookingLedger;
pub use room::SqlRoomInventory;
pub use user::SqlDirectory;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        StoreError::Backend(error.to_string())
    }
}

/// Engine wired to the SQL store for every port.
pub fn booking_engine(pool: DbPool, policy: SchedulingPolicy) -> BookingEngine {
    BookingEngine::new(
        Arc::new(SqlRoomInventory::new(pool.clone())),
        Arc::new(SqlBookingLedger::new(pool.clone())),
        Arc::new(SqlDirectory::new(pool)),
        policy,
    )
}

/// Fixed-width UTC form, so that text comparison in SQL orders like time.
pub(crate) fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn parse_instant(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn format_time_of_day(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub(crate) fn parse_time_of_day(column: &str, value: String) -> Result<NaiveTime, RepositoryError> {
    NaiveTime::parse_from_str(&value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&value, "%H:%M:%S"))
        .map_err(|error| {
            RepositoryError::Decode(format!("invalid time of day in `{column}`: `{value}` ({error})"))
        })
}


#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, TimeZone, Utc};

    use super::{format_instant, format_time_of_day, parse_instant, parse_time_of_day, RepositoryError};

    #[test]
    fn instants_are_fixed_width_and_ordered() {
        let early = Utc.with_ymd_and_hms(2025, 12, 15, 9, 0, 0).single().expect("instant");
        let late = Utc.with_ymd_and_hms(2025, 12, 15, 10, 30, 0).single().expect("instant");

        let early_text = format_instant(early);
        assert_eq!(early_text, "2025-12-15T09:00:00Z");
        assert!(early_text < format_instant(late));
        assert_eq!(parse_instant("start_at", early_text).expect("parse"), early);
    }

    #[test]
    fn malformed_values_are_decode_errors() {
        assert!(matches!(
            parse_instant("start_at", "yesterday".to_string()),
            Err(RepositoryError::Decode(_))
        ));
        assert!(matches!(
            parse_time_of_day("opens_at", "8h".to_string()),
            Err(RepositoryError::Decode(_))
        ));
        let time = NaiveTime::from_hms_opt(7, 30, 0).expect("time");
        assert_eq!(parse_time_of_day("opens_at", format_time_of_day(time)).expect("parse"), time);
    }
}

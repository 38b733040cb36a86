use std::time::Duration;

use chrono::{
    DateTime, Datelike, Duration as ChronoDuration, LocalResult, NaiveDate, NaiveDateTime,
    NaiveTime, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;

use crate::config::{ConfigError, SchedulingConfig};
use crate::domain::room::Room;
use crate::domain::window::TimeWindow;

/// Typed scheduling rules the engine runs with. Every wall-clock computation goes
/// through `timezone`; instants entering and leaving the engine stay UTC.
#[derive(Clone, Debug, PartialEq)]
pub struct SchedulingPolicy {
    pub timezone: Tz,
    pub business_start_hour: u32,
    pub business_end_hour: u32,
    pub slot_step_minutes: u32,
    pub team_slot_limit: usize,
    pub instant_rounding_minutes: u32,
    pub instant_option_limit: usize,
    pub recurrence_cap: u32,
    pub store_timeout: Duration,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        let defaults = SchedulingConfig::default();
        Self {
            timezone: chrono_tz::Europe::Paris,
            business_start_hour: defaults.business_start_hour,
            business_end_hour: defaults.business_end_hour,
            slot_step_minutes: defaults.slot_step_minutes,
            team_slot_limit: defaults.team_slot_limit,
            instant_rounding_minutes: defaults.instant_rounding_minutes,
            instant_option_limit: defaults.instant_option_limit,
            recurrence_cap: defaults.recurrence_cap,
            store_timeout: Duration::from_millis(defaults.store_timeout_ms),
        }
    }
}

impl SchedulingPolicy {
    pub fn from_config(config: &SchedulingConfig) -> Result<Self, ConfigError> {
        let timezone = config.timezone.trim().parse::<Tz>().map_err(|_| {
            ConfigError::Validation(format!(
                "scheduling.timezone `{}` is not a known IANA time zone",
                config.timezone
            ))
        })?;

        Ok(Self {
            timezone,
            business_start_hour: config.business_start_hour,
            business_end_hour: config.business_end_hour,
            slot_step_minutes: config.slot_step_minutes,
            team_slot_limit: config.team_slot_limit,
            instant_rounding_minutes: config.instant_rounding_minutes,
            instant_option_limit: config.instant_option_limit,
            recurrence_cap: config.recurrence_cap,
            store_timeout: Duration::from_millis(config.store_timeout_ms),
        })
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<Tz> {
        instant.with_timezone(&self.timezone)
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local(instant).date_naive()
    }

    /// Projects a wall-clock time in the policy zone onto the UTC timeline. A time
    /// skipped by a DST jump lands one hour later; an ambiguous one takes the first
    /// occurrence.
    pub fn instant_at(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match self.timezone.from_local_datetime(&local) {
            LocalResult::Single(value) => value.with_timezone(&Utc),
            LocalResult::Ambiguous(first, _) => first.with_timezone(&Utc),
            LocalResult::None => {
                let shifted = local + ChronoDuration::hours(1);
                self.timezone
                    .from_local_datetime(&shifted)
                    .earliest()
                    .map(|value| value.with_timezone(&Utc))
                    .unwrap_or_else(|| Utc.from_utc_datetime(&local))
            }
        }
    }

    pub fn business_start_on(&self, date: NaiveDate) -> DateTime<Utc> {
        self.instant_at(hour_on(date, self.business_start_hour))
    }

    pub fn business_end_on(&self, date: NaiveDate) -> DateTime<Utc> {
        self.instant_at(hour_on(date, self.business_end_hour))
    }

    pub fn room_closes_on(&self, room: &Room, date: NaiveDate) -> DateTime<Utc> {
        self.instant_at(date.and_time(room.closes_at))
    }

    /// True when the whole window sits inside the room's opening hours on one local day.
    pub fn room_is_open(&self, room: &Room, window: &TimeWindow) -> bool {
        let start = self.local(window.start());
        let end = self.local(window.end());
        start.date_naive() == end.date_naive() && room.is_open_between(start.time(), end.time())
    }

    pub fn is_business_day(date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    pub fn date_label(&self, instant: DateTime<Utc>) -> String {
        self.local(instant).format("%d/%m/%Y").to_string()
    }

    pub fn time_label(&self, instant: DateTime<Utc>) -> String {
        self.local(instant).format("%H:%M").to_string()
    }

    pub fn day_name(&self, instant: DateTime<Utc>) -> String {
        self.local(instant).format("%A").to_string()
    }

    pub fn window_label(&self, window: &TimeWindow) -> String {
        format!(
            "{} {}-{}",
            self.date_label(window.start()),
            self.time_label(window.start()),
            self.time_label(window.end())
        )
    }

    pub(crate) fn store_timeout_ms(&self) -> u64 {
        u64::try_from(self.store_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

fn hour_on(date: NaiveDate, hour: u32) -> NaiveDateTime {
    if hour >= 24 {
        let next = date.succ_opt().unwrap_or(date);
        return next.and_time(NaiveTime::MIN);
    }
    date.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    use super::SchedulingPolicy;
    use crate::config::SchedulingConfig;
    use crate::domain::room::{Room, RoomId};
    use crate::domain::window::TimeWindow;

    fn room(opens: u32, closes: u32) -> Room {
        Room {
            id: RoomId("room-1".to_string()),
            name: "Studio".to_string(),
            capacity: 4,
            location: "2nd floor".to_string(),
            equipment: Vec::new(),
            opens_at: NaiveTime::from_hms_opt(opens, 0, 0).expect("time"),
            closes_at: NaiveTime::from_hms_opt(closes, 0, 0).expect("time"),
            active: true,
        }
    }

    #[test]
    fn from_config_rejects_unknown_zone() {
        let config = SchedulingConfig { timezone: "Nowhere/City".to_string(), ..SchedulingConfig::default() };
        assert!(SchedulingPolicy::from_config(&config).is_err());
    }

    #[test]
    fn business_bounds_follow_the_configured_zone() {
        let policy = SchedulingPolicy::default();
        let winter = NaiveDate::from_ymd_opt(2025, 12, 15).expect("date");
        let summer = NaiveDate::from_ymd_opt(2025, 7, 15).expect("date");

        assert_eq!(
            policy.business_start_on(winter),
            Utc.with_ymd_and_hms(2025, 12, 15, 8, 0, 0).single().expect("instant")
        );
        assert_eq!(
            policy.business_start_on(summer),
            Utc.with_ymd_and_hms(2025, 7, 15, 7, 0, 0).single().expect("instant")
        );
    }

    #[test]
    fn opening_hours_are_checked_in_local_time() {
        let policy = SchedulingPolicy::default();
        // 07:30 UTC is 08:30 in Paris during winter.
        let start = Utc.with_ymd_and_hms(2025, 12, 15, 7, 30, 0).single().expect("instant");
        let window = TimeWindow::from_duration(start, 60).expect("window");

        assert!(policy.room_is_open(&room(8, 20), &window));
        assert!(!policy.room_is_open(&room(9, 20), &window));
    }

    #[test]
    fn labels_use_day_first_dates_and_24h_times() {
        let policy = SchedulingPolicy::default();
        let start = Utc.with_ymd_and_hms(2025, 12, 13, 13, 0, 0).single().expect("instant");
        let window = TimeWindow::from_duration(start, 60).expect("window");

        assert_eq!(policy.date_label(start), "13/12/2025");
        assert_eq!(policy.window_label(&window), "13/12/2025 14:00-15:00");
        assert_eq!(policy.day_name(start), "Saturday");
    }

    #[test]
    fn skipped_local_time_moves_forward() {
        let policy = SchedulingPolicy::default();
        // 2025-03-30 02:30 does not exist in Paris.
        let local = NaiveDate::from_ymd_opt(2025, 3, 30)
            .expect("date")
            .and_hms_opt(2, 30, 0)
            .expect("time");
        assert_eq!(
            policy.instant_at(local),
            Utc.with_ymd_and_hms(2025, 3, 30, 1, 30, 0).single().expect("instant")
        );
    }
}

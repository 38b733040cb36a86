use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::catalog::SearchCriteria;
use super::policy::SchedulingPolicy;
use super::resolver::{Resolution, SlotRequest};
use super::scoring::ScoredRoom;
use super::BookingEngine;
use crate::domain::meeting::Meeting;
use crate::domain::user::UserId;
use crate::domain::window::{TimeWindow, MAX_DURATION_MINUTES};
use crate::errors::{BookingError, StoreError};

/// Longest date range one scan may cover.
pub const MAX_SCAN_DAYS: i64 = 31;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MemberSelector {
    Organization(String),
    Users(Vec<UserId>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TeamScanRequest {
    pub members: MemberSelector,
    /// First and last local dates of the range, both inclusive.
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub duration_minutes: i64,
    pub min_availability_percent: f64,
    pub equipment: Vec<String>,
    /// Denominator used when the selector resolves to nobody.
    pub team_size_hint: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TeamSlot {
    pub window: TimeWindow,
    pub day_name: String,
    pub date_label: String,
    pub time_label: String,
    pub member_count: u32,
    pub unavailable_count: u32,
    pub unavailable_members: Vec<UserId>,
    pub availability_percent: f64,
    pub room: SlotRoom,
    /// True only when a room was found free at this exact slot.
    pub bookable: bool,
}

/// Room attached to a team slot.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlotRoom {
    Found { room: ScoredRoom },
    /// People are free but every fitting room is taken.
    NoneFree,
    /// The room lookup failed; availability of rooms is unknown.
    Unverified { error: String },
}

impl SlotRoom {
    pub fn found(&self) -> Option<&ScoredRoom> {
        match self {
            Self::Found { room } => Some(room),
            Self::NoneFree | Self::Unverified { .. } => None,
        }
    }

    pub fn is_unverified(&self) -> bool {
        matches!(self, Self::Unverified { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TeamScan {
    pub slots: Vec<TeamSlot>,
    pub member_count: u32,
    /// Set when the selector resolved to nobody and the hint was used instead.
    pub assumed_team_size: bool,
    /// Members whose calendar could not be read; counted as unavailable everywhere.
    pub unreadable_members: Vec<UserId>,
    pub slots_considered: usize,
}

impl TeamScanRequest {
    fn validate(&self) -> Result<(), BookingError> {
        if self.duration_minutes <= 0 || self.duration_minutes > MAX_DURATION_MINUTES {
            return Err(BookingError::Validation(format!(
                "duration must be between 1 and {MAX_DURATION_MINUTES} minutes, got {}",
                self.duration_minutes
            )));
        }
        if self.to < self.from {
            return Err(BookingError::Validation(format!(
                "date range ends ({}) before it starts ({})",
                self.to, self.from
            )));
        }
        if (self.to - self.from).num_days() >= MAX_SCAN_DAYS {
            return Err(BookingError::Validation(format!(
                "date range may cover at most {MAX_SCAN_DAYS} days"
            )));
        }
        if !(0.0..=100.0).contains(&self.min_availability_percent) {
            return Err(BookingError::Validation(format!(
                "minimum availability must be between 0 and 100, got {}",
                self.min_availability_percent
            )));
        }
        Ok(())
    }
}

/// Business-hours grid: weekdays only, stepped from the start hour, each slot ending
/// no later than the end hour. An unrepresentable duration yields an empty grid.
pub fn business_grid(
    policy: &SchedulingPolicy,
    from: NaiveDate,
    to: NaiveDate,
    duration_minutes: i64,
) -> Vec<TimeWindow> {
    let step = Duration::minutes(i64::from(policy.slot_step_minutes.max(1)));
    let Some(length) = Duration::try_minutes(duration_minutes) else {
        return Vec::new();
    };
    let day_start = NaiveTime::from_hms_opt(policy.business_start_hour, 0, 0).unwrap_or(NaiveTime::MIN);
    let day_length = Duration::hours(i64::from(policy.business_end_hour) - i64::from(policy.business_start_hour));

    let mut grid = Vec::new();
    let mut date = from;
    while date <= to {
        if SchedulingPolicy::is_business_day(date) {
            let opening = date.and_time(day_start);
            let closing = opening + day_length;
            let mut slot_start = opening;
            while slot_start.checked_add_signed(length).is_some_and(|end| end <= closing) {
                let start = policy.instant_at(slot_start);
                if let Ok(window) = TimeWindow::from_duration(start, duration_minutes) {
                    grid.push(window);
                }
                match slot_start.checked_add_signed(step) {
                    Some(next) => slot_start = next,
                    None => break,
                }
            }
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    grid
}

pub fn availability_percent(member_count: u32, unavailable: u32) -> f64 {
    if member_count == 0 {
        return 0.0;
    }
    f64::from(member_count.saturating_sub(unavailable)) / f64::from(member_count) * 100.0
}

impl BookingEngine {
    /// Slots where at least `min_availability_percent` of the team is free, best
    /// first, each with a room attached when one is free at that exact slot. Failed
    /// room lookups mark their slot unverified; all of them failing is a store error.
    pub async fn scan_team(&self, request: &TeamScanRequest) -> Result<TeamScan, BookingError> {
        request.validate()?;

        let members = self.resolve_members(&request.members).await?;
        let (member_count, assumed_team_size) = if members.is_empty() {
            match request.team_size_hint.filter(|size| *size > 0) {
                Some(size) => (size, true),
                None => {
                    return Err(BookingError::Validation(
                        "no team members found and no team size given".to_string(),
                    ))
                }
            }
        } else {
            (u32::try_from(members.len()).unwrap_or(u32::MAX), false)
        };

        let grid = business_grid(&self.policy, request.from, request.to, request.duration_minutes);
        let (calendars, unreadable) = self.load_calendars(&members, &grid).await?;

        let mut candidates: Vec<(TimeWindow, Vec<UserId>, f64)> = grid
            .iter()
            .map(|slot| {
                let mut busy: Vec<UserId> = members
                    .iter()
                    .filter(|member| {
                        unreadable.contains(*member)
                            || calendars
                                .get(*member)
                                .is_some_and(|meetings| meetings.iter().any(|m| m.blocks(slot)))
                    })
                    .cloned()
                    .collect();
                busy.sort();
                let unavailable = u32::try_from(busy.len()).unwrap_or(u32::MAX);
                (*slot, busy, availability_percent(member_count, unavailable))
            })
            .filter(|(_, _, percent)| *percent >= request.min_availability_percent)
            .collect();

        candidates.sort_by(|left, right| {
            right.2.total_cmp(&left.2).then_with(|| left.0.start().cmp(&right.0.start()))
        });
        candidates.truncate(self.policy.team_slot_limit);

        let mut slots = Vec::with_capacity(candidates.len());
        let mut last_room_failure: Option<StoreError> = None;
        for (window, busy, percent) in candidates {
            let room = match self.room_for_slot(&window, member_count, &request.equipment).await {
                Ok(room) => room,
                Err(BookingError::Store(error)) => {
                    warn!(
                        event_name = "booking.team.room_unverified",
                        window_start = %window.start(),
                        error = %error,
                        "room lookup failed for team slot"
                    );
                    let room = SlotRoom::Unverified { error: error.to_string() };
                    last_room_failure = Some(error);
                    room
                }
                Err(other) => return Err(other),
            };
            slots.push(TeamSlot {
                day_name: self.policy.day_name(window.start()),
                date_label: self.policy.date_label(window.start()),
                time_label: self.policy.time_label(window.start()),
                member_count,
                unavailable_count: u32::try_from(busy.len()).unwrap_or(u32::MAX),
                unavailable_members: busy,
                availability_percent: percent,
                bookable: room.found().is_some(),
                room,
                window,
            });
        }

        if let Some(error) = last_room_failure {
            if slots.iter().all(|slot| slot.room.is_unverified()) {
                return Err(BookingError::Store(error));
            }
        }

        info!(
            event_name = "booking.team.scanned",
            member_count,
            assumed_team_size,
            slots_considered = grid.len(),
            slots_returned = slots.len(),
            "team availability scan completed"
        );

        Ok(TeamScan {
            slots,
            member_count,
            assumed_team_size,
            unreadable_members: unreadable.into_iter().collect(),
            slots_considered: grid.len(),
        })
    }

    async fn resolve_members(&self, selector: &MemberSelector) -> Result<Vec<UserId>, BookingError> {
        let ids: BTreeSet<UserId> = match selector {
            MemberSelector::Organization(name) => {
                if name.trim().is_empty() {
                    return Err(BookingError::Validation("organization name is empty".to_string()));
                }
                self.guarded("members_of", self.directory.members_of(name))
                    .await?
                    .into_iter()
                    .map(|user| user.id)
                    .collect()
            }
            MemberSelector::Users(ids) => ids.iter().cloned().collect(),
        };
        Ok(ids.into_iter().collect())
    }

    /// One calendar read per member covering the whole grid. A failed read marks the
    /// member unreadable; all reads failing is a store error.
    async fn load_calendars(
        &self,
        members: &[UserId],
        grid: &[TimeWindow],
    ) -> Result<(BTreeMap<UserId, Vec<Meeting>>, BTreeSet<UserId>), BookingError> {
        let mut calendars = BTreeMap::new();
        let mut unreadable = BTreeSet::new();
        let (Some(first), Some(last)) = (grid.first(), grid.iter().map(TimeWindow::end).max()) else {
            return Ok((calendars, unreadable));
        };
        let span = TimeWindow::new(first.start(), last)?;

        let mut last_failure: Option<StoreError> = None;
        for member in members {
            match self
                .guarded("overlapping_for_user", self.ledger.overlapping_for_user(member, &span))
                .await
            {
                Ok(meetings) => {
                    calendars.insert(member.clone(), meetings);
                }
                Err(error) => {
                    warn!(
                        event_name = "booking.team.calendar_unreadable",
                        user_id = %member,
                        error = %error,
                        "member calendar unreadable, counted as unavailable"
                    );
                    unreadable.insert(member.clone());
                    last_failure = Some(error);
                }
            }
        }

        if let Some(error) = last_failure {
            if unreadable.len() == members.len() {
                return Err(BookingError::Store(error));
            }
        }
        Ok((calendars, unreadable))
    }

    async fn room_for_slot(
        &self,
        window: &TimeWindow,
        member_count: u32,
        equipment: &[String],
    ) -> Result<SlotRoom, BookingError> {
        let request = SlotRequest {
            criteria: SearchCriteria {
                min_capacity: Some(member_count),
                equipment: equipment.to_vec(),
                ..SearchCriteria::default()
            },
            start: window.start(),
            duration_minutes: window.duration_minutes(),
        };
        Ok(match self.resolve(&request).await? {
            Resolution::Found { best, .. } => SlotRoom::Found { room: best },
            Resolution::AllBusy { unverified, .. } if !unverified.is_empty() => SlotRoom::Unverified {
                error: format!("{} of the fitting rooms could not be checked", unverified.len()),
            },
            Resolution::NoMatchingRooms | Resolution::Exhausted { .. } | Resolution::AllBusy { .. } => {
                SlotRoom::NoneFree
            }
        })
    }
}

pub mod booking;
pub mod config;
pub mod domain;
pub mod errors;
pub mod store;

pub use booking::{
    Availability, BookingEngine, BookingRequest, CommitOutcome, InstantLookup, InstantRequest,
    MeetingChanges, MemberSelector, RecurrencePattern, RecurringRequest, Resolution,
    SchedulingPolicy, SearchCriteria, SeriesReport, SlotRequest, TeamScan, TeamScanRequest,
    UpdateOutcome,
};
pub use domain::meeting::{Meeting, MeetingId, MeetingStatus, NewMeeting};
pub use domain::room::{Room, RoomId};
pub use domain::user::{User, UserId};
pub use domain::window::TimeWindow;
pub use errors::{BookingError, InterfaceError, StoreError};
pub use store::{BookingLedger, Directory, InMemoryStore, RoomInventory, WriteOutcome};

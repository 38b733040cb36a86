use thiserror::Error;

use crate::domain::meeting::MeetingId;
use crate::domain::user::UserId;

/// Failure of the reservation store itself. Never means "nothing found".
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(String),
    #[error("store call `{operation}` timed out after {timeout_ms}ms")]
    Timeout { operation: &'static str, timeout_ms: u64 },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BookingError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("user `{user_id}` does not own meeting `{meeting_id}`")]
    Unauthorized { user_id: UserId, meeting_id: MeetingId },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    pub fn room_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { entity: "room", id: id.into() }
    }

    pub fn meeting_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { entity: "meeting", id: id.into() }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Store(StoreError::Timeout { .. }) => "store_timeout",
            Self::Store(StoreError::Backend(_)) => "store_failure",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check the dates, duration and criteria and try again."
            }
            Self::NotFound { .. } => "That room or meeting does not exist.",
            Self::Forbidden { .. } => "You can only change or cancel meetings you booked yourself.",
            Self::ServiceUnavailable { .. } => {
                "Room availability could not be verified right now. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl BookingError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<BookingError> for InterfaceError {
    fn from(value: BookingError) -> Self {
        let message = value.to_string();
        let correlation_id = "unassigned".to_owned();
        match value {
            BookingError::Validation(_) => Self::BadRequest { message, correlation_id },
            BookingError::NotFound { .. } => Self::NotFound { message, correlation_id },
            BookingError::Unauthorized { .. } => Self::Forbidden { message, correlation_id },
            BookingError::Store(_) => Self::ServiceUnavailable { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::meeting::MeetingId;
    use crate::domain::user::UserId;
    use crate::errors::{BookingError, InterfaceError, StoreError};

    #[test]
    fn validation_error_maps_to_bad_request_with_correlation_id() {
        let interface =
            BookingError::Validation("duration must be positive".to_owned()).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
    }

    #[test]
    fn unauthorized_is_not_downgraded_to_not_found() {
        let interface = BookingError::Unauthorized {
            user_id: UserId("u-2".to_owned()),
            meeting_id: MeetingId("m-1".to_owned()),
        }
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::Forbidden { .. }));
        assert_eq!(
            interface.user_message(),
            "You can only change or cancel meetings you booked yourself."
        );
    }

    #[test]
    fn store_timeout_maps_to_service_unavailable() {
        let interface = BookingError::from(StoreError::Timeout {
            operation: "overlapping_for_room",
            timeout_ms: 5000,
        })
        .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "req-3");
    }

    #[test]
    fn every_interface_kind_has_a_distinct_message() {
        let kinds = [
            BookingError::Validation("bad".to_owned()),
            BookingError::room_not_found("room-x"),
            BookingError::Unauthorized {
                user_id: UserId("u".to_owned()),
                meeting_id: MeetingId("m".to_owned()),
            },
            BookingError::Store(StoreError::Backend("disk".to_owned())),
        ];
        let messages: Vec<&str> =
            kinds.into_iter().map(|error| error.into_interface("req").user_message()).collect();

        for (index, message) in messages.iter().enumerate() {
            assert!(!message.is_empty());
            assert!(!messages[index + 1..].contains(message), "duplicate message {message}");
        }
    }

    #[test]
    fn error_classes_separate_timeouts_from_backend_failures() {
        let timeout = BookingError::from(StoreError::Timeout { operation: "x", timeout_ms: 1 });
        let backend = BookingError::from(StoreError::Backend("io".to_owned()));
        assert_eq!(timeout.error_class(), "store_timeout");
        assert_eq!(backend.error_class(), "store_failure");
    }
}

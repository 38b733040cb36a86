use roomwise_core::errors::BookingError;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Found,
    Done,
    NotFound,
    Conflict,
    Unavailable,
    Forbidden,
    Invalid,
    Error,
}

impl ToolOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::Done => "done",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Unavailable => "unavailable",
            Self::Forbidden => "forbidden",
            Self::Invalid => "invalid",
            Self::Error => "error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Found | Self::Done)
    }
}

/// Result of one tool call: a single outcome tag, one summary for the user and
/// the structured payload the summary was rendered from.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolReply {
    pub outcome: ToolOutcome,
    pub summary: String,
    pub data: Value,
}

impl ToolReply {
    pub fn new(outcome: ToolOutcome, summary: impl Into<String>, data: Value) -> Self {
        Self { outcome, summary: summary.into(), data }
    }

    /// Serializes `data`; a payload that cannot be serialized turns the reply into an error.
    pub fn with_data<T: Serialize>(outcome: ToolOutcome, summary: impl Into<String>, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self::new(outcome, summary, value),
            Err(error) => Self::new(
                ToolOutcome::Error,
                "An unexpected internal error occurred while preparing the answer.",
                json!({ "error_class": "serialization", "detail": error.to_string() }),
            ),
        }
    }

    pub fn invalid(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::new(
            ToolOutcome::Invalid,
            format!("I could not use that request: {detail}"),
            json!({ "error_class": "invalid_input", "detail": detail }),
        )
    }

    pub fn forbidden(reason_code: &'static str, user_message: impl Into<String>) -> Self {
        Self::new(ToolOutcome::Forbidden, user_message, json!({ "error_class": reason_code }))
    }

    pub fn from_booking_error(error: BookingError, correlation_id: &str) -> Self {
        let error_class = error.error_class();
        let detail = error.to_string();
        let outcome = match &error {
            BookingError::Validation(_) => ToolOutcome::Invalid,
            BookingError::NotFound { .. } => ToolOutcome::NotFound,
            BookingError::Unauthorized { .. } => ToolOutcome::Forbidden,
            BookingError::Store(_) => ToolOutcome::Error,
        };
        let interface = error.into_interface(correlation_id);
        let summary = match outcome {
            ToolOutcome::Invalid | ToolOutcome::NotFound => {
                format!("{} ({detail})", interface.user_message())
            }
            ToolOutcome::Error => {
                format!("{} Reference: {correlation_id}.", interface.user_message())
            }
            _ => interface.user_message().to_string(),
        };

        Self::new(
            outcome,
            summary,
            json!({
                "error_class": error_class,
                "detail": detail,
                "correlation_id": correlation_id,
                "retryable": outcome == ToolOutcome::Error,
            }),
        )
    }
}

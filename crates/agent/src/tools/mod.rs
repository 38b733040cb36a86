use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use roomwise_core::booking::{BookingEngine, SchedulingPolicy};
use roomwise_core::domain::user::UserId;
use roomwise_core::errors::BookingError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::guardrails::{GuardrailDecision, GuardrailPolicy, ToolAccess};
use crate::reply::ToolReply;
use crate::session::SessionContext;

pub mod booking;
pub mod search;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("this action needs a signed-in user")]
    SignInRequired,
    #[error(transparent)]
    Booking(#[from] BookingError),
}

/// What a tool sees of the current request.
pub struct ToolContext<'a> {
    pub engine: &'a BookingEngine,
    pub session: &'a SessionContext,
}

impl ToolContext<'_> {
    pub fn policy(&self) -> &SchedulingPolicy {
        self.engine.policy()
    }

    pub fn user(&self) -> Result<&UserId, ToolError> {
        self.session.user.as_ref().ok_or(ToolError::SignInRequired)
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn access(&self) -> ToolAccess;
    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<ToolReply, ToolError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub read_only: bool,
}

/// Every tool this crate knows, in listing order.
pub fn catalog() -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(search::SearchCatalog),
        Box::new(search::FindRooms),
        Box::new(search::CheckAvailability),
        Box::new(search::ProposeRoom),
        Box::new(search::FindRoomNow),
        Box::new(search::FindTeamSlots),
        Box::new(booking::CreateMeeting),
        Box::new(booking::CreateRecurringMeeting),
        Box::new(booking::UpdateMeeting),
        Box::new(booking::CancelMeeting),
        Box::new(booking::ListMyMeetings),
    ]
}

/// Tools available to one session. Built per request; nothing is shared between sessions.
pub struct ToolRegistry {
    engine: Arc<BookingEngine>,
    session: SessionContext,
    tools: Vec<Box<dyn Tool>>,
    denied: BTreeMap<&'static str, (&'static str, String)>,
}

impl ToolRegistry {
    pub fn for_session(engine: Arc<BookingEngine>, session: SessionContext) -> Self {
        Self::with_guardrails(engine, session, &GuardrailPolicy::default())
    }

    pub fn with_guardrails(
        engine: Arc<BookingEngine>,
        session: SessionContext,
        guardrails: &GuardrailPolicy,
    ) -> Self {
        let mut tools = Vec::new();
        let mut denied = BTreeMap::new();
        for tool in catalog() {
            match guardrails.evaluate(tool.access(), &session) {
                GuardrailDecision::Allow => tools.push(tool),
                GuardrailDecision::Deny { reason_code, user_message } => {
                    denied.insert(tool.name(), (reason_code, user_message));
                }
            }
        }
        Self { engine, session, tools, denied }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.name(),
                description: tool.description(),
                read_only: tool.access().is_read_only(),
            })
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|tool| tool.name() == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn invoke(&self, name: &str, input: Value) -> ToolReply {
        let correlation_id = self.session.correlation_id.as_str();

        if let Some((reason_code, user_message)) = self.denied.get(name) {
            info!(
                event_name = "agent.tool.denied",
                correlation_id,
                tool = name,
                user_id = self.session.user_label(),
                reason_code = *reason_code,
                "tool call refused by guardrails"
            );
            return ToolReply::forbidden(*reason_code, user_message.clone());
        }

        let Some(tool) = self.tools.iter().find(|tool| tool.name() == name) else {
            warn!(event_name = "agent.tool.unknown", correlation_id, tool = name, "unknown tool requested");
            return ToolReply::invalid(format!("there is no tool named `{name}`"));
        };

        let ctx = ToolContext { engine: &self.engine, session: &self.session };
        let reply = match tool.execute(&ctx, input).await {
            Ok(reply) => reply,
            Err(ToolError::InvalidInput(detail)) => ToolReply::invalid(detail),
            Err(ToolError::SignInRequired) => ToolReply::forbidden(
                "sign_in_required",
                "Please sign in to book, change or cancel a meeting.",
            ),
            Err(ToolError::Booking(error)) => {
                if matches!(error, BookingError::Store(_)) {
                    warn!(
                        event_name = "agent.tool.store_failure",
                        correlation_id,
                        tool = name,
                        error = %error,
                        "tool call hit a store failure"
                    );
                }
                ToolReply::from_booking_error(error, correlation_id)
            }
        };

        info!(
            event_name = "agent.tool.invoked",
            correlation_id,
            tool = name,
            user_id = self.session.user_label(),
            outcome = reply.outcome.as_str(),
            "tool call completed"
        );
        reply
    }
}

/// Tools without parameters accept `null` as well as `{}`.
pub(crate) fn parse_input<T: DeserializeOwned>(input: Value) -> Result<T, ToolError> {
    let input = if input.is_null() { Value::Object(Default::default()) } else { input };
    serde_json::from_value(input).map_err(|error| ToolError::InvalidInput(error.to_string()))
}

/// Accepts RFC 3339 instants, or local wall-clock times read in the policy's zone.
pub(crate) fn parse_instant(policy: &SchedulingPolicy, raw: &str) -> Result<DateTime<Utc>, ToolError> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|local| policy.instant_at(local))
        .ok_or_else(|| {
            ToolError::InvalidInput(format!(
                "`{raw}` is not a date and time (expected e.g. 2025-12-15T14:00)"
            ))
        })
}

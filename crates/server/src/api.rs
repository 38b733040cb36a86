//! JSON surface over the agent runtime. Identity arrives from the upstream auth
//! layer in `x-user-id`; a missing header means a guest session.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use roomwise_agent::guardrails::{GuardrailDecision, ToolAccess};
use roomwise_agent::{AgentRuntime, SessionContext, ToolDefinition, ToolReply};
use roomwise_core::domain::meeting::{Meeting, MeetingId};
use roomwise_core::domain::user::UserId;
use roomwise_core::errors::InterfaceError;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

pub const USER_HEADER: &str = "x-user-id";
pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ApiState {
    runtime: AgentRuntime,
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub correlation_id: String,
    pub user_id: Option<String>,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub status: &'static str,
    pub correlation_id: String,
    pub meeting: Meeting,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub error_class: &'static str,
    pub correlation_id: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn router(runtime: AgentRuntime) -> Router {
    Router::new()
        .route("/api/tools", get(list_tools))
        .route("/api/tools/{name}", post(invoke_tool))
        .route("/api/meetings/{id}", delete(cancel_meeting))
        .with_state(ApiState { runtime })
}

async fn list_tools(State(state): State<ApiState>, headers: HeaderMap) -> Json<ToolListResponse> {
    let session = session_from_headers(&headers);
    let response = ToolListResponse {
        correlation_id: session.correlation_id.clone(),
        user_id: session.user.as_ref().map(|user| user.0.clone()),
        tools: state.runtime.definitions(session),
    };
    Json(response)
}

/// Tool outcomes travel in the reply body; only an unreadable body is an HTTP error.
async fn invoke_tool(
    Path(name): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ToolReply> {
    let session = session_from_headers(&headers);
    let input = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&body).map_err(|error| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("request body is not valid JSON: {error}"),
                "invalid_json",
                &session.correlation_id,
            )
        })?
    };

    Ok(Json(state.runtime.handle_tool_call(session, &name, input).await))
}

async fn cancel_meeting(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<CancelResponse> {
    let session = session_from_headers(&headers);
    let correlation_id = session.correlation_id.clone();
    let Some(user_id) = session.user.clone() else {
        return Err(api_error(
            StatusCode::UNAUTHORIZED,
            "Please sign in to cancel a meeting.",
            "sign_in_required",
            &correlation_id,
        ));
    };

    let meeting_id = MeetingId(id);
    if let GuardrailDecision::Deny { reason_code, user_message } =
        state.runtime.guardrails().evaluate(ToolAccess::Write, &session)
    {
        warn!(
            event_name = "api.meeting.cancel_denied",
            correlation_id = %correlation_id,
            meeting_id = %meeting_id,
            user_id = %user_id,
            reason_code,
            "meeting cancellation denied by guardrails"
        );
        return Err(api_error(StatusCode::FORBIDDEN, user_message, reason_code, &correlation_id));
    }
    match state.runtime.engine().cancel(&meeting_id, &user_id).await {
        Ok(meeting) => {
            info!(
                event_name = "api.meeting.cancelled",
                correlation_id = %correlation_id,
                meeting_id = %meeting.id,
                user_id = %user_id,
                "meeting cancelled over http"
            );
            Ok(Json(CancelResponse { status: "cancelled", correlation_id, meeting }))
        }
        Err(error) => {
            let error_class = error.error_class();
            let interface = error.into_interface(correlation_id.as_str());
            warn!(
                event_name = "api.meeting.cancel_refused",
                correlation_id = %correlation_id,
                meeting_id = %meeting_id,
                user_id = %user_id,
                error_class,
                error = %interface,
                "meeting cancellation refused"
            );
            Err(api_error(
                status_for(&interface),
                interface.user_message(),
                error_class,
                interface.correlation_id(),
            ))
        }
    }
}

fn session_from_headers(headers: &HeaderMap) -> SessionContext {
    let correlation_id = header_value(headers, CORRELATION_HEADER)
        .unwrap_or_else(|| format!("req-{}", Uuid::new_v4().simple()));
    match header_value(headers, USER_HEADER) {
        Some(user) => SessionContext::for_user(UserId(user), correlation_id),
        None => SessionContext::guest(correlation_id),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn status_for(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(
    status: StatusCode,
    message: impl Into<String>,
    error_class: &'static str,
    correlation_id: &str,
) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: message.into(),
            error_class,
            correlation_id: correlation_id.to_string(),
        }),
    )
}

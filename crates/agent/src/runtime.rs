use std::sync::Arc;

use roomwise_core::booking::BookingEngine;
use serde_json::Value;

use crate::guardrails::GuardrailPolicy;
use crate::reply::ToolReply;
use crate::session::SessionContext;
use crate::tools::{ToolDefinition, ToolRegistry};

/// Shared entry point of the transports. Holds the engine and the deployment's
/// guardrails; every call builds a fresh registry for its session.
#[derive(Clone)]
pub struct AgentRuntime {
    engine: Arc<BookingEngine>,
    guardrails: GuardrailPolicy,
}

impl AgentRuntime {
    pub fn new(engine: Arc<BookingEngine>, guardrails: GuardrailPolicy) -> Self {
        Self { engine, guardrails }
    }

    pub fn engine(&self) -> &BookingEngine {
        &self.engine
    }

    pub fn guardrails(&self) -> &GuardrailPolicy {
        &self.guardrails
    }

    pub fn registry(&self, session: SessionContext) -> ToolRegistry {
        ToolRegistry::with_guardrails(Arc::clone(&self.engine), session, &self.guardrails)
    }

    pub fn definitions(&self, session: SessionContext) -> Vec<ToolDefinition> {
        self.registry(session).definitions()
    }

    pub async fn handle_tool_call(&self, session: SessionContext, name: &str, input: Value) -> ToolReply {
        self.registry(session).invoke(name, input).await
    }
}

//! Chat tool surface over the booking engine.
//!
//! Each core operation is exposed as a [`tools::Tool`] with a typed JSON input and a
//! [`reply::ToolReply`] carrying one machine-readable outcome and one human summary.
//!
//! # Architecture
//!
//! 1. **Session** (`session`) - who is calling, under which correlation id, at what time
//! 2. **Guardrails** (`guardrails`) - which tools the session may see and call
//! 3. **Registry** (`tools`) - built once per session, dispatches by tool name
//! 4. **Rendering** (`render`) - summaries in the configured time zone
//!
//! The model driving the conversation only chooses tools and arguments. Availability,
//! ranking and ownership are always decided by the engine.

pub mod guardrails;
pub mod render;
pub mod reply;
pub mod runtime;
pub mod session;
pub mod tools;

pub use reply::{ToolOutcome, ToolReply};
pub use runtime::AgentRuntime;
pub use session::SessionContext;
pub use tools::{ToolDefinition, ToolRegistry};

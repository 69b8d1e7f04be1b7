//! Agent module for the business-assistant ReAct loop
//!
//! This module provides the agent loop that orchestrates:
//! - A model gateway (OpenAI-compatible or Ollama) with tool calling
//! - The tool registry that logs leads, demo requests, callbacks and feedback
//! - A per-run trace of tool activity and errors
//!
//! # Architecture
//!
//! ```text
//! User Message → AgentController → ModelGateway.complete (with tool schemas)
//!                     ↓
//!             TextReply ──────────────────────────→ reply + RunTrace
//!                     ↓
//!             ToolCallReply: record_* calls
//!                     ↓
//!             ToolRegistry.execute → Sinks (CSV)
//!                     ↓
//!             Tool turns appended to transcript
//!                     ↓
//!             Feed results back to the model → Loop or Complete
//! ```

pub mod controller;
pub mod persona;
pub mod trace;
pub mod transcript;

pub use controller::{
    AgentConfig, AgentController, RunOutcome, RunStatus, DEFAULT_MAX_ITERATIONS, FALLBACK_REPLY,
    NO_CONTENT_REPLY,
};
pub use persona::{compose_system_prompt, Persona, PersonaConfig, PersonaError};
pub use trace::{ErrorKind, RunTrace, ToolActivity, TraceError};
pub use transcript::{last_assistant_content, ConversationTurn, Role};

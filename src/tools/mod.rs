//! Tool registry module
//!
//! The four logging tools the assistant can call, their schemas, and the
//! append-only sinks they write to.
//!
//! ```text
//! model reply → ToolSchema::decode_arguments → ToolInvocationRequest
//!                                                   ↓
//!                                   ToolRegistry::execute (validate)
//!                                                   ↓
//!                                   LogSink::append → ToolResult
//! ```

pub mod registry;
pub mod schema;
pub mod storage;

pub use registry::{ToolInvocationRequest, ToolRegistry, ToolResult};
pub use schema::{find_schema, tool_schemas, ParamSpec, ToolName, ToolSchema};
pub use storage::{CsvSink, LogSink, MemorySink, MemorySinks, Record, Sinks};

use thiserror::Error;

/// Failure while appending a record to a sink
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("record for {sink} is missing field '{field}'")]
    MissingField { sink: String, field: String },
    #[error("sink lock poisoned")]
    Poisoned,
    #[error("{0}")]
    Other(String),
}

/// Failure while executing a tool
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{tool} requires a non-empty '{field}'")]
    Validation { tool: ToolName, field: &'static str },
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("tool '{0}' is not registered")]
    UnknownTool(String),
}

/// Malformed tool-call payload from the model
///
/// Non-fatal: the controller turns it into a visible error turn and gives the
/// model another iteration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed call{}: {reason}", call_target(.tool_name))]
pub struct ParseError {
    /// Tool the model tried to call, when it could be identified
    pub tool_name: Option<String>,
    /// Raw payload as received
    pub raw: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(tool_name: Option<&str>, raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.map(str::to_string),
            raw: raw.into(),
            reason: reason.into(),
        }
    }
}

fn call_target(tool_name: &Option<String>) -> String {
    tool_name
        .as_ref()
        .map(|n| format!(" to {}", n))
        .unwrap_or_default()
}

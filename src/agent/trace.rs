//! Run trace: tool activity and errors recorded during one controller run

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Class of a trace error entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A tool rejected its arguments or failed to store its record
    Tool,
    /// The model sent a tool call that could not be decoded
    Parse,
    /// The model endpoint failed; the run was aborted
    Gateway,
    /// The iteration bound cut the run short
    Truncated,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Tool => "tool",
            ErrorKind::Parse => "parse",
            ErrorKind::Gateway => "gateway",
            ErrorKind::Truncated => "truncated",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceError {
    pub kind: ErrorKind,
    pub message: String,
}

/// One executed tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolActivity {
    pub tool_name: String,
    pub arguments: BTreeMap<String, String>,
    pub success: bool,
    pub result: String,
}

impl ToolActivity {
    /// `name(key='value') -> result`
    pub fn summary(&self) -> String {
        let args: Vec<String> = self
            .arguments
            .iter()
            .map(|(k, v)| format!("{}='{}'", k, v))
            .collect();
        format!("{}({}) -> {}", self.tool_name, args.join(", "), self.result)
    }
}

/// Audit record for one run. Only the controller writes to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTrace {
    pub tool_activity: Vec<ToolActivity>,
    pub errors: Vec<TraceError>,
}

impl RunTrace {
    pub(crate) fn record_tool(&mut self, activity: ToolActivity) {
        self.tool_activity.push(activity);
    }

    pub(crate) fn record_error(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.errors.push(TraceError {
            kind,
            message: message.into(),
        });
    }

    pub fn tool_use_count(&self) -> usize {
        self.tool_activity.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tool_activity.is_empty() && self.errors.is_empty()
    }

    /// Human-readable lines for display under a reply
    pub fn render(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .tool_activity
            .iter()
            .map(|a| format!("🔧 {}", a.summary()))
            .collect();
        lines.extend(
            self.errors
                .iter()
                .map(|e| format!("⚠️ {} error: {}", e.kind, e.message)),
        );
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lists_tools_then_errors() {
        let mut trace = RunTrace::default();
        trace.record_tool(ToolActivity {
            tool_name: "record_feedback".to_string(),
            arguments: [("question".to_string(), "Dubai?".to_string())].into(),
            success: true,
            result: "Logged the question for follow-up.".to_string(),
        });
        trace.record_error(ErrorKind::Truncated, "stopped after 4 iterations");

        assert_eq!(
            trace.render(),
            vec![
                "🔧 record_feedback(question='Dubai?') -> Logged the question for follow-up.",
                "⚠️ truncated error: stopped after 4 iterations",
            ]
        );
        assert_eq!(trace.tool_use_count(), 1);
        assert_eq!(trace.error_count(), 1);
    }
}

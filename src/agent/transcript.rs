//! Conversation turns
//!
//! The transcript is an ordered `Vec<ConversationTurn>`; turns are never
//! edited after they are pushed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tools::{ToolInvocationRequest, ToolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// One entry of the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    /// Tool that produced this turn (tool role only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Arguments the tool ran with (tool role only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<BTreeMap<String, String>>,
    /// Invocations requested by this turn (assistant role only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocationRequest>,
    /// Id of the invocation this turn answers; absent for synthetic error turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ConversationTurn {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_name: None,
            tool_args: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn assistant_with_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolInvocationRequest>,
    ) -> Self {
        Self {
            tool_calls,
            ..Self::plain(Role::Assistant, content)
        }
    }

    /// Tool-role turn carrying the result of `request`
    pub fn tool(request: &ToolInvocationRequest, result: &ToolResult) -> Self {
        Self {
            tool_name: Some(request.tool_name.clone()),
            tool_args: Some(request.arguments.clone()),
            tool_call_id: Some(request.id.clone()),
            ..Self::plain(Role::Tool, result.content())
        }
    }

    /// Tool-role turn describing a call that could not be decoded
    pub fn tool_error(tool_name: Option<String>, content: impl Into<String>) -> Self {
        Self {
            tool_name,
            ..Self::plain(Role::Tool, content)
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Last non-empty assistant content in `turns`
pub fn last_assistant_content(turns: &[ConversationTurn]) -> Option<&str> {
    turns
        .iter()
        .rev()
        .filter(|t| t.role == Role::Assistant)
        .map(|t| t.content.trim())
        .find(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_serialization_skips_empty_fields() {
        let json = serde_json::to_string(&ConversationTurn::user("hello")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hello"}"#);
    }

    #[test]
    fn test_tool_turn_links_request() {
        let req = ToolInvocationRequest::new("record_feedback", BTreeMap::new()).with_id("call_1");
        let result = ToolResult {
            tool_name: "record_feedback".to_string(),
            success: true,
            message: "Logged the question for follow-up.".to_string(),
            error: None,
        };
        let turn = ConversationTurn::tool(&req, &result);
        assert_eq!(turn.role, Role::Tool);
        assert_eq!(turn.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(turn.content, "Logged the question for follow-up.");
    }

    #[test]
    fn test_last_assistant_content_skips_blank() {
        let turns = vec![
            ConversationTurn::user("hi"),
            ConversationTurn::assistant("Hello!"),
            ConversationTurn::assistant_with_calls("  ", vec![]),
        ];
        assert_eq!(last_assistant_content(&turns), Some("Hello!"));
        assert_eq!(last_assistant_content(&turns[..1]), None);
    }
}

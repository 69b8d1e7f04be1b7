//! Model gateway: one round-trip to a chat-completion endpoint
//!
//! The gateway turns a transcript plus persona into a single request, and the
//! provider's reply into a closed [`GatewayResponse`]. Tool-call payloads are
//! decoded against the static tool schemas here, so the controller only ever
//! sees validated invocations or a [`ParseError`].
//!
//! Two providers are available:
//! - `openai` - OpenAI-compatible `/chat/completions`
//! - `ollama` - Ollama `/api/chat` with tool calling

pub mod ollama;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::agent::{ConversationTurn, Persona};
use crate::config::{AppConfig, Provider};
use crate::tools::{find_schema, ToolInvocationRequest, ToolSchema};

pub use crate::tools::ParseError;
pub use ollama::{parse_tool_calls_from_text, OllamaGateway};
pub use openai::OpenAiGateway;

/// Decoded reply from the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayResponse {
    /// Plain answer, no tool requested
    TextReply { content: String },
    /// One or more tool calls, in the order the model listed them
    ToolCallReply {
        invocations: Vec<ToolInvocationRequest>,
        /// Assistant text sent alongside the calls, often empty
        content: String,
    },
}

/// Transport or provider failure. Fatal for the current run.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request error: {0}")]
    Request(String),
    #[error("request timed out")]
    Timeout,
    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("empty response from model endpoint")]
    EmptyResponse,
    #[error("unexpected response shape: {0}")]
    Envelope(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Request(e.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Envelope(e.to_string())
    }
}

/// Anything a gateway call can fail with
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Single call to an external completion service
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Short provider label for logs and metrics
    fn provider(&self) -> &str;

    async fn complete(
        &self,
        transcript: &[ConversationTurn],
        persona: &Persona,
        tools: &[ToolSchema],
    ) -> Result<GatewayResponse, ModelError>;
}

/// Build the gateway selected by `config`
pub fn build_gateway(config: &AppConfig) -> Result<Arc<dyn ModelGateway>, GatewayError> {
    let gateway: Arc<dyn ModelGateway> = match config.provider {
        Provider::OpenAi => Arc::new(OpenAiGateway::new(
            config.base_url(),
            config.api_key.clone().unwrap_or_default(),
            config.model(),
            config.request_timeout(),
        )?),
        Provider::Ollama => Arc::new(OllamaGateway::new(
            config.base_url(),
            config.model(),
            config.request_timeout(),
        )?),
    };
    Ok(gateway)
}

/// Decode one provider tool call against the schemas
pub(crate) fn decode_invocation(
    tools: &[ToolSchema],
    id: Option<&str>,
    name: &str,
    raw_arguments: &serde_json::Value,
) -> Result<ToolInvocationRequest, ParseError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ParseError::new(
            None,
            raw_arguments.to_string(),
            "tool call has no function name",
        ));
    }

    let schema = find_schema(tools, name).ok_or_else(|| {
        ParseError::new(Some(name), raw_arguments.to_string(), "unknown tool")
    })?;
    let arguments = schema.decode_arguments(raw_arguments)?;

    let request = ToolInvocationRequest::new(schema.name.as_str(), arguments);
    Ok(match id.filter(|id| !id.is_empty()) {
        Some(id) => request.with_id(id),
        None => request,
    })
}

/// Decode every call of a reply; one bad call rejects the whole reply
pub(crate) fn decode_reply<'a, I>(
    tools: &[ToolSchema],
    calls: I,
    content: String,
) -> Result<GatewayResponse, ParseError>
where
    I: IntoIterator<Item = (Option<&'a str>, &'a str, &'a serde_json::Value)>,
{
    let invocations = calls
        .into_iter()
        .map(|(id, name, args)| decode_invocation(tools, id, name, args))
        .collect::<Result<Vec<_>, _>>()?;

    if invocations.is_empty() {
        Ok(GatewayResponse::TextReply { content })
    } else {
        Ok(GatewayResponse::ToolCallReply {
            invocations,
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool_schemas;

    #[test]
    fn test_decode_invocation_keeps_provider_id() {
        let tools = tool_schemas();
        let req = decode_invocation(
            &tools,
            Some("call_abc"),
            "record_feedback",
            &serde_json::json!({"question": "Dubai office?"}),
        )
        .unwrap();
        assert_eq!(req.id, "call_abc");
        assert_eq!(req.arguments["question"], "Dubai office?");
    }

    #[test]
    fn test_decode_invocation_generates_id() {
        let tools = tool_schemas();
        let req = decode_invocation(&tools, Some(""), "record_feedback", &serde_json::json!({}))
            .unwrap();
        assert!(req.id.starts_with("call_"));
    }

    #[test]
    fn test_unknown_tool_is_parse_error() {
        let tools = tool_schemas();
        let err = decode_invocation(&tools, None, "send_email", &serde_json::json!({})).unwrap_err();
        assert_eq!(err.tool_name.as_deref(), Some("send_email"));
        assert_eq!(err.reason, "unknown tool");
    }

    #[test]
    fn test_one_bad_call_rejects_reply() {
        let tools = tool_schemas();
        let good = serde_json::json!({"question": "q"});
        let bad = serde_json::json!({"bogus": "x"});
        let calls: Vec<(Option<&str>, &str, &serde_json::Value)> = vec![
            (None, "record_feedback", &good),
            (None, "record_feedback", &bad),
        ];
        let result = decode_reply(&tools, calls, String::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_no_calls_is_text_reply() {
        let tools = tool_schemas();
        let calls: Vec<(Option<&str>, &str, &serde_json::Value)> = Vec::new();
        let reply = decode_reply(&tools, calls, "Our mission is...".to_string()).unwrap();
        assert_eq!(
            reply,
            GatewayResponse::TextReply {
                content: "Our mission is...".to_string()
            }
        );
    }
}

//! Ollama Chat API with tool calling support
//!
//! Gateway over Ollama's `/api/chat` endpoint. Some local models emit tool
//! calls as JSON in the text content instead of the native `tool_calls`
//! field; [`parse_tool_calls_from_text`] recovers those.

use std::ops::Range;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{decode_reply, GatewayError, GatewayResponse, ModelError, ModelGateway};
use crate::agent::{ConversationTurn, Persona, Role};
use crate::tools::{ParseError, ToolName, ToolSchema};

/// A message in a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "system", "user", "assistant", "tool"
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            tool_calls: None,
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    pub fn tool(content: impl Into<String>, tool_name: Option<String>) -> Self {
        Self {
            tool_name,
            ..Self::new("tool", content)
        }
    }
}

/// A tool call from the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub function: FunctionCall,
}

/// Function call details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Tool definition for the model
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String, // Always "function"
    pub function: ToolFunction,
}

/// Function specification for a tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value, // JSON Schema
}

impl From<&ToolSchema> for Tool {
    fn from(schema: &ToolSchema) -> Self {
        Tool {
            tool_type: "function".to_string(),
            function: ToolFunction {
                name: schema.name.as_str().to_string(),
                description: schema.description.to_string(),
                parameters: schema.to_json_schema(),
            },
        }
    }
}

/// Response from /api/chat
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    #[serde(default)]
    pub eval_count: u32,
    #[serde(default)]
    pub eval_duration: u64,
}

/// Gateway for Ollama's /api/chat endpoint
#[derive(Clone)]
pub struct OllamaGateway {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaGateway {
    /// Create a new gateway
    ///
    /// # Arguments
    /// * `base_url` - Ollama server (e.g., "http://localhost:11434")
    /// * `model` - Model name (e.g., "qwen3")
    /// * `timeout` - Per-request timeout
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        })
    }

    /// Request body for /api/chat
    pub fn request_body(
        &self,
        transcript: &[ConversationTurn],
        persona: &Persona,
        tools: &[ToolSchema],
    ) -> serde_json::Value {
        let tools: Vec<Tool> = tools.iter().map(Tool::from).collect();
        serde_json::json!({
            "model": self.model,
            "messages": to_messages(transcript, persona),
            "tools": tools,
            "stream": false,
            "options": {
                "temperature": persona.temperature,
                "top_p": persona.top_p,
            }
        })
    }
}

#[async_trait]
impl ModelGateway for OllamaGateway {
    fn provider(&self) -> &str {
        "ollama"
    }

    async fn complete(
        &self,
        transcript: &[ConversationTurn],
        persona: &Persona,
        tools: &[ToolSchema],
    ) -> Result<GatewayResponse, ModelError> {
        let endpoint = format!("{}/api/chat", self.base_url);
        let body = self.request_body(transcript, persona, tools);

        let response = self
            .client
            .post(&endpoint)
            .json(&body)
            .send()
            .await
            .map_err(GatewayError::from)?;

        let status = response.status();
        let text = response.text().await.map_err(GatewayError::from)?;

        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: text,
            }
            .into());
        }
        if text.is_empty() {
            return Err(GatewayError::EmptyResponse.into());
        }

        let chat_response: ChatResponse =
            serde_json::from_str(&text).map_err(GatewayError::from)?;
        debug!(
            eval_count = chat_response.eval_count,
            eval_duration_ns = chat_response.eval_duration,
            "Ollama chat completed"
        );

        decode_response(chat_response.message, tools)
    }
}

/// Decode the assistant message; native tool calls first, then text fallback
pub fn decode_response(
    message: ChatMessage,
    tools: &[ToolSchema],
) -> Result<GatewayResponse, ModelError> {
    let (tool_calls, content) = match message.tool_calls.filter(|tc| !tc.is_empty()) {
        Some(native) => (native, message.content),
        None => {
            let found = find_tool_calls(&message.content);
            if found.is_empty() {
                // A call naming a known tool that could not be recovered
                if let Some(tool) = mentioned_tool(&message.content) {
                    return Err(ParseError::new(
                        Some(tool),
                        message.content.trim(),
                        "unparseable tool call in content",
                    )
                    .into());
                }
                (Vec::new(), message.content)
            } else {
                let prose = prose_around(&message.content, &found);
                (found.into_iter().map(|(_, call)| call).collect(), prose)
            }
        }
    };

    let calls = tool_calls
        .iter()
        .map(|tc| (tc.id.as_deref(), tc.function.name.as_str(), &tc.function.arguments));
    Ok(decode_reply(tools, calls, content)?)
}

fn to_messages(transcript: &[ConversationTurn], persona: &Persona) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(transcript.len() + 1);
    messages.push(ChatMessage::system(persona.system_prompt.clone()));

    for turn in transcript {
        let message = match turn.role {
            Role::User => ChatMessage::user(turn.content.clone()),
            Role::Assistant => {
                let mut msg = ChatMessage::assistant(turn.content.clone());
                if turn.has_tool_calls() {
                    msg.tool_calls = Some(
                        turn.tool_calls
                            .iter()
                            .map(|call| ToolCall {
                                id: None,
                                function: FunctionCall {
                                    name: call.tool_name.clone(),
                                    arguments: serde_json::json!(call.arguments),
                                },
                            })
                            .collect(),
                    );
                }
                msg
            }
            Role::Tool => ChatMessage::tool(turn.content.clone(), turn.tool_name.clone()),
        };
        messages.push(message);
    }

    messages
}

/// Try to parse tool calls from the response content text
///
/// This handles models that output tool calls as JSON in the text
/// instead of using the native tool_calls field. Only objects naming one of
/// the registered tools count; any other JSON in the text is left alone.
pub fn parse_tool_calls_from_text(content: &str) -> Vec<ToolCall> {
    find_tool_calls(content)
        .into_iter()
        .map(|(_, call)| call)
        .collect()
}

/// Tool calls in `content` with the byte range each one spans
fn find_tool_calls(content: &str) -> Vec<(Range<usize>, ToolCall)> {
    let mut tool_calls = Vec::new();

    // Try parsing the entire content as a tool call
    if let Some(tool_call) = try_parse_tool_call(content.trim()) {
        tool_calls.push((0..content.len(), tool_call));
        return tool_calls;
    }

    // Look for {...} objects embedded in the text
    let mut depth = 0usize;
    let mut start = None;

    for (i, c) in content.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        if let Some(tool_call) = try_parse_tool_call(&content[s..=i]) {
                            tool_calls.push((s..i + 1, tool_call));
                        }
                    }
                    start = None;
                }
            }
            _ => {}
        }
    }

    tool_calls
}

/// Text of `content` outside the recognised calls
fn prose_around(content: &str, calls: &[(Range<usize>, ToolCall)]) -> String {
    let mut parts = Vec::new();
    let mut cursor = 0;
    for (span, _) in calls {
        parts.push(content[cursor..span.start].trim());
        cursor = span.end;
    }
    parts.push(content[cursor..].trim());

    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Registered tool named by a `"name": "<tool>"` pair anywhere in `content`
fn mentioned_tool(content: &str) -> Option<&'static str> {
    const KEY: &str = "\"name\"";

    let mut rest = content;
    while let Some(pos) = rest.find(KEY) {
        rest = &rest[pos + KEY.len()..];
        let value = match rest.trim_start().strip_prefix(':') {
            Some(v) => v.trim_start(),
            None => continue,
        };
        if let Some(quoted) = value.strip_prefix('"') {
            let tool = ToolName::all()
                .iter()
                .map(|t| t.as_str())
                .find(|name| {
                    quoted
                        .strip_prefix(name)
                        .map_or(false, |tail| tail.starts_with('"'))
                });
            if tool.is_some() {
                return tool;
            }
        }
    }
    None
}

/// Try to parse a single tool call from a JSON string
fn try_parse_tool_call(json_str: &str) -> Option<ToolCall> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(json_str) {
        return parse_tool_call_from_value(&value);
    }

    // Fallback: repair unescaped quotes in the last string argument
    // e.g. {"name": "record_feedback", "arguments": {"question": "what is "KNN"?"}}
    let fixed = try_fix_malformed_json(json_str)?;
    let value = serde_json::from_str::<serde_json::Value>(&fixed).ok()?;
    parse_tool_call_from_value(&value)
}

/// Escape stray double quotes inside the final string value of the arguments
fn try_fix_malformed_json(json_str: &str) -> Option<String> {
    let end = json_str.rfind("\"}")?;
    let marker = "\": \"";
    let value_start = json_str[..end].rfind(marker)? + marker.len();

    let value = &json_str[value_start..end];
    if !value.contains('"') {
        return None;
    }
    let escaped = value
        .replace("\\\"", "\u{FFFF}") // Temporarily replace already-escaped quotes
        .replace('"', "\\\"")
        .replace('\u{FFFF}', "\\\"");

    Some(format!(
        "{}{}{}",
        &json_str[..value_start],
        escaped,
        &json_str[end..]
    ))
}

/// Parse a tool call from a JSON Value: {"name": "...", "arguments": {...}}
fn parse_tool_call_from_value(value: &serde_json::Value) -> Option<ToolCall> {
    let name = value.get("name").and_then(|n| n.as_str())?;
    ToolName::parse(name)?;

    // Some models use "parameters" instead of "arguments"
    let arguments = value
        .get("arguments")
        .or_else(|| value.get("parameters"))
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    Some(ToolCall {
        id: None,
        function: FunctionCall {
            name: name.to_string(),
            arguments,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool_schemas;

    fn gateway() -> OllamaGateway {
        OllamaGateway::new("http://localhost:11434/", "qwen3", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_chat_message_serialization() {
        let json = serde_json::to_string(&ChatMessage::user("test message")).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_name"));
    }

    #[test]
    fn test_request_body_carries_persona_and_tools() {
        let persona = Persona::strict_expert("docs");
        let transcript = vec![ConversationTurn::user("What is your mission?")];
        let body = gateway().request_body(&transcript, &persona, &tool_schemas());

        assert_eq!(body["model"], "qwen3");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "What is your mission?");
        assert_eq!(body["tools"].as_array().unwrap().len(), 4);
        assert_eq!(body["tools"][0]["type"], "function");
        assert!((body["options"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_parse_whole_content_tool_call() {
        let calls = parse_tool_calls_from_text(
            r#"{"name": "record_feedback", "arguments": {"question": "Dubai office?"}}"#,
        );
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "record_feedback");
        assert_eq!(calls[0].function.arguments["question"], "Dubai office?");
    }

    #[test]
    fn test_parse_embedded_tool_calls() {
        let text = r#"Sure. {"name": "record_customer_interest", "parameters": {"email": "a@b.c"}} and {"name": "record_feedback", "arguments": {"question": "q"}}"#;
        let calls = parse_tool_calls_from_text(text);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].function.arguments["email"], "a@b.c");
    }

    #[test]
    fn test_parse_ignores_unrelated_json() {
        assert!(parse_tool_calls_from_text(r#"Our plans: {"name": "Pro", "price": 10}"#).is_empty());
        assert!(parse_tool_calls_from_text("Our mission is to help SMBs.").is_empty());
    }

    #[test]
    fn test_parse_repairs_unescaped_quotes() {
        let calls = parse_tool_calls_from_text(
            r#"{"name": "record_feedback", "arguments": {"question": "what is "KNN"?"}}"#,
        );
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.arguments["question"], "what is \"KNN\"?");
    }

    #[test]
    fn test_chat_response_ignores_unused_fields() {
        let response: ChatResponse = serde_json::from_value(serde_json::json!({
            "model": "qwen3",
            "message": {"role": "assistant", "content": "Hello."},
            "done": true,
            "eval_count": 12
        }))
        .unwrap();
        assert_eq!(response.message.content, "Hello.");
        assert_eq!(response.eval_count, 12);
        assert_eq!(response.eval_duration, 0);
    }

    #[test]
    fn test_decode_native_tool_call() {
        let message: ChatMessage = serde_json::from_value(serde_json::json!({
            "role": "assistant",
            "content": "",
            "tool_calls": [{"function": {"name": "record_phone_contact", "arguments": {"phone": "+961-3-555555", "name": "Omar"}}}]
        }))
        .unwrap();

        match decode_response(message, &tool_schemas()).unwrap() {
            GatewayResponse::ToolCallReply { invocations, .. } => {
                assert_eq!(invocations.len(), 1);
                assert_eq!(invocations[0].arguments["phone"], "+961-3-555555");
            }
            other => panic!("expected tool call, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_bad_native_arguments() {
        let message: ChatMessage = serde_json::from_value(serde_json::json!({
            "role": "assistant",
            "content": "",
            "tool_calls": [{"function": {"name": "record_feedback", "arguments": {"question": {"text": "q"}}}}]
        }))
        .unwrap();

        assert!(matches!(
            decode_response(message, &tool_schemas()),
            Err(ModelError::Parse(_))
        ));
    }

    fn text_message(content: &str) -> ChatMessage {
        ChatMessage::assistant(content)
    }

    #[test]
    fn test_unrecoverable_text_call_is_parse_error() {
        let broken = r#"{"name": "record_feedback", "arguments": {"question": "Dubai office?""#;

        match decode_response(text_message(broken), &tool_schemas()) {
            Err(ModelError::Parse(e)) => {
                assert_eq!(e.tool_name.as_deref(), Some("record_feedback"));
                assert_eq!(e.raw, broken);
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_unregistered_name_stays_text() {
        let reply = r#"Our tiers: {"name": "Enterprise", "seats": 50"#;
        assert_eq!(
            decode_response(text_message(reply), &tool_schemas()).unwrap(),
            GatewayResponse::TextReply {
                content: reply.to_string()
            }
        );
    }

    #[test]
    fn test_embedded_call_keeps_surrounding_text() {
        let reply = r#"Sure. {"name": "record_feedback", "arguments": {"question": "q"}} I've noted it."#;

        match decode_response(text_message(reply), &tool_schemas()).unwrap() {
            GatewayResponse::ToolCallReply {
                invocations,
                content,
            } => {
                assert_eq!(invocations.len(), 1);
                assert_eq!(content, "Sure. I've noted it.");
            }
            other => panic!("expected tool call, got {:?}", other),
        }
    }

    #[test]
    fn test_whole_content_call_leaves_no_text() {
        let reply = r#" {"name": "record_feedback", "arguments": {"question": "q"}} "#;

        match decode_response(text_message(reply), &tool_schemas()).unwrap() {
            GatewayResponse::ToolCallReply { content, .. } => assert!(content.is_empty()),
            other => panic!("expected tool call, got {:?}", other),
        }
    }

    #[test]
    fn test_assistant_tool_calls_round_trip_into_messages() {
        let call = crate::tools::ToolInvocationRequest::new(
            "record_feedback",
            [("question".to_string(), "q".to_string())].into(),
        );
        let transcript = vec![
            ConversationTurn::user("q"),
            ConversationTurn::assistant_with_calls("", vec![call.clone()]),
        ];
        let messages = to_messages(&transcript, &Persona::strict_expert(""));
        let calls = messages[2].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "record_feedback");
        assert_eq!(calls[0].function.arguments["question"], "q");
    }
}

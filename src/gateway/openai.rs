//! OpenAI-compatible chat completions gateway

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{decode_reply, GatewayError, GatewayResponse, ModelError, ModelGateway};
use crate::agent::{ConversationTurn, Persona, Role};
use crate::tools::ToolSchema;

pub struct OpenAiGateway {
    api_base: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiGateway {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    pub fn request_body(
        &self,
        transcript: &[ConversationTurn],
        persona: &Persona,
        tools: &[ToolSchema],
    ) -> serde_json::Value {
        let tools: Vec<serde_json::Value> = tools
            .iter()
            .map(|schema| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": schema.name.as_str(),
                        "description": schema.description,
                        "parameters": schema.to_json_schema(),
                    }
                })
            })
            .collect();

        serde_json::json!({
            "model": self.model,
            "messages": to_messages(transcript, persona),
            "tools": tools,
            "tool_choice": "auto",
            "temperature": persona.temperature,
            "top_p": persona.top_p,
        })
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    fn provider(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        transcript: &[ConversationTurn],
        persona: &Persona,
        tools: &[ToolSchema],
    ) -> Result<GatewayResponse, ModelError> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = self.request_body(transcript, persona, tools);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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

        let data: serde_json::Value = serde_json::from_str(&text).map_err(GatewayError::from)?;
        parse_response(&data, tools)
    }
}

/// Parse the OpenAI-compatible JSON response into a [`GatewayResponse`]
pub fn parse_response(
    data: &serde_json::Value,
    tools: &[ToolSchema],
) -> Result<GatewayResponse, ModelError> {
    let message = data
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| GatewayError::Envelope("no choices in response".to_string()))?;

    if let Some(usage) = data.get("usage") {
        debug!(usage = %usage, "Chat completion usage");
    }

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();

    let empty = Vec::new();
    let tool_calls = message
        .get("tool_calls")
        .and_then(|v| v.as_array())
        .unwrap_or(&empty);

    let null = serde_json::Value::Null;
    let calls = tool_calls.iter().map(|tc| {
        let id = tc.get("id").and_then(|v| v.as_str());
        let function = tc.get("function");
        let name = function
            .and_then(|f| f.get("name"))
            .and_then(|v| v.as_str())
            .unwrap_or("");
        // Arguments come as a JSON string; decoding happens against the schema
        let arguments = function.and_then(|f| f.get("arguments")).unwrap_or(&null);
        (id, name, arguments)
    });

    Ok(decode_reply(tools, calls, content)?)
}

fn to_messages(transcript: &[ConversationTurn], persona: &Persona) -> Vec<serde_json::Value> {
    let mut messages = Vec::with_capacity(transcript.len() + 1);
    messages.push(serde_json::json!({"role": "system", "content": persona.system_prompt}));

    for turn in transcript {
        let message = match turn.role {
            Role::User => serde_json::json!({"role": "user", "content": turn.content}),
            Role::Assistant if turn.has_tool_calls() => {
                let calls: Vec<serde_json::Value> = turn
                    .tool_calls
                    .iter()
                    .map(|call| {
                        serde_json::json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.tool_name,
                                "arguments": serde_json::to_string(&call.arguments)
                                    .unwrap_or_else(|_| "{}".to_string()),
                            }
                        })
                    })
                    .collect();
                let content = if turn.content.is_empty() {
                    serde_json::Value::Null
                } else {
                    serde_json::Value::String(turn.content.clone())
                };
                serde_json::json!({"role": "assistant", "content": content, "tool_calls": calls})
            }
            Role::Assistant => serde_json::json!({"role": "assistant", "content": turn.content}),
            Role::Tool => match &turn.tool_call_id {
                Some(id) => serde_json::json!({
                    "role": "tool",
                    "tool_call_id": id,
                    "content": turn.content,
                }),
                // Tool messages must answer a call id; malformed calls have none
                None => serde_json::json!({
                    "role": "user",
                    "content": format!("[tool error] {}", turn.content),
                }),
            },
        };
        messages.push(message);
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{tool_schemas, ToolInvocationRequest};

    #[test]
    fn test_parse_text_reply() {
        let data = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": " Our mission is... "}}]
        });
        assert_eq!(
            parse_response(&data, &tool_schemas()).unwrap(),
            GatewayResponse::TextReply {
                content: "Our mission is...".to_string()
            }
        );
    }

    #[test]
    fn test_parse_tool_call_with_string_arguments() {
        let data = serde_json::json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {
                        "name": "record_customer_interest",
                        "arguments": "{\"email\": \"karim@orbit.ai\", \"name\": \"Karim\"}"
                    }
                }]
            }}]
        });

        match parse_response(&data, &tool_schemas()).unwrap() {
            GatewayResponse::ToolCallReply { invocations, content } => {
                assert!(content.is_empty());
                assert_eq!(invocations[0].id, "call_1");
                assert_eq!(invocations[0].arguments["email"], "karim@orbit.ai");
            }
            other => panic!("expected tool call, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_truncated_arguments_is_parse_error() {
        let data = serde_json::json!({
            "choices": [{"message": {"tool_calls": [{
                "id": "call_1",
                "function": {"name": "record_feedback", "arguments": "{\"question\": \"Dubai"}
            }]}}]
        });
        assert!(matches!(
            parse_response(&data, &tool_schemas()),
            Err(ModelError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_choices_is_gateway_error() {
        let data = serde_json::json!({"error": {"message": "overloaded"}});
        assert!(matches!(
            parse_response(&data, &tool_schemas()),
            Err(ModelError::Gateway(GatewayError::Envelope(_)))
        ));
    }

    #[test]
    fn test_messages_pair_calls_with_results() {
        let call = ToolInvocationRequest::new(
            "record_feedback",
            [("question".to_string(), "q".to_string())].into(),
        )
        .with_id("call_9");
        let result = crate::tools::ToolResult {
            tool_name: "record_feedback".to_string(),
            success: true,
            message: "Logged the question for follow-up.".to_string(),
            error: None,
        };
        let transcript = vec![
            ConversationTurn::user("q"),
            ConversationTurn::assistant_with_calls("", vec![call.clone()]),
            ConversationTurn::tool(&call, &result),
            ConversationTurn::tool_error(None, "malformed call: bad"),
        ];

        let messages = to_messages(&transcript, &Persona::strict_expert(""));
        assert_eq!(messages[2]["tool_calls"][0]["id"], "call_9");
        assert_eq!(messages[2]["tool_calls"][0]["function"]["arguments"], "{\"question\":\"q\"}");
        assert!(messages[2]["content"].is_null());
        assert_eq!(messages[3]["tool_call_id"], "call_9");
        assert_eq!(messages[4]["role"], "user");
    }
}

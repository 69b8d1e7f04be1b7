//! Tool registry: dispatches validated invocations to their sinks

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::schema::{tool_schemas, ToolName, ToolSchema};
use super::storage::{Record, Sinks};
use super::ToolError;

/// A tool call requested by the model, already decoded against its schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    /// Provider call id, or a generated UUIDv7 when the provider sends none
    pub id: String,
    pub tool_name: String,
    pub arguments: BTreeMap<String, String>,
}

impl ToolInvocationRequest {
    pub fn new(tool_name: impl Into<String>, arguments: BTreeMap<String, String>) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::now_v7().simple()),
            tool_name: tool_name.into(),
            arguments,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// `name(key='value', ...)`
    pub fn render(&self) -> String {
        let args: Vec<String> = self
            .arguments
            .iter()
            .map(|(k, v)| format!("{}='{}'", k, v))
            .collect();
        format!("{}({})", self.tool_name, args.join(", "))
    }
}

/// Outcome of executing one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
}

impl ToolResult {
    fn ok(tool: ToolName, message: String) -> Self {
        Self {
            tool_name: tool.as_str().to_string(),
            success: true,
            message,
            error: None,
        }
    }

    fn failed(tool_name: &str, error: &ToolError) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            success: false,
            message: format!("Error: {}", error),
            error: Some(error.to_string()),
        }
    }

    /// Text sent back to the model in the tool-role turn
    pub fn content(&self) -> &str {
        &self.message
    }
}

/// Fixed mapping from tool name to its side effect
pub struct ToolRegistry {
    sinks: Sinks,
    schemas: Vec<ToolSchema>,
}

impl ToolRegistry {
    pub fn new(sinks: Sinks) -> Self {
        Self {
            sinks,
            schemas: tool_schemas(),
        }
    }

    pub fn schemas(&self) -> &[ToolSchema] {
        &self.schemas
    }

    /// Execute one invocation. Failures come back as an unsuccessful result,
    /// never as a panic or an error the caller has to propagate.
    pub fn execute(&self, request: &ToolInvocationRequest) -> ToolResult {
        let Some(tool) = ToolName::parse(&request.tool_name) else {
            let err = ToolError::UnknownTool(request.tool_name.clone());
            warn!(tool = %request.tool_name, "Unknown tool requested");
            return ToolResult::failed(&request.tool_name, &err);
        };

        let outcome = match tool {
            ToolName::RecordCustomerInterest => self.record_customer_interest(&request.arguments),
            ToolName::RecordDemoRequest => self.record_demo_request(&request.arguments),
            ToolName::RecordPhoneContact => self.record_phone_contact(&request.arguments),
            ToolName::RecordFeedback => self.record_feedback(&request.arguments),
        };

        match outcome {
            Ok(message) => {
                info!(tool = %tool, "Tool succeeded");
                ToolResult::ok(tool, message)
            }
            Err(e) => {
                warn!(tool = %tool, error = %e, "Tool failed");
                ToolResult::failed(tool.as_str(), &e)
            }
        }
    }

    fn record_customer_interest(&self, args: &BTreeMap<String, String>) -> Result<String, ToolError> {
        let tool = ToolName::RecordCustomerInterest;
        let email = required(tool, args, "email")?;
        let name = optional(args, "name");
        let message = optional(args, "message");

        let record: Record = vec![
            ("email", email.clone()),
            ("name", name.clone()),
            ("message", message),
            ("timestamp", timestamp()),
        ];
        self.sinks.leads.append(&record)?;

        Ok(if name.is_empty() {
            format!("Recorded lead <{}>.", email)
        } else {
            format!("Recorded lead for {} <{}>.", name, email)
        })
    }

    fn record_demo_request(&self, args: &BTreeMap<String, String>) -> Result<String, ToolError> {
        let tool = ToolName::RecordDemoRequest;
        let email = required(tool, args, "email")?;
        let preferred_time = required(tool, args, "preferred_time")?;

        let record: Record = vec![
            ("email", email.clone()),
            ("name", optional(args, "name")),
            ("preferred_time", preferred_time.clone()),
            ("timestamp", timestamp()),
        ];
        self.sinks.demo_requests.append(&record)?;

        Ok(format!(
            "Demo request logged for <{}> ({}).",
            email, preferred_time
        ))
    }

    fn record_phone_contact(&self, args: &BTreeMap<String, String>) -> Result<String, ToolError> {
        let tool = ToolName::RecordPhoneContact;
        let phone = required(tool, args, "phone")?;
        let name = optional(args, "name");

        let record: Record = vec![
            ("name", name.clone()),
            ("phone", phone.clone()),
            ("notes", optional(args, "notes")),
            ("timestamp", timestamp()),
        ];
        self.sinks.phone_contacts.append(&record)?;

        Ok(if name.is_empty() {
            format!("Saved callback number {}.", phone)
        } else {
            format!("Saved callback number {} for {}.", phone, name)
        })
    }

    fn record_feedback(&self, args: &BTreeMap<String, String>) -> Result<String, ToolError> {
        let question = required(ToolName::RecordFeedback, args, "question")?;

        let record: Record = vec![("question", question), ("timestamp", timestamp())];
        self.sinks.feedback.append(&record)?;

        Ok("Logged the question for follow-up.".to_string())
    }
}

fn required(
    tool: ToolName,
    args: &BTreeMap<String, String>,
    field: &'static str,
) -> Result<String, ToolError> {
    match args.get(field).map(|v| v.trim()) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ToolError::Validation { tool, field }),
    }
}

fn optional(args: &BTreeMap<String, String>, field: &str) -> String {
    args.get(field).map(|v| v.trim().to_string()).unwrap_or_default()
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_lead_record_fields() {
        let (sinks, mem) = Sinks::in_memory();
        let registry = ToolRegistry::new(sinks);

        let result = registry.execute(&ToolInvocationRequest::new(
            "record_customer_interest",
            args(&[("email", " lina@example.com "), ("name", "Lina")]),
        ));

        assert!(result.success);
        assert_eq!(result.message, "Recorded lead for Lina <lina@example.com>.");
        let record = &mem.leads.records()[0];
        let fields: Vec<_> = record.iter().map(|(k, _)| *k).collect();
        assert_eq!(fields, vec!["email", "name", "message", "timestamp"]);
        assert_eq!(record[0].1, "lina@example.com");
        assert_eq!(record[2].1, "");
    }

    #[test]
    fn test_every_required_field_is_validated() {
        let cases: &[(&str, &[(&str, &str)], &str)] = &[
            ("record_customer_interest", &[("name", "Karim")], "email"),
            (
                "record_demo_request",
                &[("preferred_time", "next week")],
                "email",
            ),
            (
                "record_demo_request",
                &[("email", "lina@example.com")],
                "preferred_time",
            ),
            ("record_phone_contact", &[("name", "Omar")], "phone"),
            ("record_feedback", &[], "question"),
        ];

        for (tool, present, missing) in cases {
            let (sinks, mem) = Sinks::in_memory();
            let registry = ToolRegistry::new(sinks);

            let result = registry.execute(&ToolInvocationRequest::new(*tool, args(present)));

            assert!(!result.success, "{} without {} succeeded", tool, missing);
            assert_eq!(
                result.error,
                Some(format!("{} requires a non-empty '{}'", tool, missing))
            );
            let sink = match *tool {
                "record_customer_interest" => &mem.leads,
                "record_demo_request" => &mem.demo_requests,
                "record_phone_contact" => &mem.phone_contacts,
                _ => &mem.feedback,
            };
            assert!(sink.is_empty(), "{} appended a record", tool);
            assert_eq!(mem.total(), 0);
        }
    }

    #[test]
    fn test_whitespace_only_counts_as_missing() {
        let (sinks, mem) = Sinks::in_memory();
        let registry = ToolRegistry::new(sinks);

        let result = registry.execute(&ToolInvocationRequest::new(
            "record_feedback",
            args(&[("question", "   ")]),
        ));

        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("record_feedback requires a non-empty 'question'")
        );
        assert!(mem.feedback.is_empty());
    }

    #[test]
    fn test_unknown_tool_fails_without_side_effect() {
        let (sinks, mem) = Sinks::in_memory();
        let registry = ToolRegistry::new(sinks);

        let result = registry.execute(&ToolInvocationRequest::new("execute_code", BTreeMap::new()));

        assert!(!result.success);
        assert!(result.message.starts_with("Error: "));
        assert_eq!(mem.total(), 0);
    }

    #[test]
    fn test_render_invocation() {
        let req = ToolInvocationRequest::new(
            "record_phone_contact",
            args(&[("phone", "+961-3-555555"), ("name", "Omar")]),
        );
        assert_eq!(
            req.render(),
            "record_phone_contact(name='Omar', phone='+961-3-555555')"
        );
    }
}

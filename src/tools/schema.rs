//! Static tool schemas and argument decoding
//!
//! The four logging tools form a closed set. Their schemas are handed to the
//! model on every gateway call and used to validate the argument payloads the
//! model sends back before anything is dispatched.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::ParseError;

/// Name of one of the four registered tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    RecordCustomerInterest,
    RecordDemoRequest,
    RecordPhoneContact,
    RecordFeedback,
}

impl ToolName {
    pub fn all() -> [ToolName; 4] {
        [
            ToolName::RecordCustomerInterest,
            ToolName::RecordDemoRequest,
            ToolName::RecordPhoneContact,
            ToolName::RecordFeedback,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::RecordCustomerInterest => "record_customer_interest",
            ToolName::RecordDemoRequest => "record_demo_request",
            ToolName::RecordPhoneContact => "record_phone_contact",
            ToolName::RecordFeedback => "record_feedback",
        }
    }

    pub fn parse(name: &str) -> Option<ToolName> {
        Self::all().into_iter().find(|t| t.as_str() == name.trim())
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared shape of a single tool parameter
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    /// JSON Schema type, always "string" for the logging tools
    #[serde(rename = "type")]
    pub param_type: &'static str,
    pub description: &'static str,
    pub required: bool,
}

impl ParamSpec {
    const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            param_type: "string",
            description,
            required: true,
        }
    }

    const fn optional(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            param_type: "string",
            description,
            required: false,
        }
    }
}

/// Schema for one tool: name, description and ordered parameter list
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    pub name: ToolName,
    pub description: &'static str,
    pub parameters: Vec<ParamSpec>,
}

impl ToolSchema {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn required_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.parameters.iter().filter(|p| p.required)
    }

    /// JSON Schema for the `parameters` field of a function tool definition
    pub fn to_json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        for param in &self.parameters {
            properties.insert(
                param.name.to_string(),
                serde_json::json!({
                    "type": param.param_type,
                    "description": param.description,
                }),
            );
        }
        let required: Vec<&str> = self.required_params().map(|p| p.name).collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Decode a loosely-typed argument payload into a string map
    ///
    /// Accepts either a JSON object or a string containing one (OpenAI sends
    /// arguments as a JSON string). Unknown fields and non-scalar values are
    /// rejected; numbers and booleans are stringified; `null` is dropped.
    /// Missing required fields are NOT checked here, that is the registry's job.
    pub fn decode_arguments(
        &self,
        raw: &serde_json::Value,
    ) -> Result<BTreeMap<String, String>, ParseError> {
        let owned;
        let value = match raw {
            serde_json::Value::String(s) if s.trim().is_empty() => {
                return Ok(BTreeMap::new());
            }
            serde_json::Value::String(s) => {
                owned = serde_json::from_str::<serde_json::Value>(s).map_err(|e| {
                    ParseError::new(
                        Some(self.name.as_str()),
                        s.clone(),
                        format!("arguments are not valid JSON: {}", e),
                    )
                })?;
                if owned.is_null() {
                    return Ok(BTreeMap::new());
                }
                &owned
            }
            serde_json::Value::Null => return Ok(BTreeMap::new()),
            other => other,
        };

        let object = value.as_object().ok_or_else(|| {
            ParseError::new(
                Some(self.name.as_str()),
                value.to_string(),
                "arguments must be a JSON object",
            )
        })?;

        let mut arguments = BTreeMap::new();
        for (key, val) in object {
            if self.param(key).is_none() {
                return Err(ParseError::new(
                    Some(self.name.as_str()),
                    value.to_string(),
                    format!("unknown argument '{}'", key),
                ));
            }
            let text = match val {
                serde_json::Value::Null => continue,
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                    return Err(ParseError::new(
                        Some(self.name.as_str()),
                        value.to_string(),
                        format!("argument '{}' must be a string", key),
                    ));
                }
            };
            arguments.insert(key.clone(), text);
        }

        Ok(arguments)
    }
}

/// The fixed set of tool schemas, in registry order
pub fn tool_schemas() -> Vec<ToolSchema> {
    vec![
        ToolSchema {
            name: ToolName::RecordCustomerInterest,
            description: "Record a potential customer's contact info or interest. Call this whenever a user shares an email or explicitly asks to be contacted.",
            parameters: vec![
                ParamSpec::required("email", "Customer email address."),
                ParamSpec::optional("name", "Customer name."),
                ParamSpec::optional("message", "Short note about their need or interest."),
            ],
        },
        ToolSchema {
            name: ToolName::RecordDemoRequest,
            description: "Log a user's request for a product demo. Requires an email and a preferred time.",
            parameters: vec![
                ParamSpec::required("email", "Contact email for the demo invite."),
                ParamSpec::optional("name", "Name of the person requesting the demo."),
                ParamSpec::required("preferred_time", "When the user would like the demo, as they phrased it."),
            ],
        },
        ToolSchema {
            name: ToolName::RecordPhoneContact,
            description: "Store a prospect's phone number when they prefer a call back.",
            parameters: vec![
                ParamSpec::optional("name", "Name of the person to call."),
                ParamSpec::required("phone", "Phone number including country code if given."),
                ParamSpec::optional("notes", "What the call should be about."),
            ],
        },
        ToolSchema {
            name: ToolName::RecordFeedback,
            description: "If you cannot answer from the provided business documents, call this to log the user's question verbatim.",
            parameters: vec![ParamSpec::required("question", "The question we could not answer.")],
        },
    ]
}

/// Look up a schema by wire name
pub fn find_schema<'a>(schemas: &'a [ToolSchema], name: &str) -> Option<&'a ToolSchema> {
    let tool = ToolName::parse(name)?;
    schemas.iter().find(|s| s.name == tool)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(name: ToolName) -> ToolSchema {
        tool_schemas().into_iter().find(|s| s.name == name).unwrap()
    }

    #[test]
    fn test_schema_names_are_unique() {
        let schemas = tool_schemas();
        let mut names: Vec<_> = schemas.iter().map(|s| s.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_json_schema_lists_required() {
        let demo = schema(ToolName::RecordDemoRequest).to_json_schema();
        assert_eq!(demo["type"], "object");
        assert_eq!(demo["required"], serde_json::json!(["email", "preferred_time"]));
        assert_eq!(demo["properties"]["name"]["type"], "string");
    }

    #[test]
    fn test_decode_accepts_json_string() {
        let args = schema(ToolName::RecordFeedback)
            .decode_arguments(&serde_json::json!("{\"question\": \"Dubai office?\"}"))
            .unwrap();
        assert_eq!(args["question"], "Dubai office?");
    }

    #[test]
    fn test_decode_coerces_scalars_and_drops_null() {
        let args = schema(ToolName::RecordPhoneContact)
            .decode_arguments(&serde_json::json!({"phone": 9613555555u64, "name": null}))
            .unwrap();
        assert_eq!(args["phone"], "9613555555");
        assert!(!args.contains_key("name"));
    }

    #[test]
    fn test_decode_null_arguments_in_either_form() {
        let feedback = schema(ToolName::RecordFeedback);
        assert!(feedback
            .decode_arguments(&serde_json::Value::Null)
            .unwrap()
            .is_empty());
        assert!(feedback
            .decode_arguments(&serde_json::json!("null"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_decode_rejects_unknown_field() {
        let err = schema(ToolName::RecordFeedback)
            .decode_arguments(&serde_json::json!({"question": "q", "priority": "high"}))
            .unwrap_err();
        assert!(err.reason.contains("priority"));
        assert_eq!(err.tool_name.as_deref(), Some("record_feedback"));
    }

    #[test]
    fn test_decode_rejects_broken_json_and_nested_values() {
        let lead = schema(ToolName::RecordCustomerInterest);
        assert!(lead.decode_arguments(&serde_json::json!("{\"email\": ")).is_err());
        assert!(lead
            .decode_arguments(&serde_json::json!({"email": ["a@b.c"]}))
            .is_err());
        assert!(lead.decode_arguments(&serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn test_missing_required_is_not_a_parse_error() {
        let args = schema(ToolName::RecordDemoRequest)
            .decode_arguments(&serde_json::json!({"email": "a@b.c"}))
            .unwrap();
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_tool_name_parse() {
        assert_eq!(ToolName::parse("record_feedback"), Some(ToolName::RecordFeedback));
        assert_eq!(ToolName::parse("execute_code"), None);
    }
}

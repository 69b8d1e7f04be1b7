//! Persona x prompt evaluation harness
//!
//! Runs every prompt against every persona in isolation and tabulates reply
//! length, tool usage and error counts per run.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::agent::{AgentController, ConversationTurn, Persona};
use crate::tools::storage::quote_field;

const RESULT_FIELDS: &[&str] = &[
    "timestamp",
    "persona",
    "temperature",
    "top_p",
    "chain_of_thought",
    "prompt",
    "reply_len",
    "tool_uses",
    "errors",
    "status",
];

/// Prompts covering a plain question, a demo request, a callback and an
/// unanswerable question
pub fn default_prompts() -> Vec<String> {
    [
        "What is your mission?",
        "I'm Lina; my email is lina@example.com — can I get a demo next week?",
        "Call me at +961-3-555555, I'm Omar; need onboarding help.",
        "What are your enterprise pricing tiers and Dubai office address?",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

/// One evaluated run
#[derive(Debug, Clone, PartialEq)]
pub struct EvalRow {
    pub timestamp: String,
    pub persona: String,
    pub temperature: f32,
    pub top_p: f32,
    pub chain_of_thought: bool,
    pub prompt: String,
    /// Reply length in characters
    pub reply_len: usize,
    pub tool_uses: usize,
    pub errors: usize,
    pub status: String,
}

impl EvalRow {
    fn to_csv_line(&self) -> String {
        let values = [
            self.timestamp.clone(),
            self.persona.clone(),
            self.temperature.to_string(),
            self.top_p.to_string(),
            self.chain_of_thought.to_string(),
            self.prompt.clone(),
            self.reply_len.to_string(),
            self.tool_uses.to_string(),
            self.errors.to_string(),
            self.status.clone(),
        ];
        let quoted: Vec<String> = values.iter().map(|v| quote_field(v)).collect();
        quoted.join(",") + "\n"
    }
}

/// Run each prompt with a fresh transcript for each persona
///
/// Rows come back persona-major, in input order.
pub async fn run_matrix(
    controller: &AgentController,
    personas: &[Persona],
    prompts: &[String],
) -> Vec<EvalRow> {
    let mut rows = Vec::with_capacity(personas.len() * prompts.len());

    for persona in personas {
        for prompt in prompts {
            let outcome = controller
                .run(vec![ConversationTurn::user(prompt.as_str())], persona)
                .await;

            info!(
                persona = %persona.name,
                prompt = %prompt,
                status = outcome.status_label(),
                tool_uses = outcome.trace.tool_use_count(),
                "Evaluated prompt"
            );

            rows.push(EvalRow {
                timestamp: chrono::Utc::now()
                    .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                persona: persona.name.clone(),
                temperature: persona.temperature,
                top_p: persona.top_p,
                chain_of_thought: persona.chain_of_thought,
                prompt: prompt.clone(),
                reply_len: outcome.reply.chars().count(),
                tool_uses: outcome.trace.tool_use_count(),
                errors: outcome.trace.error_count(),
                status: outcome.status_label().to_string(),
            });
        }
    }

    rows
}

/// Write `rows` to `path` with a header, replacing any previous results
pub fn write_results_csv(path: &Path, rows: &[EvalRow]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut out = RESULT_FIELDS.join(",") + "\n";
    for row in rows {
        out.push_str(&row.to_csv_line());
    }

    let mut file = fs::File::create(path)?;
    file.write_all(out.as_bytes())?;
    info!(path = %path.display(), rows = rows.len(), "Wrote evaluation results");
    Ok(())
}

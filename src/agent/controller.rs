//! Agent Controller - the ReAct loop
//!
//! The AgentController alternates between the model gateway and the tool
//! registry until the model answers in plain text, the iteration bound is
//! hit, or the gateway fails.
//!
//! ```text
//!            ┌──────────────── ParseError (iteration += 1) ───────┐
//!            ▼                                                    │
//!      AWAIT_MODEL ── TextReply ──► DONE                          │
//!        │    │ └─────────────────────────────────────────────────┘
//!        │    └── GatewayError ──► FAILED
//!        │
//!     ToolCallReply
//!        ▼
//!   EXECUTING_TOOLS ── iteration += 1 ── bound reached? ──► DONE (truncated)
//!        │                                   │ no
//!        └───────────────────────────────────┴──► AWAIT_MODEL
//! ```

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::persona::Persona;
use super::trace::{ErrorKind, RunTrace, ToolActivity};
use super::transcript::{last_assistant_content, ConversationTurn};
use crate::gateway::{GatewayResponse, ModelError, ModelGateway};
use crate::metrics::{
    AGENT_ITERATIONS, AGENT_RUNS, GATEWAY_ERRORS, LLM_CALL_DURATION, PARSE_ERRORS, TOOL_CALLS,
};
use crate::tools::{ToolInvocationRequest, ToolRegistry};

/// Default bound on iterations (and therefore on model calls) per run
pub const DEFAULT_MAX_ITERATIONS: usize = 4;

/// Reply when a run fails before the model produced any text
pub const FALLBACK_REPLY: &str = "I'm having trouble right now, please retry.";

/// Reply when a run ends without any assistant text
pub const NO_CONTENT_REPLY: &str =
    "Thanks, I've noted that. Is there anything else I can help you with?";

/// Configuration for the agent controller
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum iterations (tool rounds plus malformed-call rounds) per run
    pub max_iterations: usize,
    pub fallback_reply: String,
    pub no_content_reply: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            fallback_reply: FALLBACK_REPLY.to_string(),
            no_content_reply: NO_CONTENT_REPLY.to_string(),
        }
    }
}

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Done,
    Failed,
}

/// Everything a caller gets back from one run
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub reply: String,
    pub trace: RunTrace,
    pub status: RunStatus,
    /// The iteration bound ended the run
    pub truncated: bool,
    pub iterations: usize,
    pub model_calls: usize,
    /// Input transcript plus every turn this run appended
    pub transcript: Vec<ConversationTurn>,
    pub trace_id: String,
}

impl RunOutcome {
    pub fn into_parts(self) -> (String, RunTrace) {
        (self.reply, self.trace)
    }

    /// "done", "truncated" or "failed"
    pub fn status_label(&self) -> &'static str {
        match (self.status, self.truncated) {
            (RunStatus::Failed, _) => "failed",
            (RunStatus::Done, true) => "truncated",
            (RunStatus::Done, false) => "done",
        }
    }
}

enum LoopState {
    AwaitModel,
    ExecutingTools(Vec<ToolInvocationRequest>),
    Done,
    Failed,
}

/// Mutable state owned by a single run
struct RunState {
    transcript: Vec<ConversationTurn>,
    /// Index of the first turn appended by this run
    run_start: usize,
    iteration_count: usize,
    model_calls: usize,
    truncated: bool,
    trace: RunTrace,
}

/// Agent Controller orchestrating the model gateway and the tool registry
pub struct AgentController {
    gateway: Arc<dyn ModelGateway>,
    registry: ToolRegistry,
    config: AgentConfig,
}

impl AgentController {
    /// Create a new agent controller
    ///
    /// # Arguments
    /// * `gateway` - Model gateway for completions
    /// * `registry` - Tool registry wired to its sinks
    /// * `config` - Agent configuration
    pub fn new(gateway: Arc<dyn ModelGateway>, registry: ToolRegistry, config: AgentConfig) -> Self {
        Self {
            gateway,
            registry,
            config,
        }
    }

    /// Run one turn: `history` plus a new user message
    pub async fn ask(
        &self,
        history: &[ConversationTurn],
        message: &str,
        persona: &Persona,
    ) -> RunOutcome {
        let mut transcript = history.to_vec();
        transcript.push(ConversationTurn::user(message));
        self.run(transcript, persona).await
    }

    /// Run the ReAct loop over `transcript` (prior history plus the new user turn)
    ///
    /// Never fails: gateway and tool errors end up in the returned trace.
    pub async fn run(&self, transcript: Vec<ConversationTurn>, persona: &Persona) -> RunOutcome {
        let trace_id = Uuid::now_v7().to_string();

        let root_span = info_span!(
            "agent_run",
            trace_id = %trace_id,
            persona = %persona.name,
            provider = %self.gateway.provider(),
            otel.name = "agent_run"
        );

        self.drive(transcript, persona, trace_id)
            .instrument(root_span)
            .await
    }

    async fn drive(
        &self,
        transcript: Vec<ConversationTurn>,
        persona: &Persona,
        trace_id: String,
    ) -> RunOutcome {
        info!(trace_id = %trace_id, turns = transcript.len(), "Starting agent run");

        let mut state = RunState {
            run_start: transcript.len(),
            transcript,
            iteration_count: 0,
            model_calls: 0,
            truncated: false,
            trace: RunTrace::default(),
        };

        let mut current = LoopState::AwaitModel;
        let status = loop {
            current = match current {
                LoopState::AwaitModel => self.await_model(&mut state, persona, &trace_id).await,
                LoopState::ExecutingTools(invocations) => {
                    self.execute_tools(&mut state, invocations, &trace_id)
                }
                LoopState::Done => break RunStatus::Done,
                LoopState::Failed => break RunStatus::Failed,
            };
        };

        self.finish(state, status, persona, trace_id)
    }

    async fn await_model(
        &self,
        state: &mut RunState,
        persona: &Persona,
        trace_id: &str,
    ) -> LoopState {
        let provider = self.gateway.provider().to_string();
        let llm_span = info_span!(
            "llm_call",
            trace_id = %trace_id,
            iteration = state.iteration_count,
            provider = %provider,
            otel.name = "llm_call"
        );

        state.model_calls += 1;
        let call_start = Instant::now();
        let response = self
            .gateway
            .complete(&state.transcript, persona, self.registry.schemas())
            .instrument(llm_span)
            .await;

        let duration_secs = call_start.elapsed().as_secs_f64();
        LLM_CALL_DURATION
            .with_label_values(&[&provider])
            .observe(duration_secs);
        debug!(
            trace_id = %trace_id,
            call = state.model_calls,
            duration_ms = duration_secs * 1000.0,
            "Model call returned"
        );

        match response {
            Ok(GatewayResponse::TextReply { content }) => {
                info!(trace_id = %trace_id, iterations = state.iteration_count, "Model answered");
                state.transcript.push(ConversationTurn::assistant(content));
                LoopState::Done
            }
            Ok(GatewayResponse::ToolCallReply {
                invocations,
                content,
            }) => {
                info!(trace_id = %trace_id, calls = invocations.len(), "Model requested tools");
                state
                    .transcript
                    .push(ConversationTurn::assistant_with_calls(content, invocations.clone()));
                LoopState::ExecutingTools(invocations)
            }
            Err(ModelError::Gateway(e)) => {
                warn!(trace_id = %trace_id, error = %e, "Model gateway failed");
                GATEWAY_ERRORS.inc();
                state.trace.record_error(ErrorKind::Gateway, e.to_string());
                LoopState::Failed
            }
            Err(ModelError::Parse(e)) => {
                warn!(trace_id = %trace_id, error = %e, raw = %e.raw, "Malformed tool call");
                PARSE_ERRORS.inc();
                state.transcript.push(ConversationTurn::tool_error(
                    e.tool_name.clone(),
                    format!(
                        "Error: {}. Retry the call with valid arguments or answer in plain text.",
                        e
                    ),
                ));
                state.trace.record_error(ErrorKind::Parse, e.to_string());
                self.complete_iteration(state, trace_id)
            }
        }
    }

    fn execute_tools(
        &self,
        state: &mut RunState,
        invocations: Vec<ToolInvocationRequest>,
        trace_id: &str,
    ) -> LoopState {
        // Strictly in request order: later calls may rely on earlier records
        for invocation in &invocations {
            let tool_span = info_span!(
                "tool_call",
                trace_id = %trace_id,
                tool = %invocation.tool_name,
                otel.name = "tool_call"
            );
            let _enter = tool_span.enter();

            info!(trace_id = %trace_id, call = %invocation.render(), "Executing tool");
            let result = self.registry.execute(invocation);

            let outcome = if result.success { "success" } else { "error" };
            TOOL_CALLS
                .with_label_values(&[&invocation.tool_name, outcome])
                .inc();

            if let Some(error) = &result.error {
                state
                    .trace
                    .record_error(ErrorKind::Tool, format!("{}: {}", invocation.tool_name, error));
            }
            state.trace.record_tool(ToolActivity {
                tool_name: invocation.tool_name.clone(),
                arguments: invocation.arguments.clone(),
                success: result.success,
                result: result.message.clone(),
            });
            state
                .transcript
                .push(ConversationTurn::tool(invocation, &result));
        }

        self.complete_iteration(state, trace_id)
    }

    fn complete_iteration(&self, state: &mut RunState, trace_id: &str) -> LoopState {
        state.iteration_count += 1;
        if state.iteration_count >= self.config.max_iterations {
            warn!(
                trace_id = %trace_id,
                iterations = state.iteration_count,
                "Max iterations reached"
            );
            state.truncated = true;
            state.trace.record_error(
                ErrorKind::Truncated,
                format!(
                    "stopped after {} iterations without a final answer",
                    state.iteration_count
                ),
            );
            LoopState::Done
        } else {
            LoopState::AwaitModel
        }
    }

    fn finish(
        &self,
        mut state: RunState,
        status: RunStatus,
        persona: &Persona,
        trace_id: String,
    ) -> RunOutcome {
        let reply = match last_assistant_content(&state.transcript[state.run_start..]) {
            Some(content) => content.to_string(),
            None if status == RunStatus::Failed => self.config.fallback_reply.clone(),
            None => self.config.no_content_reply.clone(),
        };

        // Close the transcript so it can be fed back as history
        if status == RunStatus::Failed || state.truncated {
            state.transcript.push(ConversationTurn::assistant(reply.clone()));
        }

        let outcome = RunOutcome {
            reply,
            trace: state.trace,
            status,
            truncated: state.truncated,
            iterations: state.iteration_count,
            model_calls: state.model_calls,
            transcript: state.transcript,
            trace_id,
        };

        AGENT_RUNS
            .with_label_values(&[&persona.name, outcome.status_label()])
            .inc();
        AGENT_ITERATIONS.observe(outcome.iterations as f64);
        info!(
            trace_id = %outcome.trace_id,
            status = outcome.status_label(),
            iterations = outcome.iterations,
            tool_calls = outcome.trace.tool_use_count(),
            errors = outcome.trace.error_count(),
            "Agent run finished"
        );

        outcome
    }
}

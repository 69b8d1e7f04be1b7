//! Prometheus metrics for the assistant
//!
//! Process-wide, write-only counters and histograms. They never feed back
//! into control flow.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_histogram_vec, Counter,
    CounterVec, Encoder, Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Run Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Completed controller runs.
    ///
    /// Labels:
    /// - persona: Persona name
    /// - status: "done", "truncated" or "failed"
    pub static ref AGENT_RUNS: CounterVec = register_counter_vec!(
        "bizbot_agent_runs_total",
        "Completed agent runs by persona and terminal status",
        &["persona", "status"]
    ).expect("failed to register AGENT_RUNS metric");

    /// Iterations consumed per run (tool rounds plus parse-error rounds).
    pub static ref AGENT_ITERATIONS: Histogram = register_histogram!(
        "bizbot_agent_iterations",
        "Iterations consumed per agent run",
        vec![0.0, 1.0, 2.0, 3.0, 4.0, 6.0, 8.0]
    ).expect("failed to register AGENT_ITERATIONS metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Tool Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Tool executions.
    ///
    /// Labels:
    /// - tool: Tool name
    /// - outcome: "success" or "error"
    pub static ref TOOL_CALLS: CounterVec = register_counter_vec!(
        "bizbot_tool_calls_total",
        "Tool executions by tool and outcome",
        &["tool", "outcome"]
    ).expect("failed to register TOOL_CALLS metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Model Gateway Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Gateway round-trip time in seconds, by provider.
    pub static ref LLM_CALL_DURATION: HistogramVec = register_histogram_vec!(
        "bizbot_llm_call_duration_seconds",
        "Model gateway round-trip duration",
        &["provider"],
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).expect("failed to register LLM_CALL_DURATION metric");

    /// Malformed tool-call payloads received from the model.
    pub static ref PARSE_ERRORS: Counter = register_counter!(
        "bizbot_parse_errors_total",
        "Malformed tool-call payloads from the model"
    ).expect("failed to register PARSE_ERRORS metric");

    /// Gateway failures that aborted a run.
    pub static ref GATEWAY_ERRORS: Counter = register_counter!(
        "bizbot_gateway_errors_total",
        "Model gateway failures"
    ).expect("failed to register GATEWAY_ERRORS metric");
}

/// Render every registered metric in the Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

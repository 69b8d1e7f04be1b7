//! BizBot - business assistant chatbot built on a bounded ReAct loop
//!
//! The assistant answers questions from a fixed set of business documents
//! and, when a visitor shares contact details or asks something the
//! documents don't cover, logs it through one of four tools.
//!
//! # Modules
//!
//! - `agent` - ReAct loop controller, personas, transcript and run trace
//! - `gateway` - Model gateways (OpenAI-compatible and Ollama) with tool calling
//! - `tools` - Tool schemas, registry and append-only sinks
//! - `config` - TOML configuration with environment overrides
//! - `knowledge` - Business document loading
//! - `eval` - Persona x prompt evaluation harness
//! - `metrics` - Prometheus metrics for observability
//! - `tracing` - Logging and optional OpenTelemetry export
//!
//! # Quick Start
//!
//! ```ignore
//! use bizbot::{AgentController, AgentConfig, AppConfig, Persona, Sinks, ToolRegistry};
//!
//! let config = AppConfig::load(None)?;
//! let gateway = bizbot::gateway::build_gateway(&config)?;
//! let registry = ToolRegistry::new(Sinks::csv_in(&config.storage_dir));
//! let controller = AgentController::new(gateway, registry, config.agent_config());
//!
//! let persona = Persona::friendly_advisor("We build KNN models for SMBs.");
//! let outcome = controller.ask(&[], "What is your mission?", &persona).await;
//! println!("{}", outcome.reply);
//! ```

pub mod agent;
pub mod config;
pub mod eval;
pub mod gateway;
pub mod knowledge;
pub mod metrics;
pub mod tools;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{
    AgentConfig, AgentController, ConversationTurn, Persona, Role, RunOutcome, RunStatus,
    RunTrace,
};
pub use config::{AppConfig, ConfigError, Provider};
pub use gateway::{GatewayError, GatewayResponse, ModelError, ModelGateway};
pub use tools::{ParseError, Sinks, StorageError, ToolError, ToolRegistry};

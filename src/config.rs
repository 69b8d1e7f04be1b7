//! Application configuration
//!
//! Loaded from an optional TOML file, then overridden from the environment.
//! Every field has a default so an empty file (or no file) is valid.
//!
//! ```toml
//! provider = "ollama"
//! model = "qwen3"
//! max_iterations = 4
//! knowledge_paths = ["me/business_summary.txt"]
//!
//! [[personas]]
//! name = "Strict Expert"
//! description = "a concise, formal assistant"
//! temperature = 0.2
//! top_p = 0.9
//! chain_of_thought = false
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::{AgentConfig, Persona, PersonaError};

pub use crate::agent::PersonaConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("invalid configuration: {0}")]
    Persona(#[from] PersonaError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    #[serde(alias = "open_ai")]
    OpenAi,
    Ollama,
}

impl Provider {
    fn parse(s: &str) -> Option<Provider> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Some(Provider::OpenAi),
            "ollama" => Some(Provider::Ollama),
            _ => None,
        }
    }
}

fn default_personas() -> Vec<PersonaConfig> {
    vec![PersonaConfig::friendly_advisor(), PersonaConfig::strict_expert()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: Provider,
    /// Model name; provider default when unset
    pub model: Option<String>,
    /// Endpoint base URL; provider default when unset
    pub base_url: Option<String>,
    /// API key for the openai provider. Usually supplied via OPENAI_API_KEY.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub max_iterations: usize,
    pub knowledge_paths: Vec<PathBuf>,
    pub storage_dir: PathBuf,
    pub otlp_endpoint: Option<String>,
    pub personas: Vec<PersonaConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: None,
            base_url: None,
            api_key: None,
            request_timeout_secs: 60,
            max_iterations: AgentConfig::default().max_iterations,
            knowledge_paths: vec![
                PathBuf::from("me/business_summary.txt"),
                PathBuf::from("me/about_business.txt"),
            ],
            storage_dir: PathBuf::from("data"),
            otlp_endpoint: None,
            personas: default_personas(),
        }
    }
}

impl AppConfig {
    /// Load from `path` (if given), apply environment overrides, validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|e| ConfigError::Read {
                    path: p.display().to_string(),
                    source: e,
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(p) = get("BIZBOT_PROVIDER") {
            self.provider = Provider::parse(&p)
                .ok_or_else(|| ConfigError::Invalid(format!("unknown provider '{}'", p)))?;
        }
        if let Some(model) = get("AGENT_MODEL") {
            self.model = Some(model);
        }
        if let Some(url) = get("BIZBOT_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(dir) = get("BIZBOT_STORAGE_DIR") {
            self.storage_dir = PathBuf::from(dir);
        }
        if let Some(endpoint) = get("BIZBOT_OTLP_ENDPOINT") {
            self.otlp_endpoint = Some(endpoint);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.provider == Provider::OpenAi
            && self.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "the openai provider needs an API key (set OPENAI_API_KEY)".to_string(),
            ));
        }
        if self.personas.is_empty() {
            return Err(ConfigError::Invalid("at least one persona is required".to_string()));
        }

        let mut seen = HashSet::new();
        for persona in &self.personas {
            if !seen.insert(persona.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate persona '{}'",
                    persona.name
                )));
            }
            persona.build("").validate()?;
        }
        Ok(())
    }

    pub fn model(&self) -> String {
        self.model.clone().unwrap_or_else(|| {
            match self.provider {
                Provider::OpenAi => "gpt-4.1-mini",
                Provider::Ollama => "qwen3",
            }
            .to_string()
        })
    }

    pub fn base_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| {
            match self.provider {
                Provider::OpenAi => "https://api.openai.com/v1",
                Provider::Ollama => "http://localhost:11434",
            }
            .to_string()
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_iterations: self.max_iterations,
            ..AgentConfig::default()
        }
    }

    /// Build every configured persona around `knowledge`
    pub fn personas(&self, knowledge: &str) -> Vec<Persona> {
        self.personas.iter().map(|p| p.build(knowledge)).collect()
    }

    /// Find a persona by case-insensitive name
    pub fn persona(&self, name: &str, knowledge: &str) -> Option<Persona> {
        self.personas
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
            .map(|p| p.build(knowledge))
    }
}

//! Personas: system prompt plus sampling parameters

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PersonaError {
    #[error("persona '{persona}': {param} {value} is outside [0, 1]")]
    OutOfRange {
        persona: String,
        param: &'static str,
        value: f32,
    },
}

/// Named configuration that shapes tone and determinism of replies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    /// Full system prompt, knowledge included
    pub system_prompt: String,
    pub temperature: f32,
    pub top_p: f32,
    pub chain_of_thought: bool,
}

impl Persona {
    /// Build a persona whose prompt is composed from `description` and `knowledge`
    pub fn new(
        name: impl Into<String>,
        description: &str,
        temperature: f32,
        top_p: f32,
        chain_of_thought: bool,
        knowledge: &str,
    ) -> Self {
        let name = name.into();
        let system_prompt = compose_system_prompt(&name, description, chain_of_thought, knowledge);
        Self {
            name,
            system_prompt,
            temperature,
            top_p,
            chain_of_thought,
        }
    }

    pub fn friendly_advisor(knowledge: &str) -> Self {
        PersonaConfig::friendly_advisor().build(knowledge)
    }

    pub fn strict_expert(knowledge: &str) -> Self {
        PersonaConfig::strict_expert().build(knowledge)
    }

    /// Check sampling parameters are within [0, 1]
    pub fn validate(&self) -> Result<(), PersonaError> {
        for (param, value) in [("temperature", self.temperature), ("top_p", self.top_p)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PersonaError::OutOfRange {
                    persona: self.name.clone(),
                    param,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Persona as written in the config file; the prompt is composed at load time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub name: String,
    pub description: String,
    pub temperature: f32,
    pub top_p: f32,
    #[serde(default)]
    pub chain_of_thought: bool,
}

impl PersonaConfig {
    pub fn friendly_advisor() -> Self {
        Self {
            name: "Friendly Advisor".to_string(),
            description: "a warm, encouraging assistant for prospective customers".to_string(),
            temperature: 0.6,
            top_p: 1.0,
            chain_of_thought: true,
        }
    }

    pub fn strict_expert() -> Self {
        Self {
            name: "Strict Expert".to_string(),
            description: "a concise, formal assistant that prioritizes correctness and brevity"
                .to_string(),
            temperature: 0.2,
            top_p: 0.9,
            chain_of_thought: false,
        }
    }

    pub fn build(&self, knowledge: &str) -> Persona {
        Persona::new(
            self.name.clone(),
            &self.description,
            self.temperature,
            self.top_p,
            self.chain_of_thought,
            knowledge,
        )
    }
}

/// Compose the grounding system prompt for a persona
pub fn compose_system_prompt(
    name: &str,
    description: &str,
    chain_of_thought: bool,
    knowledge: &str,
) -> String {
    let mut intro = format!(
        "You are {name}, {description}. \
         Use ONLY the provided business documents as ground truth. \
         If unsure or information is missing, call record_feedback(question). \
         Encourage users to leave name+email for follow-up when relevant. \
         If the user shares an email, call record_customer_interest; for demo requests call \
         record_demo_request; if they prefer a phone call, call record_phone_contact. \
         Never fabricate staff, addresses, or pricing."
    );
    if chain_of_thought {
        intro.push_str(
            " Use explicit ReAct formatting:\n\
             Thought: ...\n\
             Action: tool_name(args)\n\
             Observation: ...\n\
             Answer: ...\n",
        );
    }

    format!(
        "{}\n\n--- BUSINESS DOCUMENTS (verbatim) ---\n{}\n--- END DOCS ---",
        intro, knowledge
    )
}

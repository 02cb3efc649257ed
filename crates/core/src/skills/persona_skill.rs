//! # Persona Skill
//!
//! Prompt synthesis: writes the behavior prompt the generated agent receives at
//! runtime. Runs once, after the code cycle. A reply that cannot be parsed
//! even after repair fails the pipeline.

use super::llm_helpers::{request_structured, StructuredOutput};
use super::prompts::PROMPT_SYNTHESIZER;
use crate::errors::StageError;
use crate::gateway::{LlmGateway, LlmRequest};
use crate::state::{PersonalityConfig, Plan, Prompt, PromptSections, Requirements};
use crate::swarm::pipeline::Stage;
use tokio_util::sync::CancellationToken;

impl StructuredOutput for PromptSections {
    const KIND: &'static str = "prompt";
    const SHAPE: &'static str = r#"{"persona": "string", "task": "string", "behavioral_rules": ["string"], "custom_instructions": ["string"]}"#;

    fn check(&self) -> Result<(), String> {
        if self.persona.trim().is_empty() {
            return Err("persona is empty".to_string());
        }
        if self.task.trim().is_empty() {
            return Err("task is empty".to_string());
        }
        if self.behavioral_rules.iter().all(|rule| rule.trim().is_empty()) {
            return Err("behavioral_rules is empty".to_string());
        }
        Ok(())
    }
}

pub struct PersonaSkill;

impl PersonaSkill {
    pub async fn run(
        gateway: &LlmGateway,
        requirements: &Requirements,
        plan: &Plan,
        personality: Option<&PersonalityConfig>,
        cancel: &CancellationToken,
    ) -> Result<Prompt, StageError> {
        let mut input = format!(
            "Requirements:\n{}\n\nPlan:\n{}",
            requirements.render(),
            plan.render()
        );
        if let Some(personality) = personality.filter(|p| !p.is_empty()) {
            input.push_str(&format!("\n\nPersonality:\n{}", personality.render()));
        }

        let request = LlmRequest::new(Stage::PromptSynthesis.as_str(), PROMPT_SYNTHESIZER, input);
        let mut sections: PromptSections = request_structured(gateway, &request, cancel).await?;

        // caller-supplied instructions are kept verbatim
        if let Some(extra) = personality
            .map(|p| p.additional_instructions.trim())
            .filter(|extra| !extra.is_empty())
        {
            if !sections.custom_instructions.iter().any(|line| line.trim() == extra) {
                sections.custom_instructions.push(extra.to_string());
            }
        }

        let prompt = Prompt::assemble(sections);
        tracing::info!(chars = prompt.text.len(), "prompt synthesized");
        Ok(prompt)
    }
}

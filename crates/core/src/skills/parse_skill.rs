//! # Parse Skill
//!
//! Requirement extraction: one gateway call that turns the specification into
//! a [`Requirements`] record. Not cyclic; a specification that cannot be
//! extracted fails fast.
//!
//! Also parses a free-text personality description into a
//! [`PersonalityConfig`] when the caller did not supply a structured one.

use super::llm_helpers::{request_structured, StructuredOutput};
use super::prompts::{PERSONALITY_PARSER, REQUIREMENTS_EXTRACTOR};
use crate::errors::StageError;
use crate::gateway::{LlmGateway, LlmRequest};
use crate::state::{
    Enthusiasm, FillerFrequency, Formality, Pacing, PersonalityConfig, Requirements,
    Specification,
};
use crate::swarm::pipeline::Stage;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Gateway stage name for personality parsing
pub const PERSONALITY_STAGE: &str = "personality_parsing";

impl StructuredOutput for Requirements {
    const KIND: &'static str = "requirements";
    const SHAPE: &'static str = r#"{"core_goal": "string", "business_rules": ["string"], "constraints": ["string"], "integrations": ["string"], "knowledge_domains": ["string"], "requires_escalation": false, "escalation_triggers": ["string"], "tone": "string", "personality_traits": ["string"], "behavioral_guidelines": null, "multi_component": false}"#;

    fn check(&self) -> Result<(), String> {
        Requirements::check(self)
    }
}

/// Personality as the model writes it: every level is a loose label
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ParsedPersonality {
    identity: String,
    task: String,
    demeanor: String,
    tone: String,
    formality: String,
    enthusiasm: String,
    filler_words: String,
    pacing: String,
    additional_instructions: String,
}

impl StructuredOutput for ParsedPersonality {
    const KIND: &'static str = "personality";
    const SHAPE: &'static str = r#"{"identity": "string", "task": "string", "demeanor": "string", "tone": "string", "formality": "neutral", "enthusiasm": "moderate", "filler_words": "none", "pacing": "moderate", "additional_instructions": "string"}"#;

    fn check(&self) -> Result<(), String> {
        if self.identity.trim().is_empty() && self.task.trim().is_empty() {
            return Err("identity and task are both empty".to_string());
        }
        Ok(())
    }
}

impl From<ParsedPersonality> for PersonalityConfig {
    fn from(parsed: ParsedPersonality) -> Self {
        Self {
            formality: Formality::from_label(&parsed.formality).unwrap_or_default(),
            enthusiasm: Enthusiasm::from_label(&parsed.enthusiasm).unwrap_or_default(),
            filler_words: FillerFrequency::from_label(&parsed.filler_words).unwrap_or_default(),
            pacing: Pacing::from_label(&parsed.pacing).unwrap_or_default(),
            identity: parsed.identity,
            task: parsed.task,
            demeanor: parsed.demeanor,
            tone: parsed.tone,
            additional_instructions: parsed.additional_instructions,
        }
    }
}

/// Requirement extractor
pub struct ParseSkill;

impl ParseSkill {
    /// Extract requirements. An empty SOP is rejected without a gateway call.
    pub async fn run(
        gateway: &LlmGateway,
        specification: &Specification,
        personality: Option<&PersonalityConfig>,
        cancel: &CancellationToken,
    ) -> Result<Requirements, StageError> {
        if !specification.has_sop() {
            return Err(StageError::Invalid("SOP text is empty".to_string()));
        }

        let mut prompt = format!(
            "SOP:\n{}\n\nKnowledge base usage:\n{}\n\nHuman handoff:\n{}",
            specification.sop_text.trim(),
            or_none(&specification.knowledge_base_description),
            or_none(&specification.handoff_description),
        );
        if let Some(personality) = personality {
            prompt.push_str(&format!("\n\nPersonality:\n{}", personality.render()));
        }

        let request = LlmRequest::new(
            Stage::RequirementExtraction.as_str(),
            REQUIREMENTS_EXTRACTOR,
            prompt,
        );
        let requirements: Requirements = request_structured(gateway, &request, cancel).await?;

        tracing::info!(
            goal = %requirements.core_goal,
            rules = requirements.business_rules.len(),
            multi_component = requirements.multi_component,
            "requirements extracted"
        );
        Ok(requirements)
    }

    /// Parse a free-text personality description
    pub async fn parse_personality(
        gateway: &LlmGateway,
        specification: &Specification,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<PersonalityConfig, StageError> {
        let prompt = format!(
            "Personality description:\n{}\n\nSOP:\n{}\n\nKnowledge base:\n{}",
            description.trim(),
            specification.sop_text.trim(),
            or_none(&specification.knowledge_base_description),
        );
        let request = LlmRequest::new(PERSONALITY_STAGE, PERSONALITY_PARSER, prompt);
        let parsed: ParsedPersonality = request_structured(gateway, &request, cancel).await?;
        Ok(parsed.into())
    }
}

fn or_none(text: &str) -> &str {
    match text.trim() {
        "" => "(none provided)",
        trimmed => trimmed,
    }
}

//! # Pipeline State
//!
//! Everything one pipeline invocation knows. Owned by exactly one
//! invocation and never shared; concurrent pipelines are isolated by
//! construction.

use super::{
    Diagnostics, GeneratedCode, PersonalityConfig, PipelineOutcome, Plan, Prompt, Requirements,
    ReviewFeedback, Specification, Warning,
};
use crate::config::PipelineConfig;
use crate::swarm::events::PipelineEvent;
use crate::swarm::pipeline::Pipeline;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub pipeline: Pipeline,
    pub specification: Specification,
    /// Structured personality, either supplied or parsed from free text
    pub personality: Option<PersonalityConfig>,
    pub requirements: Option<Requirements>,
    pub plan: Option<Plan>,
    pub code: Option<GeneratedCode>,
    pub prompt: Option<Prompt>,
    /// Latest plan rejection, consumed by the next draft
    pub plan_feedback: Option<ReviewFeedback>,
    /// Latest code rejection, consumed by the next generation
    pub code_feedback: Option<ReviewFeedback>,
    pub validation_diagnostics: Vec<String>,
    pub warnings: Vec<Warning>,
    /// Audit log
    pub events: Vec<PipelineEvent>,
    pub outcome: Option<PipelineOutcome>,
}

impl PipelineState {
    pub fn new(specification: Specification, config: &PipelineConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            pipeline: Pipeline::new(config.max_plan_iterations, config.max_code_iterations),
            personality: specification.personality.clone(),
            specification,
            requirements: None,
            plan: None,
            code: None,
            prompt: None,
            plan_feedback: None,
            code_feedback: None,
            validation_diagnostics: Vec::new(),
            warnings: Vec::new(),
            events: Vec::new(),
            outcome: None,
        }
    }

    /// Attach a warning once
    pub fn warn(&mut self, warning: Warning) -> bool {
        if self.warnings.contains(&warning) {
            return false;
        }
        self.warnings.push(warning);
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }

    /// Snapshot for a failure report
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            counters: self.pipeline.counters,
            plan_review_count: self.plan.as_ref().map(|plan| plan.review_count),
            code_review_count: self.code.as_ref().map(|code| code.review_count),
            validation_diagnostics: self.validation_diagnostics.clone(),
            last_feedback: self
                .code_feedback
                .clone()
                .or_else(|| self.plan_feedback.clone()),
            requirements: self.requirements.clone(),
            plan: self.plan.clone(),
            warnings: self.warnings.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::pipeline::Stage;

    #[test]
    fn test_new_state_starts_at_extraction() {
        let spec = Specification::new("Answer questions", "", "", "kb-1");
        let state = PipelineState::new(spec, &PipelineConfig::default());
        assert_eq!(state.pipeline.stage, Stage::RequirementExtraction);
        assert_eq!(state.pipeline.max_plan_iterations, 3);
        assert!(!state.is_terminal());
        assert!(state.personality.is_none());
    }

    #[test]
    fn test_warn_deduplicates() {
        let mut state =
            PipelineState::new(Specification::default(), &PipelineConfig::default());
        assert!(state.warn(Warning::PlanUnconfirmed));
        assert!(!state.warn(Warning::PlanUnconfirmed));
        assert_eq!(state.warnings, vec![Warning::PlanUnconfirmed]);
        assert_eq!(state.diagnostics().warnings.len(), 1);
    }

    #[test]
    fn test_distinct_ids() {
        let config = PipelineConfig::default();
        let a = PipelineState::new(Specification::default(), &config);
        let b = PipelineState::new(Specification::default(), &config);
        assert_ne!(a.id, b.id);
    }
}

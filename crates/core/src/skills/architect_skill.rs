//! # Architect Skill
//!
//! Drafts the agent's architecture plan from requirements, or revises the
//! previous draft against reviewer feedback. One gateway call per draft.

use super::llm_helpers::{request_structured, StructuredOutput};
use super::prompts::PLAN_DRAFTER;
use crate::errors::StageError;
use crate::gateway::{LlmGateway, LlmRequest};
use crate::state::{Plan, PlanDraft, Requirements, ReviewFeedback, Specification};
use crate::swarm::pipeline::Stage;
use tokio_util::sync::CancellationToken;

impl StructuredOutput for PlanDraft {
    const KIND: &'static str = "plan";
    const SHAPE: &'static str = r#"{"architecture": "single_agent", "components": [{"name": "string", "responsibility": "string", "tools": ["retrieve"]}], "tool_bindings": [{"tool": "retrieve", "configuration": {}}], "interaction_patterns": "string", "system_prompt_outline": "string", "error_handling": "string", "constraints": null}"#;

    fn check(&self) -> Result<(), String> {
        PlanDraft::check(self)
    }
}

/// Plan drafter
pub struct ArchitectSkill;

impl ArchitectSkill {
    /// Draft a plan; `previous` and `feedback` are set when revising.
    pub async fn run(
        gateway: &LlmGateway,
        requirements: &Requirements,
        specification: &Specification,
        previous: Option<&Plan>,
        feedback: Option<&ReviewFeedback>,
        cancel: &CancellationToken,
    ) -> Result<PlanDraft, StageError> {
        let mut prompt = format!(
            "Requirements:\n{}\n\nKnowledge base id: {}",
            requirements.render(),
            match specification.knowledge_base_reference.trim() {
                "" => "(none)",
                reference => reference,
            }
        );
        if let (Some(previous), Some(feedback)) = (previous, feedback) {
            prompt.push_str(&format!(
                "\n\nPrevious plan:\n{}\n\nReview feedback to address:\n{}",
                previous.render(),
                feedback.render_for_revision()
            ));
        }

        let request = LlmRequest::new(Stage::PlanDrafting.as_str(), PLAN_DRAFTER, prompt);
        let mut draft: PlanDraft = request_structured(gateway, &request, cancel).await?;
        draft.bind_knowledge_base(&specification.knowledge_base_reference);

        tracing::info!(
            architecture = ?draft.architecture,
            components = draft.components.len(),
            tools = ?draft.tool_names(),
            revision = previous.is_some(),
            "plan drafted"
        );
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ArchitectureKind;
    use crate::test_support::{self, ScriptedModel};
    use std::sync::Arc;

    fn requirements() -> Requirements {
        Requirements {
            core_goal: "Answer billing questions".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_draft_binds_knowledge_base() {
        let model = Arc::new(ScriptedModel::new().script("plan_drafting", [test_support::plan_json()]));
        let gateway = test_support::gateway(model.clone());
        let spec = Specification::new("sop", "", "", "kb-billing");

        let draft = ArchitectSkill::run(
            &gateway,
            &requirements(),
            &spec,
            None,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(draft.architecture, ArchitectureKind::SingleAgent);
        assert_eq!(
            draft.tool_bindings[0].configuration["knowledge_base_id"],
            "kb-billing"
        );
        assert!(!model.calls()[0].prompt.contains("Previous plan"));
    }

    #[tokio::test]
    async fn test_revision_includes_feedback() {
        let model = Arc::new(ScriptedModel::new().script("plan_drafting", [test_support::plan_json()]));
        let gateway = test_support::gateway(model.clone());
        let spec = Specification::new("sop", "", "", "kb-billing");
        let previous = Plan::new(PlanDraft::default());
        let feedback = ReviewFeedback::unreadable("handoff missing");

        ArchitectSkill::run(
            &gateway,
            &requirements(),
            &spec,
            Some(&previous),
            Some(&feedback),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let prompt = &model.calls()[0].prompt;
        assert!(prompt.contains("Previous plan"));
        assert!(prompt.contains("[blocking] handoff missing"));
    }

    #[tokio::test]
    async fn test_plan_without_components_is_malformed() {
        let model = Arc::new(ScriptedModel::new().script(
            "plan_drafting",
            [Ok(r#"{"architecture": "single_agent", "components": []}"#.to_string())],
        ));
        let gateway = test_support::gateway(model);

        let result = ArchitectSkill::run(
            &gateway,
            &requirements(),
            &Specification::new("sop", "", "", ""),
            None,
            None,
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(StageError::Malformed { what: "plan", .. })));
    }
}

//! # Code Review Skill
//!
//! Semantic review of syntax-valid source. Never calls the sandbox; mechanical
//! validity is the generator's job.

use super::critic_skill::review_or_reject;
use super::prompts::CODE_REVIEWER;
use crate::config::PipelineConfig;
use crate::errors::StageError;
use crate::gateway::{LlmGateway, LlmRequest};
use crate::state::{GeneratedCode, Plan, Requirements, ReviewFeedback};
use crate::swarm::pipeline::Stage;
use tokio_util::sync::CancellationToken;

/// Code reviewer
pub struct CodeReviewSkill;

impl CodeReviewSkill {
    pub async fn run(
        gateway: &LlmGateway,
        code: &GeneratedCode,
        plan: &Plan,
        requirements: &Requirements,
        config: &PipelineConfig,
        cancel: &CancellationToken,
    ) -> Result<ReviewFeedback, StageError> {
        let prompt = format!(
            "Review iteration {} of {}.\nTarget language: {}\nMemory enabled: {}\n\nCode:\n```\n{}\n```\n\nPlan:\n{}\n\nRequirements:\n{}",
            code.review_count + 1,
            config.max_code_iterations,
            config.target_language,
            config.enable_memory,
            code.source,
            plan.render(),
            requirements.render()
        );
        let request = LlmRequest::new(Stage::CodeReview.as_str(), CODE_REVIEWER, prompt);
        let feedback = review_or_reject(gateway, &request, cancel).await?;

        tracing::info!(
            approved = feedback.approved,
            quality = ?feedback.quality_score,
            blocking = feedback.blocking_count(),
            "code reviewed"
        );
        Ok(feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PlanDraft;
    use crate::test_support::{self, ScriptedModel};
    use std::sync::Arc;

    fn code() -> GeneratedCode {
        GeneratedCode {
            source: test_support::AGENT_SOURCE.to_string(),
            syntax_valid: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_code_review_approves() {
        let model = Arc::new(ScriptedModel::new().script("code_review", [test_support::review_json(true)]));
        let gateway = test_support::gateway(model.clone());

        let feedback = CodeReviewSkill::run(
            &gateway,
            &code(),
            &Plan::new(PlanDraft::default()),
            &Requirements::default(),
            &PipelineConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(feedback.approved);
        assert_eq!(feedback.quality_score, Some(8));
        assert!(model.calls()[0].prompt.contains("def invoke(payload, context)"));
    }

    #[tokio::test]
    async fn test_quality_score_clamped() {
        let model = Arc::new(ScriptedModel::new().script(
            "code_review",
            [Ok(r#"{"approved": false, "quality_score": 0, "issues": []}"#.to_string())],
        ));
        let gateway = test_support::gateway(model);

        let feedback = CodeReviewSkill::run(
            &gateway,
            &code(),
            &Plan::new(PlanDraft::default()),
            &Requirements::default(),
            &PipelineConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(feedback.quality_score, Some(1));
    }
}

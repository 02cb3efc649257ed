//! # Critic Skill
//!
//! Plan reviewer. Evaluates a plan against the requirements and returns
//! [`ReviewFeedback`]. A reply that cannot be parsed even after repair counts
//! as a rejection with one blocking issue, so it still consumes a review
//! iteration and the cycle stays bounded.

use super::llm_helpers::{request_structured, StructuredOutput};
use super::prompts::PLAN_REVIEWER;
use crate::errors::StageError;
use crate::gateway::{LlmGateway, LlmRequest};
use crate::state::{Plan, Requirements, ReviewFeedback};
use crate::swarm::pipeline::Stage;
use tokio_util::sync::CancellationToken;

impl StructuredOutput for ReviewFeedback {
    const KIND: &'static str = "review";
    const SHAPE: &'static str = r#"{"approved": false, "summary": "string", "quality_score": null, "issues": [{"severity": "blocking | major | minor | suggestion", "description": "string", "suggested_fix": "string or null"}]}"#;
}

/// Run a review request, turning an unreadable reply into a rejection
pub(crate) async fn review_or_reject(
    gateway: &LlmGateway,
    request: &LlmRequest,
    cancel: &CancellationToken,
) -> Result<ReviewFeedback, StageError> {
    match request_structured::<ReviewFeedback>(gateway, request, cancel).await {
        Ok(feedback) => Ok(feedback.normalized()),
        Err(StageError::Malformed { detail, .. }) => {
            tracing::warn!(stage = request.stage, %detail, "unreadable review counted as rejection");
            Ok(ReviewFeedback::unreadable(detail))
        }
        Err(other) => Err(other),
    }
}

/// Plan reviewer
pub struct CriticSkill;

impl CriticSkill {
    /// Review `plan`. `iteration` is 1-based.
    pub async fn run(
        gateway: &LlmGateway,
        plan: &Plan,
        requirements: &Requirements,
        iteration: u32,
        max_iterations: u32,
        cancel: &CancellationToken,
    ) -> Result<ReviewFeedback, StageError> {
        let prompt = format!(
            "Review iteration {iteration} of {max_iterations}.\n\nPlan:\n{}\n\nRequirements:\n{}",
            plan.render(),
            requirements.render()
        );
        let request = LlmRequest::new(Stage::PlanReview.as_str(), PLAN_REVIEWER, prompt);
        let feedback = review_or_reject(gateway, &request, cancel).await?;

        tracing::info!(
            approved = feedback.approved,
            issues = feedback.issues.len(),
            blocking = feedback.blocking_count(),
            iteration,
            "plan reviewed"
        );
        Ok(feedback)
    }
}

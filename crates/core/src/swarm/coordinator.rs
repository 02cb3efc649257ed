//! # Pipeline Coordinator
//!
//! Drives one specification through the stage machine and returns an
//! artifact or a structured failure. The coordinator is cheap to clone and
//! holds no per-run state; every run owns its own [`PipelineState`], so
//! concurrent runs share only the gateway and sandbox handles.

use super::events::{PipelineEvent, PipelineEventKind};
use super::pipeline::{CycleExit, Stage};
use crate::config::{ExhaustionPolicy, PipelineConfig};
use crate::errors::{ConfigError, FailureKind, StageError};
use crate::gateway::LlmGateway;
use crate::skills::{
    ArchitectSkill, BuildRequest, BuilderSkill, CodeReviewSkill, CriticSkill, ParseSkill,
    PersonaSkill,
};
use crate::state::{
    Artifact, Plan, PipelineFailure, PipelineOutcome, PipelineState, Specification, Warning,
};
use crate::tools::{ToolName, ToolSandbox};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Why the current stage stopped the pipeline
#[derive(Debug)]
struct StageFailure {
    kind: FailureKind,
    reason: String,
}

impl StageFailure {
    fn from_error(error: StageError, semantic: FailureKind) -> Self {
        Self {
            kind: FailureKind::classify(&error, semantic),
            reason: error.to_string(),
        }
    }

    fn missing(what: &str, kind: FailureKind) -> Self {
        Self {
            kind,
            reason: format!("{what} missing from pipeline state"),
        }
    }
}

type StageResult = Result<(), StageFailure>;

/// The pipeline coordinator
#[derive(Clone)]
pub struct Coordinator {
    gateway: LlmGateway,
    sandbox: ToolSandbox,
    config: PipelineConfig,
    event_tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl Coordinator {
    /// Rejects configurations whose bounds could not hold (any zero bound)
    pub fn new(
        gateway: LlmGateway,
        sandbox: ToolSandbox,
        config: PipelineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            gateway,
            sandbox,
            config,
            event_tx: None,
        })
    }

    /// Stream events to a channel as they are recorded
    pub fn with_event_channel(mut self, tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline and return only the outcome
    pub async fn run(
        &self,
        specification: Specification,
        cancel: CancellationToken,
    ) -> PipelineOutcome {
        Self::into_outcome(self.execute(specification, cancel).await)
    }

    /// Run with a deadline; expiry is reported as `cancelled`
    pub async fn run_with_timeout(
        &self,
        specification: Specification,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> PipelineState {
        let token = cancel.child_token();
        let deadline = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                tracing::warn!(?timeout, "pipeline deadline reached");
                token.cancel();
            })
        };
        let state = self.execute(specification, token).await;
        deadline.abort();
        state
    }

    /// Final outcome of a finished run
    pub fn into_outcome(mut state: PipelineState) -> PipelineOutcome {
        match state.outcome.take() {
            Some(outcome) => outcome,
            None => PipelineOutcome::Failure(PipelineFailure {
                stage: state.pipeline.stage,
                kind: FailureKind::Cancelled,
                reason: "pipeline stopped without an outcome".to_string(),
                diagnostics: state.diagnostics(),
            }),
        }
    }

    /// Run the pipeline to a terminal outcome, returning the full state
    /// (outcome plus audit log).
    #[tracing::instrument(skip_all, fields(sop_preview = %specification.sop_preview(50)))]
    pub async fn execute(
        &self,
        specification: Specification,
        cancel: CancellationToken,
    ) -> PipelineState {
        let mut state = PipelineState::new(specification, &self.config);
        let pipeline_id = state.id;
        tracing::info!(%pipeline_id, "pipeline started");
        self.emit(
            &mut state,
            PipelineEvent::new(PipelineEventKind::PipelineStarted, Stage::RequirementExtraction)
                .with_data(json!({ "pipeline_id": pipeline_id })),
        );

        while !state.pipeline.is_complete() {
            let stage = state.pipeline.stage;
            if cancel.is_cancelled() {
                self.fail(
                    &mut state,
                    stage,
                    StageFailure {
                        kind: FailureKind::Cancelled,
                        reason: "call cancelled".to_string(),
                    },
                );
                break;
            }

            let entry = state.pipeline.enter();
            tracing::info!(stage = %stage, entry, "stage started");
            self.emit(
                &mut state,
                PipelineEvent::new(PipelineEventKind::StageStarted, stage)
                    .with_data(json!({ "entry": entry })),
            );

            let result = match stage {
                Stage::RequirementExtraction => self.extract_requirements(&mut state, &cancel).await,
                Stage::PlanDrafting => self.draft_plan(&mut state, &cancel).await,
                Stage::PlanReview => self.review_plan(&mut state, &cancel).await,
                Stage::CodeGeneration => self.generate_code(&mut state, &cancel).await,
                Stage::CodeReview => self.review_code(&mut state, &cancel).await,
                Stage::PromptSynthesis => self.synthesize_prompt(&mut state, &cancel).await,
                Stage::Complete | Stage::Failed => break,
            };

            match result {
                Ok(()) => self.emit(
                    &mut state,
                    PipelineEvent::new(PipelineEventKind::StageCompleted, stage),
                ),
                Err(failure) => self.fail(&mut state, stage, failure),
            }
        }

        if state.pipeline.is_success() {
            self.complete(&mut state);
        }
        state
    }

    async fn extract_requirements(
        &self,
        state: &mut PipelineState,
        cancel: &CancellationToken,
    ) -> StageResult {
        let description = state
            .specification
            .unparsed_personality()
            .filter(|_| state.specification.has_sop())
            .map(str::to_string);
        if let Some(description) = description {
            match ParseSkill::parse_personality(&self.gateway, &state.specification, &description, cancel)
                .await
            {
                Ok(personality) => state.personality = Some(personality),
                Err(error @ StageError::Call(_)) => {
                    return Err(StageFailure::from_error(error, FailureKind::ExtractionFailure))
                }
                Err(error) => {
                    tracing::warn!(%error, "personality description dropped");
                    self.raise_warning(state, Warning::PersonalityUnparsed, Stage::RequirementExtraction);
                }
            }
        }

        let requirements = ParseSkill::run(
            &self.gateway,
            &state.specification,
            state.personality.as_ref(),
            cancel,
        )
        .await
        .map_err(|e| StageFailure::from_error(e, FailureKind::ExtractionFailure))?;

        state.requirements = Some(requirements);
        state.pipeline.advance();
        Ok(())
    }

    async fn draft_plan(&self, state: &mut PipelineState, cancel: &CancellationToken) -> StageResult {
        let feedback = state.plan_feedback.take();
        let requirements = state
            .requirements
            .as_ref()
            .ok_or_else(|| StageFailure::missing("requirements", FailureKind::MalformedOutput))?;

        let draft = ArchitectSkill::run(
            &self.gateway,
            requirements,
            &state.specification,
            state.plan.as_ref(),
            feedback.as_ref(),
            cancel,
        )
        .await
        .map_err(|e| StageFailure::from_error(e, FailureKind::MalformedOutput))?;

        match state.plan.as_mut() {
            Some(plan) => plan.revise(draft),
            None => state.plan = Some(Plan::new(draft)),
        }
        state.pipeline.advance();
        Ok(())
    }

    async fn review_plan(&self, state: &mut PipelineState, cancel: &CancellationToken) -> StageResult {
        let iteration = state.pipeline.counters.plan_reviews;
        let (Some(plan), Some(requirements)) = (state.plan.as_ref(), state.requirements.as_ref())
        else {
            return Err(StageFailure::missing("plan", FailureKind::MalformedOutput));
        };

        let feedback = CriticSkill::run(
            &self.gateway,
            plan,
            requirements,
            iteration,
            self.config.max_plan_iterations,
            cancel,
        )
        .await
        .map_err(|e| StageFailure::from_error(e, FailureKind::MalformedOutput))?;

        if let Some(plan) = state.plan.as_mut() {
            plan.record_review(feedback.approved);
        }

        let issues = feedback.issues.len();
        match state.pipeline.route_plan_review(feedback.approved) {
            CycleExit::Approved => {
                self.emit(state, PipelineEvent::new(PipelineEventKind::PlanApproved, Stage::PlanReview));
                state.plan_feedback = None;
            }
            CycleExit::Revise => {
                tracing::warn!(iteration, issues, "plan rejected, revising");
                self.emit(
                    state,
                    PipelineEvent::new(PipelineEventKind::PlanRejected, Stage::PlanReview)
                        .with_data(json!({ "iteration": iteration, "issues": issues })),
                );
                state.plan_feedback = Some(feedback);
            }
            CycleExit::Exhausted => {
                self.emit(
                    state,
                    PipelineEvent::new(PipelineEventKind::PlanRejected, Stage::PlanReview)
                        .with_data(json!({ "iteration": iteration, "issues": issues, "exhausted": true })),
                );
                match self.config.plan_exhaustion {
                    ExhaustionPolicy::BestEffort => {
                        state.plan_feedback = None;
                        self.raise_warning(state, Warning::PlanUnconfirmed, Stage::PlanReview);
                    }
                    ExhaustionPolicy::Strict => {
                        state.plan_feedback = Some(feedback);
                        return Err(StageFailure {
                            kind: FailureKind::PlanningExhausted,
                            reason: format!("plan not approved after {iteration} review(s)"),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    async fn generate_code(&self, state: &mut PipelineState, cancel: &CancellationToken) -> StageResult {
        let feedback = state.code_feedback.take();
        let (Some(plan), Some(requirements)) = (state.plan.as_ref(), state.requirements.as_ref())
        else {
            return Err(StageFailure::missing("plan", FailureKind::GenerationSyntaxError));
        };

        let request = BuildRequest {
            config: &self.config,
            requirements,
            plan,
            specification: &state.specification,
            previous: state.code.as_ref(),
            feedback: feedback.as_ref(),
        };

        match BuilderSkill::run(&self.gateway, &self.sandbox, request, cancel).await {
            Ok(code) => {
                for call in &code.tool_calls {
                    let kind = match (call.tool, call.ok) {
                        (_, true) => PipelineEventKind::ToolInvoked,
                        (ToolName::Validate, false) => PipelineEventKind::ValidationFailed,
                        (ToolName::SearchDocs, false) => PipelineEventKind::ToolFailed,
                    };
                    self.emit(
                        state,
                        PipelineEvent::new(kind, Stage::CodeGeneration)
                            .with_data(json!({ "tool": call.tool.as_str(), "input": call.input })),
                    );
                }
                state.validation_diagnostics.clear();
                state.code = Some(code);
                state.pipeline.advance();
                Ok(())
            }
            Err(error) => {
                if let StageError::ValidationExhausted { attempts, diagnostics } = &error {
                    state.validation_diagnostics = diagnostics.clone();
                    self.emit(
                        state,
                        PipelineEvent::new(PipelineEventKind::ValidationFailed, Stage::CodeGeneration)
                            .with_data(json!({ "attempts": attempts, "diagnostics": diagnostics })),
                    );
                }
                Err(StageFailure::from_error(error, FailureKind::GenerationSyntaxError))
            }
        }
    }

    async fn review_code(&self, state: &mut PipelineState, cancel: &CancellationToken) -> StageResult {
        let (Some(code), Some(plan), Some(requirements)) = (
            state.code.as_ref(),
            state.plan.as_ref(),
            state.requirements.as_ref(),
        ) else {
            return Err(StageFailure::missing("code", FailureKind::GenerationSyntaxError));
        };

        let feedback =
            CodeReviewSkill::run(&self.gateway, code, plan, requirements, &self.config, cancel)
                .await
                .map_err(|e| StageFailure::from_error(e, FailureKind::MalformedOutput))?;

        let review_count = match state.code.as_mut() {
            Some(code) => {
                code.review_count += 1;
                code.review_count
            }
            None => 0,
        };

        match state.pipeline.route_code_review(feedback.approved) {
            CycleExit::Approved => {
                self.emit(
                    state,
                    PipelineEvent::new(PipelineEventKind::CodeApproved, Stage::CodeReview)
                        .with_data(json!({ "quality_score": feedback.quality_score })),
                );
                state.code_feedback = None;
            }
            CycleExit::Revise => {
                tracing::warn!(review_count, blocking = feedback.blocking_count(), "code rejected, regenerating");
                self.emit(
                    state,
                    PipelineEvent::new(PipelineEventKind::CodeRejected, Stage::CodeReview)
                        .with_data(json!({ "review": review_count, "issues": feedback.issues.len() })),
                );
                state.code_feedback = Some(feedback);
            }
            CycleExit::Exhausted => {
                self.emit(
                    state,
                    PipelineEvent::new(PipelineEventKind::CodeRejected, Stage::CodeReview)
                        .with_data(json!({ "review": review_count, "exhausted": true })),
                );
                match self.config.code_exhaustion {
                    ExhaustionPolicy::BestEffort => {
                        state.code_feedback = None;
                        self.raise_warning(state, Warning::CodeUnconfirmed, Stage::CodeReview);
                    }
                    ExhaustionPolicy::Strict => {
                        state.code_feedback = Some(feedback);
                        return Err(StageFailure {
                            kind: FailureKind::GenerationReviewExhausted,
                            reason: format!("code not approved after {review_count} review(s)"),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    async fn synthesize_prompt(
        &self,
        state: &mut PipelineState,
        cancel: &CancellationToken,
    ) -> StageResult {
        let (Some(plan), Some(requirements)) = (state.plan.as_ref(), state.requirements.as_ref())
        else {
            return Err(StageFailure::missing("plan", FailureKind::PromptSynthesisFailure));
        };

        let prompt = PersonaSkill::run(
            &self.gateway,
            requirements,
            plan,
            state.personality.as_ref(),
            cancel,
        )
        .await
        .map_err(|e| StageFailure::from_error(e, FailureKind::PromptSynthesisFailure))?;

        state.prompt = Some(prompt);
        state.pipeline.advance();
        Ok(())
    }

    /// Build the artifact. Only syntax-valid code ever leaves here.
    fn complete(&self, state: &mut PipelineState) {
        let artifact = match (state.code.as_ref(), state.prompt.as_ref()) {
            (Some(code), Some(prompt)) if code.syntax_valid => Artifact {
                code: code.source.clone(),
                prompt: prompt.text.clone(),
                warnings: state.warnings.clone(),
            },
            _ => {
                self.fail(
                    state,
                    Stage::CodeGeneration,
                    StageFailure {
                        kind: FailureKind::GenerationSyntaxError,
                        reason: "no syntax-valid code at completion".to_string(),
                    },
                );
                return;
            }
        };

        tracing::info!(
            pipeline_id = %state.id,
            warnings = artifact.warnings.len(),
            plan_reviews = state.pipeline.counters.plan_reviews,
            code_reviews = state.pipeline.counters.code_reviews,
            "pipeline completed"
        );
        self.emit(
            state,
            PipelineEvent::new(PipelineEventKind::PipelineCompleted, Stage::Complete).with_data(
                json!({ "warnings": artifact.warnings.iter().map(|w| w.as_str()).collect::<Vec<_>>() }),
            ),
        );
        state.outcome = Some(PipelineOutcome::Success(artifact));
    }

    fn fail(&self, state: &mut PipelineState, stage: Stage, failure: StageFailure) {
        state.pipeline.fail(stage);
        tracing::warn!(
            pipeline_id = %state.id,
            stage = %stage,
            kind = %failure.kind,
            reason = %failure.reason,
            "pipeline failed"
        );
        self.emit(
            state,
            PipelineEvent::new(PipelineEventKind::PipelineFailed, stage)
                .with_data(json!({ "kind": failure.kind, "reason": failure.reason })),
        );
        state.outcome = Some(PipelineOutcome::Failure(PipelineFailure {
            stage,
            kind: failure.kind,
            reason: failure.reason,
            diagnostics: state.diagnostics(),
        }));
    }

    fn raise_warning(&self, state: &mut PipelineState, warning: Warning, stage: Stage) {
        if state.warn(warning) {
            tracing::warn!(warning = %warning, "warning attached to artifact");
            self.emit(
                state,
                PipelineEvent::new(PipelineEventKind::WarningRaised, stage)
                    .with_data(json!({ "warning": warning })),
            );
        }
    }

    fn emit(&self, state: &mut PipelineState, event: PipelineEvent) {
        if let Some(tx) = &self.event_tx {
            // receiver gone means nobody is listening
            let _ = tx.send(event.clone());
        }
        state.events.push(event);
    }
}

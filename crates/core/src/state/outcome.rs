//! # Pipeline Outcome
//!
//! What a pipeline invocation returns: an artifact (code + prompt + warnings)
//! or a structured failure. There is no partial success; a failure never
//! carries code or prompt text.

use super::{Plan, Requirements, ReviewFeedback};
use crate::errors::FailureKind;
use crate::swarm::pipeline::{Stage, StageCounters};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Soft problems attached to a successful artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Warning {
    /// Plan review never approved; the last draft was used
    PlanUnconfirmed,
    /// Code review never approved; the last syntax-valid draft was used
    CodeUnconfirmed,
    /// Free-text personality could not be parsed and was dropped
    PersonalityUnparsed,
}

impl Warning {
    pub fn as_str(&self) -> &'static str {
        match self {
            Warning::PlanUnconfirmed => "plan_unconfirmed",
            Warning::CodeUnconfirmed => "code_unconfirmed",
            Warning::PersonalityUnparsed => "personality_unparsed",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deliverables of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Agent source, always syntax-valid
    pub code: String,
    /// Behavior prompt
    pub prompt: String,
    pub warnings: Vec<Warning>,
}

/// Partial state kept on failure, for diagnosis only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub counters: StageCounters,
    pub plan_review_count: Option<u32>,
    pub code_review_count: Option<u32>,
    /// Sandbox output from the last failed validation
    pub validation_diagnostics: Vec<String>,
    pub last_feedback: Option<ReviewFeedback>,
    pub requirements: Option<Requirements>,
    pub plan: Option<Plan>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineFailure {
    /// Stage that was running when the pipeline stopped
    pub stage: Stage,
    pub kind: FailureKind,
    pub reason: String,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Success(Artifact),
    Failure(PipelineFailure),
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success(_))
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            PipelineOutcome::Success(artifact) => Some(artifact),
            PipelineOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&PipelineFailure> {
        match self {
            PipelineOutcome::Failure(failure) => Some(failure),
            PipelineOutcome::Success(_) => None,
        }
    }

    /// `success` or the failure kind; stable across reruns with the same inputs
    pub fn classification(&self) -> &'static str {
        match self {
            PipelineOutcome::Success(_) => "success",
            PipelineOutcome::Failure(failure) => failure.kind.as_str(),
        }
    }
}

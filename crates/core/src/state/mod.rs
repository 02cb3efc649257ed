//! # Pipeline Data Model
//!
//! Entities threaded through the stages, the per-invocation
//! [`PipelineState`] aggregate, and the [`PipelineOutcome`] returned to
//! callers.

pub mod code;
pub mod outcome;
pub mod pipeline_state;
pub mod plan;
pub mod prompt;
pub mod requirements;
pub mod review;
pub mod specification;

pub use code::{ExecutionResult, GeneratedCode, ToolCallRecord};
pub use outcome::{Artifact, Diagnostics, PipelineFailure, PipelineOutcome, Warning};
pub use pipeline_state::PipelineState;
pub use plan::{ArchitectureKind, Component, Plan, PlanDraft, PlanStatus, ToolBinding};
pub use prompt::{Prompt, PromptSections};
pub use requirements::Requirements;
pub use review::{ReviewFeedback, ReviewIssue, Severity};
pub use specification::{
    Enthusiasm, FillerFrequency, Formality, Pacing, PersonalityConfig, Specification,
};

//! # Errors
//!
//! Error types for every layer of the pipeline, from raw backend failures up
//! to the failure taxonomy reported to callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single failed call to an external backend (LLM provider, sandbox,
/// documentation search).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered but refused the request (auth, bad model, ...)
    #[error("backend rejected request: {0}")]
    Rejected(String),
}

impl BackendError {
    /// Whether the call site should retry with backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::Timeout | BackendError::RateLimited(_) | BackendError::Transport(_)
        )
    }
}

/// External services the pipeline calls out to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    LanguageModel,
    Sandbox,
    DocSearch,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Service::LanguageModel => "language model",
            Service::Sandbox => "tool sandbox",
            Service::DocSearch => "documentation search",
        };
        f.write_str(name)
    }
}

/// Outcome of a retried, cancellable call through the gateway or sandbox
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("{service} unavailable after {attempts} attempt(s): {reason}")]
    Unavailable {
        service: Service,
        attempts: u32,
        reason: String,
    },

    #[error("call cancelled")]
    Cancelled,
}

/// Why a single stage could not produce its output
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Call(#[from] CallError),

    /// Output could not be parsed into the expected record, even after repair
    #[error("malformed {what} output: {detail}")]
    Malformed { what: &'static str, detail: String },

    /// Input was rejected before any backend call
    #[error("invalid input: {0}")]
    Invalid(String),

    /// No syntactically valid candidate within the validation-retry limit
    #[error("no syntactically valid code after {attempts} validation attempt(s)")]
    ValidationExhausted {
        attempts: u32,
        diagnostics: Vec<String>,
    },
}

/// Terminal failure classification surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ExtractionFailure,
    /// Only terminal under the strict exhaustion policy
    PlanningExhausted,
    /// A plan draft could not be parsed, even after repair
    MalformedOutput,
    GenerationSyntaxError,
    /// Only terminal under the strict exhaustion policy
    GenerationReviewExhausted,
    PromptSynthesisFailure,
    BackendUnavailable,
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ExtractionFailure => "extraction_failure",
            FailureKind::PlanningExhausted => "planning_exhausted",
            FailureKind::MalformedOutput => "malformed_output",
            FailureKind::GenerationSyntaxError => "generation_syntax_error",
            FailureKind::GenerationReviewExhausted => "generation_review_exhausted",
            FailureKind::PromptSynthesisFailure => "prompt_synthesis_failure",
            FailureKind::BackendUnavailable => "backend_unavailable",
            FailureKind::Cancelled => "cancelled",
        }
    }

    /// Infrastructure problems, as opposed to content problems
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, FailureKind::BackendUnavailable | FailureKind::Cancelled)
    }

    /// Classify a stage error. `semantic` is the kind reported when the stage
    /// itself failed on content rather than on infrastructure.
    pub fn classify(error: &StageError, semantic: FailureKind) -> FailureKind {
        match error {
            StageError::Call(CallError::Cancelled) => FailureKind::Cancelled,
            StageError::Call(CallError::Unavailable { .. }) => FailureKind::BackendUnavailable,
            StageError::ValidationExhausted { .. } => FailureKind::GenerationSyntaxError,
            StageError::Malformed { .. } | StageError::Invalid(_) => semantic,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BackendError::Timeout.is_transient());
        assert!(BackendError::RateLimited("429".into()).is_transient());
        assert!(!BackendError::Rejected("bad key".into()).is_transient());
    }

    #[test]
    fn test_classify_keeps_infra_distinct() {
        let unavailable = StageError::Call(CallError::Unavailable {
            service: Service::LanguageModel,
            attempts: 4,
            reason: "timeout".into(),
        });
        assert_eq!(
            FailureKind::classify(&unavailable, FailureKind::ExtractionFailure),
            FailureKind::BackendUnavailable
        );

        let malformed = StageError::Malformed {
            what: "requirements",
            detail: "missing core_goal".into(),
        };
        assert_eq!(
            FailureKind::classify(&malformed, FailureKind::ExtractionFailure),
            FailureKind::ExtractionFailure
        );

        let cancelled = StageError::Call(CallError::Cancelled);
        assert!(FailureKind::classify(&cancelled, FailureKind::PromptSynthesisFailure)
            .is_infrastructure());
    }

    #[test]
    fn test_failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::GenerationSyntaxError).unwrap();
        assert_eq!(json, "\"generation_syntax_error\"");
        assert_eq!(FailureKind::GenerationSyntaxError.to_string(), "generation_syntax_error");
    }
}

//! Generated agent source and what the sandbox said about it.

use crate::tools::{ToolName, ValidationReport};
use serde::{Deserialize, Serialize};

/// Outcome of the optional execution step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    #[default]
    NotRun,
    Passed,
    Failed { diagnostics: Vec<String> },
}

impl ExecutionResult {
    pub fn from_report(report: &ValidationReport) -> Self {
        match report.execution_ok {
            None => ExecutionResult::NotRun,
            Some(true) => ExecutionResult::Passed,
            Some(false) => ExecutionResult::Failed {
                diagnostics: report.diagnostics.clone(),
            },
        }
    }
}

/// One tool invocation made while generating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: ToolName,
    /// Query or a short description of the input
    pub input: String,
    pub ok: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCode {
    pub source: String,
    pub syntax_valid: bool,
    pub execution: ExecutionResult,
    /// Code reviews performed so far
    pub review_count: u32,
    /// Validation attempts in the generation stage that produced this source
    pub validation_attempts: u32,
    pub documentation_references: Vec<String>,
    pub implementation_notes: String,
    pub tool_calls: Vec<ToolCallRecord>,
}

impl GeneratedCode {
    /// Carry the review count over from the previous draft
    pub fn inherit_reviews(mut self, previous: Option<&GeneratedCode>) -> Self {
        self.review_count = previous.map(|code| code.review_count).unwrap_or(0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_from_report() {
        assert_eq!(
            ExecutionResult::from_report(&ValidationReport::valid()),
            ExecutionResult::NotRun
        );
        let failed = ValidationReport {
            syntax_valid: true,
            execution_ok: Some(false),
            diagnostics: vec!["ImportError".into()],
        };
        assert_eq!(
            ExecutionResult::from_report(&failed),
            ExecutionResult::Failed {
                diagnostics: vec!["ImportError".into()]
            }
        );
    }

    #[test]
    fn test_inherit_reviews() {
        let previous = GeneratedCode {
            review_count: 2,
            ..Default::default()
        };
        let next = GeneratedCode::default().inherit_reviews(Some(&previous));
        assert_eq!(next.review_count, 2);
        assert_eq!(GeneratedCode::default().inherit_reviews(None).review_count, 0);
    }
}

//! Review feedback produced by the plan and code reviewers. Consumed by the
//! next draft and then dropped.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Blocking,
    Major,
    #[default]
    Minor,
    Suggestion,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewIssue {
    pub severity: Severity,
    pub description: String,
    pub suggested_fix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewFeedback {
    pub approved: bool,
    pub summary: String,
    pub issues: Vec<ReviewIssue>,
    /// 1 (poor) to 10 (production ready); code reviews only
    pub quality_score: Option<u8>,
}

impl ReviewFeedback {
    /// Rejection standing in for a review reply that could not be parsed
    pub fn unreadable(detail: impl Into<String>) -> Self {
        Self {
            approved: false,
            summary: "review output could not be parsed".to_string(),
            issues: vec![ReviewIssue {
                severity: Severity::Blocking,
                description: detail.into(),
                suggested_fix: None,
            }],
            quality_score: None,
        }
    }

    /// Clamp out-of-range scores and order issues most severe first
    pub fn normalized(mut self) -> Self {
        self.quality_score = self.quality_score.map(|score| score.clamp(1, 10));
        self.issues.sort_by_key(|issue| issue.severity);
        self
    }

    pub fn blocking_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Blocking)
            .count()
    }

    /// Text handed to the next draft
    pub fn render_for_revision(&self) -> String {
        let mut out = String::new();
        if !self.summary.trim().is_empty() {
            out.push_str(self.summary.trim());
            out.push('\n');
        }
        for issue in &self.issues {
            let severity = serde_json::to_value(issue.severity)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            out.push_str(&format!("- [{severity}] {}", issue.description.trim()));
            if let Some(fix) = issue.suggested_fix.as_deref().filter(|f| !f.trim().is_empty()) {
                out.push_str(&format!("\n  fix: {}", fix.trim()));
            }
            out.push('\n');
        }
        out
    }
}

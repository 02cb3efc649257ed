//! # Plan
//!
//! Architecture for the agent to be generated. Drafted and revised by the
//! planner, approved or rejected by the plan reviewer.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Tool that gives the generated agent access to the knowledge base
pub const RETRIEVAL_TOOL: &str = "retrieve";
/// Tool that hands the conversation to a human
pub const HANDOFF_TOOL: &str = "handoff_to_user";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchitectureKind {
    #[default]
    SingleAgent,
    MultiAgent,
}

/// One agent (or sub-agent) in the plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Component {
    pub name: String,
    pub responsibility: String,
    /// Tools this component uses
    pub tools: Vec<String>,
}

/// A tool plus its configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolBinding {
    pub tool: String,
    pub configuration: Value,
}

/// What the planner produces on each draft
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanDraft {
    pub architecture: ArchitectureKind,
    pub components: Vec<Component>,
    pub tool_bindings: Vec<ToolBinding>,
    /// Message flow, handoff and tool activation, in prose
    pub interaction_patterns: String,
    pub system_prompt_outline: String,
    pub error_handling: String,
    pub constraints: Option<String>,
}

impl PlanDraft {
    pub fn check(&self) -> Result<(), String> {
        if self.components.is_empty() {
            return Err("plan has no components".to_string());
        }
        if let Some(unnamed) = self.components.iter().position(|c| c.name.trim().is_empty()) {
            return Err(format!("component {} has no name", unnamed + 1));
        }
        if self.architecture == ArchitectureKind::SingleAgent && self.components.len() > 1 {
            return Err(format!(
                "single_agent plan lists {} components",
                self.components.len()
            ));
        }
        Ok(())
    }

    /// Point the retrieval tool at the caller's knowledge base, adding the
    /// binding when the draft left it out.
    pub fn bind_knowledge_base(&mut self, reference: &str) {
        if reference.trim().is_empty() {
            return;
        }
        let configuration = json!({ "knowledge_base_id": reference });
        match self
            .tool_bindings
            .iter_mut()
            .find(|binding| binding.tool == RETRIEVAL_TOOL)
        {
            Some(binding) => match &mut binding.configuration {
                Value::Object(map) => {
                    map.insert("knowledge_base_id".to_string(), json!(reference));
                }
                other => *other = configuration,
            },
            None => self.tool_bindings.push(ToolBinding {
                tool: RETRIEVAL_TOOL.to_string(),
                configuration,
            }),
        }
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tool_bindings.iter().map(|b| b.tool.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Drafted,
    Approved,
    RejectedRevise,
}

/// A draft plus its review bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(flatten)]
    pub draft: PlanDraft,
    /// Reviews performed so far, across revisions
    pub review_count: u32,
    pub status: PlanStatus,
}

impl Plan {
    pub fn new(draft: PlanDraft) -> Self {
        Self {
            draft,
            review_count: 0,
            status: PlanStatus::Drafted,
        }
    }

    /// Replace the draft, keeping the review count
    pub fn revise(&mut self, draft: PlanDraft) {
        self.draft = draft;
        self.status = PlanStatus::Drafted;
    }

    pub fn record_review(&mut self, approved: bool) {
        self.review_count += 1;
        self.status = if approved {
            PlanStatus::Approved
        } else {
            PlanStatus::RejectedRevise
        };
    }

    pub fn is_approved(&self) -> bool {
        self.status == PlanStatus::Approved
    }

    /// Stage-input rendering
    pub fn render(&self) -> String {
        serde_json::to_string_pretty(&self.draft).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> PlanDraft {
        PlanDraft {
            components: vec![Component {
                name: "support_agent".into(),
                responsibility: "Answer billing questions".into(),
                tools: vec![RETRIEVAL_TOOL.into()],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_check() {
        assert!(draft().check().is_ok());
        assert!(PlanDraft::default().check().is_err());

        let mut too_many = draft();
        too_many.components.push(Component {
            name: "second".into(),
            ..Default::default()
        });
        assert!(too_many.check().is_err());
        too_many.architecture = ArchitectureKind::MultiAgent;
        assert!(too_many.check().is_ok());
    }

    #[test]
    fn test_bind_knowledge_base_adds_or_patches() {
        let mut plan = draft();
        plan.bind_knowledge_base("kb-42");
        assert_eq!(plan.tool_names(), vec![RETRIEVAL_TOOL]);
        assert_eq!(
            plan.tool_bindings[0].configuration["knowledge_base_id"],
            "kb-42"
        );

        plan.tool_bindings[0].configuration = json!({"knowledge_base_id": "stale", "top_k": 5});
        plan.bind_knowledge_base("kb-43");
        assert_eq!(plan.tool_bindings.len(), 1);
        assert_eq!(plan.tool_bindings[0].configuration["knowledge_base_id"], "kb-43");
        assert_eq!(plan.tool_bindings[0].configuration["top_k"], 5);

        let mut untouched = draft();
        untouched.bind_knowledge_base("  ");
        assert!(untouched.tool_bindings.is_empty());
    }

    #[test]
    fn test_review_bookkeeping_survives_revision() {
        let mut plan = Plan::new(draft());
        plan.record_review(false);
        assert_eq!(plan.status, PlanStatus::RejectedRevise);

        plan.revise(draft());
        assert_eq!(plan.status, PlanStatus::Drafted);
        assert_eq!(plan.review_count, 1);

        plan.record_review(true);
        assert!(plan.is_approved());
        assert_eq!(plan.review_count, 2);
    }

    #[test]
    fn test_plan_serializes_flat() {
        let plan = Plan::new(draft());
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["architecture"], "single_agent");
        assert_eq!(value["status"], "drafted");
        assert_eq!(value["review_count"], 0);
    }
}

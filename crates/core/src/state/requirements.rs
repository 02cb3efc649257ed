//! Structured requirements extracted from a [`Specification`](super::Specification).
//! Created once; read-only afterwards.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Requirements {
    /// Primary business objective
    pub core_goal: String,
    pub business_rules: Vec<String>,
    pub constraints: Vec<String>,
    /// External systems or tools the agent needs
    pub integrations: Vec<String>,
    /// Knowledge the agent must draw on (usually via retrieval)
    pub knowledge_domains: Vec<String>,
    pub requires_escalation: bool,
    pub escalation_triggers: Vec<String>,
    pub tone: String,
    pub personality_traits: Vec<String>,
    pub behavioral_guidelines: Option<String>,
    /// Whether the SOP calls for several cooperating agents
    pub multi_component: bool,
}

impl Requirements {
    /// Reject records that parsed but carry no usable content
    pub fn check(&self) -> Result<(), String> {
        if self.core_goal.trim().is_empty() {
            return Err("core_goal is empty".to_string());
        }
        Ok(())
    }

    /// Stage-input rendering
    pub fn render(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.core_goal.clone())
    }
}

//! The final behavior prompt. Structure is fixed, content is free text:
//!
//! ```text
//! # Persona
//! # Task
//! # Behavioral Rules
//! # Custom Instructions
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSections {
    pub persona: String,
    pub task: String,
    pub behavioral_rules: Vec<String>,
    pub custom_instructions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub text: String,
    pub sections: PromptSections,
}

impl Prompt {
    /// Render the sections under their fixed headings
    pub fn assemble(sections: PromptSections) -> Self {
        let bullets = |items: &[String]| -> String {
            let lines: Vec<String> = items
                .iter()
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                .map(|item| format!("- {item}"))
                .collect();
            if lines.is_empty() {
                "None.".to_string()
            } else {
                lines.join("\n")
            }
        };

        let text = format!(
            "# Persona\n{}\n\n# Task\n{}\n\n# Behavioral Rules\n{}\n\n# Custom Instructions\n{}\n",
            sections.persona.trim(),
            sections.task.trim(),
            bullets(&sections.behavioral_rules),
            bullets(&sections.custom_instructions),
        );
        Self { text, sections }
    }
}

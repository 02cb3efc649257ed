//! # Specification
//!
//! The pipeline's input: the SOP text plus the auxiliary descriptions the
//! caller supplies. Immutable once a pipeline starts.

use serde::{Deserialize, Serialize};

/// Raw business specification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specification {
    /// Standard operating procedure text
    pub sop_text: String,
    /// When the agent should consult the knowledge base
    #[serde(default)]
    pub knowledge_base_description: String,
    /// When the agent should escalate to a human
    #[serde(default)]
    pub handoff_description: String,
    /// Identifier of the external knowledge source bound to the retrieval tool
    #[serde(default)]
    pub knowledge_base_reference: String,
    #[serde(default)]
    pub personality: Option<PersonalityConfig>,
    /// Free-text personality, parsed into `personality` when that is absent
    #[serde(default)]
    pub personality_description: Option<String>,
}

impl Specification {
    pub fn new(
        sop_text: impl Into<String>,
        knowledge_base_description: impl Into<String>,
        handoff_description: impl Into<String>,
        knowledge_base_reference: impl Into<String>,
    ) -> Self {
        Self {
            sop_text: sop_text.into(),
            knowledge_base_description: knowledge_base_description.into(),
            handoff_description: handoff_description.into(),
            knowledge_base_reference: knowledge_base_reference.into(),
            personality: None,
            personality_description: None,
        }
    }

    pub fn with_personality(mut self, personality: PersonalityConfig) -> Self {
        self.personality = Some(personality);
        self
    }

    pub fn with_personality_description(mut self, description: impl Into<String>) -> Self {
        self.personality_description = Some(description.into());
        self
    }

    pub fn has_sop(&self) -> bool {
        !self.sop_text.trim().is_empty()
    }

    /// Free-text personality that still needs parsing
    pub fn unparsed_personality(&self) -> Option<&str> {
        if self.personality.is_some() {
            return None;
        }
        self.personality_description
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// First `max_chars` characters of the SOP, for log fields
    pub fn sop_preview(&self, max_chars: usize) -> String {
        let trimmed = self.sop_text.trim();
        match trimmed.char_indices().nth(max_chars) {
            Some((idx, _)) => format!("{}...", &trimmed[..idx]),
            None => trimmed.to_string(),
        }
    }
}

/// Structured persona traits for the generated agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalityConfig {
    /// Who the agent is (role, expertise, background)
    pub identity: String,
    /// The agent's primary purpose
    pub task: String,
    pub demeanor: String,
    pub tone: String,
    pub formality: Formality,
    pub enthusiasm: Enthusiasm,
    pub filler_words: FillerFrequency,
    pub pacing: Pacing,
    pub additional_instructions: String,
}

impl PersonalityConfig {
    /// True when no free-text trait is set
    pub fn is_empty(&self) -> bool {
        [
            &self.identity,
            &self.task,
            &self.demeanor,
            &self.tone,
            &self.additional_instructions,
        ]
        .iter()
        .all(|field| field.trim().is_empty())
    }

    /// One `Label: value` line per set trait, for stage inputs
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        for (label, value) in [
            ("Identity", &self.identity),
            ("Task", &self.task),
            ("Demeanor", &self.demeanor),
            ("Tone", &self.tone),
        ] {
            if !value.trim().is_empty() {
                lines.push(format!("{label}: {}", value.trim()));
            }
        }
        lines.push(format!("Formality: {}", self.formality.label()));
        lines.push(format!("Enthusiasm: {}", self.enthusiasm.label()));
        lines.push(format!("Filler words: {}", self.filler_words.label()));
        lines.push(format!("Pacing: {}", self.pacing.label()));
        if !self.additional_instructions.trim().is_empty() {
            lines.push(format!(
                "Additional instructions: {}",
                self.additional_instructions.trim()
            ));
        }
        lines.join("\n")
    }
}

/// Normalize a loose label ("Very formal", "very-formal") to snake_case
fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase().replace(['-', ' '], "_")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formality {
    VeryFormal,
    Formal,
    #[default]
    Neutral,
    Casual,
    VeryCasual,
}

impl Formality {
    pub fn label(&self) -> &'static str {
        match self {
            Formality::VeryFormal => "very formal",
            Formality::Formal => "formal",
            Formality::Neutral => "neutral",
            Formality::Casual => "casual",
            Formality::VeryCasual => "very casual",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match normalize_label(label).as_str() {
            "very_formal" => Some(Formality::VeryFormal),
            "formal" => Some(Formality::Formal),
            "neutral" => Some(Formality::Neutral),
            "casual" | "informal" => Some(Formality::Casual),
            "very_casual" => Some(Formality::VeryCasual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enthusiasm {
    VeryLow,
    Low,
    #[default]
    Moderate,
    High,
    VeryHigh,
}

impl Enthusiasm {
    pub fn label(&self) -> &'static str {
        match self {
            Enthusiasm::VeryLow => "very low",
            Enthusiasm::Low => "low",
            Enthusiasm::Moderate => "moderate",
            Enthusiasm::High => "high",
            Enthusiasm::VeryHigh => "very high",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match normalize_label(label).as_str() {
            "very_low" => Some(Enthusiasm::VeryLow),
            "low" => Some(Enthusiasm::Low),
            "moderate" | "medium" => Some(Enthusiasm::Moderate),
            "high" => Some(Enthusiasm::High),
            "very_high" => Some(Enthusiasm::VeryHigh),
            _ => None,
        }
    }
}

/// Speaking pace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    VerySlow,
    Slow,
    #[default]
    Moderate,
    Fast,
    VeryFast,
}

impl Pacing {
    pub fn label(&self) -> &'static str {
        match self {
            Pacing::VerySlow => "very slow",
            Pacing::Slow => "slow",
            Pacing::Moderate => "moderate",
            Pacing::Fast => "fast",
            Pacing::VeryFast => "very fast",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match normalize_label(label).as_str() {
            "very_slow" => Some(Pacing::VerySlow),
            "slow" => Some(Pacing::Slow),
            "moderate" | "medium" | "normal" => Some(Pacing::Moderate),
            "fast" => Some(Pacing::Fast),
            "very_fast" => Some(Pacing::VeryFast),
            _ => None,
        }
    }
}

/// How often the agent uses filler words ("um", "you know")
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillerFrequency {
    #[default]
    None,
    Rare,
    Occasional,
    Frequent,
}

impl FillerFrequency {
    pub fn label(&self) -> &'static str {
        match self {
            FillerFrequency::None => "none",
            FillerFrequency::Rare => "rare",
            FillerFrequency::Occasional => "occasional",
            FillerFrequency::Frequent => "frequent",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match normalize_label(label).as_str() {
            "none" | "never" | "no" => Some(FillerFrequency::None),
            "rare" | "rarely" | "low" | "minimal" => Some(FillerFrequency::Rare),
            "occasional" | "occasionally" | "some" | "moderate" => {
                Some(FillerFrequency::Occasional)
            }
            "frequent" | "frequently" | "often" | "high" => Some(FillerFrequency::Frequent),
            _ => None,
        }
    }
}

//! # Kiln Skills
//!
//! One skill per pipeline stage. Each is a stateless unit: it renders its
//! input, asks the gateway for a structured reply, and hands a typed record
//! back to the coordinator.
//!
//! ```text
//! ParseSkill → ArchitectSkill ⟷ CriticSkill → BuilderSkill ⟷ CodeReviewSkill → PersonaSkill
//! ```
//!
//! - `ParseSkill` - requirement extraction (and personality parsing)
//! - `ArchitectSkill` - plan drafting
//! - `CriticSkill` - plan review
//! - `BuilderSkill` - tool-augmented code generation
//! - `CodeReviewSkill` - code review
//! - `PersonaSkill` - prompt synthesis

pub mod llm_helpers;
pub mod prompts;

pub mod architect_skill;
pub mod builder_skill;
pub mod code_review_skill;
pub mod critic_skill;
pub mod parse_skill;
pub mod persona_skill;

pub use architect_skill::ArchitectSkill;
pub use builder_skill::{BuildRequest, BuilderSkill};
pub use code_review_skill::CodeReviewSkill;
pub use critic_skill::CriticSkill;
pub use parse_skill::ParseSkill;
pub use persona_skill::PersonaSkill;

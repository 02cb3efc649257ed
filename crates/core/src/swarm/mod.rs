//! # Pipeline Orchestration
//!
//! Stage machine, audit events and the coordinator that drives a
//! specification from requirement extraction to a finished artifact.
//!
//! ## Pipeline Flow
//!
//! ```text
//! Specification → Extractor → Planner ⟷ Plan Reviewer → Generator ⟷ Code Reviewer → Prompt Synthesizer
//! ```

pub mod coordinator;
pub mod events;
pub mod pipeline;

pub use coordinator::Coordinator;
pub use events::{PipelineEvent, PipelineEventKind};
pub use pipeline::{CycleExit, Pipeline, Stage, StageCounters};

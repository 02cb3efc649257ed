//! # Pipeline Stages
//!
//! The stage machine the coordinator drives. Two cyclic regions, otherwise
//! linear:
//!
//! ```text
//! requirement_extraction → plan_drafting ⟷ plan_review → code_generation ⟷ code_review → prompt_synthesis → complete
//! ```
//!
//! Counters are incremented on stage entry, before the stage runs; review
//! routing checks them against the iteration bounds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    RequirementExtraction,
    PlanDrafting,
    PlanReview,
    /// Tool-augmented generation (generate, validate, revise)
    CodeGeneration,
    CodeReview,
    PromptSynthesis,
    Complete,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::RequirementExtraction => "requirement_extraction",
            Stage::PlanDrafting => "plan_drafting",
            Stage::PlanReview => "plan_review",
            Stage::CodeGeneration => "code_generation",
            Stage::CodeReview => "code_review",
            Stage::PromptSynthesis => "prompt_synthesis",
            Stage::Complete => "complete",
            Stage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Complete | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entries per stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounters {
    pub requirement_extraction: u32,
    pub plan_drafts: u32,
    pub plan_reviews: u32,
    pub code_generations: u32,
    pub code_reviews: u32,
    pub prompt_synthesis: u32,
}

impl StageCounters {
    fn bump(&mut self, stage: Stage) -> u32 {
        let counter = match stage {
            Stage::RequirementExtraction => &mut self.requirement_extraction,
            Stage::PlanDrafting => &mut self.plan_drafts,
            Stage::PlanReview => &mut self.plan_reviews,
            Stage::CodeGeneration => &mut self.code_generations,
            Stage::CodeReview => &mut self.code_reviews,
            Stage::PromptSynthesis => &mut self.prompt_synthesis,
            Stage::Complete | Stage::Failed => return 0,
        };
        *counter += 1;
        *counter
    }
}

/// How a review cycle exits after one review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleExit {
    Approved,
    /// Rejected with budget left; back to the drafting stage
    Revise,
    /// Rejected on the last allowed review
    Exhausted,
}

/// The pipeline state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Current stage
    pub stage: Stage,
    pub counters: StageCounters,
    pub max_plan_iterations: u32,
    pub max_code_iterations: u32,
    /// Stage that was running when the pipeline failed
    pub failed_at: Option<Stage>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(3, 3)
    }
}

impl Pipeline {
    pub fn new(max_plan_iterations: u32, max_code_iterations: u32) -> Self {
        Self {
            stage: Stage::RequirementExtraction,
            counters: StageCounters::default(),
            max_plan_iterations: max_plan_iterations.max(1),
            max_code_iterations: max_code_iterations.max(1),
            failed_at: None,
        }
    }

    /// Record entry into the current stage; returns its entry count
    pub fn enter(&mut self) -> u32 {
        self.counters.bump(self.stage)
    }

    /// Follow the linear edge out of the current stage
    pub fn advance(&mut self) {
        self.stage = match self.stage {
            Stage::RequirementExtraction => Stage::PlanDrafting,
            Stage::PlanDrafting => Stage::PlanReview,
            Stage::PlanReview => Stage::CodeGeneration,
            Stage::CodeGeneration => Stage::CodeReview,
            Stage::CodeReview => Stage::PromptSynthesis,
            Stage::PromptSynthesis => Stage::Complete,
            Stage::Complete => Stage::Complete,
            Stage::Failed => Stage::Failed,
        };
    }

    /// Route out of plan review
    pub fn route_plan_review(&mut self, approved: bool) -> CycleExit {
        let exit = Self::cycle_exit(
            approved,
            self.counters.plan_reviews,
            self.max_plan_iterations,
        );
        self.stage = match exit {
            CycleExit::Revise => Stage::PlanDrafting,
            CycleExit::Approved | CycleExit::Exhausted => Stage::CodeGeneration,
        };
        exit
    }

    /// Route out of code review
    pub fn route_code_review(&mut self, approved: bool) -> CycleExit {
        let exit = Self::cycle_exit(
            approved,
            self.counters.code_reviews,
            self.max_code_iterations,
        );
        self.stage = match exit {
            CycleExit::Revise => Stage::CodeGeneration,
            CycleExit::Approved | CycleExit::Exhausted => Stage::PromptSynthesis,
        };
        exit
    }

    fn cycle_exit(approved: bool, reviews: u32, max: u32) -> CycleExit {
        if approved {
            CycleExit::Approved
        } else if reviews >= max {
            CycleExit::Exhausted
        } else {
            CycleExit::Revise
        }
    }

    /// Fail the pipeline. `at` is the stage that failed, which may differ
    /// from `stage` once review routing has moved on.
    pub fn fail(&mut self, at: Stage) {
        if self.stage != Stage::Failed {
            self.failed_at = Some(at);
        }
        self.stage = Stage::Failed;
    }

    /// Check if pipeline is complete
    pub fn is_complete(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Check if pipeline succeeded
    pub fn is_success(&self) -> bool {
        self.stage == Stage::Complete
    }
}

//! # Pipeline Events
//!
//! Timestamped record of what a pipeline did. Events are appended to the
//! pipeline state (the audit log) and optionally streamed to the caller.

use super::pipeline::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of pipeline event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineEventKind {
    PipelineStarted,
    /// Stage entered (data carries the entry count)
    StageStarted,
    StageCompleted,
    PlanApproved,
    /// Plan reviewer rejected, looping back to drafting
    PlanRejected,
    CodeApproved,
    CodeRejected,
    /// A sandbox tool was called
    ToolInvoked,
    /// A non-fatal tool call failed
    ToolFailed,
    /// A candidate failed static validation
    ValidationFailed,
    WarningRaised,
    PipelineCompleted,
    PipelineFailed,
}

/// An event in the pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineEvent {
    /// Unique event ID
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: PipelineEventKind,
    /// Stage that produced this event
    pub stage: Stage,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl PipelineEvent {
    /// Create a new event
    pub fn new(kind: PipelineEventKind, stage: Stage) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            stage,
            data: None,
        }
    }

    /// Add data to the event
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

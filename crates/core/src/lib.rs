//! # Kiln Core
//!
//! The meta-agent pipeline: turns a business SOP (plus knowledge-base,
//! handoff and personality configuration) into deployable agent source code
//! and a behavior prompt.
//!
//! ## Architecture
//!
//! - `models/` - LLM provider and model selection
//! - `config/` - pipeline bounds, gateway and sandbox settings
//! - `gateway/` - shared, bounded, retrying Language-Model Gateway
//! - `tools/` - Tool Sandbox (validation, documentation search)
//! - `state/` - entities threaded through the stages and the per-run state
//! - `skills/` - one skill per stage
//! - `swarm/` - stage machine, events and the coordinator
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kiln_core::config::KilnConfig;
//! use kiln_core::gateway::{LlmGateway, RadkitBackend};
//! use kiln_core::state::Specification;
//! use kiln_core::swarm::Coordinator;
//! use kiln_core::tools::ToolSandbox;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = KilnConfig::default();
//! let backend = Arc::new(RadkitBackend::new(config.gateway.model.clone()));
//! let gateway = LlmGateway::new(backend, &config.gateway);
//! let sandbox = ToolSandbox::from_config(&config.sandbox)?;
//! let coordinator = Coordinator::new(gateway, sandbox, config.pipeline)?;
//!
//! let spec = Specification::new(sop, kb_description, handoff, "kb-123");
//! let outcome = coordinator.run(spec, CancellationToken::new()).await;
//! ```

pub mod config;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod skills;
pub mod state;
pub mod swarm;
pub mod tools;

#[cfg(test)]
pub mod test_support;

pub use config::{KilnConfig, PipelineConfig};
pub use errors::{CallError, FailureKind, StageError};
pub use state::{Artifact, PipelineOutcome, PipelineState, Specification};
pub use swarm::Coordinator;

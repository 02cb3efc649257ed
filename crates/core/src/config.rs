//! # Configuration
//!
//! Iteration bounds, gateway limits and sandbox commands. Every struct
//! deserializes with defaults for missing fields, so a config file only needs
//! to name what it overrides.

use crate::errors::ConfigError;
use crate::models::ModelConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// What happens when a review cycle runs out of iterations without approval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Continue with the last draft and attach a warning
    #[default]
    BestEffort,
    /// Abort the pipeline
    Strict,
}

/// Bounded exponential backoff for transient backend errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let raw = self.initial_backoff_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        Duration::from_millis(raw.min(self.max_backoff_ms as f64) as u64)
    }
}

/// Bounds and policies for one pipeline invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_plan_iterations: u32,
    pub max_code_iterations: u32,
    /// Generate/validate attempts inside one code generation stage
    pub max_validation_retries: u32,
    /// Documentation lookups allowed per code generation stage
    pub max_doc_lookups: u32,
    pub docs_per_query: usize,
    pub plan_exhaustion: ExhaustionPolicy,
    pub code_exhaustion: ExhaustionPolicy,
    /// Language of the generated agent source
    pub target_language: String,
    /// Model identifier the generated agent should run on
    pub agent_model_id: String,
    /// Ask the generator to wire conversation memory into the agent
    pub enable_memory: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_plan_iterations: 3,
            max_code_iterations: 3,
            max_validation_retries: 3,
            max_doc_lookups: 4,
            docs_per_query: 3,
            plan_exhaustion: ExhaustionPolicy::BestEffort,
            code_exhaustion: ExhaustionPolicy::BestEffort,
            target_language: "python".to_string(),
            agent_model_id: "amazon.nova-pro-v1:0".to_string(),
            enable_memory: true,
        }
    }
}

impl PipelineConfig {
    /// File extension for the generated source
    pub fn source_extension(&self) -> &str {
        match self.target_language.to_lowercase().as_str() {
            "python" => "py",
            "typescript" => "ts",
            "javascript" => "js",
            "rust" => "rs",
            _ => "txt",
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("max_plan_iterations", self.max_plan_iterations),
            ("max_code_iterations", self.max_code_iterations),
            ("max_validation_retries", self.max_validation_retries),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be at least 1")));
            }
        }
        if self.target_language.trim().is_empty() {
            return Err(ConfigError::Invalid("target_language is empty".into()));
        }
        Ok(())
    }
}

/// Shared Language-Model Gateway limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub model: ModelConfig,
    /// Size of the call pool shared by all concurrent pipelines
    pub max_concurrent_calls: usize,
    /// How long a caller waits for a pool slot before failing
    pub acquire_timeout_ms: u64,
    /// Per-attempt timeout
    pub call_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            max_concurrent_calls: 4,
            acquire_timeout_ms: 30_000,
            call_timeout_ms: 180_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl GatewayConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// Tool Sandbox commands and endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Command that reads source on stdin and exits non-zero on a syntax error
    pub syntax_command: Vec<String>,
    /// Optional command that executes the source (also via stdin)
    pub execute_command: Option<Vec<String>>,
    pub timeout_ms: u64,
    /// Documentation search endpoint, queried as `GET {endpoint}?q=..&k=..`
    pub docs_endpoint: Option<String>,
    pub retry: RetryPolicy,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            syntax_command: vec![
                "python3".to_string(),
                "-c".to_string(),
                "import ast, sys; ast.parse(sys.stdin.read())".to_string(),
            ],
            execute_command: None,
            timeout_ms: 30_000,
            docs_endpoint: None,
            retry: RetryPolicy {
                max_retries: 2,
                ..RetryPolicy::default()
            },
        }
    }
}

impl SandboxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Everything a Kiln process needs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KilnConfig {
    pub pipeline: PipelineConfig,
    pub gateway: GatewayConfig,
    pub sandbox: SandboxConfig,
}

impl KilnConfig {
    /// Load from a JSON file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        if self.gateway.max_concurrent_calls == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_calls must be at least 1".into(),
            ));
        }
        if self.sandbox.syntax_command.is_empty() {
            return Err(ConfigError::Invalid("syntax_command is empty".into()));
        }
        Ok(())
    }
}

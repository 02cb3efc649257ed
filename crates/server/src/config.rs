//! Configuration for the binary: `.kiln/config.json` merged with CLI flags.

use anyhow::{bail, Context, Result};
use clap::Args;
use kiln_core::config::{ExhaustionPolicy, KilnConfig};
use kiln_core::models::{LlmProvider, ModelConfig};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = ".kiln/config.json";

/// Flags that override the config file
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// LLM provider (anthropic, openai, gemini, openrouter, grok, deepseek)
    #[arg(long, env = "KILN_PROVIDER")]
    pub provider: Option<String>,
    /// Model name; defaults to the provider's default model
    #[arg(long, env = "KILN_MODEL")]
    pub model: Option<String>,
    /// Base URL for OpenAI-compatible endpoints
    #[arg(long, env = "KILN_BASE_URL")]
    pub base_url: Option<String>,
    #[arg(long)]
    pub max_plan_iterations: Option<u32>,
    #[arg(long)]
    pub max_code_iterations: Option<u32>,
    /// Fail instead of warning when a review cycle runs out of iterations
    #[arg(long)]
    pub strict: bool,
    /// Documentation search endpoint for the code generator
    #[arg(long, env = "KILN_DOCS_ENDPOINT")]
    pub docs_endpoint: Option<String>,
    #[arg(long)]
    pub max_concurrent_calls: Option<usize>,
}

impl Overrides {
    pub fn apply(&self, config: &mut KilnConfig) -> Result<()> {
        if let Some(name) = &self.provider {
            let Some(provider) = LlmProvider::parse(name) else {
                bail!("unknown provider '{name}'");
            };
            config.gateway.model = ModelConfig::for_provider(provider);
        }
        if let Some(model) = &self.model {
            config.gateway.model.model = model.clone();
        }
        if let Some(url) = &self.base_url {
            config.gateway.model = config.gateway.model.clone().with_base_url(url.clone());
        }
        if let Some(n) = self.max_plan_iterations {
            config.pipeline.max_plan_iterations = n;
        }
        if let Some(n) = self.max_code_iterations {
            config.pipeline.max_code_iterations = n;
        }
        if self.strict {
            config.pipeline.plan_exhaustion = ExhaustionPolicy::Strict;
            config.pipeline.code_exhaustion = ExhaustionPolicy::Strict;
        }
        if let Some(endpoint) = &self.docs_endpoint {
            config.sandbox.docs_endpoint = Some(endpoint.clone());
        }
        if let Some(n) = self.max_concurrent_calls {
            config.gateway.max_concurrent_calls = n;
        }
        Ok(())
    }
}

/// Load the config file (defaults when absent), apply overrides, validate
pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<KilnConfig> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut config = KilnConfig::load(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    overrides.apply(&mut config)?;
    config.validate().context("invalid configuration")?;

    tracing::debug!(
        provider = config.gateway.model.provider.display_name(),
        model = %config.gateway.model.model,
        path = %path.display(),
        "configuration loaded"
    );
    Ok(config)
}

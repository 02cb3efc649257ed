//! # Kiln Models
//!
//! Provider and model selection for the Language-Model Gateway.
//! API keys are never stored here: every radkit provider reads its key from
//! the environment when the backend builds a client.
//!
//! | Provider   | Key variable          |
//! |------------|-----------------------|
//! | Anthropic  | `ANTHROPIC_API_KEY`   |
//! | OpenAI     | `OPENAI_API_KEY`      |
//! | Gemini     | `GEMINI_API_KEY`      |
//! | OpenRouter | `OPENROUTER_API_KEY`  |
//! | Grok       | `XAI_API_KEY`         |
//! | DeepSeek   | `DEEPSEEK_API_KEY`    |

use serde::{Deserialize, Serialize};

/// Supported LLM providers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
    Gemini,
    OpenRouter,
    Grok,
    DeepSeek,
}

impl LlmProvider {
    /// Display name for logs and CLI output
    pub fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "Anthropic",
            LlmProvider::OpenAI => "OpenAI",
            LlmProvider::Gemini => "Gemini",
            LlmProvider::OpenRouter => "OpenRouter",
            LlmProvider::Grok => "Grok",
            LlmProvider::DeepSeek => "DeepSeek",
        }
    }

    /// Environment variable holding the provider's API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Gemini => "GEMINI_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
            LlmProvider::Grok => "XAI_API_KEY",
            LlmProvider::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }

    /// Model used when the configuration names none
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
            LlmProvider::OpenAI => "gpt-4o",
            LlmProvider::Gemini => "gemini-2.0-flash-exp",
            LlmProvider::OpenRouter => "anthropic/claude-sonnet-4.5",
            LlmProvider::Grok => "grok-2",
            LlmProvider::DeepSeek => "deepseek-chat",
        }
    }

    /// Whether this provider accepts a custom base URL
    pub fn supports_base_url(&self) -> bool {
        matches!(self, LlmProvider::OpenAI)
    }

    /// Parse a provider name as written in config files or CLI flags
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Some(LlmProvider::Anthropic),
            "openai" => Some(LlmProvider::OpenAI),
            "gemini" => Some(LlmProvider::Gemini),
            "openrouter" => Some(LlmProvider::OpenRouter),
            "grok" | "xai" => Some(LlmProvider::Grok),
            "deepseek" => Some(LlmProvider::DeepSeek),
            _ => None,
        }
    }
}

/// Which provider and model the gateway talks to.
///
/// ```rust,ignore
/// use kiln_core::models::{LlmProvider, ModelConfig};
///
/// let config = ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o")
///     .with_base_url("http://localhost:11434/v1");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelConfig {
    /// LLM provider to use
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model name (e.g., "claude-sonnet-4-20250514", "gpt-4o")
    pub model: String,
    /// Optional base URL override for OpenAI-compatible APIs
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::for_provider(LlmProvider::default())
    }
}

impl ModelConfig {
    /// Anthropic with an explicit model name
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_provider(LlmProvider::Anthropic, model)
    }

    /// A provider with its default model
    pub fn for_provider(provider: LlmProvider) -> Self {
        Self::with_provider(provider, provider.default_model())
    }

    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
        }
    }

    /// Name of the API key variable when it is not set in the environment
    pub fn missing_api_key(&self) -> Option<&'static str> {
        let var = self.provider.api_key_env();
        std::env::var_os(var).is_none().then_some(var)
    }

    /// Set base URL (ignored by providers that do not support one)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        if self.provider.supports_base_url() {
            self.base_url = Some(url.into());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModelConfig::default();
        assert_eq!(config.provider, LlmProvider::Anthropic);
        assert!(config.model.contains("claude"));
    }

    #[test]
    fn test_base_url_only_for_supported_providers() {
        let openai = ModelConfig::for_provider(LlmProvider::OpenAI).with_base_url("http://x");
        assert_eq!(openai.base_url.as_deref(), Some("http://x"));

        let anthropic = ModelConfig::default().with_base_url("http://x");
        assert!(anthropic.base_url.is_none());
    }

    #[test]
    fn test_parse_provider_names() {
        assert_eq!(LlmProvider::parse("OpenAI"), Some(LlmProvider::OpenAI));
        assert_eq!(LlmProvider::parse(" xai "), Some(LlmProvider::Grok));
        assert_eq!(LlmProvider::parse("bedrock"), None);
    }

    #[test]
    fn test_api_key_variables() {
        assert_eq!(LlmProvider::Grok.api_key_env(), "XAI_API_KEY");
        assert_eq!(LlmProvider::OpenRouter.api_key_env(), "OPENROUTER_API_KEY");

        let config = ModelConfig::for_provider(LlmProvider::DeepSeek);
        let unset = std::env::var_os("DEEPSEEK_API_KEY").is_none();
        assert_eq!(config.missing_api_key(), unset.then_some("DEEPSEEK_API_KEY"));
    }

    #[test]
    fn test_model_config_serialization() {
        let config = ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o");
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("openai"));
        assert!(json.contains("gpt-4o"));

        let back: ModelConfig = serde_json::from_str(r#"{"model":"m"}"#).unwrap();
        assert_eq!(back.provider, LlmProvider::Anthropic);
    }
}

//! radkit-backed [`LanguageModel`].
//!
//! Provider selection happens once per call from the [`ModelConfig`]; radkit
//! reads the provider key from the environment.

use super::{LanguageModel, LlmRequest};
use crate::errors::BackendError;
use crate::models::ModelConfig;
use async_trait::async_trait;
use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Raw completion text. Stages parse their own JSON out of it so every stage
/// shares one repair path.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct Completion {
    /// The full reply, verbatim
    pub text: String,
}

/// Run an LlmFunction against whichever provider the config selects.
macro_rules! run_llm_function {
    ($config:expr, $output_type:ty, $system_prompt:expr, $input:expr) => {{
        use radkit::agent::LlmFunction;
        use radkit::models::providers::{
            AnthropicLlm, DeepSeekLlm, GeminiLlm, GrokLlm, OpenAILlm, OpenRouterLlm,
        };
        use $crate::models::LlmProvider;

        let config = $config;
        let result: anyhow::Result<$output_type> = match config.provider {
            LlmProvider::Anthropic => {
                let llm = AnthropicLlm::from_env(&config.model)?;
                let func =
                    LlmFunction::<$output_type>::new_with_system_instructions(llm, $system_prompt);
                func.run($input).await.map_err(Into::into)
            }
            LlmProvider::OpenAI => {
                let mut llm = OpenAILlm::from_env(&config.model)?;
                if let Some(base_url) = &config.base_url {
                    llm = llm.with_base_url(base_url);
                }
                let func =
                    LlmFunction::<$output_type>::new_with_system_instructions(llm, $system_prompt);
                func.run($input).await.map_err(Into::into)
            }
            LlmProvider::Gemini => {
                let llm = GeminiLlm::from_env(&config.model)?;
                let func =
                    LlmFunction::<$output_type>::new_with_system_instructions(llm, $system_prompt);
                func.run($input).await.map_err(Into::into)
            }
            LlmProvider::OpenRouter => {
                let llm = OpenRouterLlm::from_env(&config.model)?;
                let func =
                    LlmFunction::<$output_type>::new_with_system_instructions(llm, $system_prompt);
                func.run($input).await.map_err(Into::into)
            }
            LlmProvider::Grok => {
                let llm = GrokLlm::from_env(&config.model)?;
                let func =
                    LlmFunction::<$output_type>::new_with_system_instructions(llm, $system_prompt);
                func.run($input).await.map_err(Into::into)
            }
            LlmProvider::DeepSeek => {
                let llm = DeepSeekLlm::from_env(&config.model)?;
                let func =
                    LlmFunction::<$output_type>::new_with_system_instructions(llm, $system_prompt);
                func.run($input).await.map_err(Into::into)
            }
        };
        result
    }};
}

/// Production backend
pub struct RadkitBackend {
    config: ModelConfig,
}

impl RadkitBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    async fn run(&self, request: &LlmRequest) -> anyhow::Result<Completion> {
        run_llm_function!(&self.config, Completion, request.system, request.prompt.clone())
    }
}

#[async_trait]
impl LanguageModel for RadkitBackend {
    async fn complete(&self, request: &LlmRequest) -> Result<String, BackendError> {
        self.run(request)
            .await
            .map(|completion| completion.text)
            .map_err(|e| classify_error(&e))
    }

    fn name(&self) -> &str {
        self.config.provider.display_name()
    }
}

/// Map a provider error onto the retry taxonomy.
///
/// radkit surfaces provider failures as opaque errors, so this goes by the
/// rendered message.
pub fn classify_error(error: &anyhow::Error) -> BackendError {
    let message = format!("{error:#}");
    let lower = message.to_lowercase();

    if lower.contains("429") || lower.contains("rate limit") || lower.contains("overloaded") {
        BackendError::RateLimited(message)
    } else if lower.contains("timed out") || lower.contains("timeout") {
        BackendError::Timeout
    } else if lower.contains("connect")
        || lower.contains("network")
        || lower.contains("502")
        || lower.contains("503")
        || lower.contains("504")
        || lower.contains("connection reset")
    {
        BackendError::Transport(message)
    } else {
        BackendError::Rejected(message)
    }
}

//! # Language-Model Gateway
//!
//! The one door to the LLM backend. A gateway is a cheap-to-clone handle that
//! every concurrent pipeline shares; it owns the bounded call pool, the retry
//! policy and the per-attempt timeout.
//!
//! ```text
//! stage ──► LlmGateway::complete ──► [pool slot] ──► retry loop ──► LanguageModel
//! ```
//!
//! Backends implement [`LanguageModel`]; production uses
//! [`radkit_backend::RadkitBackend`], tests use scripted doubles.

pub mod radkit_backend;
pub mod retry;

pub use radkit_backend::RadkitBackend;
pub use retry::call_with_retry;

use crate::config::{GatewayConfig, RetryPolicy};
use crate::errors::{BackendError, CallError, Service};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// One prompt sent to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmRequest {
    /// Pipeline step issuing the call (e.g. "plan_review")
    pub stage: &'static str,
    /// Stage instructions
    pub system: &'static str,
    /// Rendered stage input
    pub prompt: String,
}

impl LlmRequest {
    pub fn new(stage: &'static str, system: &'static str, prompt: impl Into<String>) -> Self {
        Self {
            stage,
            system,
            prompt: prompt.into(),
        }
    }
}

/// A text-in, text-out LLM backend
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<String, BackendError>;

    /// Name used in logs
    fn name(&self) -> &str {
        "llm"
    }
}

/// Rate-limited, retrying handle to a [`LanguageModel`]
#[derive(Clone)]
pub struct LlmGateway {
    backend: Arc<dyn LanguageModel>,
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
    call_timeout: Duration,
    retry: RetryPolicy,
}

impl LlmGateway {
    pub fn new(backend: Arc<dyn LanguageModel>, config: &GatewayConfig) -> Self {
        Self {
            backend,
            permits: Arc::new(Semaphore::new(config.max_concurrent_calls.max(1))),
            acquire_timeout: config.acquire_timeout(),
            call_timeout: config.call_timeout(),
            retry: config.retry.clone(),
        }
    }

    /// Free slots in the call pool
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Send one request, waiting at most `acquire_timeout` for a pool slot.
    ///
    /// The slot is held for the whole retry sequence, so backoff after a rate
    /// limit also throttles the other pipelines sharing this gateway.
    pub async fn complete(
        &self,
        request: &LlmRequest,
        cancel: &CancellationToken,
    ) -> Result<String, CallError> {
        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CallError::Cancelled),
            acquired = tokio::time::timeout(self.acquire_timeout, self.permits.clone().acquire_owned()) => {
                match acquired {
                    Ok(Ok(permit)) => permit,
                    Ok(Err(_)) => {
                        return Err(CallError::Unavailable {
                            service: Service::LanguageModel,
                            attempts: 0,
                            reason: "call pool closed".to_string(),
                        })
                    }
                    Err(_) => {
                        tracing::warn!(stage = request.stage, "no gateway slot within {:?}", self.acquire_timeout);
                        return Err(CallError::Unavailable {
                            service: Service::LanguageModel,
                            attempts: 0,
                            reason: format!("no call slot within {:?}", self.acquire_timeout),
                        });
                    }
                }
            }
        };

        tracing::debug!(
            stage = request.stage,
            backend = self.backend.name(),
            prompt_len = request.prompt.len(),
            "llm call"
        );

        let backend = self.backend.clone();
        let reply = call_with_retry(
            Service::LanguageModel,
            &self.retry,
            self.call_timeout,
            cancel,
            || {
                let backend = backend.clone();
                async move { backend.complete(request).await }
            },
        )
        .await?;

        tracing::debug!(stage = request.stage, reply_len = reply.len(), "llm reply");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BackendError;

    struct Echo;

    #[async_trait]
    impl LanguageModel for Echo {
        async fn complete(&self, request: &LlmRequest) -> Result<String, BackendError> {
            Ok(format!("echo: {}", request.prompt))
        }
    }

    struct Stuck;

    #[async_trait]
    impl LanguageModel for Stuck {
        async fn complete(&self, _request: &LlmRequest) -> Result<String, BackendError> {
            std::future::pending().await
        }
    }

    fn config(slots: usize) -> GatewayConfig {
        GatewayConfig {
            max_concurrent_calls: slots,
            acquire_timeout_ms: 30,
            call_timeout_ms: 5_000,
            retry: RetryPolicy::none(),
            ..GatewayConfig::default()
        }
    }

    #[tokio::test]
    async fn test_complete_returns_backend_text() {
        let gateway = LlmGateway::new(Arc::new(Echo), &config(2));
        let reply = gateway
            .complete(
                &LlmRequest::new("test", "system", "hello"),
                &CancellationToken::new(),
            )
            .await;
        tokio_test::assert_ok!(&reply);
        assert_eq!(reply.unwrap(), "echo: hello");
        assert_eq!(gateway.available_slots(), 2);
    }

    #[tokio::test]
    async fn test_saturated_pool_fails_fast() {
        let gateway = LlmGateway::new(Arc::new(Stuck), &config(1));

        let holder = gateway.clone();
        let hold_cancel = CancellationToken::new();
        let hold_token = hold_cancel.clone();
        let held = tokio::spawn(async move {
            holder
                .complete(&LlmRequest::new("hold", "system", "x"), &hold_token)
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(gateway.available_slots(), 0);

        let result = gateway
            .complete(
                &LlmRequest::new("second", "system", "y"),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(
            result,
            Err(CallError::Unavailable { attempts: 0, .. })
        ));

        hold_cancel.cancel();
        assert_eq!(held.await.unwrap(), Err(CallError::Cancelled));
        assert_eq!(gateway.available_slots(), 1);
    }
}

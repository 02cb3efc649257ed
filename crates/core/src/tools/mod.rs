//! # Tool Sandbox
//!
//! The closed set of deterministic tools the code generator may call:
//!
//! - `validate` - static syntax check, optionally followed by execution
//! - `search_docs` - framework documentation lookup (optional, non-fatal)
//!
//! Both go through [`ToolSandbox::invoke`], which applies the same
//! timeout/retry/cancellation rules as the Language-Model Gateway. Tools are
//! not registered dynamically.

pub mod doc_search;
pub mod validator;

pub use doc_search::HttpDocSearch;
pub use validator::CommandValidator;

use crate::config::{RetryPolicy, SandboxConfig};
use crate::errors::{BackendError, CallError, Service};
use crate::gateway::call_with_retry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result of validating one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub syntax_valid: bool,
    /// `None` when execution was not attempted
    pub execution_ok: Option<bool>,
    pub diagnostics: Vec<String>,
}

impl ValidationReport {
    pub fn valid() -> Self {
        Self {
            syntax_valid: true,
            execution_ok: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn invalid(diagnostics: Vec<String>) -> Self {
        Self {
            syntax_valid: false,
            execution_ok: None,
            diagnostics,
        }
    }
}

/// One documentation search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocSnippet {
    pub title: String,
    pub snippet: String,
}

#[async_trait]
pub trait CodeValidator: Send + Sync {
    async fn validate(&self, source: &str) -> Result<ValidationReport, BackendError>;
}

#[async_trait]
pub trait DocSearch: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<DocSnippet>, BackendError>;
}

/// Names of the tools in the closed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    Validate,
    SearchDocs,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::Validate => "validate",
            ToolName::SearchDocs => "search_docs",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInput {
    Validate { source: String },
    SearchDocs { query: String, k: usize },
}

impl ToolInput {
    pub fn name(&self) -> ToolName {
        match self {
            ToolInput::Validate { .. } => ToolName::Validate,
            ToolInput::SearchDocs { .. } => ToolName::SearchDocs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    Validation(ValidationReport),
    Docs(Vec<DocSnippet>),
}

/// Handle to the tool set, shared by every pipeline
#[derive(Clone)]
pub struct ToolSandbox {
    validator: Arc<dyn CodeValidator>,
    docs: Option<Arc<dyn DocSearch>>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl ToolSandbox {
    pub fn new(
        validator: Arc<dyn CodeValidator>,
        retry: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            validator,
            docs: None,
            retry,
            call_timeout,
        }
    }

    /// Command validator plus HTTP doc search when an endpoint is configured
    pub fn from_config(config: &SandboxConfig) -> Result<Self, BackendError> {
        let mut sandbox = Self::new(
            Arc::new(CommandValidator::from_config(config)),
            config.retry.clone(),
            config.timeout(),
        );
        if let Some(endpoint) = &config.docs_endpoint {
            sandbox = sandbox.with_docs(Arc::new(HttpDocSearch::new(
                endpoint.clone(),
                config.timeout(),
            )?));
        }
        Ok(sandbox)
    }

    pub fn with_docs(mut self, docs: Arc<dyn DocSearch>) -> Self {
        self.docs = Some(docs);
        self
    }

    pub fn has_docs(&self) -> bool {
        self.docs.is_some()
    }

    /// Dispatch one tool call by name
    pub async fn invoke(
        &self,
        input: ToolInput,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, CallError> {
        tracing::debug!(tool = input.name().as_str(), "tool call");
        match input {
            ToolInput::Validate { source } => {
                let validator = self.validator.clone();
                let report = call_with_retry(
                    Service::Sandbox,
                    &self.retry,
                    self.call_timeout,
                    cancel,
                    || {
                        let validator = validator.clone();
                        let source = source.as_str();
                        async move { validator.validate(source).await }
                    },
                )
                .await?;
                Ok(ToolOutput::Validation(report))
            }
            ToolInput::SearchDocs { query, k } => {
                let Some(docs) = self.docs.clone() else {
                    return Err(CallError::Unavailable {
                        service: Service::DocSearch,
                        attempts: 0,
                        reason: "no documentation source configured".to_string(),
                    });
                };
                let snippets = call_with_retry(
                    Service::DocSearch,
                    &self.retry,
                    self.call_timeout,
                    cancel,
                    || {
                        let docs = docs.clone();
                        let query = query.as_str();
                        async move { docs.search(query, k).await }
                    },
                )
                .await?;
                Ok(ToolOutput::Docs(snippets))
            }
        }
    }

    pub async fn validate(
        &self,
        source: &str,
        cancel: &CancellationToken,
    ) -> Result<ValidationReport, CallError> {
        match self
            .invoke(
                ToolInput::Validate {
                    source: source.to_string(),
                },
                cancel,
            )
            .await?
        {
            ToolOutput::Validation(report) => Ok(report),
            ToolOutput::Docs(_) => Err(mismatched(Service::Sandbox)),
        }
    }

    pub async fn search_docs(
        &self,
        query: &str,
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<DocSnippet>, CallError> {
        match self
            .invoke(
                ToolInput::SearchDocs {
                    query: query.to_string(),
                    k,
                },
                cancel,
            )
            .await?
        {
            ToolOutput::Docs(snippets) => Ok(snippets),
            ToolOutput::Validation(_) => Err(mismatched(Service::DocSearch)),
        }
    }
}

fn mismatched(service: Service) -> CallError {
    CallError::Unavailable {
        service,
        attempts: 1,
        reason: "tool returned a mismatched output".to_string(),
    }
}

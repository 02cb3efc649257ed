//! Deterministic doubles for the gateway backend and the tool sandbox.

use crate::config::{GatewayConfig, RetryPolicy};
use crate::errors::BackendError;
use crate::gateway::{LanguageModel, LlmGateway, LlmRequest};
use crate::skills::prompts::OUTPUT_REPAIR;
use crate::tools::{CodeValidator, DocSearch, DocSnippet, ToolSandbox, ValidationReport};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type Reply = Result<String, BackendError>;

/// Queue of replies; the last one repeats once the others are used up
#[derive(Default)]
struct Script {
    replies: VecDeque<Reply>,
}

impl Script {
    fn next(&mut self) -> Option<Reply> {
        if self.replies.len() > 1 {
            self.replies.pop_front()
        } else {
            self.replies.front().cloned()
        }
    }
}

/// One recorded call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub stage: &'static str,
    pub repair: bool,
    pub prompt: String,
}

/// Backend answering from per-stage scripts
#[derive(Default)]
pub struct ScriptedModel {
    scripts: Mutex<HashMap<&'static str, Script>>,
    fallback: Mutex<Option<Reply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append replies for a stage
    pub fn script<I>(self, stage: &'static str, replies: I) -> Self
    where
        I: IntoIterator<Item = Reply>,
    {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.entry(stage).or_default().replies.extend(replies);
        }
        self
    }

    /// Same reply for every stage without a script
    pub fn fallback(self, reply: Reply) -> Self {
        if let Ok(mut fallback) = self.fallback.lock() {
            *fallback = Some(reply);
        }
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_for(&self, stage: &str) -> usize {
        self.calls().iter().filter(|c| c.stage == stage).count()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &LlmRequest) -> Result<String, BackendError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                stage: request.stage,
                repair: request.system == OUTPUT_REPAIR,
                prompt: request.prompt.clone(),
            });
        }
        let scripted = self
            .scripts
            .lock()
            .ok()
            .and_then(|mut scripts| scripts.get_mut(request.stage).and_then(Script::next));
        match scripted {
            Some(reply) => reply,
            None => self
                .fallback
                .lock()
                .ok()
                .and_then(|f| f.clone())
                .unwrap_or_else(|| {
                    Err(BackendError::Rejected(format!(
                        "no script for stage {}",
                        request.stage
                    )))
                }),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Validator answering from a script (last report repeats)
pub struct ScriptedValidator {
    reports: Mutex<VecDeque<Result<ValidationReport, BackendError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedValidator {
    pub fn new<I>(reports: I) -> Self
    where
        I: IntoIterator<Item = Result<ValidationReport, BackendError>>,
    {
        Self {
            reports: Mutex::new(reports.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always_valid() -> Self {
        Self::new([Ok(ValidationReport::valid())])
    }

    pub fn always_invalid() -> Self {
        Self::new([Ok(ValidationReport::invalid(vec![
            "SyntaxError: invalid syntax (line 3)".to_string(),
        ]))])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CodeValidator for ScriptedValidator {
    async fn validate(&self, source: &str) -> Result<ValidationReport, BackendError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(source.to_string());
        }
        let mut reports = match self.reports.lock() {
            Ok(reports) => reports,
            Err(_) => return Err(BackendError::Transport("poisoned".into())),
        };
        if reports.len() > 1 {
            reports.pop_front().unwrap_or(Ok(ValidationReport::valid()))
        } else {
            reports.front().cloned().unwrap_or(Ok(ValidationReport::valid()))
        }
    }
}

/// Documentation search with canned behavior
pub struct ScriptedDocs {
    pub result: Result<Vec<DocSnippet>, BackendError>,
}

#[async_trait]
impl DocSearch for ScriptedDocs {
    async fn search(&self, _query: &str, k: usize) -> Result<Vec<DocSnippet>, BackendError> {
        self.result
            .clone()
            .map(|snippets| snippets.into_iter().take(k).collect())
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        initial_backoff_ms: 1,
        max_backoff_ms: 2,
        multiplier: 2.0,
    }
}

pub fn gateway(model: Arc<ScriptedModel>) -> LlmGateway {
    LlmGateway::new(
        model,
        &GatewayConfig {
            max_concurrent_calls: 4,
            acquire_timeout_ms: 1_000,
            call_timeout_ms: 1_000,
            retry: fast_retry(),
            ..GatewayConfig::default()
        },
    )
}

pub fn sandbox(validator: Arc<ScriptedValidator>) -> ToolSandbox {
    ToolSandbox::new(validator, fast_retry(), Duration::from_secs(1))
}

// --- JSON fixtures ---

pub fn requirements_json(multi_component: bool) -> Reply {
    Ok(json!({
        "core_goal": "Answer billing questions for existing customers",
        "business_rules": ["Verify the account number before discussing balances"],
        "constraints": ["Never promise refunds"],
        "integrations": ["knowledge_base", "human_handoff"],
        "knowledge_domains": ["billing policy"],
        "requires_escalation": true,
        "escalation_triggers": ["refund requests over $100"],
        "tone": "warm",
        "personality_traits": ["patient"],
        "behavioral_guidelines": null,
        "multi_component": multi_component
    })
    .to_string())
}

pub fn personality_json() -> Reply {
    Ok(json!({
        "identity": "Billing specialist",
        "task": "Resolve billing questions",
        "demeanor": "Patient",
        "tone": "Warm",
        "formality": "Formal",
        "enthusiasm": "moderate",
        "filler_words": "none",
        "pacing": "slow",
        "additional_instructions": "Spell out account numbers digit by digit"
    })
    .to_string())
}

pub fn plan_json() -> Reply {
    Ok(format!(
        "Here is the plan:\n```json\n{}\n```",
        json!({
            "architecture": "single_agent",
            "components": [{
                "name": "billing_agent",
                "responsibility": "Answer billing questions and escalate refunds",
                "tools": ["retrieve", "handoff_to_user"]
            }],
            "tool_bindings": [
                {"tool": "retrieve", "configuration": {}},
                {"tool": "handoff_to_user", "configuration": {}}
            ],
            "interaction_patterns": "Retrieve policy, answer, hand off refunds over $100",
            "system_prompt_outline": "Identity, billing rules, escalation",
            "error_handling": "Apologize and offer a human",
            "constraints": null
        })
    ))
}

pub fn review_json(approved: bool) -> Reply {
    let issues = if approved {
        json!([])
    } else {
        json!([{"severity": "major", "description": "Escalation trigger not covered", "suggested_fix": "Bind handoff_to_user"}])
    };
    Ok(json!({
        "approved": approved,
        "summary": if approved { "Looks good" } else { "Needs changes" },
        "quality_score": 8,
        "issues": issues
    })
    .to_string())
}

pub const AGENT_SOURCE: &str = "from strands import Agent\n\nagent = Agent(system_prompt='...')\n\ndef invoke(payload, context):\n    return agent(payload.get('prompt', ''))\n";

pub fn generator_json(code: &str) -> Reply {
    Ok(json!({
        "reasoning": "single agent with retrieval",
        "doc_queries": [],
        "code": code,
        "references": ["Agent loop"],
        "notes": "memory disabled"
    })
    .to_string())
}

pub fn generator_search_json(queries: &[&str]) -> Reply {
    Ok(json!({
        "reasoning": "need docs first",
        "doc_queries": queries,
        "code": "",
        "references": [],
        "notes": ""
    })
    .to_string())
}

pub fn prompt_json() -> Reply {
    Ok(json!({
        "persona": "You are Ava, a patient billing specialist.",
        "task": "Resolve billing questions for existing customers.",
        "behavioral_rules": [
            "Verify the account number first.",
            "Hand refund requests over $100 to a human."
        ],
        "custom_instructions": []
    })
    .to_string())
}

//! # Builder Skill
//!
//! Tool-augmented code generation. Each attempt is one model turn that either
//! asks for documentation or submits a full candidate:
//!
//! ```text
//! turn → [search_docs]* → candidate → validate ─ok→ GeneratedCode
//!                                         └─invalid→ diagnostics → next turn
//! ```
//!
//! Only validated candidates leave this module. Documentation lookups are
//! auxiliary: they have their own budget, and a failed lookup is recorded and
//! skipped. A turn that only searched does not use up a validation attempt.

use super::llm_helpers::{request_structured, strip_code_fences, StructuredOutput};
use super::prompts::CODE_GENERATOR;
use crate::config::PipelineConfig;
use crate::errors::{CallError, StageError};
use crate::gateway::{LlmGateway, LlmRequest};
use crate::state::{
    ExecutionResult, GeneratedCode, Plan, Requirements, ReviewFeedback, Specification,
    ToolCallRecord,
};
use crate::swarm::pipeline::Stage;
use crate::tools::{ToolName, ToolSandbox};
use serde::Deserialize;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

/// One generator turn as the model writes it
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GeneratorTurn {
    reasoning: String,
    doc_queries: Vec<String>,
    code: String,
    references: Vec<String>,
    notes: String,
}

impl StructuredOutput for GeneratorTurn {
    const KIND: &'static str = "generated code";
    const SHAPE: &'static str = r#"{"reasoning": "string", "doc_queries": ["string"], "code": "full source or empty", "references": ["string"], "notes": "string"}"#;
}

/// What the next turn needs to know
#[derive(Default)]
struct TurnContext {
    documentation: Vec<String>,
    last_candidate: Option<String>,
    diagnostics: Vec<String>,
    references: Vec<String>,
    tool_calls: Vec<ToolCallRecord>,
    lookups: u32,
}

/// Inputs shared by every turn of one generation stage
pub struct BuildRequest<'a> {
    pub config: &'a PipelineConfig,
    pub requirements: &'a Requirements,
    pub plan: &'a Plan,
    pub specification: &'a Specification,
    /// Previous syntax-valid draft, when the code reviewer rejected it
    pub previous: Option<&'a GeneratedCode>,
    pub feedback: Option<&'a ReviewFeedback>,
}

/// Code generator
pub struct BuilderSkill;

impl BuilderSkill {
    /// Produce a syntax-valid candidate or fail with
    /// [`StageError::ValidationExhausted`].
    pub async fn run(
        gateway: &LlmGateway,
        sandbox: &ToolSandbox,
        request: BuildRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<GeneratedCode, StageError> {
        let max_attempts = request.config.max_validation_retries;
        let mut context = TurnContext::default();
        let mut attempts = 0u32;

        while attempts < max_attempts {
            let prompt = render_turn(&request, &context, sandbox.has_docs());
            let llm_request = LlmRequest::new(Stage::CodeGeneration.as_str(), CODE_GENERATOR, prompt);

            let turn = match request_structured::<GeneratorTurn>(gateway, &llm_request, cancel).await {
                Ok(turn) => turn,
                Err(StageError::Malformed { detail, .. }) => {
                    attempts += 1;
                    tracing::warn!(attempt = attempts, %detail, "unreadable generator turn");
                    context.diagnostics = vec![format!("Previous reply was not usable: {detail}")];
                    continue;
                }
                Err(other) => return Err(other),
            };
            tracing::debug!(reasoning = %turn.reasoning, queries = turn.doc_queries.len(), "generator turn");
            context.references.extend(turn.references);

            let searched = lookup_docs(sandbox, request.config, &turn.doc_queries, &mut context, cancel).await?;
            let source = strip_code_fences(&turn.code);
            if source.is_empty() {
                if searched > 0 {
                    continue;
                }
                attempts += 1;
                context.diagnostics = vec!["No code was submitted.".to_string()];
                continue;
            }

            attempts += 1;
            let report = sandbox.validate(&source, cancel).await?;
            context.tool_calls.push(ToolCallRecord {
                tool: ToolName::Validate,
                input: format!("{} lines", source.lines().count()),
                ok: report.syntax_valid,
            });

            if report.syntax_valid {
                tracing::info!(attempts, lines = source.lines().count(), "candidate validated");
                let mut seen = HashSet::new();
                let mut references = context.references;
                references.retain(|reference| seen.insert(reference.clone()));
                return Ok(GeneratedCode {
                    execution: ExecutionResult::from_report(&report),
                    source,
                    syntax_valid: true,
                    review_count: 0,
                    validation_attempts: attempts,
                    documentation_references: references,
                    implementation_notes: turn.notes,
                    tool_calls: context.tool_calls,
                }
                .inherit_reviews(request.previous));
            }

            tracing::warn!(
                attempt = attempts,
                max_attempts,
                diagnostics = report.diagnostics.len(),
                "candidate failed validation"
            );
            context.diagnostics = report.diagnostics;
            context.last_candidate = Some(source);
        }

        Err(StageError::ValidationExhausted {
            attempts,
            diagnostics: context.diagnostics,
        })
    }
}

/// Run the turn's queries within the lookup budget. Returns how many were
/// attempted. Only cancellation is fatal.
async fn lookup_docs(
    sandbox: &ToolSandbox,
    config: &PipelineConfig,
    queries: &[String],
    context: &mut TurnContext,
    cancel: &CancellationToken,
) -> Result<u32, StageError> {
    if queries.is_empty() || !sandbox.has_docs() {
        return Ok(0);
    }

    let mut attempted = 0;
    for query in queries.iter().map(|q| q.trim()).filter(|q| !q.is_empty()) {
        if context.lookups >= config.max_doc_lookups {
            tracing::debug!(query, "documentation lookup budget spent");
            break;
        }
        context.lookups += 1;
        attempted += 1;

        match sandbox.search_docs(query, config.docs_per_query, cancel).await {
            Ok(snippets) => {
                for snippet in &snippets {
                    context
                        .documentation
                        .push(format!("### {}\n{}", snippet.title, snippet.snippet));
                }
                context.tool_calls.push(ToolCallRecord {
                    tool: ToolName::SearchDocs,
                    input: query.to_string(),
                    ok: true,
                });
            }
            Err(CallError::Cancelled) => return Err(CallError::Cancelled.into()),
            Err(error) => {
                tracing::warn!(query, %error, "documentation lookup failed, continuing without it");
                context.tool_calls.push(ToolCallRecord {
                    tool: ToolName::SearchDocs,
                    input: query.to_string(),
                    ok: false,
                });
            }
        }
    }
    Ok(attempted)
}

fn render_turn(request: &BuildRequest<'_>, context: &TurnContext, docs_available: bool) -> String {
    let config = request.config;
    let lookups_left = if docs_available {
        config.max_doc_lookups.saturating_sub(context.lookups)
    } else {
        0
    };

    let mut prompt = format!(
        "Target language: {}\nAgent model id: {}\nMemory enabled: {}\nKnowledge base id: {}\nDocumentation lookups remaining: {}\n\nRequirements:\n{}\n\nPlan:\n{}",
        config.target_language,
        config.agent_model_id,
        config.enable_memory,
        request.specification.knowledge_base_reference,
        lookups_left,
        request.requirements.render(),
        request.plan.render(),
    );

    if let (Some(previous), Some(feedback)) = (request.previous, request.feedback) {
        prompt.push_str(&format!(
            "\n\nPrevious code:\n```\n{}\n```\n\nCode review feedback to address:\n{}",
            previous.source,
            feedback.render_for_revision()
        ));
    }
    if !context.documentation.is_empty() {
        prompt.push_str("\n\nDocumentation:\n");
        prompt.push_str(&context.documentation.join("\n\n"));
    }
    if let Some(candidate) = &context.last_candidate {
        prompt.push_str(&format!("\n\nLast candidate:\n```\n{candidate}\n```"));
    }
    if !context.diagnostics.is_empty() {
        prompt.push_str("\n\nValidation diagnostics:\n");
        prompt.push_str(&context.diagnostics.join("\n"));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BackendError;
    use crate::state::PlanDraft;
    use crate::test_support::{self, ScriptedDocs, ScriptedModel, ScriptedValidator};
    use crate::tools::{DocSnippet, ValidationReport};
    use std::sync::Arc;

    struct Fixture {
        config: PipelineConfig,
        requirements: Requirements,
        plan: Plan,
        spec: Specification,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                config: PipelineConfig::default(),
                requirements: Requirements {
                    core_goal: "Answer billing questions".into(),
                    ..Default::default()
                },
                plan: Plan::new(PlanDraft::default()),
                spec: Specification::new("sop", "", "", "kb-billing"),
            }
        }

        fn request(&self) -> BuildRequest<'_> {
            BuildRequest {
                config: &self.config,
                requirements: &self.requirements,
                plan: &self.plan,
                specification: &self.spec,
                previous: None,
                feedback: None,
            }
        }
    }

    #[tokio::test]
    async fn test_valid_first_candidate() {
        let model = Arc::new(ScriptedModel::new().script(
            "code_generation",
            [test_support::generator_json(test_support::AGENT_SOURCE)],
        ));
        let validator = Arc::new(ScriptedValidator::always_valid());
        let fixture = Fixture::new();

        let code = BuilderSkill::run(
            &test_support::gateway(model.clone()),
            &test_support::sandbox(validator.clone()),
            fixture.request(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(code.syntax_valid);
        assert_eq!(code.validation_attempts, 1);
        assert_eq!(code.review_count, 0);
        assert_eq!(code.documentation_references, vec!["Agent loop".to_string()]);
        assert_eq!(validator.call_count(), 1);
        assert!(model.calls()[0].prompt.contains("Knowledge base id: kb-billing"));
    }

    #[tokio::test]
    async fn test_fenced_reply_with_markdown_in_code() {
        let source = "PROMPT = '''Answer in markdown:\n```text\nsummary\n```\n'''\n\ndef invoke(payload, context):\n    return PROMPT\n";
        let turn = test_support::generator_json(source).unwrap();
        let model = Arc::new(ScriptedModel::new().script(
            "code_generation",
            [Ok(format!("Here is the agent.\n```json\n{turn}\n```\n"))],
        ));
        let validator = Arc::new(ScriptedValidator::always_valid());
        let fixture = Fixture::new();

        let code = BuilderSkill::run(
            &test_support::gateway(model.clone()),
            &test_support::sandbox(validator.clone()),
            fixture.request(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(code.source, source.trim_end());
        assert_eq!(code.validation_attempts, 1);
        assert_eq!(model.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_revises_with_diagnostics() {
        let model = Arc::new(ScriptedModel::new().script(
            "code_generation",
            [
                test_support::generator_json("def invoke(payload context):\n    pass\n"),
                test_support::generator_json(test_support::AGENT_SOURCE),
            ],
        ));
        let validator = Arc::new(ScriptedValidator::new([
            Ok(ValidationReport::invalid(vec!["SyntaxError: invalid syntax (line 1)".into()])),
            Ok(ValidationReport::valid()),
        ]));
        let fixture = Fixture::new();

        let code = BuilderSkill::run(
            &test_support::gateway(model.clone()),
            &test_support::sandbox(validator),
            fixture.request(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(code.validation_attempts, 2);
        let second = &model.calls()[1].prompt;
        assert!(second.contains("SyntaxError: invalid syntax (line 1)"));
        assert!(second.contains("def invoke(payload context):"));
    }

    #[tokio::test]
    async fn test_validation_retries_bounded() {
        let model = Arc::new(ScriptedModel::new().script(
            "code_generation",
            [test_support::generator_json("def broken(:\n")],
        ));
        let validator = Arc::new(ScriptedValidator::always_invalid());
        let fixture = Fixture::new();

        let result = BuilderSkill::run(
            &test_support::gateway(model),
            &test_support::sandbox(validator.clone()),
            fixture.request(),
            &CancellationToken::new(),
        )
        .await;

        match result {
            Err(StageError::ValidationExhausted { attempts, diagnostics }) => {
                assert_eq!(attempts, 3);
                assert_eq!(diagnostics.len(), 1);
            }
            other => panic!("expected ValidationExhausted, got {other:?}"),
        }
        assert_eq!(validator.call_count(), 3);
    }

    #[tokio::test]
    async fn test_malformed_turn_counts_as_attempt() {
        let model = Arc::new(
            ScriptedModel::new().script("code_generation", [Ok("sure, here it is".to_string())]),
        );
        let validator = Arc::new(ScriptedValidator::always_valid());
        let fixture = Fixture::new();

        let result = BuilderSkill::run(
            &test_support::gateway(model.clone()),
            &test_support::sandbox(validator.clone()),
            fixture.request(),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(StageError::ValidationExhausted { attempts: 3, .. })));
        assert_eq!(validator.call_count(), 0);
        // one repair per attempt
        assert_eq!(model.calls().len(), 6);
    }

    #[tokio::test]
    async fn test_doc_lookup_feeds_next_turn() {
        let model = Arc::new(ScriptedModel::new().script(
            "code_generation",
            [
                test_support::generator_search_json(&["retrieve tool configuration"]),
                test_support::generator_json(test_support::AGENT_SOURCE),
            ],
        ));
        let docs = Arc::new(ScriptedDocs {
            result: Ok(vec![DocSnippet {
                title: "Retrieve tool".into(),
                snippet: "Pass knowledge_base_id to retrieve.".into(),
            }]),
        });
        let sandbox = test_support::sandbox(Arc::new(ScriptedValidator::always_valid())).with_docs(docs);
        let fixture = Fixture::new();

        let code = BuilderSkill::run(
            &test_support::gateway(model.clone()),
            &sandbox,
            fixture.request(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(code.validation_attempts, 1);
        assert_eq!(code.tool_calls[0].tool, ToolName::SearchDocs);
        assert!(code.tool_calls[0].ok);
        assert!(model.calls()[1].prompt.contains("Pass knowledge_base_id to retrieve."));
    }

    #[tokio::test]
    async fn test_doc_lookup_failure_is_not_fatal() {
        let model = Arc::new(ScriptedModel::new().script(
            "code_generation",
            [
                test_support::generator_search_json(&["memory session manager"]),
                test_support::generator_json(test_support::AGENT_SOURCE),
            ],
        ));
        let docs = Arc::new(ScriptedDocs {
            result: Err(BackendError::Rejected("index offline".into())),
        });
        let sandbox = test_support::sandbox(Arc::new(ScriptedValidator::always_valid())).with_docs(docs);
        let fixture = Fixture::new();

        let code = BuilderSkill::run(
            &test_support::gateway(model),
            &sandbox,
            fixture.request(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(code.syntax_valid);
        assert!(!code.tool_calls[0].ok);
    }

    #[tokio::test]
    async fn test_search_only_turns_are_bounded() {
        let model = Arc::new(ScriptedModel::new().script(
            "code_generation",
            [test_support::generator_search_json(&["a", "b", "c"])],
        ));
        let docs = Arc::new(ScriptedDocs { result: Ok(vec![]) });
        let sandbox = test_support::sandbox(Arc::new(ScriptedValidator::always_valid())).with_docs(docs);
        let fixture = Fixture::new();

        let result = BuilderSkill::run(
            &test_support::gateway(model),
            &sandbox,
            fixture.request(),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(StageError::ValidationExhausted { attempts: 3, .. })));
    }

    #[tokio::test]
    async fn test_revision_keeps_review_count() {
        let model = Arc::new(ScriptedModel::new().script(
            "code_generation",
            [test_support::generator_json(test_support::AGENT_SOURCE)],
        ));
        let fixture = Fixture::new();
        let previous = GeneratedCode {
            source: "def invoke(payload, context):\n    return ''\n".into(),
            syntax_valid: true,
            review_count: 1,
            ..Default::default()
        };
        let feedback = ReviewFeedback::unreadable("memory not wired");
        let request = BuildRequest {
            previous: Some(&previous),
            feedback: Some(&feedback),
            ..fixture.request()
        };

        let code = BuilderSkill::run(
            &test_support::gateway(model.clone()),
            &test_support::sandbox(Arc::new(ScriptedValidator::always_valid())),
            request,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(code.review_count, 1);
        assert!(model.calls()[0].prompt.contains("[blocking] memory not wired"));
    }
}

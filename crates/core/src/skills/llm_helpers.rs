//! # LLM Helpers
//!
//! Structured output over a text gateway. Every stage asks for one JSON
//! object; replies are pulled out of prose or code fences, deserialized,
//! checked, and given exactly one repair call before the stage gives up.

use super::prompts::OUTPUT_REPAIR;
use crate::errors::StageError;
use crate::gateway::{LlmGateway, LlmRequest};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;

/// A record a stage expects back from the model
pub trait StructuredOutput: DeserializeOwned {
    /// Name used in errors ("requirements", "plan", ...)
    const KIND: &'static str;
    /// Example JSON shown to the model when repairing a reply
    const SHAPE: &'static str;

    /// Semantic checks beyond deserialization
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

fn fence_pattern() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_+\-]*[ \t]*\r?\n(.*?)```").ok())
        .as_ref()
}

/// Places a JSON object may sit in a reply, in the order they are tried:
/// fenced blocks first, then the span from the first `{` to the last `}`.
pub fn json_candidates(text: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    if let Some(fence) = fence_pattern() {
        for captures in fence.captures_iter(text) {
            if let Some(body) = captures.get(1) {
                let body = body.as_str().trim();
                if body.starts_with('{') {
                    candidates.push(body);
                }
            }
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            let span = &text[start..=end];
            if !candidates.contains(&span) {
                candidates.push(span);
            }
        }
    }
    candidates
}

/// Locate the JSON object in a reply. A fence cut short by a ``` inside a
/// string value does not parse, so the next candidate is used instead.
pub fn extract_json_block(text: &str) -> Option<&str> {
    let candidates = json_candidates(text);
    candidates
        .iter()
        .copied()
        .find(|block| serde_json::from_str::<serde_json::Value>(block).is_ok())
        .or_else(|| candidates.first().copied())
}

/// Source text without a surrounding markdown fence
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    fence_pattern()
        .and_then(|fence| fence.captures(trimmed))
        .and_then(|captures| captures.get(1))
        .map(|body| body.as_str().trim_end().to_string())
        .unwrap_or_else(|| trimmed.trim_matches('`').trim().to_string())
}

/// Parse and check a reply without any model call
pub fn parse_structured<T: StructuredOutput>(text: &str) -> Result<T, String> {
    let mut first_error = None;
    for block in json_candidates(text) {
        match serde_json::from_str::<T>(block) {
            Ok(value) => {
                value.check()?;
                return Ok(value);
            }
            Err(e) => {
                first_error.get_or_insert_with(|| format!("invalid JSON: {e}"));
            }
        }
    }
    Err(first_error.unwrap_or_else(|| "no JSON object in reply".to_string()))
}

/// Ask the gateway for a `T`, with one repair call on a bad reply
pub async fn request_structured<T: StructuredOutput>(
    gateway: &LlmGateway,
    request: &LlmRequest,
    cancel: &CancellationToken,
) -> Result<T, StageError> {
    let reply = gateway.complete(request, cancel).await?;
    let problem = match parse_structured::<T>(&reply) {
        Ok(value) => return Ok(value),
        Err(problem) => problem,
    };

    tracing::warn!(
        stage = request.stage,
        kind = T::KIND,
        %problem,
        "unusable structured reply, requesting repair"
    );

    let repair = LlmRequest::new(
        request.stage,
        OUTPUT_REPAIR,
        format!(
            "Expected shape:\n{}\n\nProblem:\n{}\n\nPrevious reply:\n{}",
            T::SHAPE,
            problem,
            reply
        ),
    );
    let repaired = gateway.complete(&repair, cancel).await?;
    parse_structured::<T>(&repaired).map_err(|detail| StageError::Malformed {
        what: T::KIND,
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Named {
        name: String,
    }

    impl StructuredOutput for Named {
        const KIND: &'static str = "named";
        const SHAPE: &'static str = r#"{"name": "string"}"#;

        fn check(&self) -> Result<(), String> {
            if self.name.is_empty() {
                return Err("name is empty".into());
            }
            Ok(())
        }
    }

    #[test]
    fn test_extract_from_fence() {
        let reply = "Here you go:\n```json\n{\"name\": \"ava\"}\n```\nThanks!";
        assert_eq!(extract_json_block(reply), Some("{\"name\": \"ava\"}"));
    }

    #[test]
    fn test_extract_from_prose() {
        let reply = "Sure. {\"a\": {\"b\": 1}} done";
        assert_eq!(extract_json_block(reply), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(extract_json_block("no json here"), None);
    }

    #[test]
    fn test_extract_skips_non_json_fence() {
        let reply = "```python\nprint(1)\n```\n{\"name\": \"x\"}";
        assert_eq!(extract_json_block(reply), Some("{\"name\": \"x\"}"));
    }

    #[test]
    fn test_fence_inside_string_value() {
        let reply = r#"```json
{"name": "print('''\n```python\nx = 1\n```\n''')"}
```"#;
        let named = parse_structured::<Named>(reply).unwrap();
        assert!(named.name.contains("```python"));
        assert!(extract_json_block(reply).unwrap().ends_with(r#"''')"}"#));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```python\nprint(1)\n```"), "print(1)");
        assert_eq!(strip_code_fences("  print(2)\n"), "print(2)");
    }

    #[test]
    fn test_parse_structured_runs_check() {
        assert!(parse_structured::<Named>(r#"{"name": "ava"}"#).is_ok());
        let err = parse_structured::<Named>(r#"{"name": ""}"#).unwrap_err();
        assert_eq!(err, "name is empty");
        assert!(parse_structured::<Named>("{not json}").is_err());
    }
}

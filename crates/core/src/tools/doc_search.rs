//! HTTP documentation search.
//!
//! Queries `GET {endpoint}?q=<query>&k=<k>` and accepts either a bare JSON
//! array of results or an object with a `results` array. Each result needs a
//! title and one of `snippet` / `content` / `text`.

use super::{DocSearch, DocSnippet};
use crate::errors::BackendError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub struct HttpDocSearch {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpDocSearch {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Rejected(format!("failed to build http client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl DocSearch for HttpDocSearch {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<DocSnippet>, BackendError> {
        let url = format!(
            "{}?q={}&k={}",
            self.endpoint,
            urlencoding::encode(query),
            k
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout
            } else {
                BackendError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(BackendError::RateLimited(status.to_string()));
        }
        if status.is_server_error() {
            return Err(BackendError::Transport(status.to_string()));
        }
        if !status.is_success() {
            return Err(BackendError::Rejected(status.to_string()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| BackendError::Rejected(format!("invalid search response: {e}")))?;

        let mut snippets = parse_results(&body);
        snippets.truncate(k);
        Ok(snippets)
    }
}

/// Extract snippets from a search response body
pub fn parse_results(body: &Value) -> Vec<DocSnippet> {
    let items = match body {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("results") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    items
        .iter()
        .filter_map(|item| {
            let title = item.get("title").and_then(Value::as_str).unwrap_or_default();
            let snippet = ["snippet", "content", "text"]
                .iter()
                .find_map(|key| item.get(*key).and_then(Value::as_str))?;
            if snippet.trim().is_empty() {
                return None;
            }
            Some(DocSnippet {
                title: title.to_string(),
                snippet: snippet.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_results_object_and_array() {
        let wrapped = json!({
            "results": [
                {"title": "Agent", "snippet": "Agent(model=..., tools=[...])"},
                {"title": "Memory", "content": "Use the memory tool for recall"},
                {"title": "Empty", "snippet": "   "},
                {"title": "No body"}
            ]
        });
        let snippets = parse_results(&wrapped);
        assert_eq!(snippets.len(), 2);
        assert_eq!(snippets[1].title, "Memory");

        let bare = json!([{"text": "retrieve(knowledge_base_id=...)"}]);
        let snippets = parse_results(&bare);
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].title, "");
    }

    #[test]
    fn test_parse_results_unexpected_shape() {
        assert!(parse_results(&json!({"hits": []})).is_empty());
        assert!(parse_results(&json!("nope")).is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let search =
            HttpDocSearch::new("http://127.0.0.1:9/search", Duration::from_secs(2)).unwrap();
        let result = search.search("agent tools", 3).await;
        assert!(matches!(
            result,
            Err(BackendError::Transport(_)) | Err(BackendError::Timeout)
        ));
    }
}

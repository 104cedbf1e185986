//! OpenAI-compatible REST client for chat completions and embeddings.
//!
//! Minimal surface: JSON-mode chat completion for the classifier and
//! batch embeddings for the vector ingestor. Base URL is configurable
//! for proxies and compatible providers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::traits::{BaseAi, BaseEmbeddingService};
use crate::config::Config;

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    embedding_model: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat<'a>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            chat_model: config.classifier_model.clone(),
            embedding_model: config.embedding_model.clone(),
        }
    }

    #[cfg(test)]
    fn for_tests(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: "test-key".to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
        }
    }
}

#[async_trait]
impl BaseAi for OpenAiClient {
    async fn complete_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
            max_tokens: 1000,
            temperature: 0.1,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Chat completion request failed")?
            .error_for_status()
            .context("Chat completion returned error status")?;

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("Chat completion response had no content")
    }
}

#[async_trait]
impl BaseEmbeddingService for OpenAiClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        tracing::debug!(count = texts.len(), model = %self.embedding_model, "Generating embeddings");

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
        };

        let response = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Embedding request failed")?
            .error_for_status()
            .context("Embedding request returned error status")?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embedding response")?;

        if body.data.len() != texts.len() {
            anyhow::bail!(
                "Embedding provider returned {} vectors for {} inputs",
                body.data.len(),
                texts.len()
            );
        }

        Ok(body.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_complete_json_uses_json_mode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "{\"ok\":true}"}}]
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::for_tests(&server.uri());
        let out = client.complete_json("system", "user").await.unwrap();
        assert_eq!(out, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_embed_batch_orders_and_counts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"embedding": [0.1, 0.2]},
                    {"embedding": [0.3, 0.4]}
                ]
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::for_tests(&server.uri());
        let texts = vec!["a".to_string(), "b".to_string()];
        let vectors = client.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn test_embed_batch_count_mismatch_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.1]}]
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::for_tests(&server.uri());
        let texts = vec!["a".to_string(), "b".to_string()];
        assert!(client.embed_batch(&texts).await.is_err());
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::{EmbeddingConfig, ProviderConfig};
use crate::services::provider::{EmbeddingProvider, GenerationProvider};
use crate::utils::error::ChatError;
use crate::utils::limiters::Limiters;

/// Gemini client speaking the OpenAI-compatible `v1beta/openai` surface.
/// One instance serves both generation and embeddings.
#[derive(Clone)]
pub struct GeminiService {
    client: Client,
    config: ProviderConfig,
    embedding: EmbeddingConfig,
    limiters: Arc<Limiters>,
}

#[derive(Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

// Response Structures
#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

impl GeminiService {
    pub fn new(config: ProviderConfig, embedding: EmbeddingConfig, limiters: Arc<Limiters>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
            embedding,
            limiters,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn chat_completion(&self, prompt: &str) -> Result<String, ChatError> {
        let (_permit, waited) = self
            .limiters
            .generation_permit()
            .await
            .map_err(|e| ChatError::Generation(e.to_string()))?;

        debug!(
            "Generating with {} ({} chars, waited {:?} for permit)",
            self.config.chat_model,
            prompt.len(),
            waited
        );

        let request = OpenAiChatRequest {
            model: &self.config.chat_model,
            messages: vec![OpenAiMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChatError::Generation(format!("Gemini request timed out: {}", e))
                } else {
                    ChatError::Generation(format!("Gemini network error: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                ChatError::Generation(format!("Gemini quota exceeded: {}", body))
            } else {
                ChatError::Generation(format!("Gemini API error ({}): {}", status, body))
            });
        }

        let body: OpenAiChatResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Generation(format!("Malformed Gemini response: {}", e)))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ChatError::Generation(
                "Gemini returned an empty completion".to_string(),
            ));
        }

        Ok(text)
    }

    async fn embed_internal(&self, text: &str) -> Result<Vec<f32>> {
        let (_permit, _) = self.limiters.embedding_permit().await?;

        debug!("Generating embedding for {} chars", text.len());

        let request = OpenAiEmbeddingRequest {
            input: text,
            model: &self.embedding.model,
        };

        let response = self
            .client
            .post(self.endpoint("embeddings"))
            .bearer_auth(&self.config.api_key)
            .timeout(Duration::from_secs(self.embedding.timeout_seconds.max(1)))
            .json(&request)
            .send()
            .await
            .context("Failed to connect to Gemini embedding endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini embedding error ({}): {}", status, body);
        }

        let body: OpenAiEmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse Gemini embedding response")?;

        let embedding = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .unwrap_or_default();

        if embedding.is_empty() {
            anyhow::bail!("Gemini returned no embedding data");
        }

        if self.embedding.dimension != 0 && embedding.len() != self.embedding.dimension {
            anyhow::bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.embedding.dimension,
                embedding.len()
            );
        }

        Ok(embedding)
    }
}

#[async_trait]
impl GenerationProvider for GeminiService {
    async fn generate(&self, prompt: &str) -> Result<String, ChatError> {
        self.chat_completion(prompt).await
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_internal(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsConfig;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(base_url: String, dimension: usize) -> GeminiService {
        let config = ProviderConfig {
            api_key: "test-key".to_string(),
            base_url,
            timeout_seconds: 5,
            ..ProviderConfig::default()
        };
        let embedding = EmbeddingConfig {
            dimension,
            ..EmbeddingConfig::default()
        };
        GeminiService::new(config, embedding, Arc::new(Limiters::new(&LimitsConfig::default())))
    }

    #[tokio::test]
    async fn test_generate_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(bearer_token("test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Savings accounts earn interest." } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gemini = service(server.uri(), 0);
        let text = gemini.generate("What is a savings account?").await.unwrap();
        assert_eq!(text, "Savings accounts earn interest.");
    }

    #[tokio::test]
    async fn test_quota_error_maps_to_generation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
            .mount(&server)
            .await;

        let err = service(server.uri(), 0).generate("hi").await.unwrap_err();
        match err {
            ChatError::Generation(msg) => assert!(msg.contains("quota")),
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_and_empty_bodies_are_generation_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = service(server.uri(), 0).generate("hi").await.unwrap_err();
        assert!(matches!(err, ChatError::Generation(_)));

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = service(server.uri(), 0).generate("hi").await.unwrap_err();
        assert!(matches!(err, ChatError::Generation(_)));
    }

    #[tokio::test]
    async fn test_embed_checks_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "embedding": [0.1, 0.2, 0.3] }]
            })))
            .mount(&server)
            .await;

        let vector = service(server.uri(), 3).embed("hello").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);

        assert!(service(server.uri(), 4).embed("hello").await.is_err());
    }

    #[tokio::test]
    async fn test_embed_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert!(service(server.uri(), 0).embed("hello").await.is_err());
    }
}

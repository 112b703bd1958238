//! OpenAI-compatible `/v1/embeddings` client.

use crate::transport_error;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use worldview_core::error::ServiceError;
use worldview_core::services::Embedder;
use worldview_config::ServicesConfig;

/// Embedding client for any OpenAI-compatible endpoint (Ollama, OpenAI,
/// vLLM).
#[derive(Debug)]
pub struct HttpEmbedder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpEmbedder {
    pub fn from_config(config: &ServicesConfig) -> Result<Self, ServiceError> {
        if config.embedding_url.trim().is_empty() {
            return Err(ServiceError::NotConfigured(
                "embedding_url is empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServiceError::NotConfigured(e.to_string()))?;

        Ok(Self {
            base_url: config.embedding_url.trim_end_matches('/').to_string(),
            model: config.embedding_model.clone(),
            api_key: config.api_key.clone(),
            client,
        })
    }
}

#[derive(Deserialize)]
struct ApiEmbeddingResponse {
    data: Vec<ApiEmbedding>,
}

#[derive(Deserialize)]
struct ApiEmbedding {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, ServiceError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        debug!(model = %self.model, chars = text.len(), "Sending embedding request");

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = match request.send().await.map_err(transport_error) {
            Ok(response) => response,
            Err(e @ (ServiceError::Timeout(_) | ServiceError::Network(_))) => {
                warn!(error = %e, "Embedding service unreachable");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Embedding service returned error");
            return Err(ServiceError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api: ApiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::MalformedResponse(e.to_string()))?;
        let vector = api
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ServiceError::MalformedResponse("no embedding in response".into()))?;
        if vector.is_empty() {
            return Err(ServiceError::MalformedResponse("empty embedding".into()));
        }
        Ok(Some(vector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_url_is_not_configured() {
        let mut config = ServicesConfig::default();
        config.embedding_url = "  ".into();
        let err = HttpEmbedder::from_config(&config).unwrap_err();
        assert!(matches!(err, ServiceError::NotConfigured(_)));
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let mut config = ServicesConfig::default();
        config.embedding_url = "http://localhost:11434/v1/".into();
        let embedder = HttpEmbedder::from_config(&config).unwrap();
        assert_eq!(embedder.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn response_shape_parses() {
        let api: ApiEmbeddingResponse =
            serde_json::from_str(r#"{"data":[{"embedding":[0.1,0.2]}],"model":"m"}"#).unwrap();
        assert_eq!(api.data[0].embedding.len(), 2);
    }
}

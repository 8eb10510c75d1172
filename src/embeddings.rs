//! Embedding generation for documents and queries.
//!
//! The underlying model is trained asymmetrically: text stored for lookup
//! and text used to look it up are embedded with different intents, and the
//! two must never be mixed. Document batches degrade per item on failure;
//! query embeddings propagate failure instead, because a zero query vector
//! would silently corrupt ranking for the whole request.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::core::config::RagSettings;
use crate::core::errors::RagError;

/// Dimension of the embedding vectors, and of the zero-fallback vector
/// substituted for documents that fail to embed.
pub const EMBEDDING_DIM: usize = 768;

/// Which side of the asymmetric model a text is embedded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingIntent {
    /// Stored document, embedded for retrieval.
    Document,
    /// Search query, embedded for lookup.
    Query,
}

impl EmbeddingIntent {
    /// Instruction prefix understood by nomic-style embedding models.
    pub fn prefix(&self) -> &'static str {
        match self {
            EmbeddingIntent::Document => "search_document",
            EmbeddingIntent::Query => "search_query",
        }
    }
}

/// Backend that turns text into vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(
        &self,
        texts: &[String],
        intent: EmbeddingIntent,
    ) -> Result<Vec<Vec<f32>>, RagError>;
}

/// HTTP client for an OpenAI-compatible `/v1/embeddings` endpoint.
pub struct HttpEmbeddingClient {
    client: Client,
    endpoint: String,
    model: String,
}

impl HttpEmbeddingClient {
    pub fn new(settings: &RagSettings) -> Self {
        Self {
            client: Client::new(),
            endpoint: settings.embedding_endpoint.trim_end_matches('/').to_string(),
            model: settings.embedding_model.clone(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    async fn embed(
        &self,
        texts: &[String],
        intent: EmbeddingIntent,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let inputs: Vec<String> = texts
            .iter()
            .map(|text| format!("{}: {}", intent.prefix(), text))
            .collect();

        let url = format!("{}/v1/embeddings", self.endpoint);
        let body = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(RagError::embedding)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "embedding request failed: {} {}",
                status, text
            )));
        }

        let payload: Value = response.json().await.map_err(RagError::embedding)?;
        parse_embedding_response(&payload)
    }
}

/// Embedding generator with the batch degradation policy.
pub struct EmbeddingGenerator {
    provider: Arc<dyn EmbeddingProvider>,
    dim: usize,
}

impl EmbeddingGenerator {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, dim: usize) -> Self {
        Self { provider, dim }
    }

    pub fn zero_vector(&self) -> Vec<f32> {
        vec![0.0; self.dim]
    }

    /// Embed a single document. Failures propagate to the caller.
    pub async fn embed_document(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut vectors = self
            .provider
            .embed(&[text.to_string()], EmbeddingIntent::Document)
            .await?;

        if vectors.is_empty() {
            return Err(RagError::Embedding(
                "provider returned no vectors".to_string(),
            ));
        }
        Ok(vectors.remove(0))
    }

    /// Embed a batch of documents.
    ///
    /// The batch call is attempted first. On failure every text is retried
    /// individually, and a text that still fails is replaced by the zero
    /// vector so one bad input never aborts the batch. The returned vector
    /// always has the same arity as `texts`.
    pub async fn embed_documents(&self, texts: &[String]) -> Vec<Vec<f32>> {
        if texts.is_empty() {
            return Vec::new();
        }

        match self
            .provider
            .embed(texts, EmbeddingIntent::Document)
            .await
        {
            Ok(vectors) if vectors.len() == texts.len() => return vectors,
            Ok(vectors) => {
                tracing::warn!(
                    "Batch embedding returned {} vectors for {} texts, retrying per item",
                    vectors.len(),
                    texts.len()
                );
            }
            Err(err) => {
                tracing::warn!("Batch embedding failed, retrying per item: {}", err);
            }
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            match self.embed_document(text).await {
                Ok(vector) => vectors.push(vector),
                Err(err) => {
                    tracing::error!("Failed to embed text, substituting zero vector: {}", err);
                    vectors.push(self.zero_vector());
                }
            }
        }
        vectors
    }

    /// Embed a search query. Failures propagate: retrieval must see them.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut vectors = self
            .provider
            .embed(&[text.to_string()], EmbeddingIntent::Query)
            .await?;

        if vectors.is_empty() {
            return Err(RagError::Embedding(
                "provider returned no vectors".to_string(),
            ));
        }
        Ok(vectors.remove(0))
    }
}

/// Parse an OpenAI-style embedding payload, re-ordering by the `index`
/// field so vectors line up with the input order.
fn parse_embedding_response(payload: &Value) -> Result<Vec<Vec<f32>>, RagError> {
    let Some(data) = payload.get("data").and_then(|v| v.as_array()) else {
        return Err(RagError::Embedding(
            "embedding response missing data array".to_string(),
        ));
    };

    let mut indexed_embeddings = Vec::with_capacity(data.len());
    for (fallback_idx, item) in data.iter().enumerate() {
        let Some(values) = item.get("embedding").and_then(|v| v.as_array()) else {
            return Err(RagError::Embedding(
                "embedding response item missing embedding array".to_string(),
            ));
        };

        let mut embedding = Vec::with_capacity(values.len());
        for value in values {
            let Some(float_value) = value.as_f64() else {
                return Err(RagError::Embedding(
                    "embedding contains non-numeric value".to_string(),
                ));
            };
            embedding.push(float_value as f32);
        }

        let index = item
            .get("index")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(fallback_idx);
        indexed_embeddings.push((index, embedding));
    }

    indexed_embeddings.sort_by_key(|(idx, _)| *idx);
    Ok(indexed_embeddings
        .into_iter()
        .map(|(_, embedding)| embedding)
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{FailingEmbedder, ScriptedEmbedder};

    #[test]
    fn parse_embedding_response_preserves_input_order_by_index() {
        let payload = json!({
            "data": [
                {"index": 1, "embedding": [0.3, 0.4]},
                {"index": 0, "embedding": [0.1, 0.2]}
            ]
        });

        let parsed = parse_embedding_response(&payload).expect("embedding payload should parse");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], vec![0.1_f32, 0.2_f32]);
        assert_eq!(parsed[1], vec![0.3_f32, 0.4_f32]);
    }

    #[test]
    fn intent_prefixes_differ() {
        assert_ne!(
            EmbeddingIntent::Document.prefix(),
            EmbeddingIntent::Query.prefix()
        );
    }

    #[tokio::test]
    async fn batch_substitutes_zero_vector_for_failed_text() {
        let embedder = ScriptedEmbedder::new(4).with_text("good text", vec![1.0, 0.0, 0.0, 0.0]);
        let generator = EmbeddingGenerator::new(Arc::new(embedder), 4);

        let vectors = generator
            .embed_documents(&["good text".to_string(), "unknown text".to_string()])
            .await;

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0; 4]);
    }

    #[tokio::test]
    async fn query_embedding_failure_propagates() {
        let generator = EmbeddingGenerator::new(Arc::new(FailingEmbedder), EMBEDDING_DIM);

        let err = generator.embed_query("anything").await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
    }

    #[tokio::test]
    async fn empty_batch_returns_empty() {
        let generator = EmbeddingGenerator::new(Arc::new(FailingEmbedder), EMBEDDING_DIM);
        assert!(generator.embed_documents(&[]).await.is_empty());
    }
}

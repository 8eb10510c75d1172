//! Shared test doubles for the crate's unit tests.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::errors::RagError;
use crate::embeddings::{EmbeddingIntent, EmbeddingProvider};
use crate::generation::AnalysisProvider;

/// Embedder that only knows scripted texts. A batch containing any unknown
/// text fails as a whole; per-item retries then fail only for the unknown
/// ones, which exercises the zero-vector fallback ladder.
pub(crate) struct ScriptedEmbedder {
    dim: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl ScriptedEmbedder {
    pub(crate) fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: HashMap::new(),
        }
    }

    pub(crate) fn with_text(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dim, "scripted vector has wrong dimension");
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    async fn embed(
        &self,
        texts: &[String],
        _intent: EmbeddingIntent,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        texts
            .iter()
            .map(|text| {
                self.vectors
                    .get(text)
                    .cloned()
                    .ok_or_else(|| RagError::Embedding(format!("no scripted vector for: {text}")))
            })
            .collect()
    }
}

/// Deterministic bag-of-words embedder: words hash into `dim` buckets and
/// the count vector is L2-normalized. Similar texts land close together,
/// which is enough to drive retrieval end to end without a model.
pub(crate) struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub(crate) fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dim];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dim;
            vector[bucket] += 1.0;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(
        &self,
        texts: &[String],
        _intent: EmbeddingIntent,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

/// Embedder that always fails.
pub(crate) struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(
        &self,
        _texts: &[String],
        _intent: EmbeddingIntent,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        Err(RagError::Embedding("provider unavailable".to_string()))
    }
}

/// Recorded arguments of one analyzer invocation.
#[derive(Debug, Clone)]
pub(crate) struct AnalyzerCall {
    pub description: String,
    pub plant_type: Option<String>,
    pub context: Option<String>,
}

/// Analyzer returning a fixed payload and recording its calls.
pub(crate) struct MockAnalyzer {
    response: Value,
    pub(crate) calls: Mutex<Vec<AnalyzerCall>>,
}

impl MockAnalyzer {
    pub(crate) fn new(response: Value) -> Self {
        Self {
            response,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AnalysisProvider for MockAnalyzer {
    async fn analyze(
        &self,
        description: &str,
        plant_type: Option<&str>,
        context: Option<&str>,
    ) -> Result<Value, RagError> {
        self.calls.lock().unwrap().push(AnalyzerCall {
            description: description.to_string(),
            plant_type: plant_type.map(String::from),
            context: context.map(String::from),
        });
        Ok(self.response.clone())
    }
}

/// Analyzer that always fails with a generation error.
pub(crate) struct FailingAnalyzer;

#[async_trait]
impl AnalysisProvider for FailingAnalyzer {
    async fn analyze(
        &self,
        _description: &str,
        _plant_type: Option<&str>,
        _context: Option<&str>,
    ) -> Result<Value, RagError> {
        Err(RagError::Generation("model offline".to_string()))
    }
}

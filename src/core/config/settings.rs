use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::AppPaths;
use crate::core::errors::RagError;
use crate::embeddings::EMBEDDING_DIM;

const DEFAULT_EMBEDDING_ENDPOINT: &str = "http://127.0.0.1:8081";
const DEFAULT_GENERATION_ENDPOINT: &str = "http://127.0.0.1:8080";

/// Tunables for the RAG core.
///
/// Loaded from `config.json` in the data directory (or the file named by
/// `VERDANT_CONFIG_PATH`), with serde defaults filling anything the file
/// omits. Connection parameters live here rather than in the component
/// APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Base URL of the embedding server (`/v1/embeddings`).
    pub embedding_endpoint: String,
    pub embedding_model: String,
    /// Dimension of the embedding vectors; also the zero-fallback size.
    pub embedding_dim: usize,
    /// Base URL of the generation server (`/v1/chat/completions`).
    pub generation_endpoint: String,
    pub generation_model: String,
    /// Default number of results per retrieval.
    pub top_k: usize,
    /// Minimum similarity for semantic retrieval results.
    pub min_similarity: f64,
    /// Mean-similarity threshold for trusting retrieved context.
    pub confidence_threshold: f64,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            embedding_endpoint: DEFAULT_EMBEDDING_ENDPOINT.to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_dim: EMBEDDING_DIM,
            generation_endpoint: DEFAULT_GENERATION_ENDPOINT.to_string(),
            generation_model: "text_model".to_string(),
            top_k: 5,
            min_similarity: 0.3,
            confidence_threshold: 0.5,
        }
    }
}

impl RagSettings {
    pub fn load(paths: &AppPaths) -> Result<Self, RagError> {
        let path = config_path(paths);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(RagError::internal)?;
        let settings: RagSettings = serde_json::from_str(&content).map_err(|err| {
            RagError::BadRequest(format!("invalid config {}: {}", path.display(), err))
        })?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), RagError> {
        if self.embedding_dim == 0 {
            return Err(RagError::BadRequest(
                "embedding_dim must be positive".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(RagError::BadRequest("top_k must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(RagError::BadRequest(
                "min_similarity must be within [0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(RagError::BadRequest(
                "confidence_threshold must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

fn config_path(paths: &AppPaths) -> PathBuf {
    if let Ok(path) = env::var("VERDANT_CONFIG_PATH") {
        return PathBuf::from(path);
    }

    paths.data_dir.join("config.json")
}

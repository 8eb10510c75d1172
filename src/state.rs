//! Process-wide application state.
//!
//! The store, embedding client, and analysis client are constructed once
//! at startup and passed around by handle; nothing here is a hidden
//! global.

use std::sync::Arc;

use crate::core::config::{AppPaths, RagSettings};
use crate::embeddings::{EmbeddingGenerator, HttpEmbeddingClient};
use crate::generation::HttpAnalysisClient;
use crate::service::RagService;
use crate::store::sqlite::SqliteVectorStore;
use crate::store::VectorStore;

pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: Arc<RagSettings>,
    pub store: Arc<VectorStore>,
    pub embeddings: Arc<EmbeddingGenerator>,
    pub rag: Arc<RagService>,
}

impl AppState {
    pub async fn initialize() -> anyhow::Result<Arc<Self>> {
        Self::initialize_with_paths(AppPaths::new()).await
    }

    pub async fn initialize_with_paths(paths: AppPaths) -> anyhow::Result<Arc<Self>> {
        let paths = Arc::new(paths);
        let settings = Arc::new(RagSettings::load(&paths)?);

        let provider = Arc::new(HttpEmbeddingClient::new(&settings));
        let embeddings = Arc::new(EmbeddingGenerator::new(provider, settings.embedding_dim));

        let backend = SqliteVectorStore::open(paths.db_path.clone()).await?;
        let store = Arc::new(VectorStore::new(Arc::new(backend), embeddings.clone()));

        let analyzer = Arc::new(HttpAnalysisClient::new(&settings));
        let rag = Arc::new(RagService::new(
            store.clone(),
            embeddings.clone(),
            analyzer,
            settings.clone(),
        ));

        Ok(Arc::new(AppState {
            paths,
            settings,
            store,
            embeddings,
            rag,
        }))
    }
}

//! Vector store: named collections of knowledge entries.
//!
//! A collection holds `(id, content, metadata, embedding)` tuples and
//! supports upsert, nearest-neighbor query, metadata scan, and deletion.
//! The `VectorStore` front caches collection handles process-wide so a
//! collection is opened once and reused; `SqliteVectorStore` is the
//! persistent backend and `MemoryVectorStore` the in-process one.

pub mod memory;
pub mod sqlite;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::core::errors::RagError;
use crate::embeddings::EmbeddingGenerator;

/// Entry metadata: string keys mapped to scalar/boolean values.
pub type Metadata = serde_json::Map<String, Value>;

/// A fully-formed entry as the store persists it. An entry always carries
/// content, metadata, and embedding together.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    pub embedding: Vec<f32>,
}

/// One entry returned by a query, with its raw vector-space distance.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    pub distance: f64,
}

/// Collection statistics.
#[derive(Debug, Clone)]
pub struct CollectionStats {
    pub name: String,
    pub count: usize,
    pub metadata: Metadata,
}

/// A cached handle to an opened collection.
#[derive(Debug, Clone)]
pub struct CollectionHandle {
    pub name: String,
    pub metadata: Metadata,
}

/// Condition applied to a single metadata field.
#[derive(Debug, Clone)]
pub enum FilterOp {
    Eq(Value),
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
}

/// Equality/range filter over entry metadata. All conditions must hold.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<(String, FilterOp)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), FilterOp::Eq(value.into())));
        self
    }

    pub fn gt(mut self, field: impl Into<String>, value: f64) -> Self {
        self.conditions.push((field.into(), FilterOp::Gt(value)));
        self
    }

    pub fn gte(mut self, field: impl Into<String>, value: f64) -> Self {
        self.conditions.push((field.into(), FilterOp::Gte(value)));
        self
    }

    pub fn lt(mut self, field: impl Into<String>, value: f64) -> Self {
        self.conditions.push((field.into(), FilterOp::Lt(value)));
        self
    }

    pub fn lte(mut self, field: impl Into<String>, value: f64) -> Self {
        self.conditions.push((field.into(), FilterOp::Lte(value)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions.iter().all(|(field, op)| {
            let Some(value) = metadata.get(field) else {
                return false;
            };
            match op {
                FilterOp::Eq(expected) => value == expected,
                FilterOp::Gt(bound) => value.as_f64().map(|v| v > *bound).unwrap_or(false),
                FilterOp::Gte(bound) => value.as_f64().map(|v| v >= *bound).unwrap_or(false),
                FilterOp::Lt(bound) => value.as_f64().map(|v| v < *bound).unwrap_or(false),
                FilterOp::Lte(bound) => value.as_f64().map(|v| v <= *bound).unwrap_or(false),
            }
        })
    }
}

/// Storage backend behind the collection-handle front.
#[async_trait]
pub trait VectorStoreBackend: Send + Sync {
    /// Create the collection if missing. Metadata is applied only on first
    /// creation; an existing collection keeps what it was created with.
    async fn ensure_collection(&self, name: &str, metadata: &Metadata) -> Result<(), RagError>;

    /// Upsert entries. An existing id is fully replaced, never merged.
    async fn upsert(&self, collection: &str, entries: Vec<StoredEntry>) -> Result<(), RagError>;

    /// Nearest entries to `query` by vector distance, ascending. An empty
    /// or missing collection yields an empty set, never an error.
    async fn nearest(
        &self,
        collection: &str,
        query: &[f32],
        n_results: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<QueryMatch>, RagError>;

    /// Entries matching `filter` without ranking; `distance` is 0.0.
    async fn scan(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<QueryMatch>, RagError>;

    /// Remove the collection. Returns whether it existed.
    async fn delete_collection(&self, name: &str) -> Result<bool, RagError>;

    async fn count(&self, collection: &str) -> Result<usize, RagError>;

    async fn collection_metadata(&self, name: &str) -> Result<Metadata, RagError>;
}

/// Process-wide vector store front.
///
/// Owns the collection-handle cache and the embedding hook used when a
/// caller adds documents without precomputed embeddings or queries by
/// text. Constructed once at startup and shared by handle.
pub struct VectorStore {
    backend: Arc<dyn VectorStoreBackend>,
    embeddings: Arc<EmbeddingGenerator>,
    collections: RwLock<HashMap<String, CollectionHandle>>,
}

impl VectorStore {
    pub fn new(backend: Arc<dyn VectorStoreBackend>, embeddings: Arc<EmbeddingGenerator>) -> Self {
        Self {
            backend,
            embeddings,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create a collection. Idempotent; the first call for a name
    /// creates the underlying collection, later calls return the cached
    /// handle. Double-checked under the write lock so concurrent first
    /// callers cannot create duplicates.
    pub async fn get_or_create(
        &self,
        name: &str,
        metadata: Option<Metadata>,
    ) -> Result<CollectionHandle, RagError> {
        if let Some(handle) = self.collections.read().await.get(name) {
            return Ok(handle.clone());
        }

        let mut cache = self.collections.write().await;
        if let Some(handle) = cache.get(name) {
            return Ok(handle.clone());
        }

        let requested = metadata.unwrap_or_default();
        self.backend.ensure_collection(name, &requested).await?;
        let effective = self.backend.collection_metadata(name).await?;

        let handle = CollectionHandle {
            name: name.to_string(),
            metadata: effective,
        };
        cache.insert(name.to_string(), handle.clone());
        tracing::info!("Collection '{}' ready", name);

        Ok(handle)
    }

    /// Upsert documents into a collection.
    ///
    /// `documents` and `metadatas` must have equal arity, as must
    /// `embeddings` and `ids` when given; otherwise the call fails with
    /// `ShapeMismatch`. Missing ids are generated; missing embeddings are
    /// computed in document mode with the per-item degradation policy.
    pub async fn add(
        &self,
        collection: &str,
        documents: Vec<String>,
        metadatas: Vec<Metadata>,
        embeddings: Option<Vec<Vec<f32>>>,
        ids: Option<Vec<String>>,
    ) -> Result<(), RagError> {
        if documents.len() != metadatas.len() {
            return Err(RagError::ShapeMismatch(format!(
                "{} documents but {} metadatas",
                documents.len(),
                metadatas.len()
            )));
        }
        if let Some(embeddings) = &embeddings {
            if embeddings.len() != documents.len() {
                return Err(RagError::ShapeMismatch(format!(
                    "{} documents but {} embeddings",
                    documents.len(),
                    embeddings.len()
                )));
            }
        }
        if let Some(ids) = &ids {
            if ids.len() != documents.len() {
                return Err(RagError::ShapeMismatch(format!(
                    "{} documents but {} ids",
                    documents.len(),
                    ids.len()
                )));
            }
        }

        if documents.is_empty() {
            return Ok(());
        }

        self.get_or_create(collection, None).await?;

        let embeddings = match embeddings {
            Some(embeddings) => embeddings,
            None => self.embeddings.embed_documents(&documents).await,
        };
        let ids = ids.unwrap_or_else(|| {
            documents
                .iter()
                .map(|_| uuid::Uuid::new_v4().to_string())
                .collect()
        });

        let entries: Vec<StoredEntry> = ids
            .into_iter()
            .zip(documents)
            .zip(metadatas)
            .zip(embeddings)
            .map(|(((id, content), metadata), embedding)| StoredEntry {
                id,
                content,
                metadata,
                embedding,
            })
            .collect();

        let count = entries.len();
        self.backend.upsert(collection, entries).await?;
        tracing::debug!("Added {} documents to '{}'", count, collection);

        Ok(())
    }

    /// Query by text: each query text is embedded in query mode and matched
    /// against the collection. An empty query text skips embedding and
    /// degenerates to a metadata scan.
    pub async fn query(
        &self,
        collection: &str,
        query_texts: &[String],
        n_results: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<Vec<QueryMatch>>, RagError> {
        self.get_or_create(collection, None).await?;

        let mut result_sets = Vec::with_capacity(query_texts.len());
        for text in query_texts {
            if text.trim().is_empty() {
                result_sets.push(self.backend.scan(collection, filter, n_results).await?);
                continue;
            }

            let embedding = self.embeddings.embed_query(text).await?;
            result_sets.push(
                self.backend
                    .nearest(collection, &embedding, n_results, filter)
                    .await?,
            );
        }

        Ok(result_sets)
    }

    /// Query with precomputed query-mode embeddings.
    pub async fn query_with_embeddings(
        &self,
        collection: &str,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<Vec<QueryMatch>>, RagError> {
        self.get_or_create(collection, None).await?;

        let mut result_sets = Vec::with_capacity(query_embeddings.len());
        for embedding in query_embeddings {
            result_sets.push(
                self.backend
                    .nearest(collection, embedding, n_results, filter)
                    .await?,
            );
        }

        Ok(result_sets)
    }

    /// Entries matching a metadata filter, without any embedding step.
    pub async fn scan(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<QueryMatch>, RagError> {
        self.get_or_create(collection, None).await?;
        self.backend.scan(collection, filter, limit).await
    }

    /// Remove a collection and evict its cached handle.
    pub async fn delete_collection(&self, name: &str) -> Result<(), RagError> {
        self.backend.delete_collection(name).await?;
        self.collections.write().await.remove(name);
        tracing::info!("Deleted collection '{}'", name);
        Ok(())
    }

    pub async fn stats(&self, name: &str) -> Result<CollectionStats, RagError> {
        let handle = self.get_or_create(name, None).await?;
        let count = self.backend.count(name).await?;

        Ok(CollectionStats {
            name: handle.name,
            count,
            metadata: handle.metadata,
        })
    }
}

/// Euclidean distance between two vectors, `None` when the dimensions
/// disagree (incomparable entries are skipped by the backends).
pub(crate) fn euclidean_distance(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = (*x as f64) - (*y as f64);
            diff * diff
        })
        .sum();

    Some(sum.sqrt())
}

//! In-process vector store backed by a plain map.
//!
//! Useful for tests and ephemeral deployments; semantics mirror the SQLite
//! backend exactly.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{euclidean_distance, Filter, Metadata, QueryMatch, StoredEntry, VectorStoreBackend};
use crate::core::errors::RagError;

#[derive(Default)]
struct CollectionData {
    metadata: Metadata,
    // Insertion-ordered; upserts replace in place.
    entries: Vec<StoredEntry>,
}

#[derive(Default)]
pub struct MemoryVectorStore {
    collections: Mutex<HashMap<String, CollectionData>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStoreBackend for MemoryVectorStore {
    async fn ensure_collection(&self, name: &str, metadata: &Metadata) -> Result<(), RagError> {
        let mut collections = self.collections.lock().unwrap();
        collections
            .entry(name.to_string())
            .or_insert_with(|| CollectionData {
                metadata: metadata.clone(),
                entries: Vec::new(),
            });
        Ok(())
    }

    async fn upsert(&self, collection: &str, entries: Vec<StoredEntry>) -> Result<(), RagError> {
        let mut collections = self.collections.lock().unwrap();
        let data = collections.entry(collection.to_string()).or_default();

        for entry in entries {
            match data.entries.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry,
                None => data.entries.push(entry),
            }
        }
        Ok(())
    }

    async fn nearest(
        &self,
        collection: &str,
        query: &[f32],
        n_results: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<QueryMatch>, RagError> {
        let collections = self.collections.lock().unwrap();
        let Some(data) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<QueryMatch> = data
            .entries
            .iter()
            .filter(|entry| filter.map(|f| f.matches(&entry.metadata)).unwrap_or(true))
            .filter_map(|entry| {
                euclidean_distance(query, &entry.embedding).map(|distance| QueryMatch {
                    id: entry.id.clone(),
                    content: entry.content.clone(),
                    metadata: entry.metadata.clone(),
                    distance,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(n_results);

        Ok(scored)
    }

    async fn scan(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<QueryMatch>, RagError> {
        let collections = self.collections.lock().unwrap();
        let Some(data) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(data
            .entries
            .iter()
            .filter(|entry| filter.map(|f| f.matches(&entry.metadata)).unwrap_or(true))
            .take(limit)
            .map(|entry| QueryMatch {
                id: entry.id.clone(),
                content: entry.content.clone(),
                metadata: entry.metadata.clone(),
                distance: 0.0,
            })
            .collect())
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, RagError> {
        let mut collections = self.collections.lock().unwrap();
        Ok(collections.remove(name).is_some())
    }

    async fn count(&self, collection: &str) -> Result<usize, RagError> {
        let collections = self.collections.lock().unwrap();
        Ok(collections
            .get(collection)
            .map(|data| data.entries.len())
            .unwrap_or(0))
    }

    async fn collection_metadata(&self, name: &str) -> Result<Metadata, RagError> {
        let collections = self.collections.lock().unwrap();
        Ok(collections
            .get(name)
            .map(|data| data.metadata.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn entry(id: &str, embedding: Vec<f32>) -> StoredEntry {
        StoredEntry {
            id: id.to_string(),
            content: format!("content for {id}"),
            metadata: Metadata::new(),
            embedding,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let store = MemoryVectorStore::new();
        store.upsert("kb", vec![entry("a", vec![1.0])]).await.unwrap();
        store.upsert("kb", vec![entry("a", vec![2.0])]).await.unwrap();

        assert_eq!(store.count("kb").await.unwrap(), 1);
        let matches = store.nearest("kb", &[2.0], 5, None).await.unwrap();
        assert_eq!(matches[0].distance, 0.0);
    }

    #[tokio::test]
    async fn nearest_orders_by_ascending_distance() {
        let store = MemoryVectorStore::new();
        store
            .upsert(
                "kb",
                vec![
                    entry("far", vec![4.0, 0.0]),
                    entry("near", vec![1.0, 0.0]),
                    entry("mid", vec![2.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let matches = store.nearest("kb", &[0.0, 0.0], 5, None).await.unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
    }

    #[tokio::test]
    async fn scan_respects_filter_and_limit() {
        let store = MemoryVectorStore::new();
        let mut tagged = entry("t", vec![1.0]);
        tagged.metadata.insert("type".to_string(), json!("case"));
        store
            .upsert("kb", vec![tagged, entry("plain", vec![1.0])])
            .await
            .unwrap();

        let filter = Filter::new().eq("type", "case");
        let matches = store.scan("kb", Some(&filter), 10).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "t");

        let limited = store.scan("kb", None, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }
}

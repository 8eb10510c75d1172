//! Semantic retrieval over the knowledge store.
//!
//! Turns a text query into a ranked, thresholded list of knowledge entries
//! and renders them into a prompt-ready context block. Retrieval is a
//! best-effort enhancement: every failure here degrades to an empty result
//! set instead of propagating.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::embeddings::EmbeddingGenerator;
use crate::store::{Filter, Metadata, QueryMatch, VectorStore};

/// Rendered when no entries survive retrieval.
pub const NO_CONTEXT_SENTINEL: &str = "No relevant information found in knowledge base.";

/// A retrieved knowledge entry with its relevance scores.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    pub distance: f64,
    pub similarity_score: f64,
}

impl RetrievalResult {
    fn from_match(m: QueryMatch) -> Self {
        let similarity_score = distance_to_similarity(m.distance);
        Self {
            id: m.id,
            content: m.content,
            metadata: m.metadata,
            distance: m.distance,
            similarity_score,
        }
    }
}

/// Convert a raw vector-space distance into a bounded similarity in
/// `(0, 1]`, monotonically decreasing in distance.
pub fn distance_to_similarity(distance: f64) -> f64 {
    if distance >= 0.0 {
        1.0 / (1.0 + distance)
    } else {
        0.0
    }
}

/// Retrieves relevant entries from the vector store.
pub struct Retriever {
    store: Arc<VectorStore>,
    embeddings: Arc<EmbeddingGenerator>,
}

impl Retriever {
    pub fn new(store: Arc<VectorStore>, embeddings: Arc<EmbeddingGenerator>) -> Self {
        Self { store, embeddings }
    }

    /// Retrieve the most relevant entries for a query.
    ///
    /// Over-fetches `2 * top_k` nearest neighbors as headroom for the
    /// similarity threshold, then returns the first `top_k` survivors in
    /// descending similarity order.
    pub async fn retrieve(
        &self,
        query: &str,
        collection: &str,
        top_k: usize,
        min_similarity: f64,
    ) -> Vec<RetrievalResult> {
        let query_embedding = match self.embeddings.embed_query(query).await {
            Ok(embedding) => embedding,
            Err(err) => {
                tracing::warn!("Query embedding failed, returning no results: {}", err);
                return Vec::new();
            }
        };

        let result_sets = match self
            .store
            .query_with_embeddings(collection, &[query_embedding], top_k * 2, None)
            .await
        {
            Ok(sets) => sets,
            Err(err) => {
                tracing::warn!("Retrieval failed, returning no results: {}", err);
                return Vec::new();
            }
        };

        let mut retrieved: Vec<RetrievalResult> = result_sets
            .into_iter()
            .flatten()
            .map(RetrievalResult::from_match)
            .filter(|result| result.similarity_score >= min_similarity)
            .collect();
        retrieved.truncate(top_k);

        tracing::debug!("Retrieved {} documents for query", retrieved.len());
        retrieved
    }

    /// Retrieve entries restricted to a metadata filter.
    ///
    /// No similarity threshold applies here: filtered lookups are meant to
    /// be exhaustive within their category, even for distant entries.
    pub async fn retrieve_by_filter(
        &self,
        query: &str,
        collection: &str,
        filter: &Filter,
        top_k: usize,
    ) -> Vec<RetrievalResult> {
        let query_embedding = match self.embeddings.embed_query(query).await {
            Ok(embedding) => embedding,
            Err(err) => {
                tracing::warn!("Query embedding failed, returning no results: {}", err);
                return Vec::new();
            }
        };

        match self
            .store
            .query_with_embeddings(collection, &[query_embedding], top_k, Some(filter))
            .await
        {
            Ok(sets) => sets
                .into_iter()
                .flatten()
                .map(RetrievalResult::from_match)
                .collect(),
            Err(err) => {
                tracing::warn!("Filtered retrieval failed, returning no results: {}", err);
                Vec::new()
            }
        }
    }

    /// Retrieve entries by metadata only, with no embedding step. Semantic
    /// ranking is meaningless here, so every match scores 1.0.
    pub async fn retrieve_by_metadata(
        &self,
        filter: &Filter,
        collection: &str,
        top_k: usize,
    ) -> Vec<RetrievalResult> {
        match self.store.scan(collection, Some(filter), top_k).await {
            Ok(matches) => matches
                .into_iter()
                .map(|m| RetrievalResult {
                    id: m.id,
                    content: m.content,
                    metadata: m.metadata,
                    distance: 0.0,
                    similarity_score: 1.0,
                })
                .collect(),
            Err(err) => {
                tracing::warn!("Metadata retrieval failed, returning no results: {}", err);
                Vec::new()
            }
        }
    }

    /// Render results as a numbered context block for prompts.
    ///
    /// Entries are rendered in input order, which is already rank-sorted;
    /// this never re-sorts.
    pub fn format_context(&self, results: &[RetrievalResult]) -> String {
        format_context(results)
    }
}

pub fn format_context(results: &[RetrievalResult]) -> String {
    if results.is_empty() {
        return NO_CONTEXT_SENTINEL.to_string();
    }

    let parts: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let tags: Vec<String> = result.metadata.values().map(scalar_to_string).collect();
            format!(
                "[Reference {}] ({:.0}% relevant)\n{}\nTags: {}\n",
                i + 1,
                result.similarity_score * 100.0,
                result.content,
                tags.join(", ")
            )
        })
        .collect();

    parts.join("\n")
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::embeddings::EmbeddingGenerator;
    use crate::store::memory::MemoryVectorStore;
    use crate::testing::{FailingEmbedder, HashEmbedder, ScriptedEmbedder};

    fn make_retriever(provider: Arc<dyn crate::embeddings::EmbeddingProvider>, dim: usize) -> Retriever {
        let embeddings = Arc::new(EmbeddingGenerator::new(provider, dim));
        let store = Arc::new(VectorStore::new(
            Arc::new(MemoryVectorStore::new()),
            embeddings.clone(),
        ));
        Retriever::new(store, embeddings)
    }

    fn result(id: &str, similarity: f64) -> RetrievalResult {
        RetrievalResult {
            id: id.to_string(),
            content: format!("content of {id}"),
            metadata: Metadata::new(),
            distance: (1.0 / similarity) - 1.0,
            similarity_score: similarity,
        }
    }

    #[test]
    fn similarity_is_monotonic_and_bounded() {
        assert_eq!(distance_to_similarity(0.0), 1.0);
        assert!(distance_to_similarity(0.5) > distance_to_similarity(1.0));
        assert!(distance_to_similarity(1.0) > distance_to_similarity(10.0));

        for d in [0.0, 0.1, 1.0, 10.0, 1000.0] {
            let s = distance_to_similarity(d);
            assert!(s > 0.0 && s <= 1.0, "similarity {s} out of range for d={d}");
        }

        assert_eq!(distance_to_similarity(-1.0), 0.0);
    }

    #[tokio::test]
    async fn retrieve_applies_threshold_and_top_k() {
        let embedder = ScriptedEmbedder::new(2).with_text("query", vec![0.0, 0.0]);
        let retriever = make_retriever(Arc::new(embedder), 2);

        // Distances 0.5, 1.0, 3.0 -> similarities 0.667, 0.5, 0.25.
        retriever
            .store
            .add(
                "kb",
                vec!["a".into(), "b".into(), "c".into()],
                vec![Metadata::new(), Metadata::new(), Metadata::new()],
                Some(vec![
                    vec![0.5, 0.0],
                    vec![1.0, 0.0],
                    vec![3.0, 0.0],
                ]),
                Some(vec!["a".into(), "b".into(), "c".into()]),
            )
            .await
            .unwrap();

        let results = retriever.retrieve("query", "kb", 5, 0.3).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "b");
        assert!(results.iter().all(|r| r.similarity_score >= 0.3));

        let capped = retriever.retrieve("query", "kb", 1, 0.3).await;
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].id, "a");
    }

    #[tokio::test]
    async fn retrieve_matches_seeded_entry() {
        let retriever = make_retriever(Arc::new(HashEmbedder::new(64)), 64);

        let mut metadata = Metadata::new();
        metadata.insert("type".to_string(), json!("disease"));
        retriever
            .store
            .add(
                "kb",
                vec!["Powdery mildew shows as a white powdery coating on rose leaves".into()],
                vec![metadata],
                None,
                Some(vec!["disease_powdery_mildew".into()]),
            )
            .await
            .unwrap();

        let results = retriever
            .retrieve("white powder on rose leaves", "kb", 1, 0.3)
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "disease_powdery_mildew");
        assert!(results[0].similarity_score > 0.3);
    }

    #[tokio::test]
    async fn retrieve_from_empty_collection_returns_empty() {
        let embedder = ScriptedEmbedder::new(2).with_text("anything", vec![1.0, 0.0]);
        let retriever = make_retriever(Arc::new(embedder), 2);

        let results = retriever.retrieve("anything", "empty", 5, 0.3).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn retrieve_swallows_embedding_failure() {
        let retriever = make_retriever(Arc::new(FailingEmbedder), 4);
        let results = retriever.retrieve("query", "kb", 5, 0.3).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn retrieve_by_filter_skips_similarity_threshold() {
        let embedder = ScriptedEmbedder::new(2).with_text("query", vec![0.0, 0.0]);
        let retriever = make_retriever(Arc::new(embedder), 2);

        let mut metadata = Metadata::new();
        metadata.insert("type".to_string(), json!("treatment"));
        // Distance 9.0 -> similarity 0.1, far below the semantic threshold.
        retriever
            .store
            .add(
                "kb",
                vec!["distant treatment".into()],
                vec![metadata],
                Some(vec![vec![9.0, 0.0]]),
                Some(vec!["t1".into()]),
            )
            .await
            .unwrap();

        let filter = Filter::new().eq("type", "treatment");
        let results = retriever.retrieve_by_filter("query", "kb", &filter, 5).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].similarity_score < 0.3);
    }

    #[tokio::test]
    async fn retrieve_by_metadata_scores_every_match_fully() {
        // No embedding step: even a failing embedder cannot break this path.
        let retriever = make_retriever(Arc::new(FailingEmbedder), 4);

        let mut metadata = Metadata::new();
        metadata.insert("type".to_string(), json!("care"));
        metadata.insert("plant".to_string(), json!("rose"));
        retriever
            .store
            .add(
                "kb",
                vec!["rose care guide".into()],
                vec![metadata],
                Some(vec![vec![1.0, 0.0, 0.0, 0.0]]),
                Some(vec!["care_rose".into()]),
            )
            .await
            .unwrap();

        let filter = Filter::new().eq("type", "care").eq("plant", "rose");
        let results = retriever.retrieve_by_metadata(&filter, "kb", 10).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].similarity_score, 1.0);
        assert_eq!(results[0].distance, 0.0);
    }

    #[test]
    fn format_context_empty_returns_sentinel() {
        assert_eq!(format_context(&[]), NO_CONTEXT_SENTINEL);
    }

    #[test]
    fn format_context_preserves_order_and_numbers_from_one() {
        // Deliberately not sorted by similarity: formatting must not re-sort.
        let results = vec![result("low", 0.4), result("high", 0.9)];
        let context = format_context(&results);

        let low_pos = context.find("content of low").unwrap();
        let high_pos = context.find("content of high").unwrap();
        assert!(low_pos < high_pos);
        assert!(context.starts_with("[Reference 1] (40% relevant)"));
        assert!(context.contains("[Reference 2] (90% relevant)"));
    }

    #[test]
    fn format_context_renders_metadata_tags() {
        let mut r = result("d", 0.5);
        r.metadata.insert("plant".to_string(), json!("rose"));
        r.metadata.insert("organic".to_string(), json!(true));

        let context = format_context(&[r]);
        assert!(context.contains("Tags: "));
        assert!(context.contains("rose"));
        assert!(context.contains("true"));
    }
}

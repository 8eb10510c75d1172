//! SQLite-backed vector store.
//!
//! Collection metadata and entries live in SQLite; embeddings are stored
//! as little-endian f32 blobs and scored with brute-force Euclidean
//! distance in process. No external server required.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::{euclidean_distance, Filter, Metadata, QueryMatch, StoredEntry, VectorStoreBackend};
use crate::core::errors::RagError;

pub struct SqliteVectorStore {
    pool: SqlitePool,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl SqliteVectorStore {
    pub async fn open(db_path: PathBuf) -> Result<Self, RagError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(RagError::store)?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), RagError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS entries (
                collection TEXT NOT NULL,
                entry_id TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                PRIMARY KEY (collection, entry_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_collection ON entries(collection)")
            .execute(&self.pool)
            .await
            .map_err(RagError::store)?;

        Ok(())
    }

    /// Serialize embedding to bytes (little-endian f32).
    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn parse_metadata(raw: &str) -> Metadata {
        serde_json::from_str(raw).unwrap_or_default()
    }

    async fn fetch_candidates(
        &self,
        collection: &str,
        filter: Option<&Filter>,
    ) -> Result<Vec<(String, String, Metadata, Vec<f32>)>, RagError> {
        let rows = sqlx::query(
            "SELECT entry_id, content, metadata, embedding FROM entries WHERE collection = ?1",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::store)?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            let metadata_str: String = row.get("metadata");
            let metadata = Self::parse_metadata(&metadata_str);

            if let Some(filter) = filter {
                if !filter.matches(&metadata) {
                    continue;
                }
            }

            let embedding_bytes: Vec<u8> = row.get("embedding");
            candidates.push((
                row.get("entry_id"),
                row.get("content"),
                metadata,
                Self::deserialize_embedding(&embedding_bytes),
            ));
        }

        Ok(candidates)
    }
}

#[async_trait]
impl VectorStoreBackend for SqliteVectorStore {
    async fn ensure_collection(&self, name: &str, metadata: &Metadata) -> Result<(), RagError> {
        let metadata_str =
            serde_json::to_string(metadata).map_err(RagError::store)?;

        sqlx::query("INSERT OR IGNORE INTO collections (name, metadata) VALUES (?1, ?2)")
            .bind(name)
            .bind(&metadata_str)
            .execute(&self.pool)
            .await
            .map_err(RagError::store)?;

        Ok(())
    }

    async fn upsert(&self, collection: &str, entries: Vec<StoredEntry>) -> Result<(), RagError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(RagError::store)?;

        for entry in &entries {
            let blob = Self::serialize_embedding(&entry.embedding);
            let metadata_str =
                serde_json::to_string(&entry.metadata).map_err(RagError::store)?;

            sqlx::query(
                "INSERT OR REPLACE INTO entries (collection, entry_id, content, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(collection)
            .bind(&entry.id)
            .bind(&entry.content)
            .bind(&metadata_str)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(RagError::store)?;
        }

        tx.commit().await.map_err(RagError::store)?;
        tracing::debug!("Upserted {} entries into '{}'", entries.len(), collection);
        Ok(())
    }

    async fn nearest(
        &self,
        collection: &str,
        query: &[f32],
        n_results: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<QueryMatch>, RagError> {
        let candidates = self.fetch_candidates(collection, filter).await?;

        let mut scored: Vec<QueryMatch> = candidates
            .into_iter()
            .filter_map(|(id, content, metadata, embedding)| {
                euclidean_distance(query, &embedding).map(|distance| QueryMatch {
                    id,
                    content,
                    metadata,
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
        let candidates = self.fetch_candidates(collection, filter).await?;

        Ok(candidates
            .into_iter()
            .take(limit)
            .map(|(id, content, metadata, _)| QueryMatch {
                id,
                content,
                metadata,
                distance: 0.0,
            })
            .collect())
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, RagError> {
        sqlx::query("DELETE FROM entries WHERE collection = ?1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(RagError::store)?;

        let result = sqlx::query("DELETE FROM collections WHERE name = ?1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(RagError::store)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, collection: &str) -> Result<usize, RagError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::store)?;

        Ok(count as usize)
    }

    async fn collection_metadata(&self, name: &str) -> Result<Metadata, RagError> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT metadata FROM collections WHERE name = ?1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(RagError::store)?;

        Ok(raw.as_deref().map(Self::parse_metadata).unwrap_or_default())
    }
}

//! Memory persistence interface and the in-process implementation.
//!
//! The concrete backing engine is out of scope; the engine consumes the
//! [`MemoryStore`] trait only.  [`InMemoryMemoryStore`] shards records per user
//! so reads never block on writes of an unrelated user, and serves as the test
//! and single-node backend.

use crate::backlot::memory::types::{MemoryQuery, MemoryRecord, MemorySearchResult};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Errors surfaced by memory persistence.
#[derive(Debug, Clone)]
pub enum MemoryStoreError {
    /// The backing store rejected or failed the operation.
    StorageFailed(String),
    /// The referenced memory does not exist.
    NotFound(String),
}

impl fmt::Display for MemoryStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryStoreError::StorageFailed(msg) => write!(f, "Memory storage failed: {}", msg),
            MemoryStoreError::NotFound(id) => write!(f, "Memory not found: {}", id),
        }
    }
}

impl Error for MemoryStoreError {}

/// Abstract store for durable user memories.
///
/// Writes are keyed by `(user_id, memory id)`; similarity search is scoped to
/// one user.  Reads and writes may interleave with eventual consistency.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Insert or replace a memory record.
    async fn put(&self, memory: MemoryRecord) -> Result<(), MemoryStoreError>;

    /// Vector-similarity search over one user's unconsolidated memories.
    ///
    /// `query_embedding` is the embedded query text; filters come from the
    /// query.  Results are sorted by similarity descending and truncated to the
    /// query limit.
    async fn search_by_similarity(
        &self,
        query: &MemoryQuery,
        query_embedding: &[f32],
    ) -> Result<Vec<MemorySearchResult>, MemoryStoreError>;

    /// Bump `access_count` and `last_accessed` on the given memories.
    async fn touch_access(&self, user_id: &str, ids: &[String]) -> Result<(), MemoryStoreError>;

    /// Delete one memory.
    async fn delete(&self, user_id: &str, id: &str) -> Result<(), MemoryStoreError>;

    /// All memories of one user, consolidated included, in creation order.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<MemoryRecord>, MemoryStoreError>;
}

/// Cosine similarity between two vectors; zero when either is empty or all-zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

type UserShard = Arc<RwLock<HashMap<String, MemoryRecord>>>;

/// In-process [`MemoryStore`] sharded by user id.
///
/// The outer map only grows; each user's records live behind their own lock so
/// cross-user operations never contend.
pub struct InMemoryMemoryStore {
    shards: RwLock<HashMap<String, UserShard>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        InMemoryMemoryStore {
            shards: RwLock::new(HashMap::new()),
        }
    }

    async fn shard(&self, user_id: &str) -> UserShard {
        if let Some(shard) = self.shards.read().await.get(user_id) {
            return Arc::clone(shard);
        }
        let mut shards = self.shards.write().await;
        Arc::clone(
            shards
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(HashMap::new()))),
        )
    }
}

impl Default for InMemoryMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn put(&self, memory: MemoryRecord) -> Result<(), MemoryStoreError> {
        let shard = self.shard(&memory.user_id).await;
        shard.write().await.insert(memory.id.clone(), memory);
        Ok(())
    }

    async fn search_by_similarity(
        &self,
        query: &MemoryQuery,
        query_embedding: &[f32],
    ) -> Result<Vec<MemorySearchResult>, MemoryStoreError> {
        let shard = self.shard(&query.user_id).await;
        let records = shard.read().await;
        let now = Utc::now();

        let mut hits: Vec<MemorySearchResult> = records
            .values()
            .filter(|m| !m.consolidated)
            .filter(|m| match &query.kinds {
                Some(kinds) => kinds.contains(&m.kind()),
                None => true,
            })
            .filter(|m| match query.min_importance {
                Some(min) => m.importance >= min,
                None => true,
            })
            .filter(|m| match query.max_age_days {
                Some(days) => now - m.created_at <= ChronoDuration::days(days),
                None => true,
            })
            .filter(|m| match query.max_sensitivity {
                Some(ceiling) => m.sensitivity <= ceiling,
                None => true,
            })
            .filter_map(|m| {
                let similarity = cosine_similarity(&m.embedding, query_embedding);
                if similarity >= query.similarity_threshold {
                    Some(MemorySearchResult {
                        memory: m.clone(),
                        similarity,
                    })
                } else {
                    None
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(query.limit);
        Ok(hits)
    }

    async fn touch_access(&self, user_id: &str, ids: &[String]) -> Result<(), MemoryStoreError> {
        let shard = self.shard(user_id).await;
        let mut records = shard.write().await;
        let now = Utc::now();
        for id in ids {
            if let Some(memory) = records.get_mut(id) {
                memory.access_count += 1;
                memory.last_accessed = now;
            }
        }
        Ok(())
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<(), MemoryStoreError> {
        let shard = self.shard(user_id).await;
        let result = shard
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| MemoryStoreError::NotFound(id.to_string()));
        result
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<MemoryRecord>, MemoryStoreError> {
        let shard = self.shard(user_id).await;
        let records = shard.read().await;
        let mut all: Vec<MemoryRecord> = records.values().cloned().collect();
        all.sort_by_key(|m| m.created_at);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backlot::memory::types::{MemoryImportance, MemoryVariant};

    fn semantic(id: &str, user: &str, embedding: Vec<f32>) -> MemoryRecord {
        MemoryRecord::new(
            id,
            user,
            format!("fact {}", id),
            MemoryVariant::Semantic {
                fact_type: "preference".into(),
                confidence: 0.9,
            },
            MemoryImportance::Medium,
            embedding,
        )
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5, 0.5, 0.1];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn search_filters_and_sorts_by_similarity() {
        let store = InMemoryMemoryStore::new();
        store.put(semantic("a", "u1", vec![1.0, 0.0])).await.unwrap();
        store.put(semantic("b", "u1", vec![0.9, 0.1])).await.unwrap();
        store.put(semantic("c", "u1", vec![0.0, 1.0])).await.unwrap();
        store.put(semantic("d", "u2", vec![1.0, 0.0])).await.unwrap();

        let query = MemoryQuery::new("u1", "q").with_similarity_threshold(0.5);
        let hits = store
            .search_by_similarity(&query, &[1.0, 0.0])
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].memory.id, "a");
        assert!(hits[0].similarity >= hits[1].similarity);
    }

    #[tokio::test]
    async fn consolidated_memories_are_invisible_to_search() {
        let store = InMemoryMemoryStore::new();
        let mut memory = semantic("a", "u1", vec![1.0, 0.0]);
        memory.consolidated = true;
        store.put(memory).await.unwrap();

        let hits = store
            .search_by_similarity(&MemoryQuery::new("u1", "q"), &[1.0, 0.0])
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn touch_access_bumps_bookkeeping() {
        let store = InMemoryMemoryStore::new();
        store.put(semantic("a", "u1", vec![1.0])).await.unwrap();
        store
            .touch_access("u1", &["a".to_string()])
            .await
            .unwrap();
        let all = store.list_for_user("u1").await.unwrap();
        assert_eq!(all[0].access_count, 1);
    }
}

//! External connector traits: knowledge graph, live CRM, and the tool cache.
//!
//! The storage engines behind these traits are out of scope; the crate consumes
//! only the interfaces.  [`MemoryKvStore`] provides an in-process cache
//! implementation suitable for tests and single-node deployments.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::time::Duration;
use tokio::sync::RwLock;

/// Errors surfaced by the graph connector.
#[derive(Debug, Clone)]
pub enum GraphError {
    /// The graph endpoint could not be reached.
    Unreachable(String),
    /// The query was rejected or failed server-side.
    QueryFailed(String),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::Unreachable(msg) => write!(f, "Graph unreachable: {}", msg),
            GraphError::QueryFailed(msg) => write!(f, "Graph query failed: {}", msg),
        }
    }
}

impl Error for GraphError {}

/// Query interface onto the knowledge graph.
///
/// Queries are expressed in the graph's own query language with a JSON
/// parameter map; rows come back as JSON objects.  The concrete engine (and its
/// connection management) lives behind this trait.
#[async_trait]
pub trait GraphClient: Send + Sync {
    /// Run `query` with `params`, returning the matched rows.
    async fn run(&self, query: &str, params: Value) -> Result<Vec<Value>, GraphError>;

    /// Cheap connectivity probe for the status surface.
    async fn ping(&self) -> Result<(), GraphError> {
        self.run("RETURN 1 AS test", Value::Null).await.map(|_| ())
    }
}

/// Best-effort live CRM enrichment interface.
///
/// Only a small subset of tools consult this; failures degrade the result to
/// graph-only data rather than failing the tool.
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Fetch the live status of a deal by its CRM identifier.
    async fn get_deal_status(
        &self,
        crm_id: &str,
    ) -> Result<Value, Box<dyn Error + Send + Sync>>;
}

/// Key-value cache with per-entry TTLs, used read-through by the graph tools.
///
/// Cache errors must never fail a tool; callers log and proceed.
#[async_trait]
pub trait KvCache: Send + Sync {
    /// Fetch a value if present and unexpired.
    async fn get(&self, key: &str) -> Result<Option<Value>, Box<dyn Error + Send + Sync>>;

    /// Store a value with the given TTL.
    async fn set_with_ttl(
        &self,
        key: &str,
        value: Value,
        ttl: Duration,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

struct CacheEntry {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// In-process [`KvCache`] backed by a `HashMap` with lazy expiry.
///
/// Readers and writers on different keys never wait on each other beyond the
/// map lock; same-key concurrent misses may both fall through to the graph,
/// which the cache contract tolerates.
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        MemoryKvStore {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    /// Drop expired entries eagerly.
    pub async fn sweep(&self) {
        let now = Utc::now();
        self.entries.write().await.retain(|_, e| e.expires_at > now);
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvCache for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, Box<dyn Error + Send + Sync>> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Utc::now() => Ok(Some(entry.value.clone())),
            _ => Ok(None),
        }
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: Value,
        ttl: Duration,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(300));
        self.entries.write().await.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Utc::now() + ttl,
            },
        );
        Ok(())
    }
}

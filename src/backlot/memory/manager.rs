//! Memory extraction, retrieval, and consolidation.
//!
//! The [`MemoryManager`] sits between the conversation graph and the memory
//! store.  After every turn it extracts semantic facts from the transcript,
//! summarizes the conversation into an episodic record, and detects procedural
//! patterns.  On the read side it embeds the current query, retrieves the
//! top-k similar memories, and partitions them into a [`MemoryContext`] for
//! prompt enrichment.
//!
//! Consolidation is idempotent: re-running it on an already-consolidated set
//! produces no further soft deletes.

use crate::backlot::client_wrapper::{Message, Role};
use crate::backlot::identity::{CallerIdentity, DataSensitivity};
use crate::backlot::memory::store::{cosine_similarity, MemoryStore, MemoryStoreError};
use crate::backlot::memory::types::{
    MemoryImportance, MemoryKind, MemoryQuery, MemoryRecord, MemorySearchResult, MemoryVariant,
};
use crate::backlot::router::LLMRouter;
use async_trait::async_trait;
use log::{error, info, warn};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// A fact produced by the extraction step.
#[derive(Debug, Clone)]
pub struct ExtractedFact {
    pub content: String,
    pub fact_type: String,
    pub confidence: f32,
}

/// Black-box fact extractor over a formatted transcript.
///
/// Production deployments typically delegate to an extraction LLM; the default
/// [`KeywordFactExtractor`] applies a rule set so the pipeline works without
/// one.
#[async_trait]
pub trait FactExtractor: Send + Sync {
    async fn extract(&self, transcript: &str) -> Vec<ExtractedFact>;
}

const PREFERENCE_MARKERS: [&str; 6] = ["prefer", "always", "never", "important", "critical", "must"];
const DESIRE_MARKERS: [&str; 4] = ["like", "dislike", "want", "need"];

/// Rule-based extractor: keeps user sentences that express preferences or
/// desires.
pub struct KeywordFactExtractor;

#[async_trait]
impl FactExtractor for KeywordFactExtractor {
    async fn extract(&self, transcript: &str) -> Vec<ExtractedFact> {
        let mut facts = Vec::new();
        for line in transcript.lines() {
            let content = match line.strip_prefix("Human: ") {
                Some(rest) => rest.trim(),
                None => continue,
            };
            if content.is_empty() {
                continue;
            }
            let lower = content.to_lowercase();
            if PREFERENCE_MARKERS.iter().any(|m| lower.contains(m)) {
                facts.push(ExtractedFact {
                    content: content.to_string(),
                    fact_type: "preference".to_string(),
                    confidence: 0.9,
                });
            } else if DESIRE_MARKERS.iter().any(|m| lower.contains(m)) {
                facts.push(ExtractedFact {
                    content: content.to_string(),
                    fact_type: "interest".to_string(),
                    confidence: 0.8,
                });
            }
        }
        facts
    }
}

/// Structured memory context handed to agents for prompt enrichment.
#[derive(Debug, Clone, Default)]
pub struct MemoryContext {
    /// `{fact, confidence, importance, relevance}` entries.
    pub semantic_facts: Vec<Value>,
    /// `{summary, agent_kinds, relevance}` entries.
    pub past_interactions: Vec<Value>,
    /// `{pattern, trigger, action, success_rate, relevance}` entries.
    pub behavioral_patterns: Vec<Value>,
    /// Total memories considered.
    pub total_memories: usize,
}

/// Advanced memory management over the abstract store.
pub struct MemoryManager {
    store: Arc<dyn MemoryStore>,
    router: Arc<LLMRouter>,
    extractor: Box<dyn FactExtractor>,
    max_context_memories: usize,
    similarity_threshold: f32,
    consolidation_similarity: f32,
}

impl MemoryManager {
    pub fn new(store: Arc<dyn MemoryStore>, router: Arc<LLMRouter>) -> Self {
        MemoryManager {
            store,
            router,
            extractor: Box::new(KeywordFactExtractor),
            max_context_memories: 10,
            similarity_threshold: 0.7,
            consolidation_similarity: 0.85,
        }
    }

    /// Swap in a different fact extractor (builder pattern).
    pub fn with_extractor(mut self, extractor: Box<dyn FactExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Override the retrieval similarity threshold (builder pattern).
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Embed text, degrading to an empty vector when no embedding provider is
    /// available.  Memories with empty embeddings are stored but never matched.
    async fn embed_or_empty(&self, text: &str) -> Vec<f32> {
        match self.router.embed(text).await {
            Ok(embedding) => embedding,
            Err(err) => {
                warn!("embedding failed, storing memory without vector: {}", err);
                Vec::new()
            }
        }
    }

    /// Extract and persist memories from a finished turn.
    ///
    /// Returns the ids of the stored memories.  Best-effort: individual
    /// failures are logged and skipped, never propagated to the turn.
    pub async fn extract_conversation_memories(
        &self,
        conversation_id: &str,
        user_id: &str,
        messages: &[Message],
        agent_kinds: &[String],
    ) -> Vec<String> {
        let mut stored_ids = Vec::new();
        let transcript = format_transcript(messages);

        // Semantic facts.
        for fact in self.extractor.extract(&transcript).await {
            let importance = determine_importance(&fact);
            let embedding = self.embed_or_empty(&fact.content).await;
            let id = Uuid::new_v4().to_string();
            let record = MemoryRecord::new(
                id.clone(),
                user_id,
                fact.content.clone(),
                MemoryVariant::Semantic {
                    fact_type: fact.fact_type,
                    confidence: fact.confidence,
                },
                importance,
                embedding,
            );
            match self.store.put(record).await {
                Ok(()) => stored_ids.push(id),
                Err(err) => error!("semantic memory store failed: {}", err),
            }
        }

        // One episodic record summarizing the whole conversation.
        if let Some(id) = self
            .store_episodic(conversation_id, user_id, messages, agent_kinds)
            .await
        {
            stored_ids.push(id);
        }

        // Procedural pattern when the turn shows repeated same-kind requests.
        if let Some(pattern) = detect_procedural_pattern(messages, agent_kinds) {
            let embedding = self.embed_or_empty(&pattern.0).await;
            let id = Uuid::new_v4().to_string();
            let record = MemoryRecord::new(
                id.clone(),
                user_id,
                pattern.0,
                MemoryVariant::Procedural {
                    trigger: pattern.1,
                    action: pattern.2,
                    success_rate: 0.0,
                    usage_count: 0,
                },
                MemoryImportance::High,
                embedding,
            );
            match self.store.put(record).await {
                Ok(()) => stored_ids.push(id),
                Err(err) => error!("procedural memory store failed: {}", err),
            }
        }

        info!(
            "extracted {} memories from conversation {}",
            stored_ids.len(),
            conversation_id
        );
        stored_ids
    }

    /// Store just the episodic summary of a turn.
    ///
    /// Used directly when backpressure drops the full extraction task, and by
    /// [`MemoryManager::extract_conversation_memories`] on the normal path.
    pub async fn store_episodic(
        &self,
        conversation_id: &str,
        user_id: &str,
        messages: &[Message],
        agent_kinds: &[String],
    ) -> Option<String> {
        let summary = summarize_conversation(messages);
        let embedding = self.embed_or_empty(&summary).await;
        let id = Uuid::new_v4().to_string();
        let record = MemoryRecord::new(
            id.clone(),
            user_id,
            summary,
            MemoryVariant::Episodic {
                conversation_id: conversation_id.to_string(),
                agent_kinds: agent_kinds.to_vec(),
                topics: extract_topics(messages),
            },
            MemoryImportance::Medium,
            embedding,
        );
        match self.store.put(record).await {
            Ok(()) => Some(id),
            Err(err) => {
                error!("episodic memory store failed: {}", err);
                None
            }
        }
    }

    /// Store a failure note for a turn that could not produce a response.
    ///
    /// The note is an episodic record tagged with the `llm_failure` topic so
    /// later retrievals and the status surface can see that the turn was
    /// attempted and why it died.  Best-effort like every memory write.
    pub async fn store_failure_note(
        &self,
        conversation_id: &str,
        user_id: &str,
        note: &str,
    ) -> Option<String> {
        let embedding = self.embed_or_empty(note).await;
        let id = Uuid::new_v4().to_string();
        let record = MemoryRecord::new(
            id.clone(),
            user_id,
            note,
            MemoryVariant::Episodic {
                conversation_id: conversation_id.to_string(),
                agent_kinds: Vec::new(),
                topics: vec!["llm_failure".to_string()],
            },
            MemoryImportance::Low,
            embedding,
        );
        match self.store.put(record).await {
            Ok(()) => Some(id),
            Err(err) => {
                error!("failure-note store failed: {}", err);
                None
            }
        }
    }

    /// Retrieve memories relevant to `query_text`, bumping access bookkeeping
    /// on the hits.
    pub async fn get_relevant_memories(
        &self,
        user_id: &str,
        query_text: &str,
        kinds: Option<Vec<MemoryKind>>,
        limit: usize,
    ) -> Result<Vec<MemorySearchResult>, MemoryStoreError> {
        self.retrieve(user_id, query_text, kinds, limit, None).await
    }

    async fn retrieve(
        &self,
        user_id: &str,
        query_text: &str,
        kinds: Option<Vec<MemoryKind>>,
        limit: usize,
        ceiling: Option<DataSensitivity>,
    ) -> Result<Vec<MemorySearchResult>, MemoryStoreError> {
        let embedding = self.embed_or_empty(query_text).await;
        let mut query = MemoryQuery::new(user_id, query_text)
            .with_limit(limit)
            .with_similarity_threshold(self.similarity_threshold);
        if let Some(kinds) = kinds {
            query = query.with_kinds(kinds);
        }
        if let Some(ceiling) = ceiling {
            query = query.with_max_sensitivity(ceiling);
        }

        let hits = self.store.search_by_similarity(&query, &embedding).await?;

        let ids: Vec<String> = hits.iter().map(|h| h.memory.id.clone()).collect();
        if !ids.is_empty() {
            if let Err(err) = self.store.touch_access(user_id, &ids).await {
                warn!("access bookkeeping failed: {}", err);
            }
        }
        Ok(hits)
    }

    /// Build the structured memory context consumed by supervisor and agents.
    pub async fn build_memory_context(&self, user_id: &str, current_query: &str) -> MemoryContext {
        self.context_with_ceiling(user_id, current_query, None).await
    }

    /// Ceiling-aware variant: memories tagged above the caller's maximum
    /// sensitivity never reach the prompt.
    pub async fn build_memory_context_for_caller(
        &self,
        caller: &CallerIdentity,
        current_query: &str,
    ) -> MemoryContext {
        self.context_with_ceiling(&caller.user_id, current_query, Some(caller.max_sensitivity))
            .await
    }

    async fn context_with_ceiling(
        &self,
        user_id: &str,
        current_query: &str,
        ceiling: Option<DataSensitivity>,
    ) -> MemoryContext {
        let hits = match self
            .retrieve(user_id, current_query, None, self.max_context_memories, ceiling)
            .await
        {
            Ok(hits) => hits,
            Err(err) => {
                error!("failed to build memory context: {}", err);
                return MemoryContext::default();
            }
        };

        let mut context = MemoryContext {
            total_memories: hits.len(),
            ..MemoryContext::default()
        };

        for hit in hits {
            match &hit.memory.variant {
                MemoryVariant::Semantic {
                    fact_type,
                    confidence,
                } => context.semantic_facts.push(json!({
                    "fact": hit.memory.content,
                    "fact_type": fact_type,
                    "confidence": confidence,
                    "importance": hit.memory.importance,
                    "relevance": hit.similarity,
                })),
                MemoryVariant::Episodic { agent_kinds, .. } => {
                    context.past_interactions.push(json!({
                        "summary": hit.memory.content,
                        "agent_kinds": agent_kinds,
                        "relevance": hit.similarity,
                    }))
                }
                MemoryVariant::Procedural {
                    trigger,
                    action,
                    success_rate,
                    ..
                } => context.behavioral_patterns.push(json!({
                    "pattern": hit.memory.content,
                    "trigger": trigger,
                    "action": action,
                    "success_rate": success_rate,
                    "relevance": hit.similarity,
                })),
            }
        }

        context
    }

    /// Consolidate near-duplicate memories of one user.
    ///
    /// Same-variant memories with pairwise embedding cosine >= 0.85 form a
    /// group; the member with the highest `(importance, created_at,
    /// access_count)` tuple survives and the rest are soft-deleted.  Returns
    /// the number of memories marked consolidated.
    pub async fn consolidate(&self, user_id: &str) -> Result<usize, MemoryStoreError> {
        let all = self.store.list_for_user(user_id).await?;
        let live: Vec<&MemoryRecord> = all.iter().filter(|m| !m.consolidated).collect();

        let mut grouped: Vec<bool> = vec![false; live.len()];
        let mut consolidated_count = 0;

        for i in 0..live.len() {
            if grouped[i] {
                continue;
            }
            let mut group = vec![i];
            grouped[i] = true;

            for j in (i + 1)..live.len() {
                if grouped[j] {
                    continue;
                }
                if live[i].kind() == live[j].kind()
                    && cosine_similarity(&live[i].embedding, &live[j].embedding)
                        >= self.consolidation_similarity
                {
                    group.push(j);
                    grouped[j] = true;
                }
            }

            if group.len() < 2 {
                continue;
            }

            // Keep the best member; soft delete the rest.
            let best = match group.iter().max_by_key(|&&idx| {
                let m = live[idx];
                (m.importance, m.created_at, m.access_count)
            }) {
                Some(best) => *best,
                None => continue,
            };

            for &idx in &group {
                if idx == best {
                    continue;
                }
                let mut loser = live[idx].clone();
                loser.consolidated = true;
                self.store.put(loser).await?;
                consolidated_count += 1;
            }
        }

        if consolidated_count > 0 {
            info!(
                "consolidated {} memories for user {}",
                consolidated_count, user_id
            );
        }
        Ok(consolidated_count)
    }

    /// Counts by kind and importance, for the status surface.
    pub async fn stats(&self, user_id: &str) -> Result<Value, MemoryStoreError> {
        let all = self.store.list_for_user(user_id).await?;
        let mut by_kind: HashMap<&'static str, usize> = HashMap::new();
        let mut by_importance: HashMap<&'static str, usize> = HashMap::new();
        let mut consolidated = 0usize;

        for memory in &all {
            let kind = match memory.kind() {
                MemoryKind::Semantic => "semantic",
                MemoryKind::Episodic => "episodic",
                MemoryKind::Procedural => "procedural",
            };
            *by_kind.entry(kind).or_insert(0) += 1;
            let importance = match memory.importance {
                MemoryImportance::Low => "low",
                MemoryImportance::Medium => "medium",
                MemoryImportance::High => "high",
                MemoryImportance::Critical => "critical",
            };
            *by_importance.entry(importance).or_insert(0) += 1;
            if memory.consolidated {
                consolidated += 1;
            }
        }

        Ok(json!({
            "user_id": user_id,
            "total_memories": all.len(),
            "consolidated": consolidated,
            "by_kind": by_kind,
            "by_importance": by_importance,
        }))
    }
}

/// Format the turn's messages as a plain transcript for extraction.
pub fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|msg| match &msg.role {
            Role::User => format!("Human: {}", msg.content),
            Role::Assistant => format!("Assistant: {}", msg.content),
            Role::System => format!("System: {}", msg.content),
            Role::Tool { .. } => format!("Tool: {}", msg.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Importance heuristic over an extracted fact.
fn determine_importance(fact: &ExtractedFact) -> MemoryImportance {
    let content = fact.content.to_lowercase();
    if PREFERENCE_MARKERS.iter().any(|m| content.contains(m)) {
        MemoryImportance::Critical
    } else if fact.confidence > 0.9 || DESIRE_MARKERS.iter().any(|m| content.contains(m)) {
        MemoryImportance::High
    } else {
        MemoryImportance::Medium
    }
}

/// Length-based conversation summary.
fn summarize_conversation(messages: &[Message]) -> String {
    if messages.len() <= 2 {
        return format!("Brief interaction with {} messages", messages.len());
    }
    let user_count = messages.iter().filter(|m| m.role == Role::User).count();
    let ai_count = messages
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .count();
    format!(
        "Conversation with {} user messages and {} AI responses",
        user_count, ai_count
    )
}

/// Keyword-table topic extraction.
fn extract_topics(messages: &[Message]) -> Vec<String> {
    let content = messages
        .iter()
        .map(|m| m.content.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let topic_keywords: [(&str, &[&str]); 4] = [
        ("entertainment", &["movie", "film", "show", "commercial", "director"]),
        ("business", &["revenue", "client", "deal", "contract", "organization"]),
        ("talent", &["hire", "skill", "team", "crew", "casting"]),
        ("analytics", &["data", "report", "metrics", "analysis", "performance"]),
    ];

    let topics: Vec<String> = topic_keywords
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| content.contains(k)))
        .map(|(topic, _)| topic.to_string())
        .collect();

    if topics.is_empty() {
        vec!["general".to_string()]
    } else {
        topics
    }
}

/// Detect a repeated-request pattern: more than one user message in the turn
/// yields a procedural `(description, trigger, action)`.
fn detect_procedural_pattern(
    messages: &[Message],
    agent_kinds: &[String],
) -> Option<(String, String, String)> {
    let user_count = messages.iter().filter(|m| m.role == Role::User).count();
    if user_count < 2 {
        return None;
    }
    let kind = agent_kinds.first().map(String::as_str).unwrap_or("general");
    Some((
        format!("User repeatedly asks the {} agent for specific information", kind),
        format!("User interaction with {} agent", kind),
        "Provide detailed, specific information".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_facts_are_critical() {
        let fact = ExtractedFact {
            content: "I always prefer morning shoots".into(),
            fact_type: "preference".into(),
            confidence: 0.8,
        };
        assert_eq!(determine_importance(&fact), MemoryImportance::Critical);
    }

    #[test]
    fn high_confidence_facts_are_high_importance() {
        let fact = ExtractedFact {
            content: "Works at Stellar Films".into(),
            fact_type: "employment".into(),
            confidence: 0.95,
        };
        assert_eq!(determine_importance(&fact), MemoryImportance::High);
    }

    #[test]
    fn plain_facts_are_medium() {
        let fact = ExtractedFact {
            content: "Asked about Disney".into(),
            fact_type: "general".into(),
            confidence: 0.8,
        };
        assert_eq!(determine_importance(&fact), MemoryImportance::Medium);
    }

    #[test]
    fn topics_fall_back_to_general() {
        let messages = vec![Message::user("hello there")];
        assert_eq!(extract_topics(&messages), vec!["general".to_string()]);
    }

    #[test]
    fn topics_match_keyword_table() {
        let messages = vec![Message::user("Find crew for the Nike commercial")];
        let topics = extract_topics(&messages);
        assert!(topics.contains(&"entertainment".to_string()));
        assert!(topics.contains(&"talent".to_string()));
    }

    #[test]
    fn transcript_labels_roles() {
        let messages = vec![Message::user("hi"), Message::assistant("hello")];
        let transcript = format_transcript(&messages);
        assert_eq!(transcript, "Human: hi\nAssistant: hello");
    }
}

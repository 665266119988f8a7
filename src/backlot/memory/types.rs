//! Memory type definitions.
//!
//! Durable user memories come in three variants: **semantic** facts, **episodic**
//! interaction summaries, and **procedural** behavioral patterns.  All variants
//! share an owner, an importance level, a vector embedding, and access
//! bookkeeping used by retrieval and consolidation.

use crate::backlot::identity::{DataSensitivity, Sensitive};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Memory variants, used for filtering and context partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// Facts, preferences, knowledge.
    Semantic,
    /// Specific interactions and events.
    Episodic,
    /// Behavioral patterns and optimizations.
    Procedural,
}

/// Memory importance levels for retention decisions, ordered ascending.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MemoryImportance {
    /// Casual mentions, temporary context.
    Low,
    /// Regular interactions, context.
    Medium,
    /// Important facts, significant events.
    High,
    /// Core user preferences, key insights.
    Critical,
}

/// Variant-specific payload of a memory record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MemoryVariant {
    Semantic {
        /// Type of fact (preference, skill, etc.).
        fact_type: String,
        /// Confidence in fact accuracy, `0.0..=1.0`.
        confidence: f32,
    },
    Episodic {
        /// Conversation the interaction came from.
        conversation_id: String,
        /// Agent kinds that participated.
        agent_kinds: Vec<String>,
        /// Main conversation topics.
        topics: Vec<String>,
    },
    Procedural {
        /// Condition that triggers this pattern.
        trigger: String,
        /// Action or response pattern.
        action: String,
        /// Pattern success rate, `0.0..=1.0`.
        success_rate: f32,
        /// Number of times the pattern was applied.
        usage_count: u32,
    },
}

impl MemoryVariant {
    pub fn kind(&self) -> MemoryKind {
        match self {
            MemoryVariant::Semantic { .. } => MemoryKind::Semantic,
            MemoryVariant::Episodic { .. } => MemoryKind::Episodic,
            MemoryVariant::Procedural { .. } => MemoryKind::Procedural,
        }
    }
}

/// A durable user memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique memory identifier.
    pub id: String,
    /// Owning user.  Never changes after creation.
    pub user_id: String,
    /// Memory content/description.
    pub content: String,
    /// Variant payload.
    pub variant: MemoryVariant,
    /// Retention importance.
    pub importance: MemoryImportance,
    /// Vector embedding of `content`; may be empty when embedding failed.
    pub embedding: Vec<f32>,
    /// Sensitivity ceiling required to surface this memory.
    pub sensitivity: DataSensitivity,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last retrieval timestamp.
    pub last_accessed: DateTime<Utc>,
    /// Number of times the memory was retrieved.
    pub access_count: u32,
    /// Soft-delete flag set by consolidation; consolidated memories are
    /// excluded from search.
    pub consolidated: bool,
    /// Free-form metadata.
    pub metadata: Value,
}

impl MemoryRecord {
    /// Build a record with fresh timestamps and zero access count.
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
        variant: MemoryVariant,
        importance: MemoryImportance,
        embedding: Vec<f32>,
    ) -> Self {
        let now = Utc::now();
        MemoryRecord {
            id: id.into(),
            user_id: user_id.into(),
            content: content.into(),
            variant,
            importance,
            embedding,
            sensitivity: DataSensitivity::Internal,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            consolidated: false,
            metadata: Value::Null,
        }
    }

    /// Set the sensitivity tag (builder pattern).
    pub fn with_sensitivity(mut self, sensitivity: DataSensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn kind(&self) -> MemoryKind {
        self.variant.kind()
    }
}

impl Sensitive for MemoryRecord {
    fn sensitivity(&self) -> DataSensitivity {
        self.sensitivity
    }
}

/// Query structure for memory retrieval.
#[derive(Debug, Clone)]
pub struct MemoryQuery {
    /// User whose memories to search.
    pub user_id: String,
    /// Query text (embedded by the caller before the store search).
    pub query_text: String,
    /// Filter by memory kinds, when set.
    pub kinds: Option<Vec<MemoryKind>>,
    /// Minimum importance level, when set.
    pub min_importance: Option<MemoryImportance>,
    /// Maximum age in days, when set.
    pub max_age_days: Option<i64>,
    /// Caller sensitivity ceiling; memories tagged above it never surface.
    pub max_sensitivity: Option<DataSensitivity>,
    /// Maximum number of results.
    pub limit: usize,
    /// Minimum cosine similarity.
    pub similarity_threshold: f32,
}

impl MemoryQuery {
    /// A query with the default top-k (10) and threshold (0.7).
    pub fn new(user_id: impl Into<String>, query_text: impl Into<String>) -> Self {
        MemoryQuery {
            user_id: user_id.into(),
            query_text: query_text.into(),
            kinds: None,
            min_importance: None,
            max_age_days: None,
            max_sensitivity: None,
            limit: 10,
            similarity_threshold: 0.7,
        }
    }

    pub fn with_kinds(mut self, kinds: Vec<MemoryKind>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    pub fn with_min_importance(mut self, importance: MemoryImportance) -> Self {
        self.min_importance = Some(importance);
        self
    }

    pub fn with_max_age_days(mut self, days: i64) -> Self {
        self.max_age_days = Some(days);
        self
    }

    pub fn with_max_sensitivity(mut self, ceiling: DataSensitivity) -> Self {
        self.max_sensitivity = Some(ceiling);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }
}

/// One retrieval hit: the memory plus its similarity to the query.
#[derive(Debug, Clone)]
pub struct MemorySearchResult {
    pub memory: MemoryRecord,
    pub similarity: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importance_orders_ascending() {
        assert!(MemoryImportance::Low < MemoryImportance::Medium);
        assert!(MemoryImportance::High < MemoryImportance::Critical);
    }

    #[test]
    fn variant_reports_its_kind() {
        let variant = MemoryVariant::Procedural {
            trigger: "repeated talent queries".into(),
            action: "lead with availability data".into(),
            success_rate: 0.5,
            usage_count: 3,
        };
        assert_eq!(variant.kind(), MemoryKind::Procedural);
    }
}

//! Runtime configuration.
//!
//! Provides the [`RuntimeConfig`] struct carrying provider credentials, model
//! defaults, cache TTLs, routing thresholds, and queue tuning.  Users construct
//! it manually or via [`RuntimeConfig::from_env`]; no file parsing dependencies
//! are required.
//!
//! # Example
//!
//! ```rust
//! use backlot::config::RuntimeConfig;
//!
//! // All defaults
//! let config = RuntimeConfig::default();
//! assert_eq!(config.routing_confidence_threshold, 0.7);
//!
//! // Or pick credentials up from the environment
//! let config = RuntimeConfig::from_env();
//! ```

use std::time::Duration;

/// Global configuration for the orchestration runtime.
///
/// This struct is intentionally plain: callers construct it however they want
/// and hand it to [`Supervisor`](crate::backlot::supervisor::Supervisor) /
/// [`LLMRouter`](crate::backlot::router::LLMRouter) builders.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Together.ai API key, when the cost-efficient provider should register.
    pub together_api_key: Option<String>,
    /// Default Together chat model.
    pub together_default_model: String,
    /// OpenAI API key, when the high-quality / embedding provider should register.
    pub openai_api_key: Option<String>,
    /// Default OpenAI chat model.
    pub openai_default_model: String,
    /// Embedding model used for memory vectors.
    pub openai_embedding_model: String,
    /// Anthropic API key, optional third provider.
    pub anthropic_api_key: Option<String>,

    /// Default max tokens forwarded with completion requests.
    pub max_tokens: u32,
    /// Default sampling temperature.
    pub temperature: f32,

    /// Per-LLM-call timeout.
    pub llm_timeout: Duration,
    /// Per-tool-call timeout.
    pub tool_timeout: Duration,
    /// Wall-clock ceiling for a whole turn.
    pub turn_timeout: Duration,

    /// Single-agent routing confidence threshold (score >= threshold).
    pub routing_confidence_threshold: f64,
    /// Multi-agent threshold: strategy goes multi when more than one domain
    /// scores at or above this value.
    pub multi_agent_threshold: f64,

    /// TTL applied to per-conversation memory and session records.
    pub conversation_ttl: Duration,
    /// Maximum messages retained in an in-flight conversation history.
    pub max_conversation_history: usize,

    /// Vector similarity threshold for memory retrieval.
    pub similarity_threshold: f32,
    /// Top-k memories returned per retrieval.
    pub max_memory_results: usize,

    /// Bounded concurrency of the background memory worker pool.
    pub background_concurrency: usize,
    /// Background queue batch size per poll.
    pub background_batch_size: usize,
    /// Background queue polling interval.
    pub background_poll_interval: Duration,
    /// Soft queue-length threshold above which new extraction tasks are dropped.
    pub background_queue_soft_limit: usize,
    /// TTL on background task result records.
    pub background_result_ttl: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            together_api_key: None,
            together_default_model: "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo".to_string(),
            openai_api_key: None,
            openai_default_model: "gpt-4o-mini".to_string(),
            openai_embedding_model: "text-embedding-3-small".to_string(),
            anthropic_api_key: None,

            max_tokens: 2048,
            temperature: 0.7,

            llm_timeout: Duration::from_secs(30),
            tool_timeout: Duration::from_secs(10),
            turn_timeout: Duration::from_secs(60),

            routing_confidence_threshold: 0.7,
            multi_agent_threshold: 0.3,

            conversation_ttl: Duration::from_secs(3600),
            max_conversation_history: 20,

            similarity_threshold: 0.7,
            max_memory_results: 10,

            background_concurrency: 5,
            background_batch_size: 10,
            background_poll_interval: Duration::from_secs(10),
            background_queue_soft_limit: 200,
            background_result_ttl: Duration::from_secs(3600),
        }
    }
}

impl RuntimeConfig {
    /// Build a config from environment variables, falling back to defaults for
    /// everything that is unset.
    ///
    /// Recognised variables: `TOGETHER_API_KEY`, `OPENAI_API_KEY`,
    /// `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Self {
        RuntimeConfig {
            together_api_key: std::env::var("TOGETHER_API_KEY").ok(),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            ..RuntimeConfig::default()
        }
    }

    /// Whether at least one LLM provider credential is present.
    pub fn any_provider_configured(&self) -> bool {
        self.together_api_key.is_some()
            || self.openai_api_key.is_some()
            || self.anthropic_api_key.is_some()
    }

    /// List the configuration items missing for full operation, for startup
    /// diagnostics.
    pub fn missing_items(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.any_provider_configured() {
            missing.push("LLM API key (TOGETHER_API_KEY or OPENAI_API_KEY)");
        }
        missing
    }
}

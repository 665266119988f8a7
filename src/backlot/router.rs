//! Multi-provider LLM routing.
//!
//! The [`LLMRouter`] accepts a completion request, assesses its complexity,
//! selects a provider, issues the call with a per-call timeout, and retries once
//! against a static fallback provider on failure.  Every attempt, success or
//! failure, updates that provider's rolling [`ProviderStats`].
//!
//! # Selection
//!
//! 1. An explicitly preferred provider wins when registered.
//! 2. `Complex` queries go to the registered high-quality tier when present.
//! 3. Everything else goes to the cost-efficient default, then to any
//!    registered provider.
//! 4. An empty provider table fails with [`RouterError::NoProvidersAvailable`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use backlot::client_wrapper::Message;
//! use backlot::clients::together::TogetherClient;
//! use backlot::router::{LLMRouter, LlmRequest, ProviderId, ProviderTier};
//!
//! # async {
//! let mut router = LLMRouter::new();
//! router.register_provider(
//!     ProviderId::Together,
//!     Arc::new(TogetherClient::new("key")),
//!     ProviderTier::CostEfficient,
//!     0.0001,
//! );
//!
//! let response = router
//!     .route_query(LlmRequest::from_messages(vec![Message::user("Hi")]))
//!     .await
//!     .unwrap();
//! println!("{} answered: {}", response.provider.as_str(), response.message.content);
//! # };
//! ```

use crate::backlot::client_wrapper::{
    ClientWrapper, Message, MessageChunkStream, Role, TokenUsage, ToolDefinition,
};
use log::{error, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Identifiers of the providers the router knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Together,
    OpenAI,
    Anthropic,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Together => "together",
            ProviderId::OpenAI => "openai",
            ProviderId::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality tier used during complexity-aware selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderTier {
    /// Better reasoning quality, selected for `Complex` queries.
    HighQuality,
    /// Default choice for everything else.
    CostEfficient,
}

/// Query complexity levels steering provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryComplexity {
    /// Basic queries, factual lookups.
    Simple,
    /// Analysis, reasoning.
    Moderate,
    /// Multi-step reasoning, planning.
    Complex,
}

const COMPLEX_KEYWORDS: [&str; 6] = ["analyze", "compare", "strategy", "plan", "optimize", "evaluate"];
const MULTI_STEP_KEYWORDS: [&str; 5] = ["first", "then", "after", "step", "process"];
const REASONING_KEYWORDS: [&str; 4] = ["because", "therefore", "explain why", "reasoning"];

/// Assess query complexity from the latest user message.
///
/// The rule is exact and reimplementable: count keyword-family occurrences on
/// the lower-cased text, then
/// - `Complex` when analysis >= 2, or multi-step >= 2, or reasoning >= 1, or
///   length > 500;
/// - `Moderate` when analysis >= 1, or multi-step >= 1, or length > 200;
/// - `Simple` otherwise.
pub fn assess_complexity(messages: &[Message]) -> QueryComplexity {
    let latest = messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_ref())
        .unwrap_or("");

    let content_lower = latest.to_lowercase();

    let count = |keywords: &[&str]| {
        keywords
            .iter()
            .filter(|keyword| content_lower.contains(*keyword))
            .count()
    };

    let complex_count = count(&COMPLEX_KEYWORDS);
    let multi_step_count = count(&MULTI_STEP_KEYWORDS);
    let reasoning_count = count(&REASONING_KEYWORDS);

    if complex_count >= 2 || multi_step_count >= 2 || reasoning_count >= 1 || latest.len() > 500 {
        QueryComplexity::Complex
    } else if complex_count >= 1 || multi_step_count >= 1 || latest.len() > 200 {
        QueryComplexity::Moderate
    } else {
        QueryComplexity::Simple
    }
}

/// Rolling per-provider counters.
///
/// Counters only increase; the latency average follows the running-mean
/// recurrence `avg <- avg + (latency - avg) / requests`.  Counters are atomic
/// and the average sits behind a short-lived lock, so readers tolerate
/// momentary inconsistency between fields.
#[derive(Debug, Default)]
pub struct ProviderStats {
    requests: AtomicU64,
    failures: AtomicU64,
    avg_latency_ms: Mutex<f64>,
}

impl ProviderStats {
    fn record_attempt(&self, success: bool, latency: Option<Duration>) {
        let requests = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        if !success {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(latency) = latency {
            let millis = latency.as_secs_f64() * 1000.0;
            if let Ok(mut avg) = self.avg_latency_ms.lock() {
                *avg += (millis - *avg) / requests as f64;
            }
        }
    }

    fn snapshot(&self, available: bool) -> ProviderStatsSnapshot {
        let requests = self.requests.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let avg_latency_ms = self.avg_latency_ms.lock().map(|avg| *avg).unwrap_or(0.0);
        ProviderStatsSnapshot {
            requests,
            failures,
            avg_latency_ms,
            success_rate: if requests > 0 {
                (requests - failures) as f64 / requests as f64
            } else {
                0.0
            },
            available,
        }
    }
}

/// A point-in-time copy of one provider's statistics, with the derived success
/// rate, for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatsSnapshot {
    pub requests: u64,
    pub failures: u64,
    pub avg_latency_ms: f64,
    pub success_rate: f64,
    pub available: bool,
}

/// A provider registration: client plus per-entry defaults.
struct ProviderEntry {
    client: Arc<dyn ClientWrapper>,
    tier: ProviderTier,
    cost_per_token: f64,
}

/// A routed completion request.
#[derive(Clone)]
pub struct LlmRequest {
    /// Conversation messages, system priming included.
    pub messages: Vec<Message>,
    /// Explicit complexity; assessed from the messages when `None`.
    pub complexity: Option<QueryComplexity>,
    /// Preferred provider hint; honored when registered.
    pub preferred_provider: Option<ProviderId>,
    /// Native tool definitions forwarded to the provider, when any.
    pub tools: Option<Vec<ToolDefinition>>,
}

impl LlmRequest {
    /// Build a plain completion request from messages.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        LlmRequest {
            messages,
            complexity: None,
            preferred_provider: None,
            tools: None,
        }
    }

    /// Set the preferred provider (builder pattern).
    pub fn with_preferred_provider(mut self, provider: ProviderId) -> Self {
        self.preferred_provider = Some(provider);
        self
    }

    /// Set an explicit complexity (builder pattern).
    pub fn with_complexity(mut self, complexity: QueryComplexity) -> Self {
        self.complexity = Some(complexity);
        self
    }

    /// Attach native tool definitions (builder pattern).
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// A routed completion response, with provenance for auditability.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// The assistant message, possibly carrying native tool calls.
    pub message: Message,
    /// Which provider actually answered (the fallback after a failover).
    pub provider: ProviderId,
    /// The model identifier the provider used.
    pub model: String,
    /// Token accounting, when the provider reported it.
    pub usage: Option<TokenUsage>,
    /// Wall-clock latency of the successful attempt.
    pub latency: Duration,
    /// `tokens_used * cost_per_token` for the answering provider.
    pub cost_estimate: f64,
}

/// Errors surfaced by the router.
#[derive(Debug)]
pub enum RouterError {
    /// The provider table is empty.
    NoProvidersAvailable,
    /// Primary and fallback both failed; both underlying errors are carried.
    AllProvidersFailed {
        primary: (ProviderId, String),
        fallback: Option<(ProviderId, String)>,
    },
    /// No registered provider implements embeddings.
    EmbeddingUnavailable,
    /// A single provider attempt failed where no fallback applies (streaming).
    ProviderFailed(ProviderId, String),
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::NoProvidersAvailable => write!(f, "No LLM providers available"),
            RouterError::AllProvidersFailed { primary, fallback } => match fallback {
                Some((id, err)) => write!(
                    f,
                    "All LLM providers failed: {} ({}); fallback {} ({})",
                    primary.0, primary.1, id, err
                ),
                None => write!(f, "All LLM providers failed: {} ({})", primary.0, primary.1),
            },
            RouterError::EmbeddingUnavailable => {
                write!(f, "No embedding-capable provider registered")
            }
            RouterError::ProviderFailed(id, err) => {
                write!(f, "Provider {} failed: {}", id, err)
            }
        }
    }
}

impl Error for RouterError {}

/// Intelligent LLM router that selects optimal providers based on query
/// complexity, cost, and availability.
pub struct LLMRouter {
    providers: HashMap<ProviderId, ProviderEntry>,
    registration_order: Vec<ProviderId>,
    fallback_map: HashMap<ProviderId, ProviderId>,
    stats: HashMap<ProviderId, ProviderStats>,
    llm_timeout: Duration,
}

impl Default for LLMRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl LLMRouter {
    /// Create a router with an empty provider table and the default fallback
    /// map (`together <-> openai`, `anthropic -> openai`).
    pub fn new() -> Self {
        let mut fallback_map = HashMap::new();
        fallback_map.insert(ProviderId::Together, ProviderId::OpenAI);
        fallback_map.insert(ProviderId::OpenAI, ProviderId::Together);
        fallback_map.insert(ProviderId::Anthropic, ProviderId::OpenAI);

        LLMRouter {
            providers: HashMap::new(),
            registration_order: Vec::new(),
            fallback_map,
            stats: HashMap::new(),
            llm_timeout: Duration::from_secs(30),
        }
    }

    /// Override the per-call timeout (builder pattern).
    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    /// Register a provider client under `id`.
    ///
    /// Replaces any previous registration for the same id.  `cost_per_token` is
    /// the approximate per-token price used for cost estimates.
    pub fn register_provider(
        &mut self,
        id: ProviderId,
        client: Arc<dyn ClientWrapper>,
        tier: ProviderTier,
        cost_per_token: f64,
    ) {
        info!("registered provider {} (model {})", id, client.model_name());
        if !self.providers.contains_key(&id) {
            self.registration_order.push(id);
        }
        self.providers.insert(
            id,
            ProviderEntry {
                client,
                tier,
                cost_per_token,
            },
        );
        self.stats.entry(id).or_default();
    }

    /// Override one edge of the static fallback map.
    pub fn set_fallback(&mut self, primary: ProviderId, alternate: ProviderId) {
        self.fallback_map.insert(primary, alternate);
    }

    /// Whether any provider is registered.
    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Select the provider for a request per the routing rules.
    pub fn select_provider(
        &self,
        complexity: QueryComplexity,
        preferred: Option<ProviderId>,
    ) -> Result<ProviderId, RouterError> {
        if let Some(preferred) = preferred {
            if self.providers.contains_key(&preferred) {
                return Ok(preferred);
            }
        }

        if complexity == QueryComplexity::Complex {
            if let Some(id) = self.first_with_tier(ProviderTier::HighQuality) {
                return Ok(id);
            }
        }

        if let Some(id) = self.first_with_tier(ProviderTier::CostEfficient) {
            return Ok(id);
        }

        self.registration_order
            .first()
            .copied()
            .ok_or(RouterError::NoProvidersAvailable)
    }

    fn first_with_tier(&self, tier: ProviderTier) -> Option<ProviderId> {
        self.registration_order
            .iter()
            .copied()
            .find(|id| self.providers.get(id).map(|e| e.tier) == Some(tier))
    }

    /// The fallback for `failed`, when one is configured and registered.
    pub fn fallback_for(&self, failed: ProviderId) -> Option<ProviderId> {
        self.fallback_map
            .get(&failed)
            .copied()
            .filter(|alt| *alt != failed && self.providers.contains_key(alt))
    }

    /// Route a completion request to the optimal provider, falling back once on
    /// failure.
    pub async fn route_query(&self, request: LlmRequest) -> Result<LlmResponse, RouterError> {
        if self.providers.is_empty() {
            return Err(RouterError::NoProvidersAvailable);
        }

        let complexity = request
            .complexity
            .unwrap_or_else(|| assess_complexity(&request.messages));
        let primary = self.select_provider(complexity, request.preferred_provider)?;

        match self.attempt(primary, &request).await {
            Ok(response) => Ok(response),
            Err(primary_err) => {
                error!("Primary provider {} failed: {}", primary, primary_err);

                let fallback = self.fallback_for(primary);
                match fallback {
                    Some(alternate) => {
                        info!("Falling back to {}", alternate);
                        match self.attempt(alternate, &request).await {
                            Ok(response) => Ok(response),
                            Err(fallback_err) => {
                                error!(
                                    "Fallback provider {} also failed: {}",
                                    alternate, fallback_err
                                );
                                Err(RouterError::AllProvidersFailed {
                                    primary: (primary, primary_err),
                                    fallback: Some((alternate, fallback_err)),
                                })
                            }
                        }
                    }
                    None => Err(RouterError::AllProvidersFailed {
                        primary: (primary, primary_err),
                        fallback: None,
                    }),
                }
            }
        }
    }

    /// One provider attempt: issue the call under the per-call timeout, record
    /// stats either way.
    async fn attempt(&self, id: ProviderId, request: &LlmRequest) -> Result<LlmResponse, String> {
        let entry = self.providers.get(&id).ok_or("provider not registered")?;
        let stats = self.stats.get(&id).ok_or("provider stats missing")?;

        let started = Instant::now();
        let call = entry
            .client
            .send_message(&request.messages, request.tools.clone());

        let outcome = tokio::time::timeout(self.llm_timeout, call).await;

        match outcome {
            Ok(Ok(message)) => {
                let latency = started.elapsed();
                stats.record_attempt(true, Some(latency));

                let usage = entry.client.get_last_usage().await;
                let cost_estimate = usage
                    .as_ref()
                    .map(|u| u.total_tokens as f64 * entry.cost_per_token)
                    .unwrap_or(0.0);

                Ok(LlmResponse {
                    message,
                    provider: id,
                    model: entry.client.model_name().to_string(),
                    usage,
                    latency,
                    cost_estimate,
                })
            }
            Ok(Err(err)) => {
                stats.record_attempt(false, None);
                Err(err.to_string())
            }
            Err(_) => {
                stats.record_attempt(false, None);
                Err(format!("timed out after {:?}", self.llm_timeout))
            }
        }
    }

    /// Open a streaming completion against the selected provider.
    ///
    /// Streaming does not fail over mid-stream; a failed open records a failure
    /// and surfaces [`RouterError::ProviderFailed`].  Providers without streaming
    /// support resolve to `Ok((id, None))`.
    pub async fn stream_query(
        &self,
        request: LlmRequest,
    ) -> Result<(ProviderId, Option<MessageChunkStream>), RouterError> {
        if self.providers.is_empty() {
            return Err(RouterError::NoProvidersAvailable);
        }

        let complexity = request
            .complexity
            .unwrap_or_else(|| assess_complexity(&request.messages));
        let id = self.select_provider(complexity, request.preferred_provider)?;
        let entry = self.providers.get(&id).ok_or(RouterError::NoProvidersAvailable)?;
        let stats = self.stats.get(&id).ok_or(RouterError::NoProvidersAvailable)?;

        match entry
            .client
            .send_message_stream(&request.messages, request.tools.clone())
            .await
        {
            Ok(stream) => {
                stats.record_attempt(true, None);
                Ok((id, stream))
            }
            Err(err) => {
                stats.record_attempt(false, None);
                Err(RouterError::ProviderFailed(id, err.to_string()))
            }
        }
    }

    /// Produce an embedding via the first embedding-capable provider.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, RouterError> {
        let id = self
            .registration_order
            .iter()
            .copied()
            .find(|id| {
                self.providers
                    .get(id)
                    .map(|e| e.client.supports_embeddings())
                    .unwrap_or(false)
            })
            .ok_or(RouterError::EmbeddingUnavailable)?;

        let entry = self.providers.get(&id).ok_or(RouterError::EmbeddingUnavailable)?;
        entry.client.embed(text).await.map_err(|err| {
            warn!("embedding generation failed on {}: {}", id, err);
            RouterError::ProviderFailed(id, err.to_string())
        })
    }

    /// Snapshot the statistics table for every known provider.
    pub fn provider_stats(&self) -> HashMap<ProviderId, ProviderStatsSnapshot> {
        self.stats
            .iter()
            .map(|(id, stats)| (*id, stats.snapshot(self.providers.contains_key(id))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(text: &str) -> Vec<Message> {
        vec![Message::user(text)]
    }

    #[test]
    fn short_factual_query_is_simple() {
        assert_eq!(
            assess_complexity(&user("Do we work with CocaCola?")),
            QueryComplexity::Simple
        );
    }

    #[test]
    fn single_analysis_keyword_is_moderate() {
        assert_eq!(
            assess_complexity(&user("Can you analyze this vendor list?")),
            QueryComplexity::Moderate
        );
    }

    #[test]
    fn reasoning_keyword_forces_complex() {
        assert_eq!(
            assess_complexity(&user("Explain why the deal stalled")),
            QueryComplexity::Complex
        );
    }

    #[test]
    fn long_message_forces_complex() {
        let long = "x".repeat(501);
        assert_eq!(assess_complexity(&user(&long)), QueryComplexity::Complex);
    }

    #[test]
    fn empty_history_is_simple() {
        assert_eq!(assess_complexity(&[]), QueryComplexity::Simple);
    }
}

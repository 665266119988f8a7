//! Tool abstraction layer.
//!
//! Agents never call the knowledge graph directly; they reach it through tools
//! hosted by a [`ToolRegistry`].  Each tool carries an immutable [`ToolSpec`]
//! (stable name, natural-language description consumed by the LLM for selection,
//! JSON-schema parameters, category tag, cache-TTL hint, sensitivity tag) and a
//! uniform result envelope.
//!
//! # Capability sets
//!
//! Tools are grouped into three disjoint [`ToolCategory`]s.  An agent declares
//! which categories it requires and the registry exposes only those tools to it
//! with no inheritance and no mixin resolution order.
//!
//! # The result contract
//!
//! Every execution produces a [`ToolResult`] with at least `{found: bool}`.
//! A missing entity is `found: false` with an explanatory message, never an
//! error; infrastructure failures (graph unreachable, cache corrupt) surface as
//! `found: false` plus `error` so the conversation can continue.

use crate::backlot::client_wrapper::ToolDefinition;
use crate::backlot::identity::{DataSensitivity, Sensitive};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The three disjoint capability categories governing which agent sees which
/// tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// People, companies and relationships (CRM focus).
    CrmPeople,
    /// Projects and creative DNA (production focus).
    ProjectsCreative,
    /// Documents and full-text content.
    Documents,
}

impl ToolCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::CrmPeople => "crm_people",
            ToolCategory::ProjectsCreative => "projects_creative",
            ToolCategory::Documents => "documents",
        }
    }
}

/// Immutable descriptor of one tool.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Stable name routed on by the LLM's tool calls.
    pub name: String,
    /// Natural-language description consumed by the LLM for selection.
    pub description: String,
    /// JSON Schema object describing the accepted arguments.
    pub parameters_schema: serde_json::Value,
    /// Capability category this tool belongs to.
    pub category: ToolCategory,
    /// How long results of this tool may be cached.
    pub cache_ttl: Duration,
    /// Sensitivity of the data this tool can surface.
    pub sensitivity: DataSensitivity,
}

impl ToolSpec {
    /// Create a spec with the supplied identity and category; parameters default
    /// to an empty object schema, TTL to five minutes, sensitivity to Internal.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: ToolCategory,
    ) -> Self {
        ToolSpec {
            name: name.into(),
            description: description.into(),
            parameters_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
            category,
            cache_ttl: Duration::from_secs(300),
            sensitivity: DataSensitivity::Internal,
        }
    }

    /// Set the JSON-schema parameter object (builder pattern).
    pub fn with_parameters(mut self, schema: serde_json::Value) -> Self {
        self.parameters_schema = schema;
        self
    }

    /// Set the cache TTL hint (builder pattern).
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the sensitivity tag (builder pattern).
    pub fn with_sensitivity(mut self, sensitivity: DataSensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    /// Derive the provider-facing schema sent along with completion requests.
    pub fn to_tool_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters_schema: self.parameters_schema.clone(),
        }
    }
}

/// Uniform result envelope returned by every tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    /// Whether the requested entity was found.
    pub found: bool,
    /// The structured payload; `Null` when nothing was produced.
    pub output: serde_json::Value,
    /// Explanatory message for misses and infrastructure failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Sensitivity of the payload, stamped from the owning [`ToolSpec`].
    pub sensitivity: DataSensitivity,
}

impl ToolResult {
    /// A successful lookup carrying `output`.
    pub fn found(output: serde_json::Value) -> Self {
        ToolResult {
            found: true,
            output,
            error: None,
            sensitivity: DataSensitivity::Internal,
        }
    }

    /// A structured miss: the entity does not exist in the graph.
    pub fn not_found(message: impl Into<String>) -> Self {
        ToolResult {
            found: false,
            output: serde_json::Value::Null,
            error: Some(message.into()),
            sensitivity: DataSensitivity::Internal,
        }
    }

    /// An infrastructure failure the agent can continue past.
    pub fn failure(error: impl Into<String>) -> Self {
        ToolResult {
            found: false,
            output: serde_json::Value::Null,
            error: Some(error.into()),
            sensitivity: DataSensitivity::Internal,
        }
    }

    /// Stamp a sensitivity level onto the result (builder pattern).
    pub fn with_sensitivity(mut self, sensitivity: DataSensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    /// Render the result for inclusion in a synthesis prompt.
    pub fn to_prompt_text(&self) -> String {
        if self.found {
            self.output.to_string()
        } else {
            match &self.error {
                Some(err) => format!("{{\"found\": false, \"error\": \"{}\"}}", err),
                None => "{\"found\": false}".to_string(),
            }
        }
    }
}

impl Sensitive for ToolResult {
    fn sensitivity(&self) -> DataSensitivity {
        self.sensitivity
    }
}

/// Error types for tool operations.
#[derive(Debug, Clone)]
pub enum ToolError {
    /// Requested tool is not registered in the current registry.
    NotFound(String),
    /// The provided JSON arguments failed validation or deserialization.
    InvalidArguments(String),
    /// A lower level execution error occurred.
    ExecutionFailed(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::NotFound(name) => write!(f, "Tool not found: {}", name),
            ToolError::InvalidArguments(msg) => write!(f, "Invalid arguments: {}", msg),
            ToolError::ExecutionFailed(msg) => write!(f, "Tool execution failed: {}", msg),
        }
    }
}

impl Error for ToolError {}

/// Trait for implementing tool execution backends.
///
/// One executor typically hosts a family of tools and dispatches on
/// `tool_name`; see
/// [`GraphToolSet`](crate::backlot::graph_tools::GraphToolSet) for the
/// knowledge-graph family.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute a tool with the given JSON argument map.
    ///
    /// Domain-level misses and recoverable infrastructure failures must be
    /// reported inside the [`ToolResult`]; an `Err` here means the executor
    /// itself misbehaved (unknown tool, panic-level conditions).
    async fn execute(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>>;
}

/// Hosts the set of callable tools available to agents.
///
/// The registry owns the spec table and routes execution to the executor that
/// registered each tool, enforcing the per-call timeout and stamping the spec's
/// sensitivity onto every result.
pub struct ToolRegistry {
    specs: HashMap<String, ToolSpec>,
    executors: HashMap<String, Arc<dyn ToolExecutor>>,
    /// Registration order, for stable listings.
    order: Vec<String>,
    tool_timeout: Duration,
}

impl ToolRegistry {
    /// Create an empty registry with the default 10 s per-call timeout.
    pub fn new() -> Self {
        ToolRegistry {
            specs: HashMap::new(),
            executors: HashMap::new(),
            order: Vec::new(),
            tool_timeout: Duration::from_secs(10),
        }
    }

    /// Override the per-call timeout (builder pattern).
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Register a tool spec together with the executor that serves it.
    ///
    /// Re-registering a name replaces the previous entry.
    pub fn register(&mut self, spec: ToolSpec, executor: Arc<dyn ToolExecutor>) {
        let name = spec.name.clone();
        if !self.specs.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.executors.insert(name.clone(), executor);
        self.specs.insert(name, spec);
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Look up a spec by tool name.
    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.get(name)
    }

    /// All specs in registration order.
    pub fn specs(&self) -> Vec<&ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.specs.get(name))
            .collect()
    }

    /// The specs visible to an agent declaring the given capability set.
    pub fn specs_for_categories(&self, categories: &HashSet<ToolCategory>) -> Vec<&ToolSpec> {
        self.specs()
            .into_iter()
            .filter(|spec| categories.contains(&spec.category))
            .collect()
    }

    /// Provider-facing tool definitions for the given capability set.
    pub fn definitions_for_categories(
        &self,
        categories: &HashSet<ToolCategory>,
    ) -> Vec<ToolDefinition> {
        self.specs_for_categories(categories)
            .into_iter()
            .map(|spec| spec.to_tool_definition())
            .collect()
    }

    /// Execute the named tool under the registry's per-call timeout.
    ///
    /// Unknown tools error with [`ToolError::NotFound`].  Timeouts and executor
    /// errors are folded into the result envelope so callers always get a
    /// [`ToolResult`] for a known tool.
    pub async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let spec = self
            .specs
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        let executor = self
            .executors
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let result = match tokio::time::timeout(
            self.tool_timeout,
            executor.execute(name, arguments),
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => ToolResult::failure(format!("Query failed: {}", err)),
            Err(_) => ToolResult::failure(format!(
                "Tool timed out after {:?}",
                self.tool_timeout
            )),
        };

        Ok(result.with_sensitivity(spec.sensitivity))
    }

    /// Status report for the health surface: tool names and per-category counts.
    pub fn status(&self) -> serde_json::Value {
        let mut by_category: HashMap<&'static str, usize> = HashMap::new();
        for spec in self.specs.values() {
            *by_category.entry(spec.category.as_str()).or_insert(0) += 1;
        }
        serde_json::json!({
            "tool_count": self.specs.len(),
            "tools": self.order,
            "by_category": by_category,
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoExecutor;

    #[async_trait]
    impl ToolExecutor for EchoExecutor {
        async fn execute(
            &self,
            _tool_name: &str,
            arguments: serde_json::Value,
        ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
            Ok(ToolResult::found(arguments))
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_a_registry_error() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute("get_person_details", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn results_are_stamped_with_spec_sensitivity() {
        let mut registry = ToolRegistry::new();
        registry.register(
            ToolSpec::new("echo", "Echo arguments back.", ToolCategory::Documents)
                .with_sensitivity(DataSensitivity::Confidential),
            Arc::new(EchoExecutor),
        );

        let result = registry
            .execute("echo", serde_json::json!({"q": 1}))
            .await
            .unwrap();
        assert!(result.found);
        assert_eq!(result.sensitivity, DataSensitivity::Confidential);
    }

    #[test]
    fn category_filtering_hides_other_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(
            ToolSpec::new("a", "A.", ToolCategory::CrmPeople),
            Arc::new(EchoExecutor),
        );
        registry.register(
            ToolSpec::new("b", "B.", ToolCategory::Documents),
            Arc::new(EchoExecutor),
        );

        let mut categories = HashSet::new();
        categories.insert(ToolCategory::Documents);
        let visible = registry.specs_for_categories(&categories);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "b");
    }
}

use async_trait::async_trait;
use backlot::graph::{CrmClient, GraphClient, GraphError, KvCache, MemoryKvStore};
use backlot::graph_tools::{register_graph_tools, GraphToolSet};
use backlot::identity::DataSensitivity;
use backlot::tool_protocol::{ToolCategory, ToolRegistry};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Graph stub returning canned rows and counting queries.
struct MockGraph {
    rows: Vec<Value>,
    queries: AtomicUsize,
}

impl MockGraph {
    fn new(rows: Vec<Value>) -> Self {
        MockGraph {
            rows,
            queries: AtomicUsize::new(0),
        }
    }

    fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphClient for MockGraph {
    async fn run(&self, _query: &str, _params: Value) -> Result<Vec<Value>, GraphError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.clone())
    }
}

struct FailingGraph;

#[async_trait]
impl GraphClient for FailingGraph {
    async fn run(&self, _query: &str, _params: Value) -> Result<Vec<Value>, GraphError> {
        Err(GraphError::Unreachable("connection refused".to_string()))
    }
}

struct MockCrm {
    fail: bool,
}

#[async_trait]
impl CrmClient for MockCrm {
    async fn get_deal_status(
        &self,
        _crm_id: &str,
    ) -> Result<Value, Box<dyn Error + Send + Sync>> {
        if self.fail {
            Err("crm timeout".into())
        } else {
            Ok(json!({"stage": "negotiation", "updated": "today"}))
        }
    }
}

fn registry_with(tools: Arc<GraphToolSet>) -> ToolRegistry {
    backlot::logging::init();
    let mut registry = ToolRegistry::new();
    register_graph_tools(&mut registry, tools);
    registry
}

#[tokio::test]
async fn all_canonical_tools_are_registered() {
    let graph = Arc::new(MockGraph::new(vec![]));
    let registry = registry_with(Arc::new(GraphToolSet::new(graph)));
    assert_eq!(registry.len(), 22);

    let mut crm = HashSet::new();
    crm.insert(ToolCategory::CrmPeople);
    assert_eq!(registry.specs_for_categories(&crm).len(), 7);

    let mut projects = HashSet::new();
    projects.insert(ToolCategory::ProjectsCreative);
    assert_eq!(registry.specs_for_categories(&projects).len(), 10);

    let mut documents = HashSet::new();
    documents.insert(ToolCategory::Documents);
    assert_eq!(registry.specs_for_categories(&documents).len(), 5);
}

#[tokio::test]
async fn missing_entity_is_a_structured_miss() {
    let graph = Arc::new(MockGraph::new(vec![]));
    let registry = registry_with(Arc::new(GraphToolSet::new(graph)));

    let result = registry
        .execute("get_person_details", json!({"name": "Nobody"}))
        .await
        .unwrap();

    assert!(!result.found);
    assert!(result.error.as_deref().unwrap().contains("not found"));
}

#[tokio::test]
async fn graph_failure_degrades_to_found_false() {
    let registry = registry_with(Arc::new(GraphToolSet::new(Arc::new(FailingGraph))));

    let result = registry
        .execute("get_organization_profile", json!({"org_name": "CocaCola"}))
        .await
        .unwrap();

    assert!(!result.found);
    assert!(result.error.as_deref().unwrap().contains("Query failed"));
}

#[tokio::test]
async fn missing_argument_is_reported_not_thrown() {
    let graph = Arc::new(MockGraph::new(vec![]));
    let registry = registry_with(Arc::new(GraphToolSet::new(graph)));

    let result = registry
        .execute("get_person_details", json!({}))
        .await
        .unwrap();

    assert!(!result.found);
    assert!(result.error.as_deref().unwrap().contains("name"));
}

#[tokio::test]
async fn second_identical_call_hits_the_cache() {
    // The cached response is identical and the graph is not re-queried.
    let row = json!({
        "project": "Nike Air Max",
        "type": "commercial",
        "year": 2025,
        "matched_concepts": ["sneakers"],
    });
    let graph = Arc::new(MockGraph::new(vec![row]));
    let cache = Arc::new(MemoryKvStore::new());
    let tools = Arc::new(
        GraphToolSet::new(Arc::clone(&graph) as Arc<dyn GraphClient>)
            .with_cache(Arc::clone(&cache) as Arc<dyn KvCache>),
    );
    let registry = registry_with(Arc::clone(&tools));

    let args = json!({"concept_name": "Nike Air Max"});
    let first = registry
        .execute("find_projects_by_concept", args.clone())
        .await
        .unwrap();
    assert!(first.found);
    assert_eq!(graph.query_count(), 1);

    // The write-behind is a spawned task; give it a beat.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let second = registry
        .execute("find_projects_by_concept", args)
        .await
        .unwrap();
    assert!(second.found);
    assert_eq!(second.output, first.output);
    assert_eq!(graph.query_count(), 1);
}

#[tokio::test]
async fn cache_keys_canonicalize_case_and_whitespace() {
    let graph = Arc::new(MockGraph::new(vec![json!({
        "person": {"name": "Ava Chen"},
        "organization": "Stellar",
        "projects": [],
        "groups": [],
    })]));
    let cache = Arc::new(MemoryKvStore::new());
    let tools = Arc::new(
        GraphToolSet::new(Arc::clone(&graph) as Arc<dyn GraphClient>)
            .with_cache(Arc::clone(&cache) as Arc<dyn KvCache>),
    );
    let registry = registry_with(tools);

    registry
        .execute("get_person_details", json!({"name": "Ava  Chen"}))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    registry
        .execute("get_person_details", json!({"name": "ava chen"}))
        .await
        .unwrap();

    assert_eq!(graph.query_count(), 1);
}

#[tokio::test]
async fn deal_status_reports_graph_only_when_crm_fails() {
    let row = json!({
        "deal": {"name": "Nike Q3", "crmId": "crm-1", "status": "open"},
        "sourced_by": "Ava Chen",
        "contacts": [],
        "organization": "Nike",
    });
    let graph = Arc::new(MockGraph::new(vec![row.clone()]));
    let tools = Arc::new(
        GraphToolSet::new(Arc::clone(&graph) as Arc<dyn GraphClient>)
            .with_crm(Arc::new(MockCrm { fail: true })),
    );
    let registry = registry_with(tools);

    let result = registry
        .execute("get_deal_live_status", json!({"deal_name": "Nike Q3"}))
        .await
        .unwrap();

    assert!(result.found);
    assert_eq!(result.output["data_freshness"], "graph_only");
    assert_eq!(result.output["live_status"], "api_unavailable");
}

#[tokio::test]
async fn deal_status_enriches_when_crm_answers() {
    let row = json!({
        "deal": {"name": "Nike Q3", "crmId": "crm-1", "status": "open"},
        "sourced_by": "Ava Chen",
        "contacts": [],
        "organization": "Nike",
    });
    let graph = Arc::new(MockGraph::new(vec![row]));
    let tools = Arc::new(
        GraphToolSet::new(Arc::clone(&graph) as Arc<dyn GraphClient>)
            .with_crm(Arc::new(MockCrm { fail: false })),
    );
    let registry = registry_with(tools);

    let result = registry
        .execute("get_deal_live_status", json!({"deal_name": "Nike Q3"}))
        .await
        .unwrap();

    assert_eq!(result.output["data_freshness"], "live_api_enhanced");
    assert_eq!(result.output["live_status"]["stage"], "negotiation");
}

#[tokio::test]
async fn document_search_returns_snippets() {
    let body = format!(
        "{} the crew roster lists every gaffer on the shoot {}",
        "padding ".repeat(40),
        "padding ".repeat(40)
    );
    let row = json!({
        "id": "doc-1",
        "title": "Crew Roster",
        "content": body,
        "score": 0.92,
    });
    let graph = Arc::new(MockGraph::new(vec![row]));
    let registry = registry_with(Arc::new(GraphToolSet::new(graph)));

    let result = registry
        .execute("search_documents_full_text", json!({"search_query": "gaffer"}))
        .await
        .unwrap();

    assert!(result.found);
    let snippet = result.output["results"][0]["snippet"].as_str().unwrap();
    assert!(snippet.contains("gaffer"));
    assert!(snippet.len() <= 206);
}

#[tokio::test]
async fn confidential_tools_are_tagged() {
    let graph = Arc::new(MockGraph::new(vec![]));
    let registry = registry_with(Arc::new(GraphToolSet::new(graph)));

    let spec = registry.spec("get_deal_live_status").unwrap();
    assert_eq!(spec.sensitivity, DataSensitivity::Confidential);
    assert_eq!(registry.spec("get_person_details").unwrap().sensitivity, DataSensitivity::Internal);
}

//! Knowledge-graph query tools.
//!
//! [`GraphToolSet`] hosts the canonical tools agents call during a turn, backed
//! by a [`GraphClient`] with a read-through [`KvCache`] and optional live CRM
//! enrichment.  Results follow the uniform `{found, error?}` contract: misses
//! are structured, infrastructure failures degrade gracefully, and cache
//! problems never fail a lookup.
//!
//! Tools fall into three capability categories:
//!
//! - *CRM/People*: person profiles, org rosters, deal attribution, networks.
//! - *Projects/Creative*: project DNA, concept search, team and vendor rosters.
//! - *Document/Content*: document lookups and full-text search with snippets.
//!
//! Use [`register_graph_tools`] to install the whole family into a
//! [`ToolRegistry`].

use crate::backlot::graph::{CrmClient, GraphClient, KvCache};
use crate::backlot::identity::DataSensitivity;
use crate::backlot::tool_protocol::{ToolCategory, ToolExecutor, ToolRegistry, ToolResult, ToolSpec};
use async_trait::async_trait;
use log::warn;
use serde_json::{json, Value};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// Cache TTL settings per data family, in seconds.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtl {
    pub person: u64,
    pub concept: u64,
    pub project: u64,
    pub document: u64,
    pub organization: u64,
}

impl Default for CacheTtl {
    fn default() -> Self {
        CacheTtl {
            person: 300,       // 5 minutes for person data
            concept: 600,      // 10 minutes for creative concepts
            project: 300,      // 5 minutes for project data
            document: 1800,    // 30 minutes for document data
            organization: 600, // 10 minutes for org data
        }
    }
}

/// Canonicalize one argument for cache-key purposes: lower-cased, whitespace
/// runs collapsed to underscores.
fn canon(arg: &str) -> String {
    arg.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Extract a relevant text snippet around the first occurrence of any query
/// term.
///
/// Returns a window of at most `snippet_length` characters centered on the
/// earliest matching term, with ellipses marking truncation.  When no term
/// matches, the content prefix is returned.
pub fn extract_snippet(content: &str, search_query: &str, snippet_length: usize) -> String {
    if content.is_empty() || search_query.is_empty() {
        return String::new();
    }

    let content_lower = content.to_lowercase();
    let query_lower = search_query.to_lowercase();

    let best_pos = query_lower
        .split_whitespace()
        .filter_map(|term| content_lower.find(term))
        .min();

    let pos = match best_pos {
        Some(pos) => pos,
        None => {
            // No terms found, return the beginning.
            return if content.len() > snippet_length {
                format!("{}...", truncate_at_boundary(content, snippet_length))
            } else {
                content.to_string()
            };
        }
    };

    let start = pos.saturating_sub(snippet_length / 2);
    let start = floor_char_boundary(content, start);
    let end = floor_char_boundary(content, (start + snippet_length).min(content.len()));

    let mut snippet = content[start..end].to_string();
    if start > 0 {
        snippet = format!("...{}", snippet);
    }
    if end < content.len() {
        snippet = format!("{}...", snippet);
    }
    snippet
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn truncate_at_boundary(s: &str, idx: usize) -> &str {
    &s[..floor_char_boundary(s, idx)]
}

fn req_str(args: &Value, key: &str) -> Result<String, String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("Missing required argument: {}", key))
}

fn opt_str(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_string)
}

/// The knowledge-graph tool family.
///
/// Holds the graph connection, the optional CRM client for hybrid live queries,
/// and the optional result cache.  All tools degrade gracefully when the cache
/// or CRM is absent.
pub struct GraphToolSet {
    graph: Arc<dyn GraphClient>,
    crm: Option<Arc<dyn CrmClient>>,
    cache: Option<Arc<dyn KvCache>>,
    ttl: CacheTtl,
}

impl GraphToolSet {
    pub fn new(graph: Arc<dyn GraphClient>) -> Self {
        GraphToolSet {
            graph,
            crm: None,
            cache: None,
            ttl: CacheTtl::default(),
        }
    }

    /// Attach a live CRM client for hybrid enrichment (builder pattern).
    pub fn with_crm(mut self, crm: Arc<dyn CrmClient>) -> Self {
        self.crm = Some(crm);
        self
    }

    /// Attach a read-through result cache (builder pattern).
    pub fn with_cache(mut self, cache: Arc<dyn KvCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Override the TTL table (builder pattern).
    pub fn with_ttl(mut self, ttl: CacheTtl) -> Self {
        self.ttl = ttl;
        self
    }

    /// Cache read; errors log and read as misses.
    async fn cache_get(&self, key: &str) -> Option<Value> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(value) => value,
            Err(err) => {
                warn!("Cache retrieval failed for {}: {}", key, err);
                None
            }
        }
    }

    /// Fire-and-forget cache write; errors log and are dropped.
    fn cache_put(&self, key: &str, value: Value, ttl_secs: u64) {
        if let Some(cache) = self.cache.as_ref() {
            let cache = Arc::clone(cache);
            let key = key.to_string();
            tokio::spawn(async move {
                if let Err(err) = cache
                    .set_with_ttl(&key, value, Duration::from_secs(ttl_secs))
                    .await
                {
                    warn!("Cache storage failed for {}: {}", key, err);
                }
            });
        }
    }

    async fn run_graph(&self, query: &str, params: Value) -> Result<Vec<Value>, String> {
        self.graph
            .run(query, params)
            .await
            .map_err(|err| err.to_string())
    }

    // ==========================================================================
    // Category 1: People, companies & relationships (CRM focus)
    // ==========================================================================

    /// Comprehensive profile for a person: projects, organization, groups.
    pub async fn get_person_details(&self, name: &str) -> ToolResult {
        let cache_key = format!("person_details:{}", canon(name));
        if let Some(cached) = self.cache_get(&cache_key).await {
            return ToolResult::found(cached);
        }

        let query = "\
MATCH (p:Person)
WHERE p.name CONTAINS $name OR p.fullName CONTAINS $name
OPTIONAL MATCH (p)-[r:CONTRIBUTED_TO]->(proj:Project)
OPTIONAL MATCH (p)-[:WORKS_FOR]->(org:Organization)
OPTIONAL MATCH (p)-[:BELONGS_TO]->(g:Group)
RETURN p { .name, .fullName, .email, .role, .bio, .location } AS person,
       org.name AS organization,
       collect(DISTINCT { project: proj.name, role: r.role }) AS projects,
       collect(DISTINCT g.name) AS groups";

        match self.run_graph(query, json!({ "name": name })).await {
            Ok(rows) => match rows.into_iter().next() {
                Some(row) => {
                    let response = json!({
                        "person": row.get("person").cloned().unwrap_or(Value::Null),
                        "organization": row.get("organization").cloned().unwrap_or(Value::Null),
                        "projects": non_empty_array(row.get("projects"), "project"),
                        "groups": row.get("groups").cloned().unwrap_or_else(|| json!([])),
                        "query": name,
                    });
                    self.cache_put(&cache_key, response.clone(), self.ttl.person);
                    ToolResult::found(response)
                }
                None => ToolResult::not_found("Person not found in knowledge graph"),
            },
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    /// Everyone working at the named organization, with roles.
    pub async fn find_people_at_organization(&self, organization_name: &str) -> ToolResult {
        let cache_key = format!("org_people:{}", canon(organization_name));
        if let Some(cached) = self.cache_get(&cache_key).await {
            return ToolResult::found(cached);
        }

        let query = "\
MATCH (p:Person)-[:WORKS_FOR]->(org:Organization)
WHERE org.name CONTAINS $org_name
RETURN org.name AS organization,
       collect({ name: p.name, role: p.role, email: p.email }) AS people";

        match self
            .run_graph(query, json!({ "org_name": organization_name }))
            .await
        {
            Ok(rows) => match rows.into_iter().next() {
                Some(row) => {
                    let response = json!({
                        "organization": row.get("organization").cloned().unwrap_or(Value::Null),
                        "people": row.get("people").cloned().unwrap_or_else(|| json!([])),
                        "query": organization_name,
                    });
                    self.cache_put(&cache_key, response.clone(), self.ttl.organization);
                    ToolResult::found(response)
                }
                None => ToolResult::not_found("No people found at that organization"),
            },
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    /// Who sourced a deal, with deal context.
    pub async fn get_deal_sourcer(&self, deal_name: &str) -> ToolResult {
        let query = "\
MATCH (sourcer:Person)-[:SOURCED]->(d:Deal)
WHERE d.name CONTAINS $deal_name
OPTIONAL MATCH (d)-[:FOR_ORGANIZATION]->(org:Organization)
RETURN d { .name, .status, .value } AS deal,
       sourcer.name AS sourced_by,
       org.name AS organization";

        match self.run_graph(query, json!({ "deal_name": deal_name })).await {
            Ok(rows) => match rows.into_iter().next() {
                Some(row) => ToolResult::found(json!({
                    "deal": row.get("deal").cloned().unwrap_or(Value::Null),
                    "sourced_by": row.get("sourced_by").cloned().unwrap_or(Value::Null),
                    "organization": row.get("organization").cloned().unwrap_or(Value::Null),
                })),
                None => ToolResult::not_found("Deal not found in knowledge graph"),
            },
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    /// Deal details with hybrid graph + live CRM status.
    ///
    /// The graph answer is authoritative; CRM enrichment is best-effort and the
    /// `data_freshness` field records which path produced the result.
    pub async fn get_deal_live_status(&self, deal_name: &str) -> ToolResult {
        let query = "\
MATCH (sourcer:Person)-[:SOURCED]->(d:Deal)
WHERE d.name CONTAINS $deal_name
OPTIONAL MATCH (d)-[:WITH_CONTACT]->(contact:Person)
OPTIONAL MATCH (d)-[:FOR_ORGANIZATION]->(org:Organization)
RETURN d { .name, .status, .value, .currency, .crmId, .probability } AS deal,
       sourcer.name AS sourced_by,
       collect(contact.name) AS contacts,
       org.name AS organization";

        let rows = match self.run_graph(query, json!({ "deal_name": deal_name })).await {
            Ok(rows) => rows,
            Err(err) => return ToolResult::failure(format!("Query failed: {}", err)),
        };

        let row = match rows.into_iter().next() {
            Some(row) => row,
            None => return ToolResult::not_found("Deal not found in knowledge graph"),
        };

        let deal = row.get("deal").cloned().unwrap_or(Value::Null);
        let mut response = json!({
            "deal": deal,
            "sourced_by": row.get("sourced_by").cloned().unwrap_or(Value::Null),
            "contacts": row.get("contacts").cloned().unwrap_or_else(|| json!([])),
            "organization": row.get("organization").cloned().unwrap_or(Value::Null),
            "data_freshness": "graph_only",
        });

        // Enrich with live CRM data when the deal is linked and a client is
        // configured.
        let crm_id = response["deal"]
            .get("crmId")
            .and_then(Value::as_str)
            .map(str::to_string);
        if let (Some(crm_id), Some(crm)) = (crm_id, self.crm.as_ref()) {
            match crm.get_deal_status(&crm_id).await {
                Ok(live_status) => {
                    response["live_status"] = live_status;
                    response["data_freshness"] = json!("live_api_enhanced");
                }
                Err(api_error) => {
                    warn!("CRM enrichment failed: {}", api_error);
                    response["live_status"] = json!("api_unavailable");
                }
            }
        }

        ToolResult::found(response)
    }

    /// People who have worked with the named person, optionally narrowed to a
    /// project type.
    pub async fn find_collaborators(&self, person_name: &str, project_type: Option<&str>) -> ToolResult {
        let cache_key = format!(
            "collaborators:{}:{}",
            canon(person_name),
            project_type.map(canon).unwrap_or_else(|| "all".to_string())
        );
        if let Some(cached) = self.cache_get(&cache_key).await {
            return ToolResult::found(cached);
        }

        let query = "\
MATCH (p:Person)-[:CONTRIBUTED_TO]->(proj:Project)<-[:CONTRIBUTED_TO]-(collab:Person)
WHERE p.name CONTAINS $name AND collab.name <> p.name
  AND ($project_type IS NULL OR proj.type = $project_type)
RETURN collab.name AS collaborator,
       collect(DISTINCT proj.name) AS shared_projects,
       count(DISTINCT proj) AS project_count
ORDER BY project_count DESC";

        match self
            .run_graph(
                query,
                json!({ "name": person_name, "project_type": project_type }),
            )
            .await
        {
            Ok(rows) => {
                if rows.is_empty() {
                    return ToolResult::not_found("No collaborators found for that person");
                }
                let response = json!({
                    "person": person_name,
                    "collaborators": rows,
                    "project_type": project_type,
                });
                self.cache_put(&cache_key, response.clone(), self.ttl.person);
                ToolResult::found(response)
            }
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    /// Organization profile: people, projects, relationship summary.
    pub async fn get_organization_profile(&self, org_name: &str) -> ToolResult {
        let cache_key = format!("org_profile:{}", canon(org_name));
        if let Some(cached) = self.cache_get(&cache_key).await {
            return ToolResult::found(cached);
        }

        let query = "\
MATCH (org:Organization)
WHERE org.name CONTAINS $org_name
OPTIONAL MATCH (p:Person)-[:WORKS_FOR]->(org)
OPTIONAL MATCH (proj:Project)-[:FOR_CLIENT]->(org)
RETURN org { .name, .industry, .website, .tier } AS organization,
       collect(DISTINCT p.name) AS people,
       collect(DISTINCT proj.name) AS projects";

        match self.run_graph(query, json!({ "org_name": org_name })).await {
            Ok(rows) => match rows.into_iter().next() {
                Some(row) => {
                    let response = json!({
                        "organization": row.get("organization").cloned().unwrap_or(Value::Null),
                        "people": row.get("people").cloned().unwrap_or_else(|| json!([])),
                        "projects": row.get("projects").cloned().unwrap_or_else(|| json!([])),
                        "query": org_name,
                    });
                    self.cache_put(&cache_key, response.clone(), self.ttl.organization);
                    ToolResult::found(response)
                }
                None => ToolResult::not_found("Organization not found in knowledge graph"),
            },
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    /// N-degree network connections of a person.
    pub async fn get_network_connections(&self, person_name: &str, degrees: u32) -> ToolResult {
        let degrees = degrees.clamp(1, 3);
        let cache_key = format!("network:{}:deg_{}", canon(person_name), degrees);
        if let Some(cached) = self.cache_get(&cache_key).await {
            return ToolResult::found(cached);
        }

        let query = format!(
            "\
MATCH (p:Person)-[:CONTRIBUTED_TO|WORKS_FOR*1..{}]-(connected:Person)
WHERE p.name CONTAINS $name AND connected.name <> p.name
RETURN DISTINCT connected.name AS name, connected.role AS role
LIMIT 50",
            degrees * 2
        );

        match self.run_graph(&query, json!({ "name": person_name })).await {
            Ok(rows) => {
                if rows.is_empty() {
                    return ToolResult::not_found("No network connections found");
                }
                let response = json!({
                    "person": person_name,
                    "degrees": degrees,
                    "connections": rows,
                });
                self.cache_put(&cache_key, response.clone(), self.ttl.person);
                ToolResult::found(response)
            }
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    // ==========================================================================
    // Category 2: Projects & creative DNA (production focus)
    // ==========================================================================

    /// Full project record: client, team, concepts, vendors.
    pub async fn get_project_details(&self, project_title: &str) -> ToolResult {
        let cache_key = format!("project_details:{}", canon(project_title));
        if let Some(cached) = self.cache_get(&cache_key).await {
            return ToolResult::found(cached);
        }

        let query = "\
MATCH (proj:Project)
WHERE proj.name CONTAINS $title
OPTIONAL MATCH (proj)-[:FOR_CLIENT]->(client:Organization)
OPTIONAL MATCH (p:Person)-[r:CONTRIBUTED_TO]->(proj)
OPTIONAL MATCH (proj)-[:FEATURES_CONCEPT]->(c:Concept)
RETURN proj { .name, .type, .status, .year, .logline } AS project,
       client.name AS client,
       collect(DISTINCT { name: p.name, role: r.role }) AS team,
       collect(DISTINCT c.name) AS concepts";

        match self.run_graph(query, json!({ "title": project_title })).await {
            Ok(rows) => match rows.into_iter().next() {
                Some(row) => {
                    let response = json!({
                        "project": row.get("project").cloned().unwrap_or(Value::Null),
                        "client": row.get("client").cloned().unwrap_or(Value::Null),
                        "team": non_empty_array(row.get("team"), "name"),
                        "concepts": row.get("concepts").cloned().unwrap_or_else(|| json!([])),
                        "query": project_title,
                    });
                    self.cache_put(&cache_key, response.clone(), self.ttl.project);
                    ToolResult::found(response)
                }
                None => ToolResult::not_found("Project not found in knowledge graph"),
            },
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    /// Projects featuring a creative concept, optionally including related
    /// concepts one hop out.
    pub async fn find_projects_by_concept(
        &self,
        concept_name: &str,
        include_related: bool,
    ) -> ToolResult {
        let cache_key = format!(
            "projects_by_concept:{}:{}",
            canon(concept_name),
            include_related
        );
        if let Some(cached) = self.cache_get(&cache_key).await {
            return ToolResult::found(cached);
        }

        let query = if include_related {
            "\
MATCH (c:Concept)
WHERE c.name CONTAINS $concept
OPTIONAL MATCH (c)-[:RELATED_TO]-(rel:Concept)
WITH collect(c) + collect(rel) AS concepts
UNWIND concepts AS concept
MATCH (proj:Project)-[:FEATURES_CONCEPT]->(concept)
RETURN DISTINCT proj.name AS project, proj.type AS type, proj.year AS year,
       collect(DISTINCT concept.name) AS matched_concepts"
        } else {
            "\
MATCH (proj:Project)-[:FEATURES_CONCEPT]->(c:Concept)
WHERE c.name CONTAINS $concept
RETURN DISTINCT proj.name AS project, proj.type AS type, proj.year AS year,
       collect(DISTINCT c.name) AS matched_concepts"
        };

        match self.run_graph(query, json!({ "concept": concept_name })).await {
            Ok(rows) => {
                if rows.is_empty() {
                    return ToolResult::not_found("No projects found for that concept");
                }
                let response = json!({
                    "concept": concept_name,
                    "include_related": include_related,
                    "projects": rows,
                });
                self.cache_put(&cache_key, response.clone(), self.ttl.concept);
                ToolResult::found(response)
            }
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    /// Contributors in a given role across a client's projects.
    pub async fn find_contributors_on_client_projects(
        &self,
        role: &str,
        client_name: &str,
    ) -> ToolResult {
        let query = "\
MATCH (p:Person)-[r:CONTRIBUTED_TO]->(proj:Project)-[:FOR_CLIENT]->(org:Organization)
WHERE org.name CONTAINS $client AND toLower(r.role) CONTAINS toLower($role)
RETURN p.name AS name, r.role AS role,
       collect(DISTINCT proj.name) AS projects";

        match self
            .run_graph(query, json!({ "client": client_name, "role": role }))
            .await
        {
            Ok(rows) => {
                if rows.is_empty() {
                    return ToolResult::not_found(
                        "No contributors found for that client and role",
                    );
                }
                ToolResult::found(json!({
                    "client": client_name,
                    "role": role,
                    "contributors": rows,
                }))
            }
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    /// Vendors attached to a project.
    pub async fn get_project_vendors(&self, project_title: &str) -> ToolResult {
        let query = "\
MATCH (proj:Project)-[:USED_VENDOR]->(v:Organization)
WHERE proj.name CONTAINS $title
RETURN v.name AS vendor, v.service AS service";

        match self.run_graph(query, json!({ "title": project_title })).await {
            Ok(rows) => {
                if rows.is_empty() {
                    return ToolResult::not_found("No vendors found for that project");
                }
                ToolResult::found(json!({
                    "project": project_title,
                    "vendors": rows,
                }))
            }
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    /// Projects similar to the named one by shared concepts.
    pub async fn find_similar_projects(
        &self,
        project_title: &str,
        similarity_threshold: f64,
    ) -> ToolResult {
        let cache_key = format!(
            "similar_projects:{}:{}",
            canon(project_title),
            similarity_threshold
        );
        if let Some(cached) = self.cache_get(&cache_key).await {
            return ToolResult::found(cached);
        }

        let query = "\
MATCH (proj:Project)-[:FEATURES_CONCEPT]->(c:Concept)<-[:FEATURES_CONCEPT]-(other:Project)
WHERE proj.name CONTAINS $title AND other.name <> proj.name
WITH other, count(c) AS shared, collect(c.name) AS shared_concepts
RETURN other.name AS project, shared, shared_concepts
ORDER BY shared DESC
LIMIT 10";

        match self.run_graph(query, json!({ "title": project_title })).await {
            Ok(rows) => {
                if rows.is_empty() {
                    return ToolResult::not_found("No similar projects found");
                }
                let response = json!({
                    "project": project_title,
                    "similarity_threshold": similarity_threshold,
                    "similar_projects": rows,
                });
                self.cache_put(&cache_key, response.clone(), self.ttl.project);
                ToolResult::found(response)
            }
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    /// Full team roster of a project, by department.
    pub async fn get_project_team_details(&self, project_title: &str) -> ToolResult {
        let cache_key = format!("project_team:{}", canon(project_title));
        if let Some(cached) = self.cache_get(&cache_key).await {
            return ToolResult::found(cached);
        }

        let query = "\
MATCH (p:Person)-[r:CONTRIBUTED_TO]->(proj:Project)
WHERE proj.name CONTAINS $title
RETURN proj.name AS project,
       collect({ name: p.name, role: r.role, department: r.department }) AS team";

        match self.run_graph(query, json!({ "title": project_title })).await {
            Ok(rows) => match rows.into_iter().next() {
                Some(row) => {
                    let response = json!({
                        "project": row.get("project").cloned().unwrap_or(Value::Null),
                        "team": row.get("team").cloned().unwrap_or_else(|| json!([])),
                    });
                    self.cache_put(&cache_key, response.clone(), self.ttl.project);
                    ToolResult::found(response)
                }
                None => ToolResult::not_found("Project team not found"),
            },
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    /// Creative concepts featured by a project.
    pub async fn get_creative_concepts_for_project(&self, project_title: &str) -> ToolResult {
        let cache_key = format!("project_concepts:{}", canon(project_title));
        if let Some(cached) = self.cache_get(&cache_key).await {
            return ToolResult::found(cached);
        }

        let query = "\
MATCH (proj:Project)-[:FEATURES_CONCEPT]->(c:Concept)
WHERE proj.name CONTAINS $title
RETURN c.name AS concept, c.medium AS medium, c.description AS description";

        match self.run_graph(query, json!({ "title": project_title })).await {
            Ok(rows) => {
                if rows.is_empty() {
                    return ToolResult::not_found("No creative concepts found for that project");
                }
                let response = json!({
                    "project": project_title,
                    "concepts": rows,
                });
                self.cache_put(&cache_key, response.clone(), self.ttl.concept);
                ToolResult::found(response)
            }
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    /// Reference works for a creative concept, optionally narrowed by medium.
    pub async fn find_creative_references(
        &self,
        concept_name: &str,
        medium: Option<&str>,
    ) -> ToolResult {
        let cache_key = format!(
            "creative_refs:{}:{}",
            canon(concept_name),
            medium.map(canon).unwrap_or_else(|| "all".to_string())
        );
        if let Some(cached) = self.cache_get(&cache_key).await {
            return ToolResult::found(cached);
        }

        let query = "\
MATCH (c:Concept)-[:REFERENCES]->(ref:Reference)
WHERE c.name CONTAINS $concept
  AND ($medium IS NULL OR ref.medium = $medium)
RETURN ref.title AS title, ref.medium AS medium, ref.creator AS creator";

        match self
            .run_graph(query, json!({ "concept": concept_name, "medium": medium }))
            .await
        {
            Ok(rows) => {
                if rows.is_empty() {
                    return ToolResult::not_found("No creative references found");
                }
                let response = json!({
                    "concept": concept_name,
                    "medium": medium,
                    "references": rows,
                });
                self.cache_put(&cache_key, response.clone(), self.ttl.concept);
                ToolResult::found(response)
            }
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    /// Multi-criteria project search over type, year range, and client.
    pub async fn search_projects_by_criteria(&self, criteria: &Value) -> ToolResult {
        let cache_key = format!("project_search:{}", canon(&criteria.to_string()));
        if let Some(cached) = self.cache_get(&cache_key).await {
            return ToolResult::found(cached);
        }

        let query = "\
MATCH (proj:Project)
OPTIONAL MATCH (proj)-[:FOR_CLIENT]->(client:Organization)
WHERE ($type IS NULL OR proj.type = $type)
  AND ($year_from IS NULL OR proj.year >= $year_from)
  AND ($year_to IS NULL OR proj.year <= $year_to)
  AND ($client IS NULL OR client.name CONTAINS $client)
RETURN proj.name AS project, proj.type AS type, proj.year AS year,
       client.name AS client
LIMIT 25";

        let params = json!({
            "type": criteria.get("type").cloned().unwrap_or(Value::Null),
            "year_from": criteria.get("year_from").cloned().unwrap_or(Value::Null),
            "year_to": criteria.get("year_to").cloned().unwrap_or(Value::Null),
            "client": criteria.get("client").cloned().unwrap_or(Value::Null),
        });

        match self.run_graph(query, params).await {
            Ok(rows) => {
                if rows.is_empty() {
                    return ToolResult::not_found("No projects matched the criteria");
                }
                let response = json!({
                    "criteria": criteria,
                    "projects": rows,
                });
                self.cache_put(&cache_key, response.clone(), self.ttl.project);
                ToolResult::found(response)
            }
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    /// Aggregate insight extraction for a project (budget, timeline, team).
    pub async fn extract_project_insights(
        &self,
        project_title: &str,
        insight_type: &str,
    ) -> ToolResult {
        let cache_key = format!(
            "project_insights:{}:{}",
            canon(project_title),
            canon(insight_type)
        );
        if let Some(cached) = self.cache_get(&cache_key).await {
            return ToolResult::found(cached);
        }

        let query = "\
MATCH (proj:Project)
WHERE proj.name CONTAINS $title
OPTIONAL MATCH (p:Person)-[r:CONTRIBUTED_TO]->(proj)
OPTIONAL MATCH (proj)-[:USED_VENDOR]->(v:Organization)
RETURN proj { .name, .type, .status, .year } AS project,
       count(DISTINCT p) AS team_size,
       count(DISTINCT v) AS vendor_count,
       collect(DISTINCT r.department) AS departments";

        match self.run_graph(query, json!({ "title": project_title })).await {
            Ok(rows) => match rows.into_iter().next() {
                Some(row) => {
                    let response = json!({
                        "project": row.get("project").cloned().unwrap_or(Value::Null),
                        "insight_type": insight_type,
                        "team_size": row.get("team_size").cloned().unwrap_or(json!(0)),
                        "vendor_count": row.get("vendor_count").cloned().unwrap_or(json!(0)),
                        "departments": row.get("departments").cloned().unwrap_or_else(|| json!([])),
                    });
                    self.cache_put(&cache_key, response.clone(), self.ttl.project);
                    ToolResult::found(response)
                }
                None => ToolResult::not_found("Project not found in knowledge graph"),
            },
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    // ==========================================================================
    // Category 3: Documents & content
    // ==========================================================================

    /// Documents attached to a project.
    pub async fn find_documents_for_project(&self, project_title: &str) -> ToolResult {
        let query = "\
MATCH (d:Document)-[:ABOUT_PROJECT]->(proj:Project)
WHERE proj.name CONTAINS $title
RETURN d.id AS id, d.title AS title, d.type AS type, d.createdAt AS created_at";

        match self.run_graph(query, json!({ "title": project_title })).await {
            Ok(rows) => {
                if rows.is_empty() {
                    return ToolResult::not_found("No documents found for that project");
                }
                ToolResult::found(json!({
                    "project": project_title,
                    "documents": rows,
                }))
            }
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    /// Profile metadata for a document (authors, linked entities).
    pub async fn get_document_profile_details(&self, document_title: &str) -> ToolResult {
        let query = "\
MATCH (d:Document)
WHERE d.title CONTAINS $title
OPTIONAL MATCH (d)-[:AUTHORED_BY]->(author:Person)
OPTIONAL MATCH (d)-[:ABOUT_PROJECT]->(proj:Project)
RETURN d { .id, .title, .type, .summary } AS document,
       collect(DISTINCT author.name) AS authors,
       collect(DISTINCT proj.name) AS projects";

        match self.run_graph(query, json!({ "title": document_title })).await {
            Ok(rows) => match rows.into_iter().next() {
                Some(row) => ToolResult::found(json!({
                    "document": row.get("document").cloned().unwrap_or(Value::Null),
                    "authors": row.get("authors").cloned().unwrap_or_else(|| json!([])),
                    "projects": row.get("projects").cloned().unwrap_or_else(|| json!([])),
                })),
                None => ToolResult::not_found("Document not found in knowledge graph"),
            },
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    /// Full-text search across document bodies, with contextual snippets.
    pub async fn search_documents_full_text(&self, search_query: &str) -> ToolResult {
        let cache_key = format!("doc_fulltext:{}", canon(search_query));
        if let Some(cached) = self.cache_get(&cache_key).await {
            return ToolResult::found(cached);
        }

        let query = "\
CALL db.index.fulltext.queryNodes('documentContent', $q)
YIELD node, score
RETURN node.id AS id, node.title AS title, node.content AS content, score
ORDER BY score DESC
LIMIT 10";

        match self.run_graph(query, json!({ "q": search_query })).await {
            Ok(rows) => {
                if rows.is_empty() {
                    return ToolResult::not_found("No documents matched the search");
                }
                let hits: Vec<Value> = rows
                    .iter()
                    .map(|row| {
                        let content = row.get("content").and_then(Value::as_str).unwrap_or("");
                        json!({
                            "id": row.get("id").cloned().unwrap_or(Value::Null),
                            "title": row.get("title").cloned().unwrap_or(Value::Null),
                            "score": row.get("score").cloned().unwrap_or(Value::Null),
                            "snippet": extract_snippet(content, search_query, 200),
                        })
                    })
                    .collect();
                let response = json!({
                    "query": search_query,
                    "results": hits,
                });
                self.cache_put(&cache_key, response.clone(), self.ttl.document);
                ToolResult::found(response)
            }
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    /// Content search narrowed by document type, with snippets.
    pub async fn search_documents_by_content(
        &self,
        search_query: &str,
        doc_type: Option<&str>,
    ) -> ToolResult {
        let cache_key = format!(
            "doc_search:{}:{}",
            canon(search_query),
            doc_type.map(canon).unwrap_or_else(|| "all".to_string())
        );
        if let Some(cached) = self.cache_get(&cache_key).await {
            return ToolResult::found(cached);
        }

        let query = "\
MATCH (d:Document)
WHERE toLower(d.content) CONTAINS toLower($q)
  AND ($doc_type IS NULL OR d.type = $doc_type)
RETURN d.id AS id, d.title AS title, d.type AS type, d.content AS content
LIMIT 10";

        match self
            .run_graph(query, json!({ "q": search_query, "doc_type": doc_type }))
            .await
        {
            Ok(rows) => {
                if rows.is_empty() {
                    return ToolResult::not_found("No documents matched the content search");
                }
                let hits: Vec<Value> = rows
                    .iter()
                    .map(|row| {
                        let content = row.get("content").and_then(Value::as_str).unwrap_or("");
                        json!({
                            "id": row.get("id").cloned().unwrap_or(Value::Null),
                            "title": row.get("title").cloned().unwrap_or(Value::Null),
                            "type": row.get("type").cloned().unwrap_or(Value::Null),
                            "snippet": extract_snippet(content, search_query, 200),
                        })
                    })
                    .collect();
                let response = json!({
                    "query": search_query,
                    "doc_type": doc_type,
                    "results": hits,
                });
                self.cache_put(&cache_key, response.clone(), self.ttl.document);
                ToolResult::found(response)
            }
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }

    /// Direct document fetch by id.
    pub async fn get_document_by_id(&self, document_id: &str) -> ToolResult {
        let cache_key = format!("doc_by_id:{}", canon(document_id));
        if let Some(cached) = self.cache_get(&cache_key).await {
            return ToolResult::found(cached);
        }

        let query = "\
MATCH (d:Document { id: $id })
RETURN d { .id, .title, .type, .content, .summary } AS document";

        match self.run_graph(query, json!({ "id": document_id })).await {
            Ok(rows) => match rows.into_iter().next() {
                Some(row) => {
                    let response = json!({
                        "document": row.get("document").cloned().unwrap_or(Value::Null),
                    });
                    self.cache_put(&cache_key, response.clone(), self.ttl.document);
                    ToolResult::found(response)
                }
                None => ToolResult::not_found("Document not found in knowledge graph"),
            },
            Err(err) => ToolResult::failure(format!("Query failed: {}", err)),
        }
    }
}

/// Drop null-keyed placeholder rows that `collect()` produces on optional
/// matches.
fn non_empty_array(value: Option<&Value>, required_key: &str) -> Value {
    match value {
        Some(Value::Array(items)) => Value::Array(
            items
                .iter()
                .filter(|item| {
                    item.get(required_key)
                        .map(|v| !v.is_null())
                        .unwrap_or(false)
                })
                .cloned()
                .collect(),
        ),
        _ => json!([]),
    }
}

#[async_trait]
impl ToolExecutor for GraphToolSet {
    async fn execute(
        &self,
        tool_name: &str,
        arguments: Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        let result = match tool_name {
            "get_person_details" => match req_str(&arguments, "name") {
                Ok(name) => self.get_person_details(&name).await,
                Err(err) => ToolResult::failure(err),
            },
            "find_people_at_organization" => match req_str(&arguments, "organization_name") {
                Ok(org) => self.find_people_at_organization(&org).await,
                Err(err) => ToolResult::failure(err),
            },
            "get_deal_sourcer" => match req_str(&arguments, "deal_name") {
                Ok(deal) => self.get_deal_sourcer(&deal).await,
                Err(err) => ToolResult::failure(err),
            },
            "get_deal_live_status" => match req_str(&arguments, "deal_name") {
                Ok(deal) => self.get_deal_live_status(&deal).await,
                Err(err) => ToolResult::failure(err),
            },
            "find_collaborators" => match req_str(&arguments, "person_name") {
                Ok(name) => {
                    self.find_collaborators(&name, opt_str(&arguments, "project_type").as_deref())
                        .await
                }
                Err(err) => ToolResult::failure(err),
            },
            "get_organization_profile" => match req_str(&arguments, "org_name") {
                Ok(org) => self.get_organization_profile(&org).await,
                Err(err) => ToolResult::failure(err),
            },
            "get_network_connections" => match req_str(&arguments, "person_name") {
                Ok(name) => {
                    let degrees = arguments
                        .get("degrees")
                        .and_then(Value::as_u64)
                        .unwrap_or(2) as u32;
                    self.get_network_connections(&name, degrees).await
                }
                Err(err) => ToolResult::failure(err),
            },
            "get_project_details" => match req_str(&arguments, "project_title") {
                Ok(title) => self.get_project_details(&title).await,
                Err(err) => ToolResult::failure(err),
            },
            "find_projects_by_concept" => match req_str(&arguments, "concept_name") {
                Ok(concept) => {
                    let include_related = arguments
                        .get("include_related")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    self.find_projects_by_concept(&concept, include_related).await
                }
                Err(err) => ToolResult::failure(err),
            },
            "find_contributors_on_client_projects" => {
                match (req_str(&arguments, "role"), req_str(&arguments, "client_name")) {
                    (Ok(role), Ok(client)) => {
                        self.find_contributors_on_client_projects(&role, &client).await
                    }
                    (Err(err), _) | (_, Err(err)) => ToolResult::failure(err),
                }
            }
            "get_project_vendors" => match req_str(&arguments, "project_title") {
                Ok(title) => self.get_project_vendors(&title).await,
                Err(err) => ToolResult::failure(err),
            },
            "find_similar_projects" => match req_str(&arguments, "project_title") {
                Ok(title) => {
                    let threshold = arguments
                        .get("similarity_threshold")
                        .and_then(Value::as_f64)
                        .unwrap_or(0.8);
                    self.find_similar_projects(&title, threshold).await
                }
                Err(err) => ToolResult::failure(err),
            },
            "get_project_team_details" => match req_str(&arguments, "project_title") {
                Ok(title) => self.get_project_team_details(&title).await,
                Err(err) => ToolResult::failure(err),
            },
            "get_creative_concepts_for_project" => match req_str(&arguments, "project_title") {
                Ok(title) => self.get_creative_concepts_for_project(&title).await,
                Err(err) => ToolResult::failure(err),
            },
            "find_creative_references" => match req_str(&arguments, "concept_name") {
                Ok(concept) => {
                    self.find_creative_references(&concept, opt_str(&arguments, "medium").as_deref())
                        .await
                }
                Err(err) => ToolResult::failure(err),
            },
            "search_projects_by_criteria" => {
                let criteria = arguments
                    .get("criteria")
                    .cloned()
                    .unwrap_or_else(|| arguments.clone());
                self.search_projects_by_criteria(&criteria).await
            }
            "extract_project_insights" => {
                match (
                    req_str(&arguments, "project_title"),
                    req_str(&arguments, "insight_type"),
                ) {
                    (Ok(title), Ok(insight)) => {
                        self.extract_project_insights(&title, &insight).await
                    }
                    (Err(err), _) | (_, Err(err)) => ToolResult::failure(err),
                }
            }
            "find_documents_for_project" => match req_str(&arguments, "project_title") {
                Ok(title) => self.find_documents_for_project(&title).await,
                Err(err) => ToolResult::failure(err),
            },
            "get_document_profile_details" => match req_str(&arguments, "document_title") {
                Ok(title) => self.get_document_profile_details(&title).await,
                Err(err) => ToolResult::failure(err),
            },
            "search_documents_full_text" => match req_str(&arguments, "search_query") {
                Ok(q) => self.search_documents_full_text(&q).await,
                Err(err) => ToolResult::failure(err),
            },
            "search_documents_by_content" => match req_str(&arguments, "search_query") {
                Ok(q) => {
                    self.search_documents_by_content(&q, opt_str(&arguments, "doc_type").as_deref())
                        .await
                }
                Err(err) => ToolResult::failure(err),
            },
            "get_document_by_id" => match req_str(&arguments, "document_id") {
                Ok(id) => self.get_document_by_id(&id).await,
                Err(err) => ToolResult::failure(err),
            },
            other => {
                return Err(format!("unknown graph tool: {}", other).into());
            }
        };

        Ok(result)
    }
}

fn string_param(name: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            name: { "type": "string", "description": description }
        },
        "required": [name]
    })
}

/// Register the full graph tool family into `registry`, all served by the same
/// [`GraphToolSet`].
pub fn register_graph_tools(registry: &mut ToolRegistry, tools: Arc<GraphToolSet>) {
    let ttl = tools.ttl;
    let person = Duration::from_secs(ttl.person);
    let concept = Duration::from_secs(ttl.concept);
    let project = Duration::from_secs(ttl.project);
    let document = Duration::from_secs(ttl.document);
    let organization = Duration::from_secs(ttl.organization);

    let entries: Vec<ToolSpec> = vec![
        // --- CRM / People ---
        ToolSpec::new(
            "get_person_details",
            "Get the full profile for a person: role, organization, projects they contributed to, and groups.",
            ToolCategory::CrmPeople,
        )
        .with_parameters(string_param("name", "Full or partial person name"))
        .with_cache_ttl(person)
        .with_sensitivity(DataSensitivity::Internal),
        ToolSpec::new(
            "find_people_at_organization",
            "List the people working at a named organization, with their roles and contact emails.",
            ToolCategory::CrmPeople,
        )
        .with_parameters(string_param("organization_name", "Organization name"))
        .with_cache_ttl(organization)
        .with_sensitivity(DataSensitivity::Internal),
        ToolSpec::new(
            "get_deal_sourcer",
            "Find who sourced a named deal and which organization the deal is with.",
            ToolCategory::CrmPeople,
        )
        .with_parameters(string_param("deal_name", "Deal name"))
        .with_cache_ttl(person)
        .with_sensitivity(DataSensitivity::Confidential),
        ToolSpec::new(
            "get_deal_live_status",
            "Get deal details enriched with live CRM status when available. Reports data_freshness.",
            ToolCategory::CrmPeople,
        )
        .with_parameters(string_param("deal_name", "Deal name"))
        .with_cache_ttl(person)
        .with_sensitivity(DataSensitivity::Confidential),
        ToolSpec::new(
            "find_collaborators",
            "Find people who have collaborated with a named person, optionally narrowed to a project type.",
            ToolCategory::CrmPeople,
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "person_name": { "type": "string", "description": "Person to find collaborators for" },
                "project_type": { "type": "string", "description": "Optional project type filter" }
            },
            "required": ["person_name"]
        }))
        .with_cache_ttl(person)
        .with_sensitivity(DataSensitivity::Internal),
        ToolSpec::new(
            "get_organization_profile",
            "Get an organization's profile: industry, people, and the projects delivered for it.",
            ToolCategory::CrmPeople,
        )
        .with_parameters(string_param("org_name", "Organization name"))
        .with_cache_ttl(organization)
        .with_sensitivity(DataSensitivity::Internal),
        ToolSpec::new(
            "get_network_connections",
            "Walk a person's professional network up to a number of degrees of separation.",
            ToolCategory::CrmPeople,
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "person_name": { "type": "string", "description": "Person at the center of the network" },
                "degrees": { "type": "integer", "description": "Degrees of separation, default 2" }
            },
            "required": ["person_name"]
        }))
        .with_cache_ttl(person)
        .with_sensitivity(DataSensitivity::Internal),
        // --- Projects / Creative ---
        ToolSpec::new(
            "get_project_details",
            "Get a project's full record: client, team roster, creative concepts, status.",
            ToolCategory::ProjectsCreative,
        )
        .with_parameters(string_param("project_title", "Project title"))
        .with_cache_ttl(project)
        .with_sensitivity(DataSensitivity::Internal),
        ToolSpec::new(
            "find_projects_by_concept",
            "Find projects that feature a creative concept, optionally including related concepts.",
            ToolCategory::ProjectsCreative,
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "concept_name": { "type": "string", "description": "Creative concept to search for" },
                "include_related": { "type": "boolean", "description": "Also match related concepts" }
            },
            "required": ["concept_name"]
        }))
        .with_cache_ttl(concept)
        .with_sensitivity(DataSensitivity::Internal),
        ToolSpec::new(
            "find_contributors_on_client_projects",
            "Find contributors in a given role across all projects delivered for a client.",
            ToolCategory::ProjectsCreative,
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "role": { "type": "string", "description": "Role to match, e.g. director" },
                "client_name": { "type": "string", "description": "Client organization name" }
            },
            "required": ["role", "client_name"]
        }))
        .with_cache_ttl(project)
        .with_sensitivity(DataSensitivity::Internal),
        ToolSpec::new(
            "get_project_vendors",
            "List the vendors used on a project and the services they provided.",
            ToolCategory::ProjectsCreative,
        )
        .with_parameters(string_param("project_title", "Project title"))
        .with_cache_ttl(project)
        .with_sensitivity(DataSensitivity::Internal),
        ToolSpec::new(
            "find_similar_projects",
            "Find projects similar to a named one by shared creative concepts.",
            ToolCategory::ProjectsCreative,
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "project_title": { "type": "string", "description": "Reference project title" },
                "similarity_threshold": { "type": "number", "description": "Minimum similarity, default 0.8" }
            },
            "required": ["project_title"]
        }))
        .with_cache_ttl(project)
        .with_sensitivity(DataSensitivity::Internal),
        ToolSpec::new(
            "get_project_team_details",
            "Get the full team roster of a project with roles and departments.",
            ToolCategory::ProjectsCreative,
        )
        .with_parameters(string_param("project_title", "Project title"))
        .with_cache_ttl(project)
        .with_sensitivity(DataSensitivity::Internal),
        ToolSpec::new(
            "get_creative_concepts_for_project",
            "List the creative concepts featured by a project.",
            ToolCategory::ProjectsCreative,
        )
        .with_parameters(string_param("project_title", "Project title"))
        .with_cache_ttl(concept)
        .with_sensitivity(DataSensitivity::Internal),
        ToolSpec::new(
            "find_creative_references",
            "Find reference works for a creative concept, optionally narrowed by medium.",
            ToolCategory::ProjectsCreative,
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "concept_name": { "type": "string", "description": "Creative concept" },
                "medium": { "type": "string", "description": "Optional medium filter, e.g. film" }
            },
            "required": ["concept_name"]
        }))
        .with_cache_ttl(concept)
        .with_sensitivity(DataSensitivity::Internal),
        ToolSpec::new(
            "search_projects_by_criteria",
            "Search projects by structured criteria: type, year range, client.",
            ToolCategory::ProjectsCreative,
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "type": { "type": "string", "description": "Project type, e.g. commercial" },
                "year_from": { "type": "integer", "description": "Earliest year" },
                "year_to": { "type": "integer", "description": "Latest year" },
                "client": { "type": "string", "description": "Client name filter" }
            }
        }))
        .with_cache_ttl(project)
        .with_sensitivity(DataSensitivity::Internal),
        ToolSpec::new(
            "extract_project_insights",
            "Extract aggregate insights for a project: team size, vendors, departments.",
            ToolCategory::ProjectsCreative,
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "project_title": { "type": "string", "description": "Project title" },
                "insight_type": { "type": "string", "description": "Insight focus, e.g. team, budget" }
            },
            "required": ["project_title", "insight_type"]
        }))
        .with_cache_ttl(project)
        .with_sensitivity(DataSensitivity::Confidential),
        // --- Documents / Content ---
        ToolSpec::new(
            "find_documents_for_project",
            "List the documents attached to a project.",
            ToolCategory::Documents,
        )
        .with_parameters(string_param("project_title", "Project title"))
        .with_cache_ttl(document)
        .with_sensitivity(DataSensitivity::Internal),
        ToolSpec::new(
            "get_document_profile_details",
            "Get a document's profile: authors and the projects it covers.",
            ToolCategory::Documents,
        )
        .with_parameters(string_param("document_title", "Document title"))
        .with_cache_ttl(document)
        .with_sensitivity(DataSensitivity::Internal),
        ToolSpec::new(
            "search_documents_full_text",
            "Full-text search over document bodies; returns hits with contextual snippets.",
            ToolCategory::Documents,
        )
        .with_parameters(string_param("search_query", "Search terms"))
        .with_cache_ttl(document)
        .with_sensitivity(DataSensitivity::Internal),
        ToolSpec::new(
            "search_documents_by_content",
            "Search document content, optionally narrowed by document type; returns snippets.",
            ToolCategory::Documents,
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "search_query": { "type": "string", "description": "Search terms" },
                "doc_type": { "type": "string", "description": "Optional document type filter" }
            },
            "required": ["search_query"]
        }))
        .with_cache_ttl(document)
        .with_sensitivity(DataSensitivity::Internal),
        ToolSpec::new(
            "get_document_by_id",
            "Fetch a document directly by its identifier.",
            ToolCategory::Documents,
        )
        .with_parameters(string_param("document_id", "Document id"))
        .with_cache_ttl(document)
        .with_sensitivity(DataSensitivity::Internal),
    ];

    for spec in entries {
        registry.register(spec, Arc::clone(&tools) as Arc<dyn ToolExecutor>);
    }
}

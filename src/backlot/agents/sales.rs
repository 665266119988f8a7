//! Sales intelligence agent behavior.
//!
//! The sales agent delegates tool selection entirely to the LLM: the bound
//! tool descriptions drive which graph lookups happen, so the analysis hook
//! only prepares neutral context instead of running keyword intent detection.

use crate::backlot::conversation::{AgentBehavior, AgentKind, TaskAnalysis};
use crate::backlot::identity::CallerIdentity;
use crate::backlot::prompts::PromptKind;
use crate::backlot::tool_protocol::ToolCategory;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;

/// Sales intelligence: lead profiles, deal attribution, org relationships.
pub struct SalesBehavior;

#[async_trait]
impl AgentBehavior for SalesBehavior {
    fn kind(&self) -> AgentKind {
        AgentKind::Sales
    }

    fn prompt_kind(&self) -> PromptKind {
        PromptKind::SalesIntelligence
    }

    fn tool_categories(&self) -> HashSet<ToolCategory> {
        let mut categories = HashSet::new();
        categories.insert(ToolCategory::CrmPeople);
        categories.insert(ToolCategory::ProjectsCreative);
        categories
    }

    async fn analyze_query(&self, query: &str, caller: &CallerIdentity) -> TaskAnalysis {
        // The LLM decides which tools to call from their descriptions; this
        // hook just records context for provenance.
        TaskAnalysis {
            intent: "sales_intelligence".to_string(),
            task_type: "general".to_string(),
            task_params: json!({
                "query": query,
                "user_role": caller.role.as_str(),
            }),
            requires_knowledge_graph: true,
            complexity: "moderate".to_string(),
        }
    }
}

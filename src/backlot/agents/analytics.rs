//! Leadership analytics agent behavior.
//!
//! Analytics queries get the high-quality provider: forecasting and
//! cross-domain analysis benefit from the stronger reasoning tier.

use crate::backlot::conversation::{AgentBehavior, AgentKind, TaskAnalysis};
use crate::backlot::identity::CallerIdentity;
use crate::backlot::prompts::PromptKind;
use crate::backlot::router::ProviderId;
use crate::backlot::tool_protocol::ToolCategory;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;

/// Leadership analytics: performance analysis, forecasting, document digging.
pub struct AnalyticsBehavior;

#[async_trait]
impl AgentBehavior for AnalyticsBehavior {
    fn kind(&self) -> AgentKind {
        AgentKind::Analytics
    }

    fn prompt_kind(&self) -> PromptKind {
        PromptKind::LeadershipAnalytics
    }

    fn tool_categories(&self) -> HashSet<ToolCategory> {
        let mut categories = HashSet::new();
        categories.insert(ToolCategory::Documents);
        categories.insert(ToolCategory::ProjectsCreative);
        categories.insert(ToolCategory::CrmPeople);
        categories
    }

    fn preferred_provider(&self) -> Option<ProviderId> {
        Some(ProviderId::OpenAI)
    }

    async fn analyze_query(&self, query: &str, caller: &CallerIdentity) -> TaskAnalysis {
        let query_lower = query.to_lowercase();

        let matches =
            |words: &[&str]| words.iter().any(|word| query_lower.contains(word));

        let intent = if matches(&["performance", "metrics", "kpi", "analyze"]) {
            "performance_analysis"
        } else if matches(&["forecast", "predict", "trend", "future"]) {
            "forecasting"
        } else if matches(&["document", "search", "find", "report"]) {
            "document_analysis"
        } else if matches(&["vendor", "cost", "budget", "expense"]) {
            "vendor_analysis"
        } else if matches(&["team", "talent", "crew", "staff"]) {
            "team_analysis"
        } else {
            "general"
        };

        let complexity = match intent {
            "forecasting" | "vendor_analysis" => "high",
            "general" => "simple",
            _ => "moderate",
        };

        TaskAnalysis {
            intent: intent.to_string(),
            task_type: intent.to_string(),
            task_params: if intent == "general" {
                serde_json::Value::Null
            } else {
                json!({
                    "query": query,
                    "user_role": caller.role.as_str(),
                })
            },
            requires_knowledge_graph: matches!(
                intent,
                "performance_analysis" | "document_analysis" | "vendor_analysis" | "team_analysis"
            ),
            complexity: complexity.to_string(),
        }
    }
}

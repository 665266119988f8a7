//! Talent acquisition agent behavior.

use crate::backlot::conversation::{AgentBehavior, AgentKind, TaskAnalysis};
use crate::backlot::identity::CallerIdentity;
use crate::backlot::prompts::PromptKind;
use crate::backlot::tool_protocol::ToolCategory;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;

/// Talent acquisition: crew search, skill assessment, project matching.
pub struct TalentBehavior;

#[async_trait]
impl AgentBehavior for TalentBehavior {
    fn kind(&self) -> AgentKind {
        AgentKind::Talent
    }

    fn prompt_kind(&self) -> PromptKind {
        PromptKind::TalentAcquisition
    }

    fn tool_categories(&self) -> HashSet<ToolCategory> {
        let mut categories = HashSet::new();
        categories.insert(ToolCategory::ProjectsCreative);
        categories.insert(ToolCategory::CrmPeople);
        categories
    }

    async fn analyze_query(&self, query: &str, caller: &CallerIdentity) -> TaskAnalysis {
        let query_lower = query.to_lowercase();

        let matches =
            |words: &[&str]| words.iter().any(|word| query_lower.contains(word));

        let intent = if matches(&["find", "search", "hire", "talent", "crew"]) {
            "talent_search"
        } else if matches(&["assess", "evaluate", "skill", "experience"]) {
            "skill_assessment"
        } else if matches(&["project", "cast", "crew", "team"]) {
            "project_matching"
        } else if matches(&["style", "concept", "creative", "genre"]) {
            "creative_matching"
        } else {
            "general"
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
                "talent_search" | "project_matching" | "creative_matching"
            ),
            complexity: if intent == "general" { "simple" } else { "moderate" }.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backlot::identity::{DataSensitivity, UserRole};

    fn caller() -> CallerIdentity {
        CallerIdentity::new("u1", UserRole::Director, DataSensitivity::Restricted)
    }

    #[tokio::test]
    async fn hiring_queries_classify_as_talent_search() {
        let analysis = TalentBehavior
            .analyze_query("Find crew for the Nike shoot", &caller())
            .await;
        assert_eq!(analysis.intent, "talent_search");
        assert!(analysis.requires_knowledge_graph);
    }

    #[tokio::test]
    async fn skill_queries_classify_as_assessment() {
        let analysis = TalentBehavior
            .analyze_query("Assess this editor's experience", &caller())
            .await;
        assert_eq!(analysis.intent, "skill_assessment");
        assert!(!analysis.requires_knowledge_graph);
    }

    #[tokio::test]
    async fn unmatched_queries_stay_general() {
        let analysis = TalentBehavior.analyze_query("Hello there", &caller()).await;
        assert_eq!(analysis.intent, "general");
        assert_eq!(analysis.complexity, "simple");
    }
}

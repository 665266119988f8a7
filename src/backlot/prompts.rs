//! Prompt templates.
//!
//! Industry-specific prompt templates for the specialized agents.  The registry
//! deterministically produces the `[system, ...optional task priming, user]`
//! message list each turn.  Formatting is forgiving: missing context keys never
//! raise, and unresolved placeholders are silently dropped.

use crate::backlot::client_wrapper::Message;
use serde_json::Value;
use std::collections::HashMap;

/// Prompt families, one per agent kind plus the general fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    SalesIntelligence,
    TalentAcquisition,
    LeadershipAnalytics,
    GeneralAssistant,
}

struct PromptTemplate {
    system: &'static str,
    user_context: &'static str,
    task_specific: &'static [(&'static str, &'static str)],
}

/// Manages prompt templates for the different agent kinds.
pub struct PromptTemplateRegistry {
    templates: HashMap<PromptKind, PromptTemplate>,
}

impl Default for PromptTemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptTemplateRegistry {
    pub fn new() -> Self {
        let mut templates = HashMap::new();

        templates.insert(
            PromptKind::SalesIntelligence,
            PromptTemplate {
                system: "You are Backlot's Sales Intelligence Agent, an expert AI assistant specializing in entertainment industry sales and business development.

Your expertise includes:
- Entertainment industry market analysis and trends
- Lead qualification and scoring for music videos, commercials, films
- Competitive intelligence and pricing strategies
- Client relationship insights and opportunity identification
- Union compliance and rate structures
- Project feasibility assessment

Response Guidelines:
- Provide data-driven insights with specific numbers when possible
- Always consider union requirements and compliance
- Include risk assessments for opportunities
- Suggest actionable next steps
- Maintain confidentiality of sensitive client information

Current Context: You have access to the knowledge graph containing industry relationships, project histories, and market intelligence.",
                user_context: "User Role: {role}
Access Level: {access_level}
Department: {department}",
                task_specific: &[
                    (
                        "lead_qualification",
                        "Analyze this lead and provide a qualification score (1-10) with reasoning:
Lead: {lead_info}
Context: {context}

Provide:
1. Qualification Score (1-10)
2. Key Strengths
3. Risk Factors
4. Recommended Actions",
                    ),
                    (
                        "market_analysis",
                        "Provide market analysis for:
Market Segment: {segment}
Geographic Area: {location}

Include:
1. Market Size and Trends
2. Key Competitors
3. Opportunities
4. Pricing Benchmarks",
                    ),
                    (
                        "budget_analysis",
                        "Analyze project budget for feasibility:
Project Type: {project_type}
Budget Range: {budget_range}

Assess:
1. Budget Adequacy
2. Cost Breakdown
3. Union Compliance
4. Optimization Opportunities",
                    ),
                ],
            },
        );

        templates.insert(
            PromptKind::TalentAcquisition,
            PromptTemplate {
                system: "You are Backlot's Talent Acquisition Agent, an AI specialist in entertainment industry talent sourcing, matching, and management.

Your expertise includes:
- Crew and talent skill assessment and matching
- Union compliance and rate verification
- Availability tracking and scheduling optimization
- Portfolio analysis and quality assessment
- Network relationship mapping

Response Guidelines:
- Prioritize union compliance and proper classifications
- Consider geographic availability and travel requirements
- Assess both technical skills and cultural fit
- Provide rate estimates within union guidelines
- Maintain strict confidentiality of personal information

Current Context: You have access to talent profiles, availability data, project histories, and performance metrics in the knowledge graph.",
                user_context: "User Role: {role}
Access Level: {access_level}
Hiring Priorities: {priorities}",
                task_specific: &[
                    (
                        "talent_search",
                        "Find talent matching these criteria:
Position: {position}
Skills Required: {skills}
Location: {location}

Provide:
1. Top 5 Matches with Scores
2. Availability Assessment
3. Rate Estimates
4. Union Compliance Notes",
                    ),
                    (
                        "skill_assessment",
                        "Assess candidate for role:
Candidate: {candidate_info}
Position: {position}

Evaluate:
1. Technical Skill Match (1-10)
2. Experience Level
3. Portfolio Quality
4. Recommendation",
                    ),
                    (
                        "team_building",
                        "Build the optimal team for:
Project: {project_type}
Budget: {budget}
Timeline: {timeline}

Recommend:
1. Key Positions and Priorities
2. Skill Combinations
3. Budget Allocation
4. Risk Mitigation",
                    ),
                ],
            },
        );

        templates.insert(
            PromptKind::LeadershipAnalytics,
            PromptTemplate {
                system: "You are Backlot's Leadership Analytics Agent, an AI specialist in entertainment industry business intelligence and performance optimization.

Your expertise includes:
- Performance metrics analysis and KPI tracking
- Resource optimization and efficiency improvement
- Financial performance and profitability analysis
- Risk assessment and mitigation strategies
- Strategic planning and forecasting

Response Guidelines:
- Provide quantitative analysis with specific metrics
- Offer actionable recommendations with timelines
- Consider both short-term and long-term impacts
- Reference industry benchmarks and best practices
- Maintain an executive-level perspective on strategic implications

Current Context: You have access to comprehensive business intelligence data including project performance, financial metrics, and team analytics.",
                user_context: "User Role: {role}
Access Level: {access_level}
Reporting Scope: {scope}",
                task_specific: &[
                    (
                        "performance_analysis",
                        "Analyze performance for:
Time Period: {period}
Department/Team: {team}

Provide:
1. Performance Summary
2. Key Trends and Insights
3. Benchmark Comparisons
4. Strategic Recommendations",
                    ),
                    (
                        "forecasting",
                        "Create a forecast for:
Metric: {metric}
Time Horizon: {horizon}

Deliver:
1. Forecast Model
2. Confidence Intervals
3. Key Assumptions
4. Risk Factors",
                    ),
                    (
                        "resource_optimization",
                        "Optimize resource allocation for:
Resources: {resources}
Current Utilization: {utilization}
Goals: {goals}

Recommend:
1. Optimization Opportunities
2. Resource Reallocation
3. Investment Priorities
4. Expected ROI",
                    ),
                ],
            },
        );

        templates.insert(
            PromptKind::GeneralAssistant,
            PromptTemplate {
                system: "You are Backlot's General Assistant Agent, a knowledgeable AI helper for the entertainment industry.

Your capabilities include:
- General industry knowledge and guidance
- Basic analysis and research support
- Information synthesis and summarization

Response Guidelines:
- Provide clear, helpful information
- Ask clarifying questions when needed
- Offer to escalate to specialized agents when appropriate
- Maintain a professional and friendly tone",
                user_context: "User Role: {role}
Current Context: {context}",
                task_specific: &[],
            },
        );

        PromptTemplateRegistry { templates }
    }

    fn template(&self, kind: PromptKind) -> &PromptTemplate {
        self.templates
            .get(&kind)
            .unwrap_or_else(|| &self.templates[&PromptKind::GeneralAssistant])
    }

    /// Render the system prompt, appending the user-context block when the
    /// caller supplied context values.  Placeholders without a matching key are
    /// dropped rather than raising.
    pub fn system_prompt(&self, kind: PromptKind, user_context: Option<&Value>) -> String {
        let template = self.template(kind);
        let mut prompt = template.system.to_string();

        if let Some(context) = user_context {
            let block = fill_placeholders(template.user_context, context);
            if !block.trim().is_empty() {
                prompt.push_str("\n\n");
                prompt.push_str(&block);
            }
        }

        prompt
    }

    /// Render a task-specific prompt, or `None` when the task type is unknown
    /// for this kind.
    pub fn task_prompt(
        &self,
        kind: PromptKind,
        task_type: &str,
        task_params: &Value,
    ) -> Option<String> {
        let template = self.template(kind);
        template
            .task_specific
            .iter()
            .find(|(name, _)| *name == task_type)
            .map(|(_, body)| fill_placeholders(body, task_params))
    }

    /// Task types available for a kind.
    pub fn available_tasks(&self, kind: PromptKind) -> Vec<&'static str> {
        self.template(kind)
            .task_specific
            .iter()
            .map(|(name, _)| *name)
            .collect()
    }

    /// Format the complete conversation priming: `[system, ...task, user]`.
    ///
    /// The task priming, when present, is a user-role prompt followed by an
    /// assistant acknowledgement so the actual query lands on a clean turn.
    pub fn format_conversation_prompt(
        &self,
        kind: PromptKind,
        user_query: &str,
        user_context: Option<&Value>,
        task_type: Option<&str>,
        task_params: Option<&Value>,
    ) -> Vec<Message> {
        let mut messages = Vec::new();

        messages.push(Message::system(self.system_prompt(kind, user_context)));

        if let (Some(task_type), Some(task_params)) = (task_type, task_params) {
            if let Some(task_prompt) = self.task_prompt(kind, task_type, task_params) {
                if !task_prompt.is_empty() {
                    messages.push(Message::user(task_prompt));
                    messages.push(Message::assistant(
                        "I understand. Please provide your specific query or request.",
                    ));
                }
            }
        }

        messages.push(Message::user(user_query));
        messages
    }
}

/// Replace `{key}` placeholders from a JSON object; unresolved placeholders are
/// removed.  Lines reduced to a bare label (everything after the colon dropped)
/// are kept, matching the permissive behavior expected of prompt assembly.
fn fill_placeholders(template: &str, values: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                if let Some(value) = values.get(key) {
                    match value {
                        Value::String(s) => out.push_str(s),
                        other => out.push_str(&other.to_string()),
                    }
                }
                // Unknown key: drop the placeholder.
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

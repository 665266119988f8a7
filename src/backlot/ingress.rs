//! Engine-facing ingress contracts.
//!
//! Transport framing (the actual WebSocket/HTTP servers) lives outside this
//! crate; this module defines the frame and request/response types those
//! servers exchange with the engine, plus the [`ChatService`] that stitches the
//! pipeline together: security filter first, then the supervisor, then the
//! direct-LLM and mock fallbacks.  Every response carries provenance in its
//! [`AgentInfo`].

use crate::backlot::client_wrapper::Message;
use crate::backlot::conversation::{AgentKind, ProcessingError};
use crate::backlot::identity::CallerIdentity;
use crate::backlot::router::{LLMRouter, LlmRequest};
use crate::backlot::security::{SecurityFilter, SecurityVerdict};
use crate::backlot::session::{SessionStore, StoredMessage};
use crate::backlot::supervisor::{RoutingInfo, Supervisor, SupervisorError};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Frames a client may send over the long-lived stream.
///
/// A connection starts unauthenticated; `user_message` is only accepted after
/// a valid `auth` frame produced a [`CallerIdentity`].
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum InboundFrame {
    Auth {
        token: String,
    },
    UserMessage {
        content: String,
        #[serde(default)]
        conversation_id: Option<String>,
        #[serde(default)]
        agent_type: Option<String>,
    },
    Ping,
}

/// Frames the engine emits back to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundFrame {
    Connection {
        message: String,
    },
    AuthSuccess {
        user_id: String,
        role: String,
    },
    AuthError {
        message: String,
    },
    ChatResponse {
        conversation_id: String,
        user_message: Value,
        ai_message: Value,
    },
    Error {
        message: String,
    },
    Pong,
}

/// How the response was produced, for auditability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentInfoType {
    /// Routed through the supervisor's agent hierarchy.
    SupervisorAgent,
    /// Answered by a direct LLM completion (no supervisor configured).
    LlmDirect,
    /// Blocked by the security filter; no LLM or tool call was made.
    SecurityFiltered,
    /// Canned response; no LLM layer is configured at all.
    MockFallback,
}

/// Routing provenance attached to every chat response.
#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    #[serde(rename = "type")]
    pub info_type: AgentInfoType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_strategy: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub agents_used: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub blocked: bool,
}

/// Request shape of the request/response chat surface.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub context: Option<Value>,
}

/// Response shape of the request/response chat surface.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub content: String,
    pub conversation_id: String,
    pub agent_type: String,
    pub agent_info: AgentInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingInfo>,
    pub timestamp: DateTime<Utc>,
}

/// Errors surfaced to the transport layer.
#[derive(Debug)]
pub enum IngressError {
    /// The turn was cancelled by the client; nothing to send.
    Cancelled,
    /// The engine could not produce a response.
    Internal(String),
}

impl std::fmt::Display for IngressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngressError::Cancelled => write!(f, "Turn cancelled"),
            IngressError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for IngressError {}

/// Front door of the engine: filter, route, fall back.
pub struct ChatService {
    filter: SecurityFilter,
    supervisor: Option<Arc<Supervisor>>,
    router: Option<Arc<LLMRouter>>,
    sessions: Arc<SessionStore>,
}

impl ChatService {
    pub fn new(sessions: Arc<SessionStore>) -> Self {
        ChatService {
            filter: SecurityFilter::new(),
            supervisor: None,
            router: None,
            sessions,
        }
    }

    /// Attach the supervisor (builder pattern).
    pub fn with_supervisor(mut self, supervisor: Arc<Supervisor>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    /// Attach a router for the direct-LLM fallback path (builder pattern).
    pub fn with_router(mut self, router: Arc<LLMRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Process one chat request end to end.
    pub async fn handle_chat(
        &self,
        request: ChatRequest,
        caller: &CallerIdentity,
        cancel: CancellationToken,
    ) -> Result<ChatResponse, IngressError> {
        let conversation_id = request
            .conversation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        // Security filtering happens before anything else; a veto means zero
        // LLM and zero tool calls.
        let verdict = self.filter.apply(&request.message, caller);
        let filtered_query = match verdict {
            SecurityVerdict::Denied { reason } => {
                warn!(
                    "query blocked by security filter for user {}: {}",
                    caller.user_id, reason
                );
                let content = format!(
                    "I'm sorry, but I don't have permission to help with that request. Your current role ({}) doesn't have access to this type of information.",
                    caller.role.as_str()
                );
                // The refusal is still appended to the conversation log; no
                // memory is written.
                self.persist_turn(&conversation_id, caller, &request.message, &content)
                    .await;
                return Ok(ChatResponse {
                    content,
                    conversation_id,
                    agent_type: "security".to_string(),
                    agent_info: AgentInfo {
                        info_type: AgentInfoType::SecurityFiltered,
                        primary_agent: None,
                        routing_strategy: None,
                        agents_used: Vec::new(),
                        reason: Some(reason),
                        blocked: true,
                    },
                    routing: None,
                    timestamp: Utc::now(),
                });
            }
            SecurityVerdict::Allowed {
                filtered_query,
                flagged,
            } => {
                if flagged {
                    info!("query sanitized for user {}", caller.user_id);
                }
                filtered_query
            }
        };

        let preferred_agent = request.agent_type.as_deref().and_then(agent_kind_from_str);

        if let Some(supervisor) = &self.supervisor {
            match supervisor
                .route_query(
                    &filtered_query,
                    caller,
                    preferred_agent,
                    Some(&conversation_id),
                    cancel.clone(),
                )
                .await
            {
                Ok(response) => {
                    return Ok(ChatResponse {
                        content: response.content,
                        conversation_id: response.conversation_id,
                        agent_type: response.agent_type.clone(),
                        agent_info: AgentInfo {
                            info_type: AgentInfoType::SupervisorAgent,
                            primary_agent: Some(response.routing.primary_agent.clone()),
                            routing_strategy: Some(
                                match response.routing.strategy {
                                    crate::backlot::supervisor::RoutingStrategy::SingleAgent => {
                                        "single_agent".to_string()
                                    }
                                    crate::backlot::supervisor::RoutingStrategy::MultiAgent => {
                                        "multi_agent".to_string()
                                    }
                                },
                            ),
                            agents_used: response.routing.agents_used.clone(),
                            reason: None,
                            blocked: false,
                        },
                        routing: Some(response.routing),
                        timestamp: response.timestamp,
                    });
                }
                Err(SupervisorError::Processing(ProcessingError::Cancelled)) => {
                    return Err(IngressError::Cancelled);
                }
                Err(err) => {
                    error!("supervisor routing failed: {}", err);
                    return Err(IngressError::Internal(err.to_string()));
                }
            }
        }

        // Fallback: direct LLM completion when no supervisor is configured.
        if let Some(router) = &self.router {
            info!(
                "supervisor unavailable, using direct LLM for user {}",
                caller.user_id
            );
            let system_prompt = format!(
                "You are an intelligent assistant for entertainment industry projects. You help users with project analysis, talent discovery, and strategic insights.\n\nUser Context:\n- Name: {}\n- Role: {}",
                caller.name.as_deref().unwrap_or("there"),
                caller.role.as_str()
            );
            let request = LlmRequest::from_messages(vec![
                Message::system(system_prompt),
                Message::user(&filtered_query),
            ]);

            match router.route_query(request).await {
                Ok(response) => {
                    self.persist_turn(
                        &conversation_id,
                        caller,
                        &filtered_query,
                        response.message.content.as_ref(),
                    )
                    .await;
                    return Ok(ChatResponse {
                        content: response.message.content.to_string(),
                        conversation_id,
                        agent_type: "llm".to_string(),
                        agent_info: AgentInfo {
                            info_type: AgentInfoType::LlmDirect,
                            primary_agent: None,
                            routing_strategy: None,
                            agents_used: Vec::new(),
                            reason: None,
                            blocked: false,
                        },
                        routing: None,
                        timestamp: Utc::now(),
                    });
                }
                Err(err) => {
                    error!("direct LLM fallback failed: {}", err);
                    return Err(IngressError::Internal(err.to_string()));
                }
            }
        }

        // Nothing configured: canned response so the surface stays alive in
        // development environments.
        let name = caller.name.as_deref().unwrap_or("there");
        Ok(ChatResponse {
            content: format!(
                "Hi {}! The AI pipeline isn't configured yet, so this is a placeholder response.",
                name
            ),
            conversation_id,
            agent_type: "mock".to_string(),
            agent_info: AgentInfo {
                info_type: AgentInfoType::MockFallback,
                primary_agent: None,
                routing_strategy: None,
                agents_used: Vec::new(),
                reason: None,
                blocked: false,
            },
            routing: None,
            timestamp: Utc::now(),
        })
    }

    /// Build the outbound chat frame for a processed message.
    pub fn chat_response_frame(
        &self,
        user_message: &str,
        response: &ChatResponse,
    ) -> OutboundFrame {
        let now = Utc::now().to_rfc3339();
        OutboundFrame::ChatResponse {
            conversation_id: response.conversation_id.clone(),
            user_message: json!({
                "id": Uuid::new_v4().to_string(),
                "content": user_message,
                "sender_type": "user",
                "timestamp": now,
            }),
            ai_message: json!({
                "id": Uuid::new_v4().to_string(),
                "content": response.content,
                "sender_type": "agent",
                "timestamp": now,
                "agent_info": serde_json::to_value(&response.agent_info).unwrap_or(Value::Null),
            }),
        }
    }

    async fn persist_turn(
        &self,
        conversation_id: &str,
        caller: &CallerIdentity,
        user_message: &str,
        assistant_content: &str,
    ) {
        let _guard = self.sessions.lock_conversation(conversation_id).await;
        let mut record = self.sessions.open(conversation_id, &caller.user_id).await;
        let now = Utc::now();
        record.messages.push(StoredMessage {
            message: Message::user(user_message),
            timestamp: now,
        });
        record.messages.push(StoredMessage {
            message: Message::assistant(assistant_content),
            timestamp: now,
        });
        self.sessions.put(record).await;
    }
}

fn agent_kind_from_str(name: &str) -> Option<AgentKind> {
    match name {
        "sales" => Some(AgentKind::Sales),
        "talent" => Some(AgentKind::Talent),
        "analytics" => Some(AgentKind::Analytics),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_frames_deserialize_from_tagged_json() {
        let frame: InboundFrame = serde_json::from_str(
            r#"{"type": "user_message", "data": {"content": "hello"}}"#,
        )
        .unwrap();
        match frame {
            InboundFrame::UserMessage {
                content,
                conversation_id,
                ..
            } => {
                assert_eq!(content, "hello");
                assert!(conversation_id.is_none());
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn outbound_frames_serialize_with_type_tag() {
        let frame = OutboundFrame::AuthSuccess {
            user_id: "u1".to_string(),
            role: "Director".to_string(),
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "auth_success");
        assert_eq!(value["data"]["role"], "Director");
    }

    #[test]
    fn agent_info_serializes_its_type_label() {
        let info = AgentInfo {
            info_type: AgentInfoType::SecurityFiltered,
            primary_agent: None,
            routing_strategy: None,
            agents_used: Vec::new(),
            reason: Some("insufficient_permissions".to_string()),
            blocked: true,
        };
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["type"], "security_filtered");
        assert_eq!(value["blocked"], true);
    }
}

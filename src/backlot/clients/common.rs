//! Shared utilities used across provider client implementations.
//!
//! The helpers in this module are useful when implementing additional providers
//! that expose an OpenAI-compatible HTTP surface.  They provide a tuned
//! [`reqwest`] client with persistent connection pooling, the serde structs for
//! the chat-completions wire format, and adapters that turn a server-sent-event
//! body into a [`MessageChunkStream`].

use crate::backlot::client_wrapper::{
    Message, MessageChunk, MessageChunkStream, NativeToolCall, Role, TokenUsage, ToolDefinition,
};
use futures_util::StreamExt;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::{Duration, Instant};

lazy_static! {
    /// Shared HTTP client with persistent connection pooling.
    ///
    /// The single client instance keeps TLS sessions and DNS lookups warm which
    /// significantly reduces latency when many concurrent requests are issued to
    /// upstream providers.
    static ref SHARED_HTTP_CLIENT: reqwest::Client = {
        reqwest::ClientBuilder::new()
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build shared HTTP client")
    };
}

/// Borrow the lazily initialised shared [`reqwest::Client`].
///
/// The returned reference can be cloned and reused by individual client wrappers.
pub fn get_shared_http_client() -> &'static reqwest::Client {
    &SHARED_HTTP_CLIENT
}

/// One message in the OpenAI-compatible `messages` array.
#[derive(Debug, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
}

/// Native tool-call entry on an assistant wire message.
#[derive(Debug, Serialize, Deserialize)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: WireFunctionCall,
}

/// The function portion of a wire tool call.  Arguments arrive JSON-encoded as a
/// string per the chat-completions contract.
#[derive(Debug, Serialize, Deserialize)]
pub struct WireFunctionCall {
    pub name: String,
    pub arguments: String,
}

/// One entry of the request `tools` array.
#[derive(Debug, Serialize)]
pub struct WireTool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: WireFunction,
}

/// The function schema advertised to the provider.
#[derive(Debug, Serialize)]
pub struct WireFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Request body for `/chat/completions`.
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Response body for a non-streaming `/chat/completions` call.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: WireMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token accounting block as reported by the provider.
#[derive(Debug, Deserialize)]
pub struct WireUsage {
    #[serde(default)]
    pub prompt_tokens: usize,
    #[serde(default)]
    pub completion_tokens: usize,
    #[serde(default)]
    pub total_tokens: usize,
}

impl WireUsage {
    pub fn to_token_usage(&self) -> TokenUsage {
        TokenUsage {
            input_tokens: self.prompt_tokens,
            output_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
        }
    }
}

/// One SSE data frame of a streaming completion.
#[derive(Debug, Deserialize)]
pub struct StreamFrame {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// Request body for `/embeddings`.
#[derive(Debug, Serialize)]
pub struct EmbeddingsRequest {
    pub model: String,
    pub input: String,
}

/// Response body for `/embeddings`.
#[derive(Debug, Deserialize)]
pub struct EmbeddingsResponse {
    pub data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingData {
    pub embedding: Vec<f32>,
}

/// Translate backlot [`Message`]s into the OpenAI-compatible wire shape.
pub fn to_wire_messages(messages: &[Message]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|msg| match &msg.role {
            Role::System => WireMessage {
                role: "system".to_owned(),
                content: Some(msg.content.to_string()),
                tool_call_id: None,
                tool_calls: None,
            },
            Role::User => WireMessage {
                role: "user".to_owned(),
                content: Some(msg.content.to_string()),
                tool_call_id: None,
                tool_calls: None,
            },
            Role::Assistant => WireMessage {
                role: "assistant".to_owned(),
                content: Some(msg.content.to_string()),
                tool_call_id: None,
                tool_calls: if msg.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        msg.tool_calls
                            .iter()
                            .map(|tc| WireToolCall {
                                id: tc.id.clone(),
                                call_type: "function".to_owned(),
                                function: WireFunctionCall {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.to_string(),
                                },
                            })
                            .collect(),
                    )
                },
            },
            Role::Tool { call_id } => WireMessage {
                role: "tool".to_owned(),
                content: Some(msg.content.to_string()),
                tool_call_id: Some(call_id.clone()),
                tool_calls: None,
            },
        })
        .collect()
}

/// Translate backlot [`ToolDefinition`]s into the request `tools` array.
pub fn to_wire_tools(tools: &[ToolDefinition]) -> Vec<WireTool> {
    tools
        .iter()
        .map(|def| WireTool {
            tool_type: "function".to_owned(),
            function: WireFunction {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters: def.parameters_schema.clone(),
            },
        })
        .collect()
}

/// Convert the assistant wire message of a completion into a backlot [`Message`].
///
/// Tool-call arguments arrive JSON-encoded; malformed argument payloads degrade
/// to `Value::Null` rather than failing the whole response.
pub fn from_wire_assistant(wire: WireMessage) -> Message {
    let tool_calls = wire
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| NativeToolCall {
            id: tc.id,
            name: tc.function.name,
            arguments: serde_json::from_str(&tc.function.arguments)
                .unwrap_or(serde_json::Value::Null),
        })
        .collect();

    Message {
        role: Role::Assistant,
        content: std::sync::Arc::from(wire.content.unwrap_or_default().as_str()),
        tool_calls,
    }
}

/// Adapt a streaming `reqwest::Response` body (SSE frames) into a
/// [`MessageChunkStream`].
///
/// Frames arrive as `data: {json}` lines separated by blank lines; the stream
/// terminates on the literal `data: [DONE]` sentinel.  The terminal chunk
/// carries the provider-reported usage when present.
pub fn sse_to_chunk_stream(response: reqwest::Response) -> MessageChunkStream {
    let started = Instant::now();
    let stream = async_stream_chunks(response, started);
    Box::pin(stream)
}

fn async_stream_chunks(
    response: reqwest::Response,
    _started: Instant,
) -> impl futures_util::Stream<Item = Result<MessageChunk, Box<dyn Error + Send + Sync>>> + Send {
    futures_util::stream::unfold(
        (response.bytes_stream(), String::new(), false),
        |(mut body, mut buffer, done)| async move {
            if done {
                return None;
            }
            loop {
                // Emit the next complete SSE line already buffered, if any.
                if let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);

                    if !line.starts_with("data:") {
                        continue;
                    }
                    let payload = line["data:".len()..].trim();
                    if payload == "[DONE]" {
                        return None;
                    }
                    match serde_json::from_str::<StreamFrame>(payload) {
                        Ok(frame) => {
                            let (content, finish_reason) = match frame.choices.first() {
                                Some(choice) => (
                                    choice.delta.content.clone().unwrap_or_default(),
                                    choice.finish_reason.clone(),
                                ),
                                None => (String::new(), None),
                            };
                            let usage = frame.usage.as_ref().map(|u| u.to_token_usage());
                            let is_terminal = finish_reason.is_some();
                            let chunk = MessageChunk {
                                content,
                                finish_reason,
                                usage,
                            };
                            return Some((Ok(chunk), (body, buffer, is_terminal)));
                        }
                        Err(err) => {
                            let boxed: Box<dyn Error + Send + Sync> =
                                format!("malformed stream frame: {}", err).into();
                            return Some((Err(boxed), (body, buffer, true)));
                        }
                    }
                }

                // Need more bytes.
                match body.next().await {
                    Some(Ok(bytes)) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                    }
                    Some(Err(err)) => {
                        let boxed: Box<dyn Error + Send + Sync> = Box::new(err);
                        return Some((Err(boxed), (body, buffer, true)));
                    }
                    None => return None,
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backlot::client_wrapper::Message;

    #[test]
    fn wire_messages_carry_tool_call_ids() {
        let msgs = vec![
            Message::system("prime"),
            Message::user("hello"),
            Message::tool_result("call_1", "{\"found\":true}"),
        ];
        let wire = to_wire_messages(&msgs);
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[2].role, "tool");
        assert_eq!(wire[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn malformed_tool_arguments_degrade_to_null() {
        let wire = WireMessage {
            role: "assistant".to_owned(),
            content: None,
            tool_call_id: None,
            tool_calls: Some(vec![WireToolCall {
                id: "call_9".to_owned(),
                call_type: "function".to_owned(),
                function: WireFunctionCall {
                    name: "get_person_details".to_owned(),
                    arguments: "{not json".to_owned(),
                },
            }]),
        };
        let msg = from_wire_assistant(wire);
        assert_eq!(msg.tool_calls.len(), 1);
        assert!(msg.tool_calls[0].arguments.is_null());
    }
}

//! Shared primitives for provider-agnostic LLM clients.
//!
//! Applications typically interact with Backlot's dispatch layer through the
//! [`ClientWrapper`] trait and the lightweight data types defined in this module.
//! The trait abstracts over concrete vendor implementations while the supporting
//! structs describe chat messages, native tool calls, streaming chunks, and token
//! accounting.
//!
//! # Basic request/response
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use backlot::client_wrapper::{ClientWrapper, Message, Role};
//! use backlot::clients::openai::OpenAIClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let key = std::env::var("OPENAI_API_KEY")?;
//!     let client = OpenAIClient::new_with_model_string(&key, "gpt-4o-mini");
//!
//!     let response = client
//!         .send_message(&[Message::user("Who directed the Nike Air Max spot?")], None)
//!         .await?;
//!
//!     println!("Assistant: {}", response.content);
//!     Ok(())
//! }
//! ```
//!
//! # Streaming quick start
//!
//! ```rust,no_run
//! use backlot::client_wrapper::{ClientWrapper, Message};
//! use backlot::clients::openai::OpenAIClient;
//! use futures_util::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let key = std::env::var("OPENAI_API_KEY")?;
//!     let client = OpenAIClient::new_with_model_string(&key, "gpt-4o-mini");
//!     let request = [Message::user("Summarize our Disney relationship in a sentence.")];
//!
//!     if let Some(mut chunks) = client.send_message_stream(&request, None).await? {
//!         while let Some(chunk) = chunks.next().await {
//!             print!("{}", chunk?.content);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use futures_util::stream::Stream;
use std::error::Error;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A single tool call returned by the LLM in a native function-calling response.
///
/// Providers assign an opaque [`id`](NativeToolCall::id) to each call so that the
/// tool result can be correlated back in a follow-up `Role::Tool` message.
#[derive(Debug, Clone)]
pub struct NativeToolCall {
    /// Provider-assigned call ID, e.g. `"call_abc123"`.
    pub id: String,
    /// Tool name matching one of the [`ToolDefinition`]s sent in the request.
    pub name: String,
    /// Parsed JSON arguments supplied by the LLM for this call.
    pub arguments: serde_json::Value,
}

/// Provider-agnostic tool schema passed to the LLM along with a chat request.
///
/// Derived from [`ToolSpec`](crate::tool_protocol::ToolSpec) via
/// [`ToolSpec::to_tool_definition`](crate::tool_protocol::ToolSpec::to_tool_definition).
/// Serialised as an OpenAI-compatible `tools` array entry before transmission.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    /// Tool name as it will appear in the API `tools` array.
    pub name: String,
    /// Human-readable description surfaced to the LLM to aid tool selection.
    pub description: String,
    /// JSON Schema object describing the accepted parameters.
    pub parameters_schema: serde_json::Value,
}

/// Represents the possible roles for a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    /// A system authored message that primes or constrains assistant behaviour.
    System,
    /// A user authored message (frequently a mirror of a human end-user request).
    User,
    /// An assistant authored message (model responses or developer supplied exemplars).
    Assistant,
    /// A tool-result message correlating with a prior assistant [`NativeToolCall`].
    ///
    /// Serialises as `{"role": "tool", "tool_call_id": "<call_id>", "content": "..."}`
    /// in the OpenAI wire format.
    Tool {
        /// The provider-assigned call id this result answers.
        call_id: String,
    },
}

/// How many tokens were spent on prompt vs. completion?
#[derive(Clone, Debug, Default)]
pub struct TokenUsage {
    /// Number of prompt/input tokens billed by the provider.
    pub input_tokens: usize,
    /// Number of generated/output tokens billed by the provider.
    pub output_tokens: usize,
    /// Convenience total equal to `input_tokens + output_tokens`.
    pub total_tokens: usize,
}

/// Represents a generic message exchanged with an LLM.
///
/// The `tool_calls` field is populated by [`ClientWrapper::send_message`] when the
/// provider returns native function-calling results.  It defaults to an empty `Vec`
/// for all other message kinds.
#[derive(Clone, Debug)]
pub struct Message {
    /// The role associated with the message.
    pub role: Role,
    /// The message body.  Stored as `Arc<str>` so that conversation histories can be
    /// cheaply cloned by the conversation graph and downstream components.
    pub content: Arc<str>,
    /// Native tool calls requested by the assistant.  Non-empty only on assistant
    /// messages returned by [`ClientWrapper::send_message`] when the provider
    /// responds with function-calling results.
    pub tool_calls: Vec<NativeToolCall>,
}

impl Message {
    /// Construct a message with the given role and content and no tool calls.
    pub fn new(role: Role, content: impl AsRef<str>) -> Self {
        Message {
            role,
            content: Arc::from(content.as_ref()),
            tool_calls: Vec::new(),
        }
    }

    /// Convenience constructor for a system message.
    pub fn system(content: impl AsRef<str>) -> Self {
        Message::new(Role::System, content)
    }

    /// Convenience constructor for a user message.
    pub fn user(content: impl AsRef<str>) -> Self {
        Message::new(Role::User, content)
    }

    /// Convenience constructor for an assistant message.
    pub fn assistant(content: impl AsRef<str>) -> Self {
        Message::new(Role::Assistant, content)
    }

    /// Convenience constructor for a tool-result message answering `call_id`.
    pub fn tool_result(call_id: impl Into<String>, content: impl AsRef<str>) -> Self {
        Message::new(
            Role::Tool {
                call_id: call_id.into(),
            },
            content,
        )
    }

    /// Whether this is an assistant message requesting at least one tool call.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Represents a chunk of content in a streaming response.
/// Each chunk contains a delta (incremental piece) of the assistant's response.
#[derive(Clone, Debug)]
pub struct MessageChunk {
    /// The incremental content delta in this chunk.
    /// May be empty for chunks that don't contain content (e.g. finish_reason chunks).
    pub content: String,
    /// Optional finish reason mirroring the provider specific completion status
    /// (e.g. `"stop"`).
    pub finish_reason: Option<String>,
    /// Populated only on the terminal metadata chunk: token accounting for the
    /// whole streamed response, when the provider reports it.
    pub usage: Option<TokenUsage>,
}

/// Type alias for a stream of message chunks compatible with `Send` executors.
pub type MessageChunkStream =
    Pin<Box<dyn Stream<Item = Result<MessageChunk, Box<dyn Error + Send + Sync>>> + Send>>;

/// Trait defining the interface to interact with various LLM services.
///
/// A [`ClientWrapper`] instance is responsible for translating dispatch requests
/// into the provider specific wire format and for returning provider responses in
/// a uniform shape.  The abstraction deliberately excludes any conversation
/// bookkeeping: for that functionality see [`crate::conversation::Agent`].
///
/// All implementations **must** be thread-safe (`Send + Sync`) so they can be
/// shared between async tasks.  Where a provider exposes token accounting
/// information, wrappers should capture it and make it visible via
/// [`ClientWrapper::get_last_usage`].
#[async_trait]
pub trait ClientWrapper: Send + Sync {
    /// Send a full request/response style chat completion.
    ///
    /// The `messages` slice must include any system priming messages the caller
    /// wishes to send.  The `tools` parameter carries native [`ToolDefinition`]s
    /// that are forwarded to the provider's function-calling API.  When `Some` and
    /// non-empty, the provider may answer with [`Message::tool_calls`] instead of
    /// (or in addition to) text content.
    async fn send_message(
        &self,
        messages: &[Message],
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>>;

    /// Request a streaming response from the provider.
    ///
    /// Implementors that sit in front of providers without streaming support can
    /// inherit the default implementation which simply resolves to `Ok(None)`.
    /// A `Some(MessageChunkStream)` return value must yield [`MessageChunk`]
    /// instances mirroring the incremental tokens supplied by the upstream
    /// service, terminated by a chunk carrying `finish_reason` and, when
    /// available, `usage`.
    ///
    /// Streaming with native tool calling is out of scope and implementors may
    /// ignore the `tools` parameter (returning `Ok(None)` is acceptable).
    async fn send_message_stream(
        &self,
        _messages: &[Message],
        _tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Option<MessageChunkStream>, Box<dyn Error + Send + Sync>> {
        Ok(None)
    }

    /// Produce an embedding vector for `text`.
    ///
    /// Only embedding-capable providers implement this; the default returns an
    /// error so the router can fall through to a provider that does.
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, Box<dyn Error + Send + Sync>> {
        Err("embeddings not supported by this provider".into())
    }

    /// Whether [`ClientWrapper::embed`] is implemented for this provider.
    fn supports_embeddings(&self) -> bool {
        false
    }

    /// Return the identifier used to select the upstream model (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Hook to retrieve usage from the most recent [`ClientWrapper::send_message`] call.
    ///
    /// Wrappers that propagate token accounting should override
    /// [`ClientWrapper::usage_slot`].
    async fn get_last_usage(&self) -> Option<TokenUsage> {
        if let Some(slot) = self.usage_slot() {
            slot.lock().await.clone()
        } else {
            None
        }
    }

    /// Expose a shared mutable slot where the implementation can persist token usage.
    ///
    /// By default wrappers report no usage data.  Providers that expose billing
    /// information should return `Some(&Mutex<Option<TokenUsage>>)` so that
    /// [`ClientWrapper::get_last_usage`] can surface the recorded values.
    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        None
    }
}

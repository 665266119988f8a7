//! OpenAI-compatible client wrapper over raw HTTP.
//!
//! This is the workhorse client behind every provider in the crate: it speaks the
//! chat-completions wire format, supports native function calling, streaming via
//! server-sent events, and the `/embeddings` endpoint.  Aggregators exposing the
//! same surface (Together, Anthropic's compatibility layer, self-hosted gateways)
//! reuse it through [`OpenAIClient::new_with_base_url`] or the delegating
//! constructors in the sibling modules.
//!
//! # Example
//!
//! ```rust,no_run
//! use backlot::client_wrapper::{ClientWrapper, Message};
//! use backlot::clients::openai::OpenAIClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let key = std::env::var("OPENAI_API_KEY")?;
//!     let client = OpenAIClient::new_with_model_string(&key, "gpt-4o-mini");
//!     let reply = client
//!         .send_message(&[Message::user("Who runs production at Stellar Films?")], None)
//!         .await?;
//!     println!("{}", reply.content);
//!     Ok(())
//! }
//! ```

use crate::backlot::client_wrapper::{
    ClientWrapper, Message, MessageChunkStream, TokenUsage, ToolDefinition,
};
use crate::backlot::clients::common::{
    from_wire_assistant, get_shared_http_client, sse_to_chunk_stream, to_wire_messages,
    to_wire_tools, ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse,
};
use async_trait::async_trait;
use log::error;
use std::error::Error;
use tokio::sync::Mutex;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Client wrapper for OpenAI-compatible chat-completion endpoints.
pub struct OpenAIClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: String,
    token_usage: Mutex<Option<TokenUsage>>,
}

impl OpenAIClient {
    /// Construct a client against the default OpenAI base URL.
    pub fn new_with_model_string(secret_key: &str, model_name: &str) -> Self {
        Self::new_with_base_url(secret_key, model_name, DEFAULT_BASE_URL)
    }

    /// Construct a client pointing at any OpenAI-compatible base URL.
    ///
    /// `base_url` should not carry a trailing slash
    /// (e.g. `"https://api.together.xyz/v1"`).
    pub fn new_with_base_url(secret_key: &str, model_name: &str, base_url: &str) -> Self {
        OpenAIClient {
            http: get_shared_http_client().clone(),
            api_key: secret_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model_name.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            token_usage: Mutex::new(None),
        }
    }

    /// Override the model used for [`ClientWrapper::embed`] calls (builder pattern).
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }

    async fn post_chat(
        &self,
        body: &ChatRequest,
    ) -> Result<reqwest::Response, Box<dyn Error + Send + Sync>> {
        let response = self
            .http
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(format!("provider returned {}: {}", status, detail).into());
        }
        Ok(response)
    }
}

#[async_trait]
impl ClientWrapper for OpenAIClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send_message(
        &self,
        messages: &[Message],
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: to_wire_messages(messages),
            max_tokens: None,
            temperature: None,
            tools: tools
                .filter(|t| !t.is_empty())
                .map(|t| to_wire_tools(&t)),
            stream: None,
        };

        let response = match self.post_chat(&body).await {
            Ok(r) => r,
            Err(err) => {
                error!("OpenAIClient::send_message request error: {}", err);
                return Err(err);
            }
        };

        let parsed: ChatResponse = response.json().await?;

        if let Some(usage) = parsed.usage.as_ref() {
            *self.token_usage.lock().await = Some(usage.to_token_usage());
        }

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or("provider response carried no choices")?;

        Ok(from_wire_assistant(choice.message))
    }

    async fn send_message_stream(
        &self,
        messages: &[Message],
        _tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Option<MessageChunkStream>, Box<dyn Error + Send + Sync>> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: to_wire_messages(messages),
            max_tokens: None,
            temperature: None,
            tools: None,
            stream: Some(true),
        };

        let response = self.post_chat(&body).await?;
        Ok(Some(sse_to_chunk_stream(response)))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, Box<dyn Error + Send + Sync>> {
        let body = EmbeddingsRequest {
            model: self.embedding_model.clone(),
            input: text.to_string(),
        };

        let response = self
            .http
            .post(self.embeddings_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(format!("embeddings request returned {}: {}", status, detail).into());
        }

        let parsed: EmbeddingsResponse = response.json().await?;
        let data = parsed
            .data
            .into_iter()
            .next()
            .ok_or("embeddings response carried no vectors")?;
        Ok(data.embedding)
    }

    fn supports_embeddings(&self) -> bool {
        true
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.token_usage)
    }
}

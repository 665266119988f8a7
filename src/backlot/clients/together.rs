//! Together.ai client wrapper built on the OpenAI-compatible transport.
//!
//! Together is the cost-efficient default in the provider table.  The wrapper
//! delegates HTTP concerns to the shared OpenAI implementation, so swapping from
//! OpenAI to Together only requires a different constructor.

use crate::backlot::client_wrapper::{
    ClientWrapper, Message, MessageChunkStream, TokenUsage, ToolDefinition,
};
use crate::backlot::clients::openai::OpenAIClient;
use async_trait::async_trait;
use std::error::Error;
use tokio::sync::Mutex;

const TOGETHER_BASE_URL: &str = "https://api.together.xyz/v1";

/// Default chat model served through the compatibility surface.
pub const DEFAULT_MODEL: &str = "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo";

/// Client wrapper for Together.ai routed through the OpenAI compatible surface.
pub struct TogetherClient {
    /// Delegated client that handles the HTTP interactions.
    delegate_client: OpenAIClient,
    /// Exposed model name.
    model: String,
}

impl TogetherClient {
    /// Create a client from an API key using the default Together chat model.
    pub fn new(secret_key: &str) -> Self {
        Self::new_with_model_str(secret_key, DEFAULT_MODEL)
    }

    /// Create a client from an API key and explicit model string.
    pub fn new_with_model_str(secret_key: &str, model_name: &str) -> Self {
        TogetherClient {
            // we reuse the OpenAIClient for Together and delegate the calls to it
            delegate_client: OpenAIClient::new_with_base_url(
                secret_key,
                model_name,
                TOGETHER_BASE_URL,
            ),
            model: model_name.to_string(),
        }
    }

    /// Create a client pointing at a custom Together-compatible base URL.
    pub fn new_with_base_url(secret_key: &str, model_name: &str, base_url: &str) -> Self {
        TogetherClient {
            delegate_client: OpenAIClient::new_with_base_url(secret_key, model_name, base_url),
            model: model_name.to_string(),
        }
    }
}

#[async_trait]
impl ClientWrapper for TogetherClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send_message(
        &self,
        messages: &[Message],
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        self.delegate_client.send_message(messages, tools).await
    }

    async fn send_message_stream(
        &self,
        messages: &[Message],
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Option<MessageChunkStream>, Box<dyn Error + Send + Sync>> {
        self.delegate_client
            .send_message_stream(messages, tools)
            .await
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        self.delegate_client.usage_slot()
    }
}

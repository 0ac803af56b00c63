use crate::error::CoTeacherError;
use futures::channel::mpsc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire name, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Capitalized label used in transcripts and prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub message: Message,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Events emitted during streaming LLM responses.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta(String),
    Done,
    Error(String),
}

/// The model client trait. Implementations provide both blocking and streaming chat.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a chat request and get the full response.
    async fn chat(&self, model: &str, messages: &[Message]) -> Result<LlmResponse, CoTeacherError>;

    /// Send a chat request and get a stream of events.
    ///
    /// The upstream request is abandoned once `cancel` fires.
    async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        cancel: CancellationToken,
    ) -> Result<mpsc::UnboundedReceiver<StreamEvent>, CoTeacherError>;

    /// Names of the models the endpoint can serve.
    async fn list_models(&self) -> Result<Vec<String>, CoTeacherError>;

    /// Check that the endpoint answers at all.
    async fn check_health(&self) -> Result<(), CoTeacherError> {
        self.list_models().await.map(|_| ())
    }

    /// Whether `model` is served, matching either the exact name or an untagged name.
    async fn model_exists(&self, model: &str) -> Result<bool, CoTeacherError> {
        let tagged = format!("{model}:");
        Ok(self
            .list_models()
            .await?
            .iter()
            .any(|name| name == model || name.starts_with(&tagged)))
    }
}

//! Text-completion provider trait and chat message types.
//!
//! Concrete chat backends (OpenAI, Anthropic, Ollama) live in the app crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-tagged chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Trait implemented by chat-completion backends.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the provider identifier (e.g. `"anthropic"`).
    fn name(&self) -> &str;

    /// Send `messages` and return the generated text.
    ///
    /// With `json_mode` set, the backend is asked to answer with a single
    /// JSON object.
    ///
    /// # Errors
    ///
    /// [`CoreError::ProviderUnavailable`](crate::error::CoreError::ProviderUnavailable),
    /// [`CoreError::AuthenticationMissing`](crate::error::CoreError::AuthenticationMissing)
    /// or [`CoreError::MalformedResponse`](crate::error::CoreError::MalformedResponse).
    async fn complete(&self, messages: &[Message], json_mode: bool) -> Result<String>;
}

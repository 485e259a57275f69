//! Chat-completion provider implementations.
//!
//! - **[`DisabledChat`]**: always [`CoreError::NotConfigured`].
//! - **[`OpenAiChat`]**: `POST {url}/chat/completions`, bearer `OPENAI_API_KEY`.
//! - **[`AnthropicChat`]**: `POST {url}/messages`, `x-api-key`
//!   `ANTHROPIC_API_KEY`. System messages move to the top-level `system`
//!   field.
//! - **[`OllamaChat`]**: `POST {url}/api/chat` with streaming off.

use async_trait::async_trait;
use bugreport_harness_core::completion::{CompletionProvider, Message, Role};
use bugreport_harness_core::{CoreError, Result};
use serde::{Deserialize, Serialize};

use crate::config::CompletionConfig;
use crate::embedding::{OLLAMA_DEFAULT_URL, OPENAI_DEFAULT_URL};
use crate::http::{env_api_key, join_url, JsonClient};

pub const ANTHROPIC_DEFAULT_URL: &str = "https://api.anthropic.com/v1";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const JSON_ONLY_INSTRUCTION: &str =
    "Respond with a single JSON object and nothing else: no prose, no code fences.";

/// Sampling settings shared by every chat backend.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl ChatSettings {
    pub fn from_config(config: &CompletionConfig) -> Self {
        Self {
            model: config.model.clone().unwrap_or_default(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

fn non_empty(text: String, backend: &str) -> Result<String> {
    if text.trim().is_empty() {
        return Err(CoreError::MalformedResponse(format!(
            "{} response contained no text",
            backend
        )));
    }
    Ok(text)
}

// ============ Disabled Provider ============

pub struct DisabledChat;

#[async_trait]
impl CompletionProvider for DisabledChat {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _messages: &[Message], _json_mode: bool) -> Result<String> {
        Err(CoreError::NotConfigured {
            provider: "completion".to_string(),
        })
    }
}

// ============ OpenAI Provider ============

pub struct OpenAiChat {
    http: JsonClient,
    url: String,
    api_key: Option<String>,
    settings: ChatSettings,
}

#[derive(Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAiResponseFormat>,
}

#[derive(Serialize)]
struct OpenAiResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChat {
    pub fn new(
        http: JsonClient,
        url: impl Into<String>,
        api_key: Option<String>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            http,
            url: url.into(),
            api_key,
            settings,
        }
    }

    pub fn from_config(config: &CompletionConfig) -> Result<Self> {
        let http = JsonClient::new("OpenAI", config.timeout_secs, config.max_retries)?;
        let url = config.url.as_deref().unwrap_or(OPENAI_DEFAULT_URL);
        Ok(Self::new(
            http,
            url,
            env_api_key("OPENAI_API_KEY"),
            ChatSettings::from_config(config),
        ))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiChat {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, messages: &[Message], json_mode: bool) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            CoreError::AuthenticationMissing("OPENAI_API_KEY environment variable not set".into())
        })?;

        let body = OpenAiChatRequest {
            model: &self.settings.model,
            messages,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            response_format: json_mode.then_some(OpenAiResponseFormat {
                kind: "json_object",
            }),
        };
        let headers = [("Authorization", format!("Bearer {}", api_key))];
        let response: OpenAiChatResponse = self
            .http
            .post_json(&join_url(&self.url, "chat/completions"), &headers, &body)
            .await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        non_empty(text, "OpenAI")
    }
}

// ============ Anthropic Provider ============

pub struct AnthropicChat {
    http: JsonClient,
    url: String,
    api_key: Option<String>,
    settings: ChatSettings,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl AnthropicChat {
    pub fn new(
        http: JsonClient,
        url: impl Into<String>,
        api_key: Option<String>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            http,
            url: url.into(),
            api_key,
            settings,
        }
    }

    pub fn from_config(config: &CompletionConfig) -> Result<Self> {
        let http = JsonClient::new("Anthropic", config.timeout_secs, config.max_retries)?;
        let url = config.url.as_deref().unwrap_or(ANTHROPIC_DEFAULT_URL);
        Ok(Self::new(
            http,
            url,
            env_api_key("ANTHROPIC_API_KEY"),
            ChatSettings::from_config(config),
        ))
    }
}

/// Split role-tagged messages into Anthropic's top-level system text and
/// the user/assistant turn list.
fn split_system<'a>(
    messages: &'a [Message],
    json_mode: bool,
) -> (Option<String>, Vec<AnthropicMessage<'a>>) {
    let mut system: Vec<&str> = Vec::new();
    let mut turns = Vec::with_capacity(messages.len());
    for m in messages {
        match m.role {
            Role::System => system.push(&m.content),
            Role::User | Role::Assistant => turns.push(AnthropicMessage {
                role: m.role.as_str(),
                content: &m.content,
            }),
        }
    }
    if json_mode {
        system.push(JSON_ONLY_INSTRUCTION);
    }
    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    (system, turns)
}

#[async_trait]
impl CompletionProvider for AnthropicChat {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, messages: &[Message], json_mode: bool) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            CoreError::AuthenticationMissing(
                "ANTHROPIC_API_KEY environment variable not set".into(),
            )
        })?;

        let (system, turns) = split_system(messages, json_mode);
        let body = AnthropicRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            system,
            messages: turns,
        };
        let headers = [
            ("x-api-key", api_key.to_string()),
            ("anthropic-version", ANTHROPIC_VERSION.to_string()),
        ];
        let response: AnthropicResponse = self
            .http
            .post_json(&join_url(&self.url, "messages"), &headers, &body)
            .await?;

        let text = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicResponseBlock::Text { text } => Some(text),
                AnthropicResponseBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        non_empty(text, "Anthropic")
    }
}

// ============ Ollama Provider ============

pub struct OllamaChat {
    http: JsonClient,
    url: String,
    settings: ChatSettings,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: OllamaOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaChatMessage,
}

#[derive(Deserialize)]
struct OllamaChatMessage {
    #[serde(default)]
    content: String,
}

impl OllamaChat {
    pub fn new(http: JsonClient, url: impl Into<String>, settings: ChatSettings) -> Self {
        Self {
            http,
            url: url.into(),
            settings,
        }
    }

    pub fn from_config(config: &CompletionConfig) -> Result<Self> {
        let http = JsonClient::new("Ollama", config.timeout_secs, config.max_retries)?;
        let url = config.url.as_deref().unwrap_or(OLLAMA_DEFAULT_URL);
        Ok(Self::new(http, url, ChatSettings::from_config(config)))
    }
}

#[async_trait]
impl CompletionProvider for OllamaChat {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, messages: &[Message], json_mode: bool) -> Result<String> {
        let body = OllamaChatRequest {
            model: &self.settings.model,
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: self.settings.temperature,
                num_predict: self.settings.max_tokens,
            },
            format: json_mode.then_some("json"),
        };
        let response: OllamaChatResponse = self
            .http
            .post_json(&join_url(&self.url, "api/chat"), &[], &body)
            .await?;
        non_empty(response.message.content, "Ollama")
    }
}

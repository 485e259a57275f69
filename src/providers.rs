//! Provider registries built from configuration.
//!
//! Every backend the configuration can name is registered under its
//! identifier; commands resolve `embedding.provider` /
//! `completion.provider` through the registry. Only the configured backend
//! is constructed with real settings; `disabled` is always present.

use std::sync::Arc;

use anyhow::{Context, Result};
use bugreport_harness_core::completion::CompletionProvider;
use bugreport_harness_core::embedding::EmbeddingProvider;
use bugreport_harness_core::registry::ProviderRegistry;

use crate::completion::{AnthropicChat, DisabledChat, OllamaChat, OpenAiChat};
use crate::config::{CompletionConfig, Config, EmbeddingConfig};
use crate::embedding::{DisabledEmbedder, OllamaEmbedder, OpenAiEmbedder};

pub type EmbeddingRegistry = ProviderRegistry<dyn EmbeddingProvider>;
pub type CompletionRegistry = ProviderRegistry<dyn CompletionProvider>;

pub fn build_embedding_registry(config: &EmbeddingConfig) -> Result<EmbeddingRegistry> {
    let mut registry = EmbeddingRegistry::new();
    registry.register("disabled", Arc::new(DisabledEmbedder));
    match config.provider.as_str() {
        "openai" => registry.register("openai", Arc::new(OpenAiEmbedder::from_config(config)?)),
        "ollama" => registry.register("ollama", Arc::new(OllamaEmbedder::from_config(config)?)),
        _ => {}
    }
    Ok(registry)
}

pub fn build_completion_registry(config: &CompletionConfig) -> Result<CompletionRegistry> {
    let mut registry = CompletionRegistry::new();
    registry.register("disabled", Arc::new(DisabledChat));
    match config.provider.as_str() {
        "openai" => registry.register("openai", Arc::new(OpenAiChat::from_config(config)?)),
        "anthropic" => {
            registry.register("anthropic", Arc::new(AnthropicChat::from_config(config)?))
        }
        "ollama" => registry.register("ollama", Arc::new(OllamaChat::from_config(config)?)),
        _ => {}
    }
    Ok(registry)
}

/// The configured embedding provider.
pub fn embedding_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    build_embedding_registry(&config.embedding)?
        .resolve(&config.embedding.provider)
        .with_context(|| format!("embedding provider '{}'", config.embedding.provider))
}

/// The configured completion provider.
pub fn completion_provider(config: &Config) -> Result<Arc<dyn CompletionProvider>> {
    build_completion_registry(&config.completion)?
        .resolve(&config.completion.provider)
        .with_context(|| format!("completion provider '{}'", config.completion.provider))
}

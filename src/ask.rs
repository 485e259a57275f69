//! `brh ask`: answer a question from a saved index.
//!
//! Loads the requested (or newest) index, retrieves the top-K chunks with
//! the index's own embedding model, renders the grounded prompt and sends
//! it to the completion provider. `--dry-run` stops after the prompt.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use bugreport_harness_core::completion::CompletionProvider;
use bugreport_harness_core::embedding::EmbeddingProvider;
use bugreport_harness_core::models::{Index, ScoredChunk};
use bugreport_harness_core::prompt::answer_messages;
use bugreport_harness_core::search::retrieve;
use serde::Serialize;

use crate::config::Config;
use crate::index_store;
use crate::providers;
use crate::session_log::{SessionEvent, SessionLog};

#[derive(Debug, Default, Clone)]
pub struct AskOptions {
    pub index: Option<PathBuf>,
    pub top_k: Option<usize>,
    pub dry_run: bool,
    pub json: bool,
}

/// Prompt, sources and (unless dry-run) the model's answer.
#[derive(Debug, Serialize)]
pub struct AskResult {
    pub question: String,
    pub source_id: String,
    pub prompt: String,
    pub sources: Vec<ScoredChunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

/// Resolve the index to query: an explicit file, or the newest in `dir`.
pub fn resolve_index(dir: &Path, explicit: Option<&Path>) -> Result<Index> {
    match explicit {
        Some(path) => index_store::load(path).ok_or_else(|| {
            anyhow!(
                "index file {} is missing or corrupt; rebuild it with `brh index`",
                path.display()
            )
        }),
        None => index_store::load_latest(dir)?
            .ok_or_else(|| anyhow!("no index found, run `brh index` first")),
    }
}

/// Retrieve, build the prompt and, when `completion` is given, ask it.
pub async fn ask_index(
    index: &Index,
    question: &str,
    top_k: usize,
    embedder: &dyn EmbeddingProvider,
    completion: Option<&dyn CompletionProvider>,
) -> Result<AskResult> {
    if !index.is_searchable() {
        bail!(
            "index for {} has no embeddings; rebuild it with `brh index --force`",
            index.source_id
        );
    }

    let sources = retrieve(embedder, question, index, top_k).await?;
    let messages = answer_messages(question, &index.source_id, &sources);
    let prompt = messages
        .last()
        .map(|m| m.content.clone())
        .unwrap_or_default();

    let answer = match completion {
        Some(provider) => Some(provider.complete(&messages, false).await?),
        None => None,
    };

    Ok(AskResult {
        question: question.to_string(),
        source_id: index.source_id.clone(),
        prompt,
        sources,
        answer,
    })
}

/// Run `brh ask <question>`.
pub async fn run_ask(cfg: &Config, question: &str, opts: &AskOptions, log: &SessionLog) -> Result<()> {
    let index = resolve_index(&cfg.index.dir, opts.index.as_deref())?;

    if cfg.embedding.is_enabled() && cfg.embedding.model_name() != index.model {
        tracing::warn!(
            configured = cfg.embedding.model_name(),
            index_model = %index.model,
            "configured embedding model differs from the index; querying with the index model"
        );
    }

    let top_k = opts.top_k.unwrap_or(cfg.retrieval.top_k);
    log.record(&SessionEvent::Question {
        question,
        source_id: &index.source_id,
        top_k,
    });

    let embedder = providers::embedding_provider(cfg)?;
    let completion = if opts.dry_run {
        None
    } else {
        Some(providers::completion_provider(cfg)?)
    };

    let result = match ask_index(&index, question, top_k, embedder.as_ref(), completion.as_deref()).await {
        Ok(result) => result,
        Err(e) => {
            log.record(&SessionEvent::Error {
                command: "ask",
                message: format!("{:#}", e),
            });
            return Err(e);
        }
    };

    if let Some(answer) = &result.answer {
        log.record(&SessionEvent::Answer {
            question,
            answer,
            sources: result.sources.len(),
        });
    }

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match &result.answer {
        None => print!("{}", result.prompt),
        Some(answer) => {
            println!("{}", answer.trim_end());
            println!();
            print_sources(&result);
        }
    }
    Ok(())
}

fn print_sources(result: &AskResult) {
    if result.sources.is_empty() {
        println!("No sources.");
        return;
    }
    println!("Sources ({}):", result.source_id);
    for (i, s) in result.sources.iter().enumerate() {
        println!(
            "  [{}] offsets {}-{}  score {:.4}",
            i + 1,
            s.chunk.start_offset,
            s.chunk.end_offset,
            s.score
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bugreport_harness_core::completion::{Message, Role};
    use bugreport_harness_core::models::{Chunk, ChunkEmbedding};
    use bugreport_harness_core::CoreError;
    use chrono::Utc;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        fn name(&self) -> &str {
            "keyword"
        }

        async fn embed(&self, text: &str, _model: &str) -> bugreport_harness_core::Result<Vec<f64>> {
            let anr = if text.contains("ANR") { 1.0 } else { 0.0 };
            let battery = if text.contains("battery") { 1.0 } else { 0.0 };
            Ok(vec![anr, battery])
        }
    }

    #[derive(Default)]
    struct CapturingChat {
        seen: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl CompletionProvider for CapturingChat {
        fn name(&self) -> &str {
            "capture"
        }

        async fn complete(
            &self,
            messages: &[Message],
            _json_mode: bool,
        ) -> bugreport_harness_core::Result<String> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            Ok("The main thread was blocked [1].".into())
        }
    }

    fn index() -> Index {
        let texts = ["ANR in com.android.systemui", "battery stats reset", "kernel wakelock"];
        Index {
            source_id: "bugreport.zip".into(),
            created_at: Utc::now(),
            model: "m".into(),
            chunk_size: 50,
            chunk_overlap: 0,
            source_digest: None,
            chunks: texts
                .iter()
                .enumerate()
                .map(|(i, t)| Chunk {
                    id: i as u64,
                    start_offset: i * 50,
                    end_offset: i * 50 + t.len(),
                    text: t.to_string(),
                })
                .collect(),
            embeddings: vec![
                ChunkEmbedding {
                    chunk_id: 0,
                    vector: vec![1.0, 0.0],
                },
                ChunkEmbedding {
                    chunk_id: 1,
                    vector: vec![0.0, 1.0],
                },
            ],
        }
    }

    #[tokio::test]
    async fn dry_run_builds_prompt_without_completion() {
        let result = ask_index(&index(), "Why the ANR?", 1, &KeywordEmbedder, None)
            .await
            .unwrap();
        assert!(result.answer.is_none());
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].chunk.id, 0);
        assert!(result.prompt.contains("[1] source: bugreport.zip | offsets: 0-27"));
    }

    #[tokio::test]
    async fn answer_uses_system_and_user_messages() {
        let chat = CapturingChat::default();
        let result = ask_index(&index(), "battery drain?", 5, &KeywordEmbedder, Some(&chat))
            .await
            .unwrap();
        assert_eq!(result.answer.as_deref(), Some("The main thread was blocked [1]."));
        assert_eq!(result.sources.len(), 2);
        assert_eq!(result.sources[0].chunk.id, 1);
        let seen = chat.seen.lock().unwrap();
        assert_eq!(seen[0].role, Role::System);
        assert_eq!(seen[1].role, Role::User);
    }

    #[tokio::test]
    async fn index_without_embeddings_is_refused() {
        let mut idx = index();
        idx.embeddings.clear();
        let err = ask_index(&idx, "q", 3, &KeywordEmbedder, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no embeddings"));
    }

    #[tokio::test]
    async fn dimension_mismatch_surfaces() {
        let mut idx = index();
        idx.embeddings[0].vector = vec![1.0, 0.0, 0.0];
        let err = ask_index(&idx, "ANR", 3, &KeywordEmbedder, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn missing_index_has_helpful_error() {
        let tmp = TempDir::new().unwrap();
        let err = resolve_index(tmp.path(), None).unwrap_err();
        assert_eq!(err.to_string(), "no index found, run `brh index` first");
        let err = resolve_index(tmp.path(), Some(tmp.path().join("x-index.json").as_path())).unwrap_err();
        assert!(err.to_string().contains("missing or corrupt"));
    }
}

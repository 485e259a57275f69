//! `brh summarize`: map-reduce summary of a whole bugreport.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use bugreport_harness_core::completion::{CompletionProvider, Message};
use bugreport_harness_core::summarize::{summarize, SegmentSummarizer};

use crate::config::Config;
use crate::document::load_document;
use crate::providers;
use crate::session_log::{SessionEvent, SessionLog};

const SEGMENT_SYSTEM: &str = "You summarize one part of an Android bugreport. Report crashes, ANRs, \
watchdog or kernel errors, battery and memory pressure, and notable app or system events, with \
the package names, PIDs and timestamps that appear in the text. Do not speculate beyond it.";

const MERGE_SYSTEM: &str = "You merge partial summaries of consecutive parts of one Android \
bugreport into a single report. Deduplicate repeated findings, keep the concrete identifiers, \
and order the most severe problems first.";

/// Summarizes bugreport segments through a completion provider.
pub struct CompletionSummarizer<'a> {
    provider: &'a dyn CompletionProvider,
    source_id: &'a str,
}

impl<'a> CompletionSummarizer<'a> {
    pub fn new(provider: &'a dyn CompletionProvider, source_id: &'a str) -> Self {
        Self {
            provider,
            source_id,
        }
    }
}

#[async_trait]
impl<'a> SegmentSummarizer for CompletionSummarizer<'a> {
    async fn summarize(
        &self,
        segment: &str,
        index: usize,
        total: usize,
    ) -> bugreport_harness_core::Result<String> {
        let messages = [
            Message::system(SEGMENT_SYSTEM),
            Message::user(format!(
                "Part {} of {} of bugreport {}:\n\n{}",
                index + 1,
                total,
                self.source_id,
                segment
            )),
        ];
        self.provider.complete(&messages, false).await
    }

    async fn merge(&self, summaries: &[String]) -> bugreport_harness_core::Result<String> {
        let mut body = format!("Partial summaries of bugreport {}:\n", self.source_id);
        for (i, s) in summaries.iter().enumerate() {
            body.push_str(&format!("\n### Part {}\n{}\n", i + 1, s.trim()));
        }
        let messages = [Message::system(MERGE_SYSTEM), Message::user(body)];
        self.provider.complete(&messages, false).await
    }
}

/// Run `brh summarize <path>`.
pub async fn run_summarize(
    cfg: &Config,
    path: &Path,
    max_chunks: Option<usize>,
    chunk_limit: Option<usize>,
    log: &SessionLog,
) -> Result<()> {
    if !cfg.completion.is_enabled() {
        anyhow::bail!("Completion provider is disabled. Set [completion] provider in the config to summarize.");
    }
    let doc = load_document(path)?;
    let provider = providers::completion_provider(cfg)?;
    let summarizer = CompletionSummarizer::new(provider.as_ref(), &doc.source_id);

    let mut failed = 0usize;
    let result = summarize(
        &doc.text,
        chunk_limit.unwrap_or(cfg.summary.chunk_limit),
        max_chunks.unwrap_or(cfg.summary.max_chunks),
        cfg.summary.concurrency,
        &summarizer,
        |i, e| {
            failed += 1;
            eprintln!("Warning: summary of segment {} failed: {}", i, e);
        },
    )
    .await;

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            log.record(&SessionEvent::Error {
                command: "summarize",
                message: e.to_string(),
            });
            return Err(anyhow::Error::new(e).context("merging segment summaries failed"));
        }
    };

    log.record(&SessionEvent::Summary {
        source_id: &doc.source_id,
        segments_failed: failed,
        summary: summary.as_deref(),
    });

    match summary {
        Some(text) => println!("{}", text.trim_end()),
        None => println!("nothing to summarize"),
    }
    Ok(())
}

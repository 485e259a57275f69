//! `brh index`: build and persist an embedding index for one bugreport.
//!
//! An unchanged document is not re-embedded: when the newest saved index
//! with the same `sourceDigest`, chunk settings and embedding model exists,
//! it is reused unless `--force` is given.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use bugreport_harness_core::builder::{BuildReport, IndexBuilder};
use bugreport_harness_core::chunk::chunk_text;
use bugreport_harness_core::embedding::EmbeddingProvider;
use bugreport_harness_core::models::Index;
use bugreport_harness_core::observer::BuildObserver;
use bugreport_harness_core::CoreError;

use crate::config::Config;
use crate::document::{load_document, LoadedDocument};
use crate::index_store;
use crate::progress::ProgressMode;
use crate::providers;
use crate::session_log::{SessionEvent, SessionLog};

/// What `index_document` did.
#[derive(Debug)]
pub enum IndexOutcome {
    /// A matching index already existed.
    Reused { path: PathBuf, index: Index },
    /// A new index was built and saved.
    Built {
        path: PathBuf,
        index: Index,
        report: BuildReport,
    },
}

/// Find the newest saved index built from this exact document with the
/// current chunking and embedding settings.
pub fn find_reusable(cfg: &Config, digest: &str) -> Result<Option<(PathBuf, Index)>> {
    for entry in index_store::list(&cfg.index.dir)? {
        let Some(index) = index_store::load(&entry.path) else {
            continue;
        };
        let matches = index.source_digest.as_deref() == Some(digest)
            && index.chunk_size == cfg.index.chunk_size
            && index.chunk_overlap == cfg.index.chunk_overlap
            && index.model == cfg.embedding.model_name()
            && index.is_searchable();
        if matches {
            return Ok(Some((entry.path, index)));
        }
    }
    Ok(None)
}

/// Build (or reuse) and save the index for `doc`.
///
/// A cancelled or aborted build is never saved.
pub async fn index_document(
    cfg: &Config,
    doc: &LoadedDocument,
    provider: &dyn EmbeddingProvider,
    observer: &dyn BuildObserver,
    force: bool,
) -> Result<IndexOutcome> {
    let digest = doc.digest();

    if !force {
        if let Some((path, index)) = find_reusable(cfg, &digest)? {
            tracing::info!(path = %path.display(), "reusing existing index");
            return Ok(IndexOutcome::Reused { path, index });
        }
    }

    let build_config = cfg.index.build_config();
    let limit = build_config.max_failed_chunks;
    let outcome = IndexBuilder::new(provider, cfg.embedding.model_name(), build_config)
        .with_observer(observer)
        .with_source_digest(digest)
        .build(&doc.text, &doc.source_id)
        .await;
    let report = outcome.report;

    if report.cancelled {
        bail!(
            "index build cancelled after {} of {} chunks; nothing saved",
            report.chunks_embedded + report.chunks_failed,
            report.chunks_total
        );
    }
    if report.aborted {
        let err = CoreError::FailureLimitExceeded {
            failed: report.chunks_failed,
            limit: limit.unwrap_or_default(),
        };
        return Err(anyhow::Error::new(err).context("index build aborted; nothing saved"));
    }
    if !outcome.index.is_searchable() {
        tracing::warn!(
            source = %doc.source_id,
            "no chunk produced an embedding; the saved index cannot answer questions"
        );
    }

    let path = index_store::save(&outcome.index, &cfg.index.dir)?;
    Ok(IndexOutcome::Built {
        path,
        index: outcome.index,
        report,
    })
}

/// Run `brh index <path>`.
pub async fn run_index(
    cfg: &Config,
    path: &Path,
    force: bool,
    dry_run: bool,
    progress: ProgressMode,
    log: &SessionLog,
) -> Result<()> {
    let doc = load_document(path)?;

    if dry_run {
        let chunks = chunk_text(&doc.text, cfg.index.chunk_size, cfg.index.chunk_overlap);
        println!("index {} (dry-run)", doc.source_id);
        println!("  document bytes: {}", doc.text.len());
        println!("  estimated chunks: {}", chunks.len());
        println!("  digest: {}", doc.digest());
        return Ok(());
    }

    if !cfg.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in the config to build an index.");
    }
    let provider = providers::embedding_provider(cfg)?;

    let observer = progress.reporter();
    let flag = observer.flag();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("cancelling after the current chunk...");
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    });

    let result = index_document(cfg, &doc, provider.as_ref(), &observer, force).await;
    ctrl_c.abort();

    match result? {
        IndexOutcome::Reused { path, index } => {
            println!("index {}", doc.source_id);
            println!("  up to date: {}", path.display());
            println!("  embeddings: {}", index.embeddings.len());
            println!("ok");
        }
        IndexOutcome::Built {
            path,
            index,
            report,
        } => {
            log.record(&SessionEvent::IndexBuilt {
                source_id: &index.source_id,
                path: path.display().to_string(),
                model: &index.model,
                report: &report,
            });
            println!("index {}", doc.source_id);
            println!("  chunks: {}", report.chunks_total);
            println!("  embedded: {}", report.chunks_embedded);
            println!("  split: {}", report.chunks_split);
            println!("  failed: {}", report.chunks_failed);
            println!("  embeddings written: {}", report.pieces_embedded);
            println!("  saved: {}", path.display());
            println!("ok");
        }
    }
    Ok(())
}

/// Run `brh indexes`: saved indexes, newest first.
pub fn run_list(cfg: &Config) -> Result<()> {
    let entries = index_store::list(&cfg.index.dir)?;
    if entries.is_empty() {
        println!("No indexes in {}.", cfg.index.dir.display());
        return Ok(());
    }

    for entry in entries {
        let name = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match index_store::load(&entry.path) {
            Some(index) => {
                println!("{}", name);
                println!("    source: {}", index.source_id);
                println!("    created: {}", index.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
                println!("    model: {}", index.model);
                println!(
                    "    chunks: {}  embeddings: {}",
                    index.chunks.len(),
                    index.embeddings.len()
                );
            }
            None => println!("{}  (corrupt)", name),
        }
    }
    Ok(())
}

//! Embedding index builder.
//!
//! Chunks a document, embeds every chunk through an [`EmbeddingProvider`],
//! and assembles an [`Index`]. Chunks are embedded one at a time, in order.
//!
//! # Robust embedding
//!
//! Each chunk is truncated to `max_embed_chars` and sent as one piece. When
//! the provider rejects a piece ([`CoreError::RequestRejected`], usually
//! "input too long"), the piece is cut in two near its middle and both
//! halves are retried, left first, up to `max_split_depth` levels deep. Any
//! other failure gives up on that piece. A chunk therefore yields zero,
//! one, or several embeddings.
//!
//! Every embedded piece gets a fresh sequential id and is stored as its own
//! [`Chunk`] carrying the text actually embedded and the offset range of the
//! original chunk. Chunks that produce nothing are counted in
//! [`BuildReport::chunks_failed`] and reported to the observer; the build
//! itself only stops on cancellation or when the optional
//! `max_failed_chunks` cap is exceeded.
//!
//! If no embedding at all was produced, the index keeps the original chunk
//! list with an empty `embeddings` list: structurally valid, not searchable.

use chrono::Utc;
use serde::Serialize;

use crate::chunk::chunk_text;
use crate::embedding::{l2_normalize, EmbeddingProvider};
use crate::error::CoreError;
use crate::models::{Chunk, ChunkEmbedding, Index};
use crate::observer::{BuildObserver, NoopObserver};

/// Chunking and embedding parameters for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Chunk text is cut to this many bytes before the first attempt.
    /// Zero disables truncation.
    pub max_embed_chars: usize,
    pub max_split_depth: usize,
    /// Pieces shorter than this are not split further.
    pub min_split_chars: usize,
    /// The observer is warned once the failed-chunk count exceeds this.
    pub failure_warn_threshold: usize,
    /// Stop the build once the failed-chunk count exceeds this.
    pub max_failed_chunks: Option<usize>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            chunk_size: 6000,
            chunk_overlap: 600,
            max_embed_chars: 8000,
            max_split_depth: 3,
            min_split_chars: 256,
            failure_warn_threshold: 50,
            max_failed_chunks: None,
        }
    }
}

/// Counters describing how a build went.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Chunks produced by the chunker.
    pub chunks_total: usize,
    /// Chunks that produced at least one embedding.
    pub chunks_embedded: usize,
    /// Chunks that had to be split to embed.
    pub chunks_split: usize,
    /// Chunks that produced nothing.
    pub chunks_failed: usize,
    /// Embeddings stored in the index.
    pub pieces_embedded: usize,
    pub cancelled: bool,
    pub aborted: bool,
}

impl BuildReport {
    /// True when the build ran over every chunk.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && !self.aborted
    }
}

/// The built index together with its report.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub index: Index,
    pub report: BuildReport,
}

/// Builds an [`Index`] from document text.
pub struct IndexBuilder<'a> {
    provider: &'a dyn EmbeddingProvider,
    model: String,
    config: BuildConfig,
    observer: &'a dyn BuildObserver,
    source_digest: Option<String>,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(
        provider: &'a dyn EmbeddingProvider,
        model: impl Into<String>,
        config: BuildConfig,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            config,
            observer: &NoopObserver,
            source_digest: None,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn BuildObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Record a digest of the source text in the built index.
    pub fn with_source_digest(mut self, digest: impl Into<String>) -> Self {
        self.source_digest = Some(digest.into());
        self
    }

    /// Chunk `document`, embed every chunk, and assemble the index.
    ///
    /// Never fails: provider errors are isolated per chunk and show up in
    /// the [`BuildReport`].
    pub async fn build(&self, document: &str, source_id: &str) -> BuildOutcome {
        let cfg = &self.config;
        let created_at = Utc::now();
        let chunks = chunk_text(document, cfg.chunk_size, cfg.chunk_overlap);
        let total = chunks.len();

        let mut report = BuildReport {
            chunks_total: total,
            ..Default::default()
        };
        let mut stored: Vec<Chunk> = Vec::new();
        let mut embeddings: Vec<ChunkEmbedding> = Vec::new();
        let mut dims: Option<usize> = None;
        let mut warned = false;

        for (i, chunk) in chunks.iter().enumerate() {
            if self.observer.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let text = truncate(&chunk.text, cfg.max_embed_chars);
            let (pieces, last_err) = self.embed_robust(text, &mut dims).await;

            if pieces.is_empty() {
                report.chunks_failed += 1;
                let err = last_err
                    .unwrap_or_else(|| CoreError::Other("no embedding produced".to_string()));
                self.observer.chunk_failed(chunk.id, &err);

                if !warned && report.chunks_failed > cfg.failure_warn_threshold {
                    warned = true;
                    self.observer
                        .failure_threshold_exceeded(report.chunks_failed, cfg.failure_warn_threshold);
                }
            } else {
                report.chunks_embedded += 1;
                if pieces.len() > 1 {
                    report.chunks_split += 1;
                }
                for (piece, vector) in pieces {
                    let id = stored.len() as u64;
                    stored.push(Chunk {
                        id,
                        start_offset: chunk.start_offset,
                        end_offset: chunk.end_offset,
                        text: piece.to_string(),
                    });
                    embeddings.push(ChunkEmbedding {
                        chunk_id: id,
                        vector,
                    });
                }
            }

            self.observer.chunk_done(i + 1, total);

            if let Some(limit) = cfg.max_failed_chunks {
                if report.chunks_failed > limit {
                    report.aborted = true;
                    break;
                }
            }
        }

        report.pieces_embedded = embeddings.len();
        if embeddings.is_empty() {
            stored = chunks;
        }

        BuildOutcome {
            index: Index {
                source_id: source_id.to_string(),
                created_at,
                model: self.model.clone(),
                chunk_size: cfg.chunk_size,
                chunk_overlap: cfg.chunk_overlap,
                source_digest: self.source_digest.clone(),
                chunks: stored,
                embeddings,
            },
            report,
        }
    }

    /// Embed `text`, splitting on rejection. Returns the embedded pieces in
    /// document order and the last error seen.
    async fn embed_robust<'t>(
        &self,
        text: &'t str,
        dims: &mut Option<usize>,
    ) -> (Vec<(&'t str, Vec<f64>)>, Option<CoreError>) {
        let cfg = &self.config;
        let mut pieces = Vec::new();
        let mut last_err = None;
        // Depth-first, left half before right half.
        let mut stack: Vec<(&'t str, usize)> = vec![(text, 0)];

        while let Some((piece, depth)) = stack.pop() {
            if piece.is_empty() {
                continue;
            }
            match self.provider.embed(piece, &self.model).await {
                Ok(raw) => match l2_normalize(&raw) {
                    Some(vector) => match *dims {
                        Some(d) if d != vector.len() => {
                            last_err = Some(CoreError::DimensionMismatch {
                                expected: d,
                                got: vector.len(),
                            });
                        }
                        _ => {
                            *dims = Some(vector.len());
                            pieces.push((piece, vector));
                        }
                    },
                    None => {
                        last_err = Some(CoreError::MalformedResponse(
                            "degenerate embedding vector".to_string(),
                        ));
                    }
                },
                Err(e) => {
                    let can_split = e.is_splittable()
                        && depth < cfg.max_split_depth
                        && piece.len() >= cfg.min_split_chars.max(2);
                    match split_near_middle(piece).filter(|_| can_split) {
                        Some((left, right)) => {
                            stack.push((right, depth + 1));
                            stack.push((left, depth + 1));
                        }
                        None => last_err = Some(e),
                    }
                }
            }
        }

        (pieces, last_err)
    }
}

/// Cut `s` to at most `max` bytes on a char boundary. Zero means no limit.
fn truncate(s: &str, max: usize) -> &str {
    if max == 0 || s.len() <= max {
        return s;
    }
    let mut i = max;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    &s[..i]
}

/// Split `s` in two near the middle, preferring a newline, then a space,
/// in the second quarter of the text.
fn split_near_middle(s: &str) -> Option<(&str, &str)> {
    let mut mid = s.len() / 2;
    while mid > 0 && !s.is_char_boundary(mid) {
        mid -= 1;
    }
    if mid == 0 {
        return None;
    }

    let first = &s[..mid];
    let floor = mid / 2;
    let cut = first
        .rfind('\n')
        .map(|p| p + 1)
        .filter(|&p| p > floor)
        .or_else(|| first.rfind(' ').map(|p| p + 1).filter(|&p| p > floor))
        .unwrap_or(mid);

    Some((&s[..cut], &s[cut..]))
}

//! Similarity retrieval over an [`Index`].
//!
//! The retriever embeds the question with the model recorded in the index,
//! scores every stored embedding by cosine similarity, and returns the
//! top-K chunks. Ranking itself ([`rank`]) is pure and synchronous, so it is
//! safe to call concurrently against a shared index.
//!
//! # Ranking
//!
//! 1. Score each [`ChunkEmbedding`](crate::models::ChunkEmbedding) against
//!    the query vector.
//! 2. Sort by score, descending. The sort is stable, so ties keep index
//!    order.
//! 3. Truncate to `top_k`.

use std::collections::HashMap;

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::Result;
use crate::models::{Chunk, Index, ScoredChunk};

/// Embed `question` and return the `top_k` most similar chunks.
///
/// An index without embeddings yields an empty result and the provider is
/// not called.
///
/// # Errors
///
/// Provider errors from embedding the question, and
/// [`CoreError::DimensionMismatch`](crate::error::CoreError::DimensionMismatch)
/// when the query vector length differs from the stored vectors.
pub async fn retrieve(
    provider: &dyn EmbeddingProvider,
    question: &str,
    index: &Index,
    top_k: usize,
) -> Result<Vec<ScoredChunk>> {
    if !index.is_searchable() || top_k == 0 {
        return Ok(Vec::new());
    }
    let query_vec = provider.embed(question, &index.model).await?;
    rank(&query_vec, index, top_k)
}

/// Score every embedding in `index` against `query_vec` and keep the best
/// `top_k`, highest first.
pub fn rank(query_vec: &[f64], index: &Index, top_k: usize) -> Result<Vec<ScoredChunk>> {
    let by_id: HashMap<u64, &Chunk> = index.chunks.iter().map(|c| (c.id, c)).collect();

    let mut scored: Vec<(f64, &Chunk)> = Vec::with_capacity(index.embeddings.len());
    for emb in &index.embeddings {
        let score = cosine_similarity(query_vec, &emb.vector)?;
        // Embeddings whose chunk is missing violate the index invariant; skip them.
        if let Some(chunk) = by_id.get(&emb.chunk_id) {
            scored.push((score, chunk));
        }
    }

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);

    Ok(scored
        .into_iter()
        .map(|(score, chunk)| ScoredChunk {
            chunk: chunk.clone(),
            score,
        })
        .collect())
}

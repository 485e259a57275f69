//! Core data models: chunks, embeddings, and the persisted index.
//!
//! These are the records that flow between the chunker, the index builder,
//! the index store, and the retriever. The persisted JSON uses camelCase
//! field names; unknown fields are ignored on load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A contiguous window of the source document.
///
/// Offsets are byte offsets into the UTF-8 document and always fall on
/// `char` boundaries. Adjacent chunks overlap on purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: u64,
    pub start_offset: usize,
    pub end_offset: usize,
    pub text: String,
}

impl Chunk {
    /// Length of the covered range in bytes.
    pub fn span(&self) -> usize {
        self.end_offset - self.start_offset
    }
}

/// An embedding vector for one entry of [`Index::chunks`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkEmbedding {
    pub chunk_id: u64,
    pub vector: Vec<f64>,
}

/// The persisted collection of chunks and embeddings for one document.
///
/// Every [`ChunkEmbedding::chunk_id`] refers to a chunk in `chunks`. An
/// index with no embeddings is structurally valid but cannot serve
/// retrieval; see [`Index::is_searchable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub source_id: String,
    pub created_at: DateTime<Utc>,
    pub model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Hex SHA-256 of the full source text, when the caller supplied one.
    #[serde(default)]
    pub source_digest: Option<String>,
    pub chunks: Vec<Chunk>,
    pub embeddings: Vec<ChunkEmbedding>,
}

impl Index {
    /// True when at least one embedding is available for retrieval.
    pub fn is_searchable(&self) -> bool {
        !self.embeddings.is_empty()
    }

    /// Dimensionality of the stored vectors, taken from the first embedding.
    pub fn dims(&self) -> Option<usize> {
        self.embeddings.first().map(|e| e.vector.len())
    }

    /// Look up a chunk by id.
    pub fn chunk(&self, id: u64) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.id == id)
    }

    /// Check that every embedding references a chunk in this index.
    pub fn embeddings_consistent(&self) -> bool {
        let ids: std::collections::HashSet<u64> = self.chunks.iter().map(|c| c.id).collect();
        self.embeddings.iter().all(|e| ids.contains(&e.chunk_id))
    }
}

/// A chunk paired with its similarity to a query. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
}

//! # Bugreport Harness Core
//!
//! The retrieval pipeline behind Bugreport Harness: data models, chunking,
//! the embedding index builder, similarity retrieval, grounded prompt
//! construction, and map-reduce summarization, together with the provider
//! traits and registry they are driven through.
//!
//! This crate contains no tokio, filesystem I/O, or network code. Concrete
//! providers, persistence and the CLI live in the `bugreport-harness`
//! application crate.
//!
//! ## Pipeline
//!
//! ```text
//! document ─► chunk::chunk_text ─► builder::IndexBuilder ─► models::Index
//!                                                              │
//! question ─► search::retrieve ◄───────────────────────────────┘
//!                   │
//!                   ▼
//!          prompt::build_prompt ─► CompletionProvider
//!
//! document ─► summarize::summarize ─► SegmentSummarizer (map, then merge)
//! ```

pub mod builder;
pub mod chunk;
pub mod completion;
pub mod embedding;
pub mod error;
pub mod models;
pub mod observer;
pub mod prompt;
pub mod registry;
pub mod search;
pub mod summarize;

pub use error::{CoreError, Result};

//! # Bugreport Harness
//!
//! Retrieval-augmented question answering and map-reduce summarization for
//! Android bugreports.
//!
//! The algorithms (chunking, index building, retrieval, grounded prompts,
//! summarization) live in `bugreport-harness-core`. This crate supplies
//! everything with side effects: configuration, HTTP providers, the index
//! store, document loading, progress output and the `brh` commands.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  bugreport  │──▶│ Chunk + Embed │──▶│ Index Store  │
//! │  .txt/.zip  │   │ (core builder)│   │ JSON files   │
//! └──────┬──────┘   └──────────────┘   └──────┬───────┘
//!        │                                    │
//!        ▼                                    ▼
//! ┌─────────────┐                      ┌──────────────┐
//! │  Summarize  │                      │ Retrieve +   │
//! │ (map/merge) │                      │ Grounded ask │
//! └─────────────┘                      └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`document`] | Bugreport loading (`.txt`, `.zip`) |
//! | [`http`] | JSON-over-HTTP with retry |
//! | [`embedding`] | OpenAI / Ollama embedding providers |
//! | [`completion`] | OpenAI / Anthropic / Ollama chat providers |
//! | [`providers`] | Provider registries from config |
//! | [`index_store`] | Index persistence |
//! | [`progress`] | Build progress reporting |
//! | [`session_log`] | Append-only session log |
//! | [`index_cmd`], [`ask`], [`summarize_cmd`] | CLI commands |

pub mod ask;
pub mod completion;
pub mod config;
pub mod document;
pub mod embedding;
pub mod http;
pub mod index_cmd;
pub mod index_store;
pub mod progress;
pub mod providers;
pub mod session_log;
pub mod summarize_cmd;

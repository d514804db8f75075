//! # Campus Assistant
//!
//! A retrieval-augmented chat backend for college campus questions. The
//! pipeline itself lives in `campus-assistant-core`; this crate adds the
//! outer shell around it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────────┐
//! │ HTTP/CLI │──▶│   Services   │──▶│ ChatService      │
//! └──────────┘   │ (Arc-shared) │   │ Indexer          │
//!                └──────┬───────┘   └──────────────────┘
//!                       │
//!     ┌─────────────┬───┴──────────┬──────────────┐
//!     ▼             ▼              ▼              ▼
//! Embeddings     LLM client    SqliteIndex    FsImageStore
//! (OpenAI/Ollama (OpenAI-compat (vectors)     (files + images)
//!  /hash)         /Ollama)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | tracing subscriber setup |
//! | [`embedding`] | Embedding provider backends |
//! | [`llm`] | Chat model backends |
//! | [`http`] | JSON client with retry/backoff |
//! | [`sqlite_index`] | SQLite vector index |
//! | [`images`] | Filesystem image store |
//! | [`extract`] | PDF/text extraction |
//! | [`services`] | Collaborator wiring and lifecycle |
//! | [`server`] | axum HTTP API |
//! | [`commands`] | CLI command implementations |
//! | [`db`], [`migrate`] | Database connection and schema |

pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod http;
pub mod images;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod server;
pub mod services;
pub mod sqlite_index;

//! # Campus Assistant Core
//!
//! The retrieval pipeline and chat orchestration engine of the campus
//! assistant, with the collaborator traits it depends on.
//!
//! This crate performs no I/O of its own: embedding models, vector
//! indexes, language models and image stores are reached through traits,
//! and the application crate supplies the concrete HTTP/SQLite versions.
//!
//! # Pipeline
//!
//! ```text
//! question ─▶ intent ─▶ category ─▶ retrieval ─▶ images ─▶ answer ─▶ ChatResponse
//!               │                      │
//!               └─ canned reply        └─ EmbeddingProvider + VectorIndex
//! ```
//!
//! | Module | Role |
//! |--------|------|
//! | [`intent`] | Local intent short-circuit |
//! | [`category`] | Question to segment keyword |
//! | [`retrieval`] | Segment fan-out, threshold, ranking |
//! | [`images`] | Image store trait and label matching |
//! | [`answer`] | Prompt construction and generation |
//! | [`chat`] | Orchestrator and response envelope |
//! | [`chunk`], [`indexer`] | Chunking and ingestion |
//! | [`embedding`], [`index`], [`llm`] | Collaborator traits |

pub mod answer;
pub mod category;
pub mod chat;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod images;
pub mod index;
pub mod indexer;
pub mod intent;
pub mod llm;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod models;
pub mod retrieval;

pub use error::{Error, Result};

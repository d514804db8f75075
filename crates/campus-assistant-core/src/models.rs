//! Data model shared by the retrieval pipeline and the chat orchestrator.
//!
//! These types are the records stored in the vector index, the candidates
//! produced by retrieval, and the request/response envelope of one chat turn.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the unnamed default segment of the vector index.
pub const DEFAULT_SEGMENT: &str = "";

/// Metadata stored alongside every vector.
///
/// `text` holds the raw chunk content shown to the answer formatter.
/// Free-form fields that have no typed slot go into `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    pub category: String,
    pub source: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub indexed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// One `(id, vector, metadata)` triple in a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A hit returned by [`VectorIndex::query`](crate::index::VectorIndex::query).
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    /// `None` when the query asked for no metadata.
    pub metadata: Option<ChunkMetadata>,
}

/// A scored chunk produced by retrieval, tagged with the segment it came from.
///
/// The chunk text is lifted out of the metadata into [`Candidate::text`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub namespace: String,
    pub metadata: Option<ChunkMetadata>,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A labelled image filed under a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub label: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
}

/// Conversational intents answered without retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Greeting,
    Farewell,
    Thanks,
    Ack,
    Confusion,
    Praise,
    HowRu,
    Help,
    Identity,
    Mood,
    Time,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Farewell => "farewell",
            Intent::Thanks => "thanks",
            Intent::Ack => "ack",
            Intent::Confusion => "confusion",
            Intent::Praise => "praise",
            Intent::HowRu => "howru",
            Intent::Help => "help",
            Intent::Identity => "identity",
            Intent::Mood => "mood",
            Intent::Time => "time",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentMatch {
    pub intent: Intent,
    pub response: String,
}

/// Incoming chat request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default = "default_use_rag")]
    pub use_rag: bool,
    #[serde(default)]
    pub conversation_history: Vec<Turn>,
}

fn default_use_rag() -> bool {
    true
}

impl ChatRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            conversation_id: None,
            use_rag: true,
            conversation_history: Vec::new(),
        }
    }
}

/// The complete structured response for one chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<Candidate>,
    pub images: Vec<Image>,
    pub category: Option<String>,
    pub conversation_id: String,
    pub timestamp: DateTime<Utc>,
    pub used_rag: bool,
    pub handled_locally: bool,
}

/// Result of `describe()` on a vector index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Record count per segment name.
    pub segments: BTreeMap<String, usize>,
    pub dimension: usize,
    pub total_records: usize,
}

/// Outcome of indexing one text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReport {
    pub success: bool,
    pub message: String,
    pub namespace: String,
    pub category: String,
    pub chunks_indexed: usize,
    pub chunks_failed: usize,
    pub ids: Vec<String>,
}

/// Lowercase, trim and replace whitespace runs with `_`.
///
/// Segment and category names are stored in this form.
pub fn sanitize_name(raw: &str) -> String {
    raw.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

//! Indexer: chunk, embed and upsert source text into the vector index.
//!
//! Each chunk is embedded and written on its own, so one bad chunk does not
//! sink the rest of the document. A chunk fails when its embedding call
//! errors, when the vector has the wrong dimension, or when the upsert
//! errors. Indexing succeeds if at least one chunk was stored.
//!
//! Vector ids are `{category}_{unix_millis}_{chunk_index}`. The namespace
//! defaults to the sanitized category.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::category::GENERAL_CATEGORY;
use crate::chunk::chunk_text;
use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::index::{check_dimension, DeleteTarget, VectorIndex};
use crate::models::{sanitize_name, ChunkMetadata, IndexReport, IndexStats, VectorRecord};

/// Chunking parameters, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            chunk_size: 300,
            chunk_overlap: 50,
        }
    }
}

/// Descriptive metadata supplied with a text to index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexMetadata {
    pub category: Option<String>,
    pub source: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl IndexMetadata {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Default::default()
        }
    }
}

pub struct Indexer {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    chunking: ChunkingParams,
}

impl Indexer {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        chunking: ChunkingParams,
    ) -> Self {
        Self {
            embedder,
            index,
            chunking,
        }
    }

    /// Chunk, embed and store `text`.
    ///
    /// Never returns an error: failures are reported in the [`IndexReport`].
    #[instrument(skip_all, fields(subsystem = "indexer", op = "index_text"))]
    pub async fn index_text(
        &self,
        text: &str,
        metadata: IndexMetadata,
        namespace: Option<&str>,
    ) -> IndexReport {
        let start = Instant::now();
        let category = metadata
            .category
            .as_deref()
            .map(sanitize_name)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| GENERAL_CATEGORY.to_string());
        let namespace = namespace
            .map(sanitize_name)
            .unwrap_or_else(|| category.clone());
        let mut report = IndexReport {
            success: false,
            message: String::new(),
            namespace: namespace.clone(),
            category: category.clone(),
            chunks_indexed: 0,
            chunks_failed: 0,
            ids: Vec::new(),
        };

        let chunks = chunk_text(text, self.chunking.chunk_size, self.chunking.chunk_overlap);
        if chunks.is_empty() {
            report.message = "Empty text provided".to_string();
            return report;
        }

        let total_chunks = chunks.len();
        let indexed_at = Utc::now();
        let stamp = indexed_at.timestamp_millis();
        let source = metadata.source.clone().unwrap_or_else(|| "admin".to_string());

        for chunk in chunks {
            let id = format!("{}_{}_{}", category, stamp, chunk.index);
            let record_metadata = ChunkMetadata {
                text: chunk.text.clone(),
                category: category.clone(),
                source: source.clone(),
                chunk_index: chunk.index,
                total_chunks,
                indexed_at,
                extra: metadata.extra.clone(),
            };
            match self.store_chunk(&namespace, &id, &chunk.text, record_metadata).await {
                Ok(()) => {
                    report.chunks_indexed += 1;
                    report.ids.push(id);
                }
                Err(e) => {
                    warn!(chunk_index = chunk.index, error = %e, "chunk failed to index");
                    report.chunks_failed += 1;
                }
            }
        }

        report.success = report.chunks_indexed > 0;
        report.message = if report.success {
            format!(
                "Indexed {} of {} chunks into '{}'",
                report.chunks_indexed, total_chunks, namespace
            )
        } else {
            format!("All {} chunks failed to index", total_chunks)
        };
        info!(
            namespace = %namespace,
            chunks_indexed = report.chunks_indexed,
            chunks_failed = report.chunks_failed,
            duration_ms = start.elapsed().as_millis() as u64,
            "text indexed"
        );
        report
    }

    /// Index a document under `category`, using the category as namespace.
    pub async fn index_document(
        &self,
        text: &str,
        category: &str,
        source: &str,
        extra: BTreeMap<String, String>,
    ) -> IndexReport {
        let metadata = IndexMetadata {
            category: Some(category.to_string()),
            source: Some(source.to_string()),
            extra,
        };
        self.index_text(text, metadata, None).await
    }

    async fn store_chunk(
        &self,
        namespace: &str,
        id: &str,
        text: &str,
        metadata: ChunkMetadata,
    ) -> Result<()> {
        let values = self.embedder.embed(text).await?;
        check_dimension(self.index.dimension(), &values)?;
        let record = VectorRecord {
            id: id.to_string(),
            values,
            metadata,
        };
        self.index.upsert(namespace, std::slice::from_ref(&record)).await?;
        Ok(())
    }

    /// Delete specific records from a namespace.
    ///
    /// The namespace is sanitized the same way [`Indexer::index_text`] does.
    pub async fn delete(&self, namespace: &str, ids: Vec<String>) -> Result<()> {
        if ids.is_empty() {
            return Err(Error::InvalidInput("no ids given".to_string()));
        }
        let namespace = sanitize_name(namespace);
        self.index.delete(&namespace, DeleteTarget::Ids(ids)).await
    }

    /// Remove every record of a namespace.
    pub async fn wipe(&self, namespace: &str) -> Result<()> {
        let namespace = sanitize_name(namespace);
        info!(namespace = %namespace, "wiping namespace");
        self.index.delete(&namespace, DeleteTarget::All).await
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        self.index.describe().await
    }
}

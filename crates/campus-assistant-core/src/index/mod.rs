//! Vector index abstraction.
//!
//! A vector index stores `(id, vector, metadata)` records partitioned into
//! named segments (namespaces). Segments are created implicitly on first
//! upsert and disappear when their last record is deleted.
//!
//! Implementations must be `Send + Sync`: one index instance is shared by
//! all concurrent chat and indexing requests. No transactional isolation is
//! required; a query may or may not observe an in-flight upsert.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`upsert`](VectorIndex::upsert) | Insert or replace records in a segment |
//! | [`query`](VectorIndex::query) | Top-k cosine similarity within one segment |
//! | [`delete`](VectorIndex::delete) | Delete by id, or wipe a whole segment |
//! | [`describe`](VectorIndex::describe) | Segment names, record counts, dimension |

pub mod memory;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{IndexStats, QueryMatch, VectorRecord};

/// What to remove from a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Ids(Vec<String>),
    All,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Fixed vector dimension of this index.
    fn dimension(&self) -> usize;

    /// Insert or replace records. Returns the number of records written.
    ///
    /// Fails with [`Error::DimensionMismatch`] if any record has the wrong
    /// dimension; in that case nothing is written.
    async fn upsert(&self, segment: &str, records: &[VectorRecord]) -> Result<usize>;

    /// Top `top_k` records of `segment` by descending similarity.
    ///
    /// Querying a segment that does not exist returns an empty list.
    async fn query(
        &self,
        segment: &str,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>>;

    async fn delete(&self, segment: &str, target: DeleteTarget) -> Result<()>;

    async fn describe(&self) -> Result<IndexStats>;
}

/// Check a vector against the index dimension.
pub fn check_dimension(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(Error::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

//! In-memory [`VectorIndex`] for tests and single-process deployments.
//!
//! Segments are `Vec`s of records behind a `std::sync::RwLock`, kept in
//! insertion order. Queries are brute-force cosine similarity over the
//! segment.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{check_dimension, DeleteTarget, VectorIndex};
use crate::embedding::similarity_score;
use crate::error::{Error, Result};
use crate::models::{IndexStats, QueryMatch, VectorRecord};

pub struct InMemoryIndex {
    dimension: usize,
    segments: RwLock<BTreeMap<String, Vec<VectorRecord>>>,
}

impl InMemoryIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            segments: RwLock::new(BTreeMap::new()),
        }
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::Index("in-memory index lock poisoned".to_string())
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, segment: &str, records: &[VectorRecord]) -> Result<usize> {
        for record in records {
            check_dimension(self.dimension, &record.values)?;
        }
        let mut segments = self.segments.write().map_err(poisoned)?;
        let stored = segments.entry(segment.to_string()).or_default();
        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        Ok(records.len())
    }

    async fn query(
        &self,
        segment: &str,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>> {
        check_dimension(self.dimension, vector)?;
        let segments = self.segments.read().map_err(poisoned)?;
        let Some(stored) = segments.get(segment) else {
            return Ok(Vec::new());
        };
        let mut matches: Vec<QueryMatch> = stored
            .iter()
            .map(|r| QueryMatch {
                id: r.id.clone(),
                score: similarity_score(vector, &r.values),
                metadata: include_metadata.then(|| r.metadata.clone()),
            })
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete(&self, segment: &str, target: DeleteTarget) -> Result<()> {
        let mut segments = self.segments.write().map_err(poisoned)?;
        match target {
            DeleteTarget::All => {
                segments.remove(segment);
            }
            DeleteTarget::Ids(ids) => {
                if let Some(stored) = segments.get_mut(segment) {
                    stored.retain(|r| !ids.contains(&r.id));
                    if stored.is_empty() {
                        segments.remove(segment);
                    }
                }
            }
        }
        Ok(())
    }

    async fn describe(&self) -> Result<IndexStats> {
        let segments = self.segments.read().map_err(poisoned)?;
        let counts: BTreeMap<String, usize> = segments
            .iter()
            .map(|(name, records)| (name.clone(), records.len()))
            .collect();
        Ok(IndexStats {
            total_records: counts.values().sum(),
            segments: counts,
            dimension: self.dimension,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use chrono::Utc;

    fn record(id: &str, values: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            values,
            metadata: ChunkMetadata {
                text: format!("text of {}", id),
                category: "events".to_string(),
                source: "test".to_string(),
                chunk_index: 0,
                total_chunks: 1,
                indexed_at: Utc::now(),
                extra: Default::default(),
            },
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let index = InMemoryIndex::new(2);
        index
            .upsert(
                "events",
                &[record("far", vec![0.0, 1.0]), record("near", vec![1.0, 0.1])],
            )
            .await
            .unwrap();
        let hits = index.query("events", &[1.0, 0.0], 10, true).await.unwrap();
        assert_eq!(hits[0].id, "near");
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(hits[0].metadata.as_ref().unwrap().text, "text of near");
    }

    #[tokio::test]
    async fn test_query_without_metadata() {
        let index = InMemoryIndex::new(2);
        index.upsert("", &[record("a", vec![1.0, 0.0])]).await.unwrap();
        let hits = index.query("", &[1.0, 0.0], 1, false).await.unwrap();
        assert!(hits[0].metadata.is_none());
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let index = InMemoryIndex::new(3);
        let err = index
            .upsert("events", &[record("a", vec![1.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(index.describe().await.unwrap().total_records, 0);
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let index = InMemoryIndex::new(2);
        index.upsert("s", &[record("a", vec![1.0, 0.0])]).await.unwrap();
        index.upsert("s", &[record("a", vec![0.0, 1.0])]).await.unwrap();
        let stats = index.describe().await.unwrap();
        assert_eq!(stats.segments.get("s"), Some(&1));
    }

    #[tokio::test]
    async fn test_delete_ids_and_wipe() {
        let index = InMemoryIndex::new(2);
        index
            .upsert(
                "clubs",
                &[record("a", vec![1.0, 0.0]), record("b", vec![0.0, 1.0])],
            )
            .await
            .unwrap();
        index
            .delete("clubs", DeleteTarget::Ids(vec!["a".to_string()]))
            .await
            .unwrap();
        assert_eq!(index.describe().await.unwrap().segments.get("clubs"), Some(&1));
        index.delete("clubs", DeleteTarget::All).await.unwrap();
        assert!(index.describe().await.unwrap().segments.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_segment_is_empty() {
        let index = InMemoryIndex::new(2);
        assert!(index.query("nope", &[1.0, 0.0], 5, true).await.unwrap().is_empty());
    }
}

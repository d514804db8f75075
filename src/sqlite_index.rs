//! SQLite-backed [`VectorIndex`].
//!
//! Records live in the `vectors` table, one row per `(segment, id)`.
//! Embeddings are little-endian `f32` BLOBs and metadata is JSON. Queries
//! load every vector of the segment and rank by cosine similarity in
//! process, which is fine for campus-sized corpora.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

use campus_assistant_core::embedding::{blob_to_vec, similarity_score, vec_to_blob};
use campus_assistant_core::index::{check_dimension, DeleteTarget, VectorIndex};
use campus_assistant_core::models::{ChunkMetadata, IndexStats, QueryMatch, VectorRecord};
use campus_assistant_core::{Error, Result};

pub struct SqliteIndex {
    pool: SqlitePool,
    dimension: usize,
}

impl SqliteIndex {
    /// Wrap a pool whose schema has already been migrated.
    pub fn new(pool: SqlitePool, dimension: usize) -> Self {
        Self { pool, dimension }
    }
}

fn index_err(e: impl std::fmt::Display) -> Error {
    Error::Index(e.to_string())
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, segment: &str, records: &[VectorRecord]) -> Result<usize> {
        for record in records {
            check_dimension(self.dimension, &record.values)?;
        }

        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(index_err)?;
        for record in records {
            let metadata_json = serde_json::to_string(&record.metadata).map_err(index_err)?;
            sqlx::query(
                r#"
                INSERT INTO vectors (segment, id, embedding, metadata_json, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(segment, id) DO UPDATE SET
                    embedding = excluded.embedding,
                    metadata_json = excluded.metadata_json,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(segment)
            .bind(&record.id)
            .bind(vec_to_blob(&record.values))
            .bind(metadata_json)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(index_err)?;
        }
        tx.commit().await.map_err(index_err)?;

        tracing::debug!(segment, records = records.len(), "vectors upserted");
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

        let rows = sqlx::query(
            "SELECT id, embedding, metadata_json FROM vectors WHERE segment = ? ORDER BY rowid",
        )
        .bind(segment)
        .fetch_all(&self.pool)
        .await
        .map_err(index_err)?;

        let mut matches = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.get("embedding");
            let stored = blob_to_vec(&blob);
            if stored.len() != self.dimension {
                tracing::warn!(segment, id = %row.get::<String, _>("id"), "skipping vector with wrong dimension");
                continue;
            }
            let metadata = if include_metadata {
                let json: Option<String> = row.get("metadata_json");
                match json.as_deref().map(serde_json::from_str::<ChunkMetadata>) {
                    Some(Ok(meta)) => Some(meta),
                    Some(Err(e)) => return Err(index_err(e)),
                    None => None,
                }
            } else {
                None
            };
            matches.push(QueryMatch {
                id: row.get("id"),
                score: similarity_score(vector, &stored),
                metadata,
            });
        }

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete(&self, segment: &str, target: DeleteTarget) -> Result<()> {
        match target {
            DeleteTarget::All => {
                sqlx::query("DELETE FROM vectors WHERE segment = ?")
                    .bind(segment)
                    .execute(&self.pool)
                    .await
                    .map_err(index_err)?;
            }
            DeleteTarget::Ids(ids) => {
                let mut tx = self.pool.begin().await.map_err(index_err)?;
                for id in &ids {
                    sqlx::query("DELETE FROM vectors WHERE segment = ? AND id = ?")
                        .bind(segment)
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .map_err(index_err)?;
                }
                tx.commit().await.map_err(index_err)?;
            }
        }
        Ok(())
    }

    async fn describe(&self) -> Result<IndexStats> {
        let rows = sqlx::query("SELECT segment, COUNT(*) AS n FROM vectors GROUP BY segment")
            .fetch_all(&self.pool)
            .await
            .map_err(index_err)?;

        let segments: BTreeMap<String, usize> = rows
            .iter()
            .map(|row| {
                let n: i64 = row.get("n");
                (row.get::<String, _>("segment"), n as usize)
            })
            .collect();

        Ok(IndexStats {
            total_records: segments.values().sum(),
            segments,
            dimension: self.dimension,
        })
    }
}

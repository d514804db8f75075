//! Retrieval engine: segment selection, fan-out queries and merge policy.
//!
//! # Segment selection
//!
//! ```text
//! primary segments ∪ {""} ∪ {category, unless generic} ∪ describe().segments
//!                 └── describe() failed ──▶ primary segments ∪ {""}
//! ```
//!
//! Generic categories are `general`, `greeting` and `query`. Names are
//! merged in first-seen order so no segment is queried twice.
//!
//! # Merge policy
//!
//! 1. Embed the question once.
//! 2. Query every selected segment concurrently (`per_segment_k` hits each,
//!    metadata included). A failing segment is logged and skipped.
//! 3. Tag each hit with its segment and drop hits scoring below `min_score`.
//! 4. Concatenate in segment order, stable-sort by descending score and
//!    truncate to `top_k`. Ties keep segment order.
//!
//! Duplicate ids across segments are kept unless `dedupe_by_id` is set.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, instrument, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::models::{Candidate, QueryMatch, DEFAULT_SEGMENT};

/// Categories that never name a segment of their own.
pub const GENERIC_CATEGORIES: [&str; 3] = ["general", "greeting", "query"];

/// Segments where curated content is known to live.
pub fn default_primary_segments() -> Vec<String> {
    vec!["about".to_string(), "general".to_string(), "total".to_string()]
}

/// Tuning knobs for [`Retriever`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalParams {
    pub top_k: usize,
    pub per_segment_k: usize,
    pub min_score: f32,
    pub primary_segments: Vec<String>,
    pub dedupe_by_id: bool,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            per_segment_k: 10,
            min_score: 0.15,
            primary_segments: default_primary_segments(),
            dedupe_by_id: false,
        }
    }
}

pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    params: RetrievalParams,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        params: RetrievalParams,
    ) -> Self {
        Self {
            embedder,
            index,
            params,
        }
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    /// Segments to search for a question in `category`.
    pub async fn select_segments(&self, category: Option<&str>) -> Vec<String> {
        let mut selected = Vec::new();
        let mut seen = HashSet::new();
        let mut add = |name: &str| {
            if seen.insert(name.to_string()) {
                selected.push(name.to_string());
            }
        };

        for segment in &self.params.primary_segments {
            add(segment.as_str());
        }
        add(DEFAULT_SEGMENT);

        match self.index.describe().await {
            Ok(stats) => {
                if let Some(category) = category.filter(|c| !is_generic(c)) {
                    add(category);
                }
                for name in stats.segments.keys() {
                    add(name.as_str());
                }
            }
            Err(e) => {
                warn!(error = %e, "describe failed, searching primary segments only");
            }
        }
        selected
    }

    /// Ranked candidates for `question`, at most `top_k` of them.
    ///
    /// Embedding failures propagate. Per-segment query failures do not.
    #[instrument(skip_all, fields(subsystem = "retrieval", op = "retrieve", category = category.unwrap_or("")))]
    pub async fn retrieve(&self, question: &str, category: Option<&str>) -> Result<Vec<Candidate>> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();

        let segments = self.select_segments(category).await;
        let vector = self.embedder.embed(question).await?;

        let queries = segments.iter().map(|segment| {
            let vector = &vector;
            async move {
                let result = self
                    .index
                    .query(segment, vector, self.params.per_segment_k, true)
                    .await;
                (segment, result)
            }
        });

        let mut hits = Vec::new();
        for (segment, result) in join_all(queries).await {
            match result {
                Ok(matches) => {
                    debug!(segment = %segment, hits = matches.len(), "segment queried");
                    hits.extend(matches.into_iter().map(|m| into_candidate(m, segment)));
                }
                Err(e) => warn!(segment = %segment, error = %e, "segment query failed, skipping"),
            }
        }

        let candidates = merge_candidates(hits, &self.params);
        debug!(
            segments = segments.len(),
            candidates = candidates.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "retrieval complete"
        );
        Ok(candidates)
    }
}

/// True for categories that never name a segment of their own.
pub fn is_generic(category: &str) -> bool {
    GENERIC_CATEGORIES.contains(&category)
}

/// Apply threshold, optional de-duplication, stable descending sort and truncation.
pub fn merge_candidates(hits: Vec<Candidate>, params: &RetrievalParams) -> Vec<Candidate> {
    let mut survivors: Vec<Candidate> = hits
        .into_iter()
        .filter(|c| c.score >= params.min_score)
        .collect();

    if params.dedupe_by_id {
        let mut seen = HashSet::new();
        survivors.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        survivors.retain(|c| seen.insert(c.id.clone()));
    }

    survivors.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    survivors.truncate(params.top_k);
    survivors
}

fn into_candidate(hit: QueryMatch, segment: &str) -> Candidate {
    let mut metadata = hit.metadata;
    let text = metadata
        .as_mut()
        .map(|m| std::mem::take(&mut m.text))
        .unwrap_or_default();
    Candidate {
        id: hit.id,
        score: hit.score,
        text,
        namespace: segment.to_string(),
        metadata,
    }
}

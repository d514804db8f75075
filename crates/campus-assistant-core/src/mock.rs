//! Scripted collaborators for tests (enabled by the `mock` feature).
//!
//! - [`ScriptedModel`]: replies chosen by substring rules, records every request.
//! - [`CountingEmbedder`]: wraps a provider and counts embedding calls.
//! - [`StubIndex`]: canned per-segment hits with injectable failures.
//! - [`StaticImages`]: fixed images per category, optionally failing.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::images::ImageStore;
use crate::index::{DeleteTarget, VectorIndex};
use crate::llm::{CompletionRequest, LanguageModel};
use crate::models::{Image, IndexStats, QueryMatch, VectorRecord};

/// Language model whose replies are scripted by substring rules.
///
/// A rule matches when its needle occurs in the system prompt or the prompt.
/// The first matching rule wins; otherwise the default reply is returned.
pub struct ScriptedModel {
    rules: Vec<(String, String)>,
    default_reply: String,
    fail: bool,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            default_reply: default_reply.into(),
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A model whose every call fails with a generation error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    pub fn respond_when(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push((needle.into(), reply.into()));
        self
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }
        if self.fail {
            return Err(Error::Generation("scripted failure".to_string()));
        }
        let system = request.system_prompt.as_deref().unwrap_or("");
        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| system.contains(needle) || request.prompt.contains(needle))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default_reply.clone());
        Ok(reply)
    }
}

/// Counts calls made to the wrapped embedding provider.
pub struct CountingEmbedder<E> {
    inner: E,
    calls: AtomicUsize,
}

impl<E> CountingEmbedder<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<E: EmbeddingProvider> EmbeddingProvider for CountingEmbedder<E> {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dims(&self) -> usize {
        self.inner.dims()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_batch(texts).await
    }
}

/// Vector index with canned query results.
///
/// `describe()` lists the segments that have canned hits.
pub struct StubIndex {
    dimension: usize,
    hits: BTreeMap<String, Vec<QueryMatch>>,
    failing_segments: HashSet<String>,
    fail_describe: bool,
    queried: Mutex<Vec<String>>,
}

impl StubIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            hits: BTreeMap::new(),
            failing_segments: HashSet::new(),
            fail_describe: false,
            queried: Mutex::new(Vec::new()),
        }
    }

    pub fn with_hits(mut self, segment: &str, hits: Vec<QueryMatch>) -> Self {
        self.hits.insert(segment.to_string(), hits);
        self
    }

    pub fn failing_segment(mut self, segment: &str) -> Self {
        self.failing_segments.insert(segment.to_string());
        self.hits.entry(segment.to_string()).or_default();
        self
    }

    pub fn failing_describe(mut self) -> Self {
        self.fail_describe = true;
        self
    }

    /// Segments queried so far, in call order.
    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VectorIndex for StubIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, _segment: &str, _records: &[VectorRecord]) -> Result<usize> {
        Err(Error::Index("stub index is read-only".to_string()))
    }

    async fn query(
        &self,
        segment: &str,
        _vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>> {
        if let Ok(mut q) = self.queried.lock() {
            q.push(segment.to_string());
        }
        if self.failing_segments.contains(segment) {
            return Err(Error::Index(format!("segment {} unavailable", segment)));
        }
        Ok(self
            .hits
            .get(segment)
            .map(|hits| {
                hits.iter()
                    .take(top_k)
                    .cloned()
                    .map(|mut m| {
                        if !include_metadata {
                            m.metadata = None;
                        }
                        m
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, _segment: &str, _target: DeleteTarget) -> Result<()> {
        Err(Error::Index("stub index is read-only".to_string()))
    }

    async fn describe(&self) -> Result<IndexStats> {
        if self.fail_describe {
            return Err(Error::Index("describe unavailable".to_string()));
        }
        let segments: BTreeMap<String, usize> = self
            .hits
            .iter()
            .map(|(name, hits)| (name.clone(), hits.len()))
            .collect();
        Ok(IndexStats {
            total_records: segments.values().sum(),
            segments,
            dimension: self.dimension,
        })
    }
}

/// Fixed images per category.
#[derive(Default)]
pub struct StaticImages {
    images: BTreeMap<String, Vec<Image>>,
    fail: bool,
}

impl StaticImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_image(mut self, category: &str, label: &str) -> Self {
        self.images
            .entry(category.to_string())
            .or_default()
            .push(Image {
                label: label.to_string(),
                url: format!("http://localhost/api/v1/images/file/{}/{}.png", category, label),
                description: String::new(),
                category: category.to_string(),
            });
        self
    }
}

#[async_trait]
impl ImageStore for StaticImages {
    async fn list_by_category(&self, category: &str) -> Result<Vec<Image>> {
        if self.fail {
            return Err(Error::ImageStore("image store unavailable".to_string()));
        }
        Ok(self.images.get(category).cloned().unwrap_or_default())
    }
}

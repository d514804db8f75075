//! Category detection.
//!
//! Reduces a free-text question to one lowercase keyword naming the index
//! segment most likely to hold the answer. The keyword comes from a short,
//! low-temperature completion with a few-shot system prompt.
//!
//! [`CategoryDetector::try_detect`] reports model failures as errors.
//! [`CategoryDetector::detect`] is the boundary used by the chat path: it
//! maps any failure to [`GENERAL_CATEGORY`] so detection never fails a turn.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::llm::{CompletionRequest, LanguageModel};

/// Fallback category when detection is unclear or fails.
pub const GENERAL_CATEGORY: &str = "general";

pub const CATEGORY_TEMPERATURE: f32 = 0.1;
pub const CATEGORY_MAX_TOKENS: u32 = 10;

pub const CATEGORY_SYSTEM_PROMPT: &str = "You classify student questions for a college campus assistant.
Reply with exactly ONE lowercase keyword and nothing else: no spaces, no punctuation, no explanation.
Use underscores instead of spaces. If the topic is unclear, reply: general

Examples:
Question: Who is the chairman of the college? -> about
Question: When is the annual tech fest? -> events
Question: Which companies came for campus placements? -> placements
Question: What does the Infosys hiring process look like? -> companies
Question: How do I prepare for a technical interview? -> interviews
Question: Are there summer internships for second years? -> internships
Question: Give me a roadmap to become a data scientist -> roadmaps
Question: How should I format my resume? -> guides
Question: Which coding clubs can I join? -> clubs
Question: What scholarships are available for merit students? -> scholarships
Question: Tell me something -> general";

/// Language-model backed question classifier.
pub struct CategoryDetector {
    model: Arc<dyn LanguageModel>,
}

impl CategoryDetector {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Classify `question`, propagating model errors.
    pub async fn try_detect(&self, question: &str) -> Result<String> {
        let request = CompletionRequest::new(
            format!("Question: {}\nKeyword:", question.trim()),
            CATEGORY_TEMPERATURE,
            CATEGORY_MAX_TOKENS,
        )
        .with_system(CATEGORY_SYSTEM_PROMPT);
        let raw = self.model.complete(&request).await?;
        Ok(normalize_category(&raw))
    }

    /// Classify `question`, falling back to [`GENERAL_CATEGORY`] on any error.
    #[instrument(skip_all, fields(subsystem = "chat", op = "detect_category"))]
    pub async fn detect(&self, question: &str) -> String {
        let start = Instant::now();
        match self.try_detect(question).await {
            Ok(category) => {
                debug!(
                    category = %category,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "category detected"
                );
                category
            }
            Err(e) => {
                warn!(error = %e, "category detection failed, using general");
                GENERAL_CATEGORY.to_string()
            }
        }
    }
}

/// Turn a raw completion into a segment-style keyword.
///
/// Keeps the first non-empty line, strips surrounding punctuation and
/// quotes, lowercases, and joins whitespace-separated words with `_`.
/// Returns [`GENERAL_CATEGORY`] when nothing is left.
pub fn normalize_category(raw: &str) -> String {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    let stripped = line.trim_matches(|c: char| !(c.is_alphanumeric() || c == '_'));
    let keyword = stripped
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_");
    if keyword.is_empty() {
        GENERAL_CATEGORY.to_string()
    } else {
        keyword
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedModel {
        reply: std::result::Result<String, String>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl FixedModel {
        fn new(reply: std::result::Result<&str, &str>) -> Self {
            Self {
                reply: reply.map(str::to_string).map_err(str::to_string),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for FixedModel {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone().map_err(Error::Generation)
        }
    }

    #[test]
    fn test_normalize_category() {
        assert_eq!(normalize_category("  Events "), "events");
        assert_eq!(normalize_category("Resume Guides"), "resume_guides");
        assert_eq!(normalize_category("\"placements\"."), "placements");
        assert_eq!(normalize_category("clubs\nBecause the question..."), "clubs");
        assert_eq!(normalize_category(""), "general");
        assert_eq!(normalize_category(" ... "), "general");
    }

    #[tokio::test]
    async fn test_detect_uses_low_temperature_prompt() {
        let model = Arc::new(FixedModel::new(Ok("Events")));
        let detector = CategoryDetector::new(model.clone());
        assert_eq!(detector.detect("When is the fest?").await, "events");

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].temperature, CATEGORY_TEMPERATURE);
        assert_eq!(seen[0].max_tokens, CATEGORY_MAX_TOKENS);
        assert_eq!(seen[0].system_prompt.as_deref(), Some(CATEGORY_SYSTEM_PROMPT));
        assert!(seen[0].prompt.contains("When is the fest?"));
    }

    #[tokio::test]
    async fn test_model_error_becomes_general() {
        let detector = CategoryDetector::new(Arc::new(FixedModel::new(Err("offline"))));
        assert!(detector.try_detect("anything").await.is_err());
        assert_eq!(detector.detect("anything").await, GENERAL_CATEGORY);
    }

    #[tokio::test]
    async fn test_empty_completion_becomes_general() {
        let detector = CategoryDetector::new(Arc::new(FixedModel::new(Ok("   "))));
        assert_eq!(detector.detect("anything").await, GENERAL_CATEGORY);
    }
}

//! Chat orchestrator.
//!
//! Sequences the pipeline for one chat turn and assembles the response
//! envelope:
//!
//! ```text
//! START ─▶ INTENT_CHECK ─┬─ matched ──────────────────────────────▶ HANDLED_LOCALLY ─┐
//!                        ├─ use_rag = false ─▶ model(question) ───▶ DIRECT_PATH ─────┤
//!                        └─ otherwise ─▶ category ─▶ retrieve ─▶ images              │
//!                                          ├─ no candidates ─▶ fixed message ─▶ RAG ─┤
//!                                          └─ format answer ─────────────────▶ RAG ─┴─▶ RESPONDED
//! ```
//!
//! | Failure | Effect on the turn |
//! |---------|--------------------|
//! | category detection | absorbed, category `general` |
//! | per-segment query / describe | absorbed inside retrieval |
//! | image lookup | absorbed, no images |
//! | question embedding | fatal, error returned |
//! | answer generation | fatal, error returned |
//!
//! The orchestrator keeps no state between turns. History comes from the
//! caller. A supplied conversation id is passed through unchanged; a missing
//! or blank one is replaced with a fresh UUID.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::answer::AnswerFormatter;
use crate::category::CategoryDetector;
use crate::error::Result;
use crate::images::{match_images, ImageStore};
use crate::intent::IntentHandler;
use crate::llm::LanguageModel;
use crate::models::{ChatRequest, ChatResponse};
use crate::retrieval::Retriever;

/// Answer returned when retrieval finds nothing relevant.
pub const NO_INFORMATION_MESSAGE: &str = "I couldn't find any relevant information in the knowledge base. \
Please try rephrasing your question or ask about:
• Management (Chairman, Principal, HODs)
• Campus Events & Activities
• Placements, Companies & Interviews
• Internships, Roadmaps & Guides
• Student Clubs & Scholarships";

/// Answer returned when the model produced an empty completion.
pub const EMPTY_ANSWER_MESSAGE: &str =
    "I wasn't able to put together an answer for that. Could you rephrase your question?";

/// Which path a chat turn took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPath {
    HandledLocally,
    Direct,
    Rag,
}

impl fmt::Display for ChatPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChatPath::HandledLocally => "handled_locally",
            ChatPath::Direct => "direct",
            ChatPath::Rag => "rag",
        };
        f.write_str(name)
    }
}

/// Entry point for chat turns. Shared by all request tasks.
pub struct ChatService {
    intents: IntentHandler,
    detector: CategoryDetector,
    retriever: Retriever,
    images: Arc<dyn ImageStore>,
    formatter: AnswerFormatter,
}

impl ChatService {
    pub fn new(
        intents: IntentHandler,
        model: Arc<dyn LanguageModel>,
        retriever: Retriever,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            intents,
            detector: CategoryDetector::new(model.clone()),
            retriever,
            images,
            formatter: AnswerFormatter::new(model),
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer one chat turn.
    #[instrument(skip_all, fields(subsystem = "chat", op = "answer", use_rag = request.use_rag))]
    pub async fn answer(&self, request: ChatRequest) -> Result<ChatResponse> {
        let start = Instant::now();
        let conversation_id = request
            .conversation_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut response = ChatResponse {
            answer: String::new(),
            sources: Vec::new(),
            images: Vec::new(),
            category: None,
            conversation_id,
            timestamp: Utc::now(),
            used_rag: false,
            handled_locally: false,
        };

        let path = if let Some(matched) = self.intents.detect(&request.question) {
            response.answer = matched.response;
            response.category = Some(matched.intent.to_string());
            response.handled_locally = true;
            ChatPath::HandledLocally
        } else if !request.use_rag {
            let answer = self.formatter.format_no_context(&request.question).await?;
            response.answer = non_empty_or(answer, EMPTY_ANSWER_MESSAGE);
            ChatPath::Direct
        } else {
            let category = self.detector.detect(&request.question).await;
            let candidates = self
                .retriever
                .retrieve(&request.question, Some(category.as_str()))
                .await?;
            response.images = match_images(self.images.as_ref(), &request.question, &category).await;
            response.answer = if candidates.is_empty() {
                NO_INFORMATION_MESSAGE.to_string()
            } else {
                let answer = self
                    .formatter
                    .format(&request.question, &candidates, &request.conversation_history)
                    .await?;
                non_empty_or(answer, EMPTY_ANSWER_MESSAGE)
            };
            response.sources = candidates;
            response.category = Some(category);
            response.used_rag = true;
            ChatPath::Rag
        };

        info!(
            path = %path,
            category = response.category.as_deref().unwrap_or(""),
            sources = response.sources.len(),
            images = response.images.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "chat turn answered"
        );
        Ok(response)
    }
}

fn non_empty_or(answer: String, fallback: &str) -> String {
    if answer.trim().is_empty() {
        fallback.to_string()
    } else {
        answer
    }
}

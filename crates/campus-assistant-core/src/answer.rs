//! Answer formatting: prompt construction and the generation call.
//!
//! The prompt sent to the model looks like this:
//!
//! ```text
//! Previous Conversation:          ┐ only when history is non-empty,
//! Student: ...                    │ last MAX_HISTORY_TURNS turns
//! Assistant: ...                  ┘
//!
//! Retrieved Information:
//! Source 1:
//! <chunk text>
//!
//! Source 2:
//! <chunk text>
//!
//! Student Question: <question>
//!
//! Answer naturally and concisely.
//! ```
//!
//! Scores and segment names are never put in the prompt; they only appear
//! in the `sources` list of the response envelope.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument};

use crate::error::Result;
use crate::llm::{CompletionRequest, LanguageModel};
use crate::models::{Candidate, Role, Turn};

/// At most this many candidates are shown to the model.
pub const MAX_CONTEXT_SOURCES: usize = 5;
/// At most this many trailing conversation turns are shown to the model.
pub const MAX_HISTORY_TURNS: usize = 5;

pub const ANSWER_TEMPERATURE: f32 = 0.3;
pub const ANSWER_MAX_TOKENS: u32 = 500;
pub const DIRECT_TEMPERATURE: f32 = 0.7;
pub const DIRECT_MAX_TOKENS: u32 = 1000;

pub const ANSWER_SYSTEM_PROMPT: &str = "You are the Campus Assistant for a college: friendly, helpful and knowledgeable.

Answer the student's question using the retrieved information.

How to answer:
1. Read the sources and pick out the facts that answer the question.
2. Answer in your own words. Do not copy the source text.
3. Be concise: 2-5 sentences for a simple question.
4. Include specific details (names, dates, numbers) when they matter.
5. Never mention documents, sources, source numbers or relevance scores.
6. Never say \"according to the document\" or \"based on the retrieved text\".
7. If there is previous conversation, use it to understand follow-up questions.

If none of the sources actually answers the question, apologize briefly and suggest topics you can help with: events, placements, companies, interviews, internships, roadmaps, guides, clubs and scholarships.";

/// Builds answer prompts and calls the language model.
pub struct AnswerFormatter {
    model: Arc<dyn LanguageModel>,
}

impl AnswerFormatter {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Generate an answer grounded in `candidates`.
    ///
    /// Model errors propagate. The returned text may be empty.
    #[instrument(skip_all, fields(subsystem = "chat", op = "format_answer", sources = candidates.len().min(MAX_CONTEXT_SOURCES)))]
    pub async fn format(
        &self,
        question: &str,
        candidates: &[Candidate],
        history: &[Turn],
    ) -> Result<String> {
        let start = Instant::now();
        let request = CompletionRequest::new(
            build_answer_prompt(question, candidates, history),
            ANSWER_TEMPERATURE,
            ANSWER_MAX_TOKENS,
        )
        .with_system(ANSWER_SYSTEM_PROMPT);
        let answer = self.model.complete(&request).await?;
        debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            answer_len = answer.len(),
            "answer generated"
        );
        Ok(answer.trim().to_string())
    }

    /// Answer from the model alone, without retrieved context.
    ///
    /// The raw question is the whole prompt; no system prompt is sent.
    #[instrument(skip_all, fields(subsystem = "chat", op = "format_no_context"))]
    pub async fn format_no_context(&self, question: &str) -> Result<String> {
        let request = CompletionRequest::new(question.trim(), DIRECT_TEMPERATURE, DIRECT_MAX_TOKENS);
        let answer = self.model.complete(&request).await?;
        Ok(answer.trim().to_string())
    }
}

/// Assemble the user prompt for [`AnswerFormatter::format`].
pub fn build_answer_prompt(question: &str, candidates: &[Candidate], history: &[Turn]) -> String {
    let mut prompt = String::new();

    if !history.is_empty() {
        let skip = history.len().saturating_sub(MAX_HISTORY_TURNS);
        prompt.push_str("Previous Conversation:\n");
        for turn in &history[skip..] {
            let speaker = match turn.role {
                Role::User => "Student",
                Role::Assistant => "Assistant",
            };
            prompt.push_str(&format!("{}: {}\n", speaker, turn.content));
        }
        prompt.push('\n');
    }

    let sources = candidates
        .iter()
        .take(MAX_CONTEXT_SOURCES)
        .enumerate()
        .map(|(i, c)| format!("Source {}:\n{}", i + 1, c.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    prompt.push_str("Retrieved Information:\n");
    prompt.push_str(&sources);
    prompt.push_str(&format!(
        "\n\nStudent Question: {}\n\nAnswer naturally and concisely.",
        question.trim()
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(id: &str, text: &str, score: f32) -> Candidate {
        Candidate {
            id: id.to_string(),
            score,
            text: text.to_string(),
            namespace: "events".to_string(),
            metadata: None,
        }
    }

    #[test]
    fn test_prompt_without_history() {
        let prompt = build_answer_prompt(
            "When is the fest?",
            &[cand("a", "The fest is in March.", 0.91)],
            &[],
        );
        assert_eq!(
            prompt,
            "Retrieved Information:\nSource 1:\nThe fest is in March.\n\n\
             Student Question: When is the fest?\n\nAnswer naturally and concisely."
        );
    }

    #[test]
    fn test_prompt_hides_scores_and_segments() {
        let prompt = build_answer_prompt("q", &[cand("a", "text", 0.734)], &[]);
        assert!(!prompt.contains("0.734"));
        assert!(!prompt.contains("events"));
    }

    #[test]
    fn test_prompt_caps_sources() {
        let cands: Vec<_> = (0..8).map(|i| cand(&i.to_string(), &format!("t{}", i), 0.5)).collect();
        let prompt = build_answer_prompt("q", &cands, &[]);
        assert!(prompt.contains("Source 5:"));
        assert!(!prompt.contains("Source 6:"));
    }

    #[test]
    fn test_prompt_keeps_last_five_turns() {
        let history: Vec<Turn> = (0..7)
            .map(|i| {
                if i % 2 == 0 {
                    Turn::user(format!("u{}", i))
                } else {
                    Turn::assistant(format!("a{}", i))
                }
            })
            .collect();
        let prompt = build_answer_prompt("q", &[], &history);
        assert!(prompt.starts_with("Previous Conversation:\nStudent: u2\nAssistant: a3\n"));
        assert!(!prompt.contains("u0"));
        assert!(!prompt.contains("a1"));
        assert!(prompt.contains("Student: u6\n\nRetrieved Information:"));
    }
}

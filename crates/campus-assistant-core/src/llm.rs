//! Language model trait.
//!
//! The core needs exactly one capability from a chat model: turn a prompt
//! (plus an optional system prompt) into text. Concrete HTTP clients live in
//! the app crate.

use async_trait::async_trait;

use crate::error::Result;

/// Parameters of one completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            temperature,
            max_tokens,
        }
    }

    pub fn with_system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Generate a completion.
    ///
    /// An empty string is a valid result; callers treat it as "no usable answer".
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

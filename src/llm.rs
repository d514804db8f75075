//! Chat model clients.
//!
//! - **[`DisabledModel`]**: fails every call; chat falls back to local intents only.
//! - **[`OpenAICompatModel`]**: `POST {url}/chat/completions`. Works with
//!   OpenAI, LM Studio, vLLM and other compatible servers.
//! - **[`OllamaModel`]**: `POST {url}/api/chat` with `stream: false`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use campus_assistant_core::llm::{CompletionRequest, LanguageModel};
use campus_assistant_core::Error;

use crate::config::LlmConfig;
use crate::http::JsonClient;

/// LM Studio's default local endpoint.
const DEFAULT_OPENAI_COMPAT_URL: &str = "http://127.0.0.1:1234/v1";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _request: &CompletionRequest) -> campus_assistant_core::Result<String> {
        Err(Error::Generation("LLM provider is disabled".to_string()))
    }
}

pub struct OpenAICompatModel {
    model: String,
    client: JsonClient,
}

impl OpenAICompatModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for openai provider"))?;
        let bearer = match &config.api_key_env {
            Some(var) => Some(
                std::env::var(var)
                    .map_err(|_| anyhow::anyhow!("{} environment variable not set", var))?,
            ),
            None => None,
        };
        let url = config.url.as_deref().unwrap_or(DEFAULT_OPENAI_COMPAT_URL);
        let client = JsonClient::new(url, bearer, config.timeout_secs, config.max_retries)?;
        Ok(Self { model, client })
    }
}

#[async_trait]
impl LanguageModel for OpenAICompatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> campus_assistant_core::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": chat_messages(request),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        let json = self
            .client
            .post("/chat/completions", &body)
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;
        parse_openai_completion(&json).map_err(|e| Error::Generation(e.to_string()))
    }
}

pub struct OllamaModel {
    model: String,
    client: JsonClient,
}

impl OllamaModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for ollama provider"))?;
        let url = config.url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
        let client = JsonClient::new(url, None, config.timeout_secs, config.max_retries)?;
        Ok(Self { model, client })
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> campus_assistant_core::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": chat_messages(request),
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            },
        });
        let json = self
            .client
            .post("/api/chat", &body)
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;
        parse_ollama_completion(&json).map_err(|e| Error::Generation(e.to_string()))
    }
}

fn chat_messages(request: &CompletionRequest) -> Vec<serde_json::Value> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system_prompt {
        messages.push(serde_json::json!({ "role": "system", "content": system }));
    }
    messages.push(serde_json::json!({ "role": "user", "content": request.prompt }));
    messages
}

/// `choices[0].message.content`; a `null` content reads as empty.
fn parse_openai_completion(json: &serde_json::Value) -> Result<String> {
    let message = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing choices[0].message"))?;
    Ok(message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string())
}

fn parse_ollama_completion(json: &serde_json::Value) -> Result<String> {
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message.content"))
}

/// Create the configured [`LanguageModel`].
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "openai" => Ok(Arc::new(OpenAICompatModel::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaModel::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_include_system_prompt() {
        let request = CompletionRequest::new("Question?", 0.3, 500).with_system("Be brief.");
        let messages = chat_messages(&request);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "Question?");

        let bare = chat_messages(&CompletionRequest::new("Hi", 0.7, 1000));
        assert_eq!(bare.len(), 1);
    }

    #[test]
    fn test_parse_openai_completion() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "events" } }]
        });
        assert_eq!(parse_openai_completion(&json).unwrap(), "events");

        let null_content = serde_json::json!({ "choices": [{ "message": { "content": null } }] });
        assert_eq!(parse_openai_completion(&null_content).unwrap(), "");

        assert!(parse_openai_completion(&serde_json::json!({ "choices": [] })).is_err());
    }

    #[test]
    fn test_parse_ollama_completion() {
        let json = serde_json::json!({ "message": { "role": "assistant", "content": "hello" }, "done": true });
        assert_eq!(parse_ollama_completion(&json).unwrap(), "hello");
        assert!(parse_ollama_completion(&serde_json::json!({})).is_err());
    }

    #[tokio::test]
    async fn test_disabled_model_is_generation_failure() {
        let model = create_model(&LlmConfig::default()).unwrap();
        let err = model
            .complete(&CompletionRequest::new("x", 0.1, 10))
            .await
            .unwrap_err();
        assert!(err.is_model_failure());
    }
}

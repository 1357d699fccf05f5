//! Language model capability
//!
//! Provides:
//! - OpenAI chat completions client
//! - Mock extractive model, for offline runs and tests

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::retry::{error_body, transport_error, with_retry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Trait for single-turn text completion
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete `prompt`, returning the raw model output
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

fn generation_error(message: String) -> AppError {
    AppError::Generation { message }
}

/// OpenAI chat completions client
pub struct OpenAIChatModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_retries: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl OpenAIChatModel {
    pub fn new(api_key: String, config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let base = config
            .api_base
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", base.trim_end_matches('/')),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    async fn call_llm(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self.client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(generation_error, e))?;

        if !response.status().is_success() {
            return Err(AppError::Generation {
                message: format!("LLM API error {}", error_body(response).await),
            });
        }

        let chat_response: ChatResponse = response.json().await
            .map_err(|e| AppError::Generation {
                message: format!("Failed to parse LLM response: {}", e),
            })?;

        chat_response.choices.into_iter().next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::Generation {
                message: "Empty response from LLM".to_string(),
            })
    }
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        with_retry("generation", self.max_retries, || self.call_llm(prompt)).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock model that answers with the first context passage in the prompt
///
/// Falls back to `fallback` when the prompt carries no `Content:` line.
pub struct MockLanguageModel {
    fallback: String,
    calls: AtomicUsize,
}

impl MockLanguageModel {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            fallback: fallback.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of completions requested
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let answer = prompt
            .lines()
            .find_map(|line| line.strip_prefix("Content: "))
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| self.fallback.clone());

        Ok(answer)
    }

    fn model_name(&self) -> &str {
        "mock-llm"
    }
}

/// Create a language model based on configuration
///
/// `refusal` is what the mock model answers when it sees no context.
pub fn create_language_model(config: &LlmConfig, refusal: &str) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "openai" => {
            let key = config.api_key.clone().ok_or_else(|| {
                AppError::configuration("llm.api_key (or OPENAI_API_KEY) is required")
            })?;
            Ok(Arc::new(OpenAIChatModel::new(key, config)?))
        }
        "mock" => Ok(Arc::new(MockLanguageModel::new(refusal))),
        other => Err(AppError::configuration(format!(
            "unknown llm provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_answers_from_context() {
        let model = MockLanguageModel::new("no idea");
        let prompt = "Context:\nSource: a.txt (Page 1)\nContent: The sky is blue.\n\nQuestion: What color is the sky?";

        assert_eq!(model.complete(prompt).await.unwrap(), "The sky is blue.");
        assert_eq!(model.complete("Question: ?").await.unwrap(), "no idea");
        assert_eq!(model.calls(), 2);
    }

    #[test]
    fn test_chat_request_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage { role: "user", content: "hi" }],
            temperature: 0.1,
            max_tokens: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_chat_response_without_content() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}

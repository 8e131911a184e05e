// SPDX-License-Identifier: MIT

//! OpenAI Model - chat completions implementation of `LanguageModel`

use super::LanguageModel;
use crate::adk::error::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// OpenAI chat completions client
pub struct OpenAIModel {
    client: Client,
    api_key: String,
    base_url: String,
    system_prompt: String,
}

impl std::fmt::Debug for OpenAIModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIModel")
            .field("base_url", &self.base_url)
            .field("system_prompt", &self.system_prompt)
            .finish_non_exhaustive()
    }
}

impl OpenAIModel {
    /// Create a client for an explicit endpoint
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        })
    }

    /// Create a client from the environment
    ///
    /// Reads `OPENAI_API_KEY` (falling back to `API_KEY`) and optionally
    /// `OPENAI_BASE_URL` for custom endpoints.
    pub fn from_env(timeout: Duration) -> Result<Self, ServiceError> {
        let api_key = env::var("OPENAI_API_KEY")
            .or_else(|_| env::var("API_KEY"))
            .map_err(|_| ServiceError::MissingApiKey("openai".to_string()))?;
        let base_url = env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Self::new(api_key, base_url, timeout)
    }

    /// Replace the system message sent ahead of every prompt
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    fn build_request_body(&self, prompt: &str, model: &str, max_tokens: Option<u32>) -> Value {
        let mut body = json!({
            "model": model,
            "messages": [
                {"role": "system", "content": self.system_prompt},
                {"role": "user", "content": prompt}
            ]
        });

        if let Some(max_tokens) = max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }

    /// Extract the first choice's text
    fn parse_response(response: &Value) -> Result<String, ServiceError> {
        let choice = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| ServiceError::InvalidResponse("no choices in response".to_string()))?;

        choice["message"]["content"]
            .as_str()
            .map(|content| content.trim().to_string())
            .ok_or_else(|| ServiceError::InvalidResponse("choice has no text content".to_string()))
    }
}

#[async_trait]
impl LanguageModel for OpenAIModel {
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: Option<u32>,
    ) -> Result<String, ServiceError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request_body(prompt, model, max_tokens);

        log::debug!(
            "OpenAI request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            log::error!("OpenAI API error {}: {}", status, message);
            return Err(ServiceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let resp_json: Value = resp
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;
        log::debug!("OpenAI response: {}", resp_json);

        Self::parse_response(&resp_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> OpenAIModel {
        OpenAIModel::new("sk-test", "https://example.invalid/v1/", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_request_body_has_system_and_user_messages() {
        let body = model().build_request_body("Hello", "gpt-4o-mini", None);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], DEFAULT_SYSTEM_PROMPT);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Hello");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_request_body_with_max_tokens_and_custom_system_prompt() {
        let body = model()
            .with_system_prompt("Be terse.")
            .build_request_body("Hi", "gpt-4o", Some(150));

        assert_eq!(body["max_tokens"], 150);
        assert_eq!(body["messages"][0]["content"], "Be terse.");
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        assert_eq!(model().base_url, "https://example.invalid/v1");
    }

    #[test]
    fn test_parse_text_response() {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "  Hello, how can I help?\n"
                }
            }]
        });

        assert_eq!(
            OpenAIModel::parse_response(&response).unwrap(),
            "Hello, how can I help?"
        );
    }

    #[test]
    fn test_parse_response_without_choices_is_error() {
        let err = OpenAIModel::parse_response(&json!({"choices": []})).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidResponse(_)));

        let err = OpenAIModel::parse_response(&json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        }))
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidResponse(_)));
    }
}

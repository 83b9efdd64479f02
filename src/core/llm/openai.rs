//! OpenAI-compatible chat completions client.
//!
//! Groq exposes the same `/chat/completions` wire shape, so a single client
//! covers both providers with a different base URL and key.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::base::{BaseLLM, CompletionOptions, LLMError, LLMResult};

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";
pub const GROQ_API_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions client for OpenAI-compatible APIs
pub struct OpenAIChatLLM {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    provider_info: &'static str,
}

impl OpenAIChatLLM {
    pub fn new(api_key: impl Into<String>) -> LLMResult<Self> {
        Self::with_endpoint(api_key, OPENAI_API_URL, "OpenAI chat completions")
    }

    pub fn groq(api_key: impl Into<String>) -> LLMResult<Self> {
        Self::with_endpoint(api_key, GROQ_API_URL, "Groq chat completions")
    }

    fn with_endpoint(
        api_key: impl Into<String>,
        base_url: &str,
        provider_info: &'static str,
    ) -> LLMResult<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(LLMError::InvalidConfiguration(
                "API key is required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LLMError::ProviderError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            client,
            base_url: base_url.to_string(),
            provider_info,
        })
    }

    /// Override the API base URL; used by tests pointing at a mock server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_body(prompt: &str, options: &CompletionOptions) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &options.system_prompt {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let mut body = json!({
            "model": options.model,
            "temperature": options.temperature,
            "messages": messages,
        });
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if options.json_response {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

#[async_trait::async_trait]
impl BaseLLM for OpenAIChatLLM {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> LLMResult<String> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %options.model, "Requesting chat completion");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&Self::build_body(prompt, options))
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LLMError::ProviderError(format!(
                "Chat completion returned {status}: {body}"
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LLMError::CompletionFailed(format!("Unparseable response: {e}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| LLMError::CompletionFailed("Completion had no content".to_string()))
    }

    fn get_provider_info(&self) -> &'static str {
        self.provider_info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_empty_api_key_rejected() {
        assert!(matches!(
            OpenAIChatLLM::new(""),
            Err(LLMError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_body_includes_system_and_json_format() {
        let options = CompletionOptions {
            system_prompt: Some("You classify intents.".to_string()),
            json_response: true,
            ..Default::default()
        };
        let body = OpenAIChatLLM::build_body("hello", &options);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[tokio::test]
    async fn test_complete_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({ "model": "gpt-4o-mini" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "hi there" } }]
            })))
            .mount(&server)
            .await;

        let llm = OpenAIChatLLM::new("key").unwrap().with_base_url(server.uri());
        let text = llm
            .complete("hello", &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(text, "hi there");
    }

    #[tokio::test]
    async fn test_empty_choices_is_completion_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let llm = OpenAIChatLLM::new("key").unwrap().with_base_url(server.uri());
        let err = llm
            .complete("hello", &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::CompletionFailed(_)));
    }
}

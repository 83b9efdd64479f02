//! Base trait abstraction for chat-completion LLM providers.

/// LLM-specific error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum LLMError {
    #[error("Completion failed: {0}")]
    CompletionFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Provider error: {0}")]
    ProviderError(String),
}

/// Result type for LLM operations
pub type LLMResult<T> = Result<T, LLMError>;

/// Per-request completion options.
///
/// Agents own their prompting strategy, so everything request-shaped lives
/// here rather than in provider construction.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Optional system prompt prepended to the user message
    pub system_prompt: Option<String>,
    /// Ask the provider for a JSON object response
    pub json_response: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: None,
            system_prompt: None,
            json_response: false,
        }
    }
}

/// Base trait for chat-completion providers
#[async_trait::async_trait]
pub trait BaseLLM: Send + Sync {
    /// Run a single-turn completion and return the assistant text
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> LLMResult<String>;

    /// Get provider-specific information
    fn get_provider_info(&self) -> &'static str;
}

/// Strip a Markdown code fence from a model response, if present.
///
/// Models asked for JSON frequently wrap it in ```json fences even when told
/// not to; downstream parsers always want the bare payload.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner
        .strip_prefix("json")
        .or_else(|| inner.strip_prefix("JSON"))
        .unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

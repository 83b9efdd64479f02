mod base;

pub mod openai;

pub use base::{BaseLLM, CompletionOptions, LLMError, LLMResult, strip_code_fence};
pub use openai::{GROQ_API_URL, OPENAI_API_URL, OpenAIChatLLM};

use std::sync::Arc;

/// Factory function to create an LLM provider.
///
/// # Supported Providers
///
/// - `"openai"` - OpenAI chat completions
/// - `"groq"` - Groq's OpenAI-compatible endpoint
pub fn create_llm_provider(provider_type: &str, api_key: &str) -> LLMResult<Arc<dyn BaseLLM>> {
    match provider_type.to_lowercase().as_str() {
        "openai" => Ok(Arc::new(OpenAIChatLLM::new(api_key)?)),
        "groq" => Ok(Arc::new(OpenAIChatLLM::groq(api_key)?)),
        _ => Err(LLMError::InvalidConfiguration(format!(
            "Unsupported LLM provider: {provider_type}. Supported providers: openai, groq"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let err = create_llm_provider("anthropic", "key").err().unwrap();
        assert!(matches!(err, LLMError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_known_providers_resolve() {
        assert!(create_llm_provider("openai", "key").is_ok());
        assert!(create_llm_provider("Groq", "key").is_ok());
    }
}

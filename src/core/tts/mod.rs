mod base;

pub mod deepgram;
pub mod elevenlabs;

pub use base::{AudioData, BaseTTS, TTSConfig, TTSError, TTSResult};
pub use deepgram::{DEEPGRAM_TTS_URL, DeepgramTTS};
pub use elevenlabs::{ELEVENLABS_TTS_URL, ElevenLabsTTS};

/// Factory function to create a TTS provider.
///
/// # Supported Providers
///
/// - `"deepgram"` - Deepgram Aura TTS REST API
/// - `"elevenlabs"` - ElevenLabs TTS REST API
///
/// Unknown provider names fail with `TTSError::InvalidConfiguration` before any
/// synthesis work begins.
pub fn create_tts_provider(provider_type: &str, config: TTSConfig) -> TTSResult<Box<dyn BaseTTS>> {
    match provider_type.to_lowercase().as_str() {
        "deepgram" => Ok(Box::new(DeepgramTTS::new(config)?)),
        "elevenlabs" => Ok(Box::new(ElevenLabsTTS::new(config)?)),
        _ => Err(TTSError::InvalidConfiguration(format!(
            "Unsupported TTS provider: {provider_type}. Supported providers: deepgram, elevenlabs"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let config = TTSConfig {
            api_key: "key".to_string(),
            ..Default::default()
        };
        let err = create_tts_provider("polly", config).err().unwrap();
        assert!(matches!(err, TTSError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_known_providers_resolve() {
        let config = TTSConfig {
            api_key: "key".to_string(),
            ..Default::default()
        };
        assert!(create_tts_provider("deepgram", config.clone()).is_ok());
        assert!(create_tts_provider("ElevenLabs", config).is_ok());
    }
}

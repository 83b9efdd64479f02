//! Base trait abstraction for Text-to-Speech providers.
//!
//! Providers are request/response synthesizers: one text in, one complete audio
//! clip out. Frame pacing, near-end signalling and playback ordering live in the
//! playback sequencer, not here, so providers stay narrow and swappable.

use bytes::Bytes;

/// Audio clip produced by a TTS provider
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Raw audio bytes in the provider-configured format
    pub data: Bytes,
    /// Sample rate of the audio
    pub sample_rate: u32,
    /// Audio format (e.g., "mulaw", "linear16")
    pub format: String,
}

impl AudioData {
    /// Approximate clip duration for single-byte-per-sample mono formats (mulaw)
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.data.len() as u64 * 1000) / self.sample_rate as u64
    }
}

/// TTS-specific error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum TTSError {
    #[error("Audio generation failed: {0}")]
    AudioGenerationFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Provider error: {0}")]
    ProviderError(String),
}

/// Result type for TTS operations
pub type TTSResult<T> = Result<T, TTSError>;

/// Configuration for TTS providers
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct TTSConfig {
    pub provider: String,
    /// API key for the TTS provider
    pub api_key: String,
    /// Voice ID or name to use for synthesis
    pub voice_id: Option<String>,
    /// Model to use for synthesis
    pub model: String,
    /// Audio format preference
    pub audio_format: Option<String>,
    /// Sample rate preference
    pub sample_rate: Option<u32>,
    /// Request timeout in seconds
    pub request_timeout: Option<u64>,
}

impl Default for TTSConfig {
    fn default() -> Self {
        // Telephony defaults, matching the outbound media stream format
        Self {
            provider: String::new(),
            api_key: String::new(),
            voice_id: None,
            model: String::new(),
            audio_format: Some("mulaw".to_string()),
            sample_rate: Some(8000),
            request_timeout: Some(30),
        }
    }
}

/// Base trait for Text-to-Speech providers
#[async_trait::async_trait]
pub trait BaseTTS: Send + Sync {
    /// Create a new instance of the TTS provider with the given configuration
    fn new(config: TTSConfig) -> TTSResult<Self>
    where
        Self: Sized;

    /// Synthesize the given text into a complete audio clip
    async fn synthesize(&self, text: &str) -> TTSResult<AudioData>;

    /// Get the current configuration
    fn get_config(&self) -> &TTSConfig;

    /// Get provider-specific information
    fn get_provider_info(&self) -> &'static str;
}

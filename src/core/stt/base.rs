use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Result structure containing transcription data from STT providers
#[derive(Debug, Clone, PartialEq)]
pub struct STTResult {
    /// The transcribed text from the audio
    pub transcript: String,
    /// Whether this is a final transcription result (not an interim result)
    pub is_final: bool,
    /// Confidence score of the transcription (0.0 to 1.0)
    pub confidence: f32,
}

impl STTResult {
    pub fn new(transcript: String, is_final: bool, confidence: f32) -> Self {
        Self {
            transcript,
            is_final,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Configuration for STT providers
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct STTConfig {
    pub provider: String,
    /// API key for the STT provider
    pub api_key: String,
    /// Language code for transcription (e.g., "en-US")
    pub language: String,
    /// Sample rate of the audio in Hz
    pub sample_rate: u32,
    /// Number of audio channels
    pub channels: u16,
    /// Encoding of the audio
    pub encoding: String,
    /// Model to use for transcription
    pub model: String,
    /// Emit interim (partial) results
    pub interim_results: bool,
}

impl Default for STTConfig {
    fn default() -> Self {
        // Telephony defaults: 8kHz mono mulaw, matching the media stream format
        Self {
            provider: String::new(),
            api_key: String::new(),
            language: "en-US".to_string(),
            sample_rate: 8000,
            channels: 1,
            encoding: "mulaw".to_string(),
            model: "nova-2".to_string(),
            interim_results: true,
        }
    }
}

/// Error types for STT operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum STTError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Type alias for STT result callback
pub type STTResultCallback =
    Arc<dyn Fn(STTResult) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Type alias for STT error callback
pub type STTErrorCallback =
    Arc<dyn Fn(STTError) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Base trait for streaming Speech-to-Text providers
///
/// Lifecycle per turn: `connect`, stream audio via `send_audio`, receive results
/// through the `on_result` callback, `pause` while a reply plays, then
/// `disconnect` and reconnect for the next turn. A final result never restarts
/// the stream implicitly; the caller owns the restart.
///
/// Streaming errors are delivered through the `on_error` callback and move the
/// provider into an error state in which `send_audio` is a logged no-op. The
/// audio-write path never propagates provider failures to the caller.
#[async_trait::async_trait]
pub trait BaseSTT: Send + Sync {
    /// Create a new instance of the STT provider with the given configuration
    fn new(config: STTConfig) -> Result<Self, STTError>
    where
        Self: Sized;

    /// Connect to the STT provider and start the recognition stream
    async fn connect(&mut self) -> Result<(), STTError>;

    /// Disconnect from the STT provider
    async fn disconnect(&mut self) -> Result<(), STTError>;

    /// Check if the stream is ready to accept audio
    fn is_ready(&self) -> bool;

    /// Send audio data to the provider for transcription
    ///
    /// Safe to call in any state: after a streaming error or during pause the
    /// chunk is silently dropped.
    async fn send_audio(&mut self, audio_data: Vec<u8>) -> Result<(), STTError>;

    /// Suppress result delivery without tearing down the connection
    fn pause(&self);

    /// Resume result delivery after a pause
    fn resume(&self);

    /// Register a callback for transcription results
    async fn on_result(&mut self, callback: STTResultCallback) -> Result<(), STTError>;

    /// Register a callback for streaming errors
    ///
    /// Errors occurring after connect (rate limits, provider disconnects) are
    /// reported here instead of out of the audio-write path.
    async fn on_error(&mut self, callback: STTErrorCallback) -> Result<(), STTError>;

    /// Get the current configuration
    fn get_config(&self) -> Option<&STTConfig>;

    /// Get provider-specific information
    fn get_provider_info(&self) -> &'static str;
}

/// Connection state for STT providers
#[derive(Debug, Clone, PartialEq)]
pub enum STTConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockSTT {
        config: Option<STTConfig>,
        connected: AtomicBool,
        paused: AtomicBool,
        callback: Option<STTResultCallback>,
    }

    #[async_trait::async_trait]
    impl BaseSTT for MockSTT {
        fn new(config: STTConfig) -> Result<Self, STTError> {
            Ok(Self {
                config: Some(config),
                connected: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                callback: None,
            })
        }

        async fn connect(&mut self) -> Result<(), STTError> {
            self.connected.store(true, Ordering::Relaxed);
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), STTError> {
            self.connected.store(false, Ordering::Relaxed);
            Ok(())
        }

        fn is_ready(&self) -> bool {
            self.connected.load(Ordering::Relaxed)
        }

        async fn send_audio(&mut self, audio_data: Vec<u8>) -> Result<(), STTError> {
            if !self.is_ready() || self.paused.load(Ordering::Relaxed) {
                return Ok(());
            }
            if let Some(ref callback) = self.callback {
                let result =
                    STTResult::new(format!("heard {} bytes", audio_data.len()), true, 0.95);
                callback(result).await;
            }
            Ok(())
        }

        fn pause(&self) {
            self.paused.store(true, Ordering::Relaxed);
        }

        fn resume(&self) {
            self.paused.store(false, Ordering::Relaxed);
        }

        async fn on_result(&mut self, callback: STTResultCallback) -> Result<(), STTError> {
            self.callback = Some(callback);
            Ok(())
        }

        async fn on_error(&mut self, _callback: STTErrorCallback) -> Result<(), STTError> {
            Ok(())
        }

        fn get_config(&self) -> Option<&STTConfig> {
            self.config.as_ref()
        }

        fn get_provider_info(&self) -> &'static str {
            "MockSTT"
        }
    }

    #[tokio::test]
    async fn test_send_audio_is_noop_when_paused() {
        let mut stt = MockSTT::new(STTConfig::default()).unwrap();
        stt.connect().await.unwrap();

        let received = Arc::new(AtomicBool::new(false));
        let received_clone = received.clone();
        stt.on_result(Arc::new(move |_result| {
            let received = received_clone.clone();
            Box::pin(async move {
                received.store(true, Ordering::Relaxed);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        }))
        .await
        .unwrap();

        stt.pause();
        stt.send_audio(vec![0u8; 160]).await.unwrap();
        assert!(!received.load(Ordering::Relaxed));

        stt.resume();
        stt.send_audio(vec![0u8; 160]).await.unwrap();
        assert!(received.load(Ordering::Relaxed));
    }

    #[test]
    fn test_stt_result_confidence_clamping() {
        let result = STTResult::new("test".to_string(), true, 1.5);
        assert_eq!(result.confidence, 1.0);

        let result = STTResult::new("test".to_string(), false, -0.5);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_stt_config_default_is_telephony() {
        let config = STTConfig::default();
        assert_eq!(config.sample_rate, 8000);
        assert_eq!(config.encoding, "mulaw");
        assert_eq!(config.channels, 1);
        assert!(config.interim_results);
    }
}

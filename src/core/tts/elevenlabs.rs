//! ElevenLabs TTS over the `/v1/text-to-speech` REST API.

use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use super::base::{AudioData, BaseTTS, TTSConfig, TTSError, TTSResult};

pub const ELEVENLABS_TTS_URL: &str = "https://api.elevenlabs.io";

const DEFAULT_VOICE: &str = "21m00Tcm4TlvDq8ikWAM";
const DEFAULT_MODEL: &str = "eleven_turbo_v2";

/// ElevenLabs TTS REST client
pub struct ElevenLabsTTS {
    config: TTSConfig,
    client: reqwest::Client,
    base_url: String,
}

impl ElevenLabsTTS {
    /// Override the API base URL; used by tests pointing at a mock server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// ElevenLabs encodes format and sample rate in a single query value
    fn output_format(&self) -> String {
        let format = self.config.audio_format.as_deref().unwrap_or("mulaw");
        let sample_rate = self.config.sample_rate.unwrap_or(8000);
        match format {
            "mulaw" => format!("ulaw_{sample_rate}"),
            "linear16" => format!("pcm_{sample_rate}"),
            other => other.to_string(),
        }
    }

    fn request_url(&self) -> String {
        let voice = self.config.voice_id.as_deref().unwrap_or(DEFAULT_VOICE);
        format!(
            "{}/v1/text-to-speech/{voice}?output_format={}",
            self.base_url,
            self.output_format()
        )
    }
}

#[async_trait::async_trait]
impl BaseTTS for ElevenLabsTTS {
    fn new(config: TTSConfig) -> TTSResult<Self> {
        if config.api_key.is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "API key is required".to_string(),
            ));
        }

        let timeout = Duration::from_secs(config.request_timeout.unwrap_or(30));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TTSError::ProviderError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            base_url: ELEVENLABS_TTS_URL.to_string(),
        })
    }

    async fn synthesize(&self, text: &str) -> TTSResult<AudioData> {
        let url = self.request_url();
        debug!("Synthesizing {} chars via ElevenLabs TTS", text.len());

        let model = if self.config.model.is_empty() {
            DEFAULT_MODEL
        } else {
            &self.config.model
        };

        let response = self
            .client
            .post(url)
            .header("xi-api-key", &self.config.api_key)
            .json(&serde_json::json!({ "text": text, "model_id": model }))
            .send()
            .await
            .map_err(|e| TTSError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TTSError::ProviderError(format!(
                "ElevenLabs TTS returned {status}: {body}"
            )));
        }

        let data: Bytes = response
            .bytes()
            .await
            .map_err(|e| TTSError::NetworkError(e.to_string()))?;

        if data.is_empty() {
            return Err(TTSError::AudioGenerationFailed(
                "ElevenLabs TTS returned empty audio".to_string(),
            ));
        }

        Ok(AudioData {
            data,
            sample_rate: self.config.sample_rate.unwrap_or(8000),
            format: self
                .config
                .audio_format
                .clone()
                .unwrap_or_else(|| "mulaw".to_string()),
        })
    }

    fn get_config(&self) -> &TTSConfig {
        &self.config
    }

    fn get_provider_info(&self) -> &'static str {
        "ElevenLabs TTS (REST)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_mapping() {
        let tts = ElevenLabsTTS::new(TTSConfig {
            api_key: "key".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(tts.output_format(), "ulaw_8000");

        let tts = ElevenLabsTTS::new(TTSConfig {
            api_key: "key".to_string(),
            audio_format: Some("linear16".to_string()),
            sample_rate: Some(16000),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(tts.output_format(), "pcm_16000");
    }

    #[test]
    fn test_request_url_includes_voice() {
        let tts = ElevenLabsTTS::new(TTSConfig {
            api_key: "key".to_string(),
            voice_id: Some("custom-voice".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert!(
            tts.request_url()
                .contains("/v1/text-to-speech/custom-voice?output_format=ulaw_8000")
        );
    }

    #[tokio::test]
    async fn test_synthesize_against_mock_server() {
        use wiremock::matchers::{header, method, path_regex};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/v1/text-to-speech/.+$"))
            .and(header("xi-api-key", "key"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x7fu8; 800]))
            .mount(&server)
            .await;

        let tts = ElevenLabsTTS::new(TTSConfig {
            api_key: "key".to_string(),
            ..Default::default()
        })
        .unwrap()
        .with_base_url(server.uri());

        let audio = tts.synthesize("good morning").await.unwrap();
        assert_eq!(audio.data.len(), 800);
        assert_eq!(audio.format, "mulaw");
    }
}

//! Deepgram Aura TTS over the `/v1/speak` REST API.

use std::time::Duration;

use bytes::Bytes;
use tracing::debug;
use url::Url;

use super::base::{AudioData, BaseTTS, TTSConfig, TTSError, TTSResult};

pub const DEEPGRAM_TTS_URL: &str = "https://api.deepgram.com/v1/speak";

const DEFAULT_MODEL: &str = "aura-asteria-en";

/// Deepgram TTS REST client
pub struct DeepgramTTS {
    config: TTSConfig,
    client: reqwest::Client,
    base_url: String,
}

impl DeepgramTTS {
    /// Override the API base URL; used by tests pointing at a mock server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_request_url(&self) -> TTSResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| TTSError::InvalidConfiguration(format!("Invalid TTS URL: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            let model = if self.config.model.is_empty() {
                // voice_id doubles as the Aura model name when set
                self.config.voice_id.as_deref().unwrap_or(DEFAULT_MODEL)
            } else {
                &self.config.model
            };
            query.append_pair("model", model);
            if let Some(encoding) = &self.config.audio_format {
                query.append_pair("encoding", encoding);
            }
            if let Some(sample_rate) = self.config.sample_rate {
                query.append_pair("sample_rate", &sample_rate.to_string());
            }
        }

        Ok(url)
    }
}

#[async_trait::async_trait]
impl BaseTTS for DeepgramTTS {
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
            base_url: DEEPGRAM_TTS_URL.to_string(),
        })
    }

    async fn synthesize(&self, text: &str) -> TTSResult<AudioData> {
        let url = self.build_request_url()?;
        debug!("Synthesizing {} chars via Deepgram TTS", text.len());

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Token {}", self.config.api_key))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| TTSError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TTSError::ProviderError(format!(
                "Deepgram TTS returned {status}: {body}"
            )));
        }

        let data: Bytes = response
            .bytes()
            .await
            .map_err(|e| TTSError::NetworkError(e.to_string()))?;

        if data.is_empty() {
            return Err(TTSError::AudioGenerationFailed(
                "Deepgram TTS returned empty audio".to_string(),
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
        "Deepgram TTS (Aura REST)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TTSConfig {
        TTSConfig {
            provider: "deepgram".to_string(),
            api_key: "key".to_string(),
            voice_id: Some("aura-luna-en".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_request_url_uses_voice_as_model() {
        let tts = DeepgramTTS::new(test_config()).unwrap();
        let url = tts.build_request_url().unwrap();

        let params: std::collections::HashMap<String, String> =
            url.query_pairs().into_owned().collect();
        assert_eq!(params.get("model").map(String::as_str), Some("aura-luna-en"));
        assert_eq!(params.get("encoding").map(String::as_str), Some("mulaw"));
        assert_eq!(params.get("sample_rate").map(String::as_str), Some("8000"));
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let config = TTSConfig::default();
        assert!(matches!(
            DeepgramTTS::new(config),
            Err(TTSError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_synthesize_against_mock_server() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x7fu8; 1600]))
            .mount(&server)
            .await;

        let tts = DeepgramTTS::new(test_config())
            .unwrap()
            .with_base_url(server.uri());
        let audio = tts.synthesize("hello there").await.unwrap();

        assert_eq!(audio.data.len(), 1600);
        assert_eq!(audio.sample_rate, 8000);
        assert_eq!(audio.duration_ms(), 200);
    }

    #[tokio::test]
    async fn test_provider_error_on_http_failure() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let tts = DeepgramTTS::new(test_config())
            .unwrap()
            .with_base_url(server.uri());
        let err = tts.synthesize("hello").await.unwrap_err();
        assert!(matches!(err, TTSError::ProviderError(_)));
    }
}

//! Configuration module for the Voxflow server
//!
//! Configuration is environment-driven: every setting has a `VOXFLOW_`-prefixed
//! variable (provider API keys use their conventional names). Validation runs
//! after loading so misconfiguration is surfaced before any stream work begins.

use std::env;
use std::time::Duration;

/// Errors produced while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

/// Server configuration
///
/// Holds everything needed to run the pipeline server:
/// - bind address
/// - provider API keys (STT, TTS, LLM, knowledge endpoint)
/// - pipeline timing knobs (turn debounce, agent timeout, playback settle delay)
/// - pre-call audio cache sizing
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    // Provider API keys
    pub deepgram_api_key: Option<String>,
    pub assemblyai_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub groq_api_key: Option<String>,

    // Knowledge retrieval endpoint (OpenAI-compatible completions API)
    pub knowledge_api_url: Option<String>,
    pub knowledge_api_key: Option<String>,

    // Pipeline timing
    pub turn_debounce_ms: u64,
    pub agent_timeout_ms: u64,
    pub playback_settle_ms: u64,

    // Pre-call audio cache
    pub audio_cache_max_entries: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            deepgram_api_key: None,
            assemblyai_api_key: None,
            elevenlabs_api_key: None,
            openai_api_key: None,
            groq_api_key: None,
            knowledge_api_url: None,
            knowledge_api_key: None,
            turn_debounce_ms: 100,
            agent_timeout_ms: 10_000,
            playback_settle_ms: 200,
            audio_cache_max_entries: 256,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            host: env_or("VOXFLOW_HOST", defaults.host),
            port: parse_env("VOXFLOW_PORT", defaults.port)?,
            deepgram_api_key: env_opt("DEEPGRAM_API_KEY"),
            assemblyai_api_key: env_opt("ASSEMBLYAI_API_KEY"),
            elevenlabs_api_key: env_opt("ELEVENLABS_API_KEY"),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            groq_api_key: env_opt("GROQ_API_KEY"),
            knowledge_api_url: env_opt("VOXFLOW_KNOWLEDGE_API_URL"),
            knowledge_api_key: env_opt("VOXFLOW_KNOWLEDGE_API_KEY"),
            turn_debounce_ms: parse_env("VOXFLOW_TURN_DEBOUNCE_MS", defaults.turn_debounce_ms)?,
            agent_timeout_ms: parse_env("VOXFLOW_AGENT_TIMEOUT_MS", defaults.agent_timeout_ms)?,
            playback_settle_ms: parse_env(
                "VOXFLOW_PLAYBACK_SETTLE_MS",
                defaults.playback_settle_ms,
            )?,
            audio_cache_max_entries: parse_env(
                "VOXFLOW_AUDIO_CACHE_MAX_ENTRIES",
                defaults.audio_cache_max_entries,
            )?,
        })
    }

    /// Bind address for the HTTP server
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn turn_debounce(&self) -> Duration {
        Duration::from_millis(self.turn_debounce_ms)
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_timeout_ms)
    }

    pub fn playback_settle(&self) -> Duration {
        Duration::from_millis(self.playback_settle_ms)
    }

    /// API key for a named STT provider, if configured
    pub fn stt_api_key(&self, provider: &str) -> Option<&str> {
        match provider {
            "deepgram" => self.deepgram_api_key.as_deref(),
            "assemblyai" => self.assemblyai_api_key.as_deref(),
            _ => None,
        }
    }

    /// API key for a named TTS provider, if configured
    pub fn tts_api_key(&self, provider: &str) -> Option<&str> {
        match provider {
            "deepgram" => self.deepgram_api_key.as_deref(),
            "elevenlabs" => self.elevenlabs_api_key.as_deref(),
            _ => None,
        }
    }

    /// API key for a named LLM provider, if configured
    pub fn llm_api_key(&self, provider: &str) -> Option<&str> {
        match provider {
            "openai" => self.openai_api_key.as_deref(),
            "groq" => self.groq_api_key.as_deref(),
            _ => None,
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(name: &str, default: String) -> String {
    env_opt(name).unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env_opt(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.turn_debounce_ms, 100);
        assert_eq!(config.agent_timeout_ms, 10_000);
        assert_eq!(config.address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_provider_key_lookup() {
        let config = ServerConfig {
            deepgram_api_key: Some("dg-key".to_string()),
            ..Default::default()
        };
        assert_eq!(config.stt_api_key("deepgram"), Some("dg-key"));
        assert_eq!(config.tts_api_key("deepgram"), Some("dg-key"));
        assert_eq!(config.stt_api_key("unknown"), None);
    }
}

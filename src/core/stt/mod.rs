mod base;

pub mod assemblyai;
pub mod deepgram;

pub use base::{
    BaseSTT, STTConfig, STTConnectionState, STTError, STTErrorCallback, STTResult,
    STTResultCallback,
};

pub use assemblyai::AssemblyAISTT;
pub use deepgram::DeepgramSTT;

/// Supported STT providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum STTProvider {
    /// Deepgram streaming WebSocket API
    Deepgram,
    /// AssemblyAI real-time WebSocket API
    AssemblyAI,
}

impl std::fmt::Display for STTProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            STTProvider::Deepgram => write!(f, "deepgram"),
            STTProvider::AssemblyAI => write!(f, "assemblyai"),
        }
    }
}

impl std::str::FromStr for STTProvider {
    type Err = STTError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deepgram" => Ok(STTProvider::Deepgram),
            "assemblyai" => Ok(STTProvider::AssemblyAI),
            _ => Err(STTError::ConfigurationError(format!(
                "Unsupported STT provider: {s}. Supported providers: deepgram, assemblyai"
            ))),
        }
    }
}

/// Factory function to create STT providers by name
///
/// Unknown provider names fail with `STTError::ConfigurationError` before any
/// stream work begins.
pub fn create_stt_provider(
    provider: &str,
    config: STTConfig,
) -> Result<Box<dyn BaseSTT>, STTError> {
    let provider_enum: STTProvider = provider.parse()?;

    match provider_enum {
        STTProvider::Deepgram => Ok(Box::new(DeepgramSTT::new(config)?)),
        STTProvider::AssemblyAI => Ok(Box::new(AssemblyAISTT::new(config)?)),
    }
}

/// List of supported STT provider names
pub fn get_supported_stt_providers() -> Vec<&'static str> {
    vec!["deepgram", "assemblyai"]
}

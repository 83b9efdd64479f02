//! Pre-call audio cache.
//!
//! Fixed phrases (introductions) are synthesized once before the call and
//! replayed from memory, eliminating first-utterance latency. Entries are
//! pure memoization, never invalidated except by explicit clear.

use bytes::Bytes;
use moka::future::Cache;
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::core::tts::{BaseTTS, TTSError};

/// Cache key: the synthesis inputs that affect the produced audio
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioCacheKey {
    pub tts_service: String,
    pub voice_type: String,
    /// xxh3 of the phrase text, keeping keys small for long introductions
    pub text_hash: u64,
}

impl AudioCacheKey {
    pub fn new(tts_service: &str, voice_type: &str, text: &str) -> Self {
        Self {
            tts_service: tts_service.to_string(),
            voice_type: voice_type.to_string(),
            text_hash: xxh3_64(text.as_bytes()),
        }
    }
}

/// Process-wide store of pre-synthesized audio clips
pub struct PreCallAudioCache {
    cache: Cache<AudioCacheKey, Bytes>,
}

impl PreCallAudioCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_entries).build(),
        }
    }

    /// Synthesize and memoize a phrase.
    ///
    /// Single-flight per key: concurrent callers with the same key share one
    /// synthesis instead of racing duplicates.
    pub async fn prepare(
        &self,
        tts: &dyn BaseTTS,
        tts_service: &str,
        voice_type: &str,
        text: &str,
    ) -> Result<Bytes, TTSError> {
        let key = AudioCacheKey::new(tts_service, voice_type, text);
        self.cache
            .try_get_with(key, async {
                debug!(tts_service, voice_type, "Pre-synthesizing phrase");
                tts.synthesize(text).await.map(|audio| audio.data)
            })
            .await
            .map_err(|e| {
                warn!("Pre-call synthesis failed: {e}");
                TTSError::AudioGenerationFailed(e.to_string())
            })
    }

    /// Cached audio for a phrase, or `None` when the caller should fall back
    /// to live synthesis at play time.
    pub async fn get(&self, tts_service: &str, voice_type: &str, text: &str) -> Option<Bytes> {
        self.cache
            .get(&AudioCacheKey::new(tts_service, voice_type, text))
            .await
    }

    pub async fn clear(&self) {
        self.cache.invalidate_all();
    }
}

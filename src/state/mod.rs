use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::audio_cache::PreCallAudioCache;
use crate::core::conversation::ConversationStore;
use crate::utils::activity::{ActivityRepository, InMemoryActivityRepository};
use crate::utils::observers::ObserverHub;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    /// Registry of active conversation states, keyed by conversation id
    pub store: Arc<ConversationStore>,
    /// Process-wide pre-synthesized audio for fixed phrases
    pub audio_cache: Arc<PreCallAudioCache>,
    /// Fan-out to observer dashboards
    pub observers: Arc<ObserverHub>,
    /// Call metadata persistence boundary
    pub activities: Arc<dyn ActivityRepository>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let audio_cache = Arc::new(PreCallAudioCache::new(config.audio_cache_max_entries));
        Arc::new(Self {
            config,
            store: Arc::new(ConversationStore::new()),
            audio_cache,
            observers: Arc::new(ObserverHub::new()),
            activities: Arc::new(InMemoryActivityRepository::new()),
        })
    }

    /// Swap the activity repository, keeping everything else
    pub fn with_activities(
        config: ServerConfig,
        activities: Arc<dyn ActivityRepository>,
    ) -> Arc<Self> {
        let audio_cache = Arc::new(PreCallAudioCache::new(config.audio_cache_max_entries));
        Arc::new(Self {
            config,
            store: Arc::new(ConversationStore::new()),
            audio_cache,
            observers: Arc::new(ObserverHub::new()),
            activities,
        })
    }
}

//! Registry mapping conversation identifiers to live state.
//!
//! Lifecycle is explicit: `create` when the call starts, `get` on every turn,
//! `destroy` at teardown. A lookup after teardown is a hard error so a late
//! media frame can never fabricate fresh state mid-call.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use super::state::ConversationState;

/// Handle to one conversation's state, shared across agents and the orchestrator
pub type StateHandle = Arc<AsyncMutex<ConversationState>>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StateError {
    #[error("No conversation state initialized for id: {0}")]
    NotFound(String),
}

/// Process-wide store of active conversations
#[derive(Default)]
pub struct ConversationStore {
    conversations: Mutex<HashMap<String, StateHandle>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create state for a conversation, or return the existing handle.
    ///
    /// Idempotent: two creates for the same id yield the same handle.
    pub fn create(&self, conversation_id: &str) -> StateHandle {
        let mut conversations = self.conversations.lock();
        conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                debug!(conversation_id, "Creating conversation state");
                Arc::new(AsyncMutex::new(ConversationState::new(conversation_id)))
            })
            .clone()
    }

    /// Look up existing state; fails fast when the call was never initialized
    /// or has already been torn down.
    pub fn get(&self, conversation_id: &str) -> Result<StateHandle, StateError> {
        self.conversations
            .lock()
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| StateError::NotFound(conversation_id.to_string()))
    }

    /// Drop a conversation's state at call teardown
    pub fn destroy(&self, conversation_id: &str) -> bool {
        let removed = self.conversations.lock().remove(conversation_id).is_some();
        if removed {
            debug!(conversation_id, "Destroyed conversation state");
        } else {
            warn!(conversation_id, "Destroy for unknown conversation");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.conversations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::conversation::state::ConversationPhase;

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let store = ConversationStore::new();
        let first = store.create("conv-1");
        let second = store.create("conv-1");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_mutations_visible_through_either_handle() {
        let store = ConversationStore::new();
        let first = store.create("conv-1");
        let second = store.get("conv-1").unwrap();

        first
            .lock()
            .await
            .set_phase(ConversationPhase::Unstructured);
        assert_eq!(second.lock().await.phase(), ConversationPhase::Unstructured);
    }

    #[test]
    fn test_get_without_create_fails() {
        let store = ConversationStore::new();
        assert!(matches!(
            store.get("missing"),
            Err(StateError::NotFound(_))
        ));
    }

    #[test]
    fn test_get_after_destroy_fails() {
        let store = ConversationStore::new();
        store.create("conv-1");
        assert!(store.destroy("conv-1"));
        assert!(store.get("conv-1").is_err());
        assert!(!store.destroy("conv-1"));
    }
}

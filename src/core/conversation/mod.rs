mod memory;
mod state;
mod store;

pub use memory::{EntityMemory, FieldSpec};
pub use state::{
    CallGoal, ConversationPhase, ConversationState, PendingQuestion, Speaker, StructuredStep,
    TranscriptLine,
};
pub use store::{ConversationStore, StateError, StateHandle};

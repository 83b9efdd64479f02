//! Agent abstraction: a concurrent unit that turns a caller utterance plus
//! conversation context into a candidate spoken reply.

use bytes::Bytes;
use serde_json::Value;

use crate::core::conversation::StateHandle;
use crate::core::llm::LLMError;

/// Classified intent of a caller utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Intent {
    /// Pertains to the call's subject matter (product questions etc.)
    Domain,
    /// Small talk
    Casual,
    #[default]
    Other,
}

/// What a response represents, mostly for observers and call-flow control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Reply,
    Acknowledgment,
    Transition,
    Question,
    CallEnd,
    Summary,
}

/// Playback urgency. `Immediate` always sorts before `Delayed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResponsePriority {
    Immediate,
    Delayed,
}

/// One candidate reply produced by an agent.
///
/// Responses are totally ordered by `(priority, order)` ascending; the
/// sequencer breaks remaining ties by insertion index.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub text: String,
    pub kind: ResponseKind,
    pub priority: ResponsePriority,
    pub order: u32,
    /// Name of the producing agent
    pub agent: String,
    /// Pre-synthesized audio, bypassing TTS at play time
    pub audio: Option<Bytes>,
    /// Set on the terminal response of a completed lead-qualification call
    pub complete: bool,
    /// Memory snapshot attached to terminal responses
    pub memory_state: Option<Value>,
}

impl AgentResponse {
    pub fn new(agent: impl Into<String>, text: impl Into<String>, kind: ResponseKind) -> Self {
        Self {
            text: text.into(),
            kind,
            priority: ResponsePriority::Delayed,
            order: 99,
            agent: agent.into(),
            audio: None,
            complete: false,
            memory_state: None,
        }
    }

    pub fn with_priority(mut self, priority: ResponsePriority, order: u32) -> Self {
        self.priority = priority;
        self.order = order;
        self
    }
}

/// Intent context shared with agents after classification
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnContext {
    pub intent: Intent,
    pub confidence: f32,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LLMError),

    #[error("Knowledge lookup failed: {0}")]
    Knowledge(String),

    #[error("Agent failed: {0}")]
    Other(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Base trait for conversational agents.
///
/// All registered agents run concurrently every turn; an agent that opts out
/// via `should_process` still runs, its result is just discarded.
#[async_trait::async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    async fn process(&self, input: &str, state: &StateHandle) -> AgentResult<AgentResponse>;

    async fn should_process(&self, _input: &str, _context: &TurnContext) -> bool {
        true
    }
}

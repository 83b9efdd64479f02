mod base;
mod intent;
mod knowledge;
mod quick;
mod summary;

pub use base::{
    Agent, AgentError, AgentResponse, AgentResult, Intent, ResponseKind, ResponsePriority,
    TurnContext,
};
pub use intent::{
    Emotion, INTENT_CLASSIFIER_NAME, IntentClassifierAgent, IntentOutcome, PhrasePicker,
};
pub use knowledge::{KNOWLEDGE_AGENT_NAME, KnowledgeAgent};
pub use quick::{QUICK_RESPONSE_NAME, QuickResponseAgent};
pub use summary::{SUMMARY_AGENT_NAME, SummaryAgent};

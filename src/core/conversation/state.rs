//! Per-call conversation state: phase machine position, entity memory and
//! the running transcript.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::memory::{EntityMemory, FieldSpec};

/// Top-level conversation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationPhase {
    Start,
    Structured,
    Unstructured,
}

/// Position within the scripted structured phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuredStep {
    Greeting,
    Availability,
}

/// What the call is ultimately trying to achieve
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CallGoal {
    #[default]
    General,
    /// Collect the declared required fields, then end the call
    LeadQualification,
}

/// Who said a transcript line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Caller,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub speaker: Speaker,
    pub text: String,
}

/// A question asked to the caller whose answer should fill a specific field
#[derive(Debug, Clone)]
pub struct PendingQuestion {
    pub field: String,
    pub question: String,
}

/// Mutable state for one conversation, owned by exactly one call
#[derive(Debug)]
pub struct ConversationState {
    pub conversation_id: String,
    phase: ConversationPhase,
    structured_step: StructuredStep,
    pub goal: CallGoal,
    pub memory: EntityMemory,
    pub pending_question: Option<PendingQuestion>,
    transcript: Vec<TranscriptLine>,
}

impl ConversationState {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            phase: ConversationPhase::Start,
            structured_step: StructuredStep::Greeting,
            goal: CallGoal::General,
            memory: EntityMemory::new(),
            pending_question: None,
            transcript: Vec::new(),
        }
    }

    pub fn phase(&self) -> ConversationPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: ConversationPhase) {
        debug!(
            conversation_id = %self.conversation_id,
            ?phase,
            "Conversation phase transition"
        );
        self.phase = phase;
    }

    pub fn structured_step(&self) -> StructuredStep {
        self.structured_step
    }

    pub fn set_structured_step(&mut self, step: StructuredStep) {
        debug!(
            conversation_id = %self.conversation_id,
            ?step,
            "Structured step transition"
        );
        self.structured_step = step;
    }

    /// Declare the lead-qualification schema and switch the call goal
    pub fn configure_lead_goal<I>(&mut self, specs: I)
    where
        I: IntoIterator<Item = (String, FieldSpec)>,
    {
        self.goal = CallGoal::LeadQualification;
        self.memory.initialize_required_fields(specs);
    }

    pub fn push_transcript(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.transcript.push(TranscriptLine {
            speaker,
            text: text.into(),
        });
    }

    pub fn transcript(&self) -> &[TranscriptLine] {
        &self.transcript
    }

    /// Full transcript as prompt-ready text, one line per utterance
    pub fn transcript_text(&self) -> String {
        self.transcript
            .iter()
            .map(|line| {
                let speaker = match line.speaker {
                    Speaker::Caller => "Caller",
                    Speaker::Assistant => "Assistant",
                };
                format!("{speaker}: {}", line.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Memory snapshot suitable for persistence alongside call metadata
    pub fn memory_snapshot(&self) -> Value {
        self.memory.snapshot()
    }
}

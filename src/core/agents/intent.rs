//! Intent classification: emotional tone, domain relevance and the short
//! acknowledgment phrase that fills dead air while slower agents run.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::warn;

use super::base::{
    Agent, AgentResponse, AgentResult, Intent, ResponseKind, ResponsePriority, TurnContext,
};
use crate::core::conversation::StateHandle;
use crate::core::llm::{BaseLLM, CompletionOptions, strip_code_fence};

pub const INTENT_CLASSIFIER_NAME: &str = "intent-classifier";

const HAPPY_ACKNOWLEDGMENTS: &[&str] = &[
    "Wonderful to hear that",
    "That's excellent",
    "I'm glad to hear that",
    "That's great news",
    "Delighted to hear this",
    "That's fantastic",
    "I'm pleased to hear that",
    "That's wonderful",
    "Excellent news",
    "That's very good to hear",
];

const NEUTRAL_ACKNOWLEDGMENTS: &[&str] = &[
    "I understand",
    "Certainly",
    "Okay",
    "Understood",
    "Noted",
    "Very well",
    "Indeed",
    "Right",
    "Got it!",
    "Absolutely",
];

const CASUAL_ACKNOWLEDGMENTS: &[&str] = &[
    "Thanks for sharing that",
    "I appreciate you telling me",
    "That's interesting",
    "I hear you",
    "Good to know",
    "I see what you mean",
    "That makes sense",
    "Fair enough",
    "I understand completely",
    "That's clear",
];

/// Emotional tone reported by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    #[default]
    Neutral,
    Casual,
}

impl Emotion {
    fn phrase_set(self) -> &'static [&'static str] {
        match self {
            Emotion::Happy => HAPPY_ACKNOWLEDGMENTS,
            Emotion::Neutral => NEUTRAL_ACKNOWLEDGMENTS,
            Emotion::Casual => CASUAL_ACKNOWLEDGMENTS,
        }
    }
}

/// Raw JSON shape returned by the classification prompt
#[derive(Debug, Deserialize)]
struct IntentClassification {
    #[serde(default)]
    emotion: Emotion,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    certainty: f32,
    #[serde(rename = "isDomainRelated", default)]
    is_domain_related: bool,
}

/// Typed result of one classification turn
#[derive(Debug, Clone)]
pub struct IntentOutcome {
    pub intent: Intent,
    pub emotion: Emotion,
    pub confidence: f32,
    pub certainty: f32,
    /// Only set for domain-relevant turns
    pub acknowledgment: Option<String>,
}

/// Seedable phrase source so tests can assert deterministic picks
pub struct PhrasePicker {
    rng: Mutex<StdRng>,
}

impl PhrasePicker {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Weighted-confidence acknowledgment selection.
    ///
    /// Low combined score means the emotion read is shaky, so fall back to
    /// the neutral set; at or above the threshold use the matched emotion.
    pub fn acknowledgment(&self, emotion: Emotion, confidence: f32, certainty: f32) -> String {
        let combined = confidence * 0.6 + certainty * 0.4;
        let set = if combined < 0.6 {
            Emotion::Neutral.phrase_set()
        } else {
            emotion.phrase_set()
        };
        let index = self.rng.lock().gen_range(0..set.len());
        set[index].to_string()
    }
}

impl Default for PhrasePicker {
    fn default() -> Self {
        Self::new()
    }
}

/// Classifies each turn's tone and domain relevance
pub struct IntentClassifierAgent {
    llm: Arc<dyn BaseLLM>,
    picker: PhrasePicker,
    options: CompletionOptions,
}

impl IntentClassifierAgent {
    pub fn new(llm: Arc<dyn BaseLLM>) -> Self {
        Self::with_picker(llm, PhrasePicker::new())
    }

    pub fn with_picker(llm: Arc<dyn BaseLLM>, picker: PhrasePicker) -> Self {
        Self {
            llm,
            picker,
            options: CompletionOptions {
                // low temperature keeps classifications consistent
                temperature: 0.1,
                json_response: true,
                ..Default::default()
            },
        }
    }

    fn classification_prompt(input: &str) -> String {
        format!(
            "Classify the emotional tone and domain relevance of this message: \"{input}\". \
             Domain related means the caller is asking about something specific to the product \
             or task at hand rather than something generic.\n\
             Return JSON format: {{\n\
               \"emotion\": \"happy\" | \"neutral\" | \"casual\",\n\
               \"confidence\": number (0-1),\n\
               \"certainty\": number (0-1),\n\
               \"isDomainRelated\": boolean\n\
             }}"
        )
    }

    /// Classify one utterance. Never fails the turn: provider or parse
    /// failures degrade to a neutral, non-domain outcome.
    pub async fn classify(&self, input: &str) -> IntentOutcome {
        let raw = match self
            .llm
            .complete(&Self::classification_prompt(input), &self.options)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Intent classification call failed: {e}");
                return Self::fallback_outcome();
            }
        };

        let parsed: IntentClassification = match serde_json::from_str(strip_code_fence(&raw)) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Unparseable intent classification ({e}): {raw}");
                return Self::fallback_outcome();
            }
        };

        let intent = if parsed.is_domain_related {
            Intent::Domain
        } else if parsed.emotion == Emotion::Casual {
            Intent::Casual
        } else {
            Intent::Other
        };

        let acknowledgment = parsed.is_domain_related.then(|| {
            self.picker
                .acknowledgment(parsed.emotion, parsed.confidence, parsed.certainty)
        });

        IntentOutcome {
            intent,
            emotion: parsed.emotion,
            confidence: parsed.confidence,
            certainty: parsed.certainty,
            acknowledgment,
        }
    }

    fn fallback_outcome() -> IntentOutcome {
        IntentOutcome {
            intent: Intent::Other,
            emotion: Emotion::Neutral,
            confidence: 0.0,
            certainty: 0.0,
            acknowledgment: None,
        }
    }
}

#[async_trait::async_trait]
impl Agent for IntentClassifierAgent {
    fn name(&self) -> &str {
        INTENT_CLASSIFIER_NAME
    }

    async fn process(&self, input: &str, _state: &StateHandle) -> AgentResult<AgentResponse> {
        let outcome = self.classify(input).await;
        let text = outcome.acknowledgment.unwrap_or_default();
        Ok(
            AgentResponse::new(INTENT_CLASSIFIER_NAME, text, ResponseKind::Acknowledgment)
                .with_priority(ResponsePriority::Immediate, 1),
        )
    }

    async fn should_process(&self, _input: &str, context: &TurnContext) -> bool {
        // the acknowledgment only plays for domain turns
        context.intent == Intent::Domain
    }
}

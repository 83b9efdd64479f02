//! Scripted call flow: the structured pre-conversation steps and the
//! lead-qualification loop that runs inside the unstructured phase.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::core::agents::{AgentResponse, AgentResult, ResponseKind, ResponsePriority};
use crate::core::conversation::{
    CallGoal, ConversationPhase, PendingQuestion, StateHandle, StructuredStep,
};
use crate::core::llm::{BaseLLM, CompletionOptions, strip_code_fence};

const FLOW_AGENT_NAME: &str = "call-flow";

/// Sequencer order slots for flow-produced speech
const ORDER_TRANSITION: u32 = 1;
const ORDER_QUESTION: u32 = 5;
const ORDER_CALL_END: u32 = 9;

#[derive(Debug, Deserialize)]
struct AvailabilityCheck {
    #[serde(rename = "isAvailable", default)]
    is_available: bool,
}

#[derive(Debug, Deserialize)]
struct AnswerValidation {
    #[serde(rename = "isValidAnswer", default)]
    is_valid_answer: bool,
    #[serde(rename = "extractedValue", default)]
    extracted_value: Option<Value>,
}

/// Drives `start -> structured(greeting) -> structured(availability) ->
/// unstructured -> call-end` for one conversation.
pub struct CallFlow {
    llm: Arc<dyn BaseLLM>,
    options: CompletionOptions,
    /// Introduction line played at the greeting step
    introduction: Option<String>,
}

impl CallFlow {
    pub fn new(llm: Arc<dyn BaseLLM>) -> Self {
        Self {
            llm,
            options: CompletionOptions {
                temperature: 0.2,
                ..Default::default()
            },
            introduction: None,
        }
    }

    pub fn with_introduction(mut self, introduction: Option<String>) -> Self {
        self.introduction = introduction;
        self
    }

    fn transition(text: impl Into<String>) -> AgentResponse {
        AgentResponse::new(FLOW_AGENT_NAME, text, ResponseKind::Transition)
            .with_priority(ResponsePriority::Immediate, ORDER_TRANSITION)
    }

    /// Handle a turn while the conversation has not reached the unstructured
    /// phase. Mutates phase transitions on the shared state.
    pub async fn process_structured(
        &self,
        input: &str,
        state: &StateHandle,
    ) -> AgentResult<AgentResponse> {
        let mut guard = state.lock().await;
        match guard.phase() {
            ConversationPhase::Start => {
                let name = guard
                    .memory
                    .get_context("calleeName")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                guard.set_phase(ConversationPhase::Structured);
                guard.set_structured_step(StructuredStep::Greeting);
                let greeting = match name {
                    Some(name) => format!("Hey {name}"),
                    None => "Hey there".to_string(),
                };
                Ok(Self::transition(greeting))
            }
            ConversationPhase::Structured => match guard.structured_step() {
                StructuredStep::Greeting => {
                    guard.set_structured_step(StructuredStep::Availability);
                    let line = self.introduction.clone().unwrap_or_else(|| {
                        "I'm calling to ask you a couple of quick questions. \
                         Is now a good time to talk?"
                            .to_string()
                    });
                    Ok(Self::transition(line))
                }
                StructuredStep::Availability => {
                    drop(guard);
                    let available = self.check_availability(input).await;
                    let mut guard = state.lock().await;
                    if available {
                        guard.set_phase(ConversationPhase::Unstructured);
                        Ok(Self::transition(
                            "Great! Let's get started, this will only take a moment.",
                        ))
                    } else {
                        guard
                            .memory
                            .set_context("nextAction", json!("scheduleCallback"));
                        Ok(Self::transition(
                            "No problem at all. When would be a better time for me to call back?",
                        ))
                    }
                }
            },
            ConversationPhase::Unstructured => {
                // callers should route unstructured turns through the orchestrator
                Ok(Self::transition(String::new()))
            }
        }
    }

    async fn check_availability(&self, input: &str) -> bool {
        let prompt = format!(
            "The callee was asked whether now is a good time to talk and replied: \"{input}\". \
             Return JSON format: {{ \"isAvailable\": boolean }}"
        );
        let options = CompletionOptions {
            json_response: true,
            ..self.options.clone()
        };
        match self.llm.complete(&prompt, &options).await {
            Ok(raw) => serde_json::from_str::<AvailabilityCheck>(strip_code_fence(&raw))
                .map(|check| check.is_available)
                .unwrap_or_else(|e| {
                    warn!("Unparseable availability check ({e}): {raw}");
                    false
                }),
            Err(e) => {
                warn!("Availability check failed: {e}");
                false
            }
        }
    }

    /// Lead-qualification step for one unstructured turn.
    ///
    /// Validates the answer to any pending question, advances to the next
    /// unfulfilled required field, and emits the terminal call-end response
    /// once everything is collected. Returns `None` when the call has no
    /// lead-qualification goal.
    pub async fn lead_turn(&self, input: &str, state: &StateHandle) -> Option<AgentResponse> {
        {
            let guard = state.lock().await;
            if guard.goal != CallGoal::LeadQualification {
                return None;
            }
        }

        let pending = state.lock().await.pending_question.clone();
        if let Some(pending) = pending {
            match self.validate_answer(&pending, input).await {
                Some(value) => {
                    let mut guard = state.lock().await;
                    debug!(field = %pending.field, "Collected lead field");
                    guard.memory.set_entity(&pending.field, value);
                    guard.pending_question = None;
                }
                None => {
                    // not an answer; re-ask the same question
                    return Some(
                        AgentResponse::new(
                            FLOW_AGENT_NAME,
                            pending.question.clone(),
                            ResponseKind::Question,
                        )
                        .with_priority(ResponsePriority::Delayed, ORDER_QUESTION),
                    );
                }
            }
        }

        let next_field = {
            let guard = state.lock().await;
            guard
                .memory
                .remaining_required_fields()
                .first()
                .map(|(field, spec)| (field.to_string(), spec.description.clone()))
        };

        match next_field {
            Some((field, description)) => {
                let question = self.generate_question(&field, &description).await;
                let mut guard = state.lock().await;
                guard.pending_question = Some(PendingQuestion {
                    field: field.clone(),
                    question: question.clone(),
                });
                guard
                    .memory
                    .set_context("pendingQuestion", json!(question.clone()));
                Some(
                    AgentResponse::new(FLOW_AGENT_NAME, question, ResponseKind::Question)
                        .with_priority(ResponsePriority::Delayed, ORDER_QUESTION),
                )
            }
            None => {
                let guard = state.lock().await;
                let mut response = AgentResponse::new(
                    FLOW_AGENT_NAME,
                    "That's everything I needed, thank you so much for your time. Goodbye!",
                    ResponseKind::CallEnd,
                )
                .with_priority(ResponsePriority::Delayed, ORDER_CALL_END);
                response.complete = true;
                response.memory_state = Some(guard.memory_snapshot());
                Some(response)
            }
        }
    }

    /// Ask the model whether the input answers the pending question.
    /// Refusals ("not interested") count as valid answers so the call can
    /// move on instead of looping.
    async fn validate_answer(&self, pending: &PendingQuestion, input: &str) -> Option<Value> {
        let prompt = format!(
            "The caller was asked: \"{}\" and replied: \"{input}\". \
             Does the reply answer the question? Refusals such as \"not interested\" or \
             \"I'd rather not say\" count as valid answers. \
             Return JSON format: {{ \"isValidAnswer\": boolean, \"extractedValue\": string | null }}",
            pending.question
        );
        let options = CompletionOptions {
            json_response: true,
            ..self.options.clone()
        };

        let raw = match self.llm.complete(&prompt, &options).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(field = %pending.field, "Answer validation failed: {e}");
                return None;
            }
        };
        let validation: AnswerValidation = match serde_json::from_str(strip_code_fence(&raw)) {
            Ok(validation) => validation,
            Err(e) => {
                warn!("Unparseable answer validation ({e}): {raw}");
                return None;
            }
        };

        validation.is_valid_answer.then(|| {
            validation
                .extracted_value
                .filter(|value| !value.is_null())
                .unwrap_or_else(|| json!(input))
        })
    }

    async fn generate_question(&self, field: &str, description: &str) -> String {
        let prompt = format!(
            "Write one short, natural spoken question asking the caller for their {field} \
             ({description}). Return only the question text."
        );
        match self.llm.complete(&prompt, &self.options).await {
            Ok(question) => question.trim().to_string(),
            Err(e) => {
                warn!(field, "Question generation failed, using template: {e}");
                format!("Could I get your {field}, please?")
            }
        }
    }
}

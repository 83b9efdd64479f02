//! Turn orchestration: fans a transcript out to every registered agent
//! concurrently, applies intent-based sequencing rules, and feeds the
//! surviving responses into the playback sequencer.

mod flow;
mod sequencer;

pub use flow::CallFlow;
pub use sequencer::{GeneralCallback, PlaybackCallback, PlaybackSequencer};

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::core::agents::{
    Agent, AgentResponse, AgentResult, Intent, IntentClassifierAgent, IntentOutcome,
    KNOWLEDGE_AGENT_NAME, QUICK_RESPONSE_NAME, ResponseKind, ResponsePriority, TurnContext,
};
use crate::core::conversation::{ConversationPhase, StateHandle};

pub struct Orchestrator {
    classifier: Arc<IntentClassifierAgent>,
    agents: Vec<Arc<dyn Agent>>,
    flow: Arc<CallFlow>,
    sequencer: Arc<PlaybackSequencer>,
    agent_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        classifier: Arc<IntentClassifierAgent>,
        flow: Arc<CallFlow>,
        sequencer: Arc<PlaybackSequencer>,
        agent_timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            agents: Vec::new(),
            flow,
            sequencer,
            agent_timeout,
        }
    }

    pub fn register_agent(&mut self, agent: Arc<dyn Agent>) {
        self.agents.push(agent);
    }

    pub fn sequencer(&self) -> &Arc<PlaybackSequencer> {
        &self.sequencer
    }

    /// Explicit `order` slot per agent, given the classified intent.
    /// Lower plays first among equal priority.
    pub fn agent_order(agent_name: &str, intent: Intent) -> u32 {
        match agent_name {
            QUICK_RESPONSE_NAME => {
                if intent == Intent::Casual {
                    2
                } else {
                    4
                }
            }
            KNOWLEDGE_AGENT_NAME => {
                if intent == Intent::Domain {
                    2
                } else {
                    3
                }
            }
            _ => 99,
        }
    }

    /// Process one user turn. Returns the responses actually enqueued for
    /// playback, in enqueue order, for caller-side transcript logging.
    ///
    /// Per-agent failures and timeouts degrade to null contributions; a turn
    /// where every agent fails returns an empty list rather than an error.
    pub async fn process(&self, input: &str, state: &StateHandle) -> Vec<AgentResponse> {
        let phase = state.lock().await.phase();
        if phase != ConversationPhase::Unstructured {
            return self.process_structured_turn(input, state).await;
        }

        // fan out: classifier plus every agent, all concurrent
        let classifier_task = {
            let classifier = self.classifier.clone();
            let input = input.to_string();
            let deadline = self.agent_timeout;
            tokio::spawn(async move { timeout(deadline, classifier.classify(&input)).await })
        };

        type AgentTask = JoinHandle<Result<AgentResult<AgentResponse>, tokio::time::error::Elapsed>>;
        let agent_tasks: Vec<(Arc<dyn Agent>, AgentTask)> = self
            .agents
            .iter()
            .map(|agent| {
                let task_agent = agent.clone();
                let input = input.to_string();
                let task_state = state.clone();
                let deadline = self.agent_timeout;
                let handle = tokio::spawn(async move {
                    timeout(deadline, task_agent.process(&input, &task_state)).await
                });
                (agent.clone(), handle)
            })
            .collect();

        // dispatch decisions depend on the classified intent, so await it first
        let outcome = match classifier_task.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                warn!("Intent classification timed out");
                Self::neutral_outcome()
            }
            Err(e) => {
                warn!("Intent classification task failed: {e}");
                Self::neutral_outcome()
            }
        };
        debug!(intent = ?outcome.intent, confidence = outcome.confidence, "Turn classified");

        let context = TurnContext {
            intent: outcome.intent,
            confidence: outcome.confidence,
        };
        let mut enqueued = Vec::new();

        // fill dead air while the knowledge agent is still running
        if outcome.intent == Intent::Domain {
            if let Some(acknowledgment) = &outcome.acknowledgment {
                let response = AgentResponse::new(
                    self.classifier.name(),
                    acknowledgment.clone(),
                    ResponseKind::Acknowledgment,
                )
                .with_priority(ResponsePriority::Immediate, 1);
                self.sequencer.enqueue(response.clone()).await;
                enqueued.push(response);
            }
        }

        for (agent, handle) in agent_tasks {
            let name = agent.name().to_string();
            // intent-specific sequencing: domain turns keep only the
            // knowledge agent, everything else drops it
            let keep = match outcome.intent {
                Intent::Domain => name == KNOWLEDGE_AGENT_NAME,
                _ => name != KNOWLEDGE_AGENT_NAME,
            };
            if !keep {
                handle.abort();
                continue;
            }

            let mut response = match handle.await {
                Ok(Ok(Ok(response))) => response,
                Ok(Ok(Err(e))) => {
                    warn!(agent = %name, "Agent failed: {e}");
                    continue;
                }
                Ok(Err(_)) => {
                    warn!(agent = %name, "Agent timed out");
                    continue;
                }
                Err(e) => {
                    warn!(agent = %name, "Agent task failed: {e}");
                    continue;
                }
            };

            if !agent.should_process(input, &context).await {
                debug!(agent = %name, "Agent opted out of this turn");
                continue;
            }

            response.order = Self::agent_order(&name, outcome.intent);
            self.sequencer.enqueue(response.clone()).await;
            enqueued.push(response);
        }

        // lead-qualification question or terminal call-end, after content
        if let Some(lead_response) = self.flow.lead_turn(input, state).await {
            self.sequencer.enqueue(lead_response.clone()).await;
            enqueued.push(lead_response);
        }

        enqueued
    }

    async fn process_structured_turn(&self, input: &str, state: &StateHandle) -> Vec<AgentResponse> {
        match self.flow.process_structured(input, state).await {
            Ok(response) if !response.text.is_empty() => {
                self.sequencer.enqueue(response.clone()).await;
                vec![response]
            }
            Ok(_) => Vec::new(),
            Err(e) => {
                warn!("Structured turn failed: {e}");
                Vec::new()
            }
        }
    }

    fn neutral_outcome() -> IntentOutcome {
        IntentOutcome {
            intent: Intent::Other,
            emotion: crate::core::agents::Emotion::Neutral,
            confidence: 0.0,
            certainty: 0.0,
            acknowledgment: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_order_rules() {
        assert_eq!(Orchestrator::agent_order(QUICK_RESPONSE_NAME, Intent::Casual), 2);
        assert_eq!(Orchestrator::agent_order(QUICK_RESPONSE_NAME, Intent::Domain), 4);
        assert_eq!(Orchestrator::agent_order(QUICK_RESPONSE_NAME, Intent::Other), 4);
        assert_eq!(Orchestrator::agent_order(KNOWLEDGE_AGENT_NAME, Intent::Domain), 2);
        assert_eq!(Orchestrator::agent_order(KNOWLEDGE_AGENT_NAME, Intent::Casual), 3);
        assert_eq!(Orchestrator::agent_order("summary", Intent::Other), 99);
    }
}

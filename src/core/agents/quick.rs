//! Low-latency short replies for casual turns.

use std::sync::Arc;

use super::base::{
    Agent, AgentResponse, AgentResult, Intent, ResponseKind, TurnContext,
};
use crate::core::conversation::StateHandle;
use crate::core::llm::{BaseLLM, CompletionOptions};

pub const QUICK_RESPONSE_NAME: &str = "quick-response";

/// Generates short conversational replies for small-talk turns
pub struct QuickResponseAgent {
    llm: Arc<dyn BaseLLM>,
    options: CompletionOptions,
}

impl QuickResponseAgent {
    pub fn new(llm: Arc<dyn BaseLLM>) -> Self {
        Self {
            llm,
            options: CompletionOptions {
                temperature: 0.7,
                // keep replies short enough to speak quickly
                max_tokens: Some(100),
                system_prompt: Some(
                    "You are a friendly voice assistant on a phone call. Reply in one or two \
                     short spoken sentences. Never use lists, markdown or emoji."
                        .to_string(),
                ),
                ..Default::default()
            },
        }
    }
}

#[async_trait::async_trait]
impl Agent for QuickResponseAgent {
    fn name(&self) -> &str {
        QUICK_RESPONSE_NAME
    }

    async fn process(&self, input: &str, state: &StateHandle) -> AgentResult<AgentResponse> {
        let context = state.lock().await.memory.formatted_context();
        let prompt = format!(
            "Conversation context:\n{context}\n\nThe caller just said: \"{input}\"\n\
             Give a brief, natural spoken reply."
        );

        let text = self.llm.complete(&prompt, &self.options).await?;
        Ok(AgentResponse::new(
            QUICK_RESPONSE_NAME,
            text.trim(),
            ResponseKind::Reply,
        ))
    }

    async fn should_process(&self, _input: &str, context: &TurnContext) -> bool {
        // domain turns are answered by the knowledge agent instead
        context.intent != Intent::Domain
    }
}

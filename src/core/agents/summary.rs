//! Post-call summarizer. Runs outside the live turn loop, over the full
//! transcript, when the media stream stops.

use std::sync::Arc;

use super::base::{Agent, AgentResponse, AgentResult, ResponseKind};
use crate::core::conversation::StateHandle;
use crate::core::llm::{BaseLLM, CompletionOptions};

pub const SUMMARY_AGENT_NAME: &str = "summary";

pub struct SummaryAgent {
    llm: Arc<dyn BaseLLM>,
    options: CompletionOptions,
}

impl SummaryAgent {
    pub fn new(llm: Arc<dyn BaseLLM>) -> Self {
        Self {
            llm,
            options: CompletionOptions {
                temperature: 0.3,
                max_tokens: Some(200),
                system_prompt: Some(
                    "Summarize the following conversation in a concise manner, focusing on \
                     key points discussed:"
                        .to_string(),
                ),
                ..Default::default()
            },
        }
    }

    /// Summarize raw transcript text directly
    pub async fn summarize(&self, transcript: &str) -> AgentResult<String> {
        let text = self.llm.complete(transcript, &self.options).await?;
        Ok(text.trim().to_string())
    }
}

#[async_trait::async_trait]
impl Agent for SummaryAgent {
    fn name(&self) -> &str {
        SUMMARY_AGENT_NAME
    }

    async fn process(&self, input: &str, _state: &StateHandle) -> AgentResult<AgentResponse> {
        let summary = self.summarize(input).await?;
        Ok(AgentResponse::new(
            SUMMARY_AGENT_NAME,
            summary,
            ResponseKind::Summary,
        ))
    }
}

//! Knowledge retrieval agent: answers domain-relevant questions against an
//! external knowledge index exposed as a blocking chat endpoint.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::base::{
    Agent, AgentError, AgentResponse, AgentResult, Intent, ResponseKind, TurnContext,
};
use crate::core::conversation::StateHandle;

pub const KNOWLEDGE_AGENT_NAME: &str = "rag";

#[derive(Debug, Deserialize)]
struct KnowledgeReply {
    #[serde(default)]
    answer: String,
}

/// Retrieval-augmented agent backed by a knowledge-base chat API
pub struct KnowledgeAgent {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl KnowledgeAgent {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> AgentResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AgentError::Other(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait::async_trait]
impl Agent for KnowledgeAgent {
    fn name(&self) -> &str {
        KNOWLEDGE_AGENT_NAME
    }

    async fn process(&self, input: &str, state: &StateHandle) -> AgentResult<AgentResponse> {
        let conversation_id = state.lock().await.conversation_id.clone();
        let url = format!("{}/chat-messages", self.base_url);
        debug!(conversation_id, "Querying knowledge index");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "query": input,
                "inputs": {},
                "response_mode": "blocking",
                "user": conversation_id,
            }))
            .send()
            .await
            .map_err(|e| AgentError::Knowledge(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AgentError::Knowledge(format!(
                "Knowledge API returned {}",
                response.status()
            )));
        }

        let reply: KnowledgeReply = response
            .json()
            .await
            .map_err(|e| AgentError::Knowledge(format!("Unparseable knowledge reply: {e}")))?;

        if reply.answer.is_empty() {
            return Err(AgentError::Knowledge("Empty answer from index".to_string()));
        }

        Ok(AgentResponse::new(
            KNOWLEDGE_AGENT_NAME,
            reply.answer,
            ResponseKind::Reply,
        ))
    }

    async fn should_process(&self, _input: &str, context: &TurnContext) -> bool {
        context.intent == Intent::Domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::conversation::ConversationStore;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_answer_flows_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat-messages"))
            .and(body_partial_json(json!({ "response_mode": "blocking" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "Our pricing starts at twenty dollars a month."
            })))
            .mount(&server)
            .await;

        let store = ConversationStore::new();
        let state = store.create("conv-1");
        let agent = KnowledgeAgent::new(server.uri(), "key").unwrap();

        let response = agent.process("what does it cost?", &state).await.unwrap();
        assert_eq!(response.agent, KNOWLEDGE_AGENT_NAME);
        assert!(response.text.contains("twenty dollars"));
    }

    #[tokio::test]
    async fn test_http_failure_is_knowledge_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = ConversationStore::new();
        let state = store.create("conv-1");
        let agent = KnowledgeAgent::new(server.uri(), "key").unwrap();

        let err = agent.process("hello", &state).await.unwrap_err();
        assert!(matches!(err, AgentError::Knowledge(_)));
    }
}

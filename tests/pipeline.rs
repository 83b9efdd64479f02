//! End-to-end pipeline tests: phase machine, intent-driven dispatch,
//! playback ordering, and the lead-qualification loop.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use voxflow::core::agents::{
    AgentResponse, IntentClassifierAgent, KnowledgeAgent, PhrasePicker, QuickResponseAgent,
    ResponsePriority,
};
use voxflow::core::conversation::{
    CallGoal, ConversationPhase, ConversationStore, FieldSpec, StateHandle,
};
use voxflow::core::llm::{BaseLLM, CompletionOptions, LLMError, LLMResult};
use voxflow::core::orchestrator::{CallFlow, Orchestrator, PlaybackSequencer};

const HAPPY_SET: &[&str] = &[
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

/// Deterministic LLM: replies with the first script whose needle appears in
/// the prompt, so each test fully controls model behavior.
struct ScriptedLLM {
    scripts: Vec<(&'static str, &'static str)>,
}

impl ScriptedLLM {
    fn new(scripts: Vec<(&'static str, &'static str)>) -> Arc<Self> {
        Arc::new(Self { scripts })
    }
}

#[async_trait::async_trait]
impl BaseLLM for ScriptedLLM {
    async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> LLMResult<String> {
        for (needle, response) in &self.scripts {
            if prompt.contains(needle) {
                return Ok(response.to_string());
            }
        }
        Err(LLMError::CompletionFailed(format!(
            "no script matched prompt: {prompt}"
        )))
    }

    fn get_provider_info(&self) -> &'static str {
        "scripted"
    }
}

fn recording_sequencer() -> (Arc<PlaybackSequencer>, Arc<Mutex<Vec<AgentResponse>>>) {
    let sequencer = Arc::new(PlaybackSequencer::new(Duration::ZERO));
    let played: Arc<Mutex<Vec<AgentResponse>>> = Arc::new(Mutex::new(Vec::new()));
    let played_handle = played.clone();
    sequencer.on_playback(Arc::new(move |response| {
        let played = played_handle.clone();
        Box::pin(async move {
            played.lock().push(response);
        })
    }));
    (sequencer, played)
}

async fn unstructured_state(store: &ConversationStore, id: &str) -> StateHandle {
    let state = store.create(id);
    state.lock().await.set_phase(ConversationPhase::Unstructured);
    state
}

#[tokio::test(flavor = "multi_thread")]
async fn domain_turn_acknowledges_then_answers_from_knowledge() {
    let knowledge = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat-messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "Pricing starts at twenty dollars a month."
        })))
        .mount(&knowledge)
        .await;

    let classifier_llm = ScriptedLLM::new(vec![(
        "I love your product pricing",
        r#"{"emotion":"happy","confidence":0.9,"certainty":0.8,"isDomainRelated":true}"#,
    )]);
    let quick_llm = ScriptedLLM::new(vec![("caller just said", "Nice to chat!")]);

    let (sequencer, played) = recording_sequencer();
    let classifier = Arc::new(IntentClassifierAgent::with_picker(
        classifier_llm.clone(),
        PhrasePicker::with_seed(7),
    ));
    let flow = Arc::new(CallFlow::new(classifier_llm));
    let mut orchestrator = Orchestrator::new(
        classifier,
        flow,
        sequencer.clone(),
        Duration::from_secs(5),
    );
    orchestrator.register_agent(Arc::new(QuickResponseAgent::new(quick_llm)));
    orchestrator.register_agent(Arc::new(
        KnowledgeAgent::new(knowledge.uri(), "key").unwrap(),
    ));

    let store = ConversationStore::new();
    let state = unstructured_state(&store, "conv-domain").await;

    let responses = orchestrator
        .process("I love your product pricing", &state)
        .await;

    // acknowledgment from the happy set at (immediate, 1), knowledge answer
    // at (delayed, 2), quick responder discarded
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].agent, "intent-classifier");
    assert_eq!(responses[0].priority, ResponsePriority::Immediate);
    assert_eq!(responses[0].order, 1);
    assert!(HAPPY_SET.contains(&responses[0].text.as_str()));

    assert_eq!(responses[1].agent, "rag");
    assert_eq!(responses[1].priority, ResponsePriority::Delayed);
    assert_eq!(responses[1].order, 2);
    assert!(responses[1].text.contains("twenty dollars"));

    let played = played.lock();
    let order: Vec<&str> = played.iter().map(|r| r.agent.as_str()).collect();
    assert_eq!(order, vec!["intent-classifier", "rag"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn casual_turn_uses_quick_responder_and_drops_knowledge() {
    let knowledge = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "irrelevant"
        })))
        .mount(&knowledge)
        .await;

    let classifier_llm = ScriptedLLM::new(vec![(
        "lovely weather",
        r#"{"emotion":"casual","confidence":0.9,"certainty":0.9,"isDomainRelated":false}"#,
    )]);
    let quick_llm = ScriptedLLM::new(vec![("caller just said", "It really is a nice day!")]);

    let (sequencer, played) = recording_sequencer();
    let classifier = Arc::new(IntentClassifierAgent::with_picker(
        classifier_llm.clone(),
        PhrasePicker::with_seed(7),
    ));
    let flow = Arc::new(CallFlow::new(classifier_llm));
    let mut orchestrator = Orchestrator::new(
        classifier,
        flow,
        sequencer,
        Duration::from_secs(5),
    );
    orchestrator.register_agent(Arc::new(QuickResponseAgent::new(quick_llm)));
    orchestrator.register_agent(Arc::new(
        KnowledgeAgent::new(knowledge.uri(), "key").unwrap(),
    ));

    let store = ConversationStore::new();
    let state = unstructured_state(&store, "conv-casual").await;

    let responses = orchestrator.process("lovely weather today", &state).await;

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].agent, "quick-response");
    assert_eq!(responses[0].order, 2);
    assert_eq!(played.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_agents_degrade_to_empty_turn() {
    // classifier script missing -> fallback outcome; quick agent errors too
    let classifier_llm = ScriptedLLM::new(vec![]);
    let quick_llm = ScriptedLLM::new(vec![]);

    let (sequencer, played) = recording_sequencer();
    let classifier = Arc::new(IntentClassifierAgent::new(classifier_llm.clone()));
    let flow = Arc::new(CallFlow::new(classifier_llm));
    let mut orchestrator = Orchestrator::new(
        classifier,
        flow,
        sequencer,
        Duration::from_secs(5),
    );
    orchestrator.register_agent(Arc::new(QuickResponseAgent::new(quick_llm)));

    let store = ConversationStore::new();
    let state = unstructured_state(&store, "conv-broken").await;

    let responses = orchestrator.process("anyone there?", &state).await;
    assert!(responses.is_empty());
    assert!(played.lock().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn structured_phase_walks_greeting_availability_then_unstructured() {
    let llm = ScriptedLLM::new(vec![
        (
            "good time to talk",
            r#"{"isAvailable": true}"#,
        ),
        (
            "emotional tone",
            r#"{"emotion":"neutral","confidence":0.2,"certainty":0.2,"isDomainRelated":false}"#,
        ),
        ("caller just said", "Glad to hear it."),
    ]);

    let (sequencer, _played) = recording_sequencer();
    let classifier = Arc::new(IntentClassifierAgent::new(llm.clone()));
    let flow = Arc::new(
        CallFlow::new(llm.clone())
            .with_introduction(Some("This is Avery from Acme with two quick questions.".into())),
    );
    let mut orchestrator = Orchestrator::new(
        classifier,
        flow,
        sequencer,
        Duration::from_secs(5),
    );
    orchestrator.register_agent(Arc::new(QuickResponseAgent::new(llm)));

    let store = ConversationStore::new();
    let state = store.create("conv-structured");
    {
        let mut guard = state.lock().await;
        guard
            .memory
            .set_context("calleeName", json!("Ada"));
    }

    // start -> greeting
    let responses = orchestrator.process("hello?", &state).await;
    assert_eq!(responses[0].text, "Hey Ada");
    assert_eq!(responses[0].priority, ResponsePriority::Immediate);

    // greeting -> availability, plays the introduction
    let responses = orchestrator.process("hi", &state).await;
    assert!(responses[0].text.contains("Avery from Acme"));

    // availability -> unstructured
    let responses = orchestrator.process("sure, now works", &state).await;
    assert!(responses[0].text.contains("Let's get started"));
    assert_eq!(
        state.lock().await.phase(),
        ConversationPhase::Unstructured
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn lead_qualification_collects_fields_then_ends_call() {
    let llm = ScriptedLLM::new(vec![
        (
            "was asked: \"What is your name?\"",
            r#"{"isValidAnswer": true, "extractedValue": "Ada Lovelace"}"#,
        ),
        (
            "was asked: \"What is your email address?\"",
            r#"{"isValidAnswer": true, "extractedValue": "ada@example.com"}"#,
        ),
        ("for their name", "What is your name?"),
        ("for their email", "What is your email address?"),
    ]);

    let flow = CallFlow::new(llm);
    let store = ConversationStore::new();
    let state = store.create("conv-lead");
    {
        let mut guard = state.lock().await;
        guard.set_phase(ConversationPhase::Unstructured);
        guard.configure_lead_goal(vec![
            (
                "name".to_string(),
                FieldSpec {
                    required: true,
                    description: "full name".to_string(),
                },
            ),
            (
                "email".to_string(),
                FieldSpec {
                    required: true,
                    description: "email address".to_string(),
                },
            ),
        ]);
        assert_eq!(guard.goal, CallGoal::LeadQualification);
    }

    // first turn: nothing pending, asks for the name
    let response = flow.lead_turn("sure, go ahead", &state).await.unwrap();
    assert_eq!(response.text, "What is your name?");

    // second turn: name validated, asks for the email
    let response = flow.lead_turn("it's Ada Lovelace", &state).await.unwrap();
    assert_eq!(response.text, "What is your email address?");
    assert_eq!(
        state.lock().await.memory.get_entity("name"),
        Some(&json!("Ada Lovelace"))
    );

    // third turn: everything collected, terminal call-end
    let response = flow.lead_turn("ada@example.com", &state).await.unwrap();
    assert!(response.complete);
    let memory = response.memory_state.unwrap();
    assert_eq!(memory["entities"]["email"], json!("ada@example.com"));
    assert_eq!(memory["_metadata"]["hasAllRequiredFields"], json!(true));
}

#[tokio::test(flavor = "multi_thread")]
async fn refusal_counts_as_valid_answer() {
    let llm = ScriptedLLM::new(vec![
        (
            "was asked: \"What is your name?\"",
            r#"{"isValidAnswer": true, "extractedValue": null}"#,
        ),
        ("for their name", "What is your name?"),
        ("for their email", "What is your email address?"),
    ]);

    let flow = CallFlow::new(llm);
    let store = ConversationStore::new();
    let state = store.create("conv-refusal");
    {
        let mut guard = state.lock().await;
        guard.set_phase(ConversationPhase::Unstructured);
        guard.configure_lead_goal(vec![
            (
                "name".to_string(),
                FieldSpec {
                    required: true,
                    description: "full name".to_string(),
                },
            ),
            (
                "email".to_string(),
                FieldSpec {
                    required: true,
                    description: "email address".to_string(),
                },
            ),
        ]);
    }

    flow.lead_turn("ok", &state).await.unwrap();
    // refusal is a valid answer; the raw input is stored and the flow moves on
    let response = flow.lead_turn("I'd rather not say", &state).await.unwrap();
    assert_eq!(response.text, "What is your email address?");
    assert_eq!(
        state.lock().await.memory.get_entity("name"),
        Some(&json!("I'd rather not say"))
    );
}

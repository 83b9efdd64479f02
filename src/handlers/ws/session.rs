//! Per-call pipeline wiring.
//!
//! A `CallSession` owns everything one media stream needs: the recognizer,
//! the turn-end detector, the orchestrator with its agents, the playback
//! sequencer, and the teardown flow that summarizes and persists the call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use tokio::sync::{Mutex as AsyncMutex, Notify, mpsc};
use tracing::{debug, error, info, warn};

use super::messages::{CallConfig, OutgoingFrame};
use super::playback::{NearEndHook, stream_audio};
use crate::config::ServerConfig;
use crate::core::agents::{
    IntentClassifierAgent, KnowledgeAgent, QuickResponseAgent, ResponsePriority, SummaryAgent,
};
use crate::core::conversation::{CallGoal, Speaker, StateHandle};
use crate::core::llm::{BaseLLM, create_llm_provider};
use crate::core::orchestrator::{CallFlow, Orchestrator, PlaybackSequencer};
use crate::core::stt::{BaseSTT, STTConfig, create_stt_provider};
use crate::core::tts::{BaseTTS, TTSConfig, create_tts_provider};
use crate::core::turn::TurnEndDetector;
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;
use crate::utils::activity::{Activity, ActivityStatus};
use crate::utils::observers::ObserverEvent;

type SttSlot = Arc<AsyncMutex<Option<Box<dyn BaseSTT>>>>;

pub struct CallSession {
    app: Arc<AppState>,
    pub config: CallConfig,
    stream_sid: String,
    state: StateHandle,
    stt: SttSlot,
    orchestrator: Arc<Orchestrator>,
    detector: Arc<TurnEndDetector>,
    out_tx: mpsc::UnboundedSender<OutgoingFrame>,
    hangup: Arc<Notify>,
    summary_llm: Option<Arc<dyn BaseLLM>>,
    started_at: Instant,
    finished: AtomicBool,
}

/// First configured provider wins, preferring `preferred` for latency or
/// quality reasons at each call site.
fn pick_llm(config: &ServerConfig, preferred: &str) -> AppResult<Arc<dyn BaseLLM>> {
    for provider in [preferred, "groq", "openai"] {
        if let Some(key) = config.llm_api_key(provider) {
            return create_llm_provider(provider, key)
                .map_err(|e| AppError::Configuration(e.to_string()));
        }
    }
    Err(AppError::Configuration(
        "No LLM provider configured".to_string(),
    ))
}

impl CallSession {
    /// Bring the whole pipeline up for one media stream.
    ///
    /// Fails before any stream work begins on unknown provider names, missing
    /// keys, or a conversation id with no initialized state.
    pub async fn start(
        app: Arc<AppState>,
        out_tx: mpsc::UnboundedSender<OutgoingFrame>,
        stream_sid: String,
        config: CallConfig,
    ) -> AppResult<Arc<Self>> {
        let state = app
            .store
            .get(&config.conversation_id)
            .map_err(|e| AppError::NotFound(e.to_string()))?;

        if config.lead_prompt.is_some() {
            let mut guard = state.lock().await;
            guard.goal = CallGoal::LeadQualification;
            if let Some(prompt) = &config.lead_prompt {
                guard
                    .memory
                    .set_context("leadPrompt", serde_json::json!(prompt.clone()));
            }
        }

        // LLM providers: fast model for classification and flow, a stronger
        // one for the post-call summary
        let classifier_llm = pick_llm(&app.config, "groq")?;
        let flow_llm = classifier_llm.clone();
        let summary_llm = pick_llm(&app.config, "openai").ok();

        // TTS
        let tts_key = app
            .config
            .tts_api_key(&config.tts_service)
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "No API key configured for TTS provider: {}",
                    config.tts_service
                ))
            })?
            .to_string();
        let tts: Arc<dyn BaseTTS> = Arc::from(
            create_tts_provider(
                &config.tts_service,
                TTSConfig {
                    provider: config.tts_service.clone(),
                    api_key: tts_key,
                    voice_id: (!config.voice_type.is_empty())
                        .then(|| config.voice_type.clone()),
                    ..Default::default()
                },
            )
            .map_err(|e| AppError::Configuration(e.to_string()))?,
        );

        let sequencer = Arc::new(PlaybackSequencer::new(app.config.playback_settle()));
        let stt_slot: SttSlot = Arc::new(AsyncMutex::new(None));

        // playback: synthesize (or replay cached audio), pace frames out,
        // resume the recognizer near the end, then mark end-of-utterance
        {
            let out_tx = out_tx.clone();
            let stream_sid = stream_sid.clone();
            let tts = tts.clone();
            let stt = stt_slot.clone();
            sequencer.on_playback(Arc::new(move |response| {
                let out_tx = out_tx.clone();
                let stream_sid = stream_sid.clone();
                let tts = tts.clone();
                let stt = stt.clone();
                Box::pin(async move {
                    let audio: Bytes = match response.audio {
                        Some(audio) => audio,
                        None => {
                            if response.text.is_empty() {
                                return;
                            }
                            match tts.synthesize(&response.text).await {
                                Ok(audio) => audio.data,
                                Err(e) => {
                                    // aborts only this playback item
                                    error!(agent = %response.agent, "TTS failed: {e}");
                                    return;
                                }
                            }
                        }
                    };

                    let near_end: NearEndHook = Box::new(move || {
                        tokio::spawn(async move {
                            if let Some(stt) = stt.lock().await.as_ref() {
                                stt.resume();
                            }
                        });
                    });

                    if stream_audio(&out_tx, &stream_sid, &audio, Some(near_end)).await {
                        let _ = out_tx.send(OutgoingFrame::mark(&stream_sid, "utterance-complete"));
                    }
                })
            }));
        }

        // general listeners: mirror every queued response to observers and
        // the transcript, independent of playback timing
        {
            let observers = app.observers.clone();
            let state = state.clone();
            sequencer.on_general(Arc::new(move |response| {
                if response.text.is_empty() {
                    return;
                }
                observers.publish(ObserverEvent::Transcription {
                    text: response.text.clone(),
                    source: response.agent.clone(),
                    priority: match response.priority {
                        ResponsePriority::Immediate => "immediate".to_string(),
                        ResponsePriority::Delayed => "delayed".to_string(),
                    },
                });
                let state = state.clone();
                let text = response.text.clone();
                tokio::spawn(async move {
                    state.lock().await.push_transcript(Speaker::Assistant, text);
                });
            }));
        }

        // orchestrator with agents
        let classifier = Arc::new(IntentClassifierAgent::new(classifier_llm.clone()));
        let flow = Arc::new(
            CallFlow::new(flow_llm.clone()).with_introduction(config.introduction.clone()),
        );
        let mut orchestrator = Orchestrator::new(
            classifier,
            flow,
            sequencer.clone(),
            app.config.agent_timeout(),
        );
        orchestrator.register_agent(Arc::new(QuickResponseAgent::new(flow_llm)));
        if let (Some(url), Some(key)) = (
            &app.config.knowledge_api_url,
            &app.config.knowledge_api_key,
        ) {
            match KnowledgeAgent::new(url.clone(), key.clone()) {
                Ok(agent) => orchestrator.register_agent(Arc::new(agent)),
                Err(e) => warn!("Knowledge agent unavailable: {e}"),
            }
        }
        let orchestrator = Arc::new(orchestrator);

        // turn-end detection drives the orchestrator; the recognizer is
        // paused for the whole turn so no overlapping turn can start
        let hangup = Arc::new(Notify::new());
        let detector = {
            let orchestrator = orchestrator.clone();
            let state = state.clone();
            let stt = stt_slot.clone();
            let hangup = hangup.clone();
            let observers = app.observers.clone();
            Arc::new(TurnEndDetector::new(
                app.config.turn_debounce(),
                Arc::new(move |utterance| {
                    let orchestrator = orchestrator.clone();
                    let state = state.clone();
                    let stt = stt.clone();
                    let hangup = hangup.clone();
                    let observers = observers.clone();
                    Box::pin(async move {
                        info!("Processing turn: {utterance:?}");
                        if let Some(stt) = stt.lock().await.as_ref() {
                            stt.pause();
                        }
                        observers.publish(ObserverEvent::Transcription {
                            text: utterance.clone(),
                            source: "caller".to_string(),
                            priority: "immediate".to_string(),
                        });
                        state
                            .lock()
                            .await
                            .push_transcript(Speaker::Caller, utterance.clone());

                        let responses = orchestrator.process(&utterance, &state).await;
                        if responses.iter().any(|response| response.complete) {
                            info!("Call goal complete, hanging up");
                            hangup.notify_one();
                        } else if let Some(stt) = stt.lock().await.as_ref() {
                            stt.resume();
                        }
                    })
                }),
            ))
        };

        // STT
        let stt_key = app
            .config
            .stt_api_key(&config.stt_service)
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "No API key configured for STT provider: {}",
                    config.stt_service
                ))
            })?
            .to_string();
        let mut stt = create_stt_provider(
            &config.stt_service,
            STTConfig {
                api_key: stt_key,
                ..Default::default()
            },
        )
        .map_err(|e| AppError::Configuration(e.to_string()))?;

        {
            let detector = detector.clone();
            stt.on_result(Arc::new(move |result| {
                let detector = detector.clone();
                Box::pin(async move {
                    if result.transcript.is_empty() {
                        return;
                    }
                    if result.is_final {
                        // processing a turn must not stall the recognizer loop
                        tokio::spawn(async move {
                            detector.on_final(&result.transcript).await;
                        });
                    } else {
                        detector.on_interim(&result.transcript);
                    }
                })
            }))
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

            stt.on_error(Arc::new(|e| {
                Box::pin(async move {
                    error!("Recognizer stream error: {e}");
                })
            }))
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
        }

        stt.connect()
            .await
            .map_err(|e| AppError::InternalServerError(format!("STT connection failed: {e}")))?;
        *stt_slot.lock().await = Some(stt);

        let session = Arc::new(Self {
            app,
            config,
            stream_sid,
            state,
            stt: stt_slot,
            orchestrator,
            detector,
            out_tx,
            hangup,
            summary_llm,
            started_at: Instant::now(),
            finished: AtomicBool::new(false),
        });

        session.play_cached_introduction().await;
        Ok(session)
    }

    /// Replay the pre-synthesized introduction, if one was prepared.
    /// A cache miss is not an error; the greeting flow covers it live.
    async fn play_cached_introduction(&self) {
        let Some(introduction) = &self.config.introduction else {
            return;
        };
        let cached = self
            .app
            .audio_cache
            .get(&self.config.tts_service, &self.config.voice_type, introduction)
            .await;

        match cached {
            Some(audio) => {
                info!("Playing cached introduction");
                let _ = self.out_tx.send(OutgoingFrame::media(
                    &self.stream_sid,
                    BASE64.encode(&audio),
                ));
                self.state
                    .lock()
                    .await
                    .push_transcript(Speaker::Assistant, introduction.clone());
            }
            None => debug!("No cached introduction, will synthesize live"),
        }
    }

    /// Feed one inbound audio chunk to the recognizer
    pub async fn handle_media(&self, payload_base64: &str) {
        if self.finished.load(Ordering::Acquire) {
            return;
        }
        let audio = match BASE64.decode(payload_base64) {
            Ok(audio) => audio,
            Err(e) => {
                warn!("Undecodable media payload: {e}");
                return;
            }
        };
        if let Some(stt) = self.stt.lock().await.as_mut() {
            if let Err(e) = stt.send_audio(audio).await {
                warn!("Failed to forward audio: {e}");
            }
        }
    }

    /// Fires when the pipeline decides the call is over (lead goal complete)
    pub fn hangup_signal(&self) -> Arc<Notify> {
        self.hangup.clone()
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn detector(&self) -> &Arc<TurnEndDetector> {
        &self.detector
    }

    /// Teardown: stop the recognizer, summarize, persist call metadata,
    /// notify observers, and destroy the conversation state. Idempotent.
    pub async fn finish(&self) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(
            conversation_id = %self.config.conversation_id,
            "Finishing call session"
        );

        if let Some(mut stt) = self.stt.lock().await.take() {
            if let Err(e) = stt.disconnect().await {
                warn!("Recognizer disconnect failed: {e}");
            }
        }

        let (transcript, memory_state) = {
            let guard = self.state.lock().await;
            (guard.transcript_text(), guard.memory_snapshot())
        };

        let summary = if transcript.is_empty() {
            None
        } else if let Some(llm) = &self.summary_llm {
            match SummaryAgent::new(llm.clone()).summarize(&transcript).await {
                Ok(summary) => Some(summary),
                Err(e) => {
                    warn!("Summary generation failed: {e}");
                    None
                }
            }
        } else {
            None
        };

        if let Some(summary) = &summary {
            self.app.observers.publish(ObserverEvent::Summary {
                text: summary.clone(),
                memory: Some(memory_state.clone()),
            });
        }

        if let Some(activity_id) = &self.config.activity_id {
            let mut activity = self
                .app
                .activities
                .find_by_id(activity_id)
                .await
                .unwrap_or_else(|| Activity::new(activity_id.clone()));
            activity.status = ActivityStatus::Completed;
            activity.summary = summary;
            activity.call_duration_secs = Some(self.started_at.elapsed().as_secs_f64());
            activity.transcript = (!transcript.is_empty()).then_some(transcript);
            activity.memory_state = Some(memory_state);
            self.app.activities.save(activity).await;
        }

        self.app.store.destroy(&self.config.conversation_id);
    }
}

//! Deepgram streaming STT over the `/v1/listen` WebSocket API.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use super::base::{
    BaseSTT, STTConfig, STTConnectionState, STTError, STTErrorCallback, STTResult,
    STTResultCallback,
};

const DEEPGRAM_STT_URL: &str = "wss://api.deepgram.com/v1/listen";

/// Transcription response frame from Deepgram
#[derive(Debug, Deserialize)]
struct ListenResponse {
    #[serde(rename = "type")]
    response_type: String,
    channel: Option<ListenChannel>,
    is_final: Option<bool>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    transcript: String,
    confidence: f32,
}

/// Deepgram STT WebSocket client
pub struct DeepgramSTT {
    config: Option<STTConfig>,
    state: Arc<RwLock<STTConnectionState>>,
    /// While set, transcription results are dropped instead of delivered
    paused: Arc<AtomicBool>,
    ws_sender: Option<mpsc::UnboundedSender<Message>>,
    shutdown_tx: Option<broadcast::Sender<()>>,
    result_callback: Option<STTResultCallback>,
    error_callback: Option<STTErrorCallback>,
    connection_handle: Option<tokio::task::JoinHandle<()>>,
}

impl DeepgramSTT {
    fn build_websocket_url(config: &STTConfig) -> Result<String, STTError> {
        let mut url = Url::parse(DEEPGRAM_STT_URL)
            .map_err(|e| STTError::ConfigurationError(format!("Invalid WebSocket URL: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("model", &config.model);
            query.append_pair("language", &config.language);
            query.append_pair("encoding", &config.encoding);
            query.append_pair("sample_rate", &config.sample_rate.to_string());
            query.append_pair("channels", &config.channels.to_string());
            query.append_pair("interim_results", &config.interim_results.to_string());
            query.append_pair("punctuate", "true");
        }

        Ok(url.to_string())
    }

    async fn wait_for_connection(&self) -> Result<(), STTError> {
        for _ in 0..50 {
            // snapshot the state so no lock guard is held across the sleep
            let snapshot = self.state.read().clone();
            match snapshot {
                STTConnectionState::Connected => return Ok(()),
                STTConnectionState::Error(msg) => {
                    return Err(STTError::ConnectionFailed(msg));
                }
                _ => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
        Err(STTError::ConnectionFailed(
            "Connection timeout".to_string(),
        ))
    }
}

#[async_trait::async_trait]
impl BaseSTT for DeepgramSTT {
    fn new(config: STTConfig) -> Result<Self, STTError> {
        if config.api_key.is_empty() {
            return Err(STTError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        Ok(Self {
            config: Some(config),
            state: Arc::new(RwLock::new(STTConnectionState::Disconnected)),
            paused: Arc::new(AtomicBool::new(false)),
            ws_sender: None,
            shutdown_tx: None,
            result_callback: None,
            error_callback: None,
            connection_handle: None,
        })
    }

    async fn connect(&mut self) -> Result<(), STTError> {
        let config = self.config.as_ref().ok_or_else(|| {
            STTError::ConfigurationError("No configuration available".to_string())
        })?;
        let ws_url = Self::build_websocket_url(config)?;
        let api_key = config.api_key.clone();

        let (ws_tx, mut ws_rx) = mpsc::unbounded_channel::<Message>();
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
        self.ws_sender = Some(ws_tx);
        self.shutdown_tx = Some(shutdown_tx);

        let state = self.state.clone();
        let paused = self.paused.clone();
        let result_callback = self.result_callback.clone();
        let error_callback = self.error_callback.clone();

        let handle = tokio::spawn(async move {
            *state.write() = STTConnectionState::Connecting;

            let request = tokio_tungstenite::tungstenite::http::Request::builder()
                .uri(&ws_url)
                .header("Host", "api.deepgram.com")
                .header("Authorization", format!("Token {api_key}"))
                .header("Upgrade", "websocket")
                .header("Connection", "Upgrade")
                .header(
                    "Sec-WebSocket-Key",
                    tokio_tungstenite::tungstenite::handshake::client::generate_key(),
                )
                .header("Sec-WebSocket-Version", "13")
                .body(())
                .expect("static request parts are valid");

            let (ws_stream, _) = match connect_async(request).await {
                Ok(result) => result,
                Err(e) => {
                    error!("Failed to connect to Deepgram: {}", e);
                    *state.write() = STTConnectionState::Error(format!("Connection failed: {e}"));
                    if let Some(cb) = &error_callback {
                        cb(STTError::ConnectionFailed(e.to_string())).await;
                    }
                    return;
                }
            };

            info!("Connected to Deepgram STT WebSocket");
            *state.write() = STTConnectionState::Connected;

            let (mut ws_sink, mut ws_source) = ws_stream.split();

            loop {
                tokio::select! {
                    Some(message) = ws_rx.recv() => {
                        if let Err(e) = ws_sink.send(message).await {
                            error!("Failed to send audio to Deepgram: {}", e);
                            *state.write() = STTConnectionState::Error(e.to_string());
                            if let Some(cb) = &error_callback {
                                cb(STTError::NetworkError(e.to_string())).await;
                            }
                            break;
                        }
                    }

                    message = ws_source.next() => {
                        match message {
                            Some(Ok(Message::Text(text))) => {
                                let response: ListenResponse = match serde_json::from_str(&text) {
                                    Ok(r) => r,
                                    Err(e) => {
                                        warn!("Unparseable Deepgram frame: {}", e);
                                        continue;
                                    }
                                };

                                match response.response_type.as_str() {
                                    "Results" => {
                                        let Some(alternative) = response
                                            .channel
                                            .as_ref()
                                            .and_then(|c| c.alternatives.first())
                                        else {
                                            continue;
                                        };
                                        if paused.load(Ordering::Acquire) {
                                            continue;
                                        }
                                        let result = STTResult::new(
                                            alternative.transcript.clone(),
                                            response.is_final.unwrap_or(false),
                                            alternative.confidence,
                                        );
                                        if let Some(cb) = &result_callback {
                                            cb(result).await;
                                        }
                                    }
                                    "Metadata" => {
                                        debug!("Deepgram metadata frame received");
                                    }
                                    "Error" => {
                                        let msg = response
                                            .description
                                            .unwrap_or_else(|| "unknown Deepgram error".to_string());
                                        error!("Deepgram stream error: {}", msg);
                                        *state.write() = STTConnectionState::Error(msg.clone());
                                        if let Some(cb) = &error_callback {
                                            cb(STTError::ProviderError(msg)).await;
                                        }
                                        break;
                                    }
                                    other => debug!("Ignoring Deepgram frame type: {}", other),
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                info!("Deepgram closed the stream: {:?}", frame);
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!("Deepgram WebSocket error: {}", e);
                                *state.write() = STTConnectionState::Error(e.to_string());
                                if let Some(cb) = &error_callback {
                                    cb(STTError::NetworkError(e.to_string())).await;
                                }
                                break;
                            }
                            None => {
                                info!("Deepgram WebSocket stream ended");
                                break;
                            }
                        }
                    }

                    _ = shutdown_rx.recv() => {
                        debug!("Deepgram STT shutdown requested");
                        let _ = ws_sink
                            .send(Message::Text(r#"{"type":"CloseStream"}"#.into()))
                            .await;
                        break;
                    }
                }
            }

            let mut guard = state.write();
            if !matches!(*guard, STTConnectionState::Error(_)) {
                *guard = STTConnectionState::Disconnected;
            }
        });

        self.connection_handle = Some(handle);
        self.wait_for_connection().await
    }

    async fn disconnect(&mut self) -> Result<(), STTError> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(mut handle) = self.connection_handle.take() {
            // Give the task a moment to send CloseStream before aborting
            if tokio::time::timeout(Duration::from_millis(500), &mut handle)
                .await
                .is_err()
            {
                debug!("Deepgram connection task did not exit in time");
                handle.abort();
            }
        }
        self.ws_sender = None;
        *self.state.write() = STTConnectionState::Disconnected;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        matches!(*self.state.read(), STTConnectionState::Connected)
    }

    async fn send_audio(&mut self, audio_data: Vec<u8>) -> Result<(), STTError> {
        // Errored or disconnected streams swallow audio until reconnected
        if !self.is_ready() {
            debug!("Dropping {} audio bytes: stream not ready", audio_data.len());
            return Ok(());
        }
        if let Some(sender) = &self.ws_sender {
            if sender.send(Message::Binary(audio_data.into())).is_err() {
                warn!("Deepgram connection task gone; dropping audio");
                *self.state.write() =
                    STTConnectionState::Error("connection task exited".to_string());
            }
        }
        Ok(())
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    async fn on_result(&mut self, callback: STTResultCallback) -> Result<(), STTError> {
        self.result_callback = Some(callback);
        Ok(())
    }

    async fn on_error(&mut self, callback: STTErrorCallback) -> Result<(), STTError> {
        self.error_callback = Some(callback);
        Ok(())
    }

    fn get_config(&self) -> Option<&STTConfig> {
        self.config.as_ref()
    }

    fn get_provider_info(&self) -> &'static str {
        "Deepgram STT (streaming WebSocket)"
    }
}

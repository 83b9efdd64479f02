//! AssemblyAI real-time STT over the `/v2/realtime` WebSocket API.
//!
//! Audio is shipped as base64 inside JSON frames rather than binary frames,
//! which is the main protocol difference from Deepgram.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use super::base::{
    BaseSTT, STTConfig, STTConnectionState, STTError, STTErrorCallback, STTResult,
    STTResultCallback,
};

const ASSEMBLYAI_STT_URL: &str = "wss://api.assemblyai.com/v2/realtime/ws";

#[derive(Debug, Deserialize)]
struct RealtimeMessage {
    message_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

/// AssemblyAI real-time STT WebSocket client
pub struct AssemblyAISTT {
    config: Option<STTConfig>,
    state: Arc<RwLock<STTConnectionState>>,
    paused: Arc<AtomicBool>,
    ws_sender: Option<mpsc::UnboundedSender<Message>>,
    shutdown_tx: Option<broadcast::Sender<()>>,
    result_callback: Option<STTResultCallback>,
    error_callback: Option<STTErrorCallback>,
    connection_handle: Option<tokio::task::JoinHandle<()>>,
}

impl AssemblyAISTT {
    fn build_websocket_url(config: &STTConfig) -> Result<String, STTError> {
        let mut url = Url::parse(ASSEMBLYAI_STT_URL)
            .map_err(|e| STTError::ConfigurationError(format!("Invalid WebSocket URL: {e}")))?;

        // AssemblyAI names the telephony codec "pcm_mulaw"
        let encoding = if config.encoding == "mulaw" {
            "pcm_mulaw"
        } else {
            config.encoding.as_str()
        };

        url.query_pairs_mut()
            .append_pair("sample_rate", &config.sample_rate.to_string())
            .append_pair("encoding", encoding);

        Ok(url.to_string())
    }

    async fn wait_for_connection(&self) -> Result<(), STTError> {
        for _ in 0..50 {
            // snapshot the state so no lock guard is held across the sleep
            let snapshot = self.state.read().clone();
            match snapshot {
                STTConnectionState::Connected => return Ok(()),
                STTConnectionState::Error(msg) => return Err(STTError::ConnectionFailed(msg)),
                _ => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
        Err(STTError::ConnectionFailed("Connection timeout".to_string()))
    }
}

#[async_trait::async_trait]
impl BaseSTT for AssemblyAISTT {
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
                .header("Host", "api.assemblyai.com")
                .header("Authorization", api_key)
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
                    error!("Failed to connect to AssemblyAI: {}", e);
                    *state.write() = STTConnectionState::Error(format!("Connection failed: {e}"));
                    if let Some(cb) = &error_callback {
                        cb(STTError::ConnectionFailed(e.to_string())).await;
                    }
                    return;
                }
            };

            let (mut ws_sink, mut ws_source) = ws_stream.split();

            loop {
                tokio::select! {
                    Some(message) = ws_rx.recv() => {
                        if let Err(e) = ws_sink.send(message).await {
                            error!("Failed to send audio to AssemblyAI: {}", e);
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
                                let msg: RealtimeMessage = match serde_json::from_str(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        warn!("Unparseable AssemblyAI frame: {}", e);
                                        continue;
                                    }
                                };

                                match msg.message_type.as_str() {
                                    "SessionBegins" => {
                                        info!(
                                            "AssemblyAI session established: {}",
                                            msg.session_id.as_deref().unwrap_or("unknown")
                                        );
                                        *state.write() = STTConnectionState::Connected;
                                    }
                                    "PartialTranscript" | "FinalTranscript" => {
                                        let transcript = msg.text.unwrap_or_default();
                                        if transcript.is_empty() || paused.load(Ordering::Acquire) {
                                            continue;
                                        }
                                        let result = STTResult::new(
                                            transcript,
                                            msg.message_type == "FinalTranscript",
                                            msg.confidence.unwrap_or(1.0),
                                        );
                                        if let Some(cb) = &result_callback {
                                            cb(result).await;
                                        }
                                    }
                                    "SessionTerminated" => {
                                        info!("AssemblyAI session terminated");
                                        break;
                                    }
                                    other => {
                                        let description = msg
                                            .error
                                            .unwrap_or_else(|| format!("unexpected frame: {other}"));
                                        if other == "Error" {
                                            error!("AssemblyAI stream error: {}", description);
                                            *state.write() =
                                                STTConnectionState::Error(description.clone());
                                            if let Some(cb) = &error_callback {
                                                cb(STTError::ProviderError(description)).await;
                                            }
                                            break;
                                        }
                                        debug!("Ignoring AssemblyAI frame type: {}", other);
                                    }
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                info!("AssemblyAI closed the stream: {:?}", frame);
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!("AssemblyAI WebSocket error: {}", e);
                                *state.write() = STTConnectionState::Error(e.to_string());
                                if let Some(cb) = &error_callback {
                                    cb(STTError::NetworkError(e.to_string())).await;
                                }
                                break;
                            }
                            None => break,
                        }
                    }

                    _ = shutdown_rx.recv() => {
                        debug!("AssemblyAI STT shutdown requested");
                        let _ = ws_sink
                            .send(Message::Text(r#"{"terminate_session":true}"#.into()))
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
            if tokio::time::timeout(Duration::from_millis(500), &mut handle)
                .await
                .is_err()
            {
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
        if !self.is_ready() {
            debug!("Dropping {} audio bytes: stream not ready", audio_data.len());
            return Ok(());
        }
        if let Some(sender) = &self.ws_sender {
            let frame = json!({ "audio_data": BASE64.encode(&audio_data) });
            if sender.send(Message::Text(frame.to_string().into())).is_err() {
                warn!("AssemblyAI connection task gone; dropping audio");
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
        "AssemblyAI STT (real-time WebSocket)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url_maps_mulaw_encoding() {
        let config = STTConfig {
            api_key: "key".to_string(),
            ..Default::default()
        };
        let url = AssemblyAISTT::build_websocket_url(&config).unwrap();
        assert!(url.contains("encoding=pcm_mulaw"));
        assert!(url.contains("sample_rate=8000"));
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let err = AssemblyAISTT::new(STTConfig::default()).err().unwrap();
        assert!(matches!(err, STTError::AuthenticationFailed(_)));
    }

    // connect() runs inside spawned tasks, so its future must stay Send
    #[test]
    fn test_connect_future_is_send() {
        fn assert_send<F: std::future::Future + Send>(_f: F) {}

        let mut stt = AssemblyAISTT::new(STTConfig {
            api_key: "key".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_send(stt.connect());
    }
}

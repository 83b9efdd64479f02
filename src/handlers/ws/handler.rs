//! Axum WebSocket handlers for the media stream and observer endpoints.

use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::select;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, error, info, warn};

use super::messages::{CallConfig, IncomingFrame, OutgoingFrame};
use super::session::CallSession;
use crate::state::AppState;

/// Media stream endpoint: upgrades to the bidirectional voice pipeline
pub async fn ws_media_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("Media stream connection upgrade requested");
    ws.on_upgrade(move |socket| handle_media_socket(socket, state))
}

async fn handle_media_socket(socket: WebSocket, app: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutgoingFrame>();
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            match serde_json::to_string(&frame) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("Media socket sender closed");
                        break;
                    }
                }
                Err(e) => error!("Failed to serialize outgoing frame: {e}"),
            }
        }
        let _ = sender.close().await;
    });

    let mut session: Option<Arc<CallSession>> = None;
    let mut hangup: Option<Arc<Notify>> = None;

    loop {
        let hangup_wait = hangup.clone();
        select! {
            message = receiver.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        let frame: IncomingFrame = match serde_json::from_str(&text) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!("Unparseable media stream frame: {e}");
                                continue;
                            }
                        };
                        match frame {
                            IncomingFrame::Start { stream_sid, start } => {
                                if session.is_some() {
                                    warn!("Duplicate start frame ignored");
                                    continue;
                                }
                                let config =
                                    match CallConfig::from_parameters(&start.custom_parameters) {
                                        Ok(config) => config,
                                        Err(e) => {
                                            error!("Call setup rejected: {e}");
                                            break;
                                        }
                                    };
                                info!(
                                    stream_sid,
                                    conversation_id = %config.conversation_id,
                                    "Media stream started"
                                );
                                match CallSession::start(
                                    app.clone(),
                                    out_tx.clone(),
                                    stream_sid,
                                    config,
                                )
                                .await
                                {
                                    Ok(started) => {
                                        hangup = Some(started.hangup_signal());
                                        session = Some(started);
                                    }
                                    Err(e) => {
                                        error!("Call setup failed: {e}");
                                        break;
                                    }
                                }
                            }
                            IncomingFrame::Media { media } => match &session {
                                Some(session) => session.handle_media(&media.payload).await,
                                None => debug!("Dropping media frame before start"),
                            },
                            IncomingFrame::Stop {} => {
                                info!("Stop frame received");
                                break;
                            }
                            IncomingFrame::Other => {}
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Media socket closed by peer");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Media socket error: {e}");
                        break;
                    }
                }
            }

            _ = async {
                match &hangup_wait {
                    Some(notify) => notify.notified().await,
                    None => std::future::pending().await,
                }
            } => {
                info!("Pipeline requested hangup");
                break;
            }
        }
    }

    if let Some(session) = session {
        session.finish().await;
    }

    drop(out_tx);
    let _ = sender_task.await;
    info!("Media stream connection closed");
}

/// Observer endpoint: streams transcription and summary events to dashboards
pub async fn ws_observe_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_observer_socket(socket, state))
}

async fn handle_observer_socket(mut socket: WebSocket, app: Arc<AppState>) {
    info!("Observer connected");
    let mut events = app.observers.subscribe();

    loop {
        select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                error!("Failed to serialize observer event: {e}");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        // best-effort delivery: a slow observer just loses events
                        warn!("Observer lagged, skipped {skipped} events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }

            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Observer socket error: {e}");
                        break;
                    }
                }
            }
        }
    }

    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: 1000,
            reason: "goodbye".into(),
        })))
        .await;
    info!("Observer disconnected");
}

//! Outbound audio pacing.
//!
//! Synthesized clips are sliced into small frames and sent at real-time rate
//! so the telephony bridge can play them as they arrive. A near-end signal
//! fires shortly before the clip finishes so the recognizer can resume
//! listening without clipping the caller's next words.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::debug;

use super::messages::OutgoingFrame;

/// 40ms of 8kHz mulaw per outbound frame
pub const FRAME_BYTES: usize = 320;
const BYTES_PER_SECOND: u64 = 8000;
/// How far before the end of a clip the near-end signal fires
pub const NEAR_END_MS: u64 = 500;

/// One-shot hook fired near the end of a clip
pub type NearEndHook = Box<dyn FnOnce() + Send>;

fn remaining_ms(remaining_bytes: usize) -> u64 {
    remaining_bytes as u64 * 1000 / BYTES_PER_SECOND
}

/// Send one audio clip over the media stream at playback rate.
///
/// Returns `false` when the outgoing channel is gone (caller hung up);
/// pacing stops immediately in that case.
pub async fn stream_audio(
    out_tx: &mpsc::UnboundedSender<OutgoingFrame>,
    stream_sid: &str,
    audio: &[u8],
    mut near_end: Option<NearEndHook>,
) -> bool {
    let frame_duration = Duration::from_millis((FRAME_BYTES as u64 * 1000) / BYTES_PER_SECOND);
    let mut sent = 0usize;

    for chunk in audio.chunks(FRAME_BYTES) {
        let frame = OutgoingFrame::media(stream_sid, BASE64.encode(chunk));
        if out_tx.send(frame).is_err() {
            debug!("Media stream closed mid-clip");
            return false;
        }
        sent += chunk.len();

        if remaining_ms(audio.len() - sent) <= NEAR_END_MS {
            if let Some(hook) = near_end.take() {
                hook();
            }
        }

        tokio::time::sleep(frame_duration).await;
    }

    if let Some(hook) = near_end.take() {
        hook();
    }
    true
}

//! # Media Stream WebSocket Module
//!
//! Real-time voice pipeline over a Twilio-style bidirectional media stream.
//!
//! ## Connection Flow
//! 1. A conversation is created via `POST /api/conversations` (and an
//!    introduction optionally pre-synthesized via `POST /api/audio/prepare`)
//! 2. The telephony bridge connects to `/ws/media` and sends a `start` frame
//!    carrying the stream id and custom parameters (provider selection, voice
//!    type, lead prompt, introduction text, conversation id, activity id)
//! 3. `media` frames carry base64 mulaw audio both directions; the server
//!    paces outbound audio at playback rate and sends a `mark` frame at the
//!    end of each utterance
//! 4. A `stop` frame (or socket close) tears the call down: the transcript is
//!    summarized, call metadata persisted, and the conversation state destroyed
//!
//! Observers connect to `/ws/observe` and receive best-effort `transcription`
//! and `summary` events mirroring the call.

mod handler;
mod messages;
mod playback;
mod session;

pub use handler::{ws_media_handler, ws_observe_handler};
pub use messages::{CallConfig, IncomingFrame, OutgoingFrame};
pub use playback::{FRAME_BYTES, NEAR_END_MS, stream_audio};
pub use session::CallSession;

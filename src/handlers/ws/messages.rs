//! Media stream frame types and per-call configuration.
//!
//! The wire protocol is the Twilio-style bidirectional media stream: JSON
//! frames tagged by `event`, with audio as base64 payloads keyed to a
//! stream id handed over in the `start` frame.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::app_error::AppError;

/// Frames received from the media stream
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum IncomingFrame {
    Start {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        start: StartFrame,
    },
    Media {
        media: MediaPayload,
    },
    Stop {},
    /// Echoed marks and other bookkeeping frames we don't act on
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct StartFrame {
    #[serde(rename = "customParameters", default)]
    pub custom_parameters: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct MediaPayload {
    /// Base64-encoded audio chunk
    pub payload: String,
}

/// Frames sent back over the media stream
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutgoingFrame {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutgoingMedia,
    },
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        mark: MarkPayload,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMedia {
    pub payload: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkPayload {
    pub name: String,
}

impl OutgoingFrame {
    pub fn media(stream_sid: &str, payload_base64: String) -> Self {
        Self::Media {
            stream_sid: stream_sid.to_string(),
            media: OutgoingMedia {
                payload: payload_base64,
            },
        }
    }

    pub fn mark(stream_sid: &str, name: &str) -> Self {
        Self::Mark {
            stream_sid: stream_sid.to_string(),
            mark: MarkPayload {
                name: name.to_string(),
            },
        }
    }
}

/// Per-call configuration extracted from the start frame's custom parameters
#[derive(Debug, Clone)]
pub struct CallConfig {
    pub stt_service: String,
    pub tts_service: String,
    pub voice_type: String,
    pub lead_prompt: Option<String>,
    pub introduction: Option<String>,
    pub agent_id: Option<String>,
    pub conversation_id: String,
    pub activity_id: Option<String>,
}

impl CallConfig {
    /// Build from the start frame.
    ///
    /// A missing conversation id is a configuration error surfaced before any
    /// stream work begins; provider names default to deepgram.
    pub fn from_parameters(parameters: &HashMap<String, String>) -> Result<Self, AppError> {
        let get = |key: &str| parameters.get(key).filter(|v| !v.is_empty()).cloned();

        let conversation_id = get("conversation-id").ok_or_else(|| {
            AppError::Configuration("Missing conversation-id custom parameter".to_string())
        })?;

        Ok(Self {
            stt_service: get("stt-service").unwrap_or_else(|| "deepgram".to_string()),
            tts_service: get("tts-service").unwrap_or_else(|| "deepgram".to_string()),
            voice_type: get("voice-type").unwrap_or_default(),
            lead_prompt: get("lead-prompt"),
            introduction: get("introduction"),
            agent_id: get("agent-id"),
            conversation_id,
            activity_id: get("activity-id"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_frame_parses() {
        let raw = r#"{
            "event": "start",
            "streamSid": "MZ123",
            "start": {
                "customParameters": {
                    "conversation-id": "conv-1",
                    "stt-service": "assemblyai",
                    "introduction": "Hi, this is Avery from Acme."
                }
            }
        }"#;
        let frame: IncomingFrame = serde_json::from_str(raw).unwrap();
        let IncomingFrame::Start { stream_sid, start } = frame else {
            panic!("expected start frame");
        };
        assert_eq!(stream_sid, "MZ123");

        let config = CallConfig::from_parameters(&start.custom_parameters).unwrap();
        assert_eq!(config.conversation_id, "conv-1");
        assert_eq!(config.stt_service, "assemblyai");
        assert_eq!(config.tts_service, "deepgram");
        assert!(config.introduction.unwrap().contains("Avery"));
    }

    #[test]
    fn test_missing_conversation_id_is_configuration_error() {
        let parameters = HashMap::from([("stt-service".to_string(), "deepgram".to_string())]);
        let err = CallConfig::from_parameters(&parameters).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn test_media_frame_parses() {
        let raw = r#"{"event":"media","media":{"payload":"AAAA"}}"#;
        let frame: IncomingFrame = serde_json::from_str(raw).unwrap();
        assert!(matches!(frame, IncomingFrame::Media { .. }));
    }

    #[test]
    fn test_outgoing_frames_serialize() {
        let media = serde_json::to_value(OutgoingFrame::media("MZ123", "AAAA".to_string())).unwrap();
        assert_eq!(media["event"], "media");
        assert_eq!(media["streamSid"], "MZ123");
        assert_eq!(media["media"]["payload"], "AAAA");

        let mark = serde_json::to_value(OutgoingFrame::mark("MZ123", "utterance-complete")).unwrap();
        assert_eq!(mark["event"], "mark");
        assert_eq!(mark["mark"]["name"], "utterance-complete");
    }
}

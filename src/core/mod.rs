pub mod agents;
pub mod audio_cache;
pub mod conversation;
pub mod llm;
pub mod orchestrator;
pub mod stt;
pub mod tts;
pub mod turn;

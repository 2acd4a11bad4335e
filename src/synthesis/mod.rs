//! Script-driven stage bodies and the speech/voice providers they call.

pub mod command;
pub mod script;
pub mod segments;
pub mod voices;

use crate::error::Result;
use async_trait::async_trait;

pub use command::{CommandSpeechProvider, CommandVoiceProvider, PreviewVoiceProvider};
pub use script::{
    JsonScriptStore, MemoryScriptStore, Participant, PodcastScript, ScriptLine, ScriptStore,
};
pub use segments::ScriptSynthesizer;
pub use voices::ScriptVoicePreparer;

/// One line of speech to synthesize, with surrounding context for natural prosody.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice_id: String,
    pub previous_text: Option<String>,
    pub next_text: Option<String>,
    /// Provider request ids of the most recent earlier lines, oldest first.
    pub previous_request_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechResponse {
    /// Encoded audio as produced by the provider.
    pub audio: Vec<u8>,
    /// Codec hint for the assembler, e.g. `"mp3"`.
    pub codec: Option<String>,
    /// Provider-side id of this request, fed back as context for later lines.
    pub request_id: Option<String>,
}

/// Text-to-speech backend.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechResponse>;
}

/// Turns a voice preview into a persistent voice usable for synthesis.
#[async_trait]
pub trait VoiceProvider: Send + Sync {
    /// Returns the new voice id.
    async fn create_voice_from_preview(&self, name: &str, preview_id: &str) -> Result<String>;
}

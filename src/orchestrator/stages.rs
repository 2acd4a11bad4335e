//! Stage bodies the orchestrator drives. Both are opaque to it.

use crate::audio::AudioSegment;
use crate::error::Result;
use crate::orchestrator::cancel::CancellationToken;
use async_trait::async_trait;

/// GENERATING_VOICES: make sure every speaker has a usable voice.
#[async_trait]
pub trait VoicePreparer: Send + Sync {
    async fn prepare_voices(&self, podcast_id: &str, token: &CancellationToken) -> Result<()>;
}

/// GENERATING_SEGMENTS: synthesize the podcast's audio, one segment per unit of script.
///
/// Segments may be returned in any order; the orchestrator orders them by sequence index.
#[async_trait]
pub trait SegmentSynthesizer: Send + Sync {
    async fn synthesize_segments(
        &self,
        podcast_id: &str,
        token: &CancellationToken,
    ) -> Result<Vec<AudioSegment>>;
}

//! Durable run snapshots and final audio artifacts.

pub mod artifact;
pub mod run;

use crate::audio::AssembledAudio;
use crate::error::Result;
use crate::status::GenerationRun;
use async_trait::async_trait;

pub use artifact::{FsArtifactStore, MemoryArtifactStore};
pub use run::{JsonRunStore, MemoryRunStore};

/// Latest-snapshot persistence for generation runs. Each call is atomic.
///
/// Called inline with status transitions, so implementations should be quick.
pub trait RunStore: Send + Sync {
    fn load_run(&self, podcast_id: &str) -> Result<Option<GenerationRun>>;
    fn save_run(&self, run: &GenerationRun) -> Result<()>;
}

/// Persists the final podcast audio and hands back a retrievable reference.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn store(&self, podcast_id: &str, audio: &AssembledAudio) -> Result<String>;
}

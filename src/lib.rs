//! podgen - multi-speaker podcast generation
//!
//! Runs the voice, segment and stitching stages for a podcast, pushes live status
//! to observers and assembles the synthesized segments into one audio file.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod broadcast;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod daemon;
pub mod defaults;
pub mod error;
pub mod ipc;
pub mod logging;
pub mod orchestrator;
pub mod status;
pub mod store;
pub mod synthesis;

// Stage pipeline
pub use orchestrator::{
    CancellationToken, GenerationHandle, Orchestrator, OrchestratorBuilder, OrchestratorConfig,
    SegmentSynthesizer, VoicePreparer,
};

// Status model and push delivery
pub use broadcast::{StatusBroadcaster, StatusObserver, Subscription};
pub use status::{GenerationRun, Stage, StatusUpdate};

// Audio
pub use audio::{AssembledAudio, AudioAssembler, AudioSegment, OutputFormat};

// Persistence
pub use store::{ArtifactStore, RunStore};

// Error handling
pub use error::{PodgenError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

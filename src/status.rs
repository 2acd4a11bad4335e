//! Generation status model: stages, run snapshots and the status payload pushed to observers.

use crate::error::{PodgenError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One named phase of the generation pipeline.
///
/// The success path is strictly linear:
/// `QUEUED → GENERATING_VOICES → GENERATING_SEGMENTS → STITCHING → COMPLETED`.
/// `ERROR` and `CANCELLED` are reachable from every non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Queued,
    GeneratingVoices,
    GeneratingSegments,
    Stitching,
    Completed,
    Error,
    Cancelled,
}

impl Stage {
    /// Progress way-point reported on entry into this stage.
    ///
    /// Failed and cancelled runs report 0: partial progress means nothing for them.
    pub const fn progress(self) -> u8 {
        match self {
            Stage::Queued => 0,
            Stage::GeneratingVoices => 20,
            Stage::GeneratingSegments => 40,
            Stage::Stitching => 80,
            Stage::Completed => 100,
            Stage::Error | Stage::Cancelled => 0,
        }
    }

    /// Returns true for COMPLETED, ERROR and CANCELLED.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Error | Stage::Cancelled)
    }

    /// Successor on the success path, `None` once terminal.
    pub const fn next(self) -> Option<Stage> {
        match self {
            Stage::Queued => Some(Stage::GeneratingVoices),
            Stage::GeneratingVoices => Some(Stage::GeneratingSegments),
            Stage::GeneratingSegments => Some(Stage::Stitching),
            Stage::Stitching => Some(Stage::Completed),
            Stage::Completed | Stage::Error | Stage::Cancelled => None,
        }
    }

    /// Whether the state machine allows moving from `self` to `to`.
    pub fn can_transition_to(self, to: Stage) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(to, Stage::Error | Stage::Cancelled) || self.next() == Some(to)
    }

    /// Human-readable message broadcast on entry into this stage.
    pub const fn default_message(self) -> &'static str {
        match self {
            Stage::Queued => "Starting podcast generation...",
            Stage::GeneratingVoices => "Generating voices for participants...",
            Stage::GeneratingSegments => "Generating audio segments...",
            Stage::Stitching => "Combining audio segments...",
            Stage::Completed => "Podcast generation completed successfully!",
            Stage::Error => "Error generating podcast",
            Stage::Cancelled => "Generation cancelled by user",
        }
    }

    /// Wire name, e.g. `GENERATING_VOICES`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::Queued => "QUEUED",
            Stage::GeneratingVoices => "GENERATING_VOICES",
            Stage::GeneratingSegments => "GENERATING_SEGMENTS",
            Stage::Stitching => "STITCHING",
            Stage::Completed => "COMPLETED",
            Stage::Error => "ERROR",
            Stage::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable point-in-time snapshot pushed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub stage: Stage,
    pub progress: u8,
    pub message: String,
    #[serde(default)]
    pub result_reference: Option<String>,
}

impl StatusUpdate {
    /// The CANCELLED payload, usable without any run context.
    pub fn cancelled() -> Self {
        Self {
            stage: Stage::Cancelled,
            progress: Stage::Cancelled.progress(),
            message: Stage::Cancelled.default_message().to_string(),
            result_reference: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}

/// The single authoritative record of one generation attempt for a podcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRun {
    pub podcast_id: String,
    pub run_id: Uuid,
    pub stage: Stage,
    pub progress: u8,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub result_reference: Option<String>,
}

impl GenerationRun {
    /// Creates a fresh run in QUEUED.
    pub fn queued(podcast_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            podcast_id: podcast_id.into(),
            run_id: Uuid::new_v4(),
            stage: Stage::Queued,
            progress: Stage::Queued.progress(),
            message: Stage::Queued.default_message().to_string(),
            started_at: now,
            updated_at: now,
            result_reference: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Moves the run to `stage` with the stage's fixed progress value.
    ///
    /// Rejects any move the state machine does not allow, which includes every
    /// move out of a terminal stage.
    pub fn transition(&mut self, stage: Stage, message: impl Into<String>) -> Result<StatusUpdate> {
        if !self.stage.can_transition_to(stage) {
            return Err(PodgenError::InvalidTransition {
                from: self.stage,
                to: stage,
            });
        }
        self.stage = stage;
        self.progress = stage.progress();
        self.message = message.into();
        self.updated_at = Utc::now();
        Ok(self.status_update())
    }

    /// Moves the run to COMPLETED, recording where the output artifact lives.
    pub fn complete(&mut self, result_reference: impl Into<String>) -> Result<StatusUpdate> {
        let update = self.transition(Stage::Completed, Stage::Completed.default_message())?;
        self.result_reference = Some(result_reference.into());
        Ok(StatusUpdate {
            result_reference: self.result_reference.clone(),
            ..update
        })
    }

    /// Projection pushed to observers. The result reference is only exposed once COMPLETED.
    pub fn status_update(&self) -> StatusUpdate {
        StatusUpdate {
            stage: self.stage,
            progress: self.progress,
            message: self.message.clone(),
            result_reference: if self.stage == Stage::Completed {
                self.result_reference.clone()
            } else {
                None
            },
        }
    }
}

//! Error types for podgen.

use crate::status::Stage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PodgenError {
    // Caller-facing orchestration errors
    #[error("Generation already running for podcast {podcast_id}")]
    AlreadyRunning { podcast_id: String },

    #[error("No generation run found for podcast {podcast_id}")]
    NotFound { podcast_id: String },

    #[error("Generation queue is full ({queued} runs waiting)")]
    Busy { queued: usize },

    #[error("Invalid podcast id {podcast_id:?}: {message}")]
    InvalidPodcastId { podcast_id: String, message: String },

    // Run lifecycle errors
    #[error("{stage} failed: {message}")]
    StageFailure { stage: Stage, message: String },

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: Stage, to: Stage },

    // Audio assembly errors
    #[error("No audio segments to assemble")]
    EmptyInput,

    #[error("Unsupported audio format in segment {sequence}: {message}")]
    UnsupportedFormat { sequence: usize, message: String },

    #[error("Audio encoding failed: {message}")]
    EncodingFailed { message: String },

    #[error("Duplicate segment sequence index {sequence}")]
    DuplicateSegment { sequence: usize },

    // Collaborator errors
    #[error("Voice preparation failed: {message}")]
    VoicePreparation { message: String },

    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    #[error("Run persistence failed: {message}")]
    Persistence { message: String },

    #[error("Artifact storage failed: {message}")]
    Storage { message: String },

    #[error("Status observer closed")]
    ObserverClosed,

    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // IPC errors
    #[error("IPC socket error: {message}")]
    IpcSocket { message: String },

    #[error("IPC protocol error: {message}")]
    IpcProtocol { message: String },

    #[error("IPC connection failed: {message}")]
    IpcConnection { message: String },

    // General errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl PodgenError {
    /// Stable machine-readable code, used on the IPC wire.
    pub fn code(&self) -> &'static str {
        match self {
            PodgenError::AlreadyRunning { .. } => "already_running",
            PodgenError::NotFound { .. } => "not_found",
            PodgenError::Busy { .. } => "busy",
            PodgenError::InvalidPodcastId { .. } => "invalid_podcast_id",
            PodgenError::StageFailure { .. } => "stage_failure",
            PodgenError::Cancelled => "cancelled",
            PodgenError::InvalidTransition { .. } => "invalid_transition",
            PodgenError::EmptyInput => "empty_input",
            PodgenError::UnsupportedFormat { .. } => "unsupported_format",
            PodgenError::EncodingFailed { .. } => "encoding_failed",
            PodgenError::DuplicateSegment { .. } => "duplicate_segment",
            PodgenError::VoicePreparation { .. } => "voice_preparation",
            PodgenError::Synthesis { .. } => "synthesis",
            PodgenError::Persistence { .. } => "persistence",
            PodgenError::Storage { .. } => "storage",
            PodgenError::ObserverClosed => "observer_closed",
            PodgenError::ConfigParse { .. }
            | PodgenError::ConfigInvalidValue { .. }
            | PodgenError::Config(_) => "config",
            PodgenError::IpcSocket { .. }
            | PodgenError::IpcProtocol { .. }
            | PodgenError::IpcConnection { .. } => "ipc",
            PodgenError::Io(_) => "io",
            PodgenError::Json(_) => "json",
            PodgenError::Other(_) => "other",
        }
    }
}

pub type Result<T> = std::result::Result<T, PodgenError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_already_running_display() {
        let error = PodgenError::AlreadyRunning {
            podcast_id: "42".to_string(),
        };
        assert_eq!(error.to_string(), "Generation already running for podcast 42");
        assert_eq!(error.code(), "already_running");
    }

    #[test]
    fn test_not_found_display() {
        let error = PodgenError::NotFound {
            podcast_id: "7".to_string(),
        };
        assert_eq!(error.to_string(), "No generation run found for podcast 7");
        assert_eq!(error.code(), "not_found");
    }

    #[test]
    fn test_busy_display() {
        let error = PodgenError::Busy { queued: 3 };
        assert_eq!(error.to_string(), "Generation queue is full (3 runs waiting)");
    }

    #[test]
    fn test_stage_failure_display_names_stage() {
        let error = PodgenError::StageFailure {
            stage: Stage::GeneratingSegments,
            message: "provider timeout".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "GENERATING_SEGMENTS failed: provider timeout"
        );
    }

    #[test]
    fn test_invalid_transition_display() {
        let error = PodgenError::InvalidTransition {
            from: Stage::Completed,
            to: Stage::Stitching,
        };
        assert_eq!(
            error.to_string(),
            "Invalid transition from COMPLETED to STITCHING"
        );
    }

    #[test]
    fn test_unsupported_format_display() {
        let error = PodgenError::UnsupportedFormat {
            sequence: 2,
            message: "no suitable format reader".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Unsupported audio format in segment 2: no suitable format reader"
        );
    }

    #[test]
    fn test_assembly_codes() {
        assert_eq!(PodgenError::EmptyInput.code(), "empty_input");
        assert_eq!(
            PodgenError::EncodingFailed {
                message: "x".to_string()
            }
            .code(),
            "encoding_failed"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: PodgenError = io_error.into();
        assert!(error.to_string().contains("file not found"));
        assert_eq!(error.code(), "io");
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: PodgenError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
        assert_eq!(error.code(), "config");
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: PodgenError = io_error.into();

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<PodgenError>();
        assert_sync::<PodgenError>();
    }
}

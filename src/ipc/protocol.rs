//! IPC protocol for daemon communication.
//!
//! Messages are single-line JSON objects tagged by `type`. Every command gets one
//! response, except `follow`, which keeps the connection open and streams
//! `update` responses.

use crate::error::PodgenError;
use crate::status::{GenerationRun, StatusUpdate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Commands sent from CLI to daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Start a generation run for a podcast.
    Generate { podcast_id: String },
    /// Fetch the current run snapshot.
    Status { podcast_id: String },
    /// Request cancellation of the active run.
    Cancel { podcast_id: String },
    /// Stream status updates for a podcast until the client disconnects.
    Follow { podcast_id: String },
    /// Shut down the daemon.
    Shutdown,
}

/// Responses sent from daemon to CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Ok,
    Started { podcast_id: String, run_id: Uuid },
    Run { run: GenerationRun },
    Update { update: StatusUpdate },
    Error { code: String, message: String },
}

impl Command {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Response {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Error response carrying the error's stable code.
    pub fn error(err: &PodgenError) -> Self {
        Response::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<PodgenError> for Response {
    fn from(err: PodgenError) -> Self {
        Response::error(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Stage;

    #[test]
    fn test_command_json_format_examples() {
        let generate = Command::Generate {
            podcast_id: "42".to_string(),
        }
        .to_json()
        .unwrap();
        assert_eq!(generate, r#"{"type":"generate","podcast_id":"42"}"#);

        let shutdown = Command::Shutdown.to_json().unwrap();
        assert_eq!(shutdown, r#"{"type":"shutdown"}"#);
    }

    #[test]
    fn test_follow_command_parses() {
        let command = Command::from_json(r#"{"type":"follow","podcast_id":"ep-1"}"#).unwrap();
        assert_eq!(
            command,
            Command::Follow {
                podcast_id: "ep-1".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_json_returns_error() {
        assert!(Command::from_json(r#"{"type": "toggle"}"#).is_err());
        assert!(Command::from_json(r#"{"type": "status"}"#).is_err());
        assert!(Command::from_json(r#"{"podcast_id": "1"}"#).is_err());
        assert!(Command::from_json("not json at all").is_err());
    }

    #[test]
    fn test_update_uses_camel_case_payload() {
        let response = Response::Update {
            update: StatusUpdate {
                stage: Stage::Completed,
                progress: 100,
                message: "Podcast generation completed".to_string(),
                result_reference: Some("podcasts/1/output/a.wav".to_string()),
            },
        };
        let json = response.to_json().unwrap();
        assert!(json.contains(r#""type":"update""#));
        assert!(json.contains(r#""stage":"COMPLETED""#));
        assert!(json.contains(r#""resultReference":"podcasts/1/output/a.wav""#));
        assert_eq!(Response::from_json(&json).unwrap(), response);
    }

    #[test]
    fn test_run_response_roundtrip() {
        let response = Response::Run {
            run: GenerationRun::queued("7"),
        };
        let json = response.to_json().unwrap();
        assert_eq!(Response::from_json(&json).unwrap(), response);
    }

    #[test]
    fn test_error_response_carries_code() {
        let response = Response::from(PodgenError::Busy { queued: 3 });
        assert_eq!(
            response,
            Response::Error {
                code: "busy".to_string(),
                message: "Generation queue is full (3 runs waiting)".to_string(),
            }
        );
    }
}

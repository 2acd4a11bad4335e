//! Command handler implementation for the daemon.

use crate::error::{PodgenError, Result};
use crate::ipc::protocol::{Command, Response};
use crate::ipc::server::{CommandHandler, FollowStream, ShutdownHandle};
use crate::orchestrator::{Orchestrator, validate_podcast_id};

/// Translates IPC commands into orchestrator calls.
pub struct DaemonCommandHandler {
    orchestrator: Orchestrator,
    shutdown: ShutdownHandle,
}

impl DaemonCommandHandler {
    pub fn new(orchestrator: Orchestrator, shutdown: ShutdownHandle) -> Self {
        Self {
            orchestrator,
            shutdown,
        }
    }

    fn generate(&self, podcast_id: &str) -> Response {
        match self.orchestrator.start_generation(podcast_id) {
            Ok(handle) => Response::Started {
                podcast_id: handle.podcast_id().to_string(),
                run_id: handle.run_id(),
            },
            Err(e) => {
                tracing::warn!(podcast_id, "Generation not started: {}", e);
                Response::error(&e)
            }
        }
    }

    fn status(&self, podcast_id: &str) -> Response {
        match self.orchestrator.get_status(podcast_id) {
            Ok(run) => Response::Run { run },
            Err(e) => Response::error(&e),
        }
    }

    fn cancel(&self, podcast_id: &str) -> Response {
        if let Err(e) = validate_podcast_id(podcast_id) {
            return Response::error(&e);
        }
        Response::Update {
            update: self.orchestrator.cancel_generation(podcast_id),
        }
    }
}

#[async_trait::async_trait]
impl CommandHandler for DaemonCommandHandler {
    async fn handle(&self, command: Command) -> Response {
        match command {
            Command::Generate { podcast_id } => self.generate(&podcast_id),
            Command::Status { podcast_id } => self.status(&podcast_id),
            Command::Cancel { podcast_id } => self.cancel(&podcast_id),
            Command::Follow { .. } => Response::error(&PodgenError::IpcProtocol {
                message: "follow must be the only command on its connection".to_string(),
            }),
            Command::Shutdown => {
                tracing::info!("Shutdown requested over IPC");
                self.shutdown.trigger();
                Response::Ok
            }
        }
    }

    fn follow(&self, podcast_id: &str) -> Result<FollowStream> {
        validate_podcast_id(podcast_id)?;
        // Subscribe before reading the snapshot so no transition falls in between.
        let updates = self.orchestrator.broadcaster().channel(podcast_id);
        let current = self.orchestrator.get_status(podcast_id).ok();
        Ok(FollowStream { current, updates })
    }
}

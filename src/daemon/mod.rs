//! Daemon mode: owns the orchestrator and serves it over IPC.

pub mod handler;

use crate::config::Config;
use crate::error::{PodgenError, Result};
use crate::ipc::server::IpcServer;
use crate::orchestrator::Orchestrator;
use crate::store::{FsArtifactStore, JsonRunStore};
use crate::synthesis::{
    CommandSpeechProvider, CommandVoiceProvider, JsonScriptStore, PreviewVoiceProvider,
    ScriptStore, ScriptSynthesizer, ScriptVoicePreparer, VoiceProvider,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Wire stores, stages and the orchestrator from configuration.
pub fn build_orchestrator(config: &Config) -> Orchestrator {
    let base_path = &config.storage.base_path;
    let synthesis = &config.synthesis;

    let scripts: Arc<dyn ScriptStore> = Arc::new(JsonScriptStore::new(base_path));
    let voice_provider: Arc<dyn VoiceProvider> = match &synthesis.voice_command {
        Some(program) => Arc::new(CommandVoiceProvider::new(
            program,
            synthesis.voice_args.clone(),
        )),
        None => Arc::new(PreviewVoiceProvider),
    };
    let speech = CommandSpeechProvider::new(&synthesis.command, synthesis.args.clone())
        .with_codec(&synthesis.codec);

    let voices = ScriptVoicePreparer::new(Arc::clone(&scripts), voice_provider);
    let synthesizer = ScriptSynthesizer::new(scripts, Arc::new(speech))
        .with_context_requests(synthesis.context_requests);

    Orchestrator::builder(
        Arc::new(voices),
        Arc::new(synthesizer),
        Arc::new(FsArtifactStore::new(base_path)),
    )
    .config(config.orchestrator_config())
    .run_store(Arc::new(JsonRunStore::new(config.state_dir())))
    .build()
}

/// Run the daemon until SIGINT, SIGTERM or a `shutdown` command.
///
/// `socket_path` overrides the configured socket, which overrides the default.
pub async fn run_daemon(config: Config, socket_path: Option<PathBuf>) -> Result<()> {
    config.validate()?;
    tracing::info!(version = %crate::version_string(), "Starting podgen daemon");

    let orchestrator = build_orchestrator(&config);
    tracing::info!(
        base_path = %config.storage.base_path.display(),
        max_concurrent_runs = orchestrator.config().max_concurrent_runs,
        "Orchestrator ready"
    );

    let socket_path = socket_path
        .or_else(|| config.daemon.socket_path.clone())
        .unwrap_or_else(IpcServer::default_socket_path);
    let server = Arc::new(IpcServer::new(socket_path)?);
    let shutdown = server.shutdown_handle();

    let handler = handler::DaemonCommandHandler::new(orchestrator.clone(), shutdown.clone());
    let server_task = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.start(handler).await })
    };

    let signals = tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT, shutting down"),
            res = wait_for_sigterm() => match res {
                Ok(()) => tracing::info!("Received SIGTERM, shutting down"),
                Err(e) => {
                    tracing::error!("Error setting up signal handler: {}", e);
                    return;
                }
            },
        }
        shutdown.trigger();
    });

    let served = server_task
        .await
        .map_err(|e| PodgenError::Other(format!("IPC server task failed: {e}")))?;
    signals.abort();
    server.stop().await?;

    for run in orchestrator.active_runs() {
        let update = orchestrator.cancel_generation(&run.podcast_id);
        tracing::info!(podcast_id = %run.podcast_id, stage = %update.stage, "Cancelled on shutdown");
    }

    served?;
    tracing::info!("Daemon stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_sigterm() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| PodgenError::Other(format!("Failed to register SIGTERM handler: {}", e)))?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_sigterm() -> Result<()> {
    std::future::pending::<()>().await
}

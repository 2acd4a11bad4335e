//! Async Unix socket IPC server for daemon control.

use crate::broadcast::Subscription;
use crate::defaults;
use crate::error::{PodgenError, Result};
use crate::ipc::protocol::{Command, Response};
use crate::status::GenerationRun;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;

/// Handler trait for processing IPC commands.
#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle a one-shot command and return its response.
    async fn handle(&self, command: Command) -> Response;

    /// Open a status stream for `follow`.
    fn follow(&self, podcast_id: &str) -> Result<FollowStream>;
}

/// What a `follow` connection is fed: the run as it stands, then every update.
pub struct FollowStream {
    pub current: Option<GenerationRun>,
    pub updates: Subscription,
}

/// Stops a running [`IpcServer`] from anywhere.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

/// IPC server for handling daemon control commands via Unix socket.
pub struct IpcServer {
    socket_path: PathBuf,
    shutdown: ShutdownHandle,
}

impl IpcServer {
    pub fn new(socket_path: PathBuf) -> Result<Self> {
        let (tx, _rx) = watch::channel(false);
        Ok(Self {
            socket_path,
            shutdown: ShutdownHandle { tx: Arc::new(tx) },
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// `$XDG_RUNTIME_DIR/podgen.sock`, or a per-user path under `/tmp`.
    pub fn default_socket_path() -> PathBuf {
        if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR") {
            PathBuf::from(xdg_runtime).join(defaults::SOCKET_NAME)
        } else {
            // SAFETY: getuid has no preconditions and cannot fail.
            let uid = unsafe { libc::getuid() };
            PathBuf::from(format!("/tmp/podgen-{}.sock", uid))
        }
    }

    /// Accept connections until shutdown is triggered.
    pub async fn start<H>(&self, handler: H) -> Result<()>
    where
        H: CommandHandler + 'static,
    {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| PodgenError::IpcSocket {
                message: format!("Failed to remove existing socket: {}", e),
            })?;
        }

        let listener =
            UnixListener::bind(&self.socket_path).map_err(|e| PodgenError::IpcSocket {
                message: format!("Failed to bind to socket: {}", e),
            })?;
        tracing::info!(socket = %self.socket_path.display(), "IPC server listening");

        let handler = Arc::new(handler);
        let mut shutdown = self.shutdown.tx.subscribe();

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let handler = Arc::clone(&handler);
                        let shutdown = self.shutdown.tx.subscribe();
                        tokio::spawn(async move {
                            if let Err(e) = handle_client(stream, handler, shutdown).await {
                                tracing::warn!("Error handling client: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        return Err(PodgenError::IpcConnection {
                            message: format!("Failed to accept connection: {}", e),
                        });
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("IPC server stopped accepting connections");
        Ok(())
    }

    /// Stop the IPC server and clean up the socket file.
    pub async fn stop(&self) -> Result<()> {
        self.shutdown.trigger();

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| PodgenError::IpcSocket {
                message: format!("Failed to remove socket file: {}", e),
            })?;
        }

        Ok(())
    }
}

async fn handle_client<H>(
    stream: UnixStream,
    handler: Arc<H>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    H: CommandHandler,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    reader
        .read_line(&mut line)
        .await
        .map_err(|e| PodgenError::IpcConnection {
            message: format!("Failed to read from client: {}", e),
        })?;

    let command = match Command::from_json(line.trim()) {
        Ok(command) => command,
        Err(e) => {
            let err = PodgenError::IpcProtocol {
                message: format!("Failed to parse command: {}", e),
            };
            write_response(&mut writer, &Response::error(&err)).await?;
            return Err(err);
        }
    };
    tracing::debug!(?command, "IPC command");

    let podcast_id = match command {
        Command::Follow { podcast_id } => podcast_id,
        command => {
            let response = handler.handle(command).await;
            return write_response(&mut writer, &response).await;
        }
    };

    let FollowStream {
        current,
        mut updates,
    } = match handler.follow(&podcast_id) {
        Ok(stream) => stream,
        Err(e) => return write_response(&mut writer, &Response::error(&e)).await,
    };
    if let Some(run) = current {
        write_response(&mut writer, &Response::Run { run }).await?;
    }

    // Anything the client sends after `follow`, including EOF, ends the stream.
    let mut rest = String::new();
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(update) => write_response(&mut writer, &Response::Update { update }).await?,
                None => break,
            },
            _ = reader.read_line(&mut rest) => break,
            _ = shutdown.changed() => break,
        }
    }
    tracing::debug!(podcast_id, "Follow stream closed");
    Ok(())
}

async fn write_response<W>(writer: &mut W, response: &Response) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut json = response.to_json().map_err(|e| PodgenError::IpcProtocol {
        message: format!("Failed to serialize response: {}", e),
    })?;
    json.push('\n');

    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| PodgenError::IpcConnection {
            message: format!("Failed to write to client: {}", e),
        })?;
    writer
        .flush()
        .await
        .map_err(|e| PodgenError::IpcConnection {
            message: format!("Failed to flush writer: {}", e),
        })
}

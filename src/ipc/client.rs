//! IPC client for sending commands to the daemon.

use crate::error::{PodgenError, Result};
use crate::ipc::protocol::{Command, Response};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

/// Send a command to the daemon via Unix socket and wait for its single response.
///
/// # Errors
/// Returns `PodgenError::IpcConnection` if the daemon cannot be reached, and
/// `PodgenError::IpcProtocol` if the exchange is malformed.
pub async fn send_command(socket_path: &Path, command: Command) -> Result<Response> {
    let (mut reader, _writer) = open(socket_path, &command).await?;
    read_response(&mut reader)
        .await?
        .ok_or_else(|| PodgenError::IpcConnection {
            message: "Daemon closed the connection without responding".to_string(),
        })
}

/// Follow status updates for a podcast.
///
/// `on_response` sees the current run (if any) followed by every update; it
/// returns `false` to stop following. Returns once stopped or when the daemon
/// closes the stream.
pub async fn follow<F>(socket_path: &Path, podcast_id: &str, mut on_response: F) -> Result<()>
where
    F: FnMut(&Response) -> bool,
{
    let command = Command::Follow {
        podcast_id: podcast_id.to_string(),
    };
    let (mut reader, writer) = open(socket_path, &command).await?;

    while let Some(response) = read_response(&mut reader).await? {
        if !on_response(&response) {
            break;
        }
    }
    drop(writer);
    Ok(())
}

async fn open(
    socket_path: &Path,
    command: &Command,
) -> Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf)> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| PodgenError::IpcConnection {
            message: format!("Failed to connect to daemon: {}", e),
        })?;
    let (reader, mut writer) = stream.into_split();

    let mut json = command.to_json().map_err(|e| PodgenError::IpcProtocol {
        message: format!("Failed to serialize command: {}", e),
    })?;
    json.push('\n');

    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| PodgenError::IpcConnection {
            message: format!("Failed to write command: {}", e),
        })?;
    writer
        .flush()
        .await
        .map_err(|e| PodgenError::IpcConnection {
            message: format!("Failed to flush writer: {}", e),
        })?;

    Ok((BufReader::new(reader), writer))
}

/// Next response line, `None` at end of stream.
async fn read_response(reader: &mut BufReader<OwnedReadHalf>) -> Result<Option<Response>> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .await
        .map_err(|e| PodgenError::IpcConnection {
            message: format!("Failed to read response: {}", e),
        })?;
    if read == 0 {
        return Ok(None);
    }

    Response::from_json(line.trim())
        .map(Some)
        .map_err(|e| PodgenError::IpcProtocol {
            message: format!("Failed to deserialize response: {}", e),
        })
}

//! Providers backed by external commands.

use crate::error::{PodgenError, Result};
use crate::synthesis::{SpeechProvider, SpeechRequest, SpeechResponse, VoiceProvider};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Runs a text-to-speech command per line.
///
/// `{voice}` in the arguments is replaced with the voice id. The line is written
/// to stdin and encoded audio is read from stdout. Neighbouring lines are exposed
/// as `PODGEN_PREVIOUS_TEXT` / `PODGEN_NEXT_TEXT`.
#[derive(Debug, Clone)]
pub struct CommandSpeechProvider {
    program: String,
    args: Vec<String>,
    codec: Option<String>,
}

impl CommandSpeechProvider {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            codec: None,
        }
    }

    /// Codec hint attached to every produced segment.
    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = Some(codec.into());
        self
    }
}

#[async_trait]
impl SpeechProvider for CommandSpeechProvider {
    async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechResponse> {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace("{voice}", &request.voice_id))
            .collect();
        let mut env = Vec::new();
        if let Some(previous) = &request.previous_text {
            env.push(("PODGEN_PREVIOUS_TEXT", previous.as_str()));
        }
        if let Some(next) = &request.next_text {
            env.push(("PODGEN_NEXT_TEXT", next.as_str()));
        }

        let audio = run_command(&self.program, &args, &env, request.text.as_bytes())
            .await
            .map_err(|message| PodgenError::Synthesis { message })?;
        if audio.is_empty() {
            return Err(PodgenError::Synthesis {
                message: format!("{} produced no audio", self.program),
            });
        }

        Ok(SpeechResponse {
            audio,
            codec: self.codec.clone(),
            request_id: None,
        })
    }
}

/// Creates voices by running a command that prints the new voice id.
///
/// `{name}` and `{preview}` in the arguments are replaced with the participant
/// name and preview id.
#[derive(Debug, Clone)]
pub struct CommandVoiceProvider {
    program: String,
    args: Vec<String>,
}

impl CommandVoiceProvider {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl VoiceProvider for CommandVoiceProvider {
    async fn create_voice_from_preview(&self, name: &str, preview_id: &str) -> Result<String> {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace("{name}", name).replace("{preview}", preview_id))
            .collect();
        let stdout = run_command(&self.program, &args, &[], &[])
            .await
            .map_err(|message| PodgenError::VoicePreparation { message })?;
        let voice_id = String::from_utf8_lossy(&stdout).trim().to_string();
        if voice_id.is_empty() {
            return Err(PodgenError::VoicePreparation {
                message: format!("{} printed no voice id", self.program),
            });
        }
        Ok(voice_id)
    }
}

/// Uses the preview id itself as the persistent voice id.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreviewVoiceProvider;

#[async_trait]
impl VoiceProvider for PreviewVoiceProvider {
    async fn create_voice_from_preview(&self, _name: &str, preview_id: &str) -> Result<String> {
        Ok(preview_id.to_string())
    }
}

/// Run `program`, feed it `input` and return its stdout. Errors are plain messages.
async fn run_command(
    program: &str,
    args: &[String],
    env: &[(&str, &str)],
    input: &[u8],
) -> std::result::Result<Vec<u8>, String> {
    let mut child = Command::new(program)
        .args(args)
        .envs(env.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                format!("Command not found: {program}")
            } else {
                format!("Failed to execute {program}: {e}")
            }
        })?;

    // Written concurrently so a chatty child cannot fill stdout and stall.
    let writer = child.stdin.take().map(|mut stdin| {
        let input = input.to_vec();
        tokio::spawn(async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await
        })
    });

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| format!("Failed to wait for {program}: {e}"))?;

    if let Some(writer) = writer {
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!("Writing stdin of {} failed: {}", program, e),
            Err(e) => tracing::debug!("Stdin writer for {} aborted: {}", program, e),
        }
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        ));
    }
    Ok(output.stdout)
}

//! Voice preparation from the podcast script.

use crate::error::{PodgenError, Result};
use crate::orchestrator::{CancellationToken, VoicePreparer};
use crate::synthesis::VoiceProvider;
use crate::synthesis::script::ScriptStore;
use async_trait::async_trait;
use std::sync::Arc;

/// Resolves a persistent voice for every participant of a script.
///
/// Participants that only carry a voice preview get a voice created from it; the
/// resolved ids are written back so later runs reuse them.
pub struct ScriptVoicePreparer {
    scripts: Arc<dyn ScriptStore>,
    provider: Arc<dyn VoiceProvider>,
}

impl ScriptVoicePreparer {
    pub fn new(scripts: Arc<dyn ScriptStore>, provider: Arc<dyn VoiceProvider>) -> Self {
        Self { scripts, provider }
    }
}

#[async_trait]
impl VoicePreparer for ScriptVoicePreparer {
    async fn prepare_voices(&self, podcast_id: &str, token: &CancellationToken) -> Result<()> {
        let mut script = self.scripts.load_script(podcast_id).await?;
        tracing::info!(
            podcast_id,
            participants = script.participants.len(),
            "Preparing voices"
        );

        let mut changed = false;
        for participant in &mut script.participants {
            token.checkpoint()?;

            if let Some(preview_id) = participant.voice_preview_id.clone() {
                let voice_id = self
                    .provider
                    .create_voice_from_preview(&participant.name, &preview_id)
                    .await
                    .map_err(|e| PodgenError::VoicePreparation {
                        message: format!(
                            "Voice processing failed for participant {}: {}",
                            participant.name, e
                        ),
                    })?;
                tracing::info!(
                    podcast_id,
                    participant = %participant.name,
                    voice_id = %voice_id,
                    "Created voice from preview"
                );
                participant.voice_id = Some(voice_id);
                participant.voice_preview_id = None;
                changed = true;
            } else if participant.voice_id.is_some() {
                tracing::debug!(podcast_id, participant = %participant.name, "Voice already set");
            } else {
                return Err(PodgenError::VoicePreparation {
                    message: format!(
                        "No voice information available for participant {}",
                        participant.name
                    ),
                });
            }
        }

        if changed {
            self.scripts.save_script(podcast_id, &script).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::script::{MemoryScriptStore, Participant, PodcastScript};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingVoices {
        created: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl VoiceProvider for RecordingVoices {
        async fn create_voice_from_preview(&self, name: &str, preview_id: &str) -> Result<String> {
            self.created
                .lock()
                .push((name.to_string(), preview_id.to_string()));
            Ok(format!("voice-{preview_id}"))
        }
    }

    fn participant(id: &str, voice: Option<&str>, preview: Option<&str>) -> Participant {
        Participant {
            id: id.to_string(),
            name: format!("Speaker {id}"),
            voice_id: voice.map(str::to_string),
            voice_preview_id: preview.map(str::to_string),
        }
    }

    fn setup(participants: Vec<Participant>) -> (Arc<MemoryScriptStore>, Arc<RecordingVoices>, ScriptVoicePreparer) {
        let scripts = Arc::new(MemoryScriptStore::new());
        scripts.insert(
            "1",
            PodcastScript {
                participants,
                lines: Vec::new(),
            },
        );
        let voices = Arc::new(RecordingVoices::default());
        let preparer = ScriptVoicePreparer::new(scripts.clone(), voices.clone());
        (scripts, voices, preparer)
    }

    #[tokio::test]
    async fn previews_become_persistent_voices() {
        let (scripts, voices, preparer) = setup(vec![
            participant("a", Some("lib-voice"), None),
            participant("b", None, Some("p42")),
        ]);

        preparer
            .prepare_voices("1", &CancellationToken::new())
            .await
            .unwrap();

        let script = scripts.get("1").unwrap();
        assert_eq!(script.participants[0].voice_id.as_deref(), Some("lib-voice"));
        assert_eq!(script.participants[1].voice_id.as_deref(), Some("voice-p42"));
        assert_eq!(script.participants[1].voice_preview_id, None);
        assert_eq!(voices.created.lock().len(), 1);
    }

    #[tokio::test]
    async fn participant_without_voice_fails() {
        let (_, _, preparer) = setup(vec![participant("a", None, None)]);
        let err = preparer
            .prepare_voices("1", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Voice preparation failed: No voice information available for participant Speaker a"
        );
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_provider_calls() {
        let (_, voices, preparer) = setup(vec![participant("b", None, Some("p1"))]);
        let token = CancellationToken::new();
        token.cancel();
        let err = preparer.prepare_voices("1", &token).await.unwrap_err();
        assert!(matches!(err, PodgenError::Cancelled));
        assert!(voices.created.lock().is_empty());
    }
}

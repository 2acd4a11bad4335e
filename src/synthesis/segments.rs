//! Segment synthesis from the podcast script.

use crate::audio::AudioSegment;
use crate::defaults;
use crate::error::{PodgenError, Result};
use crate::orchestrator::{CancellationToken, SegmentSynthesizer};
use crate::synthesis::script::ScriptStore;
use crate::synthesis::{SpeechProvider, SpeechRequest};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;

/// Synthesizes one segment per script line, in script order.
pub struct ScriptSynthesizer {
    scripts: Arc<dyn ScriptStore>,
    speech: Arc<dyn SpeechProvider>,
    context_requests: usize,
}

impl ScriptSynthesizer {
    pub fn new(scripts: Arc<dyn ScriptStore>, speech: Arc<dyn SpeechProvider>) -> Self {
        Self {
            scripts,
            speech,
            context_requests: defaults::PROSODY_CONTEXT_REQUESTS,
        }
    }

    /// How many earlier request ids to pass along as prosody context.
    pub fn with_context_requests(mut self, count: usize) -> Self {
        self.context_requests = count;
        self
    }
}

#[async_trait]
impl SegmentSynthesizer for ScriptSynthesizer {
    async fn synthesize_segments(
        &self,
        podcast_id: &str,
        token: &CancellationToken,
    ) -> Result<Vec<AudioSegment>> {
        let script = self.scripts.load_script(podcast_id).await?;
        let total = script.lines.len();
        tracing::info!(podcast_id, lines = total, "Synthesizing segments");

        let mut recent_requests: VecDeque<String> = VecDeque::with_capacity(self.context_requests);
        let mut segments = Vec::with_capacity(total);

        for (index, line) in script.lines.iter().enumerate() {
            token.checkpoint()?;

            let speaker = script.participant(&line.participant_id).ok_or_else(|| {
                PodgenError::Synthesis {
                    message: format!("Participant not found with ID: {}", line.participant_id),
                }
            })?;
            let voice_id = speaker.voice_id.clone().ok_or_else(|| PodgenError::Synthesis {
                message: format!("Participant {} has no voice", speaker.name),
            })?;

            let request = SpeechRequest {
                text: line.content.clone(),
                voice_id,
                previous_text: index
                    .checked_sub(1)
                    .map(|i| script.lines[i].content.clone()),
                next_text: script.lines.get(index + 1).map(|l| l.content.clone()),
                previous_request_ids: recent_requests.iter().cloned().collect(),
            };

            let response = self.speech.synthesize(request).await?;
            if let Some(request_id) = response.request_id
                && self.context_requests > 0
            {
                if recent_requests.len() == self.context_requests {
                    recent_requests.pop_front();
                }
                recent_requests.push_back(request_id);
            }

            let mut segment = AudioSegment::new(index, response.audio);
            segment.codec = response.codec;
            segments.push(segment);
            tracing::debug!(podcast_id, segment = index + 1, total, "Generated audio segment");
        }

        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::SpeechResponse;
    use crate::synthesis::script::{MemoryScriptStore, Participant, PodcastScript, ScriptLine};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSpeech {
        requests: Mutex<Vec<SpeechRequest>>,
    }

    #[async_trait]
    impl SpeechProvider for RecordingSpeech {
        async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechResponse> {
            let mut requests = self.requests.lock();
            let n = requests.len();
            requests.push(request);
            Ok(SpeechResponse {
                audio: vec![n as u8],
                codec: Some("mp3".to_string()),
                request_id: Some(format!("req-{n}")),
            })
        }
    }

    fn script(lines: &[(&str, &str)]) -> PodcastScript {
        PodcastScript {
            participants: vec![
                Participant {
                    id: "host".to_string(),
                    name: "Host".to_string(),
                    voice_id: Some("vh".to_string()),
                    voice_preview_id: None,
                },
                Participant {
                    id: "guest".to_string(),
                    name: "Guest".to_string(),
                    voice_id: None,
                    voice_preview_id: Some("p".to_string()),
                },
            ],
            lines: lines
                .iter()
                .map(|(speaker, text)| ScriptLine {
                    participant_id: speaker.to_string(),
                    content: text.to_string(),
                })
                .collect(),
        }
    }

    fn synthesizer(script: PodcastScript) -> (Arc<RecordingSpeech>, ScriptSynthesizer) {
        let scripts = Arc::new(MemoryScriptStore::new());
        scripts.insert("1", script);
        let speech = Arc::new(RecordingSpeech::default());
        (speech.clone(), ScriptSynthesizer::new(scripts, speech))
    }

    #[tokio::test]
    async fn one_segment_per_line_with_prosody_context() {
        let lines: Vec<(&str, String)> = (0..5).map(|i| ("host", format!("line {i}"))).collect();
        let lines: Vec<(&str, &str)> = lines.iter().map(|(s, t)| (*s, t.as_str())).collect();
        let (speech, synth) = synthesizer(script(&lines));

        let segments = synth
            .synthesize_segments("1", &CancellationToken::new())
            .await
            .unwrap();
        let sequences: Vec<usize> = segments.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
        assert_eq!(segments[0].codec.as_deref(), Some("mp3"));

        let requests = speech.requests.lock();
        assert_eq!(requests[0].previous_text, None);
        assert_eq!(requests[0].next_text.as_deref(), Some("line 1"));
        assert!(requests[0].previous_request_ids.is_empty());
        assert_eq!(requests[4].previous_text.as_deref(), Some("line 3"));
        assert_eq!(requests[4].next_text, None);
        // Only the three most recent request ids travel along.
        assert_eq!(requests[4].previous_request_ids, vec!["req-1", "req-2", "req-3"]);
    }

    #[tokio::test]
    async fn unknown_participant_fails() {
        let (_, synth) = synthesizer(script(&[("nobody", "hi")]));
        let err = synth
            .synthesize_segments("1", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Speech synthesis failed: Participant not found with ID: nobody"
        );
    }

    #[tokio::test]
    async fn speaker_without_voice_fails() {
        let (_, synth) = synthesizer(script(&[("guest", "hi")]));
        let err = synth
            .synthesize_segments("1", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PodgenError::Synthesis { .. }));
    }

    #[tokio::test]
    async fn cancellation_is_checked_between_lines() {
        let (speech, synth) = synthesizer(script(&[("host", "a"), ("host", "b")]));
        let token = CancellationToken::new();
        token.cancel();
        let err = synth.synthesize_segments("1", &token).await.unwrap_err();
        assert!(matches!(err, PodgenError::Cancelled));
        assert!(speech.requests.lock().is_empty());
    }
}

//! Segment and assembled-output value types.

use std::time::Duration;

/// Target layout of the assembled podcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            sample_rate: crate::defaults::OUTPUT_SAMPLE_RATE,
            channels: crate::defaults::OUTPUT_CHANNELS,
        }
    }
}

/// One unit of synthesized audio, identified by its position in the podcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSegment {
    /// Position within the run; unique per run.
    pub sequence: usize,
    /// Container or codec hint (`"mp3"`, `"wav"`, ...). Used to speed up probing only;
    /// the real format is detected from the bytes.
    pub codec: Option<String>,
    /// Encoded audio exactly as the speech provider returned it.
    pub data: Vec<u8>,
}

impl AudioSegment {
    pub fn new(sequence: usize, data: Vec<u8>) -> Self {
        Self {
            sequence,
            codec: None,
            data,
        }
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = Some(codec.into());
        self
    }
}

/// Final podcast audio: one WAV stream plus derived metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledAudio {
    pub data: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Sample frames (one sample per channel) in the stream.
    pub frames: u64,
    pub segment_count: usize,
}

impl AssembledAudio {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames as f64 / self.sample_rate as f64)
    }

    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn mime_type(&self) -> &'static str {
        "audio/wav"
    }

    pub fn extension(&self) -> &'static str {
        "wav"
    }
}

//! Ordered concatenation of synthesized segments into one podcast track.

use crate::audio::decode::SegmentDecoder;
use crate::audio::segment::{AssembledAudio, AudioSegment, OutputFormat};
use crate::defaults;
use crate::error::{PodgenError, Result};
use std::io::Cursor;

/// Normalizes, concatenates and re-encodes audio segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioAssembler {
    format: OutputFormat,
}

impl AudioAssembler {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Assemble `segments`, in the order given, into a single WAV stream.
    ///
    /// Every input goes through decode, normalization and re-encoding, including
    /// a lone segment already in the output format.
    pub fn assemble(&self, segments: Vec<AudioSegment>) -> Result<AssembledAudio> {
        if segments.is_empty() {
            return Err(PodgenError::EmptyInput);
        }
        let segment_count = segments.len();

        let spec = hound::WavSpec {
            channels: self.format.channels,
            sample_rate: self.format.sample_rate,
            bits_per_sample: defaults::BITS_PER_SAMPLE,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        let mut samples_written: u64 = 0;
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(encoding_failed)?;
            for chunk in PcmStream::new(segments, self.format) {
                let chunk = chunk?;
                for sample in &chunk {
                    writer.write_sample(*sample).map_err(encoding_failed)?;
                }
                samples_written += chunk.len() as u64;
            }
            writer.finalize().map_err(encoding_failed)?;
        }

        let frames = samples_written / u64::from(self.format.channels.max(1));
        let data = cursor.into_inner();
        if frames == 0 || data.is_empty() {
            return Err(PodgenError::EncodingFailed {
                message: "assembled stream is empty".to_string(),
            });
        }

        let assembled = AssembledAudio {
            data,
            sample_rate: self.format.sample_rate,
            channels: self.format.channels,
            frames,
            segment_count,
        };
        tracing::info!(
            segments = segment_count,
            frames,
            bytes = assembled.size(),
            duration_ms = assembled.duration().as_millis() as u64,
            "Assembled podcast audio"
        );
        Ok(assembled)
    }
}

fn encoding_failed(error: hound::Error) -> PodgenError {
    PodgenError::EncodingFailed {
        message: error.to_string(),
    }
}

/// All segments read back to back as one stream of normalized sample chunks.
///
/// Segments are opened only when the previous one is exhausted, so neither their
/// lengths nor their decoded audio need to be known up front.
struct PcmStream {
    pending: std::vec::IntoIter<AudioSegment>,
    current: Option<SegmentDecoder>,
    format: OutputFormat,
    failed: bool,
}

impl PcmStream {
    fn new(segments: Vec<AudioSegment>, format: OutputFormat) -> Self {
        Self {
            pending: segments.into_iter(),
            current: None,
            format,
            failed: false,
        }
    }

    fn advance(&mut self) -> Result<Option<Vec<i16>>> {
        loop {
            if let Some(decoder) = self.current.as_mut() {
                if let Some(chunk) = decoder.next_chunk()? {
                    return Ok(Some(chunk));
                }
                self.current = None;
            }
            match self.pending.next() {
                Some(segment) => self.current = Some(SegmentDecoder::open(segment, self.format)?),
                None => return Ok(None),
            }
        }
    }
}

impl Iterator for PcmStream {
    type Item = Result<Vec<i16>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.advance() {
            Ok(chunk) => chunk.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_wav(sample_rate: u32, channels: u16, frames: usize) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames * channels as usize {
            writer.write_sample(((i % 100) as i16 - 50) * 200).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    fn constant_wav(sample_rate: u32, value: i16, frames: usize) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..frames {
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    fn read_back(audio: &AssembledAudio) -> (hound::WavSpec, Vec<i16>) {
        let reader = hound::WavReader::new(Cursor::new(audio.data.clone())).unwrap();
        let spec = reader.spec();
        let samples = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        (spec, samples)
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = AudioAssembler::default().assemble(Vec::new()).unwrap_err();
        assert!(matches!(err, PodgenError::EmptyInput));
    }

    #[test]
    fn output_uses_target_format() {
        let assembler = AudioAssembler::new(OutputFormat {
            sample_rate: 16_000,
            channels: 2,
        });
        let audio = assembler
            .assemble(vec![AudioSegment::new(0, make_wav(8_000, 1, 800))])
            .unwrap();
        let (spec, samples) = read_back(&audio);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(samples.len() as u64, audio.frames * 2);
    }

    #[test]
    fn concatenation_preserves_order() {
        let target = OutputFormat {
            sample_rate: 8_000,
            channels: 1,
        };
        let first = constant_wav(8_000, 8_000, 100);
        let second = constant_wav(8_000, -8_000, 50);

        let audio = AudioAssembler::new(target)
            .assemble(vec![AudioSegment::new(0, first), AudioSegment::new(1, second)])
            .unwrap();
        let (_, samples) = read_back(&audio);
        assert_eq!(samples.len(), 150);
        assert!(samples[..100].iter().all(|&s| (s - 8_000).abs() <= 1));
        assert!(samples[100..].iter().all(|&s| (s + 8_000).abs() <= 1));
        assert_eq!(audio.segment_count, 2);
    }

    #[test]
    fn corrupt_segment_fails_whole_assembly() {
        let segments = vec![
            AudioSegment::new(0, make_wav(16_000, 1, 1_600)),
            AudioSegment::new(1, b"garbage".to_vec()),
        ];
        let err = AudioAssembler::default().assemble(segments).unwrap_err();
        assert!(matches!(err, PodgenError::UnsupportedFormat { sequence: 1, .. }));
    }

    #[test]
    fn mixed_formats_are_normalized_not_rejected() {
        let segments = vec![
            AudioSegment::new(0, make_wav(22_050, 2, 2_205)),
            AudioSegment::new(1, make_wav(48_000, 1, 4_800)),
            AudioSegment::new(2, make_wav(44_100, 1, 4_410)),
        ];
        let audio = AudioAssembler::default().assemble(segments).unwrap();
        let expected = 3 * 4_410;
        assert!(
            (audio.frames as i64 - expected).abs() <= 3,
            "expected ~{expected} frames, got {}",
            audio.frames
        );
        assert_eq!(audio.mime_type(), "audio/wav");
    }
}

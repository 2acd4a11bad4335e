//! Per-segment streaming decoder.
//!
//! Wraps a symphonia format reader and decoder, and hands out the segment's audio
//! already normalized to the output format, one packet's worth at a time.

use crate::audio::resample::{LinearResampler, remix, to_i16};
use crate::audio::segment::{AudioSegment, OutputFormat};
use crate::error::{PodgenError, Result};
use std::io::{Cursor, ErrorKind};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

pub struct SegmentDecoder {
    sequence: usize,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    target: OutputFormat,
    resampler: Option<LinearResampler>,
    frames: u64,
    finished: bool,
}

impl SegmentDecoder {
    /// Probe the segment's bytes and prepare a decoder for its first audio track.
    ///
    /// Takes ownership of the segment so its encoded bytes are released as soon
    /// as the decoder is dropped.
    pub fn open(segment: AudioSegment, target: OutputFormat) -> Result<Self> {
        let sequence = segment.sequence;
        let reject = |message: String| PodgenError::UnsupportedFormat { sequence, message };

        let mut hint = Hint::new();
        if let Some(codec) = segment.codec.as_deref() {
            hint.with_extension(codec);
        }

        let source = MediaSourceStream::new(Box::new(Cursor::new(segment.data)), Default::default());
        let format = symphonia::default::get_probe()
            .format(
                &hint,
                source,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| reject(e.to_string()))?
            .format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| reject("no audio track found".to_string()))?;
        let track_id = track.id;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| reject(e.to_string()))?;

        tracing::debug!(
            sequence,
            sample_rate = ?track.codec_params.sample_rate,
            channels = ?track.codec_params.channels.map(|c| c.count()),
            "Opened audio segment"
        );

        Ok(Self {
            sequence,
            format,
            decoder,
            track_id,
            target,
            resampler: None,
            frames: 0,
            finished: false,
        })
    }

    /// Output frames produced so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Next chunk of normalized interleaved samples, or `None` once the segment is exhausted.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<i16>>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(unsupported(self.sequence, e)),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(reason)) => {
                    tracing::debug!(sequence = self.sequence, reason, "Skipping undecodable packet");
                    continue;
                }
                Err(SymphoniaError::IoError(ref e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(unsupported(self.sequence, e)),
            };

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            samples.copy_interleaved_ref(decoded);

            let channels = self.target.channels as usize;
            let mixed = remix(samples.samples(), spec.channels.count(), channels);
            let target_rate = self.target.sample_rate;
            let resampler = self
                .resampler
                .get_or_insert_with(|| LinearResampler::new(spec.rate, target_rate, channels));
            let out = resampler.process(&mixed);
            if out.is_empty() {
                continue;
            }
            return Ok(Some(self.emit(&out)));
        }

        self.finish()
    }

    fn finish(&mut self) -> Result<Option<Vec<i16>>> {
        self.finished = true;
        let tail = self
            .resampler
            .as_mut()
            .map(LinearResampler::flush)
            .unwrap_or_default();

        if self.frames == 0 && tail.is_empty() {
            return Err(PodgenError::UnsupportedFormat {
                sequence: self.sequence,
                message: "segment contains no audio frames".to_string(),
            });
        }

        tracing::trace!(sequence = self.sequence, frames = self.frames, "Segment exhausted");
        if tail.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.emit(&tail)))
        }
    }

    fn emit(&mut self, samples: &[f32]) -> Vec<i16> {
        self.frames += (samples.len() / self.target.channels.max(1) as usize) as u64;
        samples.iter().copied().map(to_i16).collect()
    }
}

fn unsupported(sequence: usize, error: SymphoniaError) -> PodgenError {
    PodgenError::UnsupportedFormat {
        sequence,
        message: error.to_string(),
    }
}

//! Channel remixing and streaming sample-rate conversion.
//!
//! Both operate on interleaved `f32` frames in `[-1.0, 1.0]`. The resampler keeps
//! state between calls, so a segment can be converted packet by packet without
//! knowing its length up front and without seams at packet boundaries.

/// Remix interleaved frames from `from` channels to `to` channels.
///
/// Mono output averages all input channels; mono input is duplicated into every
/// output channel. Other layouts map output channel `c` to input channel `c % from`.
pub fn remix(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == 0 || to == 0 {
        return Vec::new();
    }
    if from == to {
        return samples.to_vec();
    }

    let frames = samples.chunks_exact(from);
    let mut out = Vec::with_capacity(frames.len() * to);
    for frame in frames {
        if to == 1 {
            out.push(frame.iter().sum::<f32>() / from as f32);
        } else if from == 1 {
            out.extend(std::iter::repeat_n(frame[0], to));
        } else {
            out.extend((0..to).map(|c| frame[c % from]));
        }
    }
    out
}

/// Linear-interpolation resampler that can be fed one chunk at a time.
#[derive(Debug, Clone)]
pub struct LinearResampler {
    channels: usize,
    /// Input frames advanced per output frame.
    step: f64,
    /// Read position, in frames, relative to the start of `carry`.
    pos: f64,
    /// Input frames not yet fully consumed by interpolation.
    carry: Vec<f32>,
}

impl LinearResampler {
    pub fn new(from_rate: u32, to_rate: u32, channels: usize) -> Self {
        let step = if from_rate == 0 || to_rate == 0 {
            1.0
        } else {
            from_rate as f64 / to_rate as f64
        };
        Self {
            channels: channels.max(1),
            step,
            pos: 0.0,
            carry: Vec::new(),
        }
    }

    /// True when input and output rates match.
    pub fn is_passthrough(&self) -> bool {
        self.step == 1.0
    }

    /// Resample the next chunk of interleaved frames.
    ///
    /// The last input frame is held back until the following chunk (or `flush`)
    /// provides the right-hand neighbour for interpolation.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.is_passthrough() {
            return input.to_vec();
        }

        let ch = self.channels;
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(input);
        let frames = buf.len() / ch;

        let mut out = Vec::with_capacity((frames as f64 / self.step) as usize * ch + ch);
        loop {
            let idx = self.pos as usize;
            if idx + 1 >= frames {
                break;
            }
            let frac = (self.pos - idx as f64) as f32;
            for c in 0..ch {
                let left = buf[idx * ch + c];
                let right = buf[(idx + 1) * ch + c];
                out.push(left + (right - left) * frac);
            }
            self.pos += self.step;
        }

        let keep_from = (self.pos as usize).min(frames);
        self.carry = buf[keep_from * ch..frames * ch].to_vec();
        self.pos -= keep_from as f64;
        out
    }

    /// Emit what is left once the input is exhausted, holding the final frame.
    pub fn flush(&mut self) -> Vec<f32> {
        if self.is_passthrough() {
            return Vec::new();
        }

        let ch = self.channels;
        let frames = self.carry.len() / ch;
        let mut out = Vec::new();
        loop {
            let idx = self.pos as usize;
            if idx >= frames {
                break;
            }
            out.extend_from_slice(&self.carry[idx * ch..(idx + 1) * ch]);
            self.pos += self.step;
        }

        self.carry.clear();
        self.pos = 0.0;
        out
    }
}

/// Convert a normalized float sample to 16-bit PCM.
pub fn to_i16(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(-32768.0, 32767.0) as i16
}

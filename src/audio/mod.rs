//! Audio assembly: decode, normalize and concatenate synthesized segments.

pub mod assembler;
pub mod decode;
pub mod resample;
pub mod segment;

pub use assembler::AudioAssembler;
pub use segment::{AssembledAudio, AudioSegment, OutputFormat};

//! Default configuration constants for podgen.
//!
//! Shared by the config types and the components that fall back to them when
//! built without a config file.

/// Sample rate of the assembled podcast in Hz.
///
/// Every segment is resampled to this rate before concatenation, whatever rate
/// the speech provider produced.
pub const OUTPUT_SAMPLE_RATE: u32 = 44_100;

/// Channel count of the assembled podcast.
///
/// Speech is mono; stereo segments are down-mixed by averaging.
pub const OUTPUT_CHANNELS: u16 = 1;

/// Bit depth of the normalized intermediate representation and the WAV output.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Number of generation runs that may execute stage work at the same time.
pub const MAX_CONCURRENT_RUNS: usize = 5;

/// How many recent provider request ids are passed along as prosody context.
pub const PROSODY_CONTEXT_REQUESTS: usize = 3;

/// Maximum accepted podcast id length.
pub const MAX_PODCAST_ID_LEN: usize = 64;

/// Default log level when neither RUST_LOG nor the config overrides it.
pub const LOG_LEVEL: &str = "info";

/// Socket file name used inside XDG_RUNTIME_DIR.
pub const SOCKET_NAME: &str = "podgen.sock";

/// Codec produced by the default external speech command.
pub const SPEECH_CODEC: &str = "wav";

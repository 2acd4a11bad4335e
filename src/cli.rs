//! Command-line interface for podgen
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Multi-speaker podcast generation daemon and client
#[derive(Parser, Debug)]
#[command(
    name = "podgen",
    version,
    about = "Multi-speaker podcast generation daemon and client"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path to the daemon's Unix socket (default: $XDG_RUNTIME_DIR/podgen.sock)
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the generation daemon in the foreground
    Daemon,

    /// Start generating a podcast
    Generate {
        /// Podcast id
        podcast_id: String,

        /// Stream status updates until the run ends
        #[arg(long, short = 'f')]
        follow: bool,
    },

    /// Show the current or last generation run of a podcast
    Status {
        /// Podcast id
        podcast_id: String,
    },

    /// Cancel the active generation run of a podcast
    Cancel {
        /// Podcast id
        podcast_id: String,
    },

    /// Stream status updates for a podcast
    Follow {
        /// Podcast id
        podcast_id: String,
    },

    /// Assemble audio files into one WAV without the daemon
    Assemble {
        /// Input audio files, in playback order
        #[arg(required = true, value_name = "FILE")]
        inputs: Vec<PathBuf>,

        /// Output WAV file
        #[arg(long, short = 'o', value_name = "FILE")]
        output: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

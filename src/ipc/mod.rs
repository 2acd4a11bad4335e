//! Daemon control over a Unix socket: newline-delimited JSON.

pub mod client;
pub mod protocol;
pub mod server;

pub use protocol::{Command, Response};
pub use server::{CommandHandler, FollowStream, IpcServer, ShutdownHandle};

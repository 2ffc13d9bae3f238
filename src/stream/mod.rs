//! Generic stream listener
//!
//! This module provides the accept loop shared by the plaintext and TLS
//! listeners. Each accepted connection runs on its own task.

pub mod config;
pub mod protocol;
pub mod server;

pub use config::StreamConfig;
pub use protocol::StreamProtocol;
pub use server::{BoundServer, StreamServer};

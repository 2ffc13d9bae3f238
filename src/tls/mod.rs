//! TLS listener
//!
//! Loads a PEM key pair into a rustls configuration and serves HTTP over
//! TLS sessions with the same request printer as the plaintext listener.

pub mod config;
pub mod loader;
pub mod protocol;


pub use config::{TLS_CERT_FILE, TLS_KEY_FILE, TlsConfig, source_dir};
pub use loader::load_server_config;
pub use protocol::TlsProtocol;

/// Request printing server speaking HTTPS
pub type HttpsServer = crate::stream::StreamServer<TlsProtocol>;

use crate::http::protocol::HttpProtocolError;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Error types for the reqprinter library
#[derive(Error, Debug)]
pub enum PrinterError {
    /// A listener could not bind its address
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Certificate or private key could not be loaded
    #[error("error loading TLS material {}: {message}", .path.display())]
    Tls { path: PathBuf, message: String },

    /// Socket-level errors (accept, read, write)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed HTTP on the wire
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A listener stopped serving
    #[error("{0} listener exited")]
    ListenerExited(&'static str),
}

impl From<HttpProtocolError> for PrinterError {
    fn from(err: HttpProtocolError) -> Self {
        match err {
            HttpProtocolError::Io(e) => PrinterError::Io(e),
            other => PrinterError::Protocol(other.to_string()),
        }
    }
}

/// Result type for the reqprinter library
pub type Result<T> = std::result::Result<T, PrinterError>;

pub mod bootstrap;
pub mod http;
pub mod printer;
pub mod stream;
pub mod tcp;
pub mod tls;

// Re-export main types for convenience
pub use bootstrap::Settings;
pub use crate::http::{InboundRequest, RequestHead};
pub use printer::{MemorySink, RecordSink, RequestPrinter, StdoutSink};
pub use stream::{BoundServer, StreamConfig, StreamProtocol, StreamServer};
pub use tcp::{HttpServer, TcpProtocol};
pub use tls::{HttpsServer, TlsConfig, TlsProtocol};

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Trait for transports layered over accepted TCP connections
///
/// The generic [`StreamServer`](super::StreamServer) owns the TCP listener;
/// a protocol only decides what an accepted socket turns into before HTTP is
/// spoken on it (the socket itself, or a TLS session over it).
#[async_trait]
pub trait StreamProtocol: Send + Sync + 'static {
    /// Stream type HTTP is served on
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Name of the scheme served, used in logs
    fn scheme(&self) -> &'static str;

    /// Prepares an accepted connection. Runs on the connection's own task.
    async fn establish(&self, stream: TcpStream) -> io::Result<Self::Stream>;
}

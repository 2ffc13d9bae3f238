use super::config::TlsConfig;
use super::loader::load_server_config;
use crate::Result;
use crate::stream::StreamProtocol;
use async_trait::async_trait;
use rustls::ServerConfig;
use std::io;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;

/// TLS over TCP; the handshake runs on the connection's own task
#[derive(Clone)]
pub struct TlsProtocol {
    acceptor: TlsAcceptor,
}

impl TlsProtocol {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self {
            acceptor: TlsAcceptor::from(config),
        }
    }

    /// Loads the key pair named by `config`
    pub fn from_config(config: &TlsConfig) -> Result<Self> {
        Ok(Self::new(load_server_config(config)?))
    }
}

#[async_trait]
impl StreamProtocol for TlsProtocol {
    type Stream = TlsStream<TcpStream>;

    fn scheme(&self) -> &'static str {
        "https"
    }

    async fn establish(&self, stream: TcpStream) -> io::Result<Self::Stream> {
        stream.set_nodelay(true)?;
        self.acceptor.accept(stream).await
    }
}

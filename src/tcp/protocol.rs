use crate::stream::StreamProtocol;
use async_trait::async_trait;
use std::io;
use tokio::net::TcpStream;

/// Plain TCP: the accepted socket is served as is
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProtocol;

#[async_trait]
impl StreamProtocol for TcpProtocol {
    type Stream = TcpStream;

    fn scheme(&self) -> &'static str {
        "http"
    }

    async fn establish(&self, stream: TcpStream) -> io::Result<TcpStream> {
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

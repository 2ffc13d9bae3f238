use std::net::SocketAddr;

/// Configuration for a stream listener
///
/// # Examples
///
/// ```
/// use reqprinter::stream::StreamConfig;
///
/// let config = StreamConfig {
///     bind_addr: "0.0.0.0:8080".parse().unwrap(),
///     buffer_size: 8192,
/// };
/// assert_eq!(config.bind_addr.port(), 8080);
/// ```
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Initial capacity of each connection's read buffer
    pub buffer_size: usize,
}

impl StreamConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            buffer_size: 8192,
        }
    }
}

//! Plaintext HTTP listener

pub mod protocol;


pub use protocol::TcpProtocol;

/// Request printing server speaking plain HTTP
pub type HttpServer = crate::stream::StreamServer<TcpProtocol>;

//! HTTP/1.x request handling
//!
//! This module frames requests off any byte stream, hands each complete
//! request to the printer and answers it with an empty `200 OK`. It is shared
//! by the plaintext and TLS listeners.

pub mod connection;
pub mod protocol;
pub mod request;
pub mod response;


pub use connection::serve_connection;
pub use protocol::{HttpCodec, HttpProtocolError, RequestFrame};
pub use request::{InboundRequest, RequestHead, canonical_header_name};
pub use response::Response;

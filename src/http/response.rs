use super::request::RequestHead;
use ::http::{StatusCode, Version};
use bytes::{BufMut, BytesMut};

/// The fixed, bodiless responses this server sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    /// Value of the `Connection` header, if one is needed
    pub connection: Option<&'static str>,
}

impl Response {
    /// Default answer to every request: `200 OK` with an empty body
    pub fn ok(head: &RequestHead) -> Self {
        let connection = match (head.keep_alive(), head.version) {
            (false, _) => Some("close"),
            (true, Version::HTTP_10) => Some("keep-alive"),
            (true, _) => None,
        };
        Self {
            status: StatusCode::OK,
            connection,
        }
    }

    /// Interim response for clients sending `Expect: 100-continue`
    pub fn continue_() -> Self {
        Self {
            status: StatusCode::CONTINUE,
            connection: None,
        }
    }

    /// Sent when the request head cannot be parsed; the connection is closed afterwards
    pub fn bad_request() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            connection: Some("close"),
        }
    }

    pub fn closes_connection(&self) -> bool {
        self.connection == Some("close")
    }

    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.put_slice(b"HTTP/1.1 ");
        dst.put_slice(self.status.as_str().as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(self.status.canonical_reason().unwrap_or("").as_bytes());
        dst.put_slice(b"\r\n");

        if !self.status.is_informational() {
            dst.put_slice(b"Content-Length: 0\r\n");
            if let Some(connection) = self.connection {
                dst.put_slice(b"Connection: ");
                dst.put_slice(connection.as_bytes());
                dst.put_slice(b"\r\n");
            }
        }
        dst.put_slice(b"\r\n");
    }
}

use super::request::{RequestHead, target_path};
use super::response::Response;
use ::http::{HeaderMap, HeaderName, HeaderValue, Method, Version, header};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use std::net::SocketAddr;
use tokio_util::codec::{Decoder, Encoder};

/// Maximum number of headers accepted on one request
pub const MAX_HEADERS: usize = 100;
/// Maximum size of a request line plus headers
pub const MAX_HEAD_SIZE: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum HttpProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP parsing error: {0}")]
    HttpParse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Request head exceeds 1 MiB")]
    HeadTooLarge,
}

/// One step of a request as it comes off the wire
#[derive(Debug)]
pub enum RequestFrame {
    /// Request line and headers
    Head(RequestHead),
    /// The complete body of the preceding head, possibly empty
    Body(Bytes),
}

#[derive(Debug, Clone, Copy)]
enum DecodeState {
    Head,
    Length(usize),
    Chunked(ChunkState),
}

#[derive(Debug, Clone, Copy)]
enum ChunkState {
    Size,
    Data(u64),
    DataEnd,
    Trailers,
}

/// HTTP/1.x server-side codec.
///
/// Decodes a byte stream into alternating `Head` and `Body` frames and
/// encodes the fixed responses this server sends.
#[derive(Debug)]
pub struct HttpCodec {
    remote_addr: SocketAddr,
    state: DecodeState,
    body: BytesMut,
}

impl HttpCodec {
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            remote_addr,
            state: DecodeState::Head,
            body: BytesMut::new(),
        }
    }

    fn decode_head(&mut self, src: &mut BytesMut) -> Result<Option<RequestFrame>, HttpProtocolError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);

        let parsed_len = match req.parse(&src[..]) {
            Ok(httparse::Status::Complete(parsed_len)) => parsed_len,
            Ok(httparse::Status::Partial) => {
                if src.len() > MAX_HEAD_SIZE {
                    return Err(HttpProtocolError::HeadTooLarge);
                }
                return Ok(None);
            }
            Err(e) => {
                return Err(HttpProtocolError::HttpParse(format!("Failed to parse headers: {e}")));
            }
        };

        let method = req
            .method
            .ok_or_else(|| HttpProtocolError::HttpParse("missing method".to_string()))?;
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|e| HttpProtocolError::InvalidRequest(format!("method {method:?}: {e}")))?;
        let path = target_path(req.path.unwrap_or("/"));
        let version = match req.version {
            Some(0) => Version::HTTP_10,
            _ => Version::HTTP_11,
        };

        let mut map = HeaderMap::with_capacity(req.headers.len());
        for h in req.headers.iter() {
            let name = HeaderName::from_bytes(h.name.as_bytes())
                .map_err(|e| HttpProtocolError::InvalidRequest(format!("header name {:?}: {e}", h.name)))?;
            let value = HeaderValue::from_bytes(h.value)
                .map_err(|e| HttpProtocolError::InvalidRequest(format!("header {:?}: {e}", h.name)))?;
            map.append(name, value);
        }

        self.state = body_framing(&map)?;
        src.advance(parsed_len);

        Ok(Some(RequestFrame::Head(RequestHead {
            method,
            path,
            version,
            remote_addr: self.remote_addr,
            headers: map,
        })))
    }

    fn decode_chunked(
        &mut self,
        mut chunk: ChunkState,
        src: &mut BytesMut,
    ) -> Result<Option<RequestFrame>, HttpProtocolError> {
        loop {
            chunk = match chunk {
                ChunkState::Size => match httparse::parse_chunk_size(&src[..]) {
                    Ok(httparse::Status::Complete((consumed, 0))) => {
                        src.advance(consumed);
                        ChunkState::Trailers
                    }
                    Ok(httparse::Status::Complete((consumed, size))) => {
                        src.advance(consumed);
                        ChunkState::Data(size)
                    }
                    Ok(httparse::Status::Partial) => break,
                    Err(_) => {
                        return Err(HttpProtocolError::InvalidRequest("invalid chunk size".to_string()));
                    }
                },
                ChunkState::Data(remaining) => {
                    if src.is_empty() {
                        break;
                    }
                    let take = remaining.min(src.len() as u64) as usize;
                    self.body.put(src.split_to(take));
                    match remaining - take as u64 {
                        0 => ChunkState::DataEnd,
                        left => ChunkState::Data(left),
                    }
                }
                ChunkState::DataEnd => {
                    if src.len() < 2 {
                        break;
                    }
                    if &src[..2] != b"\r\n" {
                        return Err(HttpProtocolError::InvalidRequest(
                            "missing CRLF after chunk data".to_string(),
                        ));
                    }
                    src.advance(2);
                    ChunkState::Size
                }
                ChunkState::Trailers => {
                    let Some(line_end) = src.windows(2).position(|w| w == b"\r\n") else {
                        if src.len() > MAX_HEAD_SIZE {
                            return Err(HttpProtocolError::HeadTooLarge);
                        }
                        break;
                    };
                    src.advance(line_end + 2);
                    if line_end == 0 {
                        self.state = DecodeState::Head;
                        return Ok(Some(RequestFrame::Body(self.body.split().freeze())));
                    }
                    ChunkState::Trailers
                }
            };
        }

        self.state = DecodeState::Chunked(chunk);
        Ok(None)
    }
}

/// Decides how the body following `headers` is delimited
fn body_framing(headers: &HeaderMap) -> Result<DecodeState, HttpProtocolError> {
    let codings: Vec<String> = headers
        .get_all(header::TRANSFER_ENCODING)
        .iter()
        .map(|v| {
            v.to_str()
                .map_err(|_| HttpProtocolError::InvalidRequest("non-ASCII Transfer-Encoding".to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .flat_map(|v| v.split(',').map(|c| c.trim().to_ascii_lowercase()).collect::<Vec<_>>())
        .filter(|c| !c.is_empty())
        .collect();

    if let Some(last) = codings.last() {
        if last != "chunked" {
            return Err(HttpProtocolError::InvalidRequest(format!(
                "unsupported transfer encoding {last:?}"
            )));
        }
        return Ok(DecodeState::Chunked(ChunkState::Size));
    }

    let mut length: Option<usize> = None;
    for value in headers.get_all(header::CONTENT_LENGTH) {
        for part in value.as_bytes().split(|b| *b == b',') {
            let part = part.trim_ascii();
            if part.is_empty() || !part.iter().all(u8::is_ascii_digit) {
                return Err(HttpProtocolError::InvalidRequest("invalid Content-Length".to_string()));
            }
            let parsed: usize = std::str::from_utf8(part)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| HttpProtocolError::InvalidRequest("Content-Length out of range".to_string()))?;
            match length {
                Some(existing) if existing != parsed => {
                    return Err(HttpProtocolError::InvalidRequest(
                        "conflicting Content-Length values".to_string(),
                    ));
                }
                _ => length = Some(parsed),
            }
        }
    }

    Ok(DecodeState::Length(length.unwrap_or(0)))
}

impl Decoder for HttpCodec {
    type Item = RequestFrame;
    type Error = HttpProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<RequestFrame>, HttpProtocolError> {
        match self.state {
            DecodeState::Head => self.decode_head(src),
            DecodeState::Length(len) => {
                // Framed grows the buffer as bytes arrive; the declared length
                // is client input and is never allocated up front.
                if src.len() < len {
                    return Ok(None);
                }
                self.state = DecodeState::Head;
                Ok(Some(RequestFrame::Body(src.split_to(len).freeze())))
            }
            DecodeState::Chunked(chunk) => self.decode_chunked(chunk, src),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<RequestFrame>, HttpProtocolError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        match self.state {
            DecodeState::Head if src.is_empty() => Ok(None),
            DecodeState::Head => Err(HttpProtocolError::HttpParse(
                "connection closed mid-way through request head".to_string(),
            )),
            _ => Err(HttpProtocolError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before the full body was received",
            ))),
        }
    }
}

impl Encoder<Response> for HttpCodec {
    type Error = HttpProtocolError;

    fn encode(&mut self, response: Response, dst: &mut BytesMut) -> Result<(), HttpProtocolError> {
        response.write_to(dst);
        Ok(())
    }
}

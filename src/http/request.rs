use ::http::{HeaderMap, Method, Uri, Version};
use bytes::Bytes;
use std::net::SocketAddr;

/// Everything known about a request before its body has been read
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    /// URI path, without the query string
    pub path: String,
    pub version: Version,
    pub remote_addr: SocketAddr,
    /// Header values keep their arrival order, names keep first-arrival order
    pub headers: HeaderMap,
}

impl RequestHead {
    /// Whether the client asked for an interim `100 Continue` before sending the body
    pub fn expects_continue(&self) -> bool {
        self.headers
            .get_all(::http::header::EXPECT)
            .iter()
            .any(|v| v.as_bytes().eq_ignore_ascii_case(b"100-continue"))
    }

    /// Whether the connection stays open after this request has been answered
    pub fn keep_alive(&self) -> bool {
        let has_token = |token: &str| {
            self.headers
                .get_all(::http::header::CONNECTION)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .flat_map(|v| v.split(','))
                .any(|t| t.trim().eq_ignore_ascii_case(token))
        };

        match self.version {
            Version::HTTP_10 => has_token("keep-alive"),
            _ => !has_token("close"),
        }
    }
}

/// A fully read request, handed to the printer
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub head: RequestHead,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn new(head: RequestHead, body: Bytes) -> Self {
        Self { head, body }
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn path(&self) -> &str {
        &self.head.path
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.head.remote_addr
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }
}

/// Extracts the path from a request target.
///
/// Origin-form (`/a?b`) and absolute-form (`http://host/a?b`) both yield `/a`.
/// Targets `http::Uri` cannot make sense of, and `*`, are kept verbatim.
pub fn target_path(target: &str) -> String {
    match target.parse::<Uri>() {
        Ok(uri) if !uri.path().is_empty() && target != "*" => uri.path().to_string(),
        _ => target.to_string(),
    }
}

/// Canonical MIME form of a header name: `x-request-id` becomes `X-Request-Id`
pub fn canonical_header_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        upper = c == '-';
    }
    out
}

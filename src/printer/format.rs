use crate::http::{InboundRequest, RequestHead, canonical_header_name};
use serde::de::IgnoredAny;
use std::borrow::Cow;
use std::io;

pub const BODY_START: &str = "=== Start of body ===";
pub const BODY_END: &str = "=== End of body ===";
pub const READ_FAILURE: &str = "error reading body";

/// Formats the complete record for one request
pub fn format_record(request: &InboundRequest) -> Vec<u8> {
    let body = render_body(&request.body);
    let mut out = Vec::with_capacity(256 + body.len());

    write_head(&mut out, &request.head);
    out.extend_from_slice(BODY_START.as_bytes());
    out.push(b'\n');
    out.extend_from_slice(&body);
    out.push(b'\n');
    out.extend_from_slice(BODY_END.as_bytes());
    out.extend_from_slice(b"\n\n");
    out
}

/// Formats the record for a request whose body could not be read
pub fn format_read_failure(head: &RequestHead, err: &io::Error) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    write_head(&mut out, head);
    out.extend_from_slice(format!("{READ_FAILURE}: {err}\n\n").as_bytes());
    out
}

/// Deepest array/object nesting that is still pretty-printed
pub const MAX_JSON_DEPTH: usize = 10_000;

const INDENT: &[u8] = b"  ";

/// Pretty-prints `body` with two-space indentation if it is valid JSON,
/// otherwise returns it untouched.
///
/// Only whitespace between tokens changes: object members, including
/// repeated keys, string escapes and number literals are kept as sent.
/// Leading whitespace is dropped and trailing whitespace is kept.
pub fn render_body(body: &[u8]) -> Cow<'_, [u8]> {
    // IgnoredAny validates without building a tree and without a nesting limit
    if serde_json::from_slice::<IgnoredAny>(body).is_err() {
        return Cow::Borrowed(body);
    }
    match reindent(body) {
        Some(pretty) => Cow::Owned(pretty),
        None => Cow::Borrowed(body),
    }
}

/// Re-indents a document already known to be valid JSON.
///
/// Returns `None` when nesting exceeds [`MAX_JSON_DEPTH`].
fn reindent(json: &[u8]) -> Option<Vec<u8>> {
    let start = json.iter().position(|b| !is_json_space(*b))?;
    let end = json.iter().rposition(|b| !is_json_space(*b))? + 1;

    let mut out = Vec::with_capacity(json.len() * 2);
    let mut depth = 0usize;
    let mut opened = false;
    let mut in_string = false;
    let mut escaped = false;

    for &b in &json[start..end] {
        if in_string {
            out.push(b);
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b' ' | b'\t' | b'\n' | b'\r' => continue,
            b']' | b'}' => {
                depth = depth.saturating_sub(1);
                if opened {
                    opened = false;
                } else {
                    newline(&mut out, depth);
                }
                out.push(b);
                continue;
            }
            _ => {}
        }

        if opened {
            newline(&mut out, depth);
            opened = false;
        }
        out.push(b);
        match b {
            b'[' | b'{' => {
                depth += 1;
                if depth > MAX_JSON_DEPTH {
                    return None;
                }
                opened = true;
            }
            b',' => newline(&mut out, depth),
            b':' => out.push(b' '),
            b'"' => in_string = true,
            _ => {}
        }
    }

    out.extend_from_slice(&json[end..]);
    Some(out)
}

fn newline(out: &mut Vec<u8>, depth: usize) {
    out.push(b'\n');
    for _ in 0..depth {
        out.extend_from_slice(INDENT);
    }
}

fn is_json_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

fn write_head(out: &mut Vec<u8>, head: &RequestHead) {
    out.extend_from_slice(
        format!(
            "Handling {} {} request from {}\nHeaders:\n",
            head.method, head.path, head.remote_addr
        )
        .as_bytes(),
    );

    for name in head.headers.keys() {
        let values: Vec<Cow<'_, str>> = head
            .headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()))
            .collect();
        out.extend_from_slice(
            format!("\t{}:\t[{}]\n", canonical_header_name(name.as_str()), values.join(" ")).as_bytes(),
        );
    }
}

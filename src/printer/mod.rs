//! The request printer
//!
//! Turns each request into a human-readable record (summary line, headers,
//! body) and writes it to a [`RecordSink`]. JSON bodies are pretty-printed,
//! anything else is reproduced byte for byte.

pub mod format;
pub mod sink;

pub use format::{format_read_failure, format_record, render_body};
pub use sink::{MemorySink, RecordSink, StdoutSink};

use crate::http::{InboundRequest, RequestHead};
use std::fmt;
use std::io;
use std::sync::Arc;
use tracing::debug;

/// Stateless request printer shared by all listeners
#[derive(Clone)]
pub struct RequestPrinter {
    sink: Arc<dyn RecordSink>,
}

impl RequestPrinter {
    pub fn new(sink: impl RecordSink + 'static) -> Self {
        Self { sink: Arc::new(sink) }
    }

    /// Printer writing to standard output
    pub fn stdout() -> Self {
        Self::new(StdoutSink)
    }

    /// Prints one complete request as a single record
    pub fn print(&self, request: &InboundRequest) {
        debug!(
            addr = %request.remote_addr(),
            method = %request.method(),
            path = %request.path(),
            body_len = request.body.len(),
            "Printing request"
        );
        self.sink.emit(&format_record(request));
    }

    /// Writes a status line, such as the startup banner, in the record stream
    pub fn announce(&self, line: &str) {
        self.sink.emit(format!("{line}\n").as_bytes());
    }

    /// Prints the head of a request whose body could not be read, followed by a diagnostic
    pub fn print_read_failure(&self, head: &RequestHead, err: &io::Error) {
        debug!(addr = %head.remote_addr, error = %err, "Request body could not be read");
        self.sink.emit(&format_read_failure(head, err));
    }
}

impl Default for RequestPrinter {
    fn default() -> Self {
        Self::stdout()
    }
}

impl fmt::Debug for RequestPrinter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestPrinter").finish_non_exhaustive()
    }
}

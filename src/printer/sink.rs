use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::warn;

/// Destination for formatted request records.
///
/// Each call receives one complete record and must write it without letting
/// other records interleave with it.
pub trait RecordSink: Send + Sync {
    fn emit(&self, record: &[u8]);
}

/// Writes records to the process's standard output
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl StdoutSink {
    fn write(record: &[u8]) {
        let mut out = io::stdout().lock();
        if let Err(e) = out.write_all(record).and_then(|_| out.flush()) {
            warn!(error = %e, "Failed to write request record to stdout");
        }
    }
}

impl RecordSink for StdoutSink {
    /// On a multi-threaded runtime the blocking write hands the worker's
    /// other tasks to another thread first, so a slow stdout stalls only
    /// the connection that is printing.
    fn emit(&self, record: &[u8]) {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| Self::write(record))
            }
            _ => Self::write(record),
        }
    }
}

/// Keeps records in memory, for tests and embedding
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records emitted so far, in emission order
    pub fn records(&self) -> Vec<Vec<u8>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Records decoded as text, replacing invalid UTF-8
    pub fn records_lossy(&self) -> Vec<String> {
        self.records()
            .iter()
            .map(|r| String::from_utf8_lossy(r).into_owned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for MemorySink {
    fn emit(&self, record: &[u8]) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.to_vec());
    }
}

use super::{StreamConfig, StreamProtocol};
use crate::http::serve_connection;
use crate::printer::RequestPrinter;
use crate::{PrinterError, Result};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn, Instrument};

/// Generic stream-based request printing server
///
/// Works with any protocol that implements `StreamProtocol`, i.e. plain TCP
/// or TLS. Every connection is served on its own task.
///
/// # Examples
///
/// ```no_run
/// use reqprinter::stream::{StreamConfig, StreamServer};
/// use reqprinter::tcp::TcpProtocol;
/// use reqprinter::RequestPrinter;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = StreamConfig::new("127.0.0.1:8080".parse()?);
///     let server = StreamServer::new(TcpProtocol, config, RequestPrinter::stdout());
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct StreamServer<P: StreamProtocol> {
    protocol: Arc<P>,
    config: StreamConfig,
    printer: RequestPrinter,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl<P: StreamProtocol> StreamServer<P> {
    /// Creates a new server; nothing is bound until [`bind`](Self::bind) or [`run`](Self::run)
    pub fn new(protocol: P, config: StreamConfig, printer: RequestPrinter) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        Self {
            protocol: Arc::new(protocol),
            config,
            printer,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Returns a sender that stops the accept loop when signalled
    pub fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Binds the listening socket
    pub async fn bind(self) -> Result<BoundServer<P>> {
        let addr = self.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| PrinterError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        info!(scheme = self.protocol.scheme(), address = %local_addr, "Listening");

        Ok(BoundServer {
            listener,
            local_addr,
            protocol: self.protocol,
            config: self.config,
            printer: self.printer,
            shutdown_tx: self.shutdown_tx,
            shutdown_rx: self.shutdown_rx,
        })
    }

    /// Binds and serves until shut down or a fatal listener error
    pub async fn run(self) -> Result<()> {
        self.bind().await?.serve().await
    }
}

/// A server whose socket is bound but which is not accepting yet
pub struct BoundServer<P: StreamProtocol> {
    listener: TcpListener,
    local_addr: SocketAddr,
    protocol: Arc<P>,
    config: StreamConfig,
    printer: RequestPrinter,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl<P: StreamProtocol> BoundServer<P> {
    /// The address actually bound, useful when the configured port was 0
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Accepts connections until shut down.
    ///
    /// Errors that concern a single incoming connection are logged and
    /// skipped. Running out of descriptors or memory pauses accepting with
    /// a growing delay. Any other accept error is returned and is fatal for
    /// the listener.
    pub async fn serve(mut self) -> Result<()> {
        let scheme = self.protocol.scheme();
        let mut backoff: Option<Duration> = None;

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            backoff = None;
                            debug!(%addr, scheme, "Accepted connection");

                            let protocol = self.protocol.clone();
                            let printer = self.printer.clone();
                            let buffer_size = self.config.buffer_size;
                            let span = tracing::info_span!("connection", %addr, scheme);

                            tokio::spawn(async move {
                                let result = handle_connection(protocol, stream, addr, printer, buffer_size)
                                    .instrument(span)
                                    .await;
                                match result {
                                    Ok(()) => debug!(%addr, "Connection closed"),
                                    Err(e) => warn!(%addr, error = %e, "Error handling connection"),
                                }
                            });
                        }
                        Err(e) => match classify_accept_error(&e) {
                            AcceptFailure::Connection => {
                                warn!(error = %e, "Failed to accept connection");
                            }
                            AcceptFailure::Exhausted => {
                                let delay = next_backoff(backoff);
                                backoff = Some(delay);
                                warn!(scheme, error = %e, ?delay, "Out of resources accepting connection, retrying");
                                tokio::select! {
                                    _ = tokio::time::sleep(delay) => {}
                                    _ = self.shutdown_rx.recv() => {
                                        info!(scheme, "Received shutdown signal, stopping listener");
                                        return Ok(());
                                    }
                                }
                            }
                            AcceptFailure::Fatal => {
                                error!(scheme, error = %e, "Listener failed");
                                return Err(e.into());
                            }
                        },
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    info!(scheme, "Received shutdown signal, stopping listener");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Handles a single accepted connection
async fn handle_connection<P: StreamProtocol>(
    protocol: Arc<P>,
    stream: TcpStream,
    addr: SocketAddr,
    printer: RequestPrinter,
    buffer_size: usize,
) -> Result<()> {
    let stream = protocol.establish(stream).await?;
    serve_connection(stream, addr, &printer, buffer_size).await
}

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// How the accept loop treats a failed `accept`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptFailure {
    /// Concerns one incoming connection only; skip it
    Connection,
    /// The process ran out of descriptors or memory; wait and retry
    Exhausted,
    /// The listener itself is broken
    Fatal,
}

fn classify_accept_error(e: &io::Error) -> AcceptFailure {
    if is_resource_exhaustion(e) {
        return AcceptFailure::Exhausted;
    }
    match e.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::TimedOut => AcceptFailure::Connection,
        _ => AcceptFailure::Fatal,
    }
}

#[cfg(unix)]
fn is_resource_exhaustion(e: &io::Error) -> bool {
    matches!(
        e.raw_os_error(),
        Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
    ) || e.kind() == io::ErrorKind::OutOfMemory
}

#[cfg(not(unix))]
fn is_resource_exhaustion(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::OutOfMemory
}

/// Doubles the previous delay, from 5ms up to 1s
fn next_backoff(previous: Option<Duration>) -> Duration {
    match previous {
        None => ACCEPT_BACKOFF_MIN,
        Some(delay) => (delay * 2).min(ACCEPT_BACKOFF_MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_descriptor_exhaustion_is_retried() {
        for errno in [libc::EMFILE, libc::ENFILE, libc::ENOBUFS, libc::ENOMEM] {
            let err = io::Error::from_raw_os_error(errno);
            assert_eq!(classify_accept_error(&err), AcceptFailure::Exhausted, "errno {errno}");
        }
    }

    #[test]
    fn test_per_connection_errors_are_skipped() {
        for kind in [io::ErrorKind::ConnectionAborted, io::ErrorKind::ConnectionReset, io::ErrorKind::Interrupted] {
            assert_eq!(classify_accept_error(&io::Error::from(kind)), AcceptFailure::Connection);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_other_errors_are_fatal() {
        let err = io::Error::from_raw_os_error(libc::EBADF);
        assert_eq!(classify_accept_error(&err), AcceptFailure::Fatal);
        assert_eq!(
            classify_accept_error(&io::Error::from(io::ErrorKind::PermissionDenied)),
            AcceptFailure::Fatal
        );
    }

    #[test]
    fn test_backoff_doubles_up_to_one_second() {
        let mut delay = None;
        let mut seen = Vec::new();
        for _ in 0..10 {
            let next = next_backoff(delay);
            seen.push(next);
            delay = Some(next);
        }
        assert_eq!(seen[0], Duration::from_millis(5));
        assert_eq!(seen[1], Duration::from_millis(10));
        assert_eq!(seen[7], Duration::from_millis(640));
        assert_eq!(seen[8], Duration::from_secs(1));
        assert_eq!(seen[9], Duration::from_secs(1));
    }
}

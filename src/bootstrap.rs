//! Dual listener bootstrap
//!
//! Brings up the plaintext and TLS listeners with one shared printer and
//! keeps the process on them. The two listeners share one failure domain:
//! when either stops, the other is told to stop and the error is returned.

use crate::printer::RequestPrinter;
use crate::stream::{BoundServer, StreamConfig};
use crate::tcp::{HttpServer, TcpProtocol};
use crate::tls::{HttpsServer, TlsConfig, TlsProtocol};
use crate::{PrinterError, Result};
use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Port of the plaintext listener
pub const HTTP_PORT: u16 = 8080;
/// Port of the TLS listener
pub const HTTPS_PORT: u16 = 8443;

/// Process-wide listener configuration, fixed at startup
#[derive(Debug, Clone)]
pub struct Settings {
    pub http: StreamConfig,
    pub https: StreamConfig,
    pub tls: TlsConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            http: StreamConfig::new(SocketAddr::from((Ipv4Addr::UNSPECIFIED, HTTP_PORT))),
            https: StreamConfig::new(SocketAddr::from((Ipv4Addr::UNSPECIFIED, HTTPS_PORT))),
            tls: TlsConfig::default(),
        }
    }
}

/// Both listeners, bound and ready to serve
pub struct DualListener {
    http: BoundServer<TcpProtocol>,
    https: BoundServer<TlsProtocol>,
}

impl DualListener {
    /// Loads the TLS key pair, then binds both listeners.
    ///
    /// The key pair is loaded first so that a bad certificate fails startup
    /// before either port is taken.
    pub async fn bind(settings: Settings, printer: RequestPrinter) -> Result<Self> {
        let tls = TlsProtocol::from_config(&settings.tls)?;

        let http = HttpServer::new(TcpProtocol, settings.http, printer.clone()).bind().await?;
        let https = HttpsServer::new(tls, settings.https, printer).bind().await?;

        Ok(Self { http, https })
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http.local_addr()
    }

    pub fn https_addr(&self) -> SocketAddr {
        self.https.local_addr()
    }

    /// Line announcing the bound ports
    pub fn banner(&self) -> String {
        format!(
            "Listening on port {} (http) and {} (https)",
            self.http_addr().port(),
            self.https_addr().port()
        )
    }

    /// Serves on both listeners until one of them stops; never returns `Ok`
    pub async fn serve(self) -> Result<()> {
        let stops = vec![self.http.shutdown_signal(), self.https.shutdown_signal()];
        let listeners = [
            ("http", Box::pin(self.http.serve()) as ListenerFuture),
            ("https", Box::pin(self.https.serve()) as ListenerFuture),
        ];
        supervise(listeners, stops).await
    }
}

type ListenerFuture = std::pin::Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Runs the listeners as independent tasks and waits for the first to finish.
///
/// Whatever the first one returns, every listener is signalled to stop and
/// awaited. A listener that stopped cleanly is still reported as an error.
async fn supervise<const N: usize>(
    listeners: [(&'static str, ListenerFuture); N],
    stops: Vec<broadcast::Sender<()>>,
) -> Result<()> {
    let mut tasks = JoinSet::new();
    for (scheme, listener) in listeners {
        tasks.spawn(async move { (scheme, listener.await) });
    }

    let outcome = match tasks.join_next().await {
        Some(Ok((scheme, Ok(())))) => Err(PrinterError::ListenerExited(scheme)),
        Some(Ok((scheme, Err(e)))) => {
            error!(scheme, error = %e, "Listener failed");
            Err(e)
        }
        Some(Err(join_error)) => Err(PrinterError::Io(io::Error::from(join_error))),
        None => Err(PrinterError::ListenerExited("unknown")),
    };

    for stop in &stops {
        let _ = stop.send(());
    }
    while tasks.join_next().await.is_some() {}

    outcome
}

/// Starts the request printer on both listeners and blocks until one fails
pub async fn run(settings: Settings, printer: RequestPrinter) -> Result<()> {
    let listeners = DualListener::bind(settings, printer.clone()).await?;

    printer.announce(&listeners.banner());
    info!(http = %listeners.http_addr(), https = %listeners.https_addr(), "Request printer started");

    listeners.serve().await
}

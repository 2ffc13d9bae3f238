use color_eyre::eyre::{Context, Result};
use reqprinter::bootstrap::DualListener;
use reqprinter::stream::StreamConfig;
use reqprinter::{MemorySink, PrinterError, RequestPrinter, Settings, TlsConfig};
use rustls::pki_types::ServerName;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsConnector;

/// Self-signed `localhost` key pair written to a temporary directory
struct Fixture {
    dir: TempDir,
    cert_pem: String,
}

impl Fixture {
    fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()])?;
        let tls = TlsConfig::in_dir(dir.path());
        std::fs::write(&tls.cert_path, cert.pem())?;
        std::fs::write(&tls.key_path, key_pair.serialize_pem())?;
        Ok(Self {
            dir,
            cert_pem: cert.pem(),
        })
    }

    fn settings(&self) -> Settings {
        loopback_settings(self.dir.path())
    }

    fn connector(&self) -> Result<TlsConnector> {
        let mut roots = rustls::RootCertStore::empty();
        for cert in rustls_pemfile::certs(&mut self.cert_pem.as_bytes()) {
            roots.add(cert?)?;
        }
        let config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
        Ok(TlsConnector::from(Arc::new(config)))
    }
}

fn loopback_settings(tls_dir: &Path) -> Settings {
    Settings {
        http: StreamConfig::new("127.0.0.1:0".parse().unwrap()),
        https: StreamConfig::new("127.0.0.1:0".parse().unwrap()),
        tls: TlsConfig::in_dir(tls_dir),
    }
}

/// Sends one request that asks the server to close, returns the raw response
async fn round_trip<S>(mut stream: S, request: &[u8]) -> Result<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(request).await.context("write request")?;
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .context("response timed out")?
        .context("read response")?;
    Ok(String::from_utf8_lossy(&response).into_owned())
}

async fn https_round_trip(connector: &TlsConnector, addr: SocketAddr, request: &[u8]) -> Result<String> {
    let tcp = TcpStream::connect(addr).await?;
    let tls = connector
        .connect(ServerName::try_from("localhost")?, tcp)
        .await
        .context("TLS handshake")?;
    round_trip(tls, request).await
}

async fn http_round_trip(addr: SocketAddr, request: &[u8]) -> Result<String> {
    round_trip(TcpStream::connect(addr).await?, request).await
}

#[tokio::test]
async fn test_json_post_is_pretty_printed() -> Result<()> {
    let fixture = Fixture::new()?;
    let sink = MemorySink::new();
    let listeners = DualListener::bind(fixture.settings(), RequestPrinter::new(sink.clone())).await?;
    let addr = listeners.http_addr();
    let server = tokio::spawn(listeners.serve());

    let response = http_round_trip(
        addr,
        b"POST /foo HTTP/1.1\r\nHost: localhost\r\nX-Test: v1\r\nContent-Length: 17\r\nConnection: close\r\n\r\n{\"a\":1,\"b\":[2,3]}",
    )
    .await?;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));

    let records = sink.records_lossy();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert!(record.starts_with("Handling POST /foo request from 127.0.0.1:"));
    assert!(record.contains("\tX-Test:\t[v1]\n"));
    assert!(record.contains(
        "=== Start of body ===\n{\n  \"a\": 1,\n  \"b\": [\n    2,\n    3\n  ]\n}\n=== End of body ===\n\n"
    ));

    server.abort();
    Ok(())
}

#[tokio::test]
async fn test_plain_text_get_is_verbatim() -> Result<()> {
    let fixture = Fixture::new()?;
    let sink = MemorySink::new();
    let listeners = DualListener::bind(fixture.settings(), RequestPrinter::new(sink.clone())).await?;
    let addr = listeners.http_addr();
    let server = tokio::spawn(listeners.serve());

    http_round_trip(addr, b"GET / HTTP/1.1\r\nContent-Length: 8\r\nConnection: close\r\n\r\nnot-json").await?;

    let records = sink.records_lossy();
    assert_eq!(records.len(), 1);
    assert!(records[0].starts_with("Handling GET / request from"));
    assert!(records[0].contains("=== Start of body ===\nnot-json\n=== End of body ==="));

    server.abort();
    Ok(())
}

#[tokio::test]
async fn test_chunked_upload_over_https() -> Result<()> {
    let fixture = Fixture::new()?;
    let connector = fixture.connector()?;
    let sink = MemorySink::new();
    let listeners = DualListener::bind(fixture.settings(), RequestPrinter::new(sink.clone())).await?;
    let addr = listeners.https_addr();
    let server = tokio::spawn(listeners.serve());

    let response = https_round_trip(
        &connector,
        addr,
        b"PATCH /chunks HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n\
          6\r\n{\"k\":\r\n4\r\n\"v\"}\r\n0\r\n\r\n",
    )
    .await?;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));

    let records = sink.records_lossy();
    assert_eq!(records.len(), 1);
    assert!(records[0].starts_with("Handling PATCH /chunks request from"));
    assert!(records[0].contains("\tTransfer-Encoding:\t[chunked]\n"));
    assert!(records[0].contains("=== Start of body ===\n{\n  \"k\": \"v\"\n}\n=== End of body ==="));

    server.abort();
    Ok(())
}

#[tokio::test]
async fn test_concurrent_requests_on_both_listeners() -> Result<()> {
    let fixture = Fixture::new()?;
    let connector = fixture.connector()?;
    let sink = MemorySink::new();
    let listeners = DualListener::bind(fixture.settings(), RequestPrinter::new(sink.clone())).await?;
    let (http_addr, https_addr) = (listeners.http_addr(), listeners.https_addr());
    let server = tokio::spawn(listeners.serve());

    let per_listener = 8;
    let mut handles = Vec::new();
    for i in 0..per_listener {
        let body = format!("{{\"client\":{i},\"payload\":\"{}\"}}", "x".repeat(512));
        let request = format!(
            "POST /plain/{i} HTTP/1.1\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        handles.push(tokio::spawn(async move { http_round_trip(http_addr, request.as_bytes()).await }));

        let connector = connector.clone();
        let request = format!(
            "PUT /tls/{i} HTTP/1.1\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        handles.push(tokio::spawn(async move {
            https_round_trip(&connector, https_addr, request.as_bytes()).await
        }));
    }

    for handle in handles {
        let response = handle.await??;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "unexpected response: {response}");
    }

    let records = sink.records_lossy();
    assert_eq!(records.len(), per_listener * 2);
    for record in &records {
        assert!(record.starts_with("Handling "));
        assert_eq!(record.matches("Handling ").count(), 1);
        assert_eq!(record.matches("=== Start of body ===").count(), 1);
        assert!(record.ends_with("}\n=== End of body ===\n\n"));
    }
    for i in 0..per_listener {
        assert!(records.iter().any(|r| r.contains(&format!("POST /plain/{i} request"))));
        assert!(records.iter().any(|r| r.contains(&format!("PUT /tls/{i} request"))));
    }

    server.abort();
    Ok(())
}

/// Picks a currently free loopback port
async fn free_port() -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    Ok(listener.local_addr()?)
}

#[tokio::test]
async fn test_missing_certificate_fails_before_binding() -> Result<()> {
    let empty = TempDir::new()?;
    let http_addr = free_port().await?;
    let https_addr = free_port().await?;
    let settings = Settings {
        http: StreamConfig::new(http_addr),
        https: StreamConfig::new(https_addr),
        tls: TlsConfig::in_dir(empty.path()),
    };
    let cert_path = settings.tls.cert_path.clone();

    let sink = MemorySink::new();
    match reqprinter::bootstrap::run(settings, RequestPrinter::new(sink.clone())).await {
        Err(PrinterError::Tls { path, .. }) => assert_eq!(path, cert_path),
        Err(e) => panic!("expected TLS error, got {e}"),
        Ok(()) => panic!("startup should fail without a certificate"),
    }
    assert!(sink.is_empty(), "banner printed despite failed startup");

    // Neither port was taken
    drop(TcpListener::bind(http_addr).await?);
    drop(TcpListener::bind(https_addr).await?);
    Ok(())
}

#[tokio::test]
async fn test_occupied_tls_port_is_fatal() -> Result<()> {
    let fixture = Fixture::new()?;
    let occupied = TcpListener::bind("127.0.0.1:0").await?;
    let mut settings = fixture.settings();
    settings.https = StreamConfig::new(occupied.local_addr()?);

    let sink = MemorySink::new();
    match reqprinter::bootstrap::run(settings, RequestPrinter::new(sink.clone())).await {
        Err(PrinterError::Bind { addr, .. }) => assert_eq!(addr, occupied.local_addr()?),
        other => panic!("expected bind error, got {other:?}"),
    }
    assert!(sink.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_banner_follows_successful_startup() -> Result<()> {
    let fixture = Fixture::new()?;
    let sink = MemorySink::new();
    let server = tokio::spawn(reqprinter::bootstrap::run(
        fixture.settings(),
        RequestPrinter::new(sink.clone()),
    ));

    tokio::time::timeout(Duration::from_secs(5), async {
        while sink.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .context("banner never printed")?;

    let records = sink.records_lossy();
    assert_eq!(records.len(), 1);
    assert!(records[0].starts_with("Listening on port "));
    assert!(records[0].ends_with(" (https)\n"));

    server.abort();
    Ok(())
}

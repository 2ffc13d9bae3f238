use super::config::TlsConfig;
use crate::{PrinterError, Result};
use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Builds the rustls server configuration from the key pair on disk.
///
/// Errors name the file at fault.
pub fn load_server_config(config: &TlsConfig) -> Result<Arc<ServerConfig>> {
    let certs = load_certificates(&config.cert_path)?;
    let key = load_private_key(&config.key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    // alpn_protocols stays empty: any client offer is accepted and the
    // connection speaks HTTP/1.1 whatever the client proposed.
    let server_config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| tls_error(&config.cert_path, e))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| tls_error(&config.key_path, format!("key does not fit certificate: {e}")))?;

    debug!(cert = %config.cert_path.display(), key = %config.key_path.display(), "Loaded TLS key pair");
    Ok(Arc::new(server_config))
}

fn tls_error(path: &Path, message: impl ToString) -> PrinterError {
    PrinterError::Tls {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| tls_error(path, e))
}

/// Parse PEM certificates into rustls format
fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let pem = read_pem(path)?;
    let certs = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| tls_error(path, format!("failed to parse certificates: {e}")))?;

    if certs.is_empty() {
        return Err(tls_error(path, "no certificates found in PEM"));
    }
    Ok(certs)
}

/// Parse the first PEM private key into rustls format
fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let pem = read_pem(path)?;
    let mut reader = pem.as_slice();

    loop {
        match rustls_pemfile::read_one(&mut reader)
            .map_err(|e| tls_error(path, format!("failed to parse private key: {e}")))?
        {
            Some(rustls_pemfile::Item::Pkcs1Key(key)) => return Ok(key.into()),
            Some(rustls_pemfile::Item::Pkcs8Key(key)) => return Ok(key.into()),
            Some(rustls_pemfile::Item::Sec1Key(key)) => return Ok(key.into()),
            None => break,
            _ => {}
        }
    }

    Err(tls_error(path, "no valid private key found in PEM"))
}

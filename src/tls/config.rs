use std::path::{Path, PathBuf};

/// File name of the PEM certificate chain
pub const TLS_CERT_FILE: &str = "server.crt";
/// File name of the PEM private key
pub const TLS_KEY_FILE: &str = "server.key";

/// Directory holding this crate's sources, where the key pair is looked up by default
pub fn source_dir() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR"))
}

/// Location of the TLS key pair
///
/// # Examples
///
/// ```
/// use reqprinter::tls::TlsConfig;
///
/// let config = TlsConfig::in_dir("/etc/reqprinter");
/// assert!(config.cert_path.ends_with("server.crt"));
/// assert!(config.key_path.ends_with("server.key"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM file with the certificate chain, leaf first
    pub cert_path: PathBuf,
    /// PEM file with the private key (PKCS#1, PKCS#8 or SEC1)
    pub key_path: PathBuf,
}

impl TlsConfig {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }

    /// `server.crt` and `server.key` inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(TLS_CERT_FILE), dir.join(TLS_KEY_FILE))
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self::in_dir(source_dir())
    }
}

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

use rustls::{
    pki_types::{CertificateDer, PrivateKeyDer},
    ServerConfig,
};

use crate::errors::{StartError::Tls, ServerError};

#[cfg(not(any(feature = "__rustls_aws_lc_rs", feature = "__rustls_ring")))]
compile_error!("A rustls crypto provider must be enabled: rustls-provider or __rustls_ring");

/// Certificate and private key files for a TLS accept path.
///
/// Both paths are always non-empty: the only way to obtain a `TlsFiles`
/// is [`TlsFiles::select`], which refuses partial credentials.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TlsFiles {
    cert: PathBuf,
    key: PathBuf,
}

impl TlsFiles {
    /// Picks the TLS path when both certificate and key are given.
    ///
    /// Returns `None` when either path is empty; callers fall back to the
    /// plaintext path instead of failing.
    pub fn select(cert: impl AsRef<Path>, key: impl AsRef<Path>) -> Option<TlsFiles> {
        let cert = cert.as_ref();
        let key = key.as_ref();
        if cert
            .as_os_str()
            .is_empty()
            || key
                .as_os_str()
                .is_empty()
        {
            return None;
        }

        Some(TlsFiles { cert: cert.to_path_buf(), key: key.to_path_buf() })
    }

    pub fn cert(&self) -> &Path {
        &self.cert
    }

    pub fn key(&self) -> &Path {
        &self.key
    }
}

pub struct TlsFactory {}

impl TlsFactory {
    /// Loads PEM certificate chain and key into a rustls server config.
    pub fn create_tls_config(
        files: &TlsFiles,
        alpn_protocols: Vec<Vec<u8>>,
    ) -> Result<ServerConfig, ServerError> {
        #[cfg(feature = "__rustls_aws_lc_rs")]
        let provider = rustls::crypto::aws_lc_rs::default_provider();
        #[cfg(all(feature = "__rustls_ring", not(feature = "__rustls_aws_lc_rs")))]
        let provider = rustls::crypto::ring::default_provider();

        let chain = load_certs(files.cert())?;
        let key = load_key(files.key())?;

        let mut tls_config = ServerConfig::builder_with_provider(Arc::new(provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| Tls(e.to_string()))?
            .with_no_client_auth()
            .with_single_cert(chain, key)
            .map_err(|e| Tls(format!("Failed to create certified key: {}", e)))?;

        tls_config.alpn_protocols = alpn_protocols;

        Ok(tls_config)
    }
}

fn open(path: &Path) -> Result<BufReader<File>, ServerError> {
    let file = File::open(path).map_err(|e| Tls(format!("{}: {}", path.display(), e)))?;
    Ok(BufReader::new(file))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ServerError> {
    let mut reader = open(path)?;
    let chain = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Tls(format!("Failed to parse certificate: {}", e)))?;

    if chain.is_empty() {
        return Err(Tls(format!("No certificate found in {}", path.display())).into());
    }

    Ok(chain)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, ServerError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| Tls(format!("Failed to parse private key: {}", e)))?
        .ok_or_else(|| Tls(format!("No private key found in {}", path.display())).into())
}

//! Configuration builders and types for vetis-ctx.
//!
//! # Examples
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use vetis_ctx::config::{Protocol, ServerConfig};
//!
//! let config = ServerConfig::builder()
//!     .interface("127.0.0.1")
//!     .port(8443)
//!     .protocol(Protocol::Http1)
//!     .shutdown_timeout(Duration::from_secs(10))
//!     .cert("server.crt")
//!     .key("server.key")
//!     .build()?;
//! ```

use std::{
    fs,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Deserializer};

use crate::{
    errors::{ConfigError, ServerError},
    server::tls::TlsFiles,
};

pub(crate) const DEFAULT_PORT: u16 = 8080;
pub(crate) const DEFAULT_INTERFACE: &str = "0.0.0.0";
pub(crate) const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) const fn default_protocol() -> Protocol {
    cfg_if::cfg_if! {
        if #[cfg(feature = "http1")] {
            Protocol::Http1
        } else {
            Protocol::Http2
        }
    }
}

/// Supported HTTP protocols.
///
/// Only protocols enabled through crate features are available.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[cfg(feature = "http1")]
    /// HTTP/1.1 protocol
    Http1,
    #[cfg(feature = "http2")]
    /// HTTP/2 protocol
    Http2,
}

impl Protocol {
    pub(crate) fn alpn(&self) -> Vec<Vec<u8>> {
        match self {
            #[cfg(feature = "http1")]
            Protocol::Http1 => vec![b"http/1.1".to_vec()],
            #[cfg(feature = "http2")]
            Protocol::Http2 => vec![b"h2".to_vec()],
        }
    }
}

/// Builder for creating `ServerConfig` instances.
///
/// # Examples
///
/// ```rust,ignore
/// use vetis_ctx::config::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .port(8080)
///     .interface("127.0.0.1")
///     .build()?;
/// ```
#[derive(Clone)]
pub struct ServerConfigBuilder {
    interface: String,
    port: u16,
    protocol: Protocol,
    shutdown_timeout: Duration,
    cert: Option<PathBuf>,
    key: Option<PathBuf>,
}

impl ServerConfigBuilder {
    /// Sets the network interface to bind to.
    ///
    /// Common values:
    /// - "0.0.0.0" - All interfaces
    /// - "127.0.0.1" - Localhost only
    /// - "::1" - IPv6 localhost
    pub fn interface(mut self, interface: &str) -> Self {
        self.interface = interface.to_string();
        self
    }

    /// Sets the port number to bind to.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the HTTP protocol served on accepted connections.
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Sets how long a graceful stop may take once shutdown is requested.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets the PEM certificate chain file.
    pub fn cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.cert = Some(path.into());
        self
    }

    /// Sets the PEM private key file.
    pub fn key(mut self, path: impl Into<PathBuf>) -> Self {
        self.key = Some(path.into());
        self
    }

    /// Creates the `ServerConfig`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Interface` if the interface is empty.
    pub fn build(self) -> Result<ServerConfig, ServerError> {
        if self
            .interface
            .trim()
            .is_empty()
        {
            return Err(ConfigError::Interface("interface is empty".to_string()).into());
        }

        Ok(ServerConfig {
            interface: self.interface,
            port: self.port,
            protocol: self.protocol,
            shutdown_timeout: self.shutdown_timeout,
            cert: self.cert,
            key: self.key,
        })
    }
}

/// Server configuration.
///
/// Holds where to listen, which protocol to speak, the TLS material and
/// how long a graceful stop is allowed to take. Can be built in code or
/// loaded from a YAML file:
///
/// ```yaml
/// interface: 127.0.0.1
/// port: 8443
/// protocol: http1
/// shutdown_timeout: 10
/// cert: /etc/vetis/server.crt
/// key: /etc/vetis/server.key
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    interface: String,
    port: u16,
    protocol: Protocol,
    #[serde(deserialize_with = "deserialize_secs")]
    shutdown_timeout: Duration,
    cert: Option<PathBuf>,
    key: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            interface: DEFAULT_INTERFACE.to_string(),
            port: DEFAULT_PORT,
            protocol: default_protocol(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            cert: None,
            key: None,
        }
    }
}

impl ServerConfig {
    /// Creates a new `ServerConfigBuilder` with default settings.
    ///
    /// Default values:
    /// - interface: "0.0.0.0"
    /// - port: 8080
    /// - protocol: HTTP1 (if available)
    /// - shutdown_timeout: 30 seconds
    /// - no TLS material
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            interface: DEFAULT_INTERFACE.to_string(),
            port: DEFAULT_PORT,
            protocol: default_protocol(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            cert: None,
            key: None,
        }
    }

    /// Loads a configuration from a YAML file.
    ///
    /// Missing keys take their default values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<ServerConfig, ServerError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::File(format!("{}: {}", path.display(), e)))?;

        Self::from_yaml(&content)
    }

    /// Parses a configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<ServerConfig, ServerError> {
        let config = serde_yaml_ng::from_str::<ServerConfig>(content)
            .map_err(|e| ConfigError::File(e.to_string()))?;

        if config
            .interface
            .trim()
            .is_empty()
        {
            return Err(ConfigError::Interface("interface is empty".to_string()).into());
        }

        Ok(config)
    }

    /// Returns the network interface.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Returns the port number.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the HTTP protocol.
    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// Returns the graceful stop timeout.
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Returns the certificate path, if any.
    pub fn cert(&self) -> Option<&Path> {
        self.cert
            .as_deref()
    }

    /// Returns the private key path, if any.
    pub fn key(&self) -> Option<&Path> {
        self.key
            .as_deref()
    }

    /// Returns the TLS files when both certificate and key are set.
    pub fn tls(&self) -> Option<TlsFiles> {
        TlsFiles::select(
            self.cert()
                .unwrap_or(Path::new("")),
            self.key()
                .unwrap_or(Path::new("")),
        )
    }

    /// Resolves the address to bind to.
    ///
    /// Interfaces that parse as neither IPv4 nor IPv6 fall back to all
    /// IPv4 interfaces.
    pub fn socket_addr(&self) -> SocketAddr {
        if let Ok(ip) = self
            .interface
            .parse::<Ipv4Addr>()
        {
            SocketAddr::from((ip, self.port))
        } else if let Ok(ip) = self
            .interface
            .parse::<Ipv6Addr>()
        {
            SocketAddr::from((ip, self.port))
        } else {
            SocketAddr::from(([0, 0, 0, 0], self.port))
        }
    }
}

fn deserialize_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

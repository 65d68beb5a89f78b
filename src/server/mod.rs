//! Server handle capability and its hyper-based implementation.
//!
//! # Modules
//!
//! - [`deadline`]: Bound passed down to a graceful stop
//! - [`http`]: HTTP/1 and HTTP/2 server implementing [`Server`]
//! - [`tls`]: TLS credential selection and loading
//!
//! # Examples
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vetis_ctx::{
//!     config::ServerConfig,
//!     server::http::{handler_fn, HttpServer},
//! };
//!
//! let config = ServerConfig::builder()
//!     .port(8080)
//!     .build()?;
//!
//! let server = Arc::new(HttpServer::new(config, handler_fn(|_request| async move {
//!     Ok(http::Response::new(http_body_util::Full::new(bytes::Bytes::from("Hello"))))
//! })));
//! ```

use std::future::Future;

use crate::errors::ServerError;

pub mod deadline;
pub mod http;
pub mod tls;

pub use deadline::Deadline;
pub use tls::TlsFiles;

/// Trait for servers driven by the lifecycle runner.
///
/// The accept methods block until the server fails or is shut down. A
/// server that was shut down ends its accept loop with
/// [`ServerError::Closed`], including accept calls made after `shutdown`
/// already ran.
///
/// `shutdown` may be called while an accept method is running on another
/// task. It stops accepting new connections, waits for in-flight work and
/// must give up once `deadline` expires.
pub trait Server: Send + Sync + 'static {
    /// Pre-bound acceptor used by the `serve` variants.
    type Listener: Send + 'static;

    /// Binds the configured address and accepts plaintext connections.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails or the accept loop stops.
    fn listen_and_serve(&self) -> impl Future<Output = Result<(), ServerError>> + Send;

    /// Binds the configured address and accepts TLS connections.
    fn listen_and_serve_tls(
        &self,
        tls: TlsFiles,
    ) -> impl Future<Output = Result<(), ServerError>> + Send;

    /// Accepts plaintext connections on `listener`.
    fn serve(
        &self,
        listener: Self::Listener,
    ) -> impl Future<Output = Result<(), ServerError>> + Send;

    /// Accepts TLS connections on `listener`.
    fn serve_tls(
        &self,
        listener: Self::Listener,
        tls: TlsFiles,
    ) -> impl Future<Output = Result<(), ServerError>> + Send;

    /// Stops the server gracefully.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::DeadlineExceeded`] if in-flight work did not
    /// finish before `deadline`.
    fn shutdown(&self, deadline: Deadline) -> impl Future<Output = Result<(), ServerError>> + Send;
}

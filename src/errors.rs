//! Error handling types for vetis-ctx.
//!
//! Every outcome of a lifecycle run is a `Result<(), ServerError>`. The
//! runner never filters or rewrites errors: whatever the accept loop or the
//! graceful stop returned is what the caller sees.
//!
//! # Examples
//!
//! ```rust,ignore
//! use vetis_ctx::errors::ServerError;
//!
//! match vetis_ctx::run(signal, server, timeout).await {
//!     Ok(()) => println!("Stopped gracefully"),
//!     Err(err) if err.is_closed() => println!("Server closed"),
//!     Err(ServerError::Bind(addr)) => eprintln!("Failed to bind: {}", addr),
//!     Err(other) => eprintln!("Error: {}", other),
//! }
//! ```

use thiserror::Error;

/// Main error type for vetis-ctx operations.
///
/// `Closed` is the distinguished "closed normally" sentinel returned by an
/// accept loop that ended because the server was shut down. It is reported
/// like any other failure; use [`ServerError::is_closed`] to tell it apart.
#[derive(Debug, Error, PartialEq)]
pub enum ServerError {
    /// The server was shut down and its accept loop ended
    #[error("Server closed")]
    Closed,

    /// Failed to bind to a network address
    #[error("Failed to bind to address: {0}")]
    Bind(String),

    /// The accept loop failed with a non-recoverable error
    #[error("Failed to accept connection: {0}")]
    Accept(String),

    /// Server startup errors
    #[error("Failed to start server: {0}")]
    Start(#[from] StartError),

    /// Server shutdown errors
    #[error("Failed to stop server: {0}")]
    Stop(String),

    /// Graceful stop did not finish before its deadline
    #[error("Shutdown deadline exceeded")]
    DeadlineExceeded,

    /// Request handler errors
    #[error("Handler error: {0}")]
    Handler(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ServerError {
    /// Returns `true` for the "closed normally" sentinel.
    pub fn is_closed(&self) -> bool {
        matches!(self, ServerError::Closed)
    }
}

/// Server startup errors.
///
/// These errors occur before the accept loop takes its first connection,
/// typically while loading TLS material.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StartError {
    /// TLS/SSL initialization errors
    #[error("Tls initialization: {0}")]
    Tls(String),
}

/// Configuration-related errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// Invalid listening interface
    #[error("Invalid interface: {0}")]
    Interface(String),

    /// Config file could not be read or parsed
    #[error("Invalid config file: {0}")]
    File(String),
}

//! # vetis-ctx
//!
//! **Run a server until a cancellation signal fires, then stop it gracefully
//! within a bounded time.**
//!
//! vetis-ctx ties the lifecycle of a long-running server to a
//! [`CancellationToken`]. The server either serves until it fails on its own,
//! or, once the token is cancelled, is asked to stop gracefully and given a
//! fixed amount of time to do so. Either way the caller gets exactly one
//! result back.
//!
//! ## Entry points
//!
//! | Function | Listener | TLS |
//! |---|---|---|
//! | [`run`] | bound by the server | no |
//! | [`run_tls`] | bound by the server | when cert and key are both non-empty |
//! | [`serve`] | supplied by the caller | no |
//! | [`serve_tls`] | supplied by the caller | when cert and key are both non-empty |
//!
//! ## Basic Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vetis_ctx::{
//!     config::ServerConfig,
//!     server::http::{handler_fn, HttpServer},
//!     shutdown_signal,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder()
//!         .interface("127.0.0.1")
//!         .port(8080)
//!         .build()?;
//!
//!     let server = Arc::new(HttpServer::new(
//!         config,
//!         handler_fn(|_request| async move {
//!             Ok(http::Response::new(http_body_util::Full::new(bytes::Bytes::from("Hello, World!"))))
//!         }),
//!     ));
//!
//!     match vetis_ctx::run(shutdown_signal(), server, std::time::Duration::from_secs(10)).await {
//!         Err(e) if !e.is_closed() => Err(e.into()),
//!         _ => Ok(()),
//!     }
//! }
//! ```
//!
//! ## Errors
//!
//! Errors are passed through untouched. When the server stops on its own
//! because it was closed, the [`ServerError::Closed`] sentinel is returned
//! like any other error; callers decide whether it counts as success.
//!
//! ## Modules
//!
//! - [`config`]: Server configuration builder and YAML loading
//! - [`errors`]: Error types
//! - [`lifecycle`]: The cancellation-driven runner
//! - [`server`]: Server handle trait and the hyper-based implementation

#[cfg(not(any(feature = "http1", feature = "http2")))]
compile_error!("At least one of http1 or http2 must be enabled!");

pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod server;
pub mod signal;
mod tests;

pub use errors::ServerError;
pub use lifecycle::{run, run_tls, serve, serve_tls};
pub use signal::shutdown_signal;
pub use tokio_util::sync::CancellationToken;

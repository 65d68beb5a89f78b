//! Server lifecycle driven by a cancellation signal.
//!
//! Each entry point starts the server's accept loop on its own task, waits
//! until that task is running, and then waits for whichever comes first: the accept loop ending on its own, or
//! `signal` being cancelled. In the first case the accept loop's result is
//! returned as is, including [`ServerError::Closed`]. In the second case the
//! server is stopped gracefully within `timeout` and the result of that stop
//! is returned; whatever the accept loop returns afterwards is discarded.
//!
//! ```rust,ignore
//! use std::{sync::Arc, time::Duration};
//! use tokio_util::sync::CancellationToken;
//!
//! let signal = CancellationToken::new();
//! let server = Arc::new(HttpServer::new(config, handler));
//!
//! let stop = signal.clone();
//! tokio::spawn(async move {
//!     tokio::signal::ctrl_c().await.ok();
//!     stop.cancel();
//! });
//!
//! vetis_ctx::run(signal, server, Duration::from_secs(10)).await?;
//! ```

use std::{path::Path, sync::Arc, time::Duration};

use log::{debug, error, info};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::{
    errors::ServerError,
    server::{Deadline, Server, TlsFiles},
};

enum Accept<L> {
    Bind(Option<TlsFiles>),
    Listener(L, Option<TlsFiles>),
}

/// Runs `server` on its own bound address until it fails or `signal` fires.
///
/// # Errors
///
/// Returns the accept loop's error if it ends first (bind failures such as
/// "address in use", or the [`ServerError::Closed`] sentinel), otherwise
/// the result of the graceful stop.
pub async fn run<S: Server>(
    signal: CancellationToken,
    server: Arc<S>,
    timeout: Duration,
) -> Result<(), ServerError> {
    run_tls(signal, server, timeout, "", "").await
}

/// Like [`run`] but accepts TLS connections when both `cert` and `key`
/// are non-empty. Otherwise it serves plaintext, exactly as [`run`].
pub async fn run_tls<S: Server>(
    signal: CancellationToken,
    server: Arc<S>,
    timeout: Duration,
    cert: impl AsRef<Path>,
    key: impl AsRef<Path>,
) -> Result<(), ServerError> {
    let accept = Accept::Bind(TlsFiles::select(cert, key));
    drive(signal, server, timeout, accept).await
}

/// Like [`run`] but accepts on a caller-supplied listener instead of
/// binding a new one.
pub async fn serve<S: Server>(
    signal: CancellationToken,
    listener: S::Listener,
    server: Arc<S>,
    timeout: Duration,
) -> Result<(), ServerError> {
    serve_tls(signal, listener, server, timeout, "", "").await
}

/// Like [`serve`] but accepts TLS connections when both `cert` and `key`
/// are non-empty.
pub async fn serve_tls<S: Server>(
    signal: CancellationToken,
    listener: S::Listener,
    server: Arc<S>,
    timeout: Duration,
    cert: impl AsRef<Path>,
    key: impl AsRef<Path>,
) -> Result<(), ServerError> {
    let accept = Accept::Listener(listener, TlsFiles::select(cert, key));
    drive(signal, server, timeout, accept).await
}

async fn drive<S: Server>(
    signal: CancellationToken,
    server: Arc<S>,
    timeout: Duration,
    accept: Accept<S::Listener>,
) -> Result<(), ServerError> {
    // Capacity one: the accept task never waits on a reader that is gone.
    let (result_tx, result_rx) = oneshot::channel();
    let (started_tx, started_rx) = oneshot::channel::<()>();

    let accept_server = server.clone();
    tokio::spawn(async move {
        let _ = started_tx.send(());

        let result = match accept {
            Accept::Bind(None) => {
                accept_server
                    .listen_and_serve()
                    .await
            }
            Accept::Bind(Some(tls)) => {
                accept_server
                    .listen_and_serve_tls(tls)
                    .await
            }
            Accept::Listener(listener, None) => {
                accept_server
                    .serve(listener)
                    .await
            }
            Accept::Listener(listener, Some(tls)) => {
                accept_server
                    .serve_tls(listener, tls)
                    .await
            }
        };

        if let Err(result) = result_tx.send(result) {
            debug!("Accept loop ended after shutdown: {:?}", result);
        }
    });

    // The accept task signals right before it calls into the server, so the
    // race only begins once the accept loop has been started.
    if started_rx.await.is_err() {
        debug!("Accept task ended before it started");
    }

    // Both the oneshot and the token keep their state, so neither event
    // can be missed once the race begins.
    tokio::select! {
        biased;

        result = result_rx => {
            let result = result.unwrap_or_else(|_| {
                Err(ServerError::Accept("accept loop ended without a result".to_string()))
            });
            match &result {
                Ok(()) => info!("Server stopped"),
                Err(ServerError::Closed) => info!("Server closed"),
                Err(e) => error!("Server stopped: {}", e),
            }
            result
        }
        _ = signal.cancelled() => {
            info!("Shutdown requested, stopping server within {:?}", timeout);
            let result = server
                .shutdown(Deadline::after(timeout))
                .await;
            if let Err(e) = &result {
                error!("Failed to stop server: {}", e);
            }
            result
        }
    }
}

use std::{convert::Infallible, future::Future, io, pin::Pin, sync::Arc};

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use hyper::{body::Incoming, service::service_fn};
use log::{debug, error, info, warn};

#[cfg(feature = "http1")]
use hyper::server::conn::http1;
#[cfg(feature = "http2")]
use hyper::server::conn::http2;
#[cfg(feature = "http2")]
use hyper_util::rt::TokioExecutor;

use hyper_util::rt::TokioIo;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
};
use tokio_rustls::TlsAcceptor;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    config::{Protocol, ServerConfig},
    errors::ServerError,
    lifecycle,
    server::{
        tls::{TlsFactory, TlsFiles},
        Deadline, Server,
    },
};

pub type HandlerResult = Result<Response<Full<Bytes>>, ServerError>;

/// Type alias for boxed handler closures.
///
/// An async function taking the incoming request and producing a response
/// or an error. Errors are logged and answered with a 500.
pub type BoxedHandlerClosure = Box<
    dyn Fn(Request<Incoming>) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>> + Send + Sync,
>;

/// Creates a handler closure from an async function.
///
/// # Examples
///
/// ```rust,ignore
/// use vetis_ctx::server::http::handler_fn;
///
/// let handler = handler_fn(|_request| async move {
///     Ok(http::Response::new(http_body_util::Full::new(bytes::Bytes::from("Hello!"))))
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> BoxedHandlerClosure
where
    F: Fn(Request<Incoming>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Box::new(move |req| Box::pin(f(req)))
}

/// HTTP server implementing [`Server`] on top of hyper.
///
/// Connections are served on their own tasks. Shutting the server down
/// stops every accept loop, asks each open connection to finish its
/// in-flight request and waits for them up to the given deadline. A
/// shut down server stays closed; later accept calls return
/// [`ServerError::Closed`].
pub struct HttpServer {
    config: ServerConfig,
    handler: Arc<BoxedHandlerClosure>,
    closed: CancellationToken,
    connections: TaskTracker,
}

impl HttpServer {
    pub fn new(config: ServerConfig, handler: BoxedHandlerClosure) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
            closed: CancellationToken::new(),
            connections: TaskTracker::new(),
        }
    }

    /// Returns `true` once shutdown has begun.
    pub fn is_closed(&self) -> bool {
        self.closed
            .is_cancelled()
    }

    /// Number of connections currently being served.
    pub fn active_connections(&self) -> usize {
        self.connections
            .len()
    }

    /// Runs the server until `signal` fires, using the configured shutdown
    /// timeout and TLS files.
    pub async fn run_until(self: Arc<Self>, signal: CancellationToken) -> Result<(), ServerError> {
        let timeout = self
            .config
            .shutdown_timeout();

        match self
            .config
            .tls()
        {
            Some(tls) => lifecycle::run_tls(signal, self, timeout, tls.cert(), tls.key()).await,
            None => lifecycle::run(signal, self, timeout).await,
        }
    }

    async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self
            .config
            .socket_addr();

        TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("{}: {}", addr, e)))
    }

    fn tls_acceptor(&self, tls: &TlsFiles) -> Result<TlsAcceptor, ServerError> {
        let alpn = self
            .config
            .protocol()
            .alpn();
        let tls_config = TlsFactory::create_tls_config(tls, alpn)?;
        Ok(TlsAcceptor::from(Arc::new(tls_config)))
    }

    async fn handle_connections(
        &self,
        listener: TcpListener,
        acceptor: Option<TlsAcceptor>,
    ) -> Result<(), ServerError> {
        if self.is_closed() {
            return Err(ServerError::Closed);
        }

        match listener.local_addr() {
            Ok(addr) => info!("Server listening on {}", addr),
            Err(e) => warn!("Server listening on unknown address: {}", e),
        }

        loop {
            let accepted = tokio::select! {
                biased;

                _ = self.closed.cancelled() => return Err(ServerError::Closed),
                accepted = listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(e) if is_connection_error(&e) => {
                    warn!("Cannot accept connection: {}", e);
                    continue;
                }
                Err(e) => return Err(ServerError::Accept(e.to_string())),
            };

            if let Err(e) = stream.set_nodelay(true) {
                warn!("Cannot set TCP_NODELAY for {}: {}", peer, e);
            }

            debug!("Accepted connection from {}", peer);

            let protocol = self
                .config
                .protocol()
                .clone();
            let handler = self
                .handler
                .clone();
            let closed = self
                .closed
                .clone();

            match acceptor.clone() {
                Some(acceptor) => {
                    self.connections
                        .spawn(async move {
                            let tls_stream = tokio::select! {
                                _ = closed.cancelled() => return,
                                tls_stream = acceptor.accept(stream) => tls_stream,
                            };

                            match tls_stream {
                                Ok(tls_stream) => {
                                    serve_connection(protocol, TokioIo::new(tls_stream), handler, closed)
                                        .await
                                }
                                Err(e) => error!("TLS handshake with {} failed: {}", peer, e),
                            }
                        });
                }
                None => {
                    self.connections
                        .spawn(serve_connection(protocol, TokioIo::new(stream), handler, closed));
                }
            }
        }
    }
}

impl Server for HttpServer {
    type Listener = TcpListener;

    async fn listen_and_serve(&self) -> Result<(), ServerError> {
        if self.is_closed() {
            return Err(ServerError::Closed);
        }

        let listener = self
            .bind()
            .await?;
        self.handle_connections(listener, None)
            .await
    }

    async fn listen_and_serve_tls(&self, tls: TlsFiles) -> Result<(), ServerError> {
        if self.is_closed() {
            return Err(ServerError::Closed);
        }

        let acceptor = self.tls_acceptor(&tls)?;
        let listener = self
            .bind()
            .await?;
        self.handle_connections(listener, Some(acceptor))
            .await
    }

    async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        if self.is_closed() {
            return Err(ServerError::Closed);
        }

        self.handle_connections(listener, None)
            .await
    }

    async fn serve_tls(&self, listener: TcpListener, tls: TlsFiles) -> Result<(), ServerError> {
        if self.is_closed() {
            return Err(ServerError::Closed);
        }

        let acceptor = self.tls_acceptor(&tls)?;
        self.handle_connections(listener, Some(acceptor))
            .await
    }

    async fn shutdown(&self, deadline: Deadline) -> Result<(), ServerError> {
        info!(
            "Stopping server, waiting up to {:?} for {} connection(s)",
            deadline.timeout(),
            self.active_connections()
        );

        self.closed
            .cancel();
        self.connections
            .close();

        deadline
            .run(async {
                self.connections
                    .wait()
                    .await;
                Ok(())
            })
            .await
    }
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

pub fn static_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}

async fn respond(handler: &BoxedHandlerClosure, request: Request<Incoming>) -> Response<Full<Bytes>> {
    match handler(request).await {
        Ok(response) => response,
        Err(e) => {
            error!("Handler error: {}", e);
            static_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

async fn serve_connection<T>(
    protocol: Protocol,
    io: TokioIo<T>,
    handler: Arc<BoxedHandlerClosure>,
    closed: CancellationToken,
) where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |request| {
        let handler = handler.clone();
        async move { Ok::<_, Infallible>(respond(&handler, request).await) }
    });

    let mut draining = false;

    match protocol {
        #[cfg(feature = "http1")]
        Protocol::Http1 => {
            let connection = http1::Builder::new().serve_connection(io, service);
            tokio::pin!(connection);

            loop {
                tokio::select! {
                    result = connection.as_mut() => {
                        if let Err(err) = result {
                            error!("Error serving connection: {:?}", err);
                        }
                        break;
                    }
                    _ = closed.cancelled(), if !draining => {
                        connection
                            .as_mut()
                            .graceful_shutdown();
                        draining = true;
                    }
                }
            }
        }
        #[cfg(feature = "http2")]
        Protocol::Http2 => {
            let connection =
                http2::Builder::new(TokioExecutor::new()).serve_connection(io, service);
            tokio::pin!(connection);

            loop {
                tokio::select! {
                    result = connection.as_mut() => {
                        if let Err(err) = result {
                            error!("Error serving connection: {:?}", err);
                        }
                        break;
                    }
                    _ = closed.cancelled(), if !draining => {
                        connection
                            .as_mut()
                            .graceful_shutdown();
                        draining = true;
                    }
                }
            }
        }
    }
}

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

use tokio_util::sync::CancellationToken;

use crate::{
    errors::ServerError,
    lifecycle::{run, run_tls, serve, serve_tls},
    server::{Deadline, Server, TlsFiles},
};

#[derive(Clone, Debug, PartialEq)]
enum AcceptPath {
    Plain,
    Tls(TlsFiles),
    Listener(String),
    ListenerTls(String, TlsFiles),
}

enum Stop {
    Succeed,
    Fail(&'static str),
    Hang,
}

struct MockServer {
    immediate: Mutex<Option<ServerError>>,
    after_close: Mutex<Option<ServerError>>,
    stop: Stop,
    closed: CancellationToken,
    accept_done: CancellationToken,
    path: Mutex<Option<AcceptPath>>,
    events: Mutex<Vec<&'static str>>,
    stop_calls: AtomicUsize,
}

impl MockServer {
    fn new(stop: Stop) -> Self {
        Self {
            immediate: Mutex::new(None),
            after_close: Mutex::new(None),
            stop,
            closed: CancellationToken::new(),
            accept_done: CancellationToken::new(),
            path: Mutex::new(None),
            events: Mutex::new(Vec::new()),
            stop_calls: AtomicUsize::new(0),
        }
    }

    fn failing_on_accept(self, error: ServerError) -> Self {
        *self
            .immediate
            .lock()
            .unwrap() = Some(error);
        self
    }

    fn failing_after_close(self, error: ServerError) -> Self {
        *self
            .after_close
            .lock()
            .unwrap() = Some(error);
        self
    }

    fn path(&self) -> Option<AcceptPath> {
        self.path
            .lock()
            .unwrap()
            .clone()
    }

    fn events(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .clone()
    }

    fn record(&self, event: &'static str) {
        self.events
            .lock()
            .unwrap()
            .push(event);
    }

    fn stop_calls(&self) -> usize {
        self.stop_calls
            .load(Ordering::SeqCst)
    }

    async fn accept(&self, path: AcceptPath) -> Result<(), ServerError> {
        self.record("accept");
        *self
            .path
            .lock()
            .unwrap() = Some(path);

        let immediate = self
            .immediate
            .lock()
            .unwrap()
            .take();

        let result = match immediate {
            Some(error) => Err(error),
            None => {
                self.closed
                    .cancelled()
                    .await;
                let late = self
                    .after_close
                    .lock()
                    .unwrap()
                    .take();
                Err(late.unwrap_or(ServerError::Closed))
            }
        };

        self.accept_done
            .cancel();
        result
    }
}

impl Server for MockServer {
    type Listener = String;

    async fn listen_and_serve(&self) -> Result<(), ServerError> {
        self.accept(AcceptPath::Plain)
            .await
    }

    async fn listen_and_serve_tls(&self, tls: TlsFiles) -> Result<(), ServerError> {
        self.accept(AcceptPath::Tls(tls))
            .await
    }

    async fn serve(&self, listener: String) -> Result<(), ServerError> {
        self.accept(AcceptPath::Listener(listener))
            .await
    }

    async fn serve_tls(&self, listener: String, tls: TlsFiles) -> Result<(), ServerError> {
        self.accept(AcceptPath::ListenerTls(listener, tls))
            .await
    }

    async fn shutdown(&self, deadline: Deadline) -> Result<(), ServerError> {
        self.record("stop");
        self.stop_calls
            .fetch_add(1, Ordering::SeqCst);
        self.closed
            .cancel();

        match self.stop {
            Stop::Succeed => Ok(()),
            Stop::Fail(message) => Err(ServerError::Stop(message.to_string())),
            Stop::Hang => {
                deadline
                    .run(std::future::pending::<Result<(), ServerError>>())
                    .await
            }
        }
    }
}

fn cancel_after(signal: &CancellationToken, delay: Duration) {
    let signal = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        signal.cancel();
    });
}

async fn accept_finished(server: &MockServer) -> bool {
    tokio::time::timeout(
        Duration::from_secs(1),
        server
            .accept_done
            .cancelled(),
    )
    .await
    .is_ok()
}

#[tokio::test]
async fn test_accept_failure_wins_without_stopping() {
    let server = Arc::new(
        MockServer::new(Stop::Succeed)
            .failing_on_accept(ServerError::Bind("127.0.0.1:80: address in use".to_string())),
    );
    let signal = CancellationToken::new();

    let result = run(signal, server.clone(), Duration::from_secs(1)).await;

    assert_eq!(result, Err(ServerError::Bind("127.0.0.1:80: address in use".to_string())));
    assert_eq!(server.stop_calls(), 0);
}

#[tokio::test]
async fn test_closed_sentinel_is_returned_verbatim() {
    let server = Arc::new(MockServer::new(Stop::Succeed).failing_on_accept(ServerError::Closed));
    let signal = CancellationToken::new();

    let result = run(signal, server.clone(), Duration::from_secs(1)).await;

    assert_eq!(result, Err(ServerError::Closed));
    assert!(result
        .unwrap_err()
        .is_closed());
    assert_eq!(server.stop_calls(), 0);
}

#[tokio::test]
async fn test_signal_stops_server_gracefully() {
    let server = Arc::new(MockServer::new(Stop::Succeed));
    let signal = CancellationToken::new();
    cancel_after(&signal, Duration::from_millis(50));

    let result = run(signal, server.clone(), Duration::from_secs(1)).await;

    assert_eq!(result, Ok(()));
    assert_eq!(server.stop_calls(), 1);
    assert!(accept_finished(&server).await);
}

#[tokio::test]
async fn test_already_cancelled_signal_is_not_missed() {
    let server = Arc::new(MockServer::new(Stop::Succeed));
    let signal = CancellationToken::new();
    signal.cancel();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        run(signal, server.clone(), Duration::from_secs(1)),
    )
    .await
    .expect("runner must not wait on the accept loop");

    assert_eq!(result, Ok(()));
    assert_eq!(server.stop_calls(), 1);
    assert!(accept_finished(&server).await);
}

#[tokio::test]
async fn test_accept_starts_before_stop() {
    let server = Arc::new(MockServer::new(Stop::Succeed));
    let signal = CancellationToken::new();
    signal.cancel();

    let result = run(signal, server.clone(), Duration::from_secs(1)).await;

    assert_eq!(result, Ok(()));
    assert!(accept_finished(&server).await);
    assert_eq!(server.events(), vec!["accept", "stop"]);
}

#[tokio::test]
async fn test_immediate_accept_failure_wins_over_cancelled_signal() {
    let server = Arc::new(
        MockServer::new(Stop::Succeed)
            .failing_on_accept(ServerError::Bind("127.0.0.1:80: permission denied".to_string())),
    );
    let signal = CancellationToken::new();
    signal.cancel();

    let result = run(signal, server.clone(), Duration::from_secs(1)).await;

    assert_eq!(result, Err(ServerError::Bind("127.0.0.1:80: permission denied".to_string())));
    assert_eq!(server.stop_calls(), 0);
    assert_eq!(server.events(), vec!["accept"]);
}

#[tokio::test]
async fn test_stop_result_wins_over_late_accept_failure() {
    let server = Arc::new(
        MockServer::new(Stop::Succeed)
            .failing_after_close(ServerError::Accept("listener torn down".to_string())),
    );
    let signal = CancellationToken::new();
    cancel_after(&signal, Duration::from_millis(20));

    let result = run(signal, server.clone(), Duration::from_secs(1)).await;

    assert_eq!(result, Ok(()));
    assert!(accept_finished(&server).await);
}

#[tokio::test]
async fn test_stop_failure_is_reported() {
    let server = Arc::new(MockServer::new(Stop::Fail("listener close failed")));
    let signal = CancellationToken::new();
    cancel_after(&signal, Duration::from_millis(20));

    let result = run(signal, server.clone(), Duration::from_secs(1)).await;

    assert_eq!(result, Err(ServerError::Stop("listener close failed".to_string())));
    assert_eq!(server.stop_calls(), 1);
}

#[tokio::test]
async fn test_stop_is_bounded_by_timeout() {
    let server = Arc::new(MockServer::new(Stop::Hang));
    let signal = CancellationToken::new();
    signal.cancel();

    let started = Instant::now();
    let result = run(signal, server.clone(), Duration::from_millis(200)).await;
    let elapsed = started.elapsed();

    assert_eq!(result, Err(ServerError::DeadlineExceeded));
    assert!(elapsed >= Duration::from_millis(200), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(2), "returned after {:?}", elapsed);
}

#[tokio::test]
async fn test_zero_timeout() {
    let server = Arc::new(MockServer::new(Stop::Succeed));
    let signal = CancellationToken::new();
    signal.cancel();
    assert_eq!(run(signal, server, Duration::ZERO).await, Ok(()));

    let server = Arc::new(MockServer::new(Stop::Hang));
    let signal = CancellationToken::new();
    signal.cancel();
    assert_eq!(run(signal, server, Duration::ZERO).await, Err(ServerError::DeadlineExceeded));
}

#[tokio::test]
async fn test_unbounded_timeout_stops_gracefully() {
    let server = Arc::new(MockServer::new(Stop::Succeed));
    let signal = CancellationToken::new();
    signal.cancel();

    let result = tokio::spawn(run(signal, server.clone(), Duration::MAX)).await;

    assert_eq!(result.ok(), Some(Ok(())));
    assert_eq!(server.stop_calls(), 1);
}

#[tokio::test]
async fn test_tls_requires_both_credentials() {
    let cases = [
        ("cert.pem", "key.pem", AcceptPath::Tls(TlsFiles::select("cert.pem", "key.pem").unwrap())),
        ("cert.pem", "", AcceptPath::Plain),
        ("", "key.pem", AcceptPath::Plain),
        ("", "", AcceptPath::Plain),
    ];

    for (cert, key, expected) in cases {
        let server = Arc::new(MockServer::new(Stop::Succeed).failing_on_accept(ServerError::Closed));
        let signal = CancellationToken::new();

        let result = run_tls(signal, server.clone(), Duration::from_secs(1), cert, key).await;

        assert_eq!(result, Err(ServerError::Closed));
        assert_eq!(server.path(), Some(expected), "cert={:?} key={:?}", cert, key);
    }
}

#[tokio::test]
async fn test_serve_uses_given_listener() {
    let server = Arc::new(MockServer::new(Stop::Succeed));
    let signal = CancellationToken::new();
    cancel_after(&signal, Duration::from_millis(20));

    let result = serve(signal, "given".to_string(), server.clone(), Duration::from_secs(1)).await;

    assert_eq!(result, Ok(()));
    assert_eq!(server.path(), Some(AcceptPath::Listener("given".to_string())));
}

#[tokio::test]
async fn test_serve_tls_gating() {
    let server = Arc::new(MockServer::new(Stop::Succeed).failing_on_accept(ServerError::Closed));
    let signal = CancellationToken::new();
    let result = serve_tls(
        signal,
        "given".to_string(),
        server.clone(),
        Duration::from_secs(1),
        "cert.pem",
        "key.pem",
    )
    .await;
    assert_eq!(result, Err(ServerError::Closed));
    assert_eq!(
        server.path(),
        Some(AcceptPath::ListenerTls(
            "given".to_string(),
            TlsFiles::select("cert.pem", "key.pem").unwrap()
        ))
    );

    let server = Arc::new(MockServer::new(Stop::Succeed).failing_on_accept(ServerError::Closed));
    let signal = CancellationToken::new();
    let result =
        serve_tls(signal, "given".to_string(), server.clone(), Duration::from_secs(1), "", "key.pem")
            .await;
    assert_eq!(result, Err(ServerError::Closed));
    assert_eq!(server.path(), Some(AcceptPath::Listener("given".to_string())));
}

#[tokio::test]
async fn test_deadline() {
    let deadline = Deadline::after(Duration::from_secs(60));
    assert_eq!(deadline.timeout(), Duration::from_secs(60));
    assert!(!deadline.is_elapsed());
    assert!(deadline.remaining() <= Duration::from_secs(60));

    let expired = Deadline::after(Duration::ZERO);
    assert!(expired.is_elapsed());
    assert_eq!(expired.remaining(), Duration::ZERO);
    assert_eq!(expired.run(async { Ok(7) }).await, Ok(7));

    let unbounded = Deadline::after(Duration::MAX);
    assert_eq!(unbounded.timeout(), Duration::MAX);
    assert!(!unbounded.is_elapsed());
    assert!(unbounded.remaining() > Duration::from_secs(86400 * 365));
}

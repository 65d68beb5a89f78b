use std::{future::Future, time::Duration};

use tokio::time::{timeout_at, Instant};

use crate::errors::ServerError;

/// Bound handed to [`Server::shutdown`](crate::server::Server::shutdown).
///
/// A deadline is derived fresh from the shutdown timeout every time a
/// graceful stop begins. It owns no timer: the timer is created inside
/// [`Deadline::run`] and dropped with it, whichever way that call returns.
///
/// A zero timeout yields an already expired deadline. The bounded future
/// is still polled once, so a stop that completes without waiting reports
/// success and anything that has to wait reports
/// [`ServerError::DeadlineExceeded`].
///
/// A timeout too large to be represented as an instant is clamped to a
/// point about thirty years ahead, which leaves the stop effectively
/// unbounded.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    timeout: Duration,
    at: Instant,
}

impl Deadline {
    /// Creates a deadline expiring `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        let now = Instant::now();
        let at = now
            .checked_add(timeout)
            .unwrap_or_else(|| far_future(now));
        Self { timeout, at }
    }

    /// Returns the timeout this deadline was derived from.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.at
            .saturating_duration_since(Instant::now())
    }

    /// Returns `true` once the deadline has passed.
    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Drives `future` until it completes or the deadline expires.
    pub async fn run<F, T>(self, future: F) -> Result<T, ServerError>
    where
        F: Future<Output = Result<T, ServerError>>,
    {
        match timeout_at(self.at, future).await {
            Ok(result) => result,
            Err(_) => Err(ServerError::DeadlineExceeded),
        }
    }
}

fn far_future(now: Instant) -> Instant {
    now + Duration::from_secs(86400 * 365 * 30)
}

// src/cancel.rs

//! Cancellation tokens for `execute`.
//!
//! A [`CancelToken`] is supplied by the host and raced against the
//! child's completion with `tokio::select!`. The supervisor never
//! installs OS signal handlers itself; a host that wants Ctrl-C to kill
//! the child bridges `tokio::signal` to a token once, at process-wide
//! scope, and hands tokens out per run.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{sleep_until, Instant};

/// Fires the paired [`CancelToken`]. Dropping the handle without calling
/// [`cancel`](CancelHandle::cancel) leaves the token inert.
pub struct CancelHandle {
    tx: oneshot::Sender<()>,
}

impl CancelHandle {
    /// Signal cancellation. Consumes the handle; a token can only fire once.
    pub fn cancel(self) {
        let _ = self.tx.send(());
    }
}

enum Inner {
    Never,
    Deadline(Instant),
    Channel(oneshot::Receiver<()>),
}

/// One-shot cancellation signal observed by `Supervisor::execute`.
pub struct CancelToken {
    inner: Inner,
}

impl CancelToken {
    /// A token that never fires; `execute` runs to child completion.
    pub fn never() -> Self {
        Self { inner: Inner::Never }
    }

    /// A token that fires once `timeout` has elapsed, measured from now.
    pub fn deadline_in(timeout: Duration) -> Self {
        Self {
            inner: Inner::Deadline(Instant::now() + timeout),
        }
    }

    /// An explicit-abort token together with the handle that fires it.
    pub fn channel() -> (CancelHandle, CancelToken) {
        let (tx, rx) = oneshot::channel();
        (
            CancelHandle { tx },
            CancelToken {
                inner: Inner::Channel(rx),
            },
        )
    }

    /// Resolve when cancellation fires. Pends forever for `never()` and
    /// for a channel whose handle was dropped without cancelling, so a
    /// `select!` against the child's completion behaves as "no cancel".
    pub(crate) async fn fired(self) {
        match self.inner {
            Inner::Never => std::future::pending::<()>().await,
            Inner::Deadline(at) => sleep_until(at).await,
            Inner::Channel(rx) => match rx.await {
                Ok(()) => {}
                // Handle dropped without an explicit cancellation.
                Err(_) => std::future::pending::<()>().await,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn never_token_does_not_fire() {
        let res = timeout(Duration::from_millis(50), CancelToken::never().fired()).await;
        assert!(res.is_err(), "never() must not resolve");
    }

    #[tokio::test]
    async fn deadline_token_fires_after_timeout() {
        let token = CancelToken::deadline_in(Duration::from_millis(10));
        let res = timeout(Duration::from_secs(1), token.fired()).await;
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn channel_token_fires_on_cancel() {
        let (handle, token) = CancelToken::channel();
        handle.cancel();
        let res = timeout(Duration::from_secs(1), token.fired()).await;
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn dropped_handle_leaves_token_inert() {
        let (handle, token) = CancelToken::channel();
        drop(handle);
        let res = timeout(Duration::from_millis(50), token.fired()).await;
        assert!(res.is_err(), "dropped handle must not count as cancellation");
    }
}

//! Cancellation signal and in-flight connection tracking.

use std::{
    future::pending,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::{watch, Notify};

/// Read side of the server-wide cancellation signal.
///
/// Every connection and the handler receive a clone. Once
/// [`ServerHandle::stop`](crate::ServerHandle::stop) (or the end of a
/// [`shutdown`](crate::ServerHandle::shutdown) drain) fires it, it stays
/// cancelled.
///
/// # Examples
/// ```
/// use nimble_http::{Cancellation, Context};
/// use std::time::Duration;
///
/// async fn slow(ctx: &mut Context, cancel: &Cancellation) -> std::io::Result<()> {
///     for chunk in ["a", "b", "c"] {
///         if cancel.is_cancelled() {
///             break;
///         }
///         ctx.response().write_body(chunk).await?;
///         tokio::time::sleep(Duration::from_millis(10)).await;
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

impl Cancellation {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once the signal fires.
    ///
    /// Never completes if the owning [`ServerHandle`](crate::ServerHandle)
    /// was dropped without stopping the server.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();

        let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            pending::<()>().await;
        }
    }
}

/// Write side of a [`Cancellation`].
#[derive(Debug)]
pub(crate) struct Trigger {
    tx: watch::Sender<bool>,
}

impl Trigger {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    #[inline]
    pub(crate) fn subscribe(&self) -> Cancellation {
        Cancellation {
            rx: self.tx.subscribe(),
        }
    }

    #[inline]
    pub(crate) fn fire(&self) {
        self.tx.send_replace(true);
    }
}

/// Counts live connection tasks so a shutdown can wait for them.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    active: AtomicUsize,
    idle: Notify,
}

impl Tracker {
    /// Registers a connection. It stays counted until the guard is dropped.
    #[inline]
    pub(crate) fn track(&self) -> ConnectionGuard {
        self.inner.active.fetch_add(1, Ordering::AcqRel);
        ConnectionGuard {
            inner: self.inner.clone(),
        }
    }

    #[inline]
    pub(crate) fn active(&self) -> usize {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Completes when no tracked connection is left.
    pub(crate) async fn drained(&self) {
        loop {
            let notified = self.inner.idle.notified();

            if self.active() == 0 {
                return;
            }

            notified.await;
        }
    }
}

/// Held by a connection task for its whole lifetime.
#[derive(Debug)]
pub(crate) struct ConnectionGuard {
    inner: Arc<TrackerInner>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.inner.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

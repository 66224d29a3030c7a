//! Request-scoped deadline and cancellation
//!
//! Every async trait method receives a [`Context`]. Long running work such as
//! polling a remote API must stop once the context is cancelled or its
//! deadline passes.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant};

/// Context carries the cancellation signal and optional deadline of one
/// provider operation. Cloning is cheap and clones share the same signal.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    done: watch::Receiver<bool>,
    done_tx: Arc<watch::Sender<bool>>,
}

impl Context {
    pub fn new() -> Self {
        let (done_tx, done_rx) = watch::channel(false);

        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                done: done_rx,
                done_tx: Arc::new(done_tx),
            }),
        }
    }

    /// Derives a child context bounded by `timeout`.
    ///
    /// The child keeps the earlier of its own and the parent's deadline and is
    /// cancelled as soon as the parent is. Cancelling the child leaves the
    /// parent untouched. Must be called from within a tokio runtime.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let requested = Instant::now() + timeout;
        let deadline = match self.inner.deadline {
            Some(parent) if parent < requested => parent,
            _ => requested,
        };

        let (done_tx, done_rx) = watch::channel(self.is_cancelled());
        let done_tx = Arc::new(done_tx);

        let watcher_tx = done_tx.clone();
        let mut parent = self.done();
        tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep_until(deadline) => {
                    tracing::debug!("context deadline reached");
                }
                _ = wait_for_cancel(&mut parent) => {}
                // every receiver is gone, nobody can observe the signal anymore
                _ = watcher_tx.closed() => return,
            }
            let _ = watcher_tx.send(true);
        });

        Self {
            inner: Arc::new(ContextInner {
                deadline: Some(deadline),
                done: done_rx,
                done_tx,
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline, `None` when the context has no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns a receiver that flips to `true` when work done on behalf of
    /// this context should stop
    pub fn done(&self) -> watch::Receiver<bool> {
        self.inner.done.clone()
    }

    /// Resolves once the context is cancelled. Never resolves for a context
    /// that is never cancelled.
    pub async fn cancelled(&self) {
        let mut done = self.done();
        wait_for_cancel(&mut done).await;
    }

    pub fn cancel(&self) {
        let _ = self.inner.done_tx.send(true);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_cancel(done: &mut watch::Receiver<bool>) {
    loop {
        if *done.borrow_and_update() {
            return;
        }
        if done.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

//! Cancellation and deadline propagation for task bodies.
//!
//! A [`Context`] is a cheap, cloneable handle. Children are finished whenever
//! their parent is, and a child's deadline is never later than its parent's.
//! Waiting is notification-driven: async waiters park on a
//! [`tokio::sync::Notify`] and a deadline timer, nothing polls.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::core::error::ContextError;

/// Cancellation and deadline scope passed to every task body.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    state: Mutex<ContextState>,
    notify: Notify,
}

struct ContextState {
    err: Option<ContextError>,
    children: Vec<Weak<ContextInner>>,
}

impl Context {
    /// Root context that never finishes on its own.
    #[must_use]
    pub fn background() -> Self {
        Self::from_parts(None, None)
    }

    /// Cancellable child inheriting this context's deadline.
    #[must_use]
    pub fn child(&self) -> Self {
        self.derive(self.inner.deadline)
    }

    /// Child that finishes with [`ContextError::DeadlineExceeded`] after `timeout`.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Child that finishes with [`ContextError::DeadlineExceeded`] at `deadline`,
    /// or earlier if this context's own deadline comes first.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let effective = match self.inner.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        self.derive(Some(effective))
    }

    /// Cancel this context and every descendant. Idempotent.
    pub fn cancel(&self) {
        self.inner.finish(ContextError::Canceled);
    }

    /// The deadline, if one applies.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// `None` while the context is live, otherwise why it finished.
    #[must_use]
    pub fn err(&self) -> Option<ContextError> {
        self.inner.err()
    }

    /// Whether the context has finished.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolve once the context finishes, returning the reason.
    pub async fn done(&self) -> ContextError {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(err) = self.err() {
                return err;
            }

            match self.inner.deadline {
                Some(deadline) => {
                    let sleep = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline));
                    tokio::select! {
                        () = &mut notified => {}
                        () = sleep => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    fn from_parts(deadline: Option<Instant>, err: Option<ContextError>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                deadline,
                state: Mutex::new(ContextState {
                    err,
                    children: Vec::new(),
                }),
                notify: Notify::new(),
            }),
        }
    }

    fn derive(&self, deadline: Option<Instant>) -> Self {
        // Evaluate the parent's deadline before taking its lock; err() may latch it.
        let parent_err = self.err();
        let child = Self::from_parts(deadline, parent_err);
        if parent_err.is_none() {
            let mut state = self.inner.state.lock();
            match state.err {
                Some(err) => {
                    drop(state);
                    child.inner.finish(err);
                }
                None => {
                    state.children.retain(|c| c.strong_count() > 0);
                    state.children.push(Arc::downgrade(&child.inner));
                }
            }
        }
        child
    }
}

impl ContextInner {
    fn err(&self) -> Option<ContextError> {
        if let Some(err) = self.state.lock().err {
            return Some(err);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.finish(ContextError::DeadlineExceeded);
                self.state.lock().err
            }
            _ => None,
        }
    }

    fn finish(&self, err: ContextError) {
        let children = {
            let mut state = self.state.lock();
            if state.err.is_some() {
                return;
            }
            state.err = Some(err);
            std::mem::take(&mut state.children)
        };
        self.notify.notify_waiters();
        for child in children.iter().filter_map(Weak::upgrade) {
            child.finish(err);
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.inner.deadline)
            .field("err", &self.inner.state.lock().err)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_is_live() {
        let ctx = Context::background();
        assert!(ctx.err().is_none());
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn test_cancel_propagates_to_descendants() {
        let root = Context::background();
        let child = root.child();
        let grandchild = child.child();

        root.cancel();
        assert_eq!(child.err(), Some(ContextError::Canceled));
        assert_eq!(grandchild.err(), Some(ContextError::Canceled));
    }

    #[test]
    fn test_child_cancel_does_not_touch_parent() {
        let root = Context::background();
        let child = root.child();
        child.cancel();
        child.cancel();
        assert!(root.err().is_none());
        assert_eq!(child.err(), Some(ContextError::Canceled));
    }

    #[test]
    fn test_child_of_finished_parent_is_finished() {
        let root = Context::background();
        root.cancel();
        assert_eq!(root.child().err(), Some(ContextError::Canceled));
    }

    #[test]
    fn test_deadline_is_latched() {
        let ctx = Context::background().with_timeout(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
        ctx.cancel();
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[test]
    fn test_child_deadline_never_exceeds_parent() {
        let parent = Context::background().with_timeout(Duration::from_millis(50));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[tokio::test]
    async fn test_done_resolves_on_cancel() {
        let ctx = Context::background();
        let waiter = ctx.clone();
        let handle = tokio::spawn(async move { waiter.done().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        ctx.cancel();
        assert_eq!(handle.await.unwrap(), ContextError::Canceled);
    }

    #[tokio::test]
    async fn test_done_resolves_on_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        assert_eq!(ctx.done().await, ContextError::DeadlineExceeded);
    }
}

//! Composable cooperative cancellation.
//!
//! A [`CancelScope`] is a shared "stop" flag that can be awaited. Scopes form a
//! tree: a child observes its own flag and every ancestor's, while cancelling a
//! child leaves its parent untouched.
//!
//! ```text
//! request scope ──child──▶ run scope ──clone──▶ work unit
//!      ▲                        ▲
//!  client gone             deadline / settled
//! ```

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::watch;

#[derive(Clone)]
pub struct CancelScope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    flag: watch::Sender<bool>,
    parent: Option<CancelScope>,
}

impl CancelScope {
    /// A root scope with no ancestors.
    #[must_use]
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<CancelScope>) -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            inner: Arc::new(ScopeInner { flag, parent }),
        }
    }

    /// Derive a scope that is cancelled when `self` is.
    #[must_use]
    pub fn child(&self) -> Self {
        Self::with_parent(Some(self.clone()))
    }

    /// Cancel this scope and all of its descendants. Idempotent.
    pub fn cancel(&self) {
        self.inner.flag.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        });
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.inner.flag.borrow()
            || self
                .inner
                .parent
                .as_ref()
                .is_some_and(CancelScope::is_cancelled)
    }

    /// Resolves once this scope or any ancestor is cancelled.
    ///
    /// Cancel-safe: dropping the future before it resolves has no effect.
    pub fn cancelled(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            match &self.inner.parent {
                None => self.own_cancelled().await,
                Some(parent) => {
                    tokio::select! {
                        () = self.own_cancelled() => {}
                        () = parent.cancelled() => {}
                    }
                }
            }
        })
    }

    async fn own_cancelled(&self) {
        let mut rx = self.inner.flag.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            // The sender lives in `self`, so the channel cannot close while we wait.
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Number of ancestors above this scope.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.inner.parent.as_ref();
        while let Some(scope) = current {
            depth += 1;
            current = scope.inner.parent.as_ref();
        }
        depth
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelScope")
            .field("cancelled", &self.is_cancelled())
            .field("depth", &self.depth())
            .finish()
    }
}

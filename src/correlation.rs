//! Scoped correlation-id propagation
//!
//! A correlation id groups every event produced while handling one
//! logical operation. The ambient value lives in a thread-scoped slot:
//! [`enter`] installs an id and returns a guard that restores the exact
//! prior value on drop, so nesting stays correct even when the caller's
//! own logic errors out.
//!
//! Bare thread-locals are wrong under a work-stealing runtime — a task
//! can resume on another thread after an await point. For async code,
//! [`Correlated::with_correlation`] wraps a future so the id is
//! re-entered on every poll and cleared on every suspension, the same
//! discipline `tracing::Instrument` applies to spans.

use pin_project_lite::pin_project;
use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

thread_local! {
    static CURRENT: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// The correlation id in effect for the current scope, if any
pub fn current() -> Option<String> {
    CURRENT.with(|slot| slot.borrow().clone())
}

/// Install `id` as the ambient correlation id
///
/// The returned guard restores the previous value (including "none")
/// when dropped. Guards must release in reverse entry order, which RAII
/// gives for free.
pub fn enter(id: impl Into<String>) -> CorrelationGuard {
    let prev = CURRENT.with(|slot| slot.replace(Some(id.into())));
    CorrelationGuard {
        prev,
        _not_send: PhantomData,
    }
}

/// Scope guard returned by [`enter`]
///
/// `!Send` on purpose: the slot is thread-scoped, so the guard must be
/// released on the thread that created it. Use
/// [`Correlated::with_correlation`] to carry an id across await points.
pub struct CorrelationGuard {
    prev: Option<String>,
    _not_send: PhantomData<*const ()>,
}

impl CorrelationGuard {
    /// Restore the prior ambient value now instead of at end of scope
    pub fn release(self) {}
}

impl Drop for CorrelationGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT.with(|slot| *slot.borrow_mut() = prev);
    }
}

impl std::fmt::Debug for CorrelationGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationGuard")
            .field("prev", &self.prev)
            .finish()
    }
}

pin_project! {
    /// Future wrapper that scopes a correlation id around every poll
    pub struct WithCorrelation<F> {
        #[pin]
        inner: F,
        id: String,
    }
}

impl<F: Future> Future for WithCorrelation<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _guard = enter(this.id.clone());
        this.inner.poll(cx)
    }
}

/// Extension trait attaching a correlation id to any future
pub trait Correlated: Future + Sized {
    /// Run this future with `id` as the ambient correlation id
    ///
    /// The id is visible to every [`current`] call made while the
    /// future is being polled, on whichever thread polls it.
    fn with_correlation(self, id: impl Into<String>) -> WithCorrelation<Self> {
        WithCorrelation {
            inner: self,
            id: id.into(),
        }
    }
}

impl<F: Future> Correlated for F {}

//! The handler environment's serialization lock and the callback guard built on it.
//!
//! Handler code may run under a lock external to the loop, in the manner of an interpreter
//! lock. Anything that calls into handler-owned state or releases it must hold that lock, even
//! on the loop thread, because running or dropping a handler callback can run handler cleanup
//! code.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::error;

/// The serialization lock of the handler environment.
///
/// The lock is reentrant: a handler already holding it may call back into code that takes it
/// again, for example when a deferred task is dropped on the handler's own thread.
#[derive(Clone, Default)]
pub struct HandlerLock {
    inner: Arc<ReentrantMutex<()>>,
}

impl HandlerLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the lock.
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.inner.lock();
        f()
    }

    /// Runs `f` while holding the lock, containing and logging a panic.
    ///
    /// Returns `None` if `f` panicked. Handler panics must never unwind into the engine's loop.
    pub fn run_guarded<T>(&self, context: &'static str, f: impl FnOnce() -> T) -> Option<T> {
        self.run(|| match catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => Some(value),
            Err(panic) => {
                error!(context, cause = panic_message(panic.as_ref()), "handler code panicked");
                None
            }
        })
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

impl fmt::Debug for HandlerLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerLock").field("locked", &self.is_locked()).finish()
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

/// A handler callback whose invocation and release both happen under the [`HandlerLock`].
///
/// The wrapper can be moved to and dropped on any thread; the drop always re-acquires the lock
/// before the callback is released.
pub(crate) struct SafeCallback<F> {
    callback: Option<F>,
    lock: HandlerLock,
}

impl<F> SafeCallback<F> {
    pub(crate) fn new(callback: F, lock: HandlerLock) -> Self {
        Self { callback: Some(callback), lock }
    }

    /// Invokes the callback under the lock. Returns `None` if it was already consumed or
    /// panicked.
    pub(crate) fn call<T>(&mut self, f: impl FnOnce(&mut F) -> T) -> Option<T> {
        let callback = self.callback.as_mut()?;
        self.lock.run_guarded("callback", || f(callback))
    }
}

impl<F: FnOnce()> SafeCallback<F> {
    /// Consumes and invokes the callback; later calls do nothing.
    pub(crate) fn call_once(&mut self) {
        if let Some(callback) = self.callback.take() {
            self.lock.run_guarded("callback", callback);
        }
    }
}

impl<F> Drop for SafeCallback<F> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            self.lock.run(move || drop(callback));
        }
    }
}

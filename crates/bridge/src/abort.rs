//! The one-way abort latch shared between a response handle, its deferred tasks and the engine.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Waker;

use futures::task::AtomicWaker;
use triomphe::Arc;

/// A reference-counted flag that only ever flips from `false` to `true`.
///
/// Once set, the native response behind it must not be touched again. The flag is read and
/// written atomically and never locked; setting it also wakes the task registered through
/// [`register`](Self::register), so a pending body read notices the abort.
#[derive(Clone)]
pub struct AbortFlag {
    inner: Arc<AbortState>,
}

struct AbortState {
    aborted: AtomicBool,
    waker: AtomicWaker,
}

impl AbortFlag {
    pub fn new() -> Self {
        Self { inner: Arc::new(AbortState { aborted: AtomicBool::new(false), waker: AtomicWaker::new() }) }
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.inner.aborted.load(Ordering::Acquire)
    }

    /// Sets the flag, returning true if this call is the one that flipped it.
    pub fn set(&self) -> bool {
        let flipped = !self.inner.aborted.swap(true, Ordering::AcqRel);
        if flipped {
            self.inner.waker.wake();
        }
        flipped
    }

    pub(crate) fn register(&self, waker: &Waker) {
        self.inner.waker.register(waker);
    }
}

impl Default for AbortFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AbortFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortFlag").field("aborted", &self.is_set()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn set_is_one_way() {
        let flag = AbortFlag::new();
        assert!(!flag.is_set());

        assert!(flag.set());
        assert!(flag.is_set());

        assert!(!flag.set());
        assert!(flag.is_set());
    }

    #[test]
    fn clones_share_state() {
        let flag = AbortFlag::new();
        let other = flag.clone();

        thread::spawn(move || other.set()).join().unwrap();

        assert!(flag.is_set());
    }

    #[test]
    fn only_one_setter_wins() {
        let flag = AbortFlag::new();
        let handles = (0..8)
            .map(|_| {
                let flag = flag.clone();
                thread::spawn(move || flag.set())
            })
            .collect::<Vec<_>>();

        let winners = handles.into_iter().map(|handle| handle.join().unwrap()).filter(|won| *won).count();
        assert_eq!(winners, 1);
    }
}

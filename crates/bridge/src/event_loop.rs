//! A reference loop thread for engines without a defer primitive of their own, and for tests.
//!
//! [`EventLoop`] owns one named thread draining a FIFO channel. Tasks run in submission order,
//! one at a time; a panicking task is logged and the loop carries on with the next one.

use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, warn};

use crate::engine::{DeferQueue, Task};
use crate::env::panic_message;

enum Command {
    Run(Task),
    Stop,
}

/// Submits tasks to an [`EventLoop`]; cheap to clone and usable from any thread.
#[derive(Clone, Debug)]
pub struct LoopHandle {
    sender: Sender<Command>,
    thread_id: ThreadId,
}

impl LoopHandle {
    /// Returns true when called from the loop thread itself.
    pub fn is_loop_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl DeferQueue for LoopHandle {
    fn defer(&self, task: Task) {
        if self.sender.send(Command::Run(task)).is_err() {
            warn!("event loop has stopped, deferred task dropped");
        }
    }
}

#[derive(Debug)]
pub struct EventLoop {
    handle: LoopHandle,
    thread: Option<JoinHandle<()>>,
}

impl EventLoop {
    /// Starts the loop on a new thread called `name`.
    ///
    /// # Errors
    ///
    /// Returns the error of [`thread::Builder::spawn`].
    pub fn spawn(name: impl Into<String>) -> io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let thread = thread::Builder::new().name(name.into()).spawn(move || run(&receiver))?;
        let handle = LoopHandle { sender, thread_id: thread.thread().id() };
        Ok(Self { handle, thread: Some(thread) })
    }

    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// The loop as a shared [`DeferQueue`], the form the dispatcher takes.
    pub fn queue(&self) -> Arc<dyn DeferQueue> {
        Arc::new(self.handle.clone())
    }

    /// Stops the loop after every task submitted so far has run, and waits for the thread.
    /// Tasks submitted afterwards are dropped.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        // a receiver that is already gone means the loop thread has exited
        let _ = self.handle.sender.send(Command::Stop);
        if self.handle.is_loop_thread() {
            return;
        }
        if thread.join().is_err() {
            error!("event loop thread panicked");
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(receiver: &Receiver<Command>) {
    debug!("event loop started");
    for command in receiver {
        match command {
            Command::Run(task) => {
                if let Err(panic) = catch_unwind(AssertUnwindSafe(task)) {
                    error!(cause = panic_message(panic.as_ref()), "deferred task panicked");
                }
            }
            Command::Stop => break,
        }
    }
    debug!("event loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_tasks_run_in_order_on_loop_thread() {
        let event_loop = EventLoop::spawn("test-loop").unwrap();
        let handle = event_loop.handle();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let seen = Arc::clone(&seen);
            let probe = handle.clone();
            handle.defer(Box::new(move || {
                assert!(probe.is_loop_thread());
                seen.lock().push(i);
            }));
        }
        assert!(!handle.is_loop_thread());
        event_loop.shutdown();

        assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
    }

    fn explode() {
        panic!("task failure");
    }

    #[test]
    fn test_panicking_task_is_contained() {
        let event_loop = EventLoop::spawn("test-loop").unwrap();
        let handle = event_loop.handle();
        let seen = Arc::new(Mutex::new(Vec::new()));

        handle.defer(Box::new(explode));
        let sink = Arc::clone(&seen);
        handle.defer(Box::new(move || sink.lock().push("after")));
        event_loop.shutdown();

        assert_eq!(*seen.lock(), ["after"]);
    }

    #[test]
    fn test_defer_after_shutdown_drops_task() {
        let event_loop = EventLoop::spawn("test-loop").unwrap();
        let handle = event_loop.handle();
        event_loop.shutdown();

        let ran = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ran);
        handle.defer(Box::new(move || *flag.lock() = true));

        assert!(!*ran.lock());
    }
}

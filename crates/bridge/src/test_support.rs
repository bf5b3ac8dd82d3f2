//! In-memory stand-ins for the engine, shared by the unit tests.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use crate::engine::{AbortCallback, DataCallback, DeferQueue, NativeRequest, NativeResponse, Task};

/// A defer queue whose tasks only run when the test asks for it.
#[derive(Default)]
pub(crate) struct ManualQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl ManualQueue {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Runs queued tasks in order, including tasks queued while running, and returns how many ran.
    pub(crate) fn run_pending(&self) -> usize {
        let mut count = 0;
        loop {
            let Some(task) = self.tasks.lock().pop_front() else {
                return count;
            };
            task();
            count += 1;
        }
    }
}

impl DeferQueue for ManualQueue {
    fn defer(&self, task: Task) {
        self.tasks.lock().push_back(task);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    Status(String),
    Header(String, String),
    End(Bytes),
    Close,
}

/// A native response that records every write and keeps the registered callbacks.
pub(crate) struct RecordingResponse {
    address: String,
    ops: Mutex<Vec<Op>>,
    data: Mutex<Option<DataCallback>>,
    aborted: Mutex<Option<AbortCallback>>,
}

impl RecordingResponse {
    pub(crate) fn new(address: &str) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_owned(),
            ops: Mutex::new(Vec::new()),
            data: Mutex::new(None),
            aborted: Mutex::new(None),
        })
    }

    pub(crate) fn ops(&self) -> Vec<Op> {
        self.ops.lock().clone()
    }

    /// Simulates the engine delivering a body chunk.
    pub(crate) fn push_data(&self, chunk: &'static [u8], is_last: bool) {
        if let Some(callback) = self.data.lock().as_mut() {
            callback(Bytes::from_static(chunk), is_last);
        }
    }

    pub(crate) fn has_data_callback(&self) -> bool {
        self.data.lock().is_some()
    }

    /// Simulates the peer disconnecting.
    pub(crate) fn disconnect(&self) {
        let callback = self.aborted.lock().take();
        if let Some(mut callback) = callback {
            callback();
            *self.aborted.lock() = Some(callback);
        }
    }
}

impl NativeResponse for RecordingResponse {
    fn write_status(&self, status: &str) {
        self.ops.lock().push(Op::Status(status.to_owned()));
    }

    fn write_header(&self, key: &str, value: &str) {
        self.ops.lock().push(Op::Header(key.to_owned(), value.to_owned()));
    }

    fn end(&self, body: Bytes) {
        self.ops.lock().push(Op::End(body));
    }

    fn close(&self) {
        self.ops.lock().push(Op::Close);
    }

    fn on_data(&self, callback: DataCallback) {
        *self.data.lock() = Some(callback);
    }

    fn on_aborted(&self, callback: AbortCallback) {
        *self.aborted.lock() = Some(callback);
    }

    fn remote_address(&self) -> String {
        self.address.clone()
    }
}

/// A request view with fixed contents.
pub(crate) struct FakeRequest {
    method: String,
    url: String,
    query: String,
    headers: Vec<(String, String)>,
    params: Vec<String>,
}

impl FakeRequest {
    pub(crate) fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_owned(),
            url: url.to_owned(),
            query: String::new(),
            headers: Vec::new(),
            params: Vec::new(),
        }
    }

    pub(crate) fn query(mut self, query: &str) -> Self {
        self.query = query.to_owned();
        self
    }

    pub(crate) fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub(crate) fn params(mut self, params: &[&str]) -> Self {
        self.params = params.iter().map(|&param| param.to_owned()).collect();
        self
    }
}

impl NativeRequest for FakeRequest {
    fn url(&self) -> &str {
        &self.url
    }

    fn method(&self) -> &str {
        &self.method
    }

    fn query(&self) -> &str {
        &self.query
    }

    fn headers(&self) -> Box<dyn Iterator<Item = (&str, &str)> + '_> {
        Box::new(self.headers.iter().map(|(name, value)| (name.as_str(), value.as_str())))
    }

    fn parameter(&self, index: usize) -> &str {
        self.params.get(index).map_or("", String::as_str)
    }
}

/// One event seen by [`capture_logs`].
#[derive(Debug, Clone)]
pub(crate) struct LogLine {
    pub(crate) level: Level,
    pub(crate) message: String,
    pub(crate) fields: String,
}

#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<LogLine>>>);

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        self.0.lock().push(LogLine { level: *event.metadata().level(), message: visitor.message, fields: visitor.fields });
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push_str(&format!("{}={value:?} ", field.name()));
        }
    }
}

/// Runs `f` with a subscriber scoped to the current thread and returns every event it logged.
pub(crate) fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, Vec<LogLine>) {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let output = tracing::subscriber::with_default(subscriber, f);
    let lines = capture.0.lock().clone();
    (output, lines)
}

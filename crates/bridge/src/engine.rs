//! Interfaces consumed from the event-loop and socket engine.
//!
//! The engine owns every connection. It runs one loop thread, parses HTTP, matches routes and
//! invokes the dispatch callback; this crate only sees the pieces below.
//!
//! # Threading contract
//!
//! - [`NativeRequest`] is a view that is only valid for the duration of the dispatch callback.
//! - [`NativeResponse`] implementations are address tokens for an engine-owned response. Their
//!   methods must only be called on the loop thread, and only while the connection is live.
//!   [`Response`](crate::Response) guarantees both by calling them exclusively from tasks run by
//!   the loop's [`DeferQueue`] after checking its abort flag.
//! - [`NativeSocket`] is only handed out inside WebSocket callbacks, which already run on the
//!   loop thread with a valid socket.

use bytes::Bytes;

/// A unit of work submitted to the loop thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Receives every body chunk of a request together with its `is_last` flag.
pub type DataCallback = Box<dyn FnMut(Bytes, bool) + Send + 'static>;

/// Called by the engine when the peer disconnects before the response finished.
pub type AbortCallback = Box<dyn FnMut() + Send + 'static>;

/// The loop's deferred-task sink.
///
/// Tasks run later on the loop thread, strictly in submission order.
pub trait DeferQueue: Send + Sync {
    fn defer(&self, task: Task);
}

/// The transient request view handed to the dispatch callback.
pub trait NativeRequest {
    /// Request path as matched by the engine.
    fn url(&self) -> &str;

    fn method(&self) -> &str;

    /// Raw query string without the leading `?`.
    fn query(&self) -> &str;

    /// Header lines in arrival order, names as sent by the client.
    fn headers(&self) -> Box<dyn Iterator<Item = (&str, &str)> + '_>;

    /// Positional route capture; the engine reports a missing capture as an empty string.
    fn parameter(&self, index: usize) -> &str;
}

/// The engine's response object for one request.
#[cfg_attr(test, mockall::automock)]
pub trait NativeResponse: Send + Sync {
    fn write_status(&self, status: &str);

    fn write_header(&self, key: &str, value: &str);

    fn end(&self, body: Bytes);

    /// Closes the connection without finishing the response.
    fn close(&self);

    /// Replaces the body data callback.
    fn on_data(&self, callback: DataCallback);

    /// Replaces the abort notification callback.
    fn on_aborted(&self, callback: AbortCallback);

    fn remote_address(&self) -> String;
}

/// WebSocket frame type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Text,
    Binary,
}

impl OpCode {
    pub fn from_binary_flag(is_binary: bool) -> Self {
        if is_binary { Self::Binary } else { Self::Text }
    }

    pub fn is_binary(self) -> bool {
        self == Self::Binary
    }
}

/// The engine's WebSocket primitives for one connection.
#[cfg_attr(test, mockall::automock)]
pub trait NativeSocket {
    fn send(&self, message: &[u8], opcode: OpCode);

    fn close(&self);

    fn subscribe(&self, topic: &str);

    fn unsubscribe(&self, topic: &str);

    fn publish(&self, topic: &str, message: &[u8], opcode: OpCode, compress: bool);

    fn remote_address(&self) -> String;
}

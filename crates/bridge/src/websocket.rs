//! WebSocket handles.
//!
//! WebSocket callbacks already run on the loop thread with a valid socket, so unlike
//! [`Response`](crate::Response) the handle forwards straight to the engine.

use std::fmt;
use std::sync::Arc;

use crate::engine::{NativeSocket, OpCode};
use crate::env::HandlerLock;

/// A borrowed WebSocket connection, valid for the duration of one engine callback.
#[derive(Clone, Copy)]
pub struct WebSocket<'ws> {
    native: &'ws dyn NativeSocket,
}

impl<'ws> WebSocket<'ws> {
    pub fn new(native: &'ws dyn NativeSocket) -> Self {
        Self { native }
    }

    /// Sends `message` as a text frame, or as a binary frame if `is_binary` is set.
    pub fn send(&self, message: impl AsRef<[u8]>, is_binary: bool) {
        self.native.send(message.as_ref(), OpCode::from_binary_flag(is_binary));
    }

    pub fn send_text(&self, text: &str) {
        self.send(text, false);
    }

    pub fn send_binary(&self, data: &[u8]) {
        self.send(data, true);
    }

    pub fn close(&self) {
        self.native.close();
    }

    pub fn subscribe(&self, topic: &str) {
        self.native.subscribe(topic);
    }

    pub fn unsubscribe(&self, topic: &str) {
        self.native.unsubscribe(topic);
    }

    /// Publishes `message` to every subscriber of `topic`.
    pub fn publish(&self, topic: &str, message: impl AsRef<[u8]>, is_binary: bool, compress: bool) {
        self.native.publish(topic, message.as_ref(), OpCode::from_binary_flag(is_binary), compress);
    }

    pub fn remote_address(&self) -> String {
        self.native.remote_address()
    }
}

impl fmt::Debug for WebSocket<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocket").finish_non_exhaustive()
    }
}

type OpenHandler = Arc<dyn Fn(&WebSocket<'_>) + Send + Sync>;
type MessageHandler = Arc<dyn Fn(&WebSocket<'_>, &[u8], OpCode) + Send + Sync>;
type CloseHandler = Arc<dyn Fn(&WebSocket<'_>, i32, &[u8]) + Send + Sync>;

/// The open, message and close handlers of a WebSocket route.
///
/// The engine calls [`open`](Self::open), [`message`](Self::message) and [`close`](Self::close)
/// from its socket hooks; each runs the matching handler, if any, under the handler lock with a
/// panic contained and logged.
#[derive(Clone)]
pub struct WebSocketBehavior {
    open: Option<OpenHandler>,
    message: Option<MessageHandler>,
    close: Option<CloseHandler>,
    lock: HandlerLock,
}

impl WebSocketBehavior {
    pub fn new(lock: HandlerLock) -> Self {
        Self { open: None, message: None, close: None, lock }
    }

    pub fn on_open<F>(mut self, handler: F) -> Self
    where
        F: Fn(&WebSocket<'_>) + Send + Sync + 'static,
    {
        self.open = Some(Arc::new(handler));
        self
    }

    pub fn on_message<F>(mut self, handler: F) -> Self
    where
        F: Fn(&WebSocket<'_>, &[u8], OpCode) + Send + Sync + 'static,
    {
        self.message = Some(Arc::new(handler));
        self
    }

    pub fn on_close<F>(mut self, handler: F) -> Self
    where
        F: Fn(&WebSocket<'_>, i32, &[u8]) + Send + Sync + 'static,
    {
        self.close = Some(Arc::new(handler));
        self
    }

    pub fn open(&self, native: &dyn NativeSocket) {
        if let Some(handler) = &self.open {
            self.lock.run_guarded("websocket open", || handler(&WebSocket::new(native)));
        }
    }

    pub fn message(&self, native: &dyn NativeSocket, message: &[u8], opcode: OpCode) {
        if let Some(handler) = &self.message {
            self.lock.run_guarded("websocket message", || handler(&WebSocket::new(native), message, opcode));
        }
    }

    /// Runs the close handler; the socket may still be used to read the remote address.
    pub fn close(&self, native: &dyn NativeSocket, code: i32, message: &[u8]) {
        if let Some(handler) = &self.close {
            self.lock.run_guarded("websocket close", || handler(&WebSocket::new(native), code, message));
        }
    }
}

impl fmt::Debug for WebSocketBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketBehavior")
            .field("open", &self.open.is_some())
            .field("message", &self.message.is_some())
            .field("close", &self.close.is_some())
            .finish_non_exhaustive()
    }
}

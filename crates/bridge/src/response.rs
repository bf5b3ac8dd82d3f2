//! The response handle handed to handler code.
//!
//! A [`Response`] can be cloned, moved to other threads and used long after the dispatch callback
//! returned. None of its methods touch the engine's response directly. Each operation checks the
//! abort flag, then enqueues a task on the loop's [`DeferQueue`] which checks the flag again before
//! calling into the engine, so the native response is only used on the loop thread and only while
//! the connection is live.
//!
//! # States
//!
//! A response starts active and ends either aborted (the peer disconnected) or finalized (`end`
//! or `close` executed on the loop thread). Both end states set the same flag, after which every
//! operation is a silent no-op.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures::channel::mpsc;
use http::StatusCode;
use http::header::{CONTENT_TYPE, SET_COOKIE};
use loopbridge_protocol::cookie::{Cookie, format_cookie};
use loopbridge_protocol::header::validate_header;
use loopbridge_protocol::{CookieError, HeaderError};
use serde::Serialize;
use tracing::{debug, trace};

use crate::abort::AbortFlag;
use crate::body::RequestBody;
use crate::config::Limits;
use crate::engine::{DeferQueue, NativeResponse};
use crate::env::{HandlerLock, SafeCallback};

#[derive(Clone)]
pub struct Response {
    native: Arc<dyn NativeResponse>,
    aborted: AbortFlag,
    remote_address: Arc<str>,
    queue: Arc<dyn DeferQueue>,
    lock: HandlerLock,
    limits: Limits,
}

impl Response {
    /// Wraps the engine's response. Must be called on the loop thread while the connection is
    /// live, which is always the case inside the dispatch callback.
    ///
    /// Captures the remote address and installs an abort hook that sets the flag.
    pub fn new(native: Arc<dyn NativeResponse>, queue: Arc<dyn DeferQueue>, lock: HandlerLock, limits: Limits) -> Self {
        let aborted = AbortFlag::new();
        let remote_address = Arc::from(native.remote_address());

        let flag = aborted.clone();
        native.on_aborted(Box::new(move || {
            if flag.set() {
                debug!("connection aborted");
            }
        }));

        Self { native, aborted, remote_address, queue, lock, limits }
    }

    /// The peer address, as captured when the response was created.
    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    /// Returns true once the response is aborted or finalized.
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_set()
    }

    /// Writes a raw status line such as `"200 OK"`.
    pub fn write_status(&self, status: impl Into<String>) {
        let status = status.into();
        self.defer("write_status", move |native, _| native.write_status(&status));
    }

    /// Writes the status line for `status`, e.g. `"404 Not Found"`.
    pub fn write_status_code(&self, status: StatusCode) {
        self.write_status(status_line(status));
    }

    /// Writes one response header.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError`] if the name is not a valid header name or the value contains a
    /// control character. A response that is no longer active accepts anything and writes
    /// nothing.
    pub fn write_header(&self, key: impl Into<String>, value: impl Into<String>) -> Result<(), HeaderError> {
        if self.aborted.is_set() {
            return Ok(());
        }

        let (key, value) = (key.into(), value.into());
        validate_header(&key, &value)?;
        self.write_header_unchecked(key, value);
        Ok(())
    }

    pub(crate) fn write_header_unchecked(&self, key: String, value: String) {
        self.defer("write_header", move |native, _| native.write_header(&key, &value));
    }

    /// Ends the response with `body`. Once the write ran, the response is finalized.
    pub fn end(&self, body: impl Into<Bytes>) {
        let body = body.into();
        self.defer("end", move |native, aborted| {
            native.end(body);
            aborted.set();
        });
    }

    /// Closes the connection. Once the close ran, the response is finalized.
    pub fn close(&self) {
        self.defer("close", |native, aborted| {
            native.close();
            aborted.set();
        });
    }

    /// Registers the body data callback.
    ///
    /// Chunks are delivered in arrival order on the loop thread, each with its `is_last` flag.
    /// The callback runs and is released under the handler lock, and stops being called once the
    /// response is no longer active. A later registration replaces this one.
    pub fn on_data<F>(&self, callback: F)
    where
        F: FnMut(Bytes, bool) + Send + 'static,
    {
        let mut callback = SafeCallback::new(callback, self.lock.clone());
        self.defer("on_data", move |native, aborted| {
            let aborted = aborted.clone();
            native.on_data(Box::new(move |chunk, is_last| {
                if aborted.is_set() {
                    return;
                }
                callback.call(|callback| callback(chunk, is_last));
            }));
        });
    }

    /// Registers the abort callback, replacing any earlier one.
    ///
    /// On peer disconnect the flag is set first, then `callback` runs under the handler lock. It
    /// runs at most once, and not at all if the response finalized before the disconnect.
    ///
    /// Registration itself is deferred to the loop thread. A disconnect that lands before the
    /// registration runs only sets the flag and `callback` is dropped without being called, so
    /// handlers must also poll [`is_aborted`](Self::is_aborted).
    pub fn on_aborted<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut callback = SafeCallback::new(callback, self.lock.clone());
        self.defer("on_aborted", move |native, aborted| {
            let aborted = aborted.clone();
            native.on_aborted(Box::new(move || {
                if aborted.set() {
                    debug!("connection aborted");
                    callback.call_once();
                }
            }));
        });
    }

    /// Streams the request body.
    ///
    /// Registers a data callback, so it replaces any callback set with [`on_data`](Self::on_data).
    pub fn body(&self) -> RequestBody {
        let (sender, receiver) = mpsc::unbounded();
        self.on_data(move |chunk, is_last| {
            // the reader went away, remaining chunks have nowhere to go
            let _ = sender.unbounded_send((chunk, is_last));
        });
        RequestBody::new(receiver, self.aborted.clone(), self.limits.max_body_size, self.limits.max_query_params)
    }

    /// Adds one `Set-Cookie` header. Every call adds its own header.
    ///
    /// # Errors
    ///
    /// Returns the [`CookieError`] reported by [`format_cookie`].
    pub fn set_cookie(&self, cookie: &Cookie) -> Result<(), CookieError> {
        if self.aborted.is_set() {
            return Ok(());
        }

        let value = format_cookie(cookie)?;
        self.write_header_unchecked(SET_COOKIE.as_str().to_owned(), value);
        Ok(())
    }

    /// Tells the client to delete the cookie `name`. `path` defaults to `/`.
    ///
    /// # Errors
    ///
    /// Returns the [`CookieError`] reported by [`format_cookie`].
    pub fn clear_cookie(&self, name: &str, path: Option<&str>, domain: Option<&str>) -> Result<(), CookieError> {
        let mut cookie = Cookie::removal(name).path(path.unwrap_or("/"));
        if let Some(domain) = domain {
            cookie = cookie.domain(domain);
        }
        self.set_cookie(&cookie)
    }

    /// Writes `status` and ends the response with `body`.
    pub fn send(&self, status: StatusCode, body: impl Into<Bytes>) {
        self.write_status_code(status);
        self.end(body);
    }

    /// Serializes `value` and ends the response with it as `application/json`.
    ///
    /// # Errors
    ///
    /// Returns the serialization error; nothing is written in that case.
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        self.write_header_unchecked(CONTENT_TYPE.as_str().to_owned(), mime::APPLICATION_JSON.to_string());
        self.end(body);
        Ok(())
    }

    fn defer<F>(&self, op: &'static str, f: F)
    where
        F: FnOnce(&dyn NativeResponse, &AbortFlag) + Send + 'static,
    {
        if self.aborted.is_set() {
            trace!(op, "response is no longer active, operation skipped");
            return;
        }

        let native = Arc::clone(&self.native);
        let aborted = self.aborted.clone();
        self.queue.defer(Box::new(move || {
            if aborted.is_set() {
                trace!(op, "response became inactive before the deferred operation ran");
                return;
            }
            f(native.as_ref(), &aborted);
        }));
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("remote_address", &self.remote_address)
            .field("aborted", &self.aborted.is_set())
            .finish_non_exhaustive()
    }
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_str().to_owned(),
    }
}

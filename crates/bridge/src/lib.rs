//! A thread-safe request and response lifecycle bridge for embedded event-loop servers
//!
//! An event-loop HTTP engine hands its route callback a request view and a response object that
//! are only valid on the loop thread, and only until the callback returns or the connection goes
//! away. This crate turns them into objects handler code can keep, clone and use from any thread:
//!
//! - [`Request`] is an immutable snapshot copied on the loop thread before the handler runs
//! - [`Response`] never touches the engine directly; every operation is deferred back onto the
//!   loop thread and skipped once the connection is aborted or the response is finalized
//! - [`WebSocket`] forwards to the engine's socket inside WebSocket callbacks
//!
//! The engine side is described by the traits in [`engine`]. The [`Dispatcher`] glues the two
//! together, and [`EventLoop`] is a small loop thread implementing [`DeferQueue`] for engines
//! without one, and for tests.
//!
//! # Example
//!
//! ```no_run
//! use loopbridge::{Dispatcher, EventLoop, HandlerError, Request, Response, handler_fn};
//!
//! let event_loop = EventLoop::spawn("loop").unwrap();
//! let dispatcher = Dispatcher::builder(event_loop.queue()).build();
//!
//! let route = dispatcher
//!     .route(
//!         "/users/{id}",
//!         handler_fn(|request: Request, response: Response| {
//!             let id = request.param("id").unwrap_or_default();
//!             response.write_header("Content-Type", "text/plain")?;
//!             response.end(format!("user {id}"));
//!             Ok::<_, HandlerError>(())
//!         }),
//!     )
//!     .unwrap();
//!
//! // register `route.pattern()` with the engine, and call `dispatcher.dispatch(&route, ..)`
//! // from its route callback
//! assert_eq!(route.pattern(), "/users/:id");
//! ```
//!
//! # Threading
//!
//! Handler code may run under a [`HandlerLock`], the serialization lock of the handler
//! environment. Callbacks registered through [`Response::on_data`] and [`Response::on_aborted`]
//! are invoked and released under that lock, even on the loop thread.

mod abort;
mod body;
mod config;
mod dispatch;
pub mod engine;
mod env;
mod error;
mod event_loop;
mod request;
mod response;
mod websocket;

#[cfg(test)]
mod test_support;

pub use abort::AbortFlag;
pub use body::RequestBody;
pub use config::{DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_HEADERS, DEFAULT_MAX_PARAMS, Limits, Truncation};
pub use dispatch::{
    AsyncHandler, AsyncHandlerFn, Dispatcher, DispatcherBuilder, Handler, HandlerFn, Route, async_handler_fn,
    handler_fn,
};
pub use engine::{DeferQueue, NativeRequest, NativeResponse, NativeSocket, OpCode};
pub use env::HandlerLock;
pub use error::{BodyError, DispatchError, ExtractError, HandlerError};
pub use event_loop::{EventLoop, LoopHandle};
pub use request::Request;
pub use response::Response;
pub use websocket::{WebSocket, WebSocketBehavior};

pub use loopbridge_protocol as protocol;
pub use loopbridge_protocol::cookie::{Cookie, format_cookie};
pub use loopbridge_protocol::route::{ParamValidation, RoutePattern, compile_route_path};

/// re-export async_trait for implementing [`AsyncHandler`] by hand
pub use async_trait::async_trait;

//! Route compilation and handler dispatch.
//!
//! The engine owns the routing table: it is given each [`Route`]'s pattern and calls
//! [`Dispatcher::dispatch`] on the loop thread when a request matches. Dispatch builds the
//! [`Request`] snapshot and the [`Response`] handle, then runs the handler:
//!
//! - a [`Handler`] runs immediately under the handler lock
//! - an [`AsyncHandler`] is spawned onto the configured tokio runtime
//!
//! A handler that fails or panics gets its response finished with a `500` and a JSON error body.
//! If the handler already finalized the response, that write is a no-op. Handlers running longer
//! than 100 ms are logged at `info` with their method, URL and elapsed time.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use http::StatusCode;
use http::header::CONTENT_TYPE;
use loopbridge_protocol::route::compile_route_path_with;
use tokio::runtime::Handle;
use tracing::{debug, error, info};

use crate::config::Limits;
use crate::engine::{DeferQueue, NativeRequest, NativeResponse};
use crate::env::{HandlerLock, panic_message};
use crate::error::{DispatchError, HandlerError};
use crate::request::Request;
use crate::response::Response;
use crate::websocket::WebSocketBehavior;

const INTERNAL_ERROR_BODY: &str = r#"{"error": "Internal Server Error"}"#;

const SLOW_HANDLER: Duration = Duration::from_millis(100);

/// A handler that runs to completion inside the dispatch callback.
pub trait Handler: Send + Sync {
    /// # Errors
    ///
    /// An error is logged and answered with `500 Internal Server Error`.
    fn call(&self, request: Request, response: Response) -> Result<(), HandlerError>;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F, E> Handler for HandlerFn<F>
where
    F: Fn(Request, Response) -> Result<(), E> + Send + Sync,
    E: Into<HandlerError>,
{
    fn call(&self, request: Request, response: Response) -> Result<(), HandlerError> {
        (self.f)(request, response).map_err(Into::into)
    }
}

pub fn handler_fn<F, E>(f: F) -> HandlerFn<F>
where
    F: Fn(Request, Response) -> Result<(), E> + Send + Sync,
    E: Into<HandlerError>,
{
    HandlerFn { f }
}

/// A handler whose future is spawned onto a tokio runtime.
///
/// The future owns the request and response, so it may outlive the dispatch callback and finish
/// the response from any worker thread.
#[async_trait]
pub trait AsyncHandler: Send + Sync {
    /// # Errors
    ///
    /// An error is logged and answered with `500 Internal Server Error`.
    async fn call(&self, request: Request, response: Response) -> Result<(), HandlerError>;
}

#[derive(Debug)]
pub struct AsyncHandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut, E> AsyncHandler for AsyncHandlerFn<F>
where
    F: Fn(Request, Response) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<HandlerError>,
{
    async fn call(&self, request: Request, response: Response) -> Result<(), HandlerError> {
        (self.f)(request, response).await.map_err(Into::into)
    }
}

pub fn async_handler_fn<F, Fut, E>(f: F) -> AsyncHandlerFn<F>
where
    F: Fn(Request, Response) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<HandlerError>,
{
    AsyncHandlerFn { f }
}

#[derive(Clone)]
enum RouteHandler {
    Sync(Arc<dyn Handler>),
    Async(Arc<dyn AsyncHandler>, Handle),
}

/// A compiled route: the engine's matcher pattern, its parameter names and the handler.
#[derive(Clone)]
pub struct Route {
    pattern: Arc<str>,
    param_names: Arc<[String]>,
    handler: RouteHandler,
}

impl Route {
    /// The pattern to register with the engine, e.g. `/users/:id`.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn is_async(&self) -> bool {
        matches!(self.handler, RouteHandler::Async(..))
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("param_names", &self.param_names)
            .field("async", &self.is_async())
            .finish()
    }
}

pub struct DispatcherBuilder {
    queue: Arc<dyn DeferQueue>,
    lock: Option<HandlerLock>,
    limits: Limits,
    runtime: Option<Handle>,
}

impl DispatcherBuilder {
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Shares an existing handler lock instead of creating a new one.
    pub fn handler_lock(mut self, lock: HandlerLock) -> Self {
        self.lock = Some(lock);
        self
    }

    /// The runtime async handlers are spawned onto.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            queue: self.queue,
            lock: self.lock.unwrap_or_default(),
            limits: self.limits,
            runtime: self.runtime,
        }
    }
}

/// Builds request snapshots and response handles for matched routes and runs their handlers.
pub struct Dispatcher {
    queue: Arc<dyn DeferQueue>,
    lock: HandlerLock,
    limits: Limits,
    runtime: Option<Handle>,
}

impl Dispatcher {
    /// Starts a builder; every response created by the dispatcher defers its work onto `queue`.
    pub fn builder(queue: Arc<dyn DeferQueue>) -> DispatcherBuilder {
        DispatcherBuilder { queue, lock: None, limits: Limits::default(), runtime: None }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn handler_lock(&self) -> &HandlerLock {
        &self.lock
    }

    /// Compiles `template` and binds it to a handler that runs inside the dispatch callback.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Route`] if the template fails the configured parameter
    /// validation.
    pub fn route<H: Handler + 'static>(&self, template: &str, handler: H) -> Result<Route, DispatchError> {
        self.compile(template, RouteHandler::Sync(Arc::new(handler)))
    }

    /// Compiles `template` and binds it to a handler spawned onto the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MissingRuntime`] if the dispatcher was built without a runtime,
    /// and [`DispatchError::Route`] if the template fails the configured parameter validation.
    pub fn async_route<H: AsyncHandler + 'static>(&self, template: &str, handler: H) -> Result<Route, DispatchError> {
        let runtime = self.runtime.clone().ok_or(DispatchError::MissingRuntime)?;
        self.compile(template, RouteHandler::Async(Arc::new(handler), runtime))
    }

    /// An empty WebSocket behavior sharing this dispatcher's handler lock.
    pub fn websocket(&self) -> WebSocketBehavior {
        WebSocketBehavior::new(self.lock.clone())
    }

    /// Handles one matched request. Must be called on the loop thread from the engine's route
    /// callback, while `request` is valid and the connection is live.
    pub fn dispatch(&self, route: &Route, request: &dyn NativeRequest, response: Arc<dyn NativeResponse>) {
        let request = Request::from_native(request, Arc::clone(&route.param_names), &self.limits);
        let response = Response::new(response, Arc::clone(&self.queue), self.lock.clone(), self.limits);
        let completion = Completion::start(route, &request);

        match &route.handler {
            RouteHandler::Sync(handler) => {
                let fallback = response.clone();
                let result = self.lock.run(|| catch_unwind(AssertUnwindSafe(|| handler.call(request, response))));
                completion.report(result, &fallback);
            }
            RouteHandler::Async(handler, runtime) => {
                let handler = Arc::clone(handler);
                let fallback = response.clone();
                runtime.spawn(async move {
                    let result = AssertUnwindSafe(handler.call(request, response)).catch_unwind().await;
                    completion.report(result, &fallback);
                });
            }
        }
    }

    fn compile(&self, template: &str, handler: RouteHandler) -> Result<Route, DispatchError> {
        let (pattern, param_names) = compile_route_path_with(template, self.limits.route_validation)?.into_parts();
        Ok(Route { pattern: Arc::from(pattern), param_names: Arc::from(param_names), handler })
    }
}

impl fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder").field("limits", &self.limits).finish_non_exhaustive()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("lock", &self.lock)
            .field("limits", &self.limits)
            .field("runtime", &self.runtime.is_some())
            .finish_non_exhaustive()
    }
}

/// What is logged once a handler returns.
struct Completion {
    route: Arc<str>,
    method: String,
    url: String,
    started: Instant,
}

impl Completion {
    fn start(route: &Route, request: &Request) -> Self {
        Self {
            route: Arc::clone(&route.pattern),
            method: request.method().to_owned(),
            url: request.url().to_owned(),
            started: Instant::now(),
        }
    }

    fn report(self, result: Result<Result<(), HandlerError>, Box<dyn Any + Send>>, response: &Response) {
        let elapsed = self.started.elapsed();
        let (route, method, url) = (&*self.route, self.method.as_str(), self.url.as_str());

        match result {
            Ok(Ok(())) if elapsed >= SLOW_HANDLER => info!(route, method, url, ?elapsed, "slow handler"),
            Ok(Ok(())) => debug!(route, method, url, ?elapsed, "handler completed"),
            Ok(Err(e)) => {
                error!(route, method, url, ?elapsed, cause = %e, "handler failed");
                internal_error(response);
            }
            Err(panic) => {
                error!(route, method, url, ?elapsed, cause = panic_message(panic.as_ref()), "handler panicked");
                internal_error(response);
            }
        }
    }
}

fn internal_error(response: &Response) {
    response.write_status_code(StatusCode::INTERNAL_SERVER_ERROR);
    response.write_header_unchecked(CONTENT_TYPE.as_str().to_owned(), mime::APPLICATION_JSON.to_string());
    response.end(INTERNAL_ERROR_BODY);
}

//! Drives the bridge with a fake engine that prints every native call.
//!
//! ```sh
//! cargo run -p loopbridge --example simulated_engine
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use loopbridge::engine::{AbortCallback, DataCallback};
use loopbridge::{
    Cookie, Dispatcher, EventLoop, HandlerError, NativeRequest, NativeResponse, NativeSocket, OpCode, Request,
    Response, async_handler_fn, handler_fn,
};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

struct ConsoleResponse {
    id: usize,
    data: Mutex<Option<DataCallback>>,
}

impl ConsoleResponse {
    fn new(id: usize) -> Arc<Self> {
        Arc::new(Self { id, data: Mutex::new(None) })
    }

    fn deliver(&self, chunk: &'static [u8], is_last: bool) {
        if let Some(callback) = self.data.lock().as_mut() {
            callback(Bytes::from_static(chunk), is_last);
        }
    }
}

impl NativeResponse for ConsoleResponse {
    fn write_status(&self, status: &str) {
        info!(id = self.id, status, "write status");
    }

    fn write_header(&self, key: &str, value: &str) {
        info!(id = self.id, key, value, "write header");
    }

    fn end(&self, body: Bytes) {
        info!(id = self.id, body = %String::from_utf8_lossy(&body), "end");
    }

    fn close(&self) {
        info!(id = self.id, "close");
    }

    fn on_data(&self, callback: DataCallback) {
        *self.data.lock() = Some(callback);
    }

    fn on_aborted(&self, _callback: AbortCallback) {}

    fn remote_address(&self) -> String {
        "127.0.0.1:54321".to_owned()
    }
}

struct ConsoleRequest {
    method: &'static str,
    url: &'static str,
    query: &'static str,
    params: Vec<&'static str>,
}

impl NativeRequest for ConsoleRequest {
    fn url(&self) -> &str {
        self.url
    }

    fn method(&self) -> &str {
        self.method
    }

    fn query(&self) -> &str {
        self.query
    }

    fn headers(&self) -> Box<dyn Iterator<Item = (&str, &str)> + '_> {
        Box::new([("Host", "localhost"), ("Content-Type", "application/json")].into_iter())
    }

    fn parameter(&self, index: usize) -> &str {
        self.params.get(index).copied().unwrap_or_default()
    }
}

struct ConsoleSocket;

impl NativeSocket for ConsoleSocket {
    fn send(&self, message: &[u8], opcode: OpCode) {
        info!(message = %String::from_utf8_lossy(message), ?opcode, "ws send");
    }

    fn close(&self) {
        info!("ws close");
    }

    fn subscribe(&self, topic: &str) {
        info!(topic, "ws subscribe");
    }

    fn unsubscribe(&self, topic: &str) {
        info!(topic, "ws unsubscribe");
    }

    fn publish(&self, topic: &str, message: &[u8], opcode: OpCode, compress: bool) {
        info!(topic, message = %String::from_utf8_lossy(message), ?opcode, compress, "ws publish");
    }

    fn remote_address(&self) -> String {
        "127.0.0.1:54322".to_owned()
    }
}

#[derive(Deserialize, Debug)]
struct Page {
    page: u32,
}

#[derive(Deserialize, Debug)]
struct User {
    name: String,
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let event_loop = EventLoop::spawn("engine-loop").expect("event loop thread should start");
    let dispatcher = Arc::new(Dispatcher::builder(event_loop.queue()).runtime(tokio::runtime::Handle::current()).build());

    let show_user = dispatcher
        .route(
            "/users/{id}",
            handler_fn(|request: Request, response: Response| {
                let page = request.query_as::<Page>()?;
                response.set_cookie(&Cookie::new("last_user", request.param("id").unwrap_or_default()).http_only(true))?;
                response.send(StatusCode::OK, format!("user {} page {}", request.param("id").unwrap_or_default(), page.page));
                Ok::<_, HandlerError>(())
            }),
        )
        .expect("route template should compile");

    let create_user = dispatcher
        .async_route(
            "/users",
            async_handler_fn(|request: Request, response: Response| async move {
                if !request.is_json() {
                    response.send(StatusCode::UNSUPPORTED_MEDIA_TYPE, "");
                    return Ok(());
                }
                let user: User = response.body().json().await?;
                response.write_status_code(StatusCode::CREATED);
                response.json(&serde_json::json!({ "created": user.name }))?;
                Ok::<_, HandlerError>(())
            }),
        )
        .expect("route template should compile");

    let chat = dispatcher
        .websocket()
        .on_open(|socket| socket.subscribe("chat"))
        .on_message(|socket, message, opcode| socket.publish("chat", message, opcode.is_binary(), false))
        .on_close(|socket, code, _| info!(code, peer = %socket.remote_address(), "ws closed"));

    info!(show_user = show_user.pattern(), create_user = create_user.pattern(), "routes compiled");

    let get = ConsoleResponse::new(1);
    let post = ConsoleResponse::new(2);
    {
        let dispatcher = Arc::clone(&dispatcher);
        let get: Arc<dyn NativeResponse> = Arc::<ConsoleResponse>::clone(&get);
        let post_native: Arc<dyn NativeResponse> = Arc::<ConsoleResponse>::clone(&post);
        event_loop.queue().defer(Box::new(move || {
            let request = ConsoleRequest { method: "GET", url: "/users/42", query: "page=3", params: vec!["42"] };
            dispatcher.dispatch(&show_user, &request, get);

            let request = ConsoleRequest { method: "POST", url: "/users", query: "", params: Vec::new() };
            dispatcher.dispatch(&create_user, &request, post_native);
        }));
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    event_loop.queue().defer(Box::new(move || {
        post.deliver(br#"{"name":"#, false);
        post.deliver(br#""zava"}"#, true);
    }));

    event_loop.queue().defer(Box::new(move || {
        let socket = ConsoleSocket;
        chat.open(&socket);
        chat.message(&socket, b"hello everyone", OpCode::Text);
        chat.close(&socket, 1000, b"");
    }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    event_loop.shutdown();
}

//! Protocol utilities shared by the loopbridge request bridge
//!
//! This crate contains the pure, allocation-light pieces of protocol handling that handler code
//! relies on. None of them touch a socket or an event loop, so they can be used and tested on
//! their own.
//!
//! # Components
//!
//! - [`query`]: percent/plus decoding of a raw query string into a multi-value mapping,
//!   bounded by a parameter limit
//! - [`route`]: compilation of `{name}` route templates into the engine's `:name` matcher syntax
//! - [`cookie`]: validated rendering of `Set-Cookie` header values
//! - [`header`]: validation of response header names and values against injection
//!
//! # Example
//!
//! ```
//! use loopbridge_protocol::cookie::Cookie;
//! use loopbridge_protocol::query::decode_query;
//! use loopbridge_protocol::route::compile_route_path;
//!
//! let route = compile_route_path("/users/{id}");
//! assert_eq!(route.pattern(), "/users/:id");
//!
//! let query = decode_query("q=rust+lang&page=2").unwrap();
//! assert_eq!(query.first("q"), Some("rust lang"));
//!
//! let cookie = Cookie::new("session", "abc").http_only(true);
//! assert_eq!(cookie.to_header_value().unwrap(), "session=abc; Path=/; HttpOnly; SameSite=Lax");
//! ```
//!
//! # Error Handling
//!
//! Every utility reports failures through its own error type, all of which convert into
//! [`ProtocolError`]:
//!
//! - [`QueryError`]: the query string exceeded the parameter limit
//! - [`RouteError`]: a route template failed strict parameter validation
//! - [`CookieError`]: a cookie attribute could enable header injection
//! - [`HeaderError`]: a header name or value is not safe to write

pub mod cookie;
pub mod header;
pub mod query;
pub mod route;

mod error;
pub use error::CookieError;
pub use error::ErrorKind;
pub use error::HeaderError;
pub use error::ProtocolError;
pub use error::QueryError;
pub use error::RouteError;

mod utils;
pub(crate) use utils::ensure;

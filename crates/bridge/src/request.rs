//! The immutable request snapshot handed to handler code.
//!
//! The engine's request view is only valid during the dispatch callback, so everything a handler
//! may read later is copied out on the loop thread before the handler runs. The snapshot is then
//! owned by the handler invocation and can move freely between threads.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::sync::Arc;

use loopbridge_protocol::QueryError;
use loopbridge_protocol::query::{QueryParams, decode_query_with_limit};
use mime::Mime;
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::config::{Limits, Truncation};
use crate::engine::NativeRequest;
use crate::error::ExtractError;

#[derive(Debug)]
pub struct Request {
    url: String,
    method: String,
    query: String,
    headers: BTreeMap<String, String>,
    params: Vec<String>,
    param_names: Arc<[String]>,
    max_query_params: usize,
    queries: OnceCell<Result<QueryParams, QueryError>>,
}

impl Request {
    /// Copies the engine's request view.
    ///
    /// Header names are lowercased and repeated headers are joined with `", "`. At most
    /// `limits.max_headers` header lines and `limits.max_params` captures are copied.
    ///
    /// An empty capture ends the capture list. The one exception is an empty first capture
    /// followed by a non-empty second one, which is kept as `""`.
    pub fn from_native(native: &dyn NativeRequest, param_names: Arc<[String]>, limits: &Limits) -> Self {
        Self {
            url: native.url().to_owned(),
            method: native.method().to_owned(),
            query: native.query().to_owned(),
            headers: copy_headers(native, limits),
            params: copy_params(native, limits),
            param_names,
            max_query_params: limits.max_query_params,
            queries: OnceCell::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the value of the header `name`, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        let value = if name.bytes().any(|b| b.is_ascii_uppercase()) {
            self.headers.get(&name.to_ascii_lowercase())
        } else {
            self.headers.get(name)
        };
        value.map(String::as_str)
    }

    /// All headers, keyed by lowercase name.
    pub fn headers(&self) -> btree_map::Iter<'_, String, String> {
        self.headers.iter()
    }

    /// Returns the positional route capture at `index`.
    pub fn parameter(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    pub fn parameters(&self) -> &[String] {
        &self.params
    }

    /// Returns the route capture for the parameter `name` of the matched route.
    pub fn param(&self, name: &str) -> Option<&str> {
        let index = self.param_names.iter().position(|param_name| param_name == name)?;
        self.parameter(index)
    }

    /// The raw query string.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Returns the decoded query string, decoding it on first access.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::TooManyParameters`] if the query has more pairs than the configured
    /// limit. The result is cached, so the error repeats on every call.
    pub fn queries(&self) -> Result<&QueryParams, QueryError> {
        self.queries
            .get_or_init(|| decode_query_with_limit(&self.query, self.max_query_params))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Deserializes the query string into `T`.
    ///
    /// The parameter limit is checked first, so an oversized query never reaches the
    /// deserializer.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] if the limit is exceeded or `T` cannot be built from the query.
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, ExtractError> {
        self.queries()?;
        Ok(serde_urlencoded::from_str(&self.query)?)
    }

    /// Parses the `Content-Type` header.
    pub fn content_type(&self) -> Option<Mime> {
        self.header("content-type")?.parse().ok()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")?.trim().parse().ok()
    }

    pub fn is_json(&self) -> bool {
        self.content_type()
            .is_some_and(|mime| mime.subtype() == mime::JSON || mime.suffix() == Some(mime::JSON))
    }

    pub fn is_form(&self) -> bool {
        self.content_type().is_some_and(|mime| mime.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.as_ref())
    }
}

fn copy_headers(native: &dyn NativeRequest, limits: &Limits) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::<String, String>::new();
    let mut lines = native.headers();

    for (name, value) in lines.by_ref().take(limits.max_headers) {
        match headers.entry(name.to_ascii_lowercase()) {
            btree_map::Entry::Occupied(mut entry) => {
                let merged = entry.get_mut();
                merged.push_str(", ");
                merged.push_str(value);
            }
            btree_map::Entry::Vacant(entry) => {
                entry.insert(value.to_owned());
            }
        }
    }

    if limits.truncation == Truncation::Warn {
        let dropped = lines.count();
        if dropped > 0 {
            warn!(url = native.url(), dropped, max_headers = limits.max_headers, "request headers truncated");
        }
    }

    headers
}

fn copy_params(native: &dyn NativeRequest, limits: &Limits) -> Vec<String> {
    let mut params = Vec::new();

    for index in 0..limits.max_params {
        let param = native.parameter(index);
        if param.is_empty() {
            if index == 0 && !native.parameter(1).is_empty() {
                params.push(String::new());
                continue;
            }
            return params;
        }
        params.push(param.to_owned());
    }

    if limits.truncation == Truncation::Warn && !native.parameter(limits.max_params).is_empty() {
        warn!(url = native.url(), max_params = limits.max_params, "route captures truncated");
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeRequest, capture_logs};
    use serde::Deserialize;
    use tracing::Level;

    fn snapshot(native: &FakeRequest) -> Request {
        Request::from_native(native, Arc::from(Vec::new()), &Limits::default())
    }

    #[test]
    fn test_basic_fields() {
        let native = FakeRequest::new("GET", "/users/42").query("page=2&q=a+b");
        let request = snapshot(&native);

        assert_eq!(request.method(), "GET");
        assert_eq!(request.url(), "/users/42");
        assert_eq!(request.query(), "page=2&q=a+b");
        assert_eq!(request.queries().unwrap().first("q"), Some("a b"));
    }

    #[test]
    fn test_headers_lowercased_and_merged() {
        let native = FakeRequest::new("GET", "/").header("X-Tag", "x").header("x-tag", "y").header("Host", "localhost");
        let request = snapshot(&native);

        assert_eq!(request.header("x-tag"), Some("x, y"));
        assert_eq!(request.header("X-TAG"), Some("x, y"));
        assert_eq!(request.header("host"), Some("localhost"));
        assert_eq!(request.header("missing"), None);
        assert_eq!(request.headers().map(|(name, _)| name.as_str()).collect::<Vec<_>>(), ["host", "x-tag"]);
    }

    #[test]
    fn test_header_limit() {
        let native = (0..150).fold(FakeRequest::new("GET", "/"), |native, i| native.header(&format!("h{i}"), "v"));
        let request = snapshot(&native);

        assert_eq!(request.headers().count(), 100);
        assert_eq!(request.header("h99"), Some("v"));
        assert_eq!(request.header("h100"), None);
    }

    #[test]
    fn test_header_limit_counts_lines() {
        let native = FakeRequest::new("GET", "/").header("a", "1").header("a", "2").header("b", "3");
        let request = Request::from_native(&native, Arc::from(Vec::new()), &Limits::default().max_headers(2));

        assert_eq!(request.header("a"), Some("1, 2"));
        assert_eq!(request.header("b"), None);
    }

    #[test]
    fn test_params_stop_at_empty() {
        let native = FakeRequest::new("GET", "/").params(&["1", "2", "", "4"]);
        assert_eq!(snapshot(&native).parameters(), ["1", "2"]);
    }

    #[test]
    fn test_params_empty_first_capture() {
        let native = FakeRequest::new("GET", "/").params(&["", "b", "c"]);
        let request = snapshot(&native);
        assert_eq!(request.parameters(), ["", "b", "c"]);
        assert_eq!(request.parameter(0), Some(""));
        assert_eq!(request.parameter(3), None);

        let native = FakeRequest::new("GET", "/").params(&["", ""]);
        assert!(snapshot(&native).parameters().is_empty());
    }

    #[test]
    fn test_params_limit() {
        let values = (0..150).map(|i| i.to_string()).collect::<Vec<_>>();
        let values = values.iter().map(String::as_str).collect::<Vec<_>>();
        let native = FakeRequest::new("GET", "/").params(&values);

        let request = Request::from_native(&native, Arc::from(Vec::new()), &Limits::default().truncation(Truncation::Warn));
        assert_eq!(request.parameters().len(), 100);
        assert_eq!(request.parameter(99), Some("99"));
    }

    #[test]
    fn test_truncation_warnings() {
        let values = (0..5).map(|i| i.to_string()).collect::<Vec<_>>();
        let values = values.iter().map(String::as_str).collect::<Vec<_>>();
        let native = FakeRequest::new("GET", "/full")
            .header("a", "1")
            .header("b", "2")
            .header("c", "3")
            .header("d", "4")
            .params(&values);
        let limits = Limits::default().max_headers(2).max_params(3);

        let (request, logs) = capture_logs(|| {
            Request::from_native(&native, Arc::from(Vec::new()), &limits.truncation(Truncation::Warn))
        });
        assert_eq!(request.headers().count(), 2);
        assert_eq!(request.parameters(), ["0", "1", "2"]);

        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|line| line.level == Level::WARN));
        assert_eq!(logs[0].message, "request headers truncated");
        assert!(logs[0].fields.contains("dropped=2"));
        assert!(logs[0].fields.contains("max_headers=2"));
        assert_eq!(logs[1].message, "route captures truncated");
        assert!(logs[1].fields.contains("max_params=3"));

        let (request, logs) = capture_logs(|| Request::from_native(&native, Arc::from(Vec::new()), &limits));
        assert_eq!(request.headers().count(), 2);
        assert!(logs.is_empty());
    }

    #[test]
    fn test_no_warning_within_limits() {
        let native = FakeRequest::new("GET", "/").header("a", "1").params(&["x"]);
        let limits = Limits::default().max_headers(1).max_params(1).truncation(Truncation::Warn);

        let (_, logs) = capture_logs(|| Request::from_native(&native, Arc::from(Vec::new()), &limits));
        assert!(logs.is_empty());
    }

    #[test]
    fn test_param_by_name() {
        let native = FakeRequest::new("GET", "/users/7/posts/9").params(&["7", "9"]);
        let names: Arc<[String]> = Arc::from(vec!["id".to_owned(), "postId".to_owned()]);
        let request = Request::from_native(&native, names, &Limits::default());

        assert_eq!(request.param("id"), Some("7"));
        assert_eq!(request.param("postId"), Some("9"));
        assert_eq!(request.param("other"), None);
    }

    #[test]
    fn test_queries_limit_is_cached() {
        let query = (0..3).map(|i| format!("k{i}=v")).collect::<Vec<_>>().join("&");
        let native = FakeRequest::new("GET", "/").query(&query);
        let request = Request::from_native(&native, Arc::from(Vec::new()), &Limits::default().max_query_params(2));

        assert_eq!(request.queries(), Err(QueryError::too_many_parameters(2)));
        assert_eq!(request.queries(), Err(QueryError::too_many_parameters(2)));
    }

    #[test]
    fn test_query_as() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Search {
            q: String,
            page: u32,
        }

        let native = FakeRequest::new("GET", "/").query("q=rust+lang&page=3");
        let request = snapshot(&native);
        assert_eq!(request.query_as::<Search>().unwrap(), Search { q: "rust lang".to_owned(), page: 3 });

        let native = FakeRequest::new("GET", "/").query("q=rust");
        assert!(matches!(snapshot(&native).query_as::<Search>(), Err(ExtractError::Deserialize { .. })));
    }

    #[test]
    fn test_content_helpers() {
        let native = FakeRequest::new("POST", "/")
            .header("Content-Type", "application/json; charset=utf-8")
            .header("Content-Length", "17");
        let request = snapshot(&native);
        assert!(request.is_json());
        assert!(!request.is_form());
        assert_eq!(request.content_length(), Some(17));

        let native = FakeRequest::new("POST", "/").header("content-type", "application/x-www-form-urlencoded");
        let request = snapshot(&native);
        assert!(request.is_form());
        assert!(!request.is_json());
        assert_eq!(request.content_length(), None);

        let native = FakeRequest::new("POST", "/").header("content-type", "application/vnd.api+json");
        assert!(snapshot(&native).is_json());
    }
}

//! Resource limits applied while bridging a request.

use loopbridge_protocol::query::MAX_QUERY_PARAMS;
use loopbridge_protocol::route::ParamValidation;
use serde::Deserialize;

pub const DEFAULT_MAX_HEADERS: usize = 100;
pub const DEFAULT_MAX_PARAMS: usize = 100;
pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// What happens when a header list or capture list is cut at its limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Truncation {
    /// Drop the excess without a trace.
    #[default]
    Silent,
    /// Drop the excess and emit a `warn!` event.
    Warn,
}

/// Limits used by the [`Dispatcher`](crate::Dispatcher) and the objects it builds.
///
/// Every field has a default, so a partial configuration deserializes:
///
/// ```
/// use loopbridge::{Limits, Truncation};
///
/// let limits: Limits = serde_json::from_str(r#"{ "max_headers": 32, "truncation": "warn" }"#).unwrap();
/// assert_eq!(limits.max_headers, 32);
/// assert_eq!(limits.truncation, Truncation::Warn);
/// assert_eq!(limits.max_params, 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_headers: usize,
    pub max_params: usize,
    pub max_query_params: usize,
    pub max_body_size: usize,
    pub truncation: Truncation,
    pub route_validation: ParamValidation,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_headers: DEFAULT_MAX_HEADERS,
            max_params: DEFAULT_MAX_PARAMS,
            max_query_params: MAX_QUERY_PARAMS,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            truncation: Truncation::Silent,
            route_validation: ParamValidation::Lenient,
        }
    }
}

impl Limits {
    pub fn max_headers(mut self, max_headers: usize) -> Self {
        self.max_headers = max_headers;
        self
    }

    pub fn max_params(mut self, max_params: usize) -> Self {
        self.max_params = max_params;
        self
    }

    pub fn max_query_params(mut self, max_query_params: usize) -> Self {
        self.max_query_params = max_query_params;
        self
    }

    pub fn max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub fn truncation(mut self, truncation: Truncation) -> Self {
        self.truncation = truncation;
        self
    }

    pub fn route_validation(mut self, route_validation: ParamValidation) -> Self {
        self.route_validation = route_validation;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let limits = Limits::default();
        assert_eq!(limits.max_headers, 100);
        assert_eq!(limits.max_params, 100);
        assert_eq!(limits.max_query_params, 1000);
        assert_eq!(limits.max_body_size, 16 * 1024 * 1024);
        assert_eq!(limits.truncation, Truncation::Silent);
        assert_eq!(limits.route_validation, ParamValidation::Lenient);
    }

    #[test]
    fn test_deserialize_partial() {
        let limits: Limits = serde_json::from_str(r#"{ "route_validation": "strict", "max_body_size": 1024 }"#).unwrap();
        assert_eq!(limits, Limits::default().route_validation(ParamValidation::Strict).max_body_size(1024));
    }

    #[test]
    fn test_deserialize_rejects_unknown_truncation() {
        assert!(serde_json::from_str::<Limits>(r#"{ "truncation": "loud" }"#).is_err());
    }
}

use std::error::Error;

use loopbridge_protocol::{QueryError, RouteError};
use thiserror::Error;

/// The error type handler code reports to the dispatcher.
pub type HandlerError = Box<dyn Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum BodyError {
    #[error("connection aborted before the request body completed")]
    Aborted,

    #[error("request body exceeds the limit of {limit} bytes")]
    TooLarge { limit: usize },

    #[error("request body is not valid utf-8")]
    InvalidUtf8,

    #[error("request body is not valid json: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("request body is not a valid form: {source}")]
    Form {
        #[from]
        source: QueryError,
    },
}

impl BodyError {
    pub fn too_large(limit: usize) -> Self {
        Self::TooLarge { limit }
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("query string cannot be deserialized: {source}")]
    Deserialize {
        #[from]
        source: serde_urlencoded::de::Error,
    },
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("route compilation failed: {source}")]
    Route {
        #[from]
        source: RouteError,
    },

    #[error("async routes need a tokio runtime, none was configured")]
    MissingRuntime,
}

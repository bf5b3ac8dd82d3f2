use thiserror::Error;

/// Broad classification of protocol failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller supplied a value that cannot be represented safely; fixing the input fixes it.
    InvalidArgument,
    /// The input exceeded a hard limit that bounds decoding cost.
    ResourceLimitExceeded,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("query error: {source}")]
    Query {
        #[from]
        source: QueryError,
    },

    #[error("route error: {source}")]
    Route {
        #[from]
        source: RouteError,
    },

    #[error("cookie error: {source}")]
    Cookie {
        #[from]
        source: CookieError,
    },

    #[error("header error: {source}")]
    Header {
        #[from]
        source: HeaderError,
    },
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Query { source } => source.kind(),
            Self::Route { .. } | Self::Cookie { .. } | Self::Header { .. } => ErrorKind::InvalidArgument,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("query parameter number exceed the limit {max_num}")]
    TooManyParameters { max_num: usize },
}

impl QueryError {
    pub fn too_many_parameters(max_num: usize) -> Self {
        Self::TooManyParameters { max_num }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ResourceLimitExceeded
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("empty route parameter name in segment {segment}")]
    EmptyParameterName { segment: usize },

    #[error("duplicate route parameter name: {name}")]
    DuplicateParameterName { name: String },

    #[error("invalid route parameter name: {name}")]
    InvalidParameterName { name: String },
}

impl RouteError {
    pub fn duplicate<S: ToString>(name: S) -> Self {
        Self::DuplicateParameterName { name: name.to_string() }
    }

    pub fn invalid<S: ToString>(name: S) -> Self {
        Self::InvalidParameterName { name: name.to_string() }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieError {
    #[error("invalid character in cookie name")]
    InvalidName,

    #[error("invalid character in cookie value")]
    InvalidValue,

    #[error("invalid character in cookie path")]
    InvalidPath,

    #[error("invalid character in cookie domain")]
    InvalidDomain,

    #[error("invalid character in cookie expires")]
    InvalidExpires,

    #[error("invalid character in cookie samesite")]
    InvalidSameSite,

    #[error("samesite=none requires the secure attribute")]
    SameSiteNoneRequiresSecure,

    #[error("control character in assembled cookie")]
    InvalidCookie,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("invalid header name: {name:?}")]
    InvalidName { name: String },

    #[error("invalid characters in header value of {name:?}")]
    InvalidValue { name: String },
}

impl HeaderError {
    pub fn invalid_name<S: ToString>(name: S) -> Self {
        Self::InvalidName { name: name.to_string() }
    }

    pub fn invalid_value<S: ToString>(name: S) -> Self {
        Self::InvalidValue { name: name.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_errors() {
        let query: ProtocolError = QueryError::too_many_parameters(1000).into();
        assert_eq!(query.kind(), ErrorKind::ResourceLimitExceeded);

        let cookie: ProtocolError = CookieError::InvalidValue.into();
        assert_eq!(cookie.kind(), ErrorKind::InvalidArgument);

        let header: ProtocolError = HeaderError::invalid_value("x-header").into();
        assert_eq!(header.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            QueryError::too_many_parameters(1000).to_string(),
            "query parameter number exceed the limit 1000"
        );
        assert_eq!(CookieError::InvalidPath.to_string(), "invalid character in cookie path");
    }
}

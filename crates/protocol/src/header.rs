//! Response header validation
//!
//! The engine writes header names and values to the socket verbatim, so a value carrying CR or
//! LF would split the response. Names must be valid HTTP tokens and values may contain visible
//! characters, spaces, horizontal tabs and obs-text, but no other control character.

use http::{HeaderName, HeaderValue};

use crate::HeaderError;

/// Checks that `name: value` can be written as a single response header line.
///
/// # Errors
///
/// Returns [`HeaderError::InvalidName`] if `name` is not a valid header name and
/// [`HeaderError::InvalidValue`] if `value` contains a forbidden control character.
pub fn validate_header(name: &str, value: &str) -> Result<(), HeaderError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_e| HeaderError::invalid_name(name))?;
    HeaderValue::from_str(value).map_err(|_e| HeaderError::invalid_value(name))?;
    Ok(())
}

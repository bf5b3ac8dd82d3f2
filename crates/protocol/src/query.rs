//! Query string decoding
//!
//! Decodes the raw query component of a URL (the part after `?`, without the `?`) into a mapping
//! from key to every value that appeared for it, in order of appearance.
//!
//! The decoder follows the `application/x-www-form-urlencoded` shape:
//!
//! - pairs are separated by `&`, empty pairs are skipped
//! - key and value are separated by the first `=`, a pair without `=` has an empty value
//! - `+` decodes to a space, `%XX` decodes to the byte `XX`
//! - an invalid or truncated escape is kept as a literal `%`
//! - a decoded NUL byte is replaced with `?`
//!
//! The number of pairs is bounded by a limit checked before anything is decoded, so a hostile
//! query string costs at most one scan of the input.

use std::collections::HashMap;
use std::collections::hash_map;

use tracing::trace;

use crate::QueryError;

/// Default maximum number of non-empty `&`-separated pairs accepted by [`decode_query`].
pub const MAX_QUERY_PARAMS: usize = 1000;

/// Decoded query parameters.
///
/// Every key maps to a non-empty list of values, ordered as they appeared in the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    data: HashMap<String, Vec<String>>,
}

impl QueryParams {
    /// Returns every value recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.data.get(key).map(Vec::as_slice)
    }

    /// Returns the first value recorded for `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|values| values.first()).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, Vec<String>> {
        self.data.iter()
    }

    pub fn into_inner(self) -> HashMap<String, Vec<String>> {
        self.data
    }
}

impl<'a> IntoIterator for &'a QueryParams {
    type Item = (&'a String, &'a Vec<String>);
    type IntoIter = hash_map::Iter<'a, String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

/// Decodes `raw` with the default limit of [`MAX_QUERY_PARAMS`] pairs.
///
/// # Errors
///
/// Returns [`QueryError::TooManyParameters`] if the query string holds more than
/// [`MAX_QUERY_PARAMS`] non-empty pairs.
pub fn decode_query(raw: &str) -> Result<QueryParams, QueryError> {
    decode_query_with_limit(raw, MAX_QUERY_PARAMS)
}

/// Decodes `raw`, accepting at most `max_params` non-empty pairs.
///
/// # Errors
///
/// Returns [`QueryError::TooManyParameters`] if the limit is exceeded. Decoding itself never
/// fails.
pub fn decode_query_with_limit(raw: &str, max_params: usize) -> Result<QueryParams, QueryError> {
    let pair_count = pairs(raw).take(max_params.saturating_add(1)).count();
    if pair_count > max_params {
        trace!(max_num = max_params, "query string exceeds the parameter limit");
        return Err(QueryError::too_many_parameters(max_params));
    }

    let mut data: HashMap<String, Vec<String>> = HashMap::with_capacity(pair_count);
    for pair in pairs(raw) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        data.entry(percent_decode(key)).or_default().push(percent_decode(value));
    }

    Ok(QueryParams { data })
}

fn pairs(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('&').filter(|pair| !pair.is_empty())
}

/// Percent-decodes one query component.
///
/// `+` becomes a space, a valid `%XX` escape becomes its byte, anything else is copied as is.
/// A decoded NUL byte is replaced with `?`, and the resulting bytes are interpreted as UTF-8
/// with invalid sequences replaced by U+FFFD.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    if !bytes.iter().any(|&b| matches!(b, b'%' | b'+' | 0)) {
        return input.to_owned();
    }

    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        let byte = match bytes[index] {
            b'+' => b' ',
            b'%' => match (bytes.get(index + 1).copied().and_then(hex), bytes.get(index + 2).copied().and_then(hex)) {
                (Some(high), Some(low)) => {
                    index += 2;
                    (high << 4) | low
                }
                _ => b'%',
            },
            other => other,
        };
        decoded.push(if byte == 0 { b'?' } else { byte });
        index += 1;
    }

    match String::from_utf8(decoded) {
        Ok(string) => string,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

#[inline]
fn hex(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

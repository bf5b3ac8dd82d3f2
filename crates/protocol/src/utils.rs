//! Utility macros used internally by the protocol crate.

/// A macro for early returns with an error if a condition is not met.
///
/// This is similar to the `assert!` macro, but returns an error instead of panicking.
/// Validation code in this crate runs its checks in a fixed order, and each check is a single
/// `ensure!` line.
///
/// # Arguments
///
/// * `$predicate` - A boolean expression that should evaluate to true
/// * `$error` - The error value to return if the predicate is false
///
/// # Example
///
/// ```ignore
/// ensure!(!name.is_empty(), CookieError::InvalidName);
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;

/// Returns true for ASCII control characters, including DEL.
#[inline]
pub(crate) fn is_control(c: char) -> bool {
    c.is_ascii_control()
}

/// Returns true if the attribute value could terminate or inject a cookie attribute.
#[inline]
pub(crate) fn is_unsafe_attribute(value: &str) -> bool {
    value.chars().any(|c| c == ';' || is_control(c))
}

//! `Set-Cookie` header value rendering
//!
//! A [`Cookie`] collects the attributes of one cookie; [`format_cookie`] validates them and
//! renders the value of a single `Set-Cookie` header. Validation rejects every input that could
//! end an attribute early or start a new header line, so the rendered value can be written as a
//! header without further escaping.
//!
//! Attributes are rendered in a fixed order: `Max-Age`, `Expires`, `Path`, `Domain`, `Secure`,
//! `HttpOnly`, `SameSite`.

use crate::utils::{is_control, is_unsafe_attribute};
use crate::{CookieError, ensure};

/// `Expires` value used when asking the client to drop a cookie.
pub const EXPIRED: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Attributes of one cookie.
///
/// `path` defaults to `/` and `same_site` to `Lax`; every other attribute is absent by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    max_age: Option<i64>,
    expires: Option<String>,
    path: String,
    domain: Option<String>,
    secure: bool,
    http_only: bool,
    same_site: Option<String>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: None,
            expires: None,
            path: "/".to_owned(),
            domain: None,
            secure: false,
            http_only: false,
            same_site: Some("Lax".to_owned()),
        }
    }

    /// A cookie that tells the client to delete `name`: empty value, `Max-Age=0` and an
    /// `Expires` date in the past.
    pub fn removal(name: impl Into<String>) -> Self {
        Self::new(name, "").max_age(0).expires(EXPIRED)
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Sets the `Expires` attribute; the value must already be an HTTP date.
    pub fn expires(mut self, date: impl Into<String>) -> Self {
        self.expires = Some(date.into());
        self
    }

    /// Sets the `Path` attribute; an empty path omits it.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Sets the `SameSite` token, `None` omits the attribute.
    pub fn same_site(mut self, same_site: Option<&str>) -> Self {
        self.same_site = same_site.map(str::to_owned);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Validates and renders this cookie, see [`format_cookie`].
    ///
    /// # Errors
    ///
    /// Returns the [`CookieError`] of the first failed check.
    pub fn to_header_value(&self) -> Result<String, CookieError> {
        format_cookie(self)
    }
}

/// Validates `cookie` and renders the value of its `Set-Cookie` header.
///
/// Checks run in order and the first failure is returned:
///
/// 1. every name character is a cookie token character, else [`CookieError::InvalidName`]
/// 2. the value contains no `;`, else [`CookieError::InvalidValue`]; values with spaces, quotes,
///    commas, backslashes or control characters are quoted
/// 3. path, domain, expires and same-site contain no `;` and no control character
/// 4. `SameSite=None` comes with `Secure`, else [`CookieError::SameSiteNoneRequiresSecure`]
/// 5. the assembled line contains no control character, else [`CookieError::InvalidCookie`]
///
/// # Errors
///
/// Returns the [`CookieError`] of the first failed check.
pub fn format_cookie(cookie: &Cookie) -> Result<String, CookieError> {
    ensure!(!cookie.name.is_empty() && cookie.name.chars().all(is_token_char), CookieError::InvalidName);
    ensure!(!cookie.value.contains(';'), CookieError::InvalidValue);

    let path = Some(cookie.path.as_str()).filter(|path| !path.is_empty());
    ensure!(!path.is_some_and(is_unsafe_attribute), CookieError::InvalidPath);

    let domain = cookie.domain.as_deref().filter(|domain| !domain.is_empty());
    ensure!(!domain.is_some_and(is_unsafe_attribute), CookieError::InvalidDomain);

    let same_site = cookie.same_site.as_deref().filter(|same_site| !same_site.is_empty());
    ensure!(!same_site.is_some_and(is_unsafe_attribute), CookieError::InvalidSameSite);
    ensure!(
        cookie.secure || !same_site.is_some_and(|same_site| same_site.eq_ignore_ascii_case("none")),
        CookieError::SameSiteNoneRequiresSecure
    );

    let expires = cookie.expires.as_deref().filter(|expires| !expires.is_empty());
    ensure!(!expires.is_some_and(is_unsafe_attribute), CookieError::InvalidExpires);

    let mut line = String::with_capacity(cookie.name.len() + cookie.value.len() + 64);
    line.push_str(&cookie.name);
    line.push('=');
    push_value(&mut line, &cookie.value);

    if let Some(max_age) = cookie.max_age {
        line.push_str("; Max-Age=");
        line.push_str(&max_age.to_string());
    }
    if let Some(expires) = expires {
        line.push_str("; Expires=");
        line.push_str(expires);
    }
    if let Some(path) = path {
        line.push_str("; Path=");
        line.push_str(path);
    }
    if let Some(domain) = domain {
        line.push_str("; Domain=");
        line.push_str(domain);
    }
    if cookie.secure {
        line.push_str("; Secure");
    }
    if cookie.http_only {
        line.push_str("; HttpOnly");
    }
    if let Some(same_site) = same_site {
        line.push_str("; SameSite=");
        line.push_str(same_site);
    }

    ensure!(!line.chars().any(is_control), CookieError::InvalidCookie);
    Ok(line)
}

/// Returns true for characters allowed in a cookie name (RFC 6265 token).
pub fn is_token_char(c: char) -> bool {
    matches!(c, '!'..='~')
        && !matches!(
            c,
            '"' | ',' | '/' | '{' | '}' | '(' | ')' | '<' | '>' | '@' | '[' | ']' | '\\' | ':' | ';' | '=' | '?'
        )
}

fn needs_quoting(value: &str) -> bool {
    value.chars().any(|c| matches!(c, ' ' | '"' | ',' | ';' | '\\') || is_control(c))
}

fn push_value(line: &mut String, value: &str) {
    if !needs_quoting(value) {
        line.push_str(value);
        return;
    }

    line.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            line.push('\\');
        }
        line.push(c);
    }
    line.push('"');
}

//! Route template compilation
//!
//! Route templates use `/`-separated segments where a segment of the exact form `{name}` is a
//! positional capture. The engine's matcher uses `:name` for the same thing and reports captures
//! by position only, so compilation produces both the matcher pattern and the ordered list of
//! parameter names that gives each position its name.
//!
//! ```
//! use loopbridge_protocol::route::compile_route_path;
//!
//! let route = compile_route_path("/users/{id}/posts/{postId}");
//! assert_eq!(route.pattern(), "/users/:id/posts/:postId");
//! assert_eq!(route.param_names(), ["id", "postId"]);
//! ```
//!
//! Compilation runs once per route registration, never per request.

use serde::Deserialize;

use crate::{RouteError, ensure};

/// A compiled route: the engine matcher pattern and the names of its positional captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    pattern: String,
    param_names: Vec<String>,
}

impl RoutePattern {
    /// The pattern in the engine's matcher syntax, always starting with `/`.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Parameter names in left-to-right segment order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Position of the capture called `name`, the first one if the name repeats.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.param_names.iter().position(|param| param == name)
    }

    pub fn into_parts(self) -> (String, Vec<String>) {
        (self.pattern, self.param_names)
    }
}

/// How strictly parameter names are checked during compilation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamValidation {
    /// Any text between the braces is accepted, duplicates included.
    #[default]
    Lenient,
    /// Names must be non-empty, unique, and made of ASCII letters, digits and `_`.
    Strict,
}

/// Compiles `template` without validating parameter names.
pub fn compile_route_path(template: &str) -> RoutePattern {
    let mut pattern = String::with_capacity(template.len() + 1);
    let mut param_names = Vec::new();

    for segment in segments(template) {
        pattern.push('/');
        match param_name(segment) {
            Some(name) => {
                pattern.push(':');
                pattern.push_str(name);
                param_names.push(name.to_owned());
            }
            None => pattern.push_str(segment),
        }
    }

    if pattern.is_empty() {
        pattern.push('/');
    }

    RoutePattern { pattern, param_names }
}

/// Compiles `template`, checking parameter names according to `validation`.
///
/// # Errors
///
/// With [`ParamValidation::Strict`], returns a [`RouteError`] for an empty, duplicate or
/// malformed parameter name. [`ParamValidation::Lenient`] never fails.
pub fn compile_route_path_with(template: &str, validation: ParamValidation) -> Result<RoutePattern, RouteError> {
    let route = compile_route_path(template);
    if validation == ParamValidation::Strict {
        validate_names(template)?;
    }
    Ok(route)
}

fn validate_names(template: &str) -> Result<(), RouteError> {
    let mut seen: Vec<&str> = Vec::new();
    for (index, segment) in segments(template).enumerate() {
        let Some(name) = param_name(segment) else {
            continue;
        };

        ensure!(!name.is_empty(), RouteError::EmptyParameterName { segment: index });
        ensure!(name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_'), RouteError::invalid(name));
        ensure!(!seen.contains(&name), RouteError::duplicate(name));
        seen.push(name);
    }
    Ok(())
}

fn segments(template: &str) -> impl Iterator<Item = &str> {
    template.split('/').filter(|segment| !segment.is_empty())
}

#[inline]
fn param_name(segment: &str) -> Option<&str> {
    segment.strip_prefix('{').and_then(|rest| rest.strip_suffix('}'))
}

//! Route definitions.
//!
//! This module provides [`Route`], the registered description of one
//! endpoint: its path pattern, the methods, schemes and hosts it accepts,
//! placeholder constraints and defaults, and the opaque handler and
//! middleware references passed through to the caller. It offers a fluent
//! builder API.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Stable identifier of a route, assigned in registration order.
pub type RouteId = usize;

/// Methods accepted by [`Route::any`].
pub const ALL_METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS", "TRACE", "CONNECT",
];

/// Methods a route accepts when none are given.
pub const DEFAULT_METHODS: &[&str] = &["GET", "HEAD"];

/// A registered route.
///
/// # Example
///
/// ```rust
/// use waypoint_router::Route;
///
/// let route = Route::post("users/{id:int}", "users.update")
///     .method("put")
///     .scheme("HTTPS")
///     .default("format", "json")
///     .middleware("auth")
///     .name("users.update");
///
/// assert_eq!(route.path(), "/users/{id:int}");
/// assert!(route.allows_method("PUT"));
/// assert!(route.allows_scheme("https"));
/// assert_eq!(route.handler(), "users.update");
/// assert_eq!(route.route_name(), Some("users.update"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    path: String,
    methods: BTreeSet<String>,
    schemes: BTreeSet<String>,
    hosts: Vec<String>,
    placeholders: IndexMap<String, String>,
    defaults: IndexMap<String, String>,
    middlewares: Vec<String>,
    handler: String,
    name: Option<String>,
}

impl Route {
    /// Creates a route with no explicit methods.
    ///
    /// The route table fills in its default methods (`GET` and `HEAD` unless
    /// configured otherwise) when such a route is added.
    #[must_use]
    pub fn new(path: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            path: normalize_path(path.into()),
            methods: BTreeSet::new(),
            schemes: BTreeSet::new(),
            hosts: Vec::new(),
            placeholders: IndexMap::new(),
            defaults: IndexMap::new(),
            middlewares: Vec::new(),
            handler: handler.into(),
            name: None,
        }
    }

    /// Creates a route accepting the given methods.
    #[must_use]
    pub fn with_methods<I, M>(methods: I, path: impl Into<String>, handler: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = M>,
        M: AsRef<str>,
    {
        let mut route = Self::new(path, handler);
        for method in methods {
            route = route.method(method);
        }
        route
    }

    /// Creates a GET route.
    #[must_use]
    pub fn get(path: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new(path, handler).method("GET")
    }

    /// Creates a POST route.
    #[must_use]
    pub fn post(path: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new(path, handler).method("POST")
    }

    /// Creates a PUT route.
    #[must_use]
    pub fn put(path: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new(path, handler).method("PUT")
    }

    /// Creates a PATCH route.
    #[must_use]
    pub fn patch(path: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new(path, handler).method("PATCH")
    }

    /// Creates a DELETE route.
    #[must_use]
    pub fn delete(path: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new(path, handler).method("DELETE")
    }

    /// Creates an OPTIONS route.
    #[must_use]
    pub fn options(path: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new(path, handler).method("OPTIONS")
    }

    /// Creates a route accepting every standard method.
    #[must_use]
    pub fn any(path: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::with_methods(ALL_METHODS.iter().copied(), path, handler)
    }

    /// Adds an accepted method. Methods are stored upper-cased.
    #[must_use]
    pub fn method(mut self, method: impl AsRef<str>) -> Self {
        self.methods.insert(method.as_ref().to_ascii_uppercase());
        self
    }

    /// Adds an accepted scheme. Schemes are stored lower-cased.
    #[must_use]
    pub fn scheme(mut self, scheme: impl AsRef<str>) -> Self {
        self.schemes.insert(scheme.as_ref().to_ascii_lowercase());
        self
    }

    /// Adds an accepted host pattern, e.g. `{tenant}.example.com`.
    #[must_use]
    pub fn host(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        if !self.hosts.contains(&pattern) {
            self.hosts.push(pattern);
        }
        self
    }

    /// Constrains a placeholder with a regular expression or alias name.
    ///
    /// An inline constraint in the pattern takes precedence.
    #[must_use]
    pub fn assert(mut self, name: impl Into<String>, requirement: impl Into<String>) -> Self {
        self.placeholders.insert(name.into(), requirement.into());
        self
    }

    /// Sets a default argument value.
    #[must_use]
    pub fn default(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// Appends a middleware reference.
    #[must_use]
    pub fn middleware(mut self, middleware: impl Into<String>) -> Self {
        self.middlewares.push(middleware.into());
        self
    }

    /// Names the route for URI generation.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Fills in `methods` when the route declares none.
    ///
    /// An empty `defaults` falls back to [`DEFAULT_METHODS`] so a route
    /// always allows at least one method.
    pub(crate) fn apply_default_methods<S: AsRef<str>>(&mut self, defaults: &[S]) {
        if !self.methods.is_empty() {
            return;
        }
        if defaults.is_empty() {
            self.methods = DEFAULT_METHODS.iter().map(|m| (*m).to_string()).collect();
        } else {
            self.methods = defaults
                .iter()
                .map(|m| m.as_ref().to_ascii_uppercase())
                .collect();
        }
    }

    /// Returns the path pattern, always starting with `/`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the accepted methods.
    #[must_use]
    pub fn methods(&self) -> &BTreeSet<String> {
        &self.methods
    }

    /// Returns the accepted schemes; empty means any.
    #[must_use]
    pub fn schemes(&self) -> &BTreeSet<String> {
        &self.schemes
    }

    /// Returns the host patterns; empty means any.
    #[must_use]
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Returns the placeholder constraints.
    #[must_use]
    pub fn placeholders(&self) -> &IndexMap<String, String> {
        &self.placeholders
    }

    /// Returns the default argument values.
    #[must_use]
    pub fn defaults(&self) -> &IndexMap<String, String> {
        &self.defaults
    }

    /// Returns the middleware references in declaration order.
    #[must_use]
    pub fn middlewares(&self) -> &[String] {
        &self.middlewares
    }

    /// Returns the handler reference.
    #[must_use]
    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Returns the route name.
    #[must_use]
    pub fn route_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns true if the route accepts the (upper-cased) method.
    #[must_use]
    pub fn allows_method(&self, method: &str) -> bool {
        self.methods.contains(method)
    }

    /// Returns true if the route accepts the (lower-cased) scheme.
    #[must_use]
    pub fn allows_scheme(&self, scheme: &str) -> bool {
        self.schemes.is_empty() || self.schemes.contains(scheme)
    }
}

fn normalize_path(path: String) -> String {
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}

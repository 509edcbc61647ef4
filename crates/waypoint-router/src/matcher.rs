//! Request matching.
//!
//! [`CompiledRoutes::match_request`] answers "which route handles this
//! request, and with which arguments?". Candidates are collected from the
//! static index first, then from every dynamic bucket whose prefix applies,
//! and are checked in that order against method, host and scheme. A
//! candidate that fails a check is not an error by itself; the reasons are
//! accumulated and only reported once every candidate is exhausted.

use std::collections::BTreeSet;
use std::sync::Arc;

use metrics::counter;
use percent_encoding::percent_decode_str;
use regex::Captures;
use tracing::trace;

use crate::arguments::Arguments;
use crate::error::MatchError;
use crate::route::{Route, RouteId};
use crate::table::{CompiledRoute, CompiledRoutes};

/// The request tuple a route is matched against.
///
/// # Example
///
/// ```rust
/// use waypoint_router::MatchRequest;
///
/// let request = MatchRequest::new("get", "users/42?tab=posts")
///     .with_scheme("HTTPS")
///     .with_host("Example.com:8443");
///
/// assert_eq!(request.method(), "GET");
/// assert_eq!(request.path(), "/users/42");
/// assert_eq!(request.scheme(), "https");
/// assert_eq!(request.host(), Some("Example.com:8443"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRequest {
    method: String,
    scheme: String,
    host: Option<String>,
    path: String,
}

impl MatchRequest {
    /// Creates a request for `method` and `path`.
    ///
    /// The query string and fragment are dropped, an empty path becomes `/`
    /// and a missing leading slash is added. The scheme defaults to `http`.
    #[must_use]
    pub fn new(method: impl AsRef<str>, path: impl AsRef<str>) -> Self {
        Self {
            method: method.as_ref().to_ascii_uppercase(),
            scheme: "http".to_string(),
            host: None,
            path: normalize_path(path.as_ref()),
        }
    }

    /// Sets the scheme.
    #[must_use]
    pub fn with_scheme(mut self, scheme: impl AsRef<str>) -> Self {
        self.scheme = scheme.as_ref().to_ascii_lowercase();
        self
    }

    /// Sets the host, optionally with a `:port` suffix.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Builds a match request from an HTTP request.
    ///
    /// Scheme and authority come from the request URI when it is absolute,
    /// otherwise the `Host` header supplies the host.
    #[must_use]
    pub fn from_http<B>(request: &http::Request<B>) -> Self {
        let uri = request.uri();
        let mut matched = Self::new(request.method().as_str(), uri.path());

        if let Some(scheme) = uri.scheme_str() {
            matched = matched.with_scheme(scheme);
        }

        let host = uri.authority().map(|a| a.as_str().to_string()).or_else(|| {
            request
                .headers()
                .get(http::header::HOST)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        });
        if let Some(host) = host {
            matched = matched.with_host(host);
        }

        matched
    }

    /// Returns the upper-cased method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the lower-cased scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns the host as given, including any port.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Returns the normalized path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Host candidates tried against host patterns: `host:port`, then the
    /// bare host.
    fn host_candidates(&self) -> impl Iterator<Item = &str> {
        let full = self.host.as_deref().unwrap_or_default();
        let bare = split_port(full);
        std::iter::once(full).chain((bare != full).then_some(bare))
    }
}

fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn split_port(host: &str) -> &str {
    // IPv6 literals keep their brackets: `[::1]:8080` -> `[::1]`.
    match host.rfind(':') {
        Some(colon) if !host[colon..].contains(']') => &host[..colon],
        _ => host,
    }
}

/// A successful match.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    id: RouteId,
    route: Arc<Route>,
    arguments: Arguments,
}

impl RouteMatch {
    /// Returns the id of the matched route.
    #[must_use]
    pub fn id(&self) -> RouteId {
        self.id
    }

    /// Returns the matched route.
    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Returns a shared handle to the matched route.
    #[must_use]
    pub fn shared_route(&self) -> Arc<Route> {
        Arc::clone(&self.route)
    }

    /// Returns the extracted arguments.
    #[must_use]
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Consumes the match, returning its arguments.
    #[must_use]
    pub fn into_arguments(self) -> Arguments {
        self.arguments
    }
}

/// Mismatch reasons gathered across candidates.
#[derive(Debug, Default)]
struct Rejections {
    methods: BTreeSet<String>,
    hosts: BTreeSet<String>,
    schemes: BTreeSet<String>,
}

impl Rejections {
    fn into_error(self, request: &MatchRequest) -> MatchError {
        let path = request.path.clone();
        if !self.methods.is_empty() {
            MatchError::MethodNotAllowed {
                method: request.method.clone(),
                path,
                allowed: self.methods,
            }
        } else if !self.hosts.is_empty() {
            MatchError::HostNotAllowed {
                host: request.host.clone().unwrap_or_default(),
                path,
                allowed: self.hosts,
            }
        } else if !self.schemes.is_empty() {
            MatchError::SchemeNotAllowed {
                scheme: request.scheme.clone(),
                path,
                allowed: self.schemes,
            }
        } else {
            MatchError::NotFound {
                method: request.method.clone(),
                path,
            }
        }
    }
}

impl CompiledRoutes {
    /// Matches a request against the table.
    ///
    /// Static routes are tried before dynamic ones. Among dynamic routes the
    /// earliest-registered one that accepts the request wins.
    ///
    /// # Errors
    ///
    /// When no candidate accepts the request the error reports, in order of
    /// precedence, a method mismatch, a host mismatch, a scheme mismatch, or
    /// that nothing matched the path at all.
    ///
    /// # Example
    ///
    /// ```rust
    /// use waypoint_router::{MatchError, MatchRequest, Route, RouteTable};
    ///
    /// let mut table = RouteTable::new();
    /// table.add(Route::with_methods(["GET", "HEAD"], "/ping", "ping")).unwrap();
    /// let compiled = table.build().unwrap();
    ///
    /// let err = compiled.match_request(&MatchRequest::new("POST", "/ping")).unwrap_err();
    /// assert_eq!(err.allow_header().as_deref(), Some("GET, HEAD"));
    /// ```
    pub fn match_request(&self, request: &MatchRequest) -> Result<RouteMatch, MatchError> {
        let result = self.find(request);
        let outcome = match &result {
            Ok(_) => "matched",
            Err(err) => err.outcome(),
        };
        counter!("waypoint_route_matches_total", "outcome" => outcome).increment(1);
        result
    }

    fn find(&self, request: &MatchRequest) -> Result<RouteMatch, MatchError> {
        let mut rejections = Rejections::default();

        for id in self.static_ids(request.path()) {
            if let Some(matched) = self.assert_route(*id, request, None, &mut rejections) {
                return Ok(matched);
            }
        }

        let mut candidates = Vec::new();
        for bucket in self.buckets.iter().filter(|b| b.applies_to(request.path())) {
            bucket.candidates(request.path(), &mut candidates);
        }
        candidates.sort_unstable();
        candidates.dedup();

        for id in candidates {
            let captures = self.routes[id].path_regex().captures(request.path());
            if captures.is_none() {
                continue;
            }
            if let Some(matched) = self.assert_route(id, request, captures, &mut rejections) {
                return Ok(matched);
            }
        }

        Err(rejections.into_error(request))
    }

    fn assert_route(
        &self,
        id: RouteId,
        request: &MatchRequest,
        path_captures: Option<Captures<'_>>,
        rejections: &mut Rejections,
    ) -> Option<RouteMatch> {
        let compiled = &self.routes[id];
        let route = compiled.route();

        if !route.allows_method(request.method()) {
            trace!(route = id, method = request.method(), "Rejected: method");
            rejections.methods.extend(route.methods().iter().cloned());
            return None;
        }

        let mut host_arguments = Vec::new();
        if !route.hosts().is_empty() {
            let Some(captures) = match_host(compiled, request) else {
                trace!(route = id, host = ?request.host(), "Rejected: host");
                rejections.hosts.extend(route.hosts().iter().cloned());
                return None;
            };
            host_arguments = captures;
        }

        if !route.allows_scheme(request.scheme()) {
            trace!(route = id, scheme = request.scheme(), "Rejected: scheme");
            rejections.schemes.extend(route.schemes().iter().cloned());
            return None;
        }

        let arguments = merge_arguments(compiled, host_arguments, path_captures);
        Some(RouteMatch {
            id,
            route: compiled.shared_route(),
            arguments,
        })
    }
}

/// Returns the captured host placeholders of the first host pattern that
/// matches.
fn match_host(compiled: &CompiledRoute, request: &MatchRequest) -> Option<Vec<(String, String)>> {
    request.host()?;
    for (pattern, regex) in compiled.host_patterns().iter().zip(compiled.host_regexes()) {
        for candidate in request.host_candidates() {
            if let Some(captures) = regex.captures(candidate) {
                return Some(
                    pattern
                        .variables()
                        .keys()
                        .filter_map(|name| {
                            captures
                                .name(name)
                                .map(|m| (name.clone(), m.as_str().to_string()))
                        })
                        .collect(),
                );
            }
        }
    }
    None
}

/// Defaults first, then host captures, then percent-decoded path captures.
fn merge_arguments(
    compiled: &CompiledRoute,
    host_arguments: Vec<(String, String)>,
    path_captures: Option<Captures<'_>>,
) -> Arguments {
    let path = compiled.path_pattern();
    let mut arguments = Arguments::new();

    for pattern in std::iter::once(path).chain(compiled.host_patterns()) {
        for (name, default) in pattern.variables() {
            if let Some(default) = default {
                arguments.insert(name.as_str(), default.as_str());
            }
        }
    }
    for (name, value) in compiled.route().defaults() {
        arguments.insert(name.as_str(), value.as_str());
    }
    for (name, value) in host_arguments {
        arguments.insert(name, value);
    }
    if let Some(captures) = path_captures {
        for name in path.variables().keys() {
            if let Some(value) = captures.name(name) {
                arguments.insert(
                    name.as_str(),
                    percent_decode_str(value.as_str()).decode_utf8_lossy(),
                );
            }
        }
    }

    arguments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::RouteTable;

    fn build(routes: Vec<Route>) -> CompiledRoutes {
        let mut table = RouteTable::new();
        for route in routes {
            table.add(route).unwrap();
        }
        table.build().unwrap()
    }

    fn get(path: &str) -> MatchRequest {
        MatchRequest::new("GET", path)
    }

    #[test]
    fn test_request_normalization() {
        assert_eq!(get("").path(), "/");
        assert_eq!(get("users").path(), "/users");
        assert_eq!(get("/users?page=2").path(), "/users");
        assert_eq!(get("/users#top").path(), "/users");
        assert_eq!(MatchRequest::new("delete", "/").method(), "DELETE");
    }

    #[test]
    fn test_split_port() {
        assert_eq!(split_port("example.com:8080"), "example.com");
        assert_eq!(split_port("example.com"), "example.com");
        assert_eq!(split_port("[::1]:8080"), "[::1]");
        assert_eq!(split_port("[::1]"), "[::1]");
    }

    #[test]
    fn test_from_http() {
        let request = http::Request::builder()
            .method("PUT")
            .uri("/users/1?x=y")
            .header("host", "api.example.com")
            .body(())
            .unwrap();
        let matched = MatchRequest::from_http(&request);
        assert_eq!(matched.method(), "PUT");
        assert_eq!(matched.path(), "/users/1");
        assert_eq!(matched.host(), Some("api.example.com"));
        assert_eq!(matched.scheme(), "http");

        let request = http::Request::builder()
            .uri("https://shop.example.com:8443/cart")
            .body(())
            .unwrap();
        let matched = MatchRequest::from_http(&request);
        assert_eq!(matched.scheme(), "https");
        assert_eq!(matched.host(), Some("shop.example.com:8443"));
    }

    #[test]
    fn test_inline_requirement_match() {
        let routes = build(vec![Route::get(r"/foo/{bar:\d+}", "foo")]);

        let matched = routes.match_request(&get("/foo/123")).unwrap();
        assert_eq!(matched.arguments().get("bar"), Some("123"));

        let err = routes.match_request(&get("/foo/abc")).unwrap_err();
        assert!(matches!(err, MatchError::NotFound { .. }));
    }

    #[test]
    fn test_static_wins_over_dynamic() {
        let routes = build(vec![
            Route::get("/a/{x}", "dynamic"),
            Route::get("/a/fixed", "static"),
        ]);

        let matched = routes.match_request(&get("/a/fixed")).unwrap();
        assert_eq!(matched.route().handler(), "static");
        assert!(matched.arguments().is_empty());

        let matched = routes.match_request(&get("/a/other")).unwrap();
        assert_eq!(matched.route().handler(), "dynamic");
    }

    #[test]
    fn test_static_method_mismatch_falls_through() {
        let routes = build(vec![
            Route::post("/a/fixed", "static"),
            Route::get("/a/{x}", "dynamic"),
        ]);
        let matched = routes.match_request(&get("/a/fixed")).unwrap();
        assert_eq!(matched.route().handler(), "dynamic");
        assert_eq!(matched.arguments().get("x"), Some("fixed"));
    }

    #[test]
    fn test_first_registered_wins() {
        let routes = build(vec![
            Route::get("/users/{id}", "users"),
            Route::get("/{section}/{id}", "generic"),
        ]);
        let matched = routes.match_request(&get("/users/7")).unwrap();
        assert_eq!(matched.route().handler(), "users");

        // The generic route sits in the "/" bucket, which is evaluated last,
        // yet it was registered first.
        let routes = build(vec![
            Route::get("/{section}/{id}", "generic"),
            Route::get("/users/{id}", "users"),
        ]);
        let matched = routes.match_request(&get("/users/7")).unwrap();
        assert_eq!(matched.route().handler(), "generic");
    }

    #[test]
    fn test_same_path_different_methods() {
        let routes = build(vec![
            Route::get("/users/{id}", "show"),
            Route::delete("/users/{id}", "destroy"),
        ]);
        let matched = routes
            .match_request(&MatchRequest::new("DELETE", "/users/9"))
            .unwrap();
        assert_eq!(matched.id(), 1);
        assert_eq!(matched.route().handler(), "destroy");
    }

    #[test]
    fn test_method_not_allowed_collects_union() {
        let routes = build(vec![
            Route::get("/items/{id}", "show"),
            Route::put("/items/{id}", "update"),
        ]);
        let err = routes
            .match_request(&MatchRequest::new("POST", "/items/1"))
            .unwrap_err();
        match err {
            MatchError::MethodNotAllowed { allowed, .. } => {
                let allowed: Vec<_> = allowed.into_iter().collect();
                assert_eq!(allowed, vec!["GET", "PUT"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_method_beats_scheme() {
        let routes = build(vec![Route::post("/secure", "secure").scheme("https")]);
        let err = routes
            .match_request(&MatchRequest::new("GET", "/secure").with_scheme("http"))
            .unwrap_err();
        assert!(matches!(err, MatchError::MethodNotAllowed { .. }));
    }

    #[test]
    fn test_scheme_not_allowed() {
        let routes = build(vec![Route::get("/secure", "secure").scheme("https")]);

        let err = routes.match_request(&get("/secure")).unwrap_err();
        assert!(matches!(err, MatchError::SchemeNotAllowed { ref scheme, .. } if scheme == "http"));

        let ok = routes.match_request(&get("/secure").with_scheme("https"));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_host_patterns() {
        let routes = build(vec![
            Route::get("/dashboard", "tenant").host("{tenant}.example.com"),
        ]);

        let matched = routes
            .match_request(&get("/dashboard").with_host("acme.example.com:8080"))
            .unwrap();
        assert_eq!(matched.arguments().get("tenant"), Some("acme"));

        let err = routes
            .match_request(&get("/dashboard").with_host("example.org"))
            .unwrap_err();
        assert!(matches!(err, MatchError::HostNotAllowed { .. }));

        let err = routes.match_request(&get("/dashboard")).unwrap_err();
        assert!(matches!(err, MatchError::HostNotAllowed { .. }));
    }

    #[test]
    fn test_host_with_port_pattern() {
        let routes = build(vec![Route::get("/", "local").host("localhost:{port:int}")]);
        let matched = routes
            .match_request(&get("/").with_host("localhost:3000"))
            .unwrap();
        assert_eq!(matched.arguments().get("port"), Some("3000"));
    }

    #[test]
    fn test_host_beats_scheme() {
        let routes = build(vec![Route::get("/x", "x").host("a.test").scheme("https")]);
        let err = routes
            .match_request(&get("/x").with_host("b.test"))
            .unwrap_err();
        assert!(matches!(err, MatchError::HostNotAllowed { .. }));
    }

    #[test]
    fn test_optional_group_arguments() {
        let routes = build(vec![Route::get("/foo[/{bar}]", "foo")]);

        let matched = routes.match_request(&get("/foo")).unwrap();
        assert!(!matched.arguments().contains("bar"));

        let matched = routes.match_request(&get("/foo/anything")).unwrap();
        assert_eq!(matched.arguments().get("bar"), Some("anything"));
    }

    #[test]
    fn test_defaults_fill_absent_placeholders() {
        let routes = build(vec![
            Route::get("/blog[/{page=1}]", "blog").default("format", "html"),
        ]);

        let matched = routes.match_request(&get("/blog")).unwrap();
        assert_eq!(matched.arguments().get("page"), Some("1"));
        assert_eq!(matched.arguments().get("format"), Some("html"));

        let matched = routes.match_request(&get("/blog/3")).unwrap();
        assert_eq!(matched.arguments().get("page"), Some("3"));
    }

    #[test]
    fn test_trailing_slash_is_strict() {
        let routes = build(vec![Route::get("/users", "users")]);
        assert!(routes.match_request(&get("/users/")).is_err());
    }

    #[test]
    fn test_not_found() {
        let routes = build(vec![Route::get("/users", "users")]);
        let err = routes.match_request(&get("/nope")).unwrap_err();
        assert_eq!(
            err,
            MatchError::NotFound {
                method: "GET".to_string(),
                path: "/nope".to_string(),
            }
        );
    }

    #[test]
    fn test_chunked_buckets_preserve_order() {
        let mut table = RouteTable::with_options(
            crate::table::RouterOptions::default().with_chunk_size(1),
        );
        table.add(Route::get("/p/{a:int}", "int")).unwrap();
        table.add(Route::get("/p/{a}", "any")).unwrap();
        let routes = table.build().unwrap();

        assert_eq!(routes.match_request(&get("/p/5")).unwrap().route().handler(), "int");
        assert_eq!(routes.match_request(&get("/p/x")).unwrap().route().handler(), "any");
    }
}

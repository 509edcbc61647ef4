//! Reverse routing: building URIs from routes.
//!
//! [`UriGenerator`] walks the token tree of a compiled pattern and fills in
//! placeholder values. Optional groups are emitted only when one of their
//! placeholders carries a value that differs from its default, so
//! `/blog[/{page=1}]` generates `/blog` for page 1 and `/blog/2` for page 2.
//!
//! # Example
//!
//! ```rust
//! use waypoint_router::{GenerateParams, ReferenceType, Route, RouteTable, UriGenerator};
//!
//! let mut table = RouteTable::new();
//! table.add(Route::get("/users/{id:int}[/{tab=profile}]", "users.show").name("user")).unwrap();
//! let routes = table.build().unwrap();
//!
//! let generator = UriGenerator::new();
//! let route = routes.by_name("user").unwrap();
//!
//! let uri = generator
//!     .generate(route, &GenerateParams::new().arg("id", "42"), ReferenceType::AbsolutePath)
//!     .unwrap();
//! assert_eq!(uri.to_string(), "/users/42");
//!
//! let params = GenerateParams::new().arg("id", "42").arg("tab", "posts").arg("page", "2");
//! let uri = generator.generate(route, &params, ReferenceType::AbsolutePath).unwrap();
//! assert_eq!(uri.to_string(), "/users/42/posts?page=2");
//! ```
//!
//! Path values have spaces, `%`, `?`, `#`, control and non-ASCII bytes
//! percent-encoded. The matcher decodes path captures, so a generated URI
//! matches back to the values it was built from.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::GenerateError;
use crate::pattern::{CompiledPattern, Token};
use crate::table::CompiledRoute;

/// Characters escaped in placeholder values rendered into a path.
const PATH_VALUE: &AsciiSet = &CONTROLS.add(b' ').add(b'#').add(b'%').add(b'?');

/// The form of a generated URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceType {
    /// `/path`
    #[default]
    AbsolutePath,
    /// `./path`
    RelativePath,
    /// `//host/path`
    NetworkPath,
    /// `scheme://host/path`
    AbsoluteUrl,
}

/// Ambient request data used when a route declares no host or scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    scheme: String,
    host: Option<String>,
    port: Option<u16>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: None,
            port: None,
        }
    }
}

impl RequestContext {
    /// Creates a context for `scheme://host`.
    #[must_use]
    pub fn new(scheme: impl AsRef<str>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.as_ref().to_ascii_lowercase(),
            host: Some(host.into()),
            port: None,
        }
    }

    /// Sets the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Returns the scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Returns the port.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

/// Values used to fill placeholders.
///
/// Named values are matched by placeholder name. Positional values fill the
/// placeholders that received no named value, in pattern order; surplus
/// positional values are ignored. Named values that are not placeholders of
/// the route end up in the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateParams {
    named: IndexMap<String, String>,
    positional: Vec<String>,
}

impl GenerateParams {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named value.
    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    /// Adds a positional value.
    #[must_use]
    pub fn positional(mut self, value: impl Into<String>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Returns the named values.
    #[must_use]
    pub fn named(&self) -> &IndexMap<String, String> {
        &self.named
    }

    /// Returns the positional values.
    #[must_use]
    pub fn positionals(&self) -> &[String] {
        &self.positional
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for GenerateParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            named: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            positional: Vec::new(),
        }
    }
}

/// A generated URI.
///
/// Rendering follows the [`ReferenceType`] it was generated for; forms that
/// need a host fall back to the absolute path when none is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUri {
    reference: ReferenceType,
    scheme: String,
    host: Option<String>,
    port: Option<u16>,
    path: String,
    query: Option<String>,
}

impl GeneratedUri {
    /// Returns a copy with the given port.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::InvalidPort`] for ports above 65535.
    pub fn with_port(mut self, port: u32) -> Result<Self, GenerateError> {
        let port = u16::try_from(port).map_err(|_| GenerateError::InvalidPort { port })?;
        self.port = Some(port);
        Ok(self)
    }

    /// Returns a copy rendered as another reference type.
    #[must_use]
    pub fn with_reference(mut self, reference: ReferenceType) -> Self {
        self.reference = reference;
        self
    }

    /// Returns the reference type.
    #[must_use]
    pub fn reference(&self) -> ReferenceType {
        self.reference
    }

    /// Returns the scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Returns the port.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns the path, always starting with `/`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the encoded query string without the leading `?`.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    fn default_port(&self) -> Option<u16> {
        match self.scheme.as_str() {
            "http" | "ws" => Some(80),
            "https" | "wss" => Some(443),
            _ => None,
        }
    }

    fn write_authority(&self, f: &mut fmt::Formatter<'_>, host: &str) -> fmt::Result {
        f.write_str(host)?;
        match self.port {
            Some(port) if Some(port) != self.default_port() => write!(f, ":{port}"),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for GeneratedUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.reference, self.host.as_deref()) {
            (ReferenceType::AbsoluteUrl, Some(host)) => {
                write!(f, "{}://", self.scheme)?;
                self.write_authority(f, host)?;
            }
            (ReferenceType::NetworkPath, Some(host)) => {
                f.write_str("//")?;
                self.write_authority(f, host)?;
            }
            (ReferenceType::RelativePath, _) => f.write_str(".")?,
            _ => {}
        }
        f.write_str(&self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}

/// Builds URIs from compiled routes.
#[derive(Debug, Clone, Default)]
pub struct UriGenerator {
    context: RequestContext,
}

impl UriGenerator {
    /// Creates a generator with a default `http` context and no host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a generator with the given ambient context.
    #[must_use]
    pub fn with_context(context: RequestContext) -> Self {
        Self { context }
    }

    /// Returns the ambient context.
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Generates a URI for `route`.
    ///
    /// # Errors
    ///
    /// - [`GenerateError::InvalidParameter`] when a value does not satisfy
    ///   its placeholder constraint.
    /// - [`GenerateError::MissingParameters`] when required placeholders have
    ///   neither a value nor a default.
    pub fn generate(
        &self,
        route: &CompiledRoute,
        params: &GenerateParams,
        reference: ReferenceType,
    ) -> Result<GeneratedUri, GenerateError> {
        let path_pattern = route.path_pattern();
        let values = assign_values(path_pattern, params);

        let mut renderer = Renderer {
            route,
            values: &values,
            missing: Vec::new(),
            encode: true,
        };

        let mut path = String::new();
        renderer.render(path_pattern.tokens(), &mut path)?;

        let mut host = None;
        if let Some(host_pattern) = route.host_patterns().first() {
            renderer.encode = false;
            let mut rendered = String::new();
            renderer.render(host_pattern.tokens(), &mut rendered)?;
            host = Some(rendered);
        }

        if !renderer.missing.is_empty() {
            return Err(GenerateError::MissingParameters {
                route: path_pattern.pattern().to_string(),
                names: renderer.missing,
            });
        }

        let mut consumed: HashSet<&str> = path_pattern.variables().keys().map(String::as_str).collect();
        if let Some(host_pattern) = route.host_patterns().first() {
            consumed.extend(host_pattern.variables().keys().map(String::as_str));
        }
        let extra: Vec<(&str, &str)> = params
            .named()
            .iter()
            .filter(|(name, _)| !consumed.contains(name.as_str()))
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        let query = if extra.is_empty() {
            None
        } else {
            Some(serde_urlencoded::to_string(&extra)?)
        };

        let schemes = route.route().schemes();
        let scheme = if schemes.is_empty() || schemes.contains(self.context.scheme()) {
            self.context.scheme().to_string()
        } else {
            schemes.iter().next().cloned().unwrap_or_default()
        };

        let port = if host.is_some() { None } else { self.context.port() };
        let host = host.or_else(|| self.context.host().map(str::to_string));

        Ok(GeneratedUri {
            reference,
            scheme,
            host,
            port,
            path,
            query,
        })
    }
}

/// Resolves named and positional values to placeholder names.
fn assign_values(pattern: &CompiledPattern, params: &GenerateParams) -> IndexMap<String, String> {
    let mut values = params.named().clone();
    let mut positional = params.positionals().iter();
    for name in pattern.variables().keys() {
        if values.contains_key(name) {
            continue;
        }
        match positional.next() {
            Some(value) => {
                values.insert(name.clone(), value.clone());
            }
            None => break,
        }
    }
    values
}

struct Renderer<'a> {
    route: &'a CompiledRoute,
    values: &'a IndexMap<String, String>,
    missing: Vec<String>,
    encode: bool,
}

impl Renderer<'_> {
    fn push_value(&self, value: &str, out: &mut String) {
        if self.encode {
            out.extend(utf8_percent_encode(value, PATH_VALUE));
        } else {
            out.push_str(value);
        }
    }

    fn render(&mut self, tokens: &[Token], out: &mut String) -> Result<(), GenerateError> {
        for token in tokens {
            match token {
                Token::Literal { text } => out.push_str(text),
                Token::Placeholder { name, .. } => {
                    if let Some(value) = self.values.get(name) {
                        self.validate(name, value)?;
                        self.push_value(value, out);
                    } else if let Some(default) = self.route.default_for(name) {
                        self.push_value(default, out);
                    } else {
                        self.missing.push(name.clone());
                    }
                }
                Token::Optional { tokens } => {
                    if self.is_needed(tokens) {
                        self.render(tokens, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// A group is needed when one of its placeholders has a supplied value
    /// that differs from its default.
    fn is_needed(&self, tokens: &[Token]) -> bool {
        tokens.iter().any(|token| match token {
            Token::Literal { .. } => false,
            Token::Placeholder { name, .. } => self
                .values
                .get(name)
                .is_some_and(|value| self.route.default_for(name) != Some(value.as_str())),
            Token::Optional { tokens } => self.is_needed(tokens),
        })
    }

    fn validate(&self, name: &str, value: &str) -> Result<(), GenerateError> {
        match self.route.validator(name) {
            Some(regex) if !regex.is_match(value) => Err(GenerateError::invalid_parameter(
                self.route.path_pattern().pattern(),
                name,
                value,
                self.route
                    .path_pattern()
                    .requirement(name)
                    .or_else(|| {
                        self.route
                            .host_patterns()
                            .iter()
                            .find_map(|host| host.requirement(name))
                    })
                    .unwrap_or_default(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Route;
    use crate::table::{CompiledRoutes, RouteTable};

    fn build(route: Route) -> CompiledRoutes {
        let mut table = RouteTable::new();
        table.add(route).unwrap();
        table.build().unwrap()
    }

    fn path(route: Route, params: GenerateParams) -> Result<String, GenerateError> {
        let routes = build(route);
        UriGenerator::new()
            .generate(routes.get(0).unwrap(), &params, ReferenceType::AbsolutePath)
            .map(|uri| uri.to_string())
    }

    #[test]
    fn test_static_route() {
        assert_eq!(path(Route::get("/about", "about"), GenerateParams::new()).unwrap(), "/about");
    }

    #[test]
    fn test_required_default_is_substituted() {
        let generated = path(Route::get("/foo/{bar=0}", "foo"), GenerateParams::new()).unwrap();
        assert_eq!(generated, "/foo/0");
    }

    #[test]
    fn test_optional_group_collapses() {
        let route = || Route::get("/foo[/{bar}]", "foo");
        assert_eq!(path(route(), GenerateParams::new()).unwrap(), "/foo");
        assert_eq!(
            path(route(), GenerateParams::new().arg("bar", "baz")).unwrap(),
            "/foo/baz"
        );
    }

    #[test]
    fn test_optional_value_equal_to_default_collapses() {
        let route = || Route::get("/blog[/{page=1}]", "blog");
        assert_eq!(path(route(), GenerateParams::new().arg("page", "1")).unwrap(), "/blog");
        assert_eq!(path(route(), GenerateParams::new().arg("page", "2")).unwrap(), "/blog/2");
    }

    #[test]
    fn test_nested_groups() {
        let route = || Route::get("/archive[/{year}[/{month}]]", "archive");
        assert_eq!(path(route(), GenerateParams::new()).unwrap(), "/archive");
        assert_eq!(
            path(route(), GenerateParams::new().arg("year", "2024")).unwrap(),
            "/archive/2024"
        );
        assert_eq!(
            path(route(), GenerateParams::new().arg("year", "2024").arg("month", "07")).unwrap(),
            "/archive/2024/07"
        );

        let err = path(route(), GenerateParams::new().arg("month", "07")).unwrap_err();
        assert!(matches!(err, GenerateError::MissingParameters { ref names, .. } if names == &["year"]));
    }

    #[test]
    fn test_missing_parameters_lists_all() {
        let err = path(Route::get("/{a}/{b}/{c=1}", "x"), GenerateParams::new()).unwrap_err();
        match err {
            GenerateError::MissingParameters { names, route } => {
                assert_eq!(names, vec!["a", "b"]);
                assert_eq!(route, "/{a}/{b}/{c=1}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_parameter() {
        let err = path(
            Route::get(r"/foo/{bar:\d+}", "foo"),
            GenerateParams::new().arg("bar", "abc"),
        )
        .unwrap_err();
        match err {
            GenerateError::InvalidParameter {
                name,
                value,
                expected,
                ..
            } => {
                assert_eq!(name, "bar");
                assert_eq!(value, "abc");
                assert_eq!(expected, r"\d+");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validation_is_anchored() {
        let err = path(
            Route::get("/n/{id:int}", "n"),
            GenerateParams::new().arg("id", "12a"),
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_positional_values() {
        let generated = path(
            Route::get("/users/{id}/posts/{post}", "x"),
            GenerateParams::new().arg("post", "9").positional("3").positional("unused"),
        )
        .unwrap();
        assert_eq!(generated, "/users/3/posts/9");
    }

    #[test]
    fn test_reserved_characters_are_encoded() {
        let route = || Route::get("/q/{term}", "search");
        assert_eq!(
            path(route(), GenerateParams::new().arg("term", "a?b")).unwrap(),
            "/q/a%3Fb"
        );
        assert_eq!(
            path(route(), GenerateParams::new().arg("term", "a#b c")).unwrap(),
            "/q/a%23b%20c"
        );
        assert_eq!(
            path(route(), GenerateParams::new().arg("term", "100%")).unwrap(),
            "/q/100%25"
        );
        assert_eq!(
            path(route(), GenerateParams::new().arg("term", "caf\u{e9}")).unwrap(),
            "/q/caf%C3%A9"
        );
    }

    #[test]
    fn test_extra_values_become_query() {
        let generated = path(
            Route::get("/search", "search"),
            GenerateParams::new().arg("q", "rust lang").arg("page", "2"),
        )
        .unwrap();
        assert_eq!(generated, "/search?q=rust+lang&page=2");
    }

    #[test]
    fn test_route_default_used_for_generation() {
        let generated = path(
            Route::get("/list/{sort}", "list").default("sort", "asc"),
            GenerateParams::new(),
        )
        .unwrap();
        assert_eq!(generated, "/list/asc");
    }

    #[test]
    fn test_reference_types() {
        let routes = build(Route::get("/users/{id}", "users"));
        let route = routes.get(0).unwrap();
        let generator = UriGenerator::with_context(RequestContext::new("https", "example.com"));
        let params = GenerateParams::new().arg("id", "5");

        let render = |reference| generator.generate(route, &params, reference).unwrap().to_string();
        assert_eq!(render(ReferenceType::AbsolutePath), "/users/5");
        assert_eq!(render(ReferenceType::RelativePath), "./users/5");
        assert_eq!(render(ReferenceType::NetworkPath), "//example.com/users/5");
        assert_eq!(render(ReferenceType::AbsoluteUrl), "https://example.com/users/5");
    }

    #[test]
    fn test_route_host_and_scheme_win() {
        let routes = build(
            Route::get("/dashboard", "dash")
                .host("{tenant}.example.com")
                .scheme("https"),
        );
        let generator = UriGenerator::with_context(RequestContext::new("http", "fallback.test"));
        let uri = generator
            .generate(
                routes.get(0).unwrap(),
                &GenerateParams::new().arg("tenant", "acme"),
                ReferenceType::AbsoluteUrl,
            )
            .unwrap();

        assert_eq!(uri.to_string(), "https://acme.example.com/dashboard");
    }

    #[test]
    fn test_without_host_falls_back_to_path() {
        let routes = build(Route::get("/x", "x"));
        let uri = UriGenerator::new()
            .generate(routes.get(0).unwrap(), &GenerateParams::new(), ReferenceType::AbsoluteUrl)
            .unwrap();
        assert_eq!(uri.to_string(), "/x");
    }

    #[test]
    fn test_with_port() {
        let routes = build(Route::get("/x", "x"));
        let uri = UriGenerator::with_context(RequestContext::new("http", "example.com"))
            .generate(routes.get(0).unwrap(), &GenerateParams::new(), ReferenceType::AbsoluteUrl)
            .unwrap();

        let custom = uri.clone().with_port(8080).unwrap();
        assert_eq!(custom.to_string(), "http://example.com:8080/x");

        let default = uri.clone().with_port(80).unwrap();
        assert_eq!(default.to_string(), "http://example.com/x");

        let err = uri.with_port(70_000).unwrap_err();
        assert!(matches!(err, GenerateError::InvalidPort { port: 70_000 }));
    }
}

//! Error types for route compilation, matching and generation.
//!
//! Each stage of the router has its own error enum so callers can react to
//! exactly the failures that stage produces:
//!
//! | Stage | Error | Raised by |
//! |---|---|---|
//! | Compilation | [`PatternError`] | [`PatternCompiler`](crate::PatternCompiler) |
//! | Matching | [`MatchError`] | [`CompiledRoutes::match_request`](crate::CompiledRoutes::match_request) |
//! | Generation | [`GenerateError`] | [`UriGenerator`](crate::UriGenerator) |
//! | Persistence | [`CacheError`] | [`cache`](crate::cache) |
//!
//! [`RouterError`] wraps all of them for callers that only want one type.

use std::collections::BTreeSet;
use std::path::PathBuf;

use http::StatusCode;
use thiserror::Error;

/// Result type alias using [`RouterError`].
pub type RouterResult<T> = Result<T, RouterError>;

/// Errors raised while compiling a path or host pattern.
#[derive(Error, Debug)]
pub enum PatternError {
    /// The same placeholder name appears twice in one pattern.
    #[error("route pattern \"{pattern}\" cannot reference variable name \"{name}\" more than once")]
    DuplicateVariable {
        /// The offending pattern.
        pattern: String,
        /// The repeated placeholder name.
        name: String,
    },

    /// A placeholder name exceeds the maximum length.
    #[error("variable name \"{name}\" cannot be longer than {max} characters in route pattern \"{pattern}\"")]
    NameTooLong {
        /// The offending pattern.
        pattern: String,
        /// The placeholder name.
        name: String,
        /// The maximum allowed length.
        max: usize,
    },

    /// A placeholder name starts with a digit.
    #[error("variable name \"{name}\" cannot start with a digit in route pattern \"{pattern}\"")]
    NameStartsWithDigit {
        /// The offending pattern.
        pattern: String,
        /// The placeholder name.
        name: String,
    },

    /// A placeholder name is empty or contains non-word characters.
    #[error("invalid variable name \"{name}\" in route pattern \"{pattern}\"")]
    InvalidName {
        /// The offending pattern.
        pattern: String,
        /// The placeholder name.
        name: String,
    },

    /// A placeholder constraint is empty once anchors are stripped.
    #[error("routing requirement for \"{name}\" cannot be empty in route pattern \"{pattern}\"")]
    EmptyRequirement {
        /// The offending pattern.
        pattern: String,
        /// The placeholder name.
        name: String,
    },

    /// An optional group `[` ... `]` is not balanced.
    #[error("unbalanced optional group at byte {position} in route pattern \"{pattern}\"")]
    UnbalancedGroup {
        /// The offending pattern.
        pattern: String,
        /// Byte offset of the stray bracket.
        position: usize,
    },

    /// A placeholder `{` is never closed.
    #[error("unclosed placeholder at byte {position} in route pattern \"{pattern}\"")]
    UnclosedPlaceholder {
        /// The offending pattern.
        pattern: String,
        /// Byte offset of the opening brace.
        position: usize,
    },

    /// The emitted regular expression failed to compile.
    #[error("route pattern \"{pattern}\" produced an invalid regular expression")]
    InvalidRegex {
        /// The offending pattern.
        pattern: String,
        /// The regex engine error.
        #[source]
        source: regex::Error,
    },
}

impl PatternError {
    /// Returns the pattern that failed to compile.
    #[must_use]
    pub fn pattern(&self) -> &str {
        match self {
            Self::DuplicateVariable { pattern, .. }
            | Self::NameTooLong { pattern, .. }
            | Self::NameStartsWithDigit { pattern, .. }
            | Self::InvalidName { pattern, .. }
            | Self::EmptyRequirement { pattern, .. }
            | Self::UnbalancedGroup { pattern, .. }
            | Self::UnclosedPlaceholder { pattern, .. }
            | Self::InvalidRegex { pattern, .. } => pattern,
        }
    }

    /// Returns the placeholder name involved, if the error concerns one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::DuplicateVariable { name, .. }
            | Self::NameTooLong { name, .. }
            | Self::NameStartsWithDigit { name, .. }
            | Self::InvalidName { name, .. }
            | Self::EmptyRequirement { name, .. } => Some(name),
            Self::UnbalancedGroup { .. }
            | Self::UnclosedPlaceholder { .. }
            | Self::InvalidRegex { .. } => None,
        }
    }
}

/// Errors raised when no route accepts a request.
///
/// The variants are ordered by precedence: when several candidates were
/// rejected for different reasons, the method mismatch wins over the host
/// mismatch, which wins over the scheme mismatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// No route path matched the request path.
    #[error("no route found for \"{method} {path}\"")]
    NotFound {
        /// The request method.
        method: String,
        /// The request path.
        path: String,
    },

    /// At least one route path matched, but none accepted the method.
    #[error("route \"{path}\" does not allow method {method}; allowed: {}", join(.allowed))]
    MethodNotAllowed {
        /// The request method.
        method: String,
        /// The request path.
        path: String,
        /// Union of the methods of every path-matching route.
        allowed: BTreeSet<String>,
    },

    /// Path and method matched, but the host was rejected.
    #[error("route \"{path}\" is not available on host \"{host}\"; allowed: {}", join(.allowed))]
    HostNotAllowed {
        /// The request host (with port when present).
        host: String,
        /// The request path.
        path: String,
        /// Host patterns of the rejected routes.
        allowed: BTreeSet<String>,
    },

    /// Path and method matched, but the scheme was rejected.
    #[error("route \"{path}\" does not allow scheme \"{scheme}\"; allowed: {}", join(.allowed))]
    SchemeNotAllowed {
        /// The request scheme.
        scheme: String,
        /// The request path.
        path: String,
        /// Union of the schemes of the rejected routes.
        allowed: BTreeSet<String>,
    },
}

impl MatchError {
    /// Returns the HTTP status code a caller should answer with.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::HostNotAllowed { .. } | Self::SchemeNotAllowed { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// Returns the value of the `Allow` header for a 405 response.
    #[must_use]
    pub fn allow_header(&self) -> Option<String> {
        match self {
            Self::MethodNotAllowed { allowed, .. } => Some(join(allowed)),
            _ => None,
        }
    }

    /// Returns the request path that failed to match.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::NotFound { path, .. }
            | Self::MethodNotAllowed { path, .. }
            | Self::HostNotAllowed { path, .. }
            | Self::SchemeNotAllowed { path, .. } => path,
        }
    }

    /// Short label used for metrics and logs.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::MethodNotAllowed { .. } => "method_not_allowed",
            Self::HostNotAllowed { .. } => "host_not_allowed",
            Self::SchemeNotAllowed { .. } => "scheme_not_allowed",
        }
    }
}

/// Errors raised while generating a URI from a route.
#[derive(Error, Debug)]
pub enum GenerateError {
    /// No route carries the requested name.
    #[error("unable to generate a URL for the named route \"{name}\" as such route does not exist")]
    RouteNotFound {
        /// The requested route name.
        name: String,
    },

    /// Required placeholders had neither a value nor a default.
    #[error("some mandatory parameters are missing ({}) to generate a URL for route \"{route}\"", .names.join(", "))]
    MissingParameters {
        /// The route pattern.
        route: String,
        /// Names of the unresolved placeholders, in pattern order.
        names: Vec<String>,
    },

    /// A supplied value does not satisfy the placeholder constraint.
    #[error("parameter \"{name}\" for route \"{route}\" must match \"{expected}\" (\"{value}\" given)")]
    InvalidParameter {
        /// The route pattern.
        route: String,
        /// The placeholder name.
        name: String,
        /// The supplied value.
        value: String,
        /// The constraint the value had to match.
        expected: String,
    },

    /// A port outside `0..=65535` was requested.
    #[error("invalid port {port}: must be between 0 and 65535")]
    InvalidPort {
        /// The rejected port.
        port: u32,
    },

    /// Query arguments could not be encoded.
    #[error("failed to encode query string: {0}")]
    Query(#[from] serde_urlencoded::ser::Error),
}

impl GenerateError {
    /// Creates a route-not-found error.
    pub fn route_not_found(name: impl Into<String>) -> Self {
        Self::RouteNotFound { name: name.into() }
    }

    /// Creates an invalid-parameter error.
    pub fn invalid_parameter(
        route: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            route: route.into(),
            name: name.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }
}

/// Errors raised while reading or writing the persisted route table.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The cache file could not be read or written.
    #[error("route cache I/O failed for {path}")]
    Io {
        /// Path of the cache file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The cache file is not valid JSON for this format.
    #[error("route cache is not valid: {0}")]
    Json(#[from] serde_json::Error),

    /// The cache was written by an incompatible format version.
    #[error("route cache version {found} is not supported (expected {expected})")]
    VersionMismatch {
        /// Version found in the file.
        found: u32,
        /// Version this build writes.
        expected: u32,
    },

    /// A stored regular expression no longer compiles.
    #[error("route cache contains an invalid regular expression")]
    Regex(#[from] regex::Error),

    /// The cache refers to routes that do not exist.
    #[error("route cache is corrupt: {0}")]
    Corrupt(String),
}

impl CacheError {
    /// Creates an I/O error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a corrupt-cache error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }
}

/// Umbrella error for the router.
#[derive(Error, Debug)]
pub enum RouterError {
    /// A route pattern failed to compile.
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// Two routes share the same name.
    #[error("route name \"{name}\" is already in use")]
    DuplicateRouteName {
        /// The duplicated name.
        name: String,
    },

    /// No route accepted the request.
    #[error(transparent)]
    Match(#[from] MatchError),

    /// URI generation failed.
    #[error(transparent)]
    Generate(#[from] GenerateError),

    /// The persisted table could not be used.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl RouterError {
    /// Creates a duplicate route name error.
    pub fn duplicate_route_name(name: impl Into<String>) -> Self {
        Self::DuplicateRouteName { name: name.into() }
    }
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

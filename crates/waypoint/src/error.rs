//! Dispatch errors and their HTTP responses.

use http::header::{HeaderValue, ALLOW};
use http::StatusCode;
use thiserror::Error;
use waypoint_router::{MatchError, RouterError};

use crate::types::{Response, ResponseExt};

/// Errors raised while dispatching a request.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// No route accepted the request.
    #[error(transparent)]
    Match(#[from] MatchError),

    /// The route table could not be compiled.
    #[error("route table unavailable: {0}")]
    Router(RouterError),

    /// The matched route's handler reference resolved to nothing.
    #[error("no handler registered for \"{reference}\"")]
    UnknownHandler {
        /// The handler reference declared on the route.
        reference: String,
    },

    /// A middleware reference on the matched route resolved to nothing.
    #[error("no middleware registered for \"{reference}\" (handler \"{handler}\")")]
    UnknownMiddleware {
        /// The middleware reference declared on the route.
        reference: String,
        /// The route's handler reference.
        handler: String,
    },
}

impl From<RouterError> for DispatchError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::Match(err) => Self::Match(err),
            other => Self::Router(other),
        }
    }
}

impl DispatchError {
    /// Create an unknown handler error.
    pub fn unknown_handler(reference: impl Into<String>) -> Self {
        Self::UnknownHandler {
            reference: reference.into(),
        }
    }

    /// Create an unknown middleware error.
    pub fn unknown_middleware(reference: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::UnknownMiddleware {
            reference: reference.into(),
            handler: handler.into(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Match(err) => err.status_code(),
            Self::Router(_) | Self::UnknownHandler { .. } | Self::UnknownMiddleware { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the machine-readable error code used in response bodies.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Match(MatchError::NotFound { .. }) => "ROUTE_NOT_FOUND",
            Self::Match(MatchError::MethodNotAllowed { .. }) => "METHOD_NOT_ALLOWED",
            Self::Match(MatchError::HostNotAllowed { .. }) => "HOST_NOT_ALLOWED",
            Self::Match(MatchError::SchemeNotAllowed { .. }) => "SCHEME_NOT_ALLOWED",
            Self::Router(_) | Self::UnknownHandler { .. } | Self::UnknownMiddleware { .. } => {
                "INTERNAL_ERROR"
            }
        }
    }

    /// Converts the error into a JSON error response.
    ///
    /// 405 responses carry an `Allow` header. Internal failures do not
    /// expose their details.
    #[must_use]
    pub fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Match(err) => err.to_string(),
            _ => "internal server error".to_string(),
        };

        let mut response = Response::json_error(status, self.code(), &message);

        if let Self::Match(err) = &self {
            if let Some(allow) = err.allow_header() {
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(ALLOW, value);
                }
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn method_not_allowed() -> MatchError {
        MatchError::MethodNotAllowed {
            method: "POST".to_string(),
            path: "/ping".to_string(),
            allowed: BTreeSet::from(["GET".to_string(), "HEAD".to_string()]),
        }
    }

    #[test]
    fn test_router_error_conversion() {
        let err = DispatchError::from(RouterError::Match(method_not_allowed()));
        assert!(matches!(err, DispatchError::Match(_)));

        let err = DispatchError::from(RouterError::duplicate_route_name("home"));
        assert!(matches!(err, DispatchError::Router(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_method_not_allowed_response() {
        let response = DispatchError::from(method_not_allowed()).into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(ALLOW).unwrap(), "GET, HEAD");
    }

    #[test]
    fn test_status_codes() {
        let not_found = DispatchError::from(MatchError::NotFound {
            method: "GET".to_string(),
            path: "/missing".to_string(),
        });
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.code(), "ROUTE_NOT_FOUND");

        let scheme = DispatchError::from(MatchError::SchemeNotAllowed {
            scheme: "http".to_string(),
            path: "/pay".to_string(),
            allowed: BTreeSet::from(["https".to_string()]),
        });
        assert_eq!(scheme.status_code(), StatusCode::BAD_REQUEST);

        let handler = DispatchError::unknown_handler("users.show");
        assert_eq!(handler.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(handler.to_string().contains("users.show"));
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let response = DispatchError::unknown_middleware("auth", "admin").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(ALLOW).is_none());
    }
}

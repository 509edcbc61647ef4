//! Route compilation and matching engine for Waypoint.
//!
//! This crate turns route patterns such as `/blog/{year:year}[/{slug}]` into
//! anchored regular expressions, partitions a route set into an O(1) static
//! index and prefix-bucketed dynamic chunks, matches requests against it with
//! precise failure reasons, and builds URIs back from routes.
//!
//! # Features
//!
//! - **Pattern Compiler**: placeholders, inline constraints, defaults and
//!   nested optional groups
//! - **Placeholder Aliases**: `{id:int}`, `{slug:slug}`, extensible per router
//! - **Static/Dynamic Partitioning**: exact-path lookup before regex work
//! - **Chunked Dispatch**: one [`regex::RegexSet`] pass per chunk of routes
//! - **Typed Failures**: 404, 405 with the allowed methods, host and scheme
//!   rejections
//! - **Reverse Routing**: URI generation with optional-group collapsing
//! - **Persisted Tables**: JSON cache written atomically, reloaded verbatim
//!
//! # Example
//!
//! ```rust
//! use waypoint_router::{MatchError, MatchRequest, Route, Router, RouterError};
//!
//! let mut router = Router::new();
//!
//! // Add routes
//! router.add(Route::get("/users", "users.list")).unwrap();
//! router.add(Route::get("/users/{id:int}", "users.show")).unwrap();
//! router.add(Route::with_methods(["GET", "HEAD"], "/ping", "ping")).unwrap();
//!
//! // Match routes
//! let matched = router.match_request(&MatchRequest::new("GET", "/users/123")).unwrap();
//! assert_eq!(matched.route().handler(), "users.show");
//! assert_eq!(matched.arguments().get("id"), Some("123"));
//!
//! // Failures say why
//! let err = router.match_request(&MatchRequest::new("POST", "/ping")).unwrap_err();
//! assert!(matches!(err, RouterError::Match(MatchError::MethodNotAllowed { .. })));
//! ```
//!
//! # Architecture
//!
//! ```text
//!   Route ──add──▶ RouteTable ──build──▶ CompiledRoutes
//!                                          │
//!                     ┌────────────────────┼─────────────────────┐
//!                     │                    │                     │
//!               static index         dynamic buckets        route arena
//!            "/users" -> [0]      "/users" -> [chunk..]    id -> CompiledRoute
//!                                 "/"      -> [chunk..]
//! ```
//!
//! Every index refers to routes by their stable [`RouteId`].

pub mod cache;

mod alias;
mod arguments;
mod error;
mod generator;
mod matcher;
mod pattern;
mod route;
mod router;
mod table;

pub use alias::PlaceholderAliases;
pub use arguments::Arguments;
pub use error::{CacheError, GenerateError, MatchError, PatternError, RouterError, RouterResult};
pub use generator::{GenerateParams, GeneratedUri, ReferenceType, RequestContext, UriGenerator};
pub use matcher::{MatchRequest, RouteMatch};
pub use pattern::{
    CompiledPattern, PatternCompiler, PatternKind, Token, DEFAULT_HOST_REQUIREMENT,
    DEFAULT_PATH_REQUIREMENT, MAX_VARIABLE_NAME_LENGTH,
};
pub use route::{Route, RouteId, ALL_METHODS, DEFAULT_METHODS};
pub use router::{Router, WarmSource};
pub use table::{CompiledRoute, CompiledRoutes, RouteTable, RouterOptions, DEFAULT_CHUNK_SIZE};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_routing() {
        let mut router = Router::new();
        router.add(Route::get("/users", "listUsers")).unwrap();
        router.add(Route::get("/users/{id}", "getUser")).unwrap();

        let m = router.match_request(&MatchRequest::new("GET", "/users")).unwrap();
        assert_eq!(m.route().handler(), "listUsers");
        assert!(m.arguments().is_empty());

        let m = router.match_request(&MatchRequest::new("GET", "/users/123")).unwrap();
        assert_eq!(m.route().handler(), "getUser");
        assert_eq!(m.arguments().get("id"), Some("123"));
    }

    #[test]
    fn test_method_routing() {
        let mut router = Router::new();
        router.add(Route::get("/users", "listUsers")).unwrap();
        router.add(Route::post("/users", "createUser")).unwrap();

        let get = router.match_request(&MatchRequest::new("GET", "/users")).unwrap();
        assert_eq!(get.route().handler(), "listUsers");

        let post = router.match_request(&MatchRequest::new("POST", "/users")).unwrap();
        assert_eq!(post.route().handler(), "createUser");

        let delete = router.match_request(&MatchRequest::new("DELETE", "/users"));
        assert!(delete.is_err());
    }

    #[test]
    fn test_catch_all_alias() {
        let mut router = Router::new();
        router.add(Route::get("/files/{path:*}", "serveFile")).unwrap();

        let m = router
            .match_request(&MatchRequest::new("GET", "/files/images/logo.png"))
            .unwrap();
        assert_eq!(m.route().handler(), "serveFile");
        assert_eq!(m.arguments().get("path"), Some("images/logo.png"));
    }

    #[test]
    fn test_no_match() {
        let mut router = Router::new();
        router.add(Route::get("/users", "listUsers")).unwrap();

        let result = router.match_request(&MatchRequest::new("GET", "/posts"));
        assert!(matches!(
            result,
            Err(RouterError::Match(MatchError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_multiple_params() {
        let mut router = Router::new();
        router
            .add(Route::get("/orgs/{orgId}/users/{userId}", "getOrgUser"))
            .unwrap();

        let m = router
            .match_request(&MatchRequest::new("GET", "/orgs/acme/users/123"))
            .unwrap();
        assert_eq!(m.route().handler(), "getOrgUser");
        assert_eq!(m.arguments().get("orgId"), Some("acme"));
        assert_eq!(m.arguments().get("userId"), Some("123"));
    }
}

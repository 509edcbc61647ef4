//! Request dispatch.
//!
//! The [`Dispatcher`] matches a request against a [`Router`], resolves the
//! matched route's handler and middleware references, and runs the chain:
//!
//! ```text
//! Request → match → global middlewares → route middlewares → handler
//!             │
//!             └─ no match → 404 / 405 + Allow / 400
//! ```
//!
//! Routes only carry opaque references (`"users.show"`, `"auth"`). What they
//! resolve to is decided by injected [`HandlerResolver`] and
//! [`MiddlewareResolver`] strategies; [`HandlerRegistry`] and
//! [`MiddlewareRegistry`] are the map-backed defaults.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use waypoint_router::Router;

use crate::context::DispatchContext;
use crate::error::DispatchError;
use crate::middleware::{Handler, Middleware, Next};
use crate::types::{Request, Response};

/// Resolves a route's handler reference.
pub trait HandlerResolver: Send + Sync {
    /// Returns the handler for `reference`, if any.
    fn resolve_handler(&self, reference: &str) -> Option<Arc<dyn Handler>>;
}

/// Resolves a route's middleware references.
pub trait MiddlewareResolver: Send + Sync {
    /// Returns the middleware for `reference`, if any.
    fn resolve_middleware(&self, reference: &str) -> Option<Arc<dyn Middleware>>;
}

impl<F> HandlerResolver for F
where
    F: Fn(&str) -> Option<Arc<dyn Handler>> + Send + Sync,
{
    fn resolve_handler(&self, reference: &str) -> Option<Arc<dyn Handler>> {
        self(reference)
    }
}

impl<F> MiddlewareResolver for F
where
    F: Fn(&str) -> Option<Arc<dyn Middleware>> + Send + Sync,
{
    fn resolve_middleware(&self, reference: &str) -> Option<Arc<dyn Middleware>> {
        self(reference)
    }
}

/// Handlers keyed by reference.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, replacing any previous one for `reference`.
    pub fn insert(&mut self, reference: impl Into<String>, handler: impl Handler) {
        self.handlers.insert(reference.into(), Arc::new(handler));
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, reference: impl Into<String>, handler: impl Handler) -> Self {
        self.insert(reference, handler);
        self
    }

    /// Returns true if a handler is registered for `reference`.
    pub fn contains(&self, reference: &str) -> bool {
        self.handlers.contains_key(reference)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl HandlerResolver for HandlerRegistry {
    fn resolve_handler(&self, reference: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(reference).cloned()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut references: Vec<_> = self.handlers.keys().collect();
        references.sort();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &references)
            .finish()
    }
}

/// Middlewares keyed by reference.
#[derive(Default, Clone)]
pub struct MiddlewareRegistry {
    middlewares: HashMap<String, Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a middleware, replacing any previous one for `reference`.
    pub fn insert(&mut self, reference: impl Into<String>, middleware: impl Middleware) {
        self.middlewares
            .insert(reference.into(), Arc::new(middleware));
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, reference: impl Into<String>, middleware: impl Middleware) -> Self {
        self.insert(reference, middleware);
        self
    }

    /// Returns true if a middleware is registered for `reference`.
    pub fn contains(&self, reference: &str) -> bool {
        self.middlewares.contains_key(reference)
    }

    /// Number of registered middlewares.
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Returns true if no middlewares are registered.
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl MiddlewareResolver for MiddlewareRegistry {
    fn resolve_middleware(&self, reference: &str) -> Option<Arc<dyn Middleware>> {
        self.middlewares.get(reference).cloned()
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut references: Vec<_> = self.middlewares.keys().collect();
        references.sort();
        f.debug_struct("MiddlewareRegistry")
            .field("middlewares", &references)
            .finish()
    }
}

/// Matches requests and runs the resolved middleware chain and handler.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use waypoint::prelude::*;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut router = Router::new();
/// router.add(Route::get("/users/{id:int}", "users.show")).unwrap();
///
/// let handlers = HandlerRegistry::new().with(
///     "users.show",
///     handler_fn(|request: Request| async move {
///         let id = request
///             .extensions()
///             .get::<Arguments>()
///             .and_then(|args| args.get("id"))
///             .unwrap_or_default()
///             .to_string();
///         Response::text(StatusCode::OK, &id)
///     }),
/// );
///
/// let dispatcher = Dispatcher::new(router, handlers);
///
/// let request = http::Request::get("/users/42").body(Default::default()).unwrap();
/// assert_eq!(dispatcher.dispatch(request).await.status(), StatusCode::OK);
///
/// let request = http::Request::delete("/users/42").body(Default::default()).unwrap();
/// assert_eq!(
///     dispatcher.dispatch(request).await.status(),
///     StatusCode::METHOD_NOT_ALLOWED
/// );
/// # }
/// ```
pub struct Dispatcher {
    router: Arc<Router>,
    handlers: Arc<dyn HandlerResolver>,
    middlewares: Arc<dyn MiddlewareResolver>,
    global: Vec<Arc<dyn Middleware>>,
}

impl Dispatcher {
    /// Creates a dispatcher with no middlewares.
    pub fn new(router: impl Into<Arc<Router>>, handlers: impl HandlerResolver + 'static) -> Self {
        Self {
            router: router.into(),
            handlers: Arc::new(handlers),
            middlewares: Arc::new(MiddlewareRegistry::new()),
            global: Vec::new(),
        }
    }

    /// Sets the strategy resolving route middleware references.
    #[must_use]
    pub fn with_middleware_resolver(mut self, resolver: impl MiddlewareResolver + 'static) -> Self {
        self.middlewares = Arc::new(resolver);
        self
    }

    /// Appends a middleware run for every matched route, before the route's
    /// own middlewares.
    #[must_use]
    pub fn with_global(mut self, middleware: impl Middleware) -> Self {
        self.global.push(Arc::new(middleware));
        self
    }

    /// Returns the router.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Returns the global middleware names in run order.
    pub fn global_middleware_names(&self) -> Vec<&str> {
        self.global.iter().map(|m| m.name()).collect()
    }

    /// Dispatches a request, turning every failure into a response.
    pub async fn dispatch(&self, request: Request) -> Response {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        match self.try_dispatch(request).await {
            Ok(response) => response,
            Err(err @ DispatchError::Match(_)) => {
                waypoint_telemetry::log_route_rejected!(
                    method,
                    path,
                    err.status_code().as_u16(),
                    err
                );
                err.into_response()
            }
            Err(err) => {
                tracing::error!(
                    http.method = %method,
                    http.path = %path,
                    error = %err,
                    "Dispatch failed"
                );
                err.into_response()
            }
        }
    }

    /// Dispatches a request, returning matching and resolution failures.
    ///
    /// The route's [`Arguments`](waypoint_router::Arguments) and
    /// [`RouteMatch`](waypoint_router::RouteMatch) are inserted into the
    /// request extensions before the chain runs.
    pub async fn try_dispatch(&self, mut request: Request) -> Result<Response, DispatchError> {
        let matched = self.router.match_http(&request)?;
        let route = matched.route();

        let handler = self
            .handlers
            .resolve_handler(route.handler())
            .ok_or_else(|| DispatchError::unknown_handler(route.handler()))?;

        let route_middlewares = route
            .middlewares()
            .iter()
            .map(|reference| {
                self.middlewares
                    .resolve_middleware(reference)
                    .ok_or_else(|| DispatchError::unknown_middleware(reference, route.handler()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        waypoint_telemetry::log_route_matched!(
            request.method(),
            request.uri().path(),
            matched.id(),
            route.handler()
        );

        request.extensions_mut().insert(matched.arguments().clone());
        request.extensions_mut().insert(matched.clone());

        let mut ctx = DispatchContext::new(matched);
        let stages = self
            .global
            .iter()
            .chain(route_middlewares.iter())
            .map(|middleware| &**middleware as &dyn Middleware);

        Ok(Next::chain(stages, handler.as_ref())
            .run(&mut ctx, request)
            .await)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.router.len())
            .field("global", &self.global_middleware_names())
            .finish_non_exhaustive()
    }
}

//! Per-request dispatch context.
//!
//! The [`DispatchContext`] carries the matched route and its arguments
//! through the middleware chain to the handler.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use waypoint_router::{Arguments, Route, RouteId, RouteMatch};

/// Context that flows through the middleware chain.
///
/// # Example
///
/// ```
/// use waypoint::context::DispatchContext;
/// use waypoint::router::{MatchRequest, Route, Router};
///
/// let mut router = Router::new();
/// router.add(Route::get("/users/{id:int}", "users.show")).unwrap();
/// let matched = router.match_request(&MatchRequest::new("GET", "/users/7")).unwrap();
///
/// let mut ctx = DispatchContext::new(matched);
/// ctx.set_extension(42_u32);
///
/// assert_eq!(ctx.route().handler(), "users.show");
/// assert_eq!(ctx.argument("id"), Some("7"));
/// assert_eq!(ctx.get_extension::<u32>(), Some(&42));
/// ```
#[derive(Debug)]
pub struct DispatchContext {
    matched: RouteMatch,
    started_at: Instant,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl DispatchContext {
    /// Creates a context for a matched route.
    #[must_use]
    pub fn new(matched: RouteMatch) -> Self {
        Self {
            matched,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Returns the matched route's id.
    #[must_use]
    pub fn route_id(&self) -> RouteId {
        self.matched.id()
    }

    /// Returns the matched route.
    #[must_use]
    pub fn route(&self) -> &Route {
        self.matched.route()
    }

    /// Returns a shared handle to the matched route.
    #[must_use]
    pub fn shared_route(&self) -> Arc<Route> {
        self.matched.shared_route()
    }

    /// Returns the route arguments.
    #[must_use]
    pub fn arguments(&self) -> &Arguments {
        self.matched.arguments()
    }

    /// Returns a single route argument.
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.matched.arguments().get(name)
    }

    /// Returns the full match result.
    #[must_use]
    pub fn route_match(&self) -> &RouteMatch {
        &self.matched
    }

    /// Returns when dispatch started.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since dispatch started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension value, replacing any previous value of the
    /// same type.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Retrieves a mutable typed extension value.
    pub fn get_extension_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.extensions
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

//! High-level router API.
//!
//! This module provides the main [`Router`] struct which is the primary
//! interface for registering, matching and generating routes.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::{debug, warn};

use crate::cache;
use crate::error::{GenerateError, RouterResult};
use crate::generator::{GenerateParams, GeneratedUri, ReferenceType, RequestContext, UriGenerator};
use crate::matcher::{MatchRequest, RouteMatch};
use crate::route::{Route, RouteId};
use crate::table::{CompiledRoutes, RouteTable, RouterOptions};

/// Where [`Router::warm_from_cache_or_build`] got its table from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmSource {
    /// The persisted cache matched the registered routes.
    Cache,
    /// The table was compiled from the registered routes.
    Built,
}

/// A route table with a lazily built, atomically swapped compiled snapshot.
///
/// Registration needs `&mut self`. Matching and generation take `&self` and
/// work on the current snapshot; the first call after a registration builds
/// a new snapshot and swaps it in. Readers that already hold a snapshot keep
/// using it unchanged.
///
/// # Example
///
/// ```rust
/// use waypoint_router::{GenerateParams, MatchRequest, ReferenceType, Route, Router};
///
/// let mut router = Router::new();
/// router.add(Route::get("/users", "users.list")).unwrap();
/// router.add(Route::get("/users/{id:int}", "users.show").name("user")).unwrap();
///
/// let matched = router.match_request(&MatchRequest::new("GET", "/users/123")).unwrap();
/// assert_eq!(matched.route().handler(), "users.show");
/// assert_eq!(matched.arguments().get("id"), Some("123"));
///
/// let uri = router
///     .generate("user", &GenerateParams::new().arg("id", "7"), ReferenceType::AbsolutePath)
///     .unwrap();
/// assert_eq!(uri.to_string(), "/users/7");
/// ```
///
/// # Route Priority
///
/// When multiple routes could match, the router uses the following priority:
///
/// 1. **Static routes** (e.g., `/users/me`) whose path equals the request path
/// 2. **Dynamic routes** (e.g., `/users/{id}`) in registration order
///
/// This means `/users/me` will match before `/users/{id}` for the path
/// `/users/me`, whichever was registered first.
pub struct Router {
    table: RouteTable,
    compiled: ArcSwapOption<CompiledRoutes>,
    generator: UriGenerator,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.table.len())
            .field("warm", &self.is_warm())
            .field("context", self.generator.context())
            .finish()
    }
}

impl Router {
    /// Creates an empty router with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(RouterOptions::default())
    }

    /// Creates an empty router with the given options.
    #[must_use]
    pub fn with_options(options: RouterOptions) -> Self {
        Self {
            table: RouteTable::with_options(options),
            compiled: ArcSwapOption::empty(),
            generator: UriGenerator::new(),
        }
    }

    /// Sets the ambient context used to generate absolute URIs.
    #[must_use]
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.generator = UriGenerator::with_context(context);
        self
    }

    /// Replaces the ambient context.
    pub fn set_context(&mut self, context: RequestContext) {
        self.generator = UriGenerator::with_context(context);
    }

    /// Registers a route and returns its id.
    pub fn add(&mut self, route: Route) -> RouterResult<RouteId> {
        let id = self.table.add(route)?;
        self.compiled.store(None);
        Ok(id)
    }

    /// Registers several routes.
    pub fn extend<I>(&mut self, routes: I) -> RouterResult<Vec<RouteId>>
    where
        I: IntoIterator<Item = Route>,
    {
        let ids = routes
            .into_iter()
            .map(|route| self.table.add(route))
            .collect::<RouterResult<Vec<_>>>();
        self.compiled.store(None);
        ids
    }

    /// Replaces a registered route. Returns `false` if `id` is unknown.
    pub fn replace(&mut self, id: RouteId, route: Route) -> RouterResult<bool> {
        let replaced = self.table.replace(id, route)?;
        if replaced {
            self.compiled.store(None);
        }
        Ok(replaced)
    }

    /// Returns the registered routes.
    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if no route is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns true if a compiled snapshot is in place.
    #[must_use]
    pub fn is_warm(&self) -> bool {
        self.compiled.load().is_some()
    }

    /// Compiles the table now and swaps the result in.
    pub fn warm(&self) -> RouterResult<Arc<CompiledRoutes>> {
        let compiled = Arc::new(self.table.build()?);
        self.compiled.store(Some(Arc::clone(&compiled)));
        Ok(compiled)
    }

    /// Returns the current snapshot, building it first if needed.
    pub fn compiled(&self) -> RouterResult<Arc<CompiledRoutes>> {
        match self.compiled.load_full() {
            Some(compiled) => Ok(compiled),
            None => self.warm(),
        }
    }

    /// Matches a request.
    pub fn match_request(&self, request: &MatchRequest) -> RouterResult<RouteMatch> {
        Ok(self.compiled()?.match_request(request)?)
    }

    /// Matches an HTTP request.
    pub fn match_http<B>(&self, request: &http::Request<B>) -> RouterResult<RouteMatch> {
        self.match_request(&MatchRequest::from_http(request))
    }

    /// Generates a URI for the named route.
    pub fn generate(
        &self,
        name: &str,
        params: &GenerateParams,
        reference: ReferenceType,
    ) -> RouterResult<GeneratedUri> {
        let compiled = self.compiled()?;
        let route = compiled
            .by_name(name)
            .ok_or_else(|| GenerateError::route_not_found(name))?;
        Ok(self.generator.generate(route, params, reference)?)
    }

    /// Writes the current snapshot to a cache file.
    pub fn save_cache(&self, path: impl AsRef<Path>) -> RouterResult<()> {
        let compiled = self.compiled()?;
        cache::save(&compiled, path)?;
        Ok(())
    }

    /// Installs the cached table if it describes exactly the registered
    /// routes; otherwise builds the table and rewrites the cache.
    pub fn warm_from_cache_or_build(&self, path: impl AsRef<Path>) -> RouterResult<WarmSource> {
        let path = path.as_ref();
        match cache::load(path) {
            Ok(cached) if self.describes_table(&cached) => {
                debug!(path = %path.display(), routes = cached.len(), "Using cached route table");
                self.compiled.store(Some(Arc::new(cached)));
                return Ok(WarmSource::Cache);
            }
            Ok(_) => warn!(path = %path.display(), "Route cache is stale, rebuilding"),
            Err(err) => debug!(path = %path.display(), error = %err, "Route cache unavailable, rebuilding"),
        }

        let compiled = self.warm()?;
        if let Err(err) = cache::save(&compiled, path) {
            warn!(path = %path.display(), error = %err, "Failed to write route cache");
        }
        Ok(WarmSource::Built)
    }

    fn describes_table(&self, compiled: &CompiledRoutes) -> bool {
        compiled.len() == self.table.len()
            && compiled.chunk_size() == self.table.options().chunk_size
            && *compiled.aliases() == self.table.options().aliases
            && compiled
                .iter()
                .zip(self.table.routes())
                .all(|(cached, route)| cached.route() == route)
    }
}

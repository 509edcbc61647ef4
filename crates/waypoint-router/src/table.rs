//! Route table and its compiled form.
//!
//! [`RouteTable`] is the mutable registration list. [`RouteTable::build`]
//! compiles every route and partitions the result into a [`CompiledRoutes`]:
//!
//! - **Static index**: routes whose path has no placeholder, keyed by the
//!   exact path for O(1) lookup.
//! - **Dynamic buckets**: the remaining routes, grouped by the literal path
//!   prefix they all share. Each bucket is split into chunks of at most
//!   `chunk_size` routes; a chunk is one [`RegexSet`] that reports in a
//!   single pass which of its routes match.
//!
//! ```text
//!  /users/list ──▶ static index ──▶ [3]
//!
//!  /users/42   ──▶ bucket "/users" ──▶ chunk 0 ─ RegexSet{ ^/users/(?P<id>..)$, .. }
//!              ──▶ bucket "/"      ──▶ chunk 0 ─ RegexSet{ ^/(?P<page>..)$, .. }
//! ```
//!
//! Every route id lives in exactly one of the two structures. Candidates
//! gathered from all applicable buckets are tried in registration order, so
//! the earliest-registered route still wins.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use metrics::{counter, gauge, histogram};
use regex::{Regex, RegexSet};
use tracing::debug;

use crate::alias::PlaceholderAliases;
use crate::error::{PatternError, RouterError, RouterResult};
use crate::pattern::{CompiledPattern, PatternCompiler, PatternKind, Token};
use crate::route::{Route, RouteId, DEFAULT_METHODS};

/// Default number of routes per compiled chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 30;

/// Options controlling how a table is compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterOptions {
    /// Maximum number of routes in one [`RegexSet`] chunk.
    pub chunk_size: usize,
    /// Placeholder aliases available to patterns.
    pub aliases: PlaceholderAliases,
    /// Methods assigned to routes that declare none.
    pub default_methods: Vec<String>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            aliases: PlaceholderAliases::default(),
            default_methods: DEFAULT_METHODS.iter().map(|m| (*m).to_string()).collect(),
        }
    }
}

impl RouterOptions {
    /// Sets the chunk size. Zero is treated as one.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Replaces the alias table.
    #[must_use]
    pub fn with_aliases(mut self, aliases: PlaceholderAliases) -> Self {
        self.aliases = aliases;
        self
    }

    /// Adds or overrides one alias.
    #[must_use]
    pub fn with_alias(mut self, name: impl Into<String>, regex: impl Into<String>) -> Self {
        self.aliases.insert(name, regex);
        self
    }

    /// Replaces the default methods. An empty list keeps the current ones.
    #[must_use]
    pub fn with_default_methods<I, M>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: AsRef<str>,
    {
        let methods: Vec<String> = methods
            .into_iter()
            .map(|m| m.as_ref().to_ascii_uppercase())
            .collect();
        if !methods.is_empty() {
            self.default_methods = methods;
        }
        self
    }
}

/// Ordered list of registered routes.
///
/// # Example
///
/// ```rust
/// use waypoint_router::{MatchRequest, Route, RouteTable};
///
/// let mut table = RouteTable::new();
/// table.add(Route::get("/users/{id:int}", "users.show")).unwrap();
/// table.add(Route::get("/users/list", "users.list")).unwrap();
///
/// let compiled = table.build().unwrap();
/// assert_eq!(compiled.static_count(), 1);
/// assert_eq!(compiled.dynamic_count(), 1);
///
/// let matched = compiled.match_request(&MatchRequest::new("GET", "/users/42")).unwrap();
/// assert_eq!(matched.arguments().get("id"), Some("42"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    names: HashMap<String, RouteId>,
    options: RouterOptions,
}

impl RouteTable {
    /// Creates an empty table with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table with the given options.
    #[must_use]
    pub fn with_options(options: RouterOptions) -> Self {
        Self {
            routes: Vec::new(),
            names: HashMap::new(),
            options,
        }
    }

    /// Returns the compile options.
    #[must_use]
    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    /// Appends a route and returns its id.
    ///
    /// The route is not compiled until [`build`](Self::build) runs.
    pub fn add(&mut self, mut route: Route) -> RouterResult<RouteId> {
        let id = self.routes.len();
        if let Some(name) = route.route_name() {
            if self.names.contains_key(name) {
                return Err(RouterError::duplicate_route_name(name));
            }
            self.names.insert(name.to_string(), id);
        }
        route.apply_default_methods(&self.options.default_methods);
        self.routes.push(route);
        Ok(id)
    }

    /// Replaces the route stored under `id`.
    ///
    /// Returns `Ok(false)` if no such route exists.
    pub fn replace(&mut self, id: RouteId, mut route: Route) -> RouterResult<bool> {
        let Some(slot) = self.routes.get(id) else {
            return Ok(false);
        };
        if let Some(name) = route.route_name() {
            if self.names.get(name).is_some_and(|owner| *owner != id) {
                return Err(RouterError::duplicate_route_name(name));
            }
        }
        if let Some(old) = slot.route_name() {
            self.names.remove(old);
        }
        if let Some(name) = route.route_name() {
            self.names.insert(name.to_string(), id);
        }
        route.apply_default_methods(&self.options.default_methods);
        self.routes[id] = route;
        Ok(true)
    }

    /// Returns a route by id.
    #[must_use]
    pub fn get(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(id)
    }

    /// Returns the id of a named route.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<RouteId> {
        self.names.get(name).copied()
    }

    /// Returns all routes in registration order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no route is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Compiles every route and partitions them into a [`CompiledRoutes`].
    ///
    /// Building does not modify the table; calling it twice yields equal
    /// results.
    pub fn build(&self) -> Result<CompiledRoutes, PatternError> {
        let start = Instant::now();
        let compiler = PatternCompiler::with_aliases(self.options.aliases.clone());

        let mut routes = Vec::with_capacity(self.routes.len());
        let mut static_routes: HashMap<String, Vec<RouteId>> = HashMap::new();
        let mut grouped: IndexMap<String, Vec<RouteId>> = IndexMap::new();

        for (id, route) in self.routes.iter().enumerate() {
            let compiled = CompiledRoute::compile(route.clone(), &compiler)?;
            if let Some(path) = compiled.path_pattern().static_text() {
                static_routes.entry(path).or_default().push(id);
            } else {
                let prefix = bucket_prefix(&compiled.path_pattern().static_prefix());
                grouped.entry(prefix).or_default().push(id);
            }
            routes.push(compiled);
        }

        let mut buckets = grouped
            .into_iter()
            .map(|(prefix, ids)| Bucket::build(prefix, &ids, &routes, self.options.chunk_size))
            .collect::<Result<Vec<_>, _>>()?;
        sort_buckets(&mut buckets);

        let table = CompiledRoutes::assemble(
            routes,
            static_routes,
            buckets,
            self.options.chunk_size,
            self.options.aliases.clone(),
        );

        let elapsed = start.elapsed();
        counter!("waypoint_route_table_builds_total").increment(1);
        histogram!("waypoint_route_table_build_seconds").record(elapsed.as_secs_f64());
        gauge!("waypoint_static_routes").set(table.static_count() as f64);
        gauge!("waypoint_dynamic_routes").set(table.dynamic_count() as f64);

        debug!(
            routes = table.len(),
            static_routes = table.static_count(),
            dynamic_routes = table.dynamic_count(),
            buckets = table.buckets.len(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Built route table"
        );

        Ok(table)
    }
}

/// One route after compilation.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    route: Arc<Route>,
    path: CompiledPattern,
    hosts: Vec<CompiledPattern>,
    path_regex: Regex,
    host_regexes: Vec<Regex>,
    validators: HashMap<String, Regex>,
}

impl CompiledRoute {
    /// Compiles the path and host patterns of a route.
    pub fn compile(route: Route, compiler: &PatternCompiler) -> Result<Self, PatternError> {
        let path = compiler.compile_path(route.path(), route.placeholders())?;
        let hosts = route
            .hosts()
            .iter()
            .map(|host| compiler.compile_host(host, route.placeholders()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_parts(route, path, hosts)
    }

    /// Rebuilds a compiled route from already compiled patterns.
    pub(crate) fn from_parts(
        route: Route,
        path: CompiledPattern,
        hosts: Vec<CompiledPattern>,
    ) -> Result<Self, PatternError> {
        for host in &hosts {
            if let Some(name) = host
                .variables()
                .keys()
                .find(|name| path.variables().contains_key(*name))
            {
                return Err(PatternError::DuplicateVariable {
                    pattern: format!("{}{}", host.pattern(), path.pattern()),
                    name: name.clone(),
                });
            }
        }

        let path_regex = path.to_regex()?;
        let host_regexes = hosts
            .iter()
            .map(CompiledPattern::to_regex)
            .collect::<Result<Vec<_>, _>>()?;

        // Only the first host is rendered by the generator.
        let mut validators = HashMap::new();
        for pattern in hosts.iter().take(1).chain(std::iter::once(&path)) {
            collect_validators(pattern, pattern.tokens(), &mut validators)?;
        }

        Ok(Self {
            route: Arc::new(route),
            path,
            hosts,
            path_regex,
            host_regexes,
            validators,
        })
    }

    /// Returns the route definition.
    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Returns a shared handle to the route definition.
    #[must_use]
    pub fn shared_route(&self) -> Arc<Route> {
        Arc::clone(&self.route)
    }

    /// Returns the compiled path pattern.
    #[must_use]
    pub fn path_pattern(&self) -> &CompiledPattern {
        &self.path
    }

    /// Returns the compiled host patterns.
    #[must_use]
    pub fn host_patterns(&self) -> &[CompiledPattern] {
        &self.hosts
    }

    /// Returns true if the path has no placeholders.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.path.is_static()
    }

    /// Returns the default of a placeholder or extra argument.
    ///
    /// Route-level defaults take precedence over inline `{name=value}`
    /// defaults.
    #[must_use]
    pub fn default_for(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.route.defaults().get(name) {
            return Some(value);
        }
        std::iter::once(&self.path)
            .chain(self.hosts.iter())
            .find_map(|pattern| pattern.variables().get(name))
            .and_then(Option::as_deref)
    }

    pub(crate) fn path_regex(&self) -> &Regex {
        &self.path_regex
    }

    pub(crate) fn host_regexes(&self) -> &[Regex] {
        &self.host_regexes
    }

    pub(crate) fn validator(&self, name: &str) -> Option<&Regex> {
        self.validators.get(name)
    }
}

fn collect_validators(
    pattern: &CompiledPattern,
    tokens: &[Token],
    validators: &mut HashMap<String, Regex>,
) -> Result<(), PatternError> {
    for token in tokens {
        match token {
            Token::Literal { .. } => {}
            Token::Placeholder {
                name, requirement, ..
            } => {
                let flags = if pattern.kind() == PatternKind::Host { "(?i)" } else { "" };
                let regex = Regex::new(&format!("{flags}^(?:{requirement})$")).map_err(|source| {
                    PatternError::InvalidRegex {
                        pattern: pattern.pattern().to_string(),
                        source,
                    }
                })?;
                validators.insert(name.clone(), regex);
            }
            Token::Optional { tokens } => collect_validators(pattern, tokens, validators)?,
        }
    }
    Ok(())
}

/// A group of dynamic routes sharing a literal path prefix.
#[derive(Debug, Clone)]
pub(crate) struct Bucket {
    prefix: String,
    chunks: Vec<Chunk>,
}

/// Up to `chunk_size` routes tested by one [`RegexSet`].
#[derive(Debug, Clone)]
pub(crate) struct Chunk {
    routes: Vec<RouteId>,
    set: RegexSet,
}

impl Bucket {
    fn build(
        prefix: String,
        ids: &[RouteId],
        routes: &[CompiledRoute],
        chunk_size: usize,
    ) -> Result<Self, PatternError> {
        let chunks = ids
            .chunks(chunk_size.max(1))
            .map(|ids| {
                let patterns = ids.iter().map(|id| routes[*id].path_pattern().regex());
                Chunk::new(ids.to_vec(), patterns).map_err(|source| PatternError::InvalidRegex {
                    pattern: prefix.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { prefix, chunks })
    }

    pub(crate) fn from_chunks(prefix: String, chunks: Vec<Chunk>) -> Self {
        Self { prefix, chunks }
    }

    pub(crate) fn prefix(&self) -> &str {
        &self.prefix
    }

    pub(crate) fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Returns true if a path could match a route of this bucket.
    pub(crate) fn applies_to(&self, path: &str) -> bool {
        self.prefix == "/"
            || path
                .strip_prefix(self.prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Pushes the ids of every route whose regex matches `path`.
    pub(crate) fn candidates(&self, path: &str, out: &mut Vec<RouteId>) {
        for chunk in &self.chunks {
            out.extend(chunk.set.matches(path).iter().map(|index| chunk.routes[index]));
        }
    }
}

impl Chunk {
    pub(crate) fn new<I, S>(routes: Vec<RouteId>, patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            routes,
            set: RegexSet::new(patterns)?,
        })
    }

    pub(crate) fn routes(&self) -> &[RouteId] {
        &self.routes
    }

    pub(crate) fn patterns(&self) -> &[String] {
        self.set.patterns()
    }
}

/// Bucket key: the static prefix up to its last complete segment.
fn bucket_prefix(static_prefix: &str) -> String {
    match static_prefix.rfind('/') {
        Some(end) if end > 0 => static_prefix[..end].to_string(),
        _ => "/".to_string(),
    }
}

/// Longer prefixes first, `/` last.
pub(crate) fn sort_buckets(buckets: &mut [Bucket]) {
    buckets.sort_by(|a, b| {
        (a.prefix == "/")
            .cmp(&(b.prefix == "/"))
            .then_with(|| b.prefix.len().cmp(&a.prefix.len()))
            .then_with(|| a.prefix.cmp(&b.prefix))
    });
}

/// A warmed, read-only route table.
///
/// Produced by [`RouteTable::build`] or loaded from the persisted
/// [`cache`](crate::cache). Matching lives in [`match_request`](Self::match_request).
#[derive(Debug, Clone)]
pub struct CompiledRoutes {
    pub(crate) routes: Vec<CompiledRoute>,
    pub(crate) static_routes: HashMap<String, Vec<RouteId>>,
    pub(crate) buckets: Vec<Bucket>,
    names: HashMap<String, RouteId>,
    chunk_size: usize,
    aliases: PlaceholderAliases,
}

impl CompiledRoutes {
    pub(crate) fn assemble(
        routes: Vec<CompiledRoute>,
        static_routes: HashMap<String, Vec<RouteId>>,
        buckets: Vec<Bucket>,
        chunk_size: usize,
        aliases: PlaceholderAliases,
    ) -> Self {
        let names = routes
            .iter()
            .enumerate()
            .filter_map(|(id, route)| route.route().route_name().map(|n| (n.to_string(), id)))
            .collect();
        Self {
            routes,
            static_routes,
            buckets,
            names,
            chunk_size,
            aliases,
        }
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if the table holds no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Returns the chunk size the table was built with.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the alias table the patterns were compiled with.
    #[must_use]
    pub fn aliases(&self) -> &PlaceholderAliases {
        &self.aliases
    }

    /// Returns a compiled route by id.
    #[must_use]
    pub fn get(&self, id: RouteId) -> Option<&CompiledRoute> {
        self.routes.get(id)
    }

    /// Returns a compiled route by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&CompiledRoute> {
        self.names.get(name).and_then(|id| self.routes.get(*id))
    }

    /// Iterates over compiled routes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CompiledRoute> {
        self.routes.iter()
    }

    /// Returns the number of routes in the static index.
    #[must_use]
    pub fn static_count(&self) -> usize {
        self.static_routes.values().map(Vec::len).sum()
    }

    /// Returns the number of routes in the dynamic buckets.
    #[must_use]
    pub fn dynamic_count(&self) -> usize {
        self.buckets
            .iter()
            .flat_map(Bucket::chunks)
            .map(|chunk| chunk.routes().len())
            .sum()
    }

    /// Returns the ids registered for an exact static path.
    #[must_use]
    pub fn static_ids(&self, path: &str) -> &[RouteId] {
        self.static_routes
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the bucket prefixes in evaluation order.
    pub fn bucket_prefixes(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(Bucket::prefix)
    }

    /// Returns the static index as `path -> method -> ids`.
    #[must_use]
    pub fn static_index(&self) -> BTreeMap<String, BTreeMap<String, Vec<RouteId>>> {
        let mut index: BTreeMap<String, BTreeMap<String, Vec<RouteId>>> = BTreeMap::new();
        for (path, ids) in &self.static_routes {
            let methods = index.entry(path.clone()).or_default();
            for id in ids {
                for method in self.routes[*id].route().methods() {
                    methods.entry(method.clone()).or_default().push(*id);
                }
            }
        }
        index
    }
}

//! Persisted route table.
//!
//! A built [`CompiledRoutes`] can be written to a JSON file and read back on
//! the next start, skipping pattern compilation. The file holds:
//!
//! - `static_routes`: literal path to method to route ids
//! - `dynamic_routes`: bucket prefix to chunks of anchored regexes, in
//!   evaluation order
//! - `variables`: route id to ordered placeholder names
//! - `routes`: the route records with their compiled patterns
//! - `aliases`: the alias table the patterns were compiled with
//!
//! Writes go to a temporary file in the target directory which is then
//! renamed over the destination, so readers never observe a partial file.

use std::collections::{BTreeMap, HashMap};
use std::io::Write as _;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::alias::PlaceholderAliases;
use crate::error::CacheError;
use crate::pattern::CompiledPattern;
use crate::route::{Route, RouteId};
use crate::table::{sort_buckets, Bucket, Chunk, CompiledRoute, CompiledRoutes};

/// Format version written to and expected from cache files.
pub const CACHE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    chunk_size: usize,
    aliases: PlaceholderAliases,
    static_routes: BTreeMap<String, BTreeMap<String, Vec<RouteId>>>,
    dynamic_routes: IndexMap<String, Vec<CachedChunk>>,
    variables: BTreeMap<RouteId, Vec<String>>,
    routes: Vec<CachedRoute>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedChunk {
    routes: Vec<RouteId>,
    patterns: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedRoute {
    route: Route,
    path: CompiledPattern,
    hosts: Vec<CompiledPattern>,
}

/// Serializes a compiled table to JSON.
pub fn to_json(routes: &CompiledRoutes) -> Result<String, CacheError> {
    let file = CacheFile {
        version: CACHE_VERSION,
        chunk_size: routes.chunk_size(),
        aliases: routes.aliases().clone(),
        static_routes: routes.static_index(),
        dynamic_routes: routes
            .buckets
            .iter()
            .map(|bucket| {
                let chunks = bucket
                    .chunks()
                    .iter()
                    .map(|chunk| CachedChunk {
                        routes: chunk.routes().to_vec(),
                        patterns: chunk.patterns().to_vec(),
                    })
                    .collect();
                (bucket.prefix().to_string(), chunks)
            })
            .collect(),
        variables: routes
            .iter()
            .enumerate()
            .filter(|(_, route)| !route.is_static())
            .map(|(id, route)| (id, route.path_pattern().variables().keys().cloned().collect()))
            .collect(),
        routes: routes
            .iter()
            .map(|route| CachedRoute {
                route: route.route().clone(),
                path: route.path_pattern().clone(),
                hosts: route.host_patterns().to_vec(),
            })
            .collect(),
    };
    Ok(serde_json::to_string(&file)?)
}

/// Rebuilds a compiled table from JSON produced by [`to_json`].
pub fn from_json(json: &str) -> Result<CompiledRoutes, CacheError> {
    let file: CacheFile = serde_json::from_str(json)?;
    if file.version != CACHE_VERSION {
        return Err(CacheError::VersionMismatch {
            found: file.version,
            expected: CACHE_VERSION,
        });
    }

    let routes = file
        .routes
        .into_iter()
        .map(|cached| {
            CompiledRoute::from_parts(cached.route, cached.path, cached.hosts)
                .map_err(|err| CacheError::corrupt(err.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen = vec![false; routes.len()];
    let mut claim = |id: RouteId| -> Result<(), CacheError> {
        match seen.get_mut(id) {
            Some(slot) if !*slot => {
                *slot = true;
                Ok(())
            }
            Some(_) => Err(CacheError::corrupt(format!("route {id} is indexed twice"))),
            None => Err(CacheError::corrupt(format!("route {id} does not exist"))),
        }
    };

    let mut static_routes: HashMap<String, Vec<RouteId>> = HashMap::new();
    for (path, methods) in file.static_routes {
        let mut ids: Vec<RouteId> = methods.into_values().flatten().collect();
        ids.sort_unstable();
        ids.dedup();
        for id in &ids {
            claim(*id)?;
        }
        static_routes.insert(path, ids);
    }

    let mut buckets = Vec::with_capacity(file.dynamic_routes.len());
    for (prefix, cached_chunks) in file.dynamic_routes {
        let mut chunks = Vec::with_capacity(cached_chunks.len());
        for cached in cached_chunks {
            if cached.routes.len() != cached.patterns.len() {
                return Err(CacheError::corrupt(format!(
                    "bucket {prefix} has {} routes but {} patterns",
                    cached.routes.len(),
                    cached.patterns.len()
                )));
            }
            for id in &cached.routes {
                claim(*id)?;
            }
            chunks.push(Chunk::new(cached.routes, cached.patterns)?);
        }
        buckets.push(Bucket::from_chunks(prefix, chunks));
    }
    sort_buckets(&mut buckets);

    if let Some(id) = seen.iter().position(|claimed| !claimed) {
        return Err(CacheError::corrupt(format!("route {id} is not indexed")));
    }

    for (id, names) in &file.variables {
        let expected = routes
            .get(*id)
            .map(|route| route.path_pattern().variables().keys().collect::<Vec<_>>());
        if expected.as_ref().map(Vec::len) != Some(names.len())
            || expected.is_some_and(|expected| expected.iter().zip(names).any(|(a, b)| *a != b))
        {
            return Err(CacheError::corrupt(format!(
                "placeholder names of route {id} do not match its pattern"
            )));
        }
    }

    Ok(CompiledRoutes::assemble(
        routes,
        static_routes,
        buckets,
        file.chunk_size,
        file.aliases,
    ))
}

/// Writes a compiled table to `path` atomically.
pub fn save(routes: &CompiledRoutes, path: impl AsRef<Path>) -> Result<(), CacheError> {
    let path = path.as_ref();
    let json = to_json(routes)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| CacheError::io(dir, e))?;

    let mut file = NamedTempFile::new_in(dir).map_err(|e| CacheError::io(dir, e))?;
    file.write_all(json.as_bytes())
        .and_then(|()| file.as_file().sync_all())
        .map_err(|e| CacheError::io(file.path(), e))?;
    file.persist(path)
        .map_err(|e| CacheError::io(path, e.error))?;

    debug!(path = %path.display(), routes = routes.len(), "Saved route cache");
    Ok(())
}

/// Reads a compiled table from `path`.
pub fn load(path: impl AsRef<Path>) -> Result<CompiledRoutes, CacheError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| CacheError::io(path, e))?;
    let routes = from_json(&json)?;
    debug!(path = %path.display(), routes = routes.len(), "Loaded route cache");
    Ok(routes)
}

/// Removes the cache file. Returns `false` if there was none.
pub fn invalidate(path: impl AsRef<Path>) -> Result<bool, CacheError> {
    let path = path.as_ref();
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Invalidated route cache");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchRequest;
    use crate::table::{RouteTable, RouterOptions};

    fn sample() -> CompiledRoutes {
        let mut table = RouteTable::with_options(RouterOptions::default().with_chunk_size(2));
        table.add(Route::get("/", "home").name("home")).unwrap();
        table.add(Route::get("/users/{id:int}", "users.show")).unwrap();
        table.add(Route::post("/users", "users.create")).unwrap();
        table.add(Route::get("/users/{id}/{tab=profile}", "users.tab")).unwrap();
        table.add(Route::get("/{page}", "page").host("{site}.example.com")).unwrap();
        table.add(Route::delete("/users/{id:int}", "users.delete")).unwrap();
        table.build().unwrap()
    }

    fn outcome(routes: &CompiledRoutes, request: &MatchRequest) -> String {
        match routes.match_request(request) {
            Ok(matched) => {
                let arguments: BTreeMap<_, _> = matched.arguments().iter().collect();
                format!("{} {arguments:?}", matched.id())
            }
            Err(err) => err.to_string(),
        }
    }

    #[test]
    fn test_json_reproduces_matching() {
        let built = sample();
        let loaded = from_json(&to_json(&built).unwrap()).unwrap();

        assert_eq!(loaded.len(), built.len());
        assert_eq!(loaded.static_index(), built.static_index());
        assert_eq!(loaded.chunk_size(), 2);
        assert!(loaded.by_name("home").is_some());

        let requests = [
            MatchRequest::new("GET", "/"),
            MatchRequest::new("GET", "/users/5"),
            MatchRequest::new("DELETE", "/users/5"),
            MatchRequest::new("PUT", "/users/5"),
            MatchRequest::new("GET", "/users/x/posts"),
            MatchRequest::new("GET", "/users"),
            MatchRequest::new("GET", "/about").with_host("docs.example.com"),
            MatchRequest::new("GET", "/about"),
            MatchRequest::new("GET", "/nothing/here/at/all"),
        ];
        for request in &requests {
            assert_eq!(outcome(&loaded, request), outcome(&built, request));
        }
    }

    #[test]
    fn test_save_load_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("routes.json");

        save(&sample(), &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 6);

        assert!(invalidate(&path).unwrap());
        assert!(!invalidate(&path).unwrap());
        assert!(matches!(load(&path).unwrap_err(), CacheError::Io { .. }));
    }

    #[test]
    fn test_version_mismatch() {
        let json = to_json(&sample()).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["version"] = serde_json::json!(99);

        let err = from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, CacheError::VersionMismatch { found: 99, expected: 1 }));
    }

    #[test]
    fn test_missing_route_is_corrupt() {
        let json = to_json(&sample()).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["static_routes"] = serde_json::json!({});

        assert!(matches!(from_json(&value.to_string()).unwrap_err(), CacheError::Corrupt(_)));
    }

    #[test]
    fn test_unknown_route_id_is_corrupt() {
        let json = to_json(&sample()).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["static_routes"]["/ghost"] = serde_json::json!({ "GET": [42] });

        assert!(matches!(from_json(&value.to_string()).unwrap_err(), CacheError::Corrupt(_)));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(from_json("{").unwrap_err(), CacheError::Json(_)));
    }
}

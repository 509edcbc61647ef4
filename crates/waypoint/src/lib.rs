//! # Waypoint
//!
//! **Regex-compiled HTTP routing with reverse URI generation**
//!
//! - **Pattern Routes** – `/blog/{year:year}[/{slug}]` with constraints,
//!   defaults and optional groups
//! - **Precise Failures** – 404, 405 with `Allow`, 400 for host or scheme
//! - **Reverse Routing** – build URIs from route names
//! - **Persisted Tables** – reload a compiled table instead of rebuilding
//! - **Dispatch** – global then per-route middlewares around resolved handlers
//!
//! ## Quick Start
//!
//! ```rust
//! use http::StatusCode;
//! use waypoint::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().with_env_prefix("WAYPOINT").load()?;
//!
//! let router = router_from_config(&config, [Route::get("/hello/{name}", "hello").name("hello")])?;
//!
//! let uri = router.generate(
//!     "hello",
//!     &GenerateParams::new().arg("name", "ada"),
//!     ReferenceType::AbsolutePath,
//! )?;
//! assert_eq!(uri.to_string(), "/hello/ada");
//!
//! let handlers = HandlerRegistry::new().with(
//!     "hello",
//!     handler_fn(|request: Request| async move {
//!         let name = request
//!             .extensions()
//!             .get::<Arguments>()
//!             .and_then(|args| args.get("name"))
//!             .unwrap_or("stranger")
//!             .to_string();
//!         Response::text(StatusCode::OK, &format!("hello {name}"))
//!     }),
//! );
//!
//! let dispatcher = Dispatcher::new(router, handlers);
//! let request = http::Request::get("/hello/ada").body(Default::default())?;
//! assert_eq!(dispatcher.dispatch(request).await.status(), StatusCode::OK);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! waypoint-config ──▶ RouterOptions, cache path, LogConfig
//!                          │
//! waypoint-router ◀────────┘   compile · match · generate · cache
//!        │
//! waypoint (this crate)        Dispatcher → middlewares → handler
//!        │
//! waypoint-telemetry           logs · Prometheus metrics
//! ```

#![doc(html_root_url = "https://docs.rs/waypoint/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bootstrap;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod middleware;
pub mod types;

// Re-export subcrates
pub use waypoint_config as config;
pub use waypoint_router as router;
pub use waypoint_telemetry as telemetry;

pub use bootstrap::router_from_config;
pub use context::DispatchContext;
pub use dispatch::{
    Dispatcher, HandlerRegistry, HandlerResolver, MiddlewareRegistry, MiddlewareResolver,
};
pub use error::DispatchError;
pub use middleware::{handler_fn, BoxFuture, FnHandler, FnMiddleware, Handler, Middleware, Next};
pub use types::{Request, Response, ResponseExt};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bootstrap::router_from_config;
    pub use crate::config::{ConfigLoader, WaypointConfig};
    pub use crate::context::DispatchContext;
    pub use crate::dispatch::{Dispatcher, HandlerRegistry, MiddlewareRegistry};
    pub use crate::error::DispatchError;
    pub use crate::middleware::{handler_fn, BoxFuture, FnMiddleware, Handler, Middleware, Next};
    pub use crate::router::{
        Arguments, GenerateParams, MatchRequest, ReferenceType, Route, RouteMatch, Router,
        RouterError, RouterOptions,
    };
    pub use crate::types::{Request, Response, ResponseExt};
}

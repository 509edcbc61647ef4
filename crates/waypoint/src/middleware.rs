//! Middleware and handler traits.
//!
//! A dispatched request runs through the global middlewares, then the
//! route's own middlewares, each in declaration order, before reaching the
//! handler. Every stage receives a [`Next`] and decides whether to continue.
//!
//! # Example
//!
//! ```
//! use waypoint::middleware::{BoxFuture, Middleware, Next};
//! use waypoint::{DispatchContext, Request, Response};
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut DispatchContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             let response = next.run(ctx, request).await;
//!             tracing::debug!(elapsed = ?ctx.elapsed(), "handled");
//!             response
//!         })
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

use crate::context::DispatchContext;
use crate::types::{Request, Response};

/// A boxed future that returns a response.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A stage wrapped around route handlers.
///
/// Middleware calls `next.run()` at most once. Not calling it short-circuits
/// the chain with the middleware's own response.
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this middleware, used in logs.
    fn name(&self) -> &str;

    /// Processes the request, usually by delegating to `next`.
    fn process<'a>(
        &'a self,
        ctx: &'a mut DispatchContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// The endpoint a route's handler reference resolves to.
pub trait Handler: Send + Sync + 'static {
    /// Handles a matched request.
    fn call<'a>(&'a self, ctx: &'a mut DispatchContext, request: Request)
        -> BoxFuture<'a, Response>;
}

/// Callback to invoke the rest of the chain.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Handler(&'a dyn Handler),
}

impl<'a> Next<'a> {
    /// Builds the chain `middlewares[0] -> ... -> middlewares[n-1] -> handler`.
    pub(crate) fn chain<I>(middlewares: I, handler: &'a dyn Handler) -> Self
    where
        I: IntoIterator<Item = &'a dyn Middleware>,
        I::IntoIter: DoubleEndedIterator,
    {
        let mut next = Self {
            inner: NextInner::Handler(handler),
        };
        for middleware in middlewares.into_iter().rev() {
            next = Self {
                inner: NextInner::Chain {
                    middleware,
                    next: Box::new(next),
                },
            };
        }
        next
    }

    /// Invokes the next middleware or the handler.
    ///
    /// This consumes `self` so the chain can only continue once.
    pub async fn run(self, ctx: &mut DispatchContext, request: Request) -> Response {
        match self.inner {
            NextInner::Chain { middleware, next } => {
                middleware.process(ctx, request, *next).await
            }
            NextInner::Handler(handler) => handler.call(ctx, request).await,
        }
    }
}

/// A middleware created from a closure.
///
/// # Example
///
/// ```
/// use waypoint::middleware::FnMiddleware;
///
/// let tag = FnMiddleware::new("tag", |ctx, request, next| {
///     Box::pin(async move {
///         let mut response = next.run(ctx, request).await;
///         response
///             .headers_mut()
///             .insert("x-served-by", http::HeaderValue::from_static("waypoint"));
///         response
///     })
/// });
/// # let _ = tag;
/// ```
pub struct FnMiddleware<F> {
    name: String,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut DispatchContext, Request, Next<'a>) -> BoxFuture<'a, Response>
        + Send
        + Sync
        + 'static,
{
    /// Creates a new closure-based middleware.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut DispatchContext, Request, Next<'a>) -> BoxFuture<'a, Response>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut DispatchContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        (self.func)(ctx, request, next)
    }
}

/// A handler created from an async function of the request.
///
/// The route arguments are available through the request extensions as
/// [`Arguments`](waypoint_router::Arguments).
pub struct FnHandler<F> {
    func: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    /// Wraps an async function as a handler.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call<'a>(&'a self, _ctx: &'a mut DispatchContext, request: Request) -> BoxFuture<'a, Response> {
        Box::pin((self.func)(request))
    }
}

/// Shorthand for [`FnHandler::new`].
pub fn handler_fn<F, Fut>(func: F) -> FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FnHandler::new(func)
}

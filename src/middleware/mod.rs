//! Middleware layer.
//!
//! Middleware wraps the matched handler and is the right place for
//! cross-cutting concerns: request logging, authentication, rate limiting,
//! header injection.
//!
//! A middleware is any `async fn(Request, Next) -> impl IntoResponse`.
//! Calling `next.run(req)` continues the chain; not calling it ends the
//! request right there with whatever the middleware returns.
//!
//! ```rust
//! use amber::{Next, Request, Response, Router};
//! use amber::StatusCode;
//!
//! async fn require_token(req: Request, next: Next) -> Response {
//!     if req.header("authorization").is_none() {
//!         return Response::status(StatusCode::UNAUTHORIZED);
//!     }
//!     next.run(req).await
//! }
//!
//! async fn stamp(req: Request, next: Next) -> Response {
//!     let mut res = next.run(req).await;
//!     res.append_header("x-served-by", "amber");
//!     res
//! }
//!
//! let app = Router::new()
//!     .middleware(stamp)          // outermost
//!     .middleware(require_token); // innermost, right around the handler
//! ```
//!
//! # Ordering
//!
//! Registration order is nesting order. For `[m1, m2]` around handler `h`,
//! `m1` runs first, `m2` runs only if `m1` calls `next`, and `h` runs only
//! if `m2` does. On the way out the order reverses: `m2` sees the response
//! before `m1` does. The chain is composed once when the app is built and
//! shared, read-only, by every request.

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Erasure ───────────────────────────────────────────────────────────────────

#[doc(hidden)]
pub trait ErasedMiddleware {
    fn call(&self, req: Request, next: Next) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedMiddleware = Arc<dyn ErasedMiddleware + Send + Sync + 'static>;

/// Implemented for every `async fn(Request, Next) -> impl IntoResponse`.
///
/// Sealed, like [`Handler`](crate::Handler).
pub trait Middleware: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_middleware(self) -> BoxedMiddleware;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_middleware(self) -> BoxedMiddleware {
        Arc::new(FnMiddleware(self))
    }
}

struct FnMiddleware<F>(F);

impl<F, Fut, R> ErasedMiddleware for FnMiddleware<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let fut = (self.0)(req, next);
        Box::pin(async move { fut.await.into_response() })
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The rest of the chain: the remaining middleware, then the handler.
///
/// Consumed by [`Next::run`], so each layer can continue at most once.
pub struct Next {
    layers: Arc<[BoxedMiddleware]>,
    index: usize,
    endpoint: BoxedHandler,
}

impl Next {
    /// Runs the next layer, or the handler when no middleware is left.
    pub fn run(self, req: Request) -> impl Future<Output = Response> + Send + 'static {
        match self.layers.get(self.index) {
            Some(layer) => {
                let layer = Arc::clone(layer);
                let next = Next { layers: self.layers, index: self.index + 1, endpoint: self.endpoint };
                layer.call(req, next)
            }
            None => self.endpoint.call(req),
        }
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// The composed middleware sequence, built once per app.
#[derive(Clone)]
pub(crate) struct Chain {
    layers: Arc<[BoxedMiddleware]>,
}

impl Chain {
    pub(crate) fn new(layers: Vec<BoxedMiddleware>) -> Self {
        Self { layers: layers.into() }
    }

    pub(crate) fn len(&self) -> usize {
        self.layers.len()
    }

    /// Runs `req` through every layer with `endpoint` innermost.
    pub(crate) fn run(&self, endpoint: BoxedHandler, req: Request) -> BoxFuture {
        if self.layers.is_empty() {
            return endpoint.call(req);
        }
        let next = Next { layers: Arc::clone(&self.layers), index: 0, endpoint };
        Box::pin(next.run(req))
    }
}

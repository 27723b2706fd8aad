//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The route table holds handlers of *different* types side by side, so each
//! one is hidden behind a trait object (`dyn ErasedHandler`) and stored
//! uniformly:
//!
//! ```text
//! async fn hello(req: Request) -> Response { … }   ← user writes this
//!        ↓ router.get("/", hello)
//! hello.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                       ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req)  at request time               ← one vtable dispatch
//!        ↓
//! Box::pin(async { hello(req).await.into_response() })  ← BoxFuture
//! ```
//!
//! A [`Resource`] is erased the same way, once per verb: each registration
//! wraps the shared `Arc<R>` together with the verb it answers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::method::Method;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a [`Response`].
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` with the signature:
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
/// ```
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Bridges a concrete handler `F` into the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

// ── Resource ──────────────────────────────────────────────────────────────────

/// A path answered by one type, one method per verb.
///
/// Implement only the verbs the resource supports. The rest answer with
/// [`Response::method_not_allowed`], which finalizes as `405`.
///
/// ```rust
/// use amber::{Request, Resource, Response, Router};
///
/// struct Session;
///
/// impl Resource for Session {
///     async fn get(&self, _req: Request) -> Response {
///         Response::text("login form")
///     }
///     async fn post(&self, _req: Request) -> Response {
///         Response::redirect("/")
///     }
/// }
///
/// let app = Router::new().resource("/session", Session);
/// ```
pub trait Resource: Send + Sync + 'static {
    fn get(&self, req: Request) -> impl Future<Output = Response> + Send {
        not_allowed(req)
    }

    fn post(&self, req: Request) -> impl Future<Output = Response> + Send {
        not_allowed(req)
    }

    fn put(&self, req: Request) -> impl Future<Output = Response> + Send {
        not_allowed(req)
    }

    fn patch(&self, req: Request) -> impl Future<Output = Response> + Send {
        not_allowed(req)
    }

    fn delete(&self, req: Request) -> impl Future<Output = Response> + Send {
        not_allowed(req)
    }
}

async fn not_allowed(_req: Request) -> Response {
    Response::method_not_allowed()
}

/// One verb of a shared resource.
pub(crate) struct ResourceVerb<R> {
    resource: Arc<R>,
    method: Method,
}

impl<R: Resource> ResourceVerb<R> {
    pub(crate) fn boxed(resource: &Arc<R>, method: Method) -> BoxedHandler {
        Arc::new(Self { resource: Arc::clone(resource), method })
    }
}

impl<R: Resource> ErasedHandler for ResourceVerb<R> {
    fn call(&self, req: Request) -> BoxFuture {
        let resource = Arc::clone(&self.resource);
        let method = self.method;
        Box::pin(async move {
            match method {
                Method::Get | Method::Head => resource.get(req).await,
                Method::Post => resource.post(req).await,
                Method::Put => resource.put(req).await,
                Method::Patch => resource.patch(req).await,
                Method::Delete => resource.delete(req).await,
            }
        })
    }
}

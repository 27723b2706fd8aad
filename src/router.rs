//! Route registration and lookup.
//!
//! Routes are filed by the literal text in front of their first placeholder
//! (see [`pattern`](crate::pattern)), one ordered list of alternatives per
//! verb. A lookup only scans the buckets whose key is a segment prefix of the
//! request path, and among every alternative that accepts the path, the one
//! registered first wins. Overlapping patterns are therefore resolved by
//! registration order alone: register the specific route before the general
//! one when both could match.
//!
//! The table is filled while the [`Router`] is built and is read-only once
//! the server starts, so concurrent lookups need no synchronization.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::decode::{Decoder, Decoders};
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler, Resource, ResourceVerb};
use crate::method::Method;
use crate::middleware::{BoxedMiddleware, Middleware};
use crate::pattern::{Params, RequestPath, RoutePattern};

/// The application router.
///
/// Build it once at startup and pass it to [`Server::serve`](crate::Server::serve).
/// Each registration returns `self` so calls chain naturally.
pub struct Router {
    pub(crate) table: RouteTable,
    pub(crate) middleware: Vec<BoxedMiddleware>,
    pub(crate) decoders: Decoders,
}

impl Router {
    pub fn new() -> Self {
        Self {
            table: RouteTable::default(),
            middleware: Vec::new(),
            decoders: Decoders::default(),
        }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    /// `{name:type}` is accepted, but the value is always passed as a string.
    ///
    /// ```rust
    /// # use amber::{Method, Request, Response, Router};
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn delete_user(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::Get,    "/users/{id}", get_user)
    ///     .on(Method::Delete, "/users/{id}", delete_user);
    /// ```
    ///
    /// Registering the same method and path twice adds a second alternative
    /// behind the first; it does not replace it.
    ///
    /// # Panics
    ///
    /// Panics on `Method::Head`, which is always answered by the `GET` routes.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.add(method, path, handler.into_boxed_handler())
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Get, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Post, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Put, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Patch, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Delete, path, handler)
    }

    /// Register from a `"METHOD /path"` declaration.
    ///
    /// ```rust
    /// # use amber::{Request, Response, Router};
    /// # async fn list(_: Request) -> Response { Response::text("") }
    /// Router::new().route("GET /posts/{slug}", list);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the declaration is malformed; see [`Router::try_route`].
    pub fn route(self, declaration: &str, handler: impl Handler) -> Self {
        self.try_route(declaration, handler)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Like [`Router::route`], returning the error instead of panicking.
    pub fn try_route(mut self, declaration: &str, handler: impl Handler) -> Result<Self, Error> {
        let (method, path) = parse_declaration(declaration)?;
        self.table.insert(method, path, handler.into_boxed_handler())?;
        Ok(self)
    }

    /// Register every verb of `resource` on `path`.
    ///
    /// Verbs the resource does not implement answer `405` from the
    /// resource's default method, without an `Allow` header. The route
    /// table sees all five verbs as registered, so when another route's
    /// `405` lists the verbs of a bucket the resource shares, it names all
    /// five of them.
    pub fn resource<R: Resource>(mut self, path: &str, resource: R) -> Self {
        let resource = Arc::new(resource);
        for method in Method::ROUTABLE {
            self = self.add(method, path, ResourceVerb::boxed(&resource, method));
        }
        self
    }

    /// Append a middleware. The first one registered is the outermost.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(middleware.into_boxed_middleware());
        self
    }

    /// Register a body decoder, consulted before the built-in ones.
    pub fn decoder(mut self, decoder: impl Decoder) -> Self {
        self.decoders.push(decoder);
        self
    }

    fn add(mut self, method: Method, path: &str, handler: BoxedHandler) -> Self {
        self.table
            .insert(method, path, handler)
            .unwrap_or_else(|e| panic!("{e}"));
        self
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

fn parse_declaration(declaration: &str) -> Result<(Method, &str), Error> {
    let invalid = |reason: &str| Error::Route {
        route: declaration.to_owned(),
        reason: reason.to_owned(),
    };

    let mut parts = declaration.split_whitespace();
    let (Some(verb), Some(path), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid("expected `METHOD /path`"));
    };
    let method = verb.parse().map_err(|()| invalid("unsupported method"))?;
    Ok((method, path))
}

// ── Route table ───────────────────────────────────────────────────────────────

/// The outcome of matching a request against the route table.
pub(crate) enum Lookup<'a> {
    Found {
        handler: &'a BoxedHandler,
        params: Params,
        route: &'a str,
    },
    NotFound,
    /// The path is routed, just not for this verb. `allow` lists the verbs
    /// that would have matched.
    MethodNotAllowed { allow: Vec<Method> },
}

struct RouteEntry {
    pattern: RoutePattern,
    handler: BoxedHandler,
    /// Global registration sequence number; lower wins.
    seq: usize,
}

#[derive(Default)]
struct Bucket {
    routes: HashMap<Method, Vec<RouteEntry>>,
}

#[derive(Default)]
pub(crate) struct RouteTable {
    buckets: HashMap<String, Bucket>,
    registered: usize,
}

impl RouteTable {
    pub(crate) fn insert(&mut self, method: Method, route: &str, handler: BoxedHandler) -> Result<(), Error> {
        if method == Method::Head {
            return Err(Error::Route {
                route: route.to_owned(),
                reason: "HEAD is answered by the GET routes".to_owned(),
            });
        }

        let pattern = RoutePattern::compile(route)?;
        debug!(
            %method,
            route = pattern.route(),
            key = pattern.key(),
            params = ?pattern.param_names(),
            wildcard = pattern.is_wildcard(),
            "route registered"
        );
        let seq = self.registered;
        self.registered += 1;

        self.buckets
            .entry(pattern.key().to_owned())
            .or_default()
            .routes
            .entry(method)
            .or_default()
            .push(RouteEntry { pattern, handler, seq });
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.registered
    }

    /// Resolves `path` for `method`.
    ///
    /// Among the buckets filed under a segment prefix of the path, a miss is
    /// `MethodNotAllowed` when none of them holds a route for the verb at
    /// all, and `NotFound` when some do but none accepts the path.
    pub(crate) fn lookup(&self, method: Method, path: &str) -> Lookup<'_> {
        let path = RequestPath::new(path);
        let keys = path.bucket_keys();
        let method = method.routed_as();

        if let Some((entry, params)) = self.first_match(method, &keys, &path) {
            return Lookup::Found {
                handler: &entry.handler,
                params,
                route: entry.pattern.route(),
            };
        }

        let buckets: Vec<&Bucket> = keys.iter().filter_map(|k| self.buckets.get(*k)).collect();
        if buckets.is_empty() || buckets.iter().any(|b| b.routes.contains_key(&method)) {
            return Lookup::NotFound;
        }
        Lookup::MethodNotAllowed { allow: allowed(&buckets) }
    }

    /// The earliest-registered entry for `method` that accepts `path`.
    fn first_match(
        &self,
        method: Method,
        keys: &[&str],
        path: &RequestPath<'_>,
    ) -> Option<(&RouteEntry, Params)> {
        let mut best: Option<(&RouteEntry, Params)> = None;

        for key in keys {
            let Some(entries) = self.buckets.get(*key).and_then(|b| b.routes.get(&method)) else {
                continue;
            };
            // Entries within a bucket are already in registration order.
            for entry in entries {
                if best.as_ref().is_some_and(|(b, _)| b.seq < entry.seq) {
                    break;
                }
                if let Some(params) = entry.pattern.matches(path) {
                    best = Some((entry, params));
                    break;
                }
            }
        }

        best
    }
}

/// Every verb registered in `buckets`, GET implying HEAD.
fn allowed(buckets: &[&Bucket]) -> Vec<Method> {
    let mut allow: Vec<Method> = Vec::new();
    for method in buckets.iter().flat_map(|b| b.routes.keys()) {
        if !allow.contains(method) {
            allow.push(*method);
        }
    }
    if allow.contains(&Method::Get) {
        allow.push(Method::Head);
    }
    allow.sort();
    allow
}

//! Per-request dispatch and response finalization.
//!
//! Every request walks the same four steps:
//!
//! ```text
//! MATCHING     static namespace? route table lookup
//!              ├─ not found            → 404 ─────────────────┐
//!              └─ method not allowed   → 405 ─────────────────┤
//! DISPATCHING  decode body, build Request, run the chain      │
//!              (panics are caught here, never reach hyper)    │
//! RESOLVING    405 flag > redirect > fault > normal response  │
//! FINALIZED    one http::Response, written once ◄─────────────┘
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures_util::FutureExt;
use http::header::{self, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::decode::{Body, Decoders};
use crate::fault::Fault;
use crate::method::Method;
use crate::middleware::Chain;
use crate::pattern::percent_decode;
use crate::request::Request;
use crate::response::Response;
use crate::router::{Lookup, RouteTable, Router};
use crate::static_files::StaticFiles;
use crate::template::Templates;

const NOT_FOUND_BODY: &str = "404 (Not Found)\n";
const METHOD_NOT_ALLOWED_BODY: &str = "405 (Method Not Allowed)\n";

/// A built application: the frozen route table, the composed middleware
/// chain, and the collaborators the dispatcher calls into.
///
/// [`Server`](crate::Server) builds one and shares it across connections.
/// Tests can build one directly and drive it with [`App::handle`].
pub struct App {
    table: RouteTable,
    chain: Chain,
    decoders: Decoders,
    statics: Option<StaticFiles>,
    templates: Templates,
}

impl App {
    pub fn new(router: Router, config: &Config) -> Self {
        let Router { table, middleware, decoders } = router;
        let chain = Chain::new(middleware);
        debug!(routes = table.len(), middleware = chain.len(), "app built");

        Self {
            table,
            chain,
            decoders,
            statics: config
                .static_dir
                .as_deref()
                .map(|name| StaticFiles::new(name, &config.static_root)),
            templates: Templates::new(&config.templates_dir),
        }
    }

    /// Routes one request and produces its one response.
    ///
    /// Never fails: every outcome, including a panicking handler, becomes a
    /// well-formed response.
    pub async fn handle(&self, req: http::Request<Bytes>) -> http::Response<Full<Bytes>> {
        let started = Instant::now();
        let (parts, raw) = req.into_parts();
        let verb = parts.method.clone();
        let path = parts.uri.path().to_owned();

        let res = self.respond(parts, raw).await;
        let res = finalize(res, verb == http::Method::HEAD);

        info!(
            method = %verb,
            path = %path,
            status = res.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request"
        );
        res
    }

    async fn respond(&self, parts: http::request::Parts, raw: Bytes) -> Response {
        // ── MATCHING ─────────────────────────────────────────────────────────
        let Ok(method) = Method::try_from(&parts.method) else {
            debug!(method = %parts.method, "unsupported method");
            return Response::method_not_allowed();
        };
        let path = parts.uri.path();

        if let Some(statics) = &self.statics {
            if statics.owns(path) {
                return statics.serve(method, &percent_decode(path)).await;
            }
        }

        let (handler, params) = match self.table.lookup(method, path) {
            Lookup::Found { handler, params, route } => {
                debug!(%method, path, route, "matched");
                (Arc::clone(handler), params)
            }
            Lookup::NotFound => {
                debug!(%method, path, "route not found");
                return not_found();
            }
            Lookup::MethodNotAllowed { allow } => {
                debug!(%method, path, "method not allowed");
                let mut res = Response::method_not_allowed();
                res.append_header("allow", allow_header(&allow));
                return res;
            }
        };

        // ── DISPATCHING ──────────────────────────────────────────────────────
        let body = if method.has_body() {
            let content_type = parts
                .headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            match self.decoders.decode(content_type, &raw) {
                Ok(body) => body,
                Err(e) => {
                    error!(%method, path, error = %e, "body decode failed");
                    return Response::fault(Fault::new(e.to_string()));
                }
            }
        } else {
            Body::default()
        };

        let req = Request::new(
            method,
            percent_decode(path).into_owned(),
            parts.uri.query().map(str::to_owned),
            parts.headers,
            params,
            self.templates.clone(),
        )
        .with_body(raw, body);

        let res = match AssertUnwindSafe(self.chain.run(handler, req)).catch_unwind().await {
            Ok(res) => res,
            Err(panic) => Response::fault(Fault::from_panic(panic)),
        };

        if let Some(fault) = res.fault_ref() {
            error!(%method, path, fault = %fault, "handler fault");
        }
        res
    }
}

fn not_found() -> Response {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .text(NOT_FOUND_BODY)
}

fn allow_header(allow: &[Method]) -> String {
    allow.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ")
}

// ── RESOLVING + FINALIZED ─────────────────────────────────────────────────────

/// Converts the accumulated [`Response`] into the one response written to
/// the wire. `head` keeps the headers and drops the body.
pub(crate) fn finalize(res: Response, head: bool) -> http::Response<Full<Bytes>> {
    let mut headers = http::HeaderMap::new();

    // Headers set along the chain go out on every path; the values each
    // path writes below replace same-named ones.
    for (name, value) in &res.headers {
        append(&mut headers, name, value);
    }

    let (status, body): (StatusCode, Vec<u8>) = if res.method_not_allowed {
        insert(&mut headers, header::CONTENT_TYPE.as_str(), "text/plain; charset=utf-8");
        (StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED_BODY.into())
    } else if let Some(url) = &res.redirect {
        insert(&mut headers, header::LOCATION.as_str(), url);
        insert(&mut headers, header::CONTENT_TYPE.as_str(), "text/plain; charset=utf-8");
        (StatusCode::MOVED_PERMANENTLY, format!("Redirecting to {url}").into_bytes())
    } else if let Some(fault) = &res.fault {
        insert(&mut headers, header::CONTENT_TYPE.as_str(), "text");
        (StatusCode::INTERNAL_SERVER_ERROR, fault.page().into_bytes())
    } else {
        if let Some(ct) = &res.content_type {
            insert(&mut headers, header::CONTENT_TYPE.as_str(), ct);
        }
        (res.status, res.body)
    };

    insert(&mut headers, header::CACHE_CONTROL.as_str(), "no-cache");

    let body = if head {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        Bytes::new()
    } else {
        Bytes::from(body)
    };

    let mut out = http::Response::new(Full::new(body));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}

fn insert(headers: &mut http::HeaderMap, name: &str, value: &str) {
    if let Some((name, value)) = header_pair(name, value) {
        headers.insert(name, value);
    }
}

fn append(headers: &mut http::HeaderMap, name: &str, value: &str) {
    if let Some((name, value)) = header_pair(name, value) {
        headers.append(name, value);
    }
}

fn header_pair(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
        (Ok(n), Ok(v)) => Some((n, v)),
        _ => {
            warn!(header = name, "dropping invalid response header");
            None
        }
    }
}

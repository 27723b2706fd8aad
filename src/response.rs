//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! A [`Response`] is the accumulator a request's middleware chain and handler
//! fill in. It is not written to the wire directly: the dispatcher inspects
//! it once, after the chain returns, and picks the finalization path. In
//! priority order:
//!
//! 1. the method-not-allowed flag → `405`
//! 2. a redirect target → `301` with `Location`
//! 3. a fault → `500` page
//! 4. otherwise status, content type, headers and body as accumulated

use http::StatusCode;

use crate::fault::Fault;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Css,          // text/css
    FormData,     // application/x-www-form-urlencoded
    Html,         // text/html; charset=utf-8
    Javascript,   // text/javascript
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Css         => "text/css",
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html; charset=utf-8",
            Self::Javascript  => "text/javascript",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response, still open to middleware on the way out.
///
/// # Shortcuts
///
/// ```rust
/// use amber::Response;
/// use amber::StatusCode;
///
/// Response::text("hello");
/// Response::html("<h1>hi</h1>");
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::status(StatusCode::NO_CONTENT);
/// Response::redirect("/login");
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use amber::{ContentType, Response};
/// use amber::StatusCode;
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) content_type: Option<String>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
    pub(crate) redirect: Option<String>,
    pub(crate) method_not_allowed: bool,
    pub(crate) fault: Option<Fault>,
}

impl Response {
    fn new(status: StatusCode) -> Self {
        Self {
            status,
            content_type: None,
            headers: Vec::new(),
            body: Vec::new(),
            redirect: None,
            method_not_allowed: false,
            fault: None,
        }
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// `200 OK`, `text/html; charset=utf-8`.
    pub fn html(body: impl Into<String>) -> Self {
        Self::builder().html(body)
    }

    /// `200 OK`, `application/json`. Pass the bytes your serializer produced.
    pub fn json(body: Vec<u8>) -> Self {
        Self::builder().json(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self::new(code)
    }

    /// Finalized as `301 Moved Permanently` with `Location: url`.
    pub fn redirect(url: impl Into<String>) -> Self {
        let mut res = Self::new(StatusCode::MOVED_PERMANENTLY);
        res.redirect = Some(url.into());
        res
    }

    /// Finalized as `405 Method Not Allowed`, whatever else is set.
    ///
    /// This is what [`Resource`](crate::Resource) verbs answer by default.
    pub fn method_not_allowed() -> Self {
        let mut res = Self::new(StatusCode::METHOD_NOT_ALLOWED);
        res.method_not_allowed = true;
        res
    }

    /// Finalized as the `500` page carrying `fault`.
    pub fn fault(fault: impl Into<Fault>) -> Self {
        let mut res = Self::new(StatusCode::INTERNAL_SERVER_ERROR);
        res.fault = Some(fault.into());
        res
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK }
    }

    // ── Inspection, for middleware running after `next` ─────────────────────

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn content_type(&self) -> Option<&str> { self.content_type.as_deref() }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn redirect_target(&self) -> Option<&str> { self.redirect.as_deref() }
    pub fn is_method_not_allowed(&self) -> bool { self.method_not_allowed }
    pub fn fault_ref(&self) -> Option<&Fault> { self.fault.as_ref() }

    /// Case-insensitive lookup of a header set by the handler or middleware.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    // ── Mutation, for middleware running after `next` ───────────────────────

    pub fn set_status(&mut self, code: StatusCode) {
        self.status = code;
    }

    /// Appends a header. Repeated names are all written.
    pub fn append_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn json(self, body: Vec<u8>) -> Response {
        self.finish(ContentType::Json.as_str(), body)
    }

    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(ContentType::Text.as_str(), body.into().into_bytes())
    }

    pub fn html(self, body: impl Into<String>) -> Response {
        self.finish(ContentType::Html.as_str(), body.into().into_bytes())
    }

    /// Terminate with a typed body.
    pub fn bytes(self, content_type: ContentType, body: Vec<u8>) -> Response {
        self.finish(content_type.as_str(), body)
    }

    /// Terminate with a body whose content type is not in [`ContentType`].
    pub fn raw(self, content_type: &str, body: Vec<u8>) -> Response {
        self.finish(content_type, body)
    }

    /// Terminate with no body.
    pub fn no_body(self) -> Response {
        let mut res = Response::new(self.status);
        res.headers = self.headers;
        res
    }

    fn finish(self, content_type: &str, body: Vec<u8>) -> Response {
        let mut res = Response::new(self.status);
        res.content_type = Some(content_type.to_owned());
        res.headers = self.headers;
        res.body = body;
        res
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `return StatusCode::NO_CONTENT`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

/// `Err` becomes the `500` page, so handlers can use `?` freely:
///
/// ```rust
/// use amber::{Request, Response};
///
/// async fn load(req: Request) -> anyhow::Result<Response> {
///     let id: u64 = req.param("id").unwrap_or_default().parse()?;
///     Ok(Response::text(id.to_string()))
/// }
/// ```
impl<T, E> IntoResponse for Result<T, E>
where
    T: IntoResponse,
    E: Into<anyhow::Error>,
{
    fn into_response(self) -> Response {
        match self {
            Ok(v) => v.into_response(),
            Err(e) => {
                let err: anyhow::Error = e.into();
                Response::fault(err)
            }
        }
    }
}

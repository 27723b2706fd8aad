//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::{Extensions, HeaderMap};

use crate::decode::Body;
use crate::method::Method;
use crate::pattern::Params;
use crate::template::Templates;

/// An incoming HTTP request: what the transport delivered, plus what routing
/// and body decoding derived from it.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query_string: Option<String>,
    pub(crate) query: HashMap<String, Vec<String>>,
    pub(crate) headers: HeaderMap,
    pub(crate) cookies: HashMap<String, String>,
    pub(crate) params: Params,
    pub(crate) body: Body,
    pub(crate) raw_body: Bytes,
    pub(crate) extensions: Extensions,
    pub(crate) templates: Templates,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        path: String,
        query_string: Option<String>,
        headers: HeaderMap,
        params: Params,
        templates: Templates,
    ) -> Self {
        let query = query_string.as_deref().map(parse_query).unwrap_or_default();
        let cookies = parse_cookies(&headers);
        Self {
            method,
            path,
            query_string,
            query,
            headers,
            cookies,
            params,
            body: Body::default(),
            raw_body: Bytes::new(),
            extensions: Extensions::new(),
            templates,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(method: Method, path: &str) -> Self {
        Self::new(
            method,
            path.to_owned(),
            None,
            HeaderMap::new(),
            Params::new(),
            Templates::new("templates"),
        )
    }

    pub(crate) fn with_body(mut self, raw: Bytes, body: Body) -> Self {
        self.raw_body = raw;
        self.body = body;
        self
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query_string(&self) -> Option<&str> { self.query_string.as_deref() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn params(&self) -> &Params { &self.params }
    pub fn cookies(&self) -> &HashMap<String, String> { &self.cookies }
    pub fn body(&self) -> &Body { &self.body }
    pub fn raw_body(&self) -> &[u8] { &self.raw_body }
    pub fn templates(&self) -> &Templates { &self.templates }

    /// Values middleware left for the handler, keyed by type.
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// Case-insensitive header lookup; first value when repeated.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Every value of a repeated header, in arrival order.
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// First value of a query parameter. A key given without `=` has value `""`.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key)?.first().map(String::as_str)
    }

    /// Every value of a query parameter, in the order they appeared.
    pub fn query_all(&self, key: &str) -> &[String] {
        self.query.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}

fn parse_query(query: &str) -> HashMap<String, Vec<String>> {
    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
        out.entry(k.into_owned()).or_default().push(v.into_owned());
    }
    out
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.trim().to_owned(), value.trim().trim_matches('"').to_owned()))
        })
        .collect()
}

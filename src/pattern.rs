//! Route pattern compilation.
//!
//! A declared route such as `/users/{id}/posts/{slug}` compiles into three
//! pieces:
//!
//! - a bucket key (`/users`): the literal text before the first placeholder,
//!   cut back to a whole segment. The route table files the pattern under it
//!   so that unrelated routes never scan each other.
//! - the parameter names in declaration order (`["id", "slug"]`).
//! - an anchored matcher (`^/users/([^/]*)/posts/([^/]*)$`).
//!
//! Routes without placeholders have no matcher. They are filed under their
//! own normalized path and only ever match it exactly.
//!
//! Placeholder names are labels, nothing more: `{id}` and `{user}` compile to
//! the same single-segment wildcard. A type tag such as `{id:int}` is accepted
//! and ignored; the handler receives the raw string.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;

/// Matches one `{name}` or `{name:type}` placeholder.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)(?::[^{}/]*)?\}").expect("placeholder pattern is valid")
});

/// One path segment, possibly empty, never crossing a `/`.
const SEGMENT: &str = "([^/]*)";

/// Path parameters captured by a wildcard route, keyed by placeholder name.
pub type Params = HashMap<String, String>;

/// A compiled route. Built once at registration, immutable afterwards.
#[derive(Debug)]
pub(crate) struct RoutePattern {
    /// The normalized declaration, e.g. `/users/{id}`.
    route: String,
    key: String,
    params: Vec<String>,
    matcher: Option<Regex>,
}

impl RoutePattern {
    pub(crate) fn compile(route: &str) -> Result<Self, Error> {
        let route = normalize_route(route);

        let mut params = Vec::new();
        let mut source = String::with_capacity(route.len() + 16);
        source.push('^');

        let mut first = None;
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(&route) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            first.get_or_insert(whole.start());
            source.push_str(&regex::escape(&route[last..whole.start()]));
            source.push_str(SEGMENT);
            params.push(name.as_str().to_owned());
            last = whole.end();
        }

        let Some(first) = first else {
            return Ok(Self { key: route.clone(), route, params, matcher: None });
        };

        source.push_str(&regex::escape(&route[last..]));
        source.push('$');

        let matcher = Regex::new(&source).map_err(|e| Error::Route {
            route: route.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            key: bucket_key(&route[..first]),
            route,
            params,
            matcher: Some(matcher),
        })
    }

    /// The route table key this pattern is filed under.
    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn route(&self) -> &str {
        &self.route
    }

    pub(crate) fn param_names(&self) -> &[String] {
        &self.params
    }

    pub(crate) fn is_wildcard(&self) -> bool {
        self.matcher.is_some()
    }

    /// Tries a request path against this pattern.
    ///
    /// Literal patterns accept only an exact match on the decoded path.
    /// Wildcard patterns must match the whole path and never accept the
    /// bare root `/`. They run against the raw path first, so an encoded
    /// `%2F` stays inside its segment, and captured values are decoded.
    pub(crate) fn matches(&self, path: &RequestPath<'_>) -> Option<Params> {
        let Some(matcher) = &self.matcher else {
            return (path.decoded == self.route).then(Params::new);
        };

        if path.raw == "/" {
            return None;
        }

        if let Some(caps) = matcher.captures(path.raw) {
            return Some(self.bind(caps, |v| percent_decode(v).into_owned()));
        }
        // Literal text of the route may itself need decoding, e.g. `/café/{x}`.
        if path.decoded != path.raw && path.same_segments() {
            let caps = matcher.captures(&path.decoded)?;
            return Some(self.bind(caps, str::to_owned));
        }
        None
    }

    fn bind(&self, caps: regex::Captures<'_>, value: impl Fn(&str) -> String) -> Params {
        self.params
            .iter()
            .zip(caps.iter().skip(1))
            .map(|(name, m)| (name.clone(), value(m.map(|m| m.as_str()).unwrap_or_default())))
            .collect()
    }
}

/// A normalized request path, raw and percent-decoded.
pub(crate) struct RequestPath<'a> {
    raw: &'a str,
    decoded: Cow<'a, str>,
}

impl<'a> RequestPath<'a> {
    pub(crate) fn new(path: &'a str) -> Self {
        let raw = normalize_path(path);
        Self { raw, decoded: percent_decode(raw) }
    }

    /// Decoding did not introduce a `/`, so both forms split alike.
    fn same_segments(&self) -> bool {
        self.raw.matches('/').count() == self.decoded.matches('/').count()
    }

    /// Bucket keys for the raw path, then any extra ones the decoded
    /// path reaches, longest first within each.
    pub(crate) fn bucket_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = bucket_keys(self.raw).collect();
        if self.decoded != self.raw {
            for key in bucket_keys(&self.decoded) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }
}

/// Percent-decodes a path or segment. Invalid UTF-8 is left encoded.
pub(crate) fn percent_decode(s: &str) -> Cow<'_, str> {
    urlencoding::decode(s).unwrap_or(Cow::Borrowed(s))
}

/// Strips one trailing slash, unless the path is exactly `/`.
fn normalize_path(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => path,
    }
}

fn normalize_route(route: &str) -> String {
    let route = route.trim();
    if route.starts_with('/') {
        normalize_path(route).to_owned()
    } else {
        format!("/{}", normalize_path(route))
    }
}

/// Cuts a literal prefix back to its last complete segment.
///
/// `/users/` → `/users`, `/files/img-` → `/files`, `/` → `/`.
fn bucket_key(prefix: &str) -> String {
    match prefix.rfind('/') {
        Some(0) | None => "/".to_owned(),
        Some(i) => prefix[..i].to_owned(),
    }
}

/// Every bucket key that could hold a route for `path`, longest first.
///
/// `/a/b/c` yields `/a/b/c`, `/a/b`, `/a`, `/`.
fn bucket_keys(path: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(path);
    std::iter::from_fn(move || {
        let current = next?;
        next = match current.rfind('/') {
            Some(0) if current.len() > 1 => Some("/"),
            Some(0) | None => None,
            Some(i) => Some(&current[..i]),
        };
        Some(current)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_route_has_no_matcher() {
        let p = RoutePattern::compile("/users/").unwrap();
        assert!(!p.is_wildcard());
        assert_eq!(p.key(), "/users");
        assert!(p.matches(&RequestPath::new("/users")).is_some());
        assert!(p.matches(&RequestPath::new("/users/1")).is_none());
        assert!(p.matches(&RequestPath::new("/user")).is_none());
    }

    #[test]
    fn placeholders_compile_in_order() {
        let p = RoutePattern::compile("/a/{x}/b/{y}").unwrap();
        assert_eq!(p.key(), "/a");
        assert_eq!(p.param_names(), ["x", "y"]);

        let params = p.matches(&RequestPath::new("/a/1/b/two")).unwrap();
        assert_eq!(params["x"], "1");
        assert_eq!(params["y"], "two");

        assert!(p.matches(&RequestPath::new("/a/b")).is_none());
        assert!(p.matches(&RequestPath::new("/a/1/b/two/three")).is_none());
    }

    #[test]
    fn type_tags_are_inert() {
        let p = RoutePattern::compile("/items/{id:int}").unwrap();
        assert_eq!(p.param_names(), ["id"]);
        assert_eq!(p.matches(&RequestPath::new("/items/abc")).unwrap()["id"], "abc");
    }

    #[test]
    fn literal_text_is_escaped() {
        let p = RoutePattern::compile("/files/{name}.txt").unwrap();
        assert_eq!(p.key(), "/files");
        assert_eq!(p.matches(&RequestPath::new("/files/notes.txt")).unwrap()["name"], "notes");
        assert!(p.matches(&RequestPath::new("/files/notesXtxt")).is_none());
    }

    #[test]
    fn wildcard_never_matches_root() {
        let p = RoutePattern::compile("/{page}").unwrap();
        assert_eq!(p.key(), "/");
        assert!(p.matches(&RequestPath::new("/")).is_none());
        assert_eq!(p.matches(&RequestPath::new("/about")).unwrap()["page"], "about");
    }

    #[test]
    fn missing_leading_slash_is_added() {
        let p = RoutePattern::compile("health").unwrap();
        assert_eq!(p.route(), "/health");
    }

    #[test]
    fn normalize_keeps_root() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/users/"), "/users");
        assert_eq!(normalize_path("/users"), "/users");
    }

    #[test]
    fn bucket_keys_walk_towards_root() {
        let keys: Vec<_> = bucket_keys("/a/b/c").collect();
        assert_eq!(keys, ["/a/b/c", "/a/b", "/a", "/"]);
        let keys: Vec<_> = bucket_keys("/").collect();
        assert_eq!(keys, ["/"]);
    }

    #[test]
    fn captures_are_percent_decoded() {
        let p = RoutePattern::compile("/hi/{name}").unwrap();
        assert_eq!(p.matches(&RequestPath::new("/hi/john%20doe")).unwrap()["name"], "john doe");
        assert_eq!(p.matches(&RequestPath::new("/hi/a%2Fb")).unwrap()["name"], "a/b");
    }

    #[test]
    fn literal_compares_decoded_path() {
        let p = RoutePattern::compile("/hello world").unwrap();
        assert!(p.matches(&RequestPath::new("/hello%20world")).is_some());

        let p = RoutePattern::compile("/café/{x}").unwrap();
        assert_eq!(p.matches(&RequestPath::new("/caf%C3%A9/1")).unwrap()["x"], "1");
    }

    #[test]
    fn decoded_keys_follow_raw_ones() {
        let path = RequestPath::new("/hello%20world/");
        assert_eq!(path.decoded, "/hello world");
        assert_eq!(path.bucket_keys(), ["/hello%20world", "/", "/hello world"]);
    }
}

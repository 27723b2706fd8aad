//! HTTP method as a typed enum.
//!
//! Only the verbs amber routes are represented. `HEAD` is answered by the
//! `GET` routes with the body suppressed. Any other verb is rejected at the
//! dispatcher with `405 Method Not Allowed` before it reaches a handler.

use std::fmt;
use std::str::FromStr;

/// A routable HTTP method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// The verbs a route can be registered for. `HEAD` borrows `GET`'s routes.
    pub const ROUTABLE: [Method; 5] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
    ];

    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Get    => "GET",
            Self::Head   => "HEAD",
            Self::Patch  => "PATCH",
            Self::Post   => "POST",
            Self::Put    => "PUT",
        }
    }

    /// The method whose routes answer a request with this method.
    pub(crate) fn routed_as(self) -> Self {
        match self {
            Self::Head => Self::Get,
            other => other,
        }
    }

    /// Whether a request with this method carries a body worth decoding.
    pub(crate) fn has_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

/// Parses a method name. Case-insensitive, so route declarations may write
/// `get /users` as well as `GET /users`.
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DELETE" => Ok(Self::Delete),
            "GET"    => Ok(Self::Get),
            "HEAD"   => Ok(Self::Head),
            "PATCH"  => Ok(Self::Patch),
            "POST"   => Ok(Self::Post),
            "PUT"    => Ok(Self::Put),
            _        => Err(()),
        }
    }
}

impl TryFrom<&http::Method> for Method {
    type Error = ();

    fn try_from(m: &http::Method) -> Result<Self, Self::Error> {
        match *m {
            http::Method::DELETE => Ok(Self::Delete),
            http::Method::GET    => Ok(Self::Get),
            http::Method::HEAD   => Ok(Self::Head),
            http::Method::PATCH  => Ok(Self::Patch),
            http::Method::POST   => Ok(Self::Post),
            http::Method::PUT    => Ok(Self::Put),
            _                    => Err(()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

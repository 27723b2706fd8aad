//! Unified error type.

use std::io;

/// The error type returned by amber's fallible operations.
///
/// Application-level outcomes (404, 405, 500, redirects) are expressed as
/// HTTP [`Response`](crate::Response) values, not as `Error`s. This type
/// surfaces infrastructure failures: binding a port, reading configuration,
/// or declaring a route that cannot be compiled.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("invalid socket address `{addr}`: {source}")]
    Addr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid route `{route}`: {reason}")]
    Route { route: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

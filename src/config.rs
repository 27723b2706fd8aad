//! Server configuration.
//!
//! A [`Config`] is a plain value handed to [`Server`](crate::Server) or
//! [`App::new`](crate::App::new) and threaded down to the dispatcher. Build
//! it fluently or load it from TOML; every field has a default.
//!
//! ```toml
//! addr = "127.0.0.1:8080"
//! static_dir = "static"
//! static_root = "public"
//! templates_dir = "views"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Socket address to listen on.
    pub addr: String,
    /// Name of the static namespace. `Some("static")` serves `/static/...`
    /// from `{static_root}/static/...`, bypassing the route table.
    pub static_dir: Option<String>,
    /// Directory the static namespace lives under.
    pub static_root: PathBuf,
    /// Directory holding `{name}.html` templates.
    pub templates_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_owned(),
            static_dir: None,
            static_root: PathBuf::from("."),
            templates_dir: PathBuf::from("templates"),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    /// Serve `/{name}/...` from `{static_root}/{name}/...`. Leading and
    /// trailing slashes in `name` are ignored.
    pub fn static_dir(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.static_dir = Some(name.trim_matches('/').to_owned());
        self
    }

    pub fn static_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.static_root = root.into();
        self
    }

    pub fn templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates_dir = dir.into();
        self
    }
}

//! Template rendering.
//!
//! `req.templates().render("profile", ctx)` renders
//! `{templates_dir}/profile.html` with [`minijinja`]. The environment is
//! opened on first use and shared by every request afterwards; concurrent
//! first renders race on a `OnceLock` and all end up using the one winner.
//! Loaded templates stay cached inside the environment.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use minijinja::Environment;
use serde::Serialize;
use tracing::warn;

use crate::response::Response;

/// Shared handle to the template directory. Cloning is one `Arc` increment.
#[derive(Clone)]
pub struct Templates {
    inner: Arc<Inner>,
}

struct Inner {
    dir: PathBuf,
    env: OnceLock<Environment<'static>>,
}

impl Templates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner { dir: dir.into(), env: OnceLock::new() }),
        }
    }

    fn env(&self) -> &Environment<'static> {
        self.inner.env.get_or_init(|| {
            let mut env = Environment::new();
            env.set_loader(minijinja::path_loader(&self.inner.dir));
            env
        })
    }

    /// Renders `name.html` into a `text/html` response.
    ///
    /// A missing or broken template does not fail the request: the body
    /// becomes an inline error heading instead.
    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Response {
        let file = format!("{name}.html");
        let rendered = self
            .env()
            .get_template(&file)
            .and_then(|tpl| tpl.render(ctx));

        match rendered {
            Ok(html) => Response::html(html),
            Err(e) => {
                warn!(template = %file, error = %e, "template render failed");
                Response::html(format!("<h1>Template name is invalid {file} </h1>"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_with_context() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.html"), "Hi {{ name }}!").unwrap();

        let templates = Templates::new(dir.path());
        let res = templates.render("hello", minijinja::context! { name => "Ada" });
        assert_eq!(res.body(), b"Hi Ada!");
        assert_eq!(res.content_type(), Some("text/html; charset=utf-8"));
    }

    #[test]
    fn missing_template_falls_back_inline() {
        let dir = tempfile::tempdir().unwrap();
        let res = Templates::new(dir.path()).render("nope", ());
        assert_eq!(res.body(), b"<h1>Template name is invalid nope.html </h1>");
    }

    #[test]
    fn clones_share_one_environment() {
        let dir = tempfile::tempdir().unwrap();
        let a = Templates::new(dir.path());
        let b = a.clone();
        assert!(std::ptr::eq(a.env(), b.env()));
    }
}

//! Static asset namespace.
//!
//! With `static_dir = "static"`, any request for `/static` or `/static/...`
//! is answered from `{static_root}/static/...` and never reaches the route
//! table or the middleware chain.

use std::io;
use std::path::{Component, Path, PathBuf};

use http::StatusCode;

use crate::fault::Fault;
use crate::method::Method;
use crate::response::Response;

pub(crate) struct StaticFiles {
    prefix: String,
    dir: PathBuf,
}

impl StaticFiles {
    pub(crate) fn new(name: &str, root: &Path) -> Self {
        let name = name.trim_matches('/');
        Self { prefix: format!("/{name}"), dir: root.join(name) }
    }

    pub(crate) fn owns(&self, path: &str) -> bool {
        path.strip_prefix(&self.prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Maps a request path inside the namespace to a file, refusing anything
    /// that would step outside it.
    fn map_path(&self, path: &str) -> Option<PathBuf> {
        let rel = path.strip_prefix(&self.prefix)?.trim_start_matches('/');
        let mut file = self.dir.clone();
        for comp in Path::new(rel).components() {
            match comp {
                Component::Normal(s) => file.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(file)
    }

    pub(crate) async fn serve(&self, method: Method, path: &str) -> Response {
        if !matches!(method, Method::Get | Method::Head) {
            return Response::method_not_allowed();
        }

        let Some(file) = self.map_path(path) else {
            return not_found();
        };

        match tokio::fs::read(&file).await {
            Ok(bytes) => {
                let content_type = mime_guess::from_path(&file).first_or_octet_stream();
                Response::builder().raw(content_type.as_ref(), bytes)
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::IsADirectory) => not_found(),
            // Reading a directory fails differently across platforms.
            Err(_) if file.is_dir() => not_found(),
            Err(e) => Response::fault(Fault::new(format!("reading {}: {e}", file.display()))),
        }
    }
}

fn not_found() -> Response {
    Response::builder().status(StatusCode::NOT_FOUND).text("File not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, StaticFiles) {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("static/css")).unwrap();
        std::fs::write(root.path().join("static/css/site.css"), "body{}").unwrap();
        std::fs::write(root.path().join("secret.txt"), "nope").unwrap();
        let files = StaticFiles::new("static", root.path());
        (root, files)
    }

    #[test]
    fn owns_whole_segments_only() {
        let (_root, files) = fixture();
        assert!(files.owns("/static"));
        assert!(files.owns("/static/css/site.css"));
        assert!(!files.owns("/statics/x"));
        assert!(!files.owns("/"));
    }

    #[test]
    fn traversal_is_refused() {
        let (_root, files) = fixture();
        assert!(files.map_path("/static/../secret.txt").is_none());
        assert!(files.map_path("/static/css/site.css").is_some());
    }

    #[tokio::test]
    async fn serves_with_guessed_type() {
        let (_root, files) = fixture();
        let res = files.serve(Method::Get, "/static/css/site.css").await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.content_type(), Some("text/css"));
        assert_eq!(res.body(), b"body{}");
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let (_root, files) = fixture();
        let res = files.serve(Method::Get, "/static/nope.js").await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(res.body(), b"File not found");

        let res = files.serve(Method::Get, "/static/css").await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn only_get_and_head() {
        let (_root, files) = fixture();
        let res = files.serve(Method::Post, "/static/css/site.css").await;
        assert!(res.is_method_not_allowed());
    }
}

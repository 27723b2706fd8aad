//! # amber
//!
//! A minimal HTTP application framework: declare routes, wrap them in
//! middleware, and let one dispatcher turn every outcome into exactly one
//! response.
//!
//! ## What it does
//!
//! - **Routes** with literal and `{name}` segments, several alternatives per
//!   path, earliest registration wins when more than one matches.
//! - **Middleware** in onion order: the first registered runs first on the
//!   way in and last on the way out, and can stop the chain by not calling
//!   `next`.
//! - **One finalization path**: `404`, `405`, redirects, handler errors and
//!   panics all become well-formed responses; nothing escapes to the socket.
//! - **Collaborators** for the boring parts: body decoding (form, JSON,
//!   multipart), a static asset namespace, `minijinja` templates.
//!
//! Transport is hyper on tokio, one task per connection.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use amber::{Config, Next, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .middleware(log)
//!         .get("/users/{id}", get_user)
//!         .route("POST /users", create_user);
//!
//!     let config = Config::default().addr("0.0.0.0:3000").static_dir("static");
//!     Server::with_config(config).serve(app).await.unwrap();
//! }
//!
//! async fn log(req: Request, next: Next) -> Response {
//!     tracing::info!(path = req.path(), "in");
//!     next.run(req).await
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#).into_bytes())
//! }
//!
//! async fn create_user(req: Request) -> anyhow::Result<Response> {
//!     let name = req.body().field("name").ok_or_else(|| anyhow::anyhow!("name is required"))?;
//!     Ok(Response::redirect(format!("/users/{name}")))
//! }
//! ```

mod config;
mod decode;
mod dispatch;
mod error;
mod fault;
mod handler;
mod method;
mod pattern;
mod request;
mod response;
mod router;
mod server;
mod static_files;
mod template;

pub mod middleware;

pub use config::Config;
pub use decode::{Body, DecodeError, Decoder, UploadedFile};
pub use dispatch::App;
pub use error::{Error, Result};
pub use fault::Fault;
pub use handler::{Handler, Resource};
pub use method::Method;
pub use middleware::{Middleware, Next};
pub use pattern::Params;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use template::Templates;

/// Re-exported so handlers can name status codes without a direct `http` dependency.
pub use http::StatusCode;

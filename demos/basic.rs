//! Minimal amber example: JSON endpoints, a form resource, middleware and
//! a static asset namespace.
//!
//! Run with:
//!   RUST_LOG=info,amber=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users -d 'name=alice'
//!   curl -X DELETE http://localhost:3000/users/42
//!   curl -i http://localhost:3000/old-home
//!   curl -i -X POST http://localhost:3000/session
//!   curl http://localhost:3000/static/app.css

use std::time::Instant;

use amber::{Config, Next, Request, Resource, Response, Router, Server, StatusCode};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app = Router::new()
        .middleware(timing)
        .middleware(require_agent)
        .get("/", home)
        .get("/users/{id}", get_user)
        .route("POST /users", create_user)
        .delete("/users/{id}", delete_user)
        .get("/old-home", |_req: Request| async { Response::redirect("/") })
        .resource("/session", Session);

    let config = match std::env::var("AMBER_CONFIG") {
        Ok(path) => Config::from_file(path)?,
        Err(_) => Config::default().static_dir("static"),
    };

    Server::with_config(config).serve(app).await?;
    Ok(())
}

// Outermost layer: sees every routed request, including the short-circuited ones.
async fn timing(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let path = req.path().to_owned();
    let res = next.run(req).await;
    info!(path, status = res.status_code().as_u16(), micros = started.elapsed().as_micros() as u64, "timed");
    res
}

async fn require_agent(req: Request, next: Next) -> Response {
    if req.header("user-agent").is_none() {
        return Response::builder().status(StatusCode::BAD_REQUEST).text("who are you?");
    }
    next.run(req).await
}

// Renders templates/home.html, or the inline fallback when it is missing.
async fn home(req: Request) -> Response {
    req.templates().render("home", serde_json::json!({ "title": "amber" }))
}

async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#).into_bytes())
}

// Form, JSON and multipart bodies all land in `req.body()`.
async fn create_user(req: Request) -> anyhow::Result<Response> {
    let name = req
        .body()
        .field("name")
        .ok_or_else(|| anyhow::anyhow!("field `name` is required"))?;

    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .json(serde_json::to_vec(&serde_json::json!({ "id": "99", "name": name }))?))
}

async fn delete_user(_req: Request) -> StatusCode {
    StatusCode::NO_CONTENT
}

// GET shows the form, POST "logs in"; PUT, PATCH and DELETE answer 405.
struct Session;

impl Resource for Session {
    async fn get(&self, _req: Request) -> Response {
        Response::html(r#"<form method="post"><input name="user"><button>go</button></form>"#)
    }

    async fn post(&self, req: Request) -> Response {
        match req.body().field("user") {
            Some(_) => Response::redirect("/"),
            None => Response::redirect("/session"),
        }
    }
}

//! End-to-end dispatch: requests go in through `App::handle` exactly as the
//! server hands them over, and the finalized wire response comes out.

use std::sync::{Arc, Mutex};

use amber::{App, Body, Config, DecodeError, Decoder, Next, Request, Resource, Response, Router, StatusCode};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};

type Wire = http::Response<Full<Bytes>>;

fn app(router: Router) -> App {
    App::new(router, &Config::default())
}

fn request(method: &str, uri: &str) -> http::Request<Bytes> {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
}

fn with_body(method: &str, uri: &str, content_type: &str, body: &str) -> http::Request<Bytes> {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", content_type)
        .body(Bytes::from(body.to_owned()))
        .unwrap()
}

async fn text(res: Wire) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn say(req: Request) -> Response {
    Response::text(req.path().to_owned())
}

async fn explode(_req: Request) -> Response {
    panic!("kaboom")
}

#[tokio::test]
async fn literal_route_matches_only_itself() {
    let app = app(Router::new().get("/about", say));

    let res = app.handle(request("GET", "/about")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(text(res).await, "/about");

    let res = app.handle(request("GET", "/about/team")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn params_are_bound_by_name() {
    let app = app(Router::new().get("/a/{x}/b/{y}", |req: Request| async move {
        format!("{}-{}", req.param("x").unwrap_or("?"), req.param("y").unwrap_or("?"))
    }));

    let res = app.handle(request("GET", "/a/1/b/2")).await;
    assert_eq!(text(res).await, "1-2");
}

#[tokio::test]
async fn earliest_registration_wins() {
    let app = app(
        Router::new()
            .get("/users/{id}", |_req: Request| async { "by-id" })
            .get("/users/active", |_req: Request| async { "active" }),
    );

    let res = app.handle(request("GET", "/users/active")).await;
    assert_eq!(text(res).await, "by-id");
}

#[tokio::test]
async fn middleware_can_short_circuit() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = {
        let seen = Arc::clone(&seen);
        move |req: Request, next: Next| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push("log");
                next.run(req).await
            }
        }
    };
    let handler = {
        let seen = Arc::clone(&seen);
        move |_req: Request| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push("handler");
                "ok"
            }
        }
    };
    let rate_limit = |_req: Request, _next: Next| async {
        Response::builder()
            .status(StatusCode::TOO_MANY_REQUESTS)
            .text("slow down")
    };

    let app = app(Router::new().middleware(log).middleware(rate_limit).get("/x", handler));

    let res = app.handle(request("GET", "/x")).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(text(res).await, "slow down");
    assert_eq!(*seen.lock().unwrap(), ["log"]);
}

#[tokio::test]
async fn unknown_path_is_404() {
    let app = app(Router::new().get("/users/{id}", say));

    let res = app.handle(request("GET", "/missing")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.headers()["cache-control"], "no-cache");
    assert_eq!(text(res).await, "404 (Not Found)\n");
}

#[tokio::test]
async fn wrong_verb_is_405_with_allow() {
    let app = app(Router::new().get("/users/{id}", say).post("/users", say));

    let res = app.handle(request("DELETE", "/users/1")).await;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.headers()["allow"], "GET, HEAD, POST");
    assert_eq!(text(res).await, "405 (Method Not Allowed)\n");
}

#[tokio::test]
async fn verb_absent_under_prefix_is_405() {
    let app = app(Router::new().get("/users/{id}", say));

    let res = app.handle(request("DELETE", "/users")).await;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.headers()["allow"], "GET, HEAD");
}

#[tokio::test]
async fn verb_present_under_prefix_is_404() {
    let app = app(Router::new().get("/a/{x}", say).post("/a/{x}/y", say));

    let res = app.handle(request("POST", "/a/1")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(text(res).await, "404 (Not Found)\n");
}

#[tokio::test]
async fn encoded_paths_are_decoded() {
    let app = app(
        Router::new()
            .get("/hello world", say)
            .get("/hi/{name}", |req: Request| async move { req.param("name").unwrap_or("?").to_owned() }),
    );

    let res = app.handle(request("GET", "/hi/john%20doe")).await;
    assert_eq!(text(res).await, "john doe");

    let res = app.handle(request("GET", "/hello%20world")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(text(res).await, "/hello world");
}

#[tokio::test]
async fn unsupported_verb_is_405() {
    let app = app(Router::new().get("/", say));

    let res = app.handle(request("OPTIONS", "/")).await;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn panicking_handler_becomes_500() {
    let app = app(Router::new().get("/boom", explode));

    let res = app.handle(request("GET", "/boom")).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.headers()["content-type"], "text");
    let body = text(res).await;
    assert!(body.contains("<h1>500</h1>"));
    assert!(body.contains("kaboom"));
}

#[tokio::test]
async fn handler_error_becomes_500() {
    let app = app(Router::new().get("/fail", |_req: Request| async {
        Err::<Response, _>(anyhow::anyhow!("database unreachable"))
    }));

    let res = app.handle(request("GET", "/fail")).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(text(res).await.contains("database unreachable"));
}

#[tokio::test]
async fn server_survives_a_fault() {
    let app = app(
        Router::new()
            .get("/boom", explode)
            .get("/ok", say),
    );

    let res = app.handle(request("GET", "/boom")).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let res = app.handle(request("GET", "/ok")).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn redirect_is_301_with_location() {
    let app = app(Router::new().get("/old", |_req: Request| async { Response::redirect("/login") }));

    let res = app.handle(request("GET", "/old")).await;
    assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(res.headers()["location"], "/login");
    assert_eq!(text(res).await, "Redirecting to /login");
}

#[tokio::test]
async fn redirect_keeps_cookies() {
    let login = |_req: Request| async {
        let mut res = Response::redirect("/home");
        res.append_header("set-cookie", "sid=1");
        res
    };
    let app = app(Router::new().post("/login", login));

    let res = app.handle(request("POST", "/login")).await;
    assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(res.headers()["location"], "/home");
    assert_eq!(res.headers()["set-cookie"], "sid=1");
}

#[tokio::test]
async fn middleware_redirect_wins_over_handler() {
    let gate = |_req: Request, _next: Next| async { Response::redirect("/login") };
    let app = app(Router::new().middleware(gate).get("/private", say));

    let res = app.handle(request("GET", "/private")).await;
    assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
}

#[tokio::test]
async fn duplicate_route_keeps_first() {
    let app = app(
        Router::new()
            .get("/dup", |_req: Request| async { "first" })
            .get("/dup", |_req: Request| async { "second" }),
    );

    let res = app.handle(request("GET", "/dup")).await;
    assert_eq!(text(res).await, "first");
}

#[tokio::test]
async fn head_answers_with_headers_only() {
    let app = app(Router::new().get("/page", |_req: Request| async { "hello" }));

    let res = app.handle(request("HEAD", "/page")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-length"], "5");
    assert_eq!(text(res).await, "");
}

#[tokio::test]
async fn form_and_json_bodies_are_decoded() {
    let echo = |req: Request| async move { req.body().field("name").unwrap_or("none").to_owned() };
    let app = app(Router::new().post("/form", echo).post("/json", echo));

    let res = app
        .handle(with_body("POST", "/form", "application/x-www-form-urlencoded", "name=al%20ice"))
        .await;
    assert_eq!(text(res).await, "al ice");

    let res = app
        .handle(with_body("POST", "/json", "application/json; charset=utf-8", r#"{"name":"bob"}"#))
        .await;
    assert_eq!(text(res).await, "bob");
}

#[tokio::test]
async fn malformed_body_is_500() {
    let app = app(Router::new().post("/json", say));

    let res = app
        .handle(with_body("POST", "/json", "application/json", "{not json"))
        .await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn query_and_cookies_are_exposed() {
    let app = app(Router::new().get("/q", |req: Request| async move {
        format!(
            "{} {} {}",
            req.query("page").unwrap_or("-"),
            req.query_all("tag").join(","),
            req.cookie("session").unwrap_or("-"),
        )
    }));

    let req = http::Request::builder()
        .uri("/q?page=2&tag=a&tag=b")
        .header("cookie", "theme=dark; session=abc")
        .body(Bytes::new())
        .unwrap();

    let res = app.handle(req).await;
    assert_eq!(text(res).await, "2 a,b abc");
}

struct Session;

impl Resource for Session {
    async fn get(&self, _req: Request) -> Response {
        Response::text("form")
    }
}

#[tokio::test]
async fn resource_defaults_to_405() {
    let app = app(Router::new().resource("/session", Session));

    let res = app.handle(request("GET", "/session")).await;
    assert_eq!(text(res).await, "form");

    let res = app.handle(request("PUT", "/session")).await;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(res.headers().get("allow").is_none());
    assert_eq!(text(res).await, "405 (Method Not Allowed)\n");
}

#[tokio::test]
async fn middleware_headers_reach_a_405() {
    let stamp = |req: Request, next: Next| async move {
        let mut res = next.run(req).await;
        res.append_header("x-request-id", "r-1");
        res
    };
    let app = app(Router::new().middleware(stamp).resource("/session", Session));

    let res = app.handle(request("DELETE", "/session")).await;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.headers()["x-request-id"], "r-1");
}

struct Csv;

impl Decoder for Csv {
    fn accepts(&self, media_type: &str) -> bool {
        media_type == "text/csv"
    }

    fn decode(&self, _content_type: &str, bytes: &[u8]) -> Result<Body, DecodeError> {
        let text = std::str::from_utf8(bytes).map_err(anyhow::Error::from)?;
        let mut body = Body::default();
        body.insert_field("rows", text.lines().count());
        Ok(body)
    }
}

#[tokio::test]
async fn custom_decoder_failure_is_500() {
    let app = app(Router::new().decoder(Csv).post("/import", say));

    let req = http::Request::builder()
        .method("POST")
        .uri("/import")
        .header("content-type", "text/csv")
        .body(Bytes::from_static(&[0xff, 0xfe]))
        .unwrap();
    let res = app.handle(req).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(text(res).await.contains("invalid utf-8"));
}

#[tokio::test]
async fn static_namespace_serves_files() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root.path().join("assets")).unwrap();
    std::fs::write(root.path().join("assets/app.js"), "run()").unwrap();

    let config = Config::default().static_dir("assets").static_root(root.path());
    let app = App::new(Router::new().get("/assets/{name}", say), &config);

    let res = app.handle(request("GET", "/assets/app.js")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers()["content-type"].to_str().unwrap().contains("javascript"));
    assert_eq!(text(res).await, "run()");

    let res = app.handle(request("GET", "/assets/nope.js")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(text(res).await, "File not found");
}

#[tokio::test]
async fn templates_render_from_config_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.html"), "<p>hi {{ who }}</p>").unwrap();

    let config = Config::default().templates_dir(dir.path());
    let app = App::new(
        Router::new().get("/hello/{who}", |req: Request| async move {
            let who = req.param("who").unwrap_or_default().to_owned();
            req.templates().render("hello", serde_json::json!({ "who": who }))
        }),
        &config,
    );

    let res = app.handle(request("GET", "/hello/ann")).await;
    assert_eq!(text(res).await, "<p>hi ann</p>");
}

#[tokio::test]
async fn concurrent_requests_do_not_interfere() {
    let app = Arc::new(app(
        Router::new()
            .get("/n/{n}", |req: Request| async move {
                tokio::task::yield_now().await;
                req.param("n").unwrap_or("0").parse::<u64>().map(|n| n.to_string())
            }),
    ));

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..64u64 {
        let app = Arc::clone(&app);
        tasks.spawn(async move {
            let res = app.handle(request("GET", &format!("/n/{i}"))).await;
            (i, text(res).await)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (i, body) = joined.unwrap();
        assert_eq!(body, i.to_string());
    }
}

//! Integration tests over a real socket.
//!
//! Each test bootstraps a temporary routes tree, serves the resulting app on a
//! random port and talks to it with `reqwest`.
//!
//! ## Test Coverage
//!
//! - `test_discovered_routes_over_http`: manifests on disk answer real requests
//! - `test_not_found_and_method_not_allowed`: default terminal handlers
//! - `test_panic_is_recovered`: a panicking handler yields a 500 and the server keeps serving
//! - `test_body_limit_over_http`: oversized bodies are rejected with 413
//! - `test_checkpoint_middleware_over_http`: checkpoint middleware sees real requests

use axum::{extract::Request, middleware::Next};
use axum_autoroutes::{
    AxumApp, Bootstrap, Checkpoint, Error, HandlerRegistry, Middleware, POWERED_BY, RawOptions,
};
use reqwest::{Client, StatusCode};
use std::{path::Path, time::Duration};
use tempfile::TempDir;
use tokio::{net::TcpListener, task::JoinHandle};

struct TestServer {
    base: String,
    handle: JoinHandle<()>,
    _root: TempDir,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn write_route(root: &Path, relative: &str, manifest: &str) {
    let path = root.join("routes").join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, manifest).unwrap();
}

fn handlers() -> HandlerRegistry {
    HandlerRegistry::new()
        .handler("hello", |_req: Request| async { "Hello, World!" })
        .handler("echo", |req: Request| async move {
            let body = axum::body::to_bytes(req.into_body(), usize::MAX)
                .await
                .map_err(|err| Error::invalid_input(err.to_string()))?;
            Ok::<_, Error>(body)
        })
        .handler("explode", explode)
}

async fn explode(_req: Request) -> &'static str {
    panic!("handler exploded")
}

/// Bootstraps the routes below `root` and serves them on a random port.
async fn start_test_server(root: TempDir, options: RawOptions) -> TestServer {
    let options = options
        .with_routes_directory(root.path().join("routes"))
        .with_public_directory(root.path().join("public"))
        .with_autostart(false);

    let app = Bootstrap::new(AxumApp::new())
        .options(options)
        .handlers(handlers())
        .prepare()
        .await
        .expect("Bootstrap failed")
        .into_app();

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        app.listen_on(listener, Duration::from_secs(1))
            .await
            .expect("Server failed to run");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        base: format!("http://127.0.0.1:{port}"),
        handle,
        _root: root,
    }
}

fn project() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    write_route(
        root.path(),
        "hello.toml",
        "method = \"GET\"\npath = \"/hello\"\nhandler = \"hello\"\n",
    );
    write_route(
        root.path(),
        "api/echo.toml",
        "method = \"POST\"\npath = \"/api/echo\"\nhandler = \"echo\"\n",
    );
    write_route(
        root.path(),
        "api/explode.toml",
        "method = \"GET\"\npath = \"/api/explode\"\nhandler = \"explode\"\n",
    );
    root
}

#[tokio::test]
async fn test_discovered_routes_over_http() {
    let server =
        start_test_server(project(), RawOptions::new().with_header("x-service", "demo")).await;
    let client = Client::new();

    let response = client.get(server.url("/hello")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-powered-by").unwrap(), POWERED_BY);
    assert_eq!(response.headers().get("x-service").unwrap(), "demo");
    assert_eq!(response.text().await.unwrap(), "Hello, World!");

    let response = client
        .post(server.url("/api/echo"))
        .body("ping")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ping");
}

#[tokio::test]
async fn test_not_found_and_method_not_allowed() {
    let server = start_test_server(project(), RawOptions::new()).await;
    let client = Client::new();

    let response = client.get(server.url("/nowhere")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.text().await.unwrap().contains("NOT_FOUND"));

    let response = client.put(server.url("/hello")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers().get("allow").unwrap(), "GET");
}

#[tokio::test]
async fn test_panic_is_recovered() {
    let server = start_test_server(project(), RawOptions::new()).await;
    let client = Client::new();

    let response = client.get(server.url("/api/explode")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.text().await.unwrap();
    assert!(body.contains("INTERNAL_ERROR"), "{body}");
    assert!(!body.contains("handler exploded"), "{body}");

    let response = client.get(server.url("/hello")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_body_limit_over_http() {
    let server = start_test_server(project(), RawOptions::new().with_body_limit("32B")).await;
    let client = Client::new();

    let response = client
        .post(server.url("/api/echo"))
        .body(vec![b'x'; 1024])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let response = client
        .post(server.url("/api/echo"))
        .body("small")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_checkpoint_middleware_over_http() {
    let stamp = Middleware::new(|req: Request, next: Next| async move {
        let mut response = next.run(req).await;
        response
            .headers_mut()
            .insert("x-checkpoint", http::HeaderValue::from_static("before_serve"));
        response
    });
    let options = RawOptions::new().with_checkpoint(Checkpoint::BeforeServe, stamp);
    let server = start_test_server(project(), options).await;

    let response = Client::new().get(server.url("/hello")).send().await.unwrap();
    assert_eq!(response.headers().get("x-checkpoint").unwrap(), "before_serve");
}

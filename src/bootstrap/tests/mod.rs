//! Test helpers for the bootstrap sequence.
//!
//! Every test here runs a full [`Bootstrap::prepare`](crate::Bootstrap::prepare)
//! against a temporary routes tree and exercises the resulting router with
//! `oneshot()`. Nothing binds a socket; see `tests/serve_tests.rs` for that.

use crate::{AxumApp, Bootstrap, Bootstrapped, HandlerRegistry, RawOptions, Result};
use axum::{
    Router,
    body::{Body, to_bytes},
    extract::Request,
    middleware::Next,
    response::Response,
};
use std::path::Path;
use tempfile::TempDir;


// ============================================================================
// Filesystem Helpers
// ============================================================================

/// A temporary project root holding a `routes/` directory.
pub(crate) fn project() -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    std::fs::create_dir(dir.path().join("routes")).expect("Failed to create routes dir");
    dir
}

/// Writes a route manifest below `<root>/routes`, creating parent directories.
pub(crate) fn write_route(root: &Path, relative: &str, manifest: &str) {
    let path = root.join("routes").join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create route dir");
    }
    std::fs::write(path, manifest).expect("Failed to write route manifest");
}

/// Manifest text for a simple route.
pub(crate) fn manifest(method: &str, path: &str, handler: &str) -> String {
    format!("method = \"{method}\"\npath = \"{path}\"\nhandler = \"{handler}\"\n")
}

// ============================================================================
// Bootstrap Helpers
// ============================================================================

/// Options pointing at the project's routes and public directories, with
/// autostart off.
pub(crate) fn options_for(root: &Path) -> RawOptions {
    RawOptions::new()
        .with_routes_directory(root.join("routes"))
        .with_public_directory(root.join("public"))
        .with_autostart(false)
}

/// Handlers most tests refer to from their manifests.
pub(crate) fn registry() -> HandlerRegistry {
    HandlerRegistry::new()
        .handler("hello", |_req: Request| async { "Hello, World!" })
        .handler("list_users", |_req: Request| async { "[]" })
        .handler("create_user", |_req: Request| async { "created" })
        .handler("debug", |_req: Request| async { "debug" })
        .middleware("audit", |req: Request, next: Next| async move {
            let mut response = next.run(req).await;
            response
                .headers_mut()
                .insert("x-audited", http::HeaderValue::from_static("yes"));
            response
        })
}

pub(crate) async fn prepare(options: RawOptions) -> Result<Bootstrapped<AxumApp>> {
    Bootstrap::new(AxumApp::new())
        .options(options)
        .handlers(registry())
        .prepare()
        .await
}

/// Prepares the project and returns the assembled router.
pub(crate) async fn router_for(options: RawOptions) -> Router {
    prepare(options)
        .await
        .expect("Bootstrap failed")
        .into_app()
        .into_router()
}

// ============================================================================
// Request/Response Helpers
// ============================================================================

pub(crate) fn request(method: &str, uri: &str) -> Request {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub(crate) async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

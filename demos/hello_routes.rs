//! Route Manifests Example
//!
//! Serves the manifests under `demos/routes/` with a checkpoint middleware and
//! an always-added header.
//!
//! Run with:
//! ```bash
//! cargo run --example hello_routes
//! ```
//!
//! Then test:
//! ```bash
//! curl -i http://localhost:3000/
//! curl -i http://localhost:3000/users
//! curl -i http://localhost:3000/users/42
//! curl -i -X POST http://localhost:3000/users   # 405, /users is bound to GET
//! curl -i http://localhost:3000/debug/routes    # development only
//! ```

use axum::{Json, extract::Request, middleware::Next};
use axum_autoroutes::{
    AxumApp, Bootstrap, Checkpoint, Environment, HandlerRegistry, Middleware, RawOptions, Result,
    RunOutcome,
};
use serde::Serialize;
use std::time::Instant;

#[derive(Serialize)]
struct User {
    id: u64,
    name: String,
}

async fn list_users(_req: Request) -> Json<Vec<User>> {
    Json(vec![
        User { id: 1, name: "Ada".into() },
        User { id: 2, name: "Grace".into() },
    ])
}

async fn show_user(req: Request) -> Result<Json<User>> {
    let id = req
        .uri()
        .path()
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse().ok())
        .ok_or_else(|| axum_autoroutes::Error::invalid_input("user id must be a number"))?;
    Ok(Json(User { id, name: format!("user-{id}") }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let handlers = HandlerRegistry::new()
        .handler("index", |_req: Request| async { "Hello from axum-autoroutes!" })
        .handler("list_users", list_users)
        .handler("show_user", show_user)
        .handler("debug_routes", |_req: Request| async { "routes are logged at startup" })
        .middleware("timed", |req: Request, next: Next| async move {
            let started = Instant::now();
            let response = next.run(req).await;
            tracing::info!("Handled in {:?}", started.elapsed());
            response
        });

    let log_requests = Middleware::new(|req: Request, next: Next| async move {
        tracing::info!("{} {}", req.method(), req.uri());
        next.run(req).await
    });

    let dir = env!("CARGO_MANIFEST_DIR");
    let options = RawOptions::new()
        .with_routes_directory(format!("{dir}/demos/routes"))
        .with_public_directory(format!("{dir}/demos/public"))
        .with_environment(Environment::Development)
        .with_header("x-demo", "hello_routes")
        .with_checkpoint(Checkpoint::BeforeRouteLoad, log_requests)
        .with_port(3000);

    println!("Starting server on http://127.0.0.1:3000");

    match Bootstrap::new(AxumApp::new())
        .options(options)
        .handlers(handlers)
        .init_tracing()
        .run()
        .await?
    {
        RunOutcome::Served(report) => println!("Served {} route(s)", report.bound_routes()),
        RunOutcome::Manual(_) => println!("autostart is off"),
    }
    Ok(())
}

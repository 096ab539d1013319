//! # axum-autoroutes
//!
//! Configuration-driven bootstrap for Axum services. Routes live on disk as
//! small TOML manifests, one per file; the bootstrap discovers them, validates
//! them and registers them on the application together with static files,
//! response headers, request tracing and the not-found and error handlers.
//! User middleware is placed at named checkpoints of that sequence.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use axum::extract::Request;
//! use axum_autoroutes::{AxumApp, Bootstrap, HandlerRegistry, RawOptions, exit_on_error};
//!
//! #[tokio::main]
//! async fn main() {
//!     let handlers = HandlerRegistry::new()
//!         .handler("hello", |_req: Request| async { "Hello, World!" });
//!
//!     let outcome = Bootstrap::new(AxumApp::new())
//!         .options(exit_on_error(RawOptions::from_rust_env()))
//!         .handlers(handlers)
//!         .init_tracing()
//!         .run()
//!         .await;
//!     exit_on_error(outcome);
//! }
//! ```
//!
//! With `routes/hello.toml`:
//! ```toml
//! method = "GET"
//! path = "/hello"
//! handler = "hello"
//! ```
//!
//! and `config/dev.toml`:
//! ```toml
//! port = 3000
//! environment = "development"
//! body_limit = "1MiB"
//! ```
//!
//! Run with `RUST_ENV=dev cargo run`.
//!
//! # Route Manifests
//!
//! | Field | Type | Required |
//! |-------|------|----------|
//! | `method` | string, any case | yes |
//! | `path` | string, axum path syntax | yes |
//! | `handler` | registered handler name | yes |
//! | `disabled` | boolean | no, `false` |
//! | `development_route` | boolean | no, `false` |
//! | `route_middleware` | registered middleware name | no |
//!
//! Manifests are discovered recursively below `routes_directory`. The first
//! manifest bound on a path owns it; other methods on that path get the
//! method-not-allowed handler.
//!
//! # Bootstrap Order
//!
//! | Step | What happens |
//! |------|--------------|
//! | 1 | options resolved, static files, view engine, response headers |
//! | 2 | `before_route_load` |
//! | 3 | routes discovered, validated and registered |
//! | 4 | `after_route_load`, `before_builtin_middleware_register` |
//! | 5 | request tracing, body limit |
//! | 6 | `after_builtin_middleware_register`, `before_404_register` |
//! | 7 | not-found handler |
//! | 8 | `after_404_register`, `before_error_register` |
//! | 9 | error handler |
//! | 10 | `after_error_register`, `before_serve` |
//! | 11 | listen, when `autostart` is set |
//!
//! Middleware registered earlier sees each request first. The error handler
//! and the response headers wrap every stage, so failures and panics from
//! early checkpoint middleware still reach the error handler.
//!
//! # Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`routes`] | Discovery, manifest parsing, validation and registration |
//! | [`transport`] | The [`Transport`] capability and its axum implementation ([`AxumApp`]) |
//!
//! # Error Handling
//!
//! Every bootstrap failure is an [`Error`] whose [`ErrorKind`] tells what went
//! wrong. Nothing is listening when a bootstrap error is returned.
//!
//! ```rust,no_run
//! use axum_autoroutes::{AxumApp, Bootstrap, ErrorKind, RawOptions};
//!
//! # async fn run() {
//! let result = Bootstrap::new(AxumApp::new())
//!     .options(RawOptions::new().with_routes_directory("missing"))
//!     .prepare()
//!     .await;
//! assert_eq!(result.unwrap_err().kind(), ErrorKind::MissingRoutesDirectory);
//! # }
//! ```
mod bootstrap;
mod checkpoint;
mod config;
mod error;
mod handler;
mod utils;

pub mod routes;
pub mod transport;

pub use bootstrap::*;
pub use checkpoint::*;
pub use config::{
    Environment, LogFormat, Options, RawOptions, Value, ValueType, ViewEngine, ViewSettings,
};
pub use error::*;
pub use handler::*;
pub use routes::{Registration, RouteDescriptor, RouteRegistrar};
pub use transport::{AxumApp, Builtin, Transport};
pub use utils::replace_handlebars_with_env;

pub type Result<T> = std::result::Result<T, Error>;

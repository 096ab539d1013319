//! The HTTP application capability the bootstrap pipeline drives.
//!
//! The pipeline never talks to axum directly. It registers things on a
//! [`Transport`] in a fixed order and the transport decides how to realise
//! them. [`AxumApp`] is the implementation over `axum::Router`; tests use
//! recording transports to observe the registration sequence.

mod axum_app;
mod shutdown;

pub use axum_app::AxumApp;

use {
    crate::{ErrorHandler, Handler, Middleware, Result, ViewSettings},
    http::{HeaderName, HeaderValue},
    std::{fmt, future::Future, path::Path, time::Duration},
};

/// Middleware and terminal handlers the pipeline installs itself.
#[derive(Clone)]
pub enum Builtin {
    /// Sets each header on every response, replacing any value already present.
    ResponseHeaders(Vec<(HeaderName, HeaderValue)>),
    /// Opens a tracing span per request.
    RequestTracing,
    /// Rejects request bodies larger than `limit` bytes.
    BodyLimit(usize),
    /// Answers requests no route or static file matched.
    NotFound(Handler),
    /// Turns errors and panics from handlers and any middleware into responses.
    ErrorHandler(ErrorHandler),
}

impl Builtin {
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::ResponseHeaders(_) => "response_headers",
            Builtin::RequestTracing => "request_tracing",
            Builtin::BodyLimit(_) => "body_limit",
            Builtin::NotFound(_) => "not_found",
            Builtin::ErrorHandler(_) => "error_handler",
        }
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Builtin::ResponseHeaders(headers) => {
                f.debug_tuple("ResponseHeaders").field(headers).finish()
            }
            Builtin::BodyLimit(limit) => f.debug_tuple("BodyLimit").field(limit).finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// An HTTP application that routes, middleware and handlers are registered on.
///
/// Registration order is significant. Middleware registered earlier sees a
/// request before middleware registered later. Routes, static files and the
/// not-found handler are the terminal endpoints.
pub trait Transport: Send + Sized {
    /// Serves files below `dir` for requests no route matches.
    fn serve_static(&mut self, dir: &Path);

    /// Makes the view engine settings available to handlers.
    fn register_view_engine(&mut self, settings: ViewSettings);

    /// Appends a user middleware. `name` identifies it in diagnostics.
    fn use_middleware(&mut self, name: &str, middleware: Middleware);

    fn use_builtin(&mut self, builtin: Builtin);

    /// Binds `handler` to `path` for every method. `middleware`, when given,
    /// runs before the handler on each request to that path.
    ///
    /// # Errors
    ///
    /// `InvalidRouteShape` when the transport cannot accept `path`.
    fn route(&mut self, path: &str, handler: Handler, middleware: Option<Middleware>) -> Result<()>;

    /// Accepts connections on `bind_addr` until a shutdown signal arrives.
    fn listen(
        self,
        bind_addr: String,
        shutdown_timeout: Duration,
    ) -> impl Future<Output = Result<()>> + Send;
}

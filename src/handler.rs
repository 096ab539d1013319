//! Callable values: request handlers, middleware and error handlers.
//!
//! Route manifests on disk cannot carry code, so handlers are registered by
//! name in a [`HandlerRegistry`] and manifests refer to them by that name.
//! Configuration callables (`not_found_handler`, checkpoint middleware, ...)
//! are set programmatically.

use {
    crate::ErrorResponse,
    axum::{
        Json,
        extract::Request,
        middleware::Next,
        response::{IntoResponse, Response},
    },
    http::{HeaderValue, Method, StatusCode, header},
    std::{collections::HashMap, fmt, future::Future, pin::Pin, sync::Arc, sync::LazyLock},
};

/// A boxed, sendable future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

type HandlerFn = dyn Fn(Request) -> BoxFuture<Response> + Send + Sync;
type MiddlewareFn = dyn Fn(Request, Next) -> BoxFuture<Response> + Send + Sync;
type ErrorHandlerFn = dyn Fn(Failure) -> Response + Send + Sync;

static DEFAULT_NOT_FOUND: LazyLock<Handler> = LazyLock::new(|| {
    Handler::new(|req: Request| async move {
        let message = format!("No route for {} {}", req.method(), req.uri().path());
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("NOT_FOUND", message)),
        )
    })
});

static DEFAULT_METHOD_NOT_ALLOWED: LazyLock<Handler> = LazyLock::new(|| {
    Handler::new(|req: Request| async move {
        let allowed = req.extensions().get::<AllowedMethod>().cloned();
        let message = format!(
            "Method {} is not allowed on {}",
            req.method(),
            req.uri().path()
        );
        let mut response = (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(ErrorResponse::new("METHOD_NOT_ALLOWED", message)),
        )
            .into_response();
        if let Some(AllowedMethod(method)) = allowed
            && let Ok(value) = HeaderValue::from_str(method.as_str())
        {
            response.headers_mut().insert(header::ALLOW, value);
        }
        response
    })
});

static DEFAULT_ERROR_HANDLER: LazyLock<ErrorHandler> = LazyLock::new(|| {
    ErrorHandler::new(|failure: Failure| {
        let body = ErrorResponse::new(failure.error_code(), failure.message());
        (failure.status(), Json(body)).into_response()
    })
});

static PASSTHROUGH: LazyLock<Middleware> = LazyLock::new(|| Middleware {
    f: Arc::new(|req: Request, next: Next| -> BoxFuture<Response> { Box::pin(next.run(req)) }),
    passthrough: true,
});

/// A request handler: takes the request and produces a response.
///
/// Anything returning `impl IntoResponse` can be wrapped, including handlers
/// that return `Result<_, axum_autoroutes::Error>`.
///
/// ```rust
/// use axum_autoroutes::Handler;
/// use axum::extract::Request;
///
/// let hello = Handler::new(|_req: Request| async { "Hello, World!" });
/// ```
#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

impl Handler {
    pub fn new<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        Self(Arc::new(move |req: Request| -> BoxFuture<Response> {
            let fut = f(req);
            Box::pin(async move { fut.await.into_response() })
        }))
    }

    /// The default `not_found_handler`: a 404 JSON error response.
    pub fn not_found() -> Self {
        DEFAULT_NOT_FOUND.clone()
    }

    /// The default `method_not_allowed_handler`: a 405 JSON error response
    /// carrying an `Allow` header when the declared method is known.
    pub fn method_not_allowed() -> Self {
        DEFAULT_METHOD_NOT_ALLOWED.clone()
    }

    pub fn call(&self, req: Request) -> BoxFuture<Response> {
        (self.0)(req)
    }
}

/// Middleware in the `(request, next)` style of `axum::middleware::from_fn`.
///
/// ```rust
/// use axum_autoroutes::Middleware;
/// use axum::{extract::Request, middleware::Next};
///
/// let audit = Middleware::new(|req: Request, next: Next| async move {
///     tracing::info!(path = %req.uri().path(), "audited");
///     next.run(req).await
/// });
/// ```
#[derive(Clone)]
pub struct Middleware {
    f: Arc<MiddlewareFn>,
    passthrough: bool,
}

impl Middleware {
    pub fn new<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        Self {
            f: Arc::new(move |req: Request, next: Next| -> BoxFuture<Response> {
                let fut = f(req, next);
                Box::pin(async move { fut.await.into_response() })
            }),
            passthrough: false,
        }
    }

    /// Middleware that only forwards to the next service.
    pub fn passthrough() -> Self {
        PASSTHROUGH.clone()
    }

    pub fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    pub fn call(&self, req: Request, next: Next) -> BoxFuture<Response> {
        (self.f)(req, next)
    }
}

/// Turns a [`Failure`] (an error returned by a handler or a caught panic)
/// into the response sent to the client.
#[derive(Clone)]
pub struct ErrorHandler(Arc<ErrorHandlerFn>);

impl ErrorHandler {
    pub fn new<F, R>(f: F) -> Self
    where
        F: Fn(Failure) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        Self(Arc::new(move |failure: Failure| f(failure).into_response()))
    }

    pub fn call(&self, failure: Failure) -> Response {
        (self.0)(failure)
    }
}

impl Default for ErrorHandler {
    /// A JSON error response with the failure's status and error code.
    fn default() -> Self {
        DEFAULT_ERROR_HANDLER.clone()
    }
}

macro_rules! callable_impls {
    ($ty:ident, $field:tt) => {
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.$field, &other.$field)
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($ty), "({:p})"), Arc::as_ptr(&self.$field))
            }
        }
    };
}

callable_impls!(Handler, 0);
callable_impls!(Middleware, f);
callable_impls!(ErrorHandler, 0);

/// A failed request as seen by the error handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    status: StatusCode,
    error_code: String,
    message: String,
}

impl Failure {
    pub fn new(status: StatusCode, error_code: &str, message: &str) -> Self {
        Self {
            status,
            error_code: error_code.into(),
            message: message.into(),
        }
    }

    /// A failure caused by a panic inside a handler or middleware.
    pub fn panic(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error_code: "INTERNAL_ERROR".into(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn error_code(&self) -> &str {
        &self.error_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Request extension set before the method-not-allowed handler runs: the
/// method the matched route actually declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedMethod(pub Method);

/// Named handlers and middleware that route manifests refer to.
///
/// ```rust
/// use axum_autoroutes::HandlerRegistry;
/// use axum::{extract::Request, middleware::Next};
///
/// let registry = HandlerRegistry::new()
///     .handler("list_users", |_req: Request| async { "[]" })
///     .middleware("audit", |req: Request, next: Next| async move { next.run(req).await });
/// assert!(registry.get_handler("list_users").is_some());
/// ```
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
    middleware: HashMap<String, Middleware>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under `name`, replacing any previous one.
    #[must_use]
    pub fn handler<F, Fut, R>(self, name: &str, f: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.with_handler(name, Handler::new(f))
    }

    #[must_use]
    pub fn with_handler(mut self, name: &str, handler: Handler) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    /// Registers a middleware under `name`, replacing any previous one.
    #[must_use]
    pub fn middleware<F, Fut, R>(self, name: &str, f: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.with_middleware(name, Middleware::new(f))
    }

    #[must_use]
    pub fn with_middleware(mut self, name: &str, middleware: Middleware) -> Self {
        self.middleware.insert(name.into(), middleware);
        self
    }

    pub fn get_handler(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    pub fn get_middleware(&self, name: &str) -> Option<&Middleware> {
        self.middleware.get(name)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<_> = self.handlers.keys().collect();
        let mut middleware: Vec<_> = self.middleware.keys().collect();
        handlers.sort();
        middleware.sort();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &handlers)
            .field("middleware", &middleware)
            .finish()
    }
}

use {
    super::{Builtin, Transport, shutdown::serve_with_shutdown},
    crate::{
        Error, ErrorHandler, ErrorKind, Failure, Handler, Middleware, Result, ViewSettings,
        utils::panic_message,
    },
    axum::{
        Extension, Router,
        body::Body,
        extract::{DefaultBodyLimit, Request},
        middleware::{Next, from_fn},
        response::{IntoResponse, Response},
        routing::{MethodRouter, any},
    },
    http::{HeaderName, HeaderValue, StatusCode},
    std::{
        any::Any,
        convert::Infallible,
        fmt,
        panic::{AssertUnwindSafe, catch_unwind},
        path::{Path, PathBuf},
        time::Duration,
    },
    tokio::net::TcpListener,
    tower::service_fn,
    tower_http::{
        catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, services::ServeDir,
        set_header::SetResponseHeaderLayer, trace::TraceLayer,
    },
};

enum Stage {
    Views(ViewSettings),
    Middleware { name: String, middleware: Middleware },
    Headers(Vec<(HeaderName, HeaderValue)>),
    Tracing,
    BodyLimit(usize),
    Errors(ErrorHandler),
}

impl Stage {
    fn label(&self) -> String {
        match self {
            Stage::Views(settings) => format!("views:{}", settings.engine),
            Stage::Middleware { name, .. } => format!("middleware:{name}"),
            Stage::Headers(_) => "response_headers".into(),
            Stage::Tracing => "request_tracing".into(),
            Stage::BodyLimit(_) => "body_limit".into(),
            Stage::Errors(_) => "error_handler".into(),
        }
    }

    fn is_outer(&self) -> bool {
        matches!(self, Stage::Headers(_) | Stage::Errors(_))
    }

    fn apply(self, router: Router) -> Router {
        match self {
            Stage::Views(settings) => router.layer(Extension(settings)),
            Stage::Middleware { middleware, .. } => router.layer(from_fn(
                move |req: Request, next: Next| middleware.call(req, next),
            )),
            Stage::Headers(headers) => headers.into_iter().fold(router, |router, (name, value)| {
                router.layer(SetResponseHeaderLayer::overriding(name, value))
            }),
            Stage::Tracing => router.layer(TraceLayer::new_for_http().make_span_with(
                |request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");

                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                },
            )),
            Stage::BodyLimit(limit) => router
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(limit)),
            Stage::Errors(handler) => router
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(from_fn(move |req: Request, next: Next| {
                    let handler = handler.clone();
                    async move { rewrite_failure(&handler, next.run(req).await) }
                })),
        }
    }
}

/// [`Transport`] over `axum::Router`.
///
/// Registrations are recorded and assembled by [`AxumApp::into_router`]:
/// every middleware stage wraps all routes and the fallback, and stages
/// registered earlier are outer layers. The error handler and the response
/// headers are the exceptions: they always wrap every other stage, so
/// failures and panics from any middleware reach the error handler. Requests
/// no route matches go to the static directory (if any) and then to the
/// not-found handler.
///
/// ```rust
/// use axum_autoroutes::{AxumApp, Handler, Transport};
/// use axum::extract::Request;
///
/// let mut app = AxumApp::new();
/// app.route("/hello", Handler::new(|_req: Request| async { "Hello!" }), None)
///     .unwrap();
/// let router = app.into_router();
/// ```
#[derive(Default)]
pub struct AxumApp {
    routes: Router,
    paths: Vec<String>,
    static_dir: Option<PathBuf>,
    not_found: Option<Handler>,
    stages: Vec<Stage>,
}

impl AxumApp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths bound so far, in registration order.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Labels of the recorded middleware stages, in registration order.
    pub fn stages(&self) -> Vec<String> {
        self.stages.iter().map(Stage::label).collect()
    }

    /// Assembles the router.
    pub fn into_router(self) -> Router {
        let mut router = self.routes;

        router = match (self.static_dir, self.not_found) {
            (Some(dir), Some(handler)) => router.fallback_service(
                ServeDir::new(dir)
                    .call_fallback_on_method_not_allowed(true)
                    .fallback(handler_service(handler)),
            ),
            (Some(dir), None) => router.fallback_service(ServeDir::new(dir)),
            (None, Some(handler)) => router.fallback_service(handler_service(handler)),
            (None, None) => router,
        };

        // Error handling and response headers wrap every other stage so that
        // failures raised by early middleware are still rewritten and tagged.
        let (outer, inner): (Vec<Stage>, Vec<Stage>) =
            self.stages.into_iter().partition(Stage::is_outer);

        // Router::layer wraps what is already there, so the first stage goes on last.
        for stage in inner.into_iter().rev().chain(outer.into_iter().rev()) {
            router = stage.apply(router);
        }

        router
    }

    /// Serves on an already bound listener until a shutdown signal arrives.
    pub async fn listen_on(self, listener: TcpListener, shutdown_timeout: Duration) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!("Bound to {}", addr);
        }
        tracing::info!("Waiting for connections");
        serve_with_shutdown(listener, self.into_router(), shutdown_timeout).await
    }
}

impl Transport for AxumApp {
    fn serve_static(&mut self, dir: &Path) {
        tracing::debug!("Serving static files from {}", dir.display());
        self.static_dir = Some(dir.to_path_buf());
    }

    fn register_view_engine(&mut self, settings: ViewSettings) {
        tracing::debug!(
            "Registering view engine {} for {}",
            settings.engine,
            settings.directory.display()
        );
        self.stages.push(Stage::Views(settings));
    }

    fn use_middleware(&mut self, name: &str, middleware: Middleware) {
        self.stages.push(Stage::Middleware {
            name: name.into(),
            middleware,
        });
    }

    fn use_builtin(&mut self, builtin: Builtin) {
        match builtin {
            Builtin::ResponseHeaders(headers) => self.stages.push(Stage::Headers(headers)),
            Builtin::RequestTracing => self.stages.push(Stage::Tracing),
            Builtin::BodyLimit(limit) => self.stages.push(Stage::BodyLimit(limit)),
            Builtin::NotFound(handler) => self.not_found = Some(handler),
            Builtin::ErrorHandler(handler) => self.stages.push(Stage::Errors(handler)),
        }
    }

    fn route(
        &mut self,
        path: &str,
        handler: Handler,
        middleware: Option<Middleware>,
    ) -> Result<()> {
        if !path.starts_with('/') {
            return Err(invalid_path(path, "must start with `/`"));
        }
        if self.paths.iter().any(|bound| bound == path) {
            return Err(invalid_path(path, "is already bound"));
        }

        let mut method_router: MethodRouter = any(move |req: Request| handler.call(req));
        if let Some(middleware) = middleware {
            method_router = method_router.layer(from_fn(
                move |req: Request, next: Next| middleware.call(req, next),
            ));
        }

        // axum rejects malformed and conflicting patterns by panicking
        let routes = self.routes.clone();
        let routes = catch_unwind(AssertUnwindSafe(move || routes.route(path, method_router)))
            .map_err(|payload| invalid_path(path, panic_message(payload.as_ref())))?;

        self.routes = routes;
        self.paths.push(path.into());
        Ok(())
    }

    async fn listen(self, bind_addr: String, shutdown_timeout: Duration) -> Result<()> {
        let listener = TcpListener::bind(&bind_addr).await?;
        self.listen_on(listener, shutdown_timeout).await
    }
}

impl fmt::Debug for AxumApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AxumApp")
            .field("paths", &self.paths)
            .field("static_dir", &self.static_dir)
            .field("not_found", &self.not_found.is_some())
            .field("stages", &self.stages())
            .finish()
    }
}

fn invalid_path(path: &str, reason: impl fmt::Display) -> Error {
    Error::new(ErrorKind::InvalidRouteShape, format!("path `{path}` {reason}"))
}

fn handler_service(
    handler: Handler,
) -> impl tower::Service<Request, Response = Response, Error = Infallible, Future: Send + 'static>
+ Clone
+ Send
+ Sync
+ 'static {
    service_fn(move |req: Request| {
        let response = handler.call(req);
        async move { Ok::<_, Infallible>(response.await) }
    })
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic_message(err.as_ref());
    tracing::error!("Service panicked: {}", message);

    let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
    response
        .extensions_mut()
        .insert(Failure::panic("Internal Server Error"));
    response
}

fn rewrite_failure(handler: &ErrorHandler, mut response: Response) -> Response {
    match response.extensions_mut().remove::<Failure>() {
        Some(failure) => handler.call(failure),
        None => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use http::{Method, header};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    fn request(method: &str, uri: &str) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn hello() -> Handler {
        Handler::new(|_req: Request| async { "hello" })
    }

    async fn explode(_req: Request) -> &'static str {
        panic!("boom")
    }

    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> Middleware {
        let log = log.clone();
        Middleware::new(move |req: Request, next: Next| {
            log.lock().unwrap().push(label);
            next.run(req)
        })
    }

    #[tokio::test]
    async fn test_route_matches_any_method() {
        let mut app = AxumApp::new();
        app.route("/hello", hello(), None).unwrap();
        let router = app.into_router();

        for method in ["GET", "POST", "DELETE"] {
            let response = router.clone().oneshot(request(method, "/hello")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{method}");
        }
    }

    #[tokio::test]
    async fn test_middleware_runs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut app = AxumApp::new();
        app.use_middleware("first", recording(&log, "first"));
        app.route("/hello", hello(), Some(recording(&log, "route")))
            .unwrap();
        app.use_middleware("second", recording(&log, "second"));

        let response = app.into_router().oneshot(request("GET", "/hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "route"]);
    }

    #[tokio::test]
    async fn test_route_middleware_only_applies_to_its_path() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut app = AxumApp::new();
        app.route("/a", hello(), Some(recording(&log, "a"))).unwrap();
        app.route("/b", hello(), None).unwrap();
        let router = app.into_router();

        router.clone().oneshot(request("GET", "/b")).await.unwrap();
        assert!(log.lock().unwrap().is_empty());
        router.oneshot(request("GET", "/a")).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_rejected_paths() {
        let mut app = AxumApp::new();
        app.route("/users/{id}", hello(), None).unwrap();

        let err = app.route("users", hello(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRouteShape);

        let err = app.route("/users/{id}", hello(), None).unwrap_err();
        assert!(err.to_string().contains("already bound"));

        let err = app.route("/legacy/:id", hello(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRouteShape);

        assert_eq!(app.paths(), ["/users/{id}"]);
    }

    #[tokio::test]
    async fn test_not_found_after_static_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("robots.txt"), "User-agent: *").unwrap();

        let mut app = AxumApp::new();
        app.serve_static(dir.path());
        app.use_builtin(Builtin::NotFound(Handler::new(|_req: Request| async {
            (StatusCode::NOT_FOUND, "custom not found")
        })));
        let router = app.into_router();

        let response = router.clone().oneshot(request("GET", "/robots.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "User-agent: *");

        let response = router.clone().oneshot(request("GET", "/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "custom not found");

        let response = router.oneshot(request("POST", "/robots.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_error_handler_rewrites_errors_and_panics() {
        let mut app = AxumApp::new();
        app.route(
            "/fail",
            Handler::new(|_req: Request| async {
                Err::<&str, _>(Error::invalid_input("bad id"))
            }),
            None,
        )
        .unwrap();
        app.route(
            "/panic",
            Handler::new(explode),
            None,
        )
        .unwrap();
        app.use_builtin(Builtin::ErrorHandler(ErrorHandler::new(|failure: Failure| {
            (
                StatusCode::IM_A_TEAPOT,
                format!("{} {}", failure.status().as_u16(), failure.error_code()),
            )
        })));
        let router = app.into_router();

        let response = router.clone().oneshot(request("GET", "/fail")).await.unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(body_string(response).await, "400 INVALID_INPUT");

        let response = router.oneshot(request("GET", "/panic")).await.unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(body_string(response).await, "500 INTERNAL_ERROR");
    }

    async fn reject(_req: Request, _next: Next) -> Result<Response> {
        Err(Error::invalid_input("rejected before routing"))
    }

    async fn explode_early(_req: Request, _next: Next) -> Response {
        panic!("early boom")
    }

    fn teapot() -> ErrorHandler {
        ErrorHandler::new(|failure: Failure| {
            (
                StatusCode::IM_A_TEAPOT,
                format!("{} {}", failure.status().as_u16(), failure.error_code()),
            )
        })
    }

    #[tokio::test]
    async fn test_error_handler_covers_middleware_registered_before_it() {
        let mut app = AxumApp::new();
        app.use_builtin(Builtin::ResponseHeaders(vec![(
            HeaderName::from_static("x-powered-by"),
            HeaderValue::from_static("autoroutes"),
        )]));
        app.use_middleware("reject", Middleware::new(reject));
        app.route("/hello", hello(), None).unwrap();
        app.use_builtin(Builtin::ErrorHandler(teapot()));

        let response = app.into_router().oneshot(request("GET", "/hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(response.headers().get("x-powered-by").unwrap(), "autoroutes");
        assert_eq!(body_string(response).await, "400 INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_error_handler_catches_panics_in_early_middleware() {
        let mut app = AxumApp::new();
        app.use_middleware("explode", Middleware::new(explode_early));
        app.route("/hello", hello(), None).unwrap();
        app.use_builtin(Builtin::ErrorHandler(teapot()));
        assert_eq!(app.stages(), ["middleware:explode", "error_handler"]);

        let response = app.into_router().oneshot(request("GET", "/hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(body_string(response).await, "500 INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_response_headers_override() {
        let mut app = AxumApp::new();
        app.use_builtin(Builtin::ResponseHeaders(vec![(
            HeaderName::from_static("x-team"),
            HeaderValue::from_static("core"),
        )]));
        app.route(
            "/",
            Handler::new(|_req: Request| async { ([("x-team", "handler")], "hi") }),
            None,
        )
        .unwrap();

        let response = app.into_router().oneshot(request("GET", "/")).await.unwrap();
        assert_eq!(response.headers().get("x-team").unwrap(), "core");
    }

    #[tokio::test]
    async fn test_body_limit_rejects_large_requests() {
        let mut app = AxumApp::new();
        app.use_builtin(Builtin::BodyLimit(8));
        app.route("/upload", hello(), None).unwrap();

        let req = Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header(header::CONTENT_LENGTH, "64")
            .body(Body::from(vec![b'x'; 64]))
            .unwrap();
        let response = app.into_router().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_view_settings_reach_handlers() {
        let mut app = AxumApp::new();
        app.register_view_engine(ViewSettings {
            engine: crate::ViewEngine::Pug,
            directory: PathBuf::from("views"),
        });
        app.route(
            "/page",
            Handler::new(|req: Request| async move {
                req.extensions()
                    .get::<ViewSettings>()
                    .map(|settings| settings.template_path("index").display().to_string())
                    .unwrap_or_default()
            }),
            None,
        )
        .unwrap();

        let response = app.into_router().oneshot(request("GET", "/page")).await.unwrap();
        assert_eq!(body_string(response).await, "views/index.pug");
    }

    #[test]
    fn test_stage_labels() {
        let mut app = AxumApp::new();
        app.use_middleware("before_serve", Middleware::passthrough());
        app.use_builtin(Builtin::RequestTracing);
        app.use_builtin(Builtin::NotFound(Handler::not_found()));
        assert_eq!(app.stages(), ["middleware:before_serve", "request_tracing"]);
        assert!(format!("{app:?}").contains("not_found: true"));
    }
}

//! The bootstrap sequence: options, routes, middleware, handlers, listen.
//!
//! ```text
//!  1. resolve options, static files, view engine, response headers
//!  2. before_route_load
//!  3. discover, load, validate and register routes
//!  4. after_route_load, before_builtin_middleware_register
//!  5. request tracing, body limit
//!  6. after_builtin_middleware_register, before_404_register
//!  7. not-found handler
//!  8. after_404_register, before_error_register
//!  9. error handler
//! 10. after_error_register, before_serve
//! 11. listen (when `autostart` is set)
//! ```
//!
//! The order is fixed. Every stage is awaited before the next one starts and
//! the listener is only bound after all routes are registered.

#[cfg(test)]
mod tests;

use {
    crate::{
        Checkpoint, HandlerRegistry, Options, RawOptions, Result, ViewEngine,
        config::POWERED_BY_HEADER,
        routes::{
            Registration, RouteDescriptor, RouteRegistrar, discover, load_manifest, validate_route,
        },
        transport::{Builtin, Transport},
    },
    http::{HeaderName, HeaderValue},
    std::{fmt, path::PathBuf},
};

/// Value of the `x-powered-by` header set on every response.
pub const POWERED_BY: &str = "axum-autoroutes";

/// One step of a completed bootstrap, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapStage {
    OptionsResolved,
    StaticFiles(PathBuf),
    ViewEngine(ViewEngine),
    /// A checkpoint fired. `injected` tells whether its slot held a middleware.
    Checkpoint { checkpoint: Checkpoint, injected: bool },
    RoutesRegistered,
    Builtin(&'static str),
}

impl fmt::Display for BootstrapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapStage::OptionsResolved => f.write_str("options"),
            BootstrapStage::StaticFiles(dir) => write!(f, "static:{}", dir.display()),
            BootstrapStage::ViewEngine(engine) => write!(f, "views:{engine}"),
            BootstrapStage::Checkpoint { checkpoint, .. } => write!(f, "checkpoint:{checkpoint}"),
            BootstrapStage::RoutesRegistered => f.write_str("routes"),
            BootstrapStage::Builtin(name) => write!(f, "builtin:{name}"),
        }
    }
}

/// What a bootstrap did: its stages in order and every route's outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    stages: Vec<BootstrapStage>,
    routes: Vec<Registration>,
}

impl BootstrapReport {
    pub fn stages(&self) -> &[BootstrapStage] {
        &self.stages
    }

    pub fn routes(&self) -> &[Registration] {
        &self.routes
    }

    /// Checkpoints in the order they fired.
    pub fn checkpoints(&self) -> impl Iterator<Item = Checkpoint> + '_ {
        self.stages.iter().filter_map(|stage| match stage {
            BootstrapStage::Checkpoint { checkpoint, .. } => Some(*checkpoint),
            _ => None,
        })
    }

    /// Number of routes bound on the transport.
    pub fn bound_routes(&self) -> usize {
        self.routes.iter().filter(|r| r.is_bound()).count()
    }
}

/// Outcome of [`Bootstrap::run`].
#[derive(Debug)]
pub enum RunOutcome<T> {
    /// `autostart` was set; the server ran until shutdown.
    Served(BootstrapReport),
    /// `autostart` was off; the prepared app is handed back.
    Manual(Bootstrapped<T>),
}

/// A fully prepared app that has not started listening.
#[derive(Debug)]
pub struct Bootstrapped<T> {
    app: T,
    options: Options,
    report: BootstrapReport,
}

impl<T: Transport> Bootstrapped<T> {
    pub fn app(&self) -> &T {
        &self.app
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn report(&self) -> &BootstrapReport {
        &self.report
    }

    pub fn into_app(self) -> T {
        self.app
    }

    pub fn into_parts(self) -> (T, Options, BootstrapReport) {
        (self.app, self.options, self.report)
    }

    /// Listens on the configured `bind_addr` and `port` until shutdown.
    pub async fn listen(self) -> Result<BootstrapReport> {
        let bind_addr = self.options.full_bind_addr();
        tracing::info!("Listening on {bind_addr}");
        self.app.listen(bind_addr, self.options.shutdown_timeout).await?;
        Ok(self.report)
    }
}

/// Builder for a bootstrap run.
///
/// ```rust,no_run
/// use axum_autoroutes::{AxumApp, Bootstrap, HandlerRegistry, RawOptions, exit_on_error};
/// use axum::extract::Request;
///
/// #[tokio::main]
/// async fn main() {
///     let handlers = HandlerRegistry::new()
///         .handler("hello", |_req: Request| async { "Hello, World!" });
///
///     let outcome = Bootstrap::new(AxumApp::new())
///         .options(RawOptions::new().with_routes_directory("routes").with_port(8080))
///         .handlers(handlers)
///         .init_tracing()
///         .run()
///         .await;
///     exit_on_error(outcome);
/// }
/// ```
pub struct Bootstrap<T> {
    app: T,
    options: RawOptions,
    handlers: HandlerRegistry,
    routes: Vec<RouteDescriptor>,
    init_tracing: bool,
}

impl<T: Transport> Bootstrap<T> {
    pub fn new(app: T) -> Self {
        Self {
            app,
            options: RawOptions::default(),
            handlers: HandlerRegistry::default(),
            routes: Vec::new(),
            init_tracing: false,
        }
    }

    #[must_use]
    pub fn options(mut self, options: RawOptions) -> Self {
        self.options = options;
        self
    }

    /// Handlers and middleware that route manifests refer to by name.
    #[must_use]
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Adds a route built in code. Such routes are registered after the
    /// discovered ones.
    #[must_use]
    pub fn route(mut self, descriptor: RouteDescriptor) -> Self {
        self.routes.push(descriptor);
        self
    }

    /// Installs the tracing subscriber for `log_format` before anything else
    /// runs, so option warnings are logged too.
    #[must_use]
    pub fn init_tracing(mut self) -> Self {
        self.init_tracing = true;
        self
    }

    /// Runs the whole sequence. Serves until shutdown when `autostart` is set,
    /// otherwise returns the prepared app.
    ///
    /// # Errors
    ///
    /// Any configuration, discovery or route error. Nothing is listening when
    /// an error is returned from the preparation stages.
    pub async fn run(self) -> Result<RunOutcome<T>> {
        let prepared = self.prepare().await?;
        if prepared.options.autostart {
            Ok(RunOutcome::Served(prepared.listen().await?))
        } else {
            tracing::info!("autostart is off, not listening");
            Ok(RunOutcome::Manual(prepared))
        }
    }

    /// Runs every stage except listening, whatever `autostart` says.
    pub async fn prepare(self) -> Result<Bootstrapped<T>> {
        let Bootstrap {
            mut app,
            options: raw,
            handlers,
            routes,
            init_tracing,
        } = self;

        if init_tracing {
            raw.setup_tracing();
        }
        let options = Options::resolve(&raw).await?;
        tracing::debug!("Resolved options for {} mode", options.environment);

        let mut run = Run {
            app: &mut app,
            options: &options,
            report: BootstrapReport::default(),
        };
        run.stage(BootstrapStage::OptionsResolved);

        // 1
        if let Some(dir) = options.static_directory() {
            run.app.serve_static(dir);
            run.stage(BootstrapStage::StaticFiles(dir.to_path_buf()));
        }
        if let Some(settings) = options.view_settings() {
            run.stage(BootstrapStage::ViewEngine(settings.engine));
            run.app.register_view_engine(settings);
        }
        run.builtin(Builtin::ResponseHeaders(response_headers(&options)));

        // 2, 3
        run.checkpoint(Checkpoint::BeforeRouteLoad);
        run.register_routes(&handlers, &routes).await?;

        // 4, 5
        run.checkpoint(Checkpoint::AfterRouteLoad);
        run.checkpoint(Checkpoint::BeforeBuiltinMiddlewareRegister);
        run.builtin(Builtin::RequestTracing);
        run.builtin(Builtin::BodyLimit(options.body_limit));

        // 6, 7
        run.checkpoint(Checkpoint::AfterBuiltinMiddlewareRegister);
        run.checkpoint(Checkpoint::Before404Register);
        run.builtin(Builtin::NotFound(options.not_found_handler.clone()));

        // 8, 9
        run.checkpoint(Checkpoint::After404Register);
        run.checkpoint(Checkpoint::BeforeErrorRegister);
        run.builtin(Builtin::ErrorHandler(options.error_handler.clone()));

        // 10
        run.checkpoint(Checkpoint::AfterErrorRegister);
        run.checkpoint(Checkpoint::BeforeServe);

        let report = run.report;
        tracing::info!(
            "Bootstrap complete: {} of {} route(s) bound",
            report.bound_routes(),
            report.routes().len()
        );

        Ok(Bootstrapped {
            app,
            options,
            report,
        })
    }
}

struct Run<'a, T> {
    app: &'a mut T,
    options: &'a Options,
    report: BootstrapReport,
}

impl<T: Transport> Run<'_, T> {
    fn stage(&mut self, stage: BootstrapStage) {
        tracing::debug!("Bootstrap stage {stage}");
        self.report.stages.push(stage);
    }

    fn checkpoint(&mut self, checkpoint: Checkpoint) {
        let injected = self.options.middleware_checkpoints.inject(checkpoint, &mut *self.app);
        self.stage(BootstrapStage::Checkpoint { checkpoint, injected });
    }

    fn builtin(&mut self, builtin: Builtin) {
        let name = builtin.name();
        self.app.use_builtin(builtin);
        self.stage(BootstrapStage::Builtin(name));
    }

    async fn register_routes(
        &mut self,
        handlers: &HandlerRegistry,
        extra: &[RouteDescriptor],
    ) -> Result<()> {
        let files = discover(&self.options.routes_directory).await?;
        let mut registrar = RouteRegistrar::from_options(self.options);

        for (index, file) in files.iter().enumerate() {
            let raw = load_manifest(file, index, handlers).await?;
            let descriptor = validate_route(index, &raw).map_err(|err| err.in_file(file))?;
            let registration = registrar
                .register(&mut *self.app, index, &descriptor)
                .map_err(|err| err.in_file(file))?;
            self.report.routes.push(registration);
        }

        for (offset, descriptor) in extra.iter().enumerate() {
            let registration =
                registrar.register(&mut *self.app, files.len() + offset, descriptor)?;
            self.report.routes.push(registration);
        }

        self.stage(BootstrapStage::RoutesRegistered);
        Ok(())
    }
}

fn response_headers(options: &Options) -> Vec<(HeaderName, HeaderValue)> {
    let mut headers = vec![(
        HeaderName::from_static(POWERED_BY_HEADER),
        HeaderValue::from_static(POWERED_BY),
    )];
    headers.extend(options.always_added_headers.iter().cloned());
    headers
}

impl<T> fmt::Debug for Bootstrap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bootstrap")
            .field("options", &self.options)
            .field("handlers", &self.handlers)
            .field("routes", &self.routes.len())
            .field("init_tracing", &self.init_tracing)
            .finish()
    }
}

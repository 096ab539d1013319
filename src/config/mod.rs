//!
//! Configuration loading and resolution.
//!
//! A configuration starts out as [`RawOptions`], an untyped mapping of option
//! names to [`Value`]s. Raw options can be created in many ways:
//! - From an environment-specific TOML file via `RawOptions::from_rust_env` or
//!   `RawOptions::from_toml_file`
//! - From a TOML string via `RawOptions::from_toml`
//! - Programmatically via the `with_*` builder methods (the only way to supply callables)
//!
//! In both TOML-based methods, environment variables can be referenced in the TOML
//! using the {{ VAR_NAME }} syntax, and they will be substituted with the corresponding
//! environment variable value.
//!
//! [`Options::resolve`] turns raw options into a fully-populated, immutable
//! [`Options`] value: missing keys get their defaults, present keys are type
//! checked and the filesystem prerequisites are verified.
//!
//! | Key | Type | Default |
//! |-----|------|---------|
//! | `routes_directory` | string | `"routes"` |
//! | `public_directory` | string | `"public"` |
//! | `views_directory` | string | `"views"` |
//! | `view_engine` | string | `"none"` |
//! | `not_found_handler` | handler | 404 JSON response |
//! | `error_handler` | error handler | JSON response with the failure status |
//! | `method_not_allowed_handler` | handler | 405 JSON response |
//! | `middleware_checkpoints` | object | all slots empty |
//! | `always_added_headers` | object | empty |
//! | `port` | number | `3000` |
//! | `environment` | string | `"production"` |
//! | `autostart` | boolean | `true` |
//! | `bind_addr` | string | `"127.0.0.1"` |
//! | `body_limit` | string | `"1MiB"` |
//! | `shutdown_timeout` | string | `"30s"` |
//! | `log_format` | string | `"default"` |
//!
mod logging;
mod value;
mod views;

pub use logging::*;
pub use value::*;
pub use views::*;

use {
    crate::{
        Checkpoint, CheckpointTable, Error, ErrorHandler, Handler, Middleware, Result,
        utils::replace_handlebars_with_env,
    },
    byte_unit::Byte,
    http::{HeaderName, HeaderValue},
    std::{
        collections::BTreeMap,
        env, fmt, fs,
        path::{Path, PathBuf},
        str::FromStr,
        time::Duration,
    },
};

/// Identifying header set on every response. `always_added_headers` cannot override it.
pub const POWERED_BY_HEADER: &str = "x-powered-by";

const KNOWN_KEYS: [&str; 16] = [
    "routes_directory",
    "public_directory",
    "views_directory",
    "view_engine",
    "not_found_handler",
    "error_handler",
    "method_not_allowed_handler",
    "middleware_checkpoints",
    "always_added_headers",
    "port",
    "environment",
    "autostart",
    "bind_addr",
    "body_limit",
    "shutdown_timeout",
    "log_format",
];

/// Environment mode. Development enables development-only routes and
/// extra diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ();
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            _ => Err(()),
        }
    }
}

/// User-supplied configuration before resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOptions {
    values: BTreeMap<String, Value>,
}

impl RawOptions {
    pub fn new() -> Self {
        Self::default()
    }

    ///
    /// Loads the options from a file based on the RUST_ENV environment variable.
    /// The file is expected at "config/{RUST_ENV}.toml".
    ///
    pub fn from_rust_env() -> Result<RawOptions> {
        let env = env::var("RUST_ENV")?;
        Self::from_toml_file(format!("config/{env}.toml"))
    }

    /// Reads a TOML file, substitutes environment variables and parses it.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<RawOptions> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    ///
    /// Parses options in TOML format, substituting `{{ VAR }}` references first.
    ///
    pub fn from_toml(toml_str: &str) -> Result<RawOptions> {
        toml_str.parse()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// The requested `log_format`, or the default one when it is absent or
    /// unreadable. [`Options::resolve`] still rejects unreadable values.
    pub fn log_format(&self) -> LogFormat {
        match self.get("log_format") {
            Some(Value::String(format)) => format.parse().unwrap_or_default(),
            _ => LogFormat::default(),
        }
    }

    /// Sets up the tracing subscriber before the options are resolved, so
    /// warnings raised during resolution are not lost.
    pub fn setup_tracing(&self) {
        logging::setup_tracing(self.log_format());
    }

    /// Sets an arbitrary option. Values are type checked on resolution.
    #[must_use]
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Sets the directory route manifests are discovered in.
    #[must_use]
    pub fn with_routes_directory(self, dir: impl AsRef<Path>) -> Self {
        self.set("routes_directory", path_value(dir.as_ref()))
    }

    /// Sets the directory static files are served from.
    #[must_use]
    pub fn with_public_directory(self, dir: impl AsRef<Path>) -> Self {
        self.set("public_directory", path_value(dir.as_ref()))
    }

    /// Sets the directory holding view templates.
    #[must_use]
    pub fn with_views_directory(self, dir: impl AsRef<Path>) -> Self {
        self.set("views_directory", path_value(dir.as_ref()))
    }

    #[must_use]
    pub fn with_view_engine(self, engine: ViewEngine) -> Self {
        self.set("view_engine", engine.as_str())
    }

    #[must_use]
    pub fn with_not_found_handler(self, handler: Handler) -> Self {
        self.set("not_found_handler", handler)
    }

    #[must_use]
    pub fn with_error_handler(self, handler: ErrorHandler) -> Self {
        self.set("error_handler", handler)
    }

    #[must_use]
    pub fn with_method_not_allowed_handler(self, handler: Handler) -> Self {
        self.set("method_not_allowed_handler", handler)
    }

    /// Places a middleware in a checkpoint slot.
    #[must_use]
    pub fn with_checkpoint(self, checkpoint: Checkpoint, middleware: Middleware) -> Self {
        self.with_nested("middleware_checkpoints", checkpoint.as_str(), middleware.into())
    }

    /// Adds a header set on every response.
    #[must_use]
    pub fn with_header(self, name: &str, value: &str) -> Self {
        self.with_nested("always_added_headers", name, value.into())
    }

    #[must_use]
    pub fn with_port(self, port: u16) -> Self {
        self.set("port", port)
    }

    #[must_use]
    pub fn with_environment(self, environment: Environment) -> Self {
        self.set("environment", environment.as_str())
    }

    #[must_use]
    pub fn with_autostart(self, autostart: bool) -> Self {
        self.set("autostart", autostart)
    }

    #[must_use]
    pub fn with_bind_addr(self, addr: &str) -> Self {
        self.set("bind_addr", addr)
    }

    /// Sets the maximum request body size, e.g. `"512KiB"`.
    #[must_use]
    pub fn with_body_limit(self, limit: &str) -> Self {
        self.set("body_limit", limit)
    }

    /// Sets the graceful shutdown timeout, e.g. `"10s"`.
    #[must_use]
    pub fn with_shutdown_timeout(self, timeout: &str) -> Self {
        self.set("shutdown_timeout", timeout)
    }

    #[must_use]
    pub fn with_log_format(self, format: LogFormat) -> Self {
        self.set("log_format", format.to_string())
    }

    fn with_nested(mut self, key: &str, name: &str, value: Value) -> Self {
        let entry = self
            .values
            .entry(key.into())
            .or_insert_with(|| Value::Object(BTreeMap::new()));
        if !matches!(entry, Value::Object(_)) {
            *entry = Value::Object(BTreeMap::new());
        }
        if let Value::Object(map) = entry {
            map.insert(name.into(), value);
        }
        self
    }
}

///
/// Parses options with references to environment variables by substituting
/// the environment variables and then parsing the resulting TOML.
///
impl FromStr for RawOptions {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let text = replace_handlebars_with_env(s);
        let table = toml::from_str::<toml::Table>(&text)?;
        Ok(RawOptions {
            values: object_from_table(table),
        })
    }
}

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

/// Fully resolved configuration. Immutable once resolved; every downstream
/// component receives it explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub routes_directory: PathBuf,
    pub public_directory: PathBuf,
    /// Whether `public_directory` exists and static files are served from it.
    pub serve_static: bool,
    pub views_directory: PathBuf,
    pub view_engine: ViewEngine,
    /// Whether the view engine is registered (engine selected and directory present).
    pub register_views: bool,
    pub not_found_handler: Handler,
    pub error_handler: ErrorHandler,
    pub method_not_allowed_handler: Handler,
    pub middleware_checkpoints: CheckpointTable,
    pub always_added_headers: Vec<(HeaderName, HeaderValue)>,
    pub port: u16,
    pub environment: Environment,
    pub autostart: bool,
    pub bind_addr: String,
    pub body_limit: usize,
    pub shutdown_timeout: Duration,
    pub log_format: LogFormat,
}

impl Options {
    fn default_routes_directory() -> &'static str {
        "routes"
    }

    fn default_public_directory() -> &'static str {
        "public"
    }

    fn default_views_directory() -> &'static str {
        "views"
    }

    fn default_port() -> u16 {
        3000
    }

    fn default_bind_addr() -> &'static str {
        "127.0.0.1"
    }

    fn default_body_limit() -> &'static str {
        "1MiB"
    }

    fn default_shutdown_timeout() -> &'static str {
        "30s"
    }

    /// Resolves raw options into a complete configuration.
    ///
    /// # Errors
    ///
    /// - `InvalidOptionType` when a recognized key holds a value of the wrong type
    /// - `InvalidViewEngine` when `view_engine` names an unsupported engine
    /// - `InvalidCheckpoint` when a checkpoint slot holds something other than a middleware
    /// - `MissingRoutesDirectory` when the routes directory does not exist
    ///
    /// A missing public or views directory only produces a warning.
    pub async fn resolve(raw: &RawOptions) -> Result<Options> {
        for key in raw.values.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                tracing::warn!("Ignoring unknown option `{key}`");
            }
        }

        let routes_directory = PathBuf::from(string_option(
            raw,
            "routes_directory",
            Self::default_routes_directory(),
        )?);
        let public_directory = PathBuf::from(string_option(
            raw,
            "public_directory",
            Self::default_public_directory(),
        )?);
        let views_directory = PathBuf::from(string_option(
            raw,
            "views_directory",
            Self::default_views_directory(),
        )?);

        let engine_name = string_option(raw, "view_engine", ViewEngine::None.as_str())?;
        let view_engine = ViewEngine::from_name(&engine_name)
            .ok_or_else(|| Error::invalid_view_engine(&engine_name))?;

        let not_found_handler = handler_option(raw, "not_found_handler", Handler::not_found)?;
        let method_not_allowed_handler =
            handler_option(raw, "method_not_allowed_handler", Handler::method_not_allowed)?;
        let error_handler = match raw.get("error_handler") {
            None | Some(Value::Null) => ErrorHandler::default(),
            Some(Value::ErrorHandler(handler)) => handler.clone(),
            Some(_) => return Err(Error::invalid_option("error_handler", ValueType::ErrorHandler)),
        };

        let middleware_checkpoints = match raw.get("middleware_checkpoints") {
            None | Some(Value::Null) => CheckpointTable::default(),
            Some(Value::Object(object)) => CheckpointTable::from_object(object)?,
            Some(_) => {
                return Err(Error::invalid_option("middleware_checkpoints", ValueType::Object));
            }
        };

        let always_added_headers = headers_option(raw)?;

        let port = match raw.get("port") {
            None | Some(Value::Null) => Self::default_port(),
            Some(Value::Integer(port)) => u16::try_from(*port)
                .map_err(|_| Error::invalid_option("port", "integer between 0 and 65535"))?,
            Some(_) => {
                return Err(Error::invalid_option("port", "integer between 0 and 65535"));
            }
        };

        let environment = string_option(raw, "environment", Environment::default().as_str())?
            .parse::<Environment>()
            .map_err(|_| {
                Error::invalid_option("environment", "\"development\" or \"production\"")
            })?;

        let autostart = match raw.get("autostart") {
            None | Some(Value::Null) => true,
            Some(Value::Boolean(autostart)) => *autostart,
            Some(_) => return Err(Error::invalid_option("autostart", ValueType::Boolean)),
        };

        let bind_addr = string_option(raw, "bind_addr", Self::default_bind_addr())?;

        let body_limit = match raw.get("body_limit") {
            Some(Value::Integer(bytes)) => usize::try_from(*bytes)
                .map_err(|_| Error::invalid_option("body_limit", "positive byte count"))?,
            _ => {
                let text = string_option(raw, "body_limit", Self::default_body_limit())?;
                let bytes = Byte::parse_str(&text, true).map_err(|_| {
                    Error::invalid_option("body_limit", "byte size such as \"1MiB\"")
                })?;
                usize::try_from(bytes.as_u64())
                    .map_err(|_| Error::invalid_option("body_limit", "byte size such as \"1MiB\""))?
            }
        };

        let shutdown_timeout = {
            let text = string_option(raw, "shutdown_timeout", Self::default_shutdown_timeout())?;
            humantime::parse_duration(&text)
                .map_err(|_| Error::invalid_option("shutdown_timeout", "duration such as \"30s\""))?
        };

        let log_format = string_option(raw, "log_format", "default")?
            .parse::<LogFormat>()
            .map_err(|_| {
                Error::invalid_option("log_format", "one of default, json, compact, pretty")
            })?;

        // Filesystem prerequisites
        if !is_dir(&routes_directory).await {
            return Err(Error::missing_routes_directory(&routes_directory));
        }

        let serve_static = is_dir(&public_directory).await;
        if !serve_static {
            tracing::warn!(
                "Public directory `{}` not found, static files will not be served",
                public_directory.display()
            );
        }

        let mut register_views = view_engine != ViewEngine::None;
        if register_views && !is_dir(&views_directory).await {
            tracing::warn!(
                "Views directory `{}` not found, view engine `{view_engine}` will not be registered",
                views_directory.display()
            );
            register_views = false;
        }

        Ok(Options {
            routes_directory,
            public_directory,
            serve_static,
            views_directory,
            view_engine,
            register_views,
            not_found_handler,
            error_handler,
            method_not_allowed_handler,
            middleware_checkpoints,
            always_added_headers,
            port,
            environment,
            autostart,
            bind_addr,
            body_limit,
            shutdown_timeout,
            log_format,
        })
    }

    ///
    /// Returns the full bind address as a string in the format "IP:PORT".
    ///
    pub fn full_bind_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// The static file directory, when static serving applies.
    pub fn static_directory(&self) -> Option<&Path> {
        self.serve_static.then_some(self.public_directory.as_path())
    }

    /// The view engine registration, when it applies.
    pub fn view_settings(&self) -> Option<ViewSettings> {
        self.register_views.then(|| ViewSettings {
            engine: self.view_engine,
            directory: self.views_directory.clone(),
        })
    }

    ///
    /// Sets up the tracing subscriber for logging based on `log_format`.
    ///
    /// NOTE: This should be called early during startup to ensure logging is configured
    ///       before any log messages are emitted.
    ///
    pub fn setup_tracing(&self) {
        logging::setup_tracing(self.log_format);
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

fn string_option(raw: &RawOptions, key: &str, default: &str) -> Result<String> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(default.into()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(Error::invalid_option(key, ValueType::String)),
    }
}

fn handler_option(raw: &RawOptions, key: &str, default: fn() -> Handler) -> Result<Handler> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(default()),
        Some(Value::Handler(handler)) => Ok(handler.clone()),
        Some(_) => Err(Error::invalid_option(key, ValueType::Handler)),
    }
}

fn headers_option(raw: &RawOptions) -> Result<Vec<(HeaderName, HeaderValue)>> {
    let object = match raw.get("always_added_headers") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(object)) => object,
        Some(_) => return Err(Error::invalid_option("always_added_headers", ValueType::Object)),
    };

    let mut headers = Vec::with_capacity(object.len());
    for (name, value) in object {
        let key = format!("always_added_headers.{name}");
        let Value::String(value) = value else {
            return Err(Error::invalid_option(key, ValueType::String));
        };
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::invalid_option(&key, "valid header name"))?;
        if header_name == POWERED_BY_HEADER {
            tracing::warn!("Header `{POWERED_BY_HEADER}` is reserved and cannot be overridden");
            continue;
        }
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| Error::invalid_option(&key, "valid header value"))?;
        headers.push((header_name, header_value));
    }
    Ok(headers)
}

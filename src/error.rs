//! Error types for the bootstrap pipeline and for request handlers.
//!
//! Every misconfiguration detected while bootstrapping is reported as an
//! [`Error`] whose [`ErrorKind`] identifies the failing stage. Nothing in the
//! pipeline retries: the caller decides whether an error ends the process
//! (see [`exit_on_error`]).
//!
//! # Design
//!
//! This module uses an opaque `Error` struct paired with an `ErrorKind` enum,
//! following the `std::io::Error` pattern. Internal error sources can change
//! without breaking consumers.
//!
//! # Example
//!
//! ```rust
//! use axum_autoroutes::{Error, ErrorKind};
//!
//! let error = Error::invalid_option("port", "number");
//!
//! match error.kind() {
//!     ErrorKind::InvalidOptionType => println!("bad option: {}", error),
//!     _ => println!("other error: {}", error),
//! }
//!
//! use axum::http::StatusCode;
//! assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::{fmt, path::Path};
use thiserror::Error;

/// The kind of error that occurred.
///
/// The first seven variants are the bootstrap taxonomy. All of them are fatal
/// to a bootstrap run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A configuration option has the wrong type or an unparsable value.
    #[error("invalid option type")]
    InvalidOptionType,

    /// The configured routes directory does not exist.
    #[error("missing routes directory")]
    MissingRoutesDirectory,

    /// The configured view engine is not one of the supported engines.
    #[error("invalid view engine")]
    InvalidViewEngine,

    /// A middleware checkpoint slot holds something other than a middleware.
    #[error("invalid checkpoint")]
    InvalidCheckpoint,

    /// A route manifest is missing a field, has a field of the wrong type,
    /// or cannot be loaded at all.
    #[error("invalid route shape")]
    InvalidRouteShape,

    /// A route declares a method outside the supported HTTP methods.
    #[error("invalid route method")]
    InvalidRouteMethod,

    /// Listing the routes directory tree failed.
    #[error("filesystem discovery failure")]
    FilesystemDiscoveryFailure,

    /// Configuration source error (invalid TOML, missing environment).
    #[error("configuration error")]
    Configuration,

    /// I/O error (binding the listener, serving).
    #[error("I/O error")]
    Io,

    /// Invalid input inside a request handler.
    #[error("invalid input")]
    InvalidInput,

    /// Internal/unexpected error.
    #[error("internal error")]
    Internal,
}

/// An error that can occur while bootstrapping or serving.
///
/// Use [`Error::kind()`] to determine the category of error for matching,
/// and the `Display` implementation to get a human-readable message.
pub struct Error {
    kind: ErrorKind,
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl Error {
    /// Creates a new error with the given kind and source.
    ///
    /// ```rust
    /// use axum_autoroutes::{Error, ErrorKind};
    ///
    /// let err = Error::new(ErrorKind::Internal, "something went wrong");
    /// assert_eq!(err.kind(), ErrorKind::Internal);
    /// ```
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self {
            kind,
            source: error.into(),
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error code string for this error.
    ///
    /// This is a stable identifier suitable for client-side error handling
    /// and for operators reading startup diagnostics.
    pub fn error_code(&self) -> &'static str {
        match self.kind {
            ErrorKind::InvalidOptionType => "INVALID_OPTION",
            ErrorKind::MissingRoutesDirectory => "MISSING_ROUTES_DIRECTORY",
            ErrorKind::InvalidViewEngine => "INVALID_VIEW_ENGINE",
            ErrorKind::InvalidCheckpoint => "INVALID_CHECKPOINT",
            ErrorKind::InvalidRouteShape => "INVALID_ROUTE_FIELD",
            ErrorKind::InvalidRouteMethod => "INVALID_ROUTE_METHOD",
            ErrorKind::FilesystemDiscoveryFailure => "FILESYSTEM_DISCOVERY_FAILURE",
            ErrorKind::Configuration => "CONFIG_ERROR",
            ErrorKind::Io => "IO_ERROR",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converts the error into a structured error response.
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.error_code(), self.to_string())
    }
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl Error {
    /// `INVALID_OPTION(key, expected)`: option `key` did not hold a value of
    /// the `expected` type.
    pub fn invalid_option(key: impl fmt::Display, expected: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::InvalidOptionType,
            format!("Option `{key}` is invalid, expected {expected}"),
        )
    }

    /// The routes directory is absent or not a directory.
    pub fn missing_routes_directory(path: &Path) -> Self {
        Self::new(
            ErrorKind::MissingRoutesDirectory,
            format!(
                "Routes directory `{}` does not exist. Create it or set routes_directory.",
                path.display()
            ),
        )
    }

    /// The view engine name is not one of the supported engines.
    pub fn invalid_view_engine(name: &str) -> Self {
        Self::new(
            ErrorKind::InvalidViewEngine,
            format!(
                "View engine `{name}` is not supported. Use one of: none, ejs, pug, nunjucks, handlebars."
            ),
        )
    }

    /// `INVALID_CHECKPOINT(name)`.
    pub fn invalid_checkpoint(name: &str) -> Self {
        Self::new(
            ErrorKind::InvalidCheckpoint,
            format!("Middleware checkpoint `{name}` must be empty or a middleware function"),
        )
    }

    /// `INVALID_ROUTE_FIELD(index, field, expected)`.
    pub fn invalid_route_field(
        index: usize,
        field: &str,
        expected: impl fmt::Display,
    ) -> Self {
        Self::new(
            ErrorKind::InvalidRouteShape,
            format!("Route #{index}: field `{field}` is invalid, expected {expected}"),
        )
    }

    /// A route manifest could not be turned into a route at all.
    pub fn invalid_route(index: usize, msg: impl fmt::Display) -> Self {
        Self::new(ErrorKind::InvalidRouteShape, format!("Route #{index}: {msg}"))
    }

    /// `INVALID_ROUTE_METHOD(index)`.
    pub fn invalid_route_method(index: usize, method: &str) -> Self {
        Self::new(
            ErrorKind::InvalidRouteMethod,
            format!(
                "Route #{index}: method `{method}` is not one of GET, HEAD, POST, PUT, DELETE, CONNECT, OPTIONS, TRACE, PATCH"
            ),
        )
    }

    /// Listing `path` failed while discovering routes.
    pub fn discovery(path: &Path, err: std::io::Error) -> Self {
        Self::new(
            ErrorKind::FilesystemDiscoveryFailure,
            format!("Unable to read `{}` while discovering routes: {err}", path.display()),
        )
    }

    /// Appends the file the error was found in, keeping the kind.
    pub fn in_file(self, path: &Path) -> Self {
        Self::new(self.kind, format!("{} (in `{}`)", self.source, path.display()))
    }

    /// Creates an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, msg.into())
    }

    /// Creates an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg.into())
    }
}

/// Applies the fail-fast policy to a bootstrap result.
///
/// On error the diagnostic is logged and printed to stderr and the process
/// exits with status 1, before any port has been opened.
///
/// ```rust,no_run
/// use axum_autoroutes::{AxumApp, Bootstrap, RawOptions, exit_on_error};
///
/// # async fn example() {
/// let outcome = Bootstrap::new(AxumApp::new())
///     .options(RawOptions::default())
///     .run()
///     .await;
/// exit_on_error(outcome);
/// # }
/// ```
pub fn exit_on_error<T>(result: Result<T, Error>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            tracing::error!(error_code = err.error_code(), "{err}");
            eprintln!("[{}] {}", err.error_code(), err);
            std::process::exit(1);
        }
    }
}

// ============================================================================
// Trait implementations
// ============================================================================

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

/// Handlers may return `Result<_, Error>`. The JSON response carries a
/// [`Failure`](crate::Failure) extension so that the registered error handler
/// can replace it.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = self.to_error_response();

        tracing::error!(
            error_code = %error_response.error_code,
            message = %error_response.message,
            status = %status.as_u16(),
            "Error occurred"
        );

        let failure =
            crate::Failure::new(status, &error_response.error_code, &error_response.message);
        let mut response = (status, Json(error_response)).into_response();
        response.extensions_mut().insert(failure);
        response
    }
}

// ============================================================================
// From implementations
// ============================================================================

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::new(ErrorKind::Configuration, err)
    }
}

impl From<std::env::VarError> for Error {
    fn from(err: std::env::VarError) -> Self {
        Self::new(ErrorKind::Configuration, err)
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::new(ErrorKind::InvalidInput, err)
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::new(ErrorKind::InvalidInput, err)
    }
}

// ============================================================================
// ErrorResponse
// ============================================================================

/// JSON body of an error response: `{"error_code": ..., "message": ...}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Unique error code for client-side error handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    /// Creates a new error response.
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

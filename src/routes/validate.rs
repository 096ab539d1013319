use {
    super::RawRoute,
    crate::{Error, Handler, Middleware, Result, Value, ValueType},
    http::Method,
};

/// Methods a route may declare.
pub static SUPPORTED_METHODS: [Method; 9] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::CONNECT,
    Method::OPTIONS,
    Method::TRACE,
    Method::PATCH,
];

/// A validated route with every optional field filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDescriptor {
    pub method: Method,
    /// Path pattern, interpreted by the transport.
    pub path: String,
    pub handler: Handler,
    pub disabled: bool,
    pub development_route: bool,
    /// Runs before dispatch on every request to `path`.
    pub route_middleware: Middleware,
}

impl RouteDescriptor {
    /// A descriptor with default flags and the pass-through middleware.
    pub fn new(method: Method, path: impl Into<String>, handler: Handler) -> Self {
        Self {
            method,
            path: path.into(),
            handler,
            disabled: false,
            development_route: false,
            route_middleware: Middleware::passthrough(),
        }
    }

    #[must_use]
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    #[must_use]
    pub fn development_route(mut self, development_route: bool) -> Self {
        self.development_route = development_route;
        self
    }

    #[must_use]
    pub fn route_middleware(mut self, middleware: Middleware) -> Self {
        self.route_middleware = middleware;
        self
    }
}

/// Checks a raw route against the route contract.
///
/// `index` is the route's position in discovery order and is used in the
/// error message.
///
/// # Errors
///
/// - `InvalidRouteShape` when a required field (`method`, `path`, `handler`)
///   is missing, or any field holds a value of the wrong type
/// - `InvalidRouteMethod` when the method, upper-cased, is not one of
///   [`SUPPORTED_METHODS`]
pub fn validate_route(index: usize, raw: &RawRoute) -> Result<RouteDescriptor> {
    let method = match present(raw, "method") {
        Some(Value::String(method)) => method,
        other => return Err(field_error(index, "method", ValueType::String, other)),
    };
    let path = match present(raw, "path") {
        Some(Value::String(path)) => path.clone(),
        other => return Err(field_error(index, "path", ValueType::String, other)),
    };
    let handler = match present(raw, "handler") {
        Some(Value::Handler(handler)) => handler.clone(),
        other => return Err(field_error(index, "handler", ValueType::Handler, other)),
    };

    let disabled = flag(index, raw, "disabled")?;
    let development_route = flag(index, raw, "development_route")?;

    let route_middleware = match present(raw, "route_middleware") {
        None => Middleware::passthrough(),
        Some(Value::Middleware(middleware)) => middleware.clone(),
        other => return Err(field_error(index, "route_middleware", ValueType::Middleware, other)),
    };

    let upper = method.to_ascii_uppercase();
    let method = SUPPORTED_METHODS
        .iter()
        .find(|m| m.as_str() == upper)
        .cloned()
        .ok_or_else(|| Error::invalid_route_method(index, method))?;

    Ok(RouteDescriptor {
        method,
        path,
        handler,
        disabled,
        development_route,
        route_middleware,
    })
}

// Null counts as absent.
fn present<'a>(raw: &'a RawRoute, field: &str) -> Option<&'a Value> {
    raw.get(field).filter(|value| !value.is_null())
}

fn flag(index: usize, raw: &RawRoute, field: &str) -> Result<bool> {
    match present(raw, field) {
        None => Ok(false),
        Some(Value::Boolean(value)) => Ok(*value),
        other => Err(field_error(index, field, ValueType::Boolean, other)),
    }
}

fn field_error(index: usize, field: &str, expected: ValueType, found: Option<&Value>) -> Error {
    match found {
        None => Error::invalid_route_field(index, field, format!("{expected}, but it is missing")),
        Some(value) => Error::invalid_route_field(
            index,
            field,
            format!("{expected}, found {}", value.value_type()),
        ),
    }
}

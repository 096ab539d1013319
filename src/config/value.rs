use {
    crate::{ErrorHandler, Handler, Middleware},
    std::{collections::BTreeMap, fmt},
};

/// An untyped configuration or route manifest value.
///
/// TOML documents convert into values; callables can only be supplied
/// programmatically. Type checks against the expected [`ValueType`] happen
/// during option resolution and route validation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Handler(Handler),
    Middleware(Middleware),
    ErrorHandler(ErrorHandler),
}

/// The primitive types an option or route field can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    /// A request handler: `(request) -> response`.
    Handler,
    /// A middleware: `(request, next) -> response`.
    Middleware,
    /// An error handler: `(failure) -> response`.
    ErrorHandler,
    Null,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Array => "array",
            ValueType::Object => "object",
            ValueType::Handler => "function (request handler)",
            ValueType::Middleware => "function (middleware)",
            ValueType::ErrorHandler => "function (error handler)",
            ValueType::Null => "null",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::String(_) => ValueType::String,
            Value::Integer(_) | Value::Float(_) => ValueType::Number,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Array(_) => ValueType::Array,
            Value::Object(_) => ValueType::Object,
            Value::Handler(_) => ValueType::Handler,
            Value::Middleware(_) => ValueType::Middleware,
            Value::ErrorHandler(_) => ValueType::ErrorHandler,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }
}

/// Converts a parsed TOML value. Datetimes have no counterpart and are kept
/// as their string form.
impl From<toml::Value> for Value {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Integer(i),
            toml::Value::Float(f) => Value::Float(f),
            toml::Value::Boolean(b) => Value::Boolean(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            toml::Value::Table(table) => Value::Object(object_from_table(table)),
        }
    }
}

pub(crate) fn object_from_table(table: toml::Table) -> BTreeMap<String, Value> {
    table
        .into_iter()
        .map(|(key, value)| (key, Value::from(value)))
        .collect()
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<u16> for Value {
    fn from(i: u16) -> Self {
        Value::Integer(i.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

impl From<Handler> for Value {
    fn from(handler: Handler) -> Self {
        Value::Handler(handler)
    }
}

impl From<Middleware> for Value {
    fn from(middleware: Middleware) -> Self {
        Value::Middleware(middleware)
    }
}

impl From<ErrorHandler> for Value {
    fn from(handler: ErrorHandler) -> Self {
        Value::ErrorHandler(handler)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

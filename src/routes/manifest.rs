use {
    crate::{Error, HandlerRegistry, Result, Value, config::object_from_table},
    std::{
        collections::BTreeMap,
        path::{Path, PathBuf},
    },
};

/// An unvalidated route: field names mapped to values, as read from a
/// manifest or assembled in code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRoute {
    fields: BTreeMap<String, Value>,
    source: Option<PathBuf>,
}

impl RawRoute {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: BTreeMap<String, Value>) -> Self {
        Self {
            fields,
            source: None,
        }
    }

    #[must_use]
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The manifest file this route was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

/// Reads a route manifest from disk.
///
/// See [`parse_manifest`] for the format. `index` is the file's position in
/// discovery order and is used in diagnostics.
pub async fn load_manifest(
    path: &Path,
    index: usize,
    registry: &HandlerRegistry,
) -> Result<RawRoute> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| {
            Error::invalid_route(index, format!("unable to read `{}`: {err}", path.display()))
        })?;

    let mut route = parse_manifest(&text, index, registry).map_err(|err| err.in_file(path))?;
    route.source = Some(path.to_path_buf());
    Ok(route)
}

/// Parses a TOML route manifest.
///
/// ```toml
/// method = "get"
/// path = "/users/{id}"
/// handler = "show_user"
/// route_middleware = "audit"
/// ```
///
/// `handler` and `route_middleware` name entries of `registry`; they are
/// replaced by the registered callables. Other fields are kept as parsed and
/// checked later by [`validate_route`](super::validate_route).
pub fn parse_manifest(text: &str, index: usize, registry: &HandlerRegistry) -> Result<RawRoute> {
    let table = toml::from_str::<toml::Table>(text)
        .map_err(|err| Error::invalid_route(index, format!("not a valid route manifest: {err}")))?;
    let mut fields = object_from_table(table);

    if let Some(Value::String(name)) = fields.get("handler") {
        let handler = registry
            .get_handler(name)
            .cloned()
            .ok_or_else(|| {
                Error::invalid_route_field(
                    index,
                    "handler",
                    format!("registered handler name, `{name}` is unknown"),
                )
            })?;
        fields.insert("handler".into(), Value::Handler(handler));
    }

    if let Some(Value::String(name)) = fields.get("route_middleware") {
        let middleware = registry
            .get_middleware(name)
            .cloned()
            .ok_or_else(|| {
                Error::invalid_route_field(
                    index,
                    "route_middleware",
                    format!("registered middleware name, `{name}` is unknown"),
                )
            })?;
        fields.insert("route_middleware".into(), Value::Middleware(middleware));
    }

    Ok(RawRoute::from_fields(fields))
}

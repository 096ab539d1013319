use {
    super::RouteDescriptor,
    crate::{AllowedMethod, Environment, Error, Handler, Options, Result, Transport},
    axum::extract::Request,
    http::Method,
    std::collections::HashMap,
};

/// What happened to a descriptor handed to the registrar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Bound on the transport.
    Bound { method: Method, path: String },
    /// `disabled` was set.
    SkippedDisabled { method: Method, path: String },
    /// `development_route` was set outside development mode.
    SkippedDevelopmentOnly { method: Method, path: String },
    /// An earlier descriptor already owns the path. The earlier one keeps
    /// serving it and requests with this method get method-not-allowed.
    Shadowed {
        method: Method,
        path: String,
        bound_method: Method,
    },
}

impl Registration {
    pub fn is_bound(&self) -> bool {
        matches!(self, Registration::Bound { .. })
    }

    pub fn path(&self) -> &str {
        match self {
            Registration::Bound { path, .. }
            | Registration::SkippedDisabled { path, .. }
            | Registration::SkippedDevelopmentOnly { path, .. }
            | Registration::Shadowed { path, .. } => path,
        }
    }
}

/// Binds route descriptors to a transport.
///
/// The registrar works on descriptors only, so routes can come from manifests
/// on disk or be built in code. Each bound path answers every method: the
/// declared method reaches the handler, anything else reaches the
/// method-not-allowed handler.
#[derive(Debug)]
pub struct RouteRegistrar {
    environment: Environment,
    method_not_allowed: Handler,
    bound: HashMap<String, Method>,
}

impl RouteRegistrar {
    pub fn new(environment: Environment, method_not_allowed: Handler) -> Self {
        Self {
            environment,
            method_not_allowed,
            bound: HashMap::new(),
        }
    }

    pub fn from_options(options: &Options) -> Self {
        Self::new(options.environment, options.method_not_allowed_handler.clone())
    }

    /// Registers one descriptor. `index` is its position in registration
    /// order and only appears in diagnostics.
    ///
    /// # Errors
    ///
    /// `InvalidRouteShape` if the transport rejects the path.
    pub fn register<T: Transport>(
        &mut self,
        transport: &mut T,
        index: usize,
        descriptor: &RouteDescriptor,
    ) -> Result<Registration> {
        let method = descriptor.method.clone();
        let path = descriptor.path.clone();

        if descriptor.disabled {
            tracing::info!("Skipping disabled route {method} {path}");
            return Ok(Registration::SkippedDisabled { method, path });
        }

        if descriptor.development_route && !self.environment.is_development() {
            tracing::info!(
                "Skipping development route {method} {path} in {} mode",
                self.environment
            );
            return Ok(Registration::SkippedDevelopmentOnly { method, path });
        }

        if let Some(bound_method) = self.bound.get(&path) {
            tracing::warn!(
                "Route {method} {path} is shadowed by the earlier {bound_method} {path}; only the first registration is served"
            );
            return Ok(Registration::Shadowed {
                method,
                path,
                bound_method: bound_method.clone(),
            });
        }

        let dispatch = self.dispatcher(descriptor);
        let middleware = (!descriptor.route_middleware.is_passthrough())
            .then(|| descriptor.route_middleware.clone());
        transport
            .route(&path, dispatch, middleware)
            .map_err(|err| Error::invalid_route(index, err))?;

        tracing::info!("Registered route {method} {path}");
        self.bound.insert(path.clone(), method.clone());
        Ok(Registration::Bound { method, path })
    }

    /// Registers descriptors in order, stopping at the first error.
    pub fn register_all<'a, T: Transport>(
        &mut self,
        transport: &mut T,
        descriptors: impl IntoIterator<Item = &'a RouteDescriptor>,
    ) -> Result<Vec<Registration>> {
        descriptors
            .into_iter()
            .enumerate()
            .map(|(index, descriptor)| self.register(transport, index, descriptor))
            .collect()
    }

    fn dispatcher(&self, descriptor: &RouteDescriptor) -> Handler {
        let declared = descriptor.method.clone();
        let handler = descriptor.handler.clone();
        let method_not_allowed = self.method_not_allowed.clone();
        let development = self.environment.is_development();

        Handler::new(move |mut req: Request| {
            if req.method() == declared {
                return handler.call(req);
            }
            if development {
                tracing::warn!(
                    "Method {} is not allowed on {}, expected {}",
                    req.method(),
                    req.uri().path(),
                    declared
                );
            }
            req.extensions_mut().insert(AllowedMethod(declared.clone()));
            method_not_allowed.call(req)
        })
    }
}

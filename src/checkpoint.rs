//! Named lifecycle checkpoints where one user middleware may be inserted.

use {
    crate::{Error, Middleware, Result, Transport, Value},
    std::{collections::BTreeMap, fmt},
};

/// The nine checkpoints, in the order the bootstrap sequence fires them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Checkpoint {
    BeforeRouteLoad,
    AfterRouteLoad,
    BeforeBuiltinMiddlewareRegister,
    AfterBuiltinMiddlewareRegister,
    Before404Register,
    After404Register,
    BeforeErrorRegister,
    AfterErrorRegister,
    BeforeServe,
}

impl Checkpoint {
    pub const ALL: [Checkpoint; 9] = [
        Checkpoint::BeforeRouteLoad,
        Checkpoint::AfterRouteLoad,
        Checkpoint::BeforeBuiltinMiddlewareRegister,
        Checkpoint::AfterBuiltinMiddlewareRegister,
        Checkpoint::Before404Register,
        Checkpoint::After404Register,
        Checkpoint::BeforeErrorRegister,
        Checkpoint::AfterErrorRegister,
        Checkpoint::BeforeServe,
    ];

    /// Configuration key of the slot.
    pub fn as_str(&self) -> &'static str {
        match self {
            Checkpoint::BeforeRouteLoad => "before_route_load",
            Checkpoint::AfterRouteLoad => "after_route_load",
            Checkpoint::BeforeBuiltinMiddlewareRegister => "before_builtin_middleware_register",
            Checkpoint::AfterBuiltinMiddlewareRegister => "after_builtin_middleware_register",
            Checkpoint::Before404Register => "before_404_register",
            Checkpoint::After404Register => "after_404_register",
            Checkpoint::BeforeErrorRegister => "before_error_register",
            Checkpoint::AfterErrorRegister => "after_error_register",
            Checkpoint::BeforeServe => "before_serve",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cp| cp.as_str() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One optional middleware per checkpoint. An empty slot is a no-op.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckpointTable {
    slots: [Option<Middleware>; 9],
}

impl CheckpointTable {
    /// Builds the table from the `middleware_checkpoints` object.
    ///
    /// Known slots must be null or a middleware. Unknown names holding a
    /// middleware are ignored with a warning; unknown names holding anything
    /// else are rejected.
    pub fn from_object(object: &BTreeMap<String, Value>) -> Result<Self> {
        let mut table = Self::default();
        for (name, value) in object {
            match (Checkpoint::from_name(name), value) {
                (_, Value::Null) => {}
                (Some(checkpoint), Value::Middleware(middleware)) => {
                    table.set(checkpoint, middleware.clone());
                }
                (None, Value::Middleware(_)) => {
                    tracing::warn!("Ignoring middleware for unknown checkpoint `{name}`");
                }
                (_, _) => return Err(Error::invalid_checkpoint(name)),
            }
        }
        Ok(table)
    }

    pub fn get(&self, checkpoint: Checkpoint) -> Option<&Middleware> {
        self.slots[checkpoint.index()].as_ref()
    }

    pub fn set(&mut self, checkpoint: Checkpoint, middleware: Middleware) {
        self.slots[checkpoint.index()] = Some(middleware);
    }

    /// Checkpoints that hold a middleware, in firing order.
    pub fn occupied(&self) -> impl Iterator<Item = Checkpoint> + '_ {
        Checkpoint::ALL
            .into_iter()
            .filter(|cp| self.get(*cp).is_some())
    }

    /// Registers the checkpoint's middleware on the transport at the current
    /// point of the bootstrap sequence. Returns whether anything was registered.
    pub fn inject<T: Transport>(&self, checkpoint: Checkpoint, transport: &mut T) -> bool {
        match self.get(checkpoint) {
            Some(middleware) => {
                tracing::debug!("Registering middleware at checkpoint {checkpoint}");
                transport.use_middleware(checkpoint.as_str(), middleware.clone());
                true
            }
            None => false,
        }
    }
}

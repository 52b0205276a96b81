//! Collaborator seams for the embedded engine and its UI surface.
//!
//! The bridge never talks to a concrete engine. Hosts plug in an
//! [`EngineFactory`], and a [`UiSurface`] for each native container the
//! engine's view is shown in.

use handover_core::{BridgeError, Payload};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A named method invocation on the engine channel.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub arguments: Payload,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Payload) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// Outcome of a method call on the engine channel.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResult {
    Success(Payload),
    Error {
        code: String,
        message: Option<String>,
        details: Option<String>,
    },
    NotImplemented,
}

impl MethodResult {
    /// Collapse into the two-outcome form; `method` names the call for errors.
    pub fn into_result(self, method: &str) -> Result<Payload, BridgeError> {
        match self {
            MethodResult::Success(value) => Ok(value),
            MethodResult::Error {
                code,
                message,
                details,
            } => Err(BridgeError::Channel {
                message: message.unwrap_or_else(|| code.clone()),
                code,
                details,
            }),
            MethodResult::NotImplemented => Err(BridgeError::NotImplemented(method.to_string())),
        }
    }

    /// Report `error` back to the engine: code, message and trace.
    pub fn from_error(error: &BridgeError) -> Self {
        MethodResult::Error {
            code: error.code().to_string(),
            message: Some(error.to_string()),
            details: Some(error.trace()),
        }
    }
}

/// Reply object for one method call. Invoked at most once.
pub struct MethodReply(Box<dyn FnOnce(MethodResult) + Send>);

impl MethodReply {
    pub fn new(f: impl FnOnce(MethodResult) + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    pub fn send(self, result: MethodResult) {
        (self.0)(result)
    }
}

impl fmt::Debug for MethodReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MethodReply")
    }
}

/// Where the engine starts executing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entrypoint {
    /// Library holding the entrypoint; `None` means the bundle's default.
    pub library_uri: Option<String>,
    /// Function name, usually `main`.
    pub function: String,
}

impl Default for Entrypoint {
    fn default() -> Self {
        Self {
            library_uri: None,
            function: "main".to_string(),
        }
    }
}

/// A running embedded engine.
pub trait Engine: Send + Sync {
    /// Whether an entrypoint is already executing.
    fn is_executing(&self) -> bool;

    fn execute_entrypoint(&self, entrypoint: &Entrypoint, args: Vec<String>) -> Result<(), BridgeError>;

    /// Send `call` to the engine; `reply` receives the outcome.
    ///
    /// An `Err` means the call never left; `reply` is dropped in that case.
    fn invoke_method(&self, call: MethodCall, reply: MethodReply) -> Result<(), BridgeError>;

    fn destroy(&self);
}

/// Creates engines on behalf of the session.
pub trait EngineFactory: Send {
    /// Whether the platform loader is ready to run entrypoints.
    fn loader_initialized(&self) -> bool;

    fn create(&mut self) -> Result<Arc<dyn Engine>, BridgeError>;
}

/// Native container currently showing the engine's view.
pub trait UiSurface: Send {
    /// Detach the engine's view from the container.
    fn clear(&mut self) -> Result<(), BridgeError>;

    /// Re-measure and re-lay-out the container. Returns false when the surface
    /// cannot be laid out manually.
    fn request_layout(&mut self) -> bool;
}

/// Engines shared with the host under fixed keys.
#[derive(Clone, Default)]
pub struct EngineCache {
    engines: Arc<RwLock<HashMap<String, Arc<dyn Engine>>>>,
}

impl EngineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, id: impl Into<String>, engine: Arc<dyn Engine>) {
        self.engines.write().insert(id.into(), engine);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Engine>> {
        self.engines.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<dyn Engine>> {
        self.engines.write().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.engines.read().contains_key(id)
    }
}

impl fmt::Debug for EngineCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let engines = self.engines.read();
        f.debug_struct("EngineCache")
            .field("ids", &engines.keys().collect::<Vec<_>>())
            .finish()
    }
}

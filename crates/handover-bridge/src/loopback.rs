//! In-process engine and surface.
//!
//! Stand-ins for a real embedded engine: they record what the bridge does to
//! them and let the caller script the engine's answers. Used by the tests and
//! the demo host.

use crate::bridge::BridgeHandle;
use crate::engine::{
    Engine, EngineFactory, Entrypoint, MethodCall, MethodReply, MethodResult, UiSurface,
};
use handover_core::{BridgeError, Payload};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::oneshot;

/// Scripted answer to a host-to-engine call. `None` leaves the call unanswered.
type Handler = Arc<dyn Fn(&MethodCall) -> Option<MethodResult> + Send + Sync>;

struct Shared {
    loader_ready: AtomicBool,
    reject_calls: AtomicBool,
    created: AtomicUsize,
    destroyed: AtomicUsize,
    entrypoints: Mutex<Vec<(Entrypoint, Vec<String>)>>,
    calls: Mutex<Vec<MethodCall>>,
    handler: Mutex<Handler>,
    current: Mutex<Option<Arc<LoopbackEngine>>>,
}

/// Factory producing [`LoopbackEngine`]s. Clones share their counters.
#[derive(Clone)]
pub struct LoopbackFactory {
    shared: Arc<Shared>,
}

impl Default for LoopbackFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackFactory {
    pub fn new() -> Self {
        let handler: Handler = Arc::new(|_| Some(MethodResult::NotImplemented));
        Self {
            shared: Arc::new(Shared {
                loader_ready: AtomicBool::new(true),
                reject_calls: AtomicBool::new(false),
                created: AtomicUsize::new(0),
                destroyed: AtomicUsize::new(0),
                entrypoints: Mutex::new(Vec::new()),
                calls: Mutex::new(Vec::new()),
                handler: Mutex::new(handler),
                current: Mutex::new(None),
            }),
        }
    }

    /// Script the engine's answers to host-to-engine calls.
    pub fn on_method(&self, handler: impl Fn(&MethodCall) -> Option<MethodResult> + Send + Sync + 'static) {
        *self.shared.handler.lock() = Arc::new(handler);
    }

    pub fn set_loader_ready(&self, ready: bool) {
        self.shared.loader_ready.store(ready, Ordering::SeqCst);
    }

    /// Make every call fail before it reaches the engine.
    pub fn set_reject_calls(&self, reject: bool) {
        self.shared.reject_calls.store(reject, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.shared.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.shared.destroyed.load(Ordering::SeqCst)
    }

    /// Arguments of every entrypoint executed so far.
    pub fn entrypoint_args(&self) -> Vec<Vec<String>> {
        self.shared
            .entrypoints
            .lock()
            .iter()
            .map(|(_, args)| args.clone())
            .collect()
    }

    pub fn last_entrypoint(&self) -> Option<Entrypoint> {
        self.shared
            .entrypoints
            .lock()
            .last()
            .map(|(entrypoint, _)| entrypoint.clone())
    }

    /// Host-to-engine calls received so far.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.shared.calls.lock().clone()
    }

    /// The most recently created engine that is still alive.
    pub fn current(&self) -> Option<Arc<LoopbackEngine>> {
        self.shared.current.lock().clone()
    }
}

impl EngineFactory for LoopbackFactory {
    fn loader_initialized(&self) -> bool {
        self.shared.loader_ready.load(Ordering::SeqCst)
    }

    fn create(&mut self) -> Result<Arc<dyn Engine>, BridgeError> {
        self.shared.created.fetch_add(1, Ordering::SeqCst);
        let engine = Arc::new(LoopbackEngine {
            shared: self.shared.clone(),
            executing: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            unanswered: Mutex::new(Vec::new()),
        });
        *self.shared.current.lock() = Some(engine.clone());
        Ok(engine)
    }
}

/// Engine answering calls from a scripted handler.
pub struct LoopbackEngine {
    shared: Arc<Shared>,
    executing: AtomicBool,
    destroyed: AtomicBool,
    unanswered: Mutex<Vec<MethodReply>>,
}

impl LoopbackEngine {
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Calls the engine left unanswered.
    pub fn unanswered(&self) -> usize {
        self.unanswered.lock().len()
    }

    /// Make a handover request to the host, as engine code would.
    ///
    /// Resolves to `None` when the host discards the call without answering.
    pub async fn request(&self, host: &BridgeHandle, method: &str, arguments: Payload) -> Option<MethodResult> {
        let (tx, rx) = oneshot::channel();
        let reply = MethodReply::new(move |result| {
            let _ = tx.send(result);
        });
        host.dispatch_engine_call(MethodCall::new(method, arguments), reply);
        rx.await.ok()
    }
}

impl Engine for LoopbackEngine {
    fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }

    fn execute_entrypoint(&self, entrypoint: &Entrypoint, args: Vec<String>) -> Result<(), BridgeError> {
        if self.executing.swap(true, Ordering::SeqCst) {
            return Err(BridgeError::StartFailed("entrypoint already executing".into()));
        }
        self.shared.entrypoints.lock().push((entrypoint.clone(), args));
        Ok(())
    }

    fn invoke_method(&self, call: MethodCall, reply: MethodReply) -> Result<(), BridgeError> {
        if self.is_destroyed() {
            return Err(BridgeError::SendFailed("engine destroyed".into()));
        }
        if self.shared.reject_calls.load(Ordering::SeqCst) {
            return Err(BridgeError::SendFailed("channel closed".into()));
        }
        let handler = self.shared.handler.lock().clone();
        let answer = handler(&call);
        self.shared.calls.lock().push(call);
        match answer {
            Some(result) => reply.send(result),
            None => self.unanswered.lock().push(reply),
        }
        Ok(())
    }

    fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.destroyed.fetch_add(1, Ordering::SeqCst);
        // Calls still waiting on the engine die with it.
        self.unanswered.lock().clear();
        let mut current = self.shared.current.lock();
        if current.as_ref().is_some_and(|engine| std::ptr::eq(Arc::as_ptr(engine), self)) {
            *current = None;
        }
    }
}

/// Surface counting layout passes and clears. Clones share their counters.
#[derive(Clone, Default)]
pub struct LoopbackSurface {
    layouts: Arc<AtomicUsize>,
    clears: Arc<AtomicUsize>,
    fail_clear: bool,
}

impl LoopbackSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface whose `clear` always fails.
    pub fn failing() -> Self {
        Self {
            fail_clear: true,
            ..Self::default()
        }
    }

    pub fn layouts(&self) -> usize {
        self.layouts.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl UiSurface for LoopbackSurface {
    fn clear(&mut self) -> Result<(), BridgeError> {
        if self.fail_clear {
            return Err(BridgeError::Surface("view already detached".into()));
        }
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn request_layout(&mut self) -> bool {
        self.layouts.fetch_add(1, Ordering::SeqCst);
        true
    }
}

//! The bridge executor.
//!
//! A [`Bridge`] owns the engine session and runs as a single task. Every
//! lifecycle and channel operation is a command on its queue, so the session is
//! only ever touched from that task. [`BridgeHandle`]s enqueue from anywhere
//! without blocking.

use crate::completion::Completion;
use crate::config::BridgeConfig;
use crate::emitter::EventSink;
use crate::engine::{EngineCache, EngineFactory, MethodCall, MethodReply, MethodResult, UiSurface};
use crate::responder::EventHandoverResponder;
use crate::session::EngineSession;
use handover_core::{BridgeError, EngineState, Payload, StartParams};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

enum Command {
    Start {
        start_config: String,
        library_uri: Option<String>,
        done: Completion<bool>,
    },
    Stop {
        done: oneshot::Sender<()>,
    },
    Invoke {
        name: String,
        data: Payload,
        done: Completion<Payload>,
    },
    Respond {
        event_name: String,
        payload: Payload,
    },
    Dispatch {
        call: MethodCall,
        reply: MethodReply,
    },
    AttachSurface(Box<dyn UiSurface>),
    DetachSurface,
    ChangeLanguage {
        language: String,
        done: Completion<bool>,
    },
    ChangeThemeMode {
        theme_mode: String,
        done: Completion<bool>,
    },
    Exit,
    State(oneshot::Sender<EngineState>),
    PendingHandovers(oneshot::Sender<usize>),
    Shutdown,
}

/// Executor owning the engine session.
///
/// Dropping the bridge stops the engine.
pub struct Bridge {
    session: EngineSession,
    sink: Arc<dyn EventSink>,
    config: BridgeConfig,
    rx: mpsc::UnboundedReceiver<Command>,
}

impl Bridge {
    pub fn new(
        config: BridgeConfig,
        factory: impl EngineFactory + 'static,
        sink: impl EventSink + 'static,
    ) -> (Self, BridgeHandle) {
        Self::with_cache(config, factory, sink, EngineCache::new())
    }

    /// Like [`Bridge::new`], storing the running engine in `cache`.
    pub fn with_cache(
        config: BridgeConfig,
        factory: impl EngineFactory + 'static,
        sink: impl EventSink + 'static,
        cache: EngineCache,
    ) -> (Self, BridgeHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = EngineSession::new(factory, cache, config.engine.clone());
        let bridge = Self {
            session,
            sink: Arc::new(sink),
            config,
            rx,
        };
        (bridge, BridgeHandle { tx })
    }

    /// Shared cache the running engine is published in.
    pub fn cache(&self) -> EngineCache {
        self.session.cache().clone()
    }

    /// Run on a new tokio task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process commands until shut down or every handle is dropped.
    pub async fn run(mut self) {
        let mut sweep = self.config.handover.sweep_period().map(|period| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        tracing::debug!(timeout = ?self.config.handover.response_timeout(), "bridge executor running");

        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                _ = tick(&mut sweep) => self.expire_stale(),
            }
        }

        self.session.stop();
        tracing::debug!("bridge executor stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start {
                start_config,
                library_uri,
                done,
            } => {
                let responder = Box::new(EventHandoverResponder::new(self.sink.clone()));
                self.session.start(&start_config, responder, library_uri, done);
            }
            Command::Stop { done } => {
                self.session.stop();
                let _ = done.send(());
            }
            Command::Invoke { name, data, done } => self.session.invoke_handover(&name, data, done),
            Command::Respond {
                event_name,
                payload,
            } => {
                self.session.handle_response(&event_name, &payload);
            }
            Command::Dispatch { call, reply } => self.session.dispatch(call, reply),
            Command::AttachSurface(surface) => self.session.attach_surface(surface),
            Command::DetachSurface => self.session.detach_surface(),
            Command::ChangeLanguage { language, done } => self.session.change_language(&language, done),
            Command::ChangeThemeMode { theme_mode, done } => {
                self.session.change_theme_mode(&theme_mode, done)
            }
            Command::Exit => self.session.request_exit(),
            Command::State(tx) => {
                let _ = tx.send(self.session.state());
            }
            Command::PendingHandovers(tx) => {
                let _ = tx.send(self.session.pending_handovers());
            }
            Command::Shutdown => {}
        }
    }

    fn expire_stale(&mut self) {
        let Some(timeout) = self.config.handover.response_timeout() else {
            return;
        };
        let expired = self.session.expire_pending(timeout);
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "expired stale handovers");
        }
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Clonable handle enqueueing work on the bridge executor.
///
/// Once the executor is gone every operation fails with
/// [`BridgeError::ExecutorClosed`].
#[derive(Clone)]
pub struct BridgeHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl BridgeHandle {
    fn send(&self, command: Command) -> Result<(), BridgeError> {
        self.tx.send(command).map_err(|_| BridgeError::ExecutorClosed)
    }

    /// Start the engine with a raw start-config string.
    pub async fn start_engine(&self, start_config: impl Into<String>) -> Result<bool, BridgeError> {
        self.start_engine_from(start_config, None).await
    }

    /// Start the engine from `library_uri` instead of the configured library.
    pub async fn start_engine_from(
        &self,
        start_config: impl Into<String>,
        library_uri: Option<String>,
    ) -> Result<bool, BridgeError> {
        let (done, started) = Completion::channel();
        self.send(Command::Start {
            start_config: start_config.into(),
            library_uri,
            done,
        })?;
        started.await
    }

    /// Start the engine with typed start parameters.
    pub async fn start_with(&self, params: &StartParams) -> Result<bool, BridgeError> {
        self.start_engine(params.to_start_config()?).await
    }

    pub async fn stop_engine(&self) -> Result<(), BridgeError> {
        let (done, stopped) = oneshot::channel();
        self.send(Command::Stop { done })?;
        stopped.await.map_err(|_| BridgeError::ExecutorClosed)
    }

    /// Call method `name` on the engine and wait for its answer.
    pub async fn invoke_handover(&self, name: impl Into<String>, data: Payload) -> Result<Payload, BridgeError> {
        let (done, answer) = Completion::channel();
        self.send(Command::Invoke {
            name: name.into(),
            data,
            done,
        })?;
        answer.await
    }

    /// Deliver a response from the UI side.
    pub fn respond_to_event(&self, event_name: impl Into<String>, payload: Payload) -> Result<(), BridgeError> {
        self.send(Command::Respond {
            event_name: event_name.into(),
            payload,
        })
    }

    /// Deliver a method call made by the engine. If the executor is gone the
    /// engine is answered with the failure.
    pub fn dispatch_engine_call(&self, call: MethodCall, reply: MethodReply) {
        if let Err(mpsc::error::SendError(Command::Dispatch { reply, .. })) =
            self.tx.send(Command::Dispatch { call, reply })
        {
            reply.send(MethodResult::from_error(&BridgeError::ExecutorClosed));
        }
    }

    pub fn attach_surface(&self, surface: impl UiSurface + 'static) -> Result<(), BridgeError> {
        self.send(Command::AttachSurface(Box::new(surface)))
    }

    pub fn detach_surface(&self) -> Result<(), BridgeError> {
        self.send(Command::DetachSurface)
    }

    pub async fn change_language(&self, language: impl Into<String>) -> Result<bool, BridgeError> {
        let (done, changed) = Completion::channel();
        self.send(Command::ChangeLanguage {
            language: language.into(),
            done,
        })?;
        changed.await
    }

    pub async fn change_theme_mode(&self, theme_mode: impl Into<String>) -> Result<bool, BridgeError> {
        let (done, changed) = Completion::channel();
        self.send(Command::ChangeThemeMode {
            theme_mode: theme_mode.into(),
            done,
        })?;
        changed.await
    }

    /// Send the fire-and-forget `exit` event to the UI side.
    pub fn exit(&self) -> Result<(), BridgeError> {
        self.send(Command::Exit)
    }

    pub async fn state(&self) -> Result<EngineState, BridgeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::State(tx))?;
        rx.await.map_err(|_| BridgeError::ExecutorClosed)
    }

    /// Handovers from the engine still waiting for the UI side.
    pub async fn pending_handovers(&self) -> Result<usize, BridgeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::PendingHandovers(tx))?;
        rx.await.map_err(|_| BridgeError::ExecutorClosed)
    }

    /// Stop the executor; the engine is stopped with it.
    pub fn shutdown(&self) -> Result<(), BridgeError> {
        self.send(Command::Shutdown)
    }
}

impl std::fmt::Debug for BridgeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::ChannelSink;
    use crate::loopback::{LoopbackFactory, LoopbackSurface};
    use handover_core::{ENGINE_ID, Environment, ResponseEnvelope};

    fn spawn(config: BridgeConfig) -> (LoopbackFactory, BridgeHandle, mpsc::UnboundedReceiver<crate::emitter::EmittedEvent>, JoinHandle<()>) {
        let factory = LoopbackFactory::new();
        let (sink, events) = ChannelSink::new();
        let (bridge, handle) = Bridge::new(config, factory.clone(), sink);
        (factory, handle, events, bridge.spawn())
    }

    #[tokio::test]
    async fn lifecycle_through_the_handle() {
        let (factory, handle, _events, _task) = spawn(BridgeConfig::default());
        assert_eq!(handle.state().await, Ok(EngineState::Stopped));

        let params = StartParams::new(Environment::Tst, "nl", "dark");
        assert_eq!(handle.start_with(&params).await, Ok(true));
        assert_eq!(handle.state().await, Ok(EngineState::Running));
        assert_eq!(
            factory.entrypoint_args(),
            vec![vec![params.to_start_config().unwrap()]]
        );

        handle.stop_engine().await.unwrap();
        assert_eq!(handle.state().await, Ok(EngineState::Stopped));
        assert_eq!(factory.destroyed(), 1);
    }

    #[tokio::test]
    async fn cache_publishes_running_engine() {
        let factory = LoopbackFactory::new();
        let (sink, _events) = ChannelSink::new();
        let (bridge, handle) = Bridge::new(BridgeConfig::default(), factory, sink);
        let cache = bridge.cache();
        let _task = bridge.spawn();

        handle.start_engine("{}").await.unwrap();
        assert!(cache.contains(ENGINE_ID));
        handle.stop_engine().await.unwrap();
        assert!(!cache.contains(ENGINE_ID));
    }

    #[tokio::test]
    async fn shutdown_stops_engine_and_closes_handle() {
        let (factory, handle, _events, task) = spawn(BridgeConfig::default());
        handle.start_engine("{}").await.unwrap();
        handle.shutdown().unwrap();
        task.await.unwrap();

        assert_eq!(factory.destroyed(), 1);
        assert_eq!(handle.state().await, Err(BridgeError::ExecutorClosed));
        assert_eq!(
            handle.invoke_handover("startOnboarding", Payload::empty_map()).await,
            Err(BridgeError::ExecutorClosed)
        );
    }

    #[tokio::test]
    async fn engine_call_after_shutdown_is_answered() {
        let (_factory, handle, _events, task) = spawn(BridgeConfig::default());
        handle.shutdown().unwrap();
        task.await.unwrap();

        let (tx, rx) = oneshot::channel();
        handle.dispatch_engine_call(
            MethodCall::new("provideAccessToken", Payload::Null),
            MethodReply::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        assert_eq!(
            rx.await.unwrap(),
            MethodResult::from_error(&BridgeError::ExecutorClosed)
        );
    }

    #[tokio::test]
    async fn surface_is_laid_out_on_request() {
        let (factory, handle, _events, _task) = spawn(BridgeConfig::default());
        let surface = LoopbackSurface::new();
        handle.start_engine("{}").await.unwrap();
        handle.attach_surface(surface.clone()).unwrap();

        let engine = factory.current().unwrap();
        let answer = engine.request(&handle, "internalRequestLayout", Payload::Null).await;
        assert_eq!(answer, Some(MethodResult::Success(Payload::Null)));
        assert_eq!(surface.layouts(), 1);

        handle.detach_surface().unwrap();
        assert_eq!(handle.state().await, Ok(EngineState::Running));
        assert_eq!(surface.clears(), 1);
    }

    #[tokio::test]
    async fn exit_reaches_the_ui_side() {
        let (_factory, handle, mut events, _task) = spawn(BridgeConfig::default());
        handle.start_engine("{}").await.unwrap();
        handle.exit().unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.envelope.name, "exit");
        assert!(!event.envelope.expects_response());
    }

    #[tokio::test(start_paused = true)]
    async fn configured_timeout_expires_unanswered_handovers() {
        let config = BridgeConfig::from_toml_str("[handover]\nresponse_timeout_ms = 100").unwrap();
        let (factory, handle, mut events, _task) = spawn(config);
        handle.start_engine("{}").await.unwrap();
        let engine = factory.current().unwrap();

        let request = {
            let handle = handle.clone();
            tokio::spawn(async move {
                engine
                    .request(&handle, "provideAccessToken", Payload::empty_map())
                    .await
            })
        };
        let event = events.recv().await.unwrap();
        let id = event.envelope.correlation_id.unwrap();

        match request.await.unwrap() {
            Some(MethodResult::Error { code, .. }) => assert_eq!(code, "TIMED_OUT"),
            other => panic!("unexpected answer {other:?}"),
        }

        // A late answer is dropped quietly.
        handle
            .respond_to_event("invokeHandover", ResponseEnvelope::new(id, Payload::from("late")).to_payload())
            .unwrap();
        assert_eq!(handle.pending_handovers().await, Ok(0));
    }
}

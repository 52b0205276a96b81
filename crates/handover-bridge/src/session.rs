//! Engine lifecycle and host-to-engine calls.

use crate::completion::Completion;
use crate::config::EngineConfig;
use crate::engine::{Engine, EngineCache, EngineFactory, MethodCall, MethodReply, UiSurface};
use crate::responder::HandoverResponder;
use handover_core::{
    BridgeError, CHANGE_LANGUAGE_METHOD, CHANGE_THEME_MODE_METHOD, CorrelationId, EngineState,
    Payload,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Owns the single embedded engine and the responder answering its handovers.
///
/// Not thread-safe on purpose: the bridge executor is its only caller.
pub struct EngineSession {
    state: EngineState,
    engine: Option<Arc<dyn Engine>>,
    cache: EngineCache,
    factory: Box<dyn EngineFactory>,
    pub(crate) responder: Option<Box<dyn HandoverResponder>>,
    pub(crate) surface: Option<Box<dyn UiSurface>>,
    config: EngineConfig,
}

impl EngineSession {
    pub fn new(factory: impl EngineFactory + 'static, cache: EngineCache, config: EngineConfig) -> Self {
        Self {
            state: EngineState::Stopped,
            engine: None,
            cache,
            factory: Box::new(factory),
            responder: None,
            surface: None,
            config,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn cache(&self) -> &EngineCache {
        &self.cache
    }

    /// Handovers from the engine still waiting for the UI side.
    pub fn pending_handovers(&self) -> usize {
        self.responder.as_ref().map_or(0, |r| r.pending())
    }

    /// Start the engine with `start_config` as the entrypoint's only argument.
    ///
    /// Succeeds immediately when the engine is already up; the running
    /// responder is kept in that case. `library_uri` overrides the configured
    /// entrypoint library.
    pub fn start(
        &mut self,
        start_config: &str,
        responder: Box<dyn HandoverResponder>,
        library_uri: Option<String>,
        completion: Completion<bool>,
    ) {
        if matches!(self.state, EngineState::Running | EngineState::Starting) {
            tracing::debug!(state = ?self.state, "engine already started");
            completion.succeed(true);
            return;
        }

        self.state = EngineState::Starting;
        match self.launch(start_config, library_uri) {
            Ok(engine) => {
                self.cache.put(self.config.engine_id.as_str(), engine.clone());
                self.engine = Some(engine);
                self.responder = Some(responder);
                self.state = EngineState::Running;
                tracing::info!(engine_id = %self.config.engine_id, "engine running");
                completion.succeed(true);
            }
            Err(e) => {
                tracing::error!("engine failed to start: {}", e);
                self.state = EngineState::Stopped;
                completion.fail(e);
            }
        }
    }

    fn launch(&mut self, start_config: &str, library_uri: Option<String>) -> Result<Arc<dyn Engine>, BridgeError> {
        let engine = self.factory.create()?;

        if !self.factory.loader_initialized() {
            engine.destroy();
            return Err(BridgeError::LoaderNotInitialized);
        }

        if !engine.is_executing() {
            let mut entrypoint = self.config.entrypoint();
            if library_uri.is_some() {
                entrypoint.library_uri = library_uri;
            }
            tracing::debug!(function = %entrypoint.function, library = ?entrypoint.library_uri, "executing entrypoint");
            if let Err(e) = engine.execute_entrypoint(&entrypoint, vec![start_config.to_string()]) {
                engine.destroy();
                return Err(e);
            }
        }

        Ok(engine)
    }

    /// Tear the engine down. Every step is attempted; failures are logged.
    ///
    /// Handovers still awaiting the UI side are discarded with the responder;
    /// their completions never run.
    pub fn stop(&mut self) {
        // A surface may be attached without a running engine.
        self.detach_surface();

        if self.state == EngineState::Stopped && self.engine.is_none() {
            tracing::debug!("engine already stopped");
            return;
        }
        self.state = EngineState::Stopping;

        if let Some(engine) = self.engine.take() {
            engine.destroy();
        }
        self.cache.remove(&self.config.engine_id);

        if let Some(responder) = self.responder.take() {
            let discarded = responder.pending();
            if discarded > 0 {
                tracing::debug!(discarded, "discarding pending handovers");
            }
        }

        self.state = EngineState::Stopped;
        tracing::info!("engine stopped");
    }

    /// Call method `name` on the engine.
    ///
    /// Fails at once with [`BridgeError::NoEngine`] unless the engine runs.
    pub fn invoke_handover(&self, name: &str, data: Payload, completion: Completion<Payload>) {
        let engine = match (&self.engine, self.state) {
            (Some(engine), EngineState::Running) => engine,
            _ => {
                tracing::debug!(method = name, "no engine to invoke");
                completion.fail(BridgeError::NoEngine);
                return;
            }
        };

        // Shared between the reply and the send-failure path so only one fires.
        let slot = Arc::new(Mutex::new(Some(completion)));
        let reply_slot = slot.clone();
        let method = name.to_string();
        let reply = MethodReply::new(move |result| {
            let outcome = result.into_result(&method);
            if let Err(e) = &outcome {
                tracing::warn!(method = %method, "engine call failed: {}", e);
            }
            if let Some(completion) = reply_slot.lock().take() {
                completion.complete(outcome);
            }
        });

        tracing::debug!(method = name, "invoking engine method");
        if let Err(e) = engine.invoke_method(MethodCall::new(name, data), reply) {
            let error = match e {
                BridgeError::SendFailed(_) => e,
                other => BridgeError::SendFailed(other.to_string()),
            };
            tracing::warn!(method = name, "{}", error);
            if let Some(completion) = slot.lock().take() {
                completion.fail(error);
            }
        }
    }

    /// Switch the engine's language. A non-boolean answer counts as `false`.
    pub fn change_language(&self, language: &str, completion: Completion<bool>) {
        self.invoke_handover(
            CHANGE_LANGUAGE_METHOD,
            Payload::map([("language", language)]),
            completion.adapt(|reply: Payload| reply.as_bool().unwrap_or(false)),
        );
    }

    /// Switch the engine's theme mode. A non-boolean answer counts as `false`.
    pub fn change_theme_mode(&self, theme_mode: &str, completion: Completion<bool>) {
        self.invoke_handover(
            CHANGE_THEME_MODE_METHOD,
            Payload::map([("theme_mode", theme_mode)]),
            completion.adapt(|reply: Payload| reply.as_bool().unwrap_or(false)),
        );
    }

    /// Ask the UI side to close the engine's screen.
    pub fn request_exit(&mut self) {
        match self.responder.as_mut() {
            Some(responder) => responder.exit(),
            None => tracing::debug!("exit requested without a responder"),
        }
    }

    /// Route a response from the UI side to the call awaiting it.
    pub fn handle_response(&mut self, event_name: &str, payload: &Payload) -> bool {
        match self.responder.as_mut() {
            Some(responder) => responder.handle_response(event_name, payload),
            None => {
                tracing::debug!(event = event_name, "response dropped, no responder attached");
                false
            }
        }
    }

    pub fn expire_pending(&mut self, max_age: Duration) -> Vec<CorrelationId> {
        self.responder
            .as_mut()
            .map(|r| r.expire_pending(max_age))
            .unwrap_or_default()
    }

    /// Make `surface` the container shown and laid out for the engine.
    pub fn attach_surface(&mut self, surface: Box<dyn UiSurface>) {
        if self.surface.replace(surface).is_some() {
            tracing::debug!("replaced attached surface");
        }
    }

    pub fn detach_surface(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            if let Err(e) = surface.clear() {
                tracing::warn!("failed to clear surface: {}", e);
            }
        }
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::ChannelSink;
    use crate::engine::MethodResult;
    use crate::loopback::{LoopbackFactory, LoopbackSurface};
    use crate::responder::EventHandoverResponder;
    use handover_core::ENGINE_ID;

    fn session(factory: &LoopbackFactory) -> EngineSession {
        EngineSession::new(factory.clone(), EngineCache::new(), EngineConfig::default())
    }

    fn responder() -> Box<dyn HandoverResponder> {
        let (sink, _events) = ChannelSink::new();
        Box::new(EventHandoverResponder::new(sink))
    }

    #[tokio::test]
    async fn start_runs_entrypoint_with_start_config() {
        let factory = LoopbackFactory::new();
        let mut session = session(&factory);
        let (done, started) = Completion::channel();

        session.start(r#"{"environment":"MOCK"}"#, responder(), None, done);

        assert_eq!(started.await, Ok(true));
        assert_eq!(session.state(), EngineState::Running);
        assert!(session.cache().contains(ENGINE_ID));
        assert_eq!(factory.entrypoint_args(), vec![vec![r#"{"environment":"MOCK"}"#.to_string()]]);
    }

    #[tokio::test]
    async fn start_is_idempotent_while_running() {
        let factory = LoopbackFactory::new();
        let mut session = session(&factory);
        let (first, first_done) = Completion::channel();
        let (second, second_done) = Completion::channel();

        session.start("{}", responder(), None, first);
        session.start("{}", responder(), None, second);

        assert_eq!(first_done.await, Ok(true));
        assert_eq!(second_done.await, Ok(true));
        assert_eq!(factory.created(), 1);
    }

    #[tokio::test]
    async fn uninitialized_loader_fails_and_discards_engine() {
        let factory = LoopbackFactory::new();
        factory.set_loader_ready(false);
        let mut session = session(&factory);
        let (done, started) = Completion::channel();

        session.start("{}", responder(), None, done);

        assert_eq!(started.await, Err(BridgeError::LoaderNotInitialized));
        assert_eq!(session.state(), EngineState::Stopped);
        assert!(!session.cache().contains(ENGINE_ID));
        assert_eq!(factory.destroyed(), 1);
    }

    #[tokio::test]
    async fn library_uri_overrides_configured_entrypoint() {
        let factory = LoopbackFactory::new();
        let mut session = session(&factory);
        let (done, started) = Completion::channel();
        session.start("{}", responder(), Some("package:app/alt.dart".into()), done);
        started.await.unwrap();
        let entrypoint = factory.last_entrypoint().unwrap();
        assert_eq!(entrypoint.library_uri.as_deref(), Some("package:app/alt.dart"));
        assert_eq!(entrypoint.function, "main");
    }

    #[tokio::test]
    async fn invoke_while_stopped_fails_immediately() {
        let factory = LoopbackFactory::new();
        let session = session(&factory);
        let (done, result) = Completion::channel();
        session.invoke_handover("startOnboarding", Payload::empty_map(), done);
        assert_eq!(result.await, Err(BridgeError::NoEngine));
        assert_eq!(session.pending_handovers(), 0);
    }

    #[tokio::test]
    async fn engine_outcomes_map_to_results() {
        let factory = LoopbackFactory::new();
        factory.on_method(|call| match call.method.as_str() {
            "change_language" => Some(MethodResult::Success(Payload::from(true))),
            "change_theme_mode" => Some(MethodResult::Success(Payload::from("yes"))),
            "broken" => Some(MethodResult::Error {
                code: "E_STATE".into(),
                message: Some("bad state".into()),
                details: None,
            }),
            _ => Some(MethodResult::NotImplemented),
        });
        let mut session = session(&factory);
        let (done, started) = Completion::channel();
        session.start("{}", responder(), None, done);
        started.await.unwrap();

        let (done, language) = Completion::channel();
        session.change_language("nl", done);
        assert_eq!(language.await, Ok(true));
        assert_eq!(
            factory.calls().last().map(|c| c.arguments.clone()),
            Some(Payload::map([("language", "nl")]))
        );

        let (done, theme) = Completion::channel();
        session.change_theme_mode("dark", done);
        assert_eq!(theme.await, Ok(false));

        let (done, broken) = Completion::channel();
        session.invoke_handover("broken", Payload::empty_map(), done);
        assert_eq!(broken.await.unwrap_err().code(), "E_STATE");

        let (done, missing) = Completion::channel();
        session.invoke_handover("unknown", Payload::empty_map(), done);
        assert_eq!(missing.await, Err(BridgeError::NotImplemented("unknown".into())));
    }

    #[tokio::test]
    async fn synchronous_send_failure_is_reported_once() {
        let factory = LoopbackFactory::new();
        let mut session = session(&factory);
        let (done, started) = Completion::channel();
        session.start("{}", responder(), None, done);
        started.await.unwrap();

        factory.set_reject_calls(true);
        let (done, result) = Completion::channel();
        session.invoke_handover("startOnboarding", Payload::empty_map(), done);
        assert!(matches!(result.await, Err(BridgeError::SendFailed(_))));
    }

    #[tokio::test]
    async fn stop_tears_everything_down() {
        let factory = LoopbackFactory::new();
        let surface = LoopbackSurface::new();
        let mut session = session(&factory);
        let (done, started) = Completion::channel();
        session.start("{}", responder(), None, done);
        started.await.unwrap();
        session.attach_surface(Box::new(surface.clone()));

        session.stop();
        assert_eq!(session.state(), EngineState::Stopped);
        assert!(!session.cache().contains(ENGINE_ID));
        assert_eq!(factory.destroyed(), 1);
        assert_eq!(surface.clears(), 1);

        // Second stop is a no-op.
        session.stop();
        assert_eq!(factory.destroyed(), 1);
    }

    #[tokio::test]
    async fn stop_clears_surface_after_failed_start() {
        let factory = LoopbackFactory::new();
        factory.set_loader_ready(false);
        let surface = LoopbackSurface::new();
        let mut session = session(&factory);
        session.attach_surface(Box::new(surface.clone()));

        let (done, started) = Completion::channel();
        session.start("{}", responder(), None, done);
        assert_eq!(started.await, Err(BridgeError::LoaderNotInitialized));

        session.stop();
        assert_eq!(surface.clears(), 1);
        assert!(session.surface.is_none());
    }

    #[test]
    fn stop_clears_surface_attached_before_start() {
        let factory = LoopbackFactory::new();
        let surface = LoopbackSurface::new();
        let mut session = session(&factory);
        session.attach_surface(Box::new(surface.clone()));

        session.stop();
        assert_eq!(surface.clears(), 1);
        assert_eq!(factory.destroyed(), 0);
    }

    #[tokio::test]
    async fn surface_failure_does_not_block_stop() {
        let factory = LoopbackFactory::new();
        let surface = LoopbackSurface::failing();
        let mut session = session(&factory);
        let (done, started) = Completion::channel();
        session.start("{}", responder(), None, done);
        started.await.unwrap();
        session.attach_surface(Box::new(surface));

        session.stop();
        assert_eq!(session.state(), EngineState::Stopped);
        assert_eq!(factory.destroyed(), 1);
    }
}

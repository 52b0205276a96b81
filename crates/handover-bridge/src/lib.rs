//! Runtime side of the handover protocol.
//!
//! A host embeds a secondary engine and answers the handovers it requests.
//! The [`Bridge`] executor owns the engine's lifecycle; the host talks to it
//! through a [`BridgeHandle`]:
//!
//! - host to engine: `invoke_handover`, `change_language`, `change_theme_mode`
//! - engine to host: `dispatch_engine_call`, answered through the UI side's
//!   completable events ([`EventSink`] out, `respond_to_event` in)
//!
//! ```no_run
//! use handover_bridge::{Bridge, BridgeConfig, ChannelSink, LoopbackFactory};
//! use handover_core::{Environment, Payload, StartParams};
//!
//! # async fn demo() -> Result<(), handover_core::BridgeError> {
//! let (sink, _events) = ChannelSink::new();
//! let (bridge, handle) = Bridge::new(BridgeConfig::default(), LoopbackFactory::new(), sink);
//! bridge.spawn();
//!
//! handle.start_with(&StartParams::new(Environment::Mock, "en", "light")).await?;
//! let _reply = handle.invoke_handover("startOnboarding", Payload::empty_map()).await;
//! # Ok(())
//! # }
//! ```

mod bridge;
mod completion;
mod config;
mod dispatcher;
mod emitter;
mod engine;
mod loopback;
mod registry;
mod responder;
mod session;

pub use bridge::{Bridge, BridgeHandle};
pub use completion::{Completion, Pending};
pub use config::{BridgeConfig, ConfigError, EngineConfig, HandoverConfig};
pub use emitter::{ChannelSink, CompletableEmitter, EmittedEvent, EventSink};
pub use engine::{
    Engine, EngineCache, EngineFactory, Entrypoint, MethodCall, MethodReply, MethodResult, UiSurface,
};
pub use loopback::{LoopbackEngine, LoopbackFactory, LoopbackSurface};
pub use registry::{CorrelationRegistry, IdGenerator, PendingCall, UuidGenerator};
pub use responder::{EventHandoverResponder, HandoverResponder};
pub use session::EngineSession;

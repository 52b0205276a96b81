//! Core types for the handover protocol.
//!
//! This crate is the wire contract shared by every binding that talks to the
//! embedded engine: the closed set of handover names, the envelope shapes and
//! their field keys, the structured payload, and the error taxonomy. It does
//! no I/O; the runtime lives in `handover-bridge`.

mod envelope;
mod error;
mod kind;
mod payload;
mod start;

pub use envelope::{CorrelationId, Envelope, ResponseEnvelope};
pub use error::BridgeError;
pub use kind::{HandoverKind, HandoverKindParseError};
pub use payload::Payload;
pub use start::{Environment, StartParams};

/// Method channel shared with the engine.
pub const CHANNEL_NAME: &str = "flutter_embedding/embedding";

/// Cache key of the running engine.
pub const ENGINE_ID: &str = "flutter_embedding_engine";

/// Event name every outbound envelope is emitted under.
pub const INVOKE_HANDOVER_EVENT: &str = "invokeHandover";

/// Engine method handled locally as a layout fixup instead of a handover.
pub const INTERNAL_REQUEST_LAYOUT: &str = "internalRequestLayout";

/// Envelope key carrying the correlation id.
pub const COMPLETABLE_EVENT_UUID_KEY: &str = "_completable_event_uuid";

/// Envelope key carrying the request payload.
pub const COMPLETABLE_EVENT_REQUEST_KEY: &str = "_completable_event_request";

/// Envelope key carrying the response payload.
pub const COMPLETABLE_EVENT_RESPONSE_KEY: &str = "_completable_event_response";

/// Handover argument key that carries serialized message bytes.
pub const HANDOVER_DATA_KEY: &str = "data";

/// Host-to-engine method switching the UI language.
pub const CHANGE_LANGUAGE_METHOD: &str = "change_language";

/// Host-to-engine method switching the theme mode.
pub const CHANGE_THEME_MODE_METHOD: &str = "change_theme_mode";

/// Constants the UI-framework side needs verbatim, in export order.
///
/// Every handover name maps to itself, followed by the three envelope keys.
/// Both ends agree on these without a shared schema file.
pub fn exported_constants() -> Vec<(&'static str, &'static str)> {
    let mut constants: Vec<(&'static str, &'static str)> = HandoverKind::ALL
        .iter()
        .map(|kind| (kind.as_str(), kind.as_str()))
        .collect();
    constants.push(("COMPLETABLE_EVENT_UUID_KEY", COMPLETABLE_EVENT_UUID_KEY));
    constants.push(("COMPLETABLE_EVENT_REQUEST_KEY", COMPLETABLE_EVENT_REQUEST_KEY));
    constants.push(("COMPLETABLE_EVENT_RESPONSE_KEY", COMPLETABLE_EVENT_RESPONSE_KEY));
    constants
}

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// No engine exists.
    #[default]
    Stopped,
    /// Engine is being created and its entrypoint executed.
    Starting,
    /// Engine is cached and accepts method calls.
    Running,
    /// Teardown in progress.
    Stopping,
}

impl EngineState {
    /// Whether calls into the engine are accepted.
    pub fn is_running(&self) -> bool {
        matches!(self, EngineState::Running)
    }
}

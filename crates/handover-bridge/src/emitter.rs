//! Completable events: outbound handovers and their correlated responses.

use crate::completion::Completion;
use crate::registry::CorrelationRegistry;
use handover_core::{BridgeError, Envelope, INVOKE_HANDOVER_EVENT, Payload, ResponseEnvelope};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Outbound event primitive of the UI-framework side.
pub trait EventSink: Send + Sync {
    /// Hand `envelope` to the UI side under `event_name`.
    fn emit(&self, event_name: &str, envelope: Envelope) -> Result<(), BridgeError>;
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event_name: &str, envelope: Envelope) -> Result<(), BridgeError> {
        (**self).emit(event_name, envelope)
    }
}

/// An event as it leaves the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedEvent {
    pub event_name: String,
    pub envelope: Envelope,
}

/// Sink forwarding events into a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<EmittedEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EmittedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event_name: &str, envelope: Envelope) -> Result<(), BridgeError> {
        self.tx
            .send(EmittedEvent {
                event_name: event_name.to_string(),
                envelope,
            })
            .map_err(|_| BridgeError::SendFailed("event receiver closed".into()))
    }
}

/// Emits handovers and matches responses to the calls awaiting them.
pub struct CompletableEmitter<S> {
    sink: S,
    registry: CorrelationRegistry,
}

impl<S: EventSink> CompletableEmitter<S> {
    pub fn new(sink: S) -> Self {
        Self::with_registry(sink, CorrelationRegistry::new())
    }

    pub fn with_registry(sink: S, registry: CorrelationRegistry) -> Self {
        Self { sink, registry }
    }

    /// Emit handover `name`. With a completion the call is registered first and
    /// its id stamped into the envelope; without one nothing is registered.
    pub fn invoke_handover(&mut self, name: &str, data: Payload, completion: Option<Completion<Payload>>) {
        let Some(completion) = completion else {
            tracing::debug!(handover = name, "emitting notification");
            if let Err(e) = self.sink.emit(INVOKE_HANDOVER_EVENT, Envelope::notification(name, data)) {
                tracing::warn!(handover = name, "notification not delivered: {}", e);
            }
            return;
        };

        let id = self.registry.create(completion);
        tracing::debug!(handover = name, id = %id, "emitting request");
        let envelope = Envelope::request(name, data, id.clone());
        if let Err(e) = self.sink.emit(INVOKE_HANDOVER_EVENT, envelope) {
            tracing::warn!(handover = name, id = %id, "request not delivered: {}", e);
            self.registry.reject(id.as_str(), e);
        }
    }

    /// Resolve the call the response in `payload` answers.
    ///
    /// Unknown or missing ids are logged and dropped. Returns whether a pending
    /// call was completed.
    pub fn complete_event(&mut self, name: &str, payload: &Payload) -> bool {
        let response = ResponseEnvelope::from_payload(payload);
        let Some(id) = response.correlation_id else {
            tracing::debug!(event = name, "response without correlation id dropped");
            return false;
        };
        let resolved = self.registry.resolve(id.as_str(), response.response);
        if !resolved {
            tracing::debug!(event = name, id = %id, "response for unknown call dropped");
        }
        resolved
    }

    pub fn registry(&self) -> &CorrelationRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CorrelationRegistry {
        &mut self.registry
    }
}

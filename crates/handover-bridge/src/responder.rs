//! Host side of handovers requested by the engine.

use crate::completion::Completion;
use crate::emitter::{CompletableEmitter, EventSink};
use handover_core::{CorrelationId, HandoverKind, Payload};
use std::time::Duration;

/// Receives handovers from the engine and answers them.
pub trait HandoverResponder: Send {
    /// Fulfil handover `name`; `completion` receives the UI side's answer.
    fn invoke_handover(&mut self, name: &str, data: Payload, completion: Completion<Payload>);

    /// Tell the UI side the engine wants to close. Fire-and-forget.
    fn exit(&mut self);

    /// Response arriving from the UI side. Returns whether it completed a call.
    fn handle_response(&mut self, event_name: &str, response: &Payload) -> bool;

    /// Time out calls older than `max_age`.
    fn expire_pending(&mut self, max_age: Duration) -> Vec<CorrelationId>;

    /// Calls awaiting an answer.
    fn pending(&self) -> usize;
}

/// Responder that forwards handovers to the UI side as completable events.
pub struct EventHandoverResponder<S> {
    emitter: CompletableEmitter<S>,
}

impl<S: EventSink> EventHandoverResponder<S> {
    pub fn new(sink: S) -> Self {
        Self {
            emitter: CompletableEmitter::new(sink),
        }
    }

    pub fn with_emitter(emitter: CompletableEmitter<S>) -> Self {
        Self { emitter }
    }
}

impl<S: EventSink> HandoverResponder for EventHandoverResponder<S> {
    fn invoke_handover(&mut self, name: &str, data: Payload, completion: Completion<Payload>) {
        self.emitter.invoke_handover(name, data, Some(completion));
    }

    fn exit(&mut self) {
        self.emitter
            .invoke_handover(HandoverKind::Exit.as_str(), Payload::Null, None);
    }

    fn handle_response(&mut self, event_name: &str, response: &Payload) -> bool {
        self.emitter.complete_event(event_name, response)
    }

    fn expire_pending(&mut self, max_age: Duration) -> Vec<CorrelationId> {
        let expired = self.emitter.registry_mut().expire(max_age);
        for id in &expired {
            tracing::warn!(id = %id, "handover timed out");
        }
        expired
    }

    fn pending(&self) -> usize {
        self.emitter.registry().len()
    }
}

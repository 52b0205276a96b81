//! Method calls arriving from the engine.

use crate::completion::Completion;
use crate::engine::{MethodCall, MethodReply, MethodResult};
use crate::session::EngineSession;
use handover_core::{BridgeError, CHANNEL_NAME, INTERNAL_REQUEST_LAYOUT, Payload};

impl EngineSession {
    /// Handle a method call made by the engine on the embedding channel.
    ///
    /// `internalRequestLayout` is answered locally; every other method is a
    /// handover forwarded to the responder, whose answer becomes the reply.
    pub fn dispatch(&mut self, call: MethodCall, reply: MethodReply) {
        let MethodCall { method, arguments } = call;
        tracing::debug!(method = %method, "method call on {}", CHANNEL_NAME);

        if method == INTERNAL_REQUEST_LAYOUT {
            self.request_layout();
            reply.send(MethodResult::Success(Payload::Null));
            return;
        }

        let data = match arguments {
            Payload::Map(_) => arguments,
            Payload::Null => Payload::empty_map(),
            other => {
                let error = BridgeError::IllegalArguments(format!(
                    "{method} expects a map, got {}",
                    shape(&other)
                ));
                tracing::warn!("{}", error);
                reply.send(MethodResult::from_error(&error));
                return;
            }
        };

        let Some(responder) = self.responder.as_mut() else {
            tracing::debug!(method = %method, "no responder for engine handover");
            reply.send(MethodResult::from_error(&BridgeError::NoEngine));
            return;
        };

        let handover = method.clone();
        responder.invoke_handover(
            &method,
            data,
            Completion::from_fn(move |result| match result {
                Ok(value) => {
                    tracing::debug!(handover = %handover, "handover answered");
                    reply.send(MethodResult::Success(value));
                }
                Err(e) => {
                    tracing::warn!(handover = %handover, "handover failed: {}", e);
                    reply.send(MethodResult::from_error(&e));
                }
            }),
        );
    }

    fn request_layout(&mut self) {
        let laid_out = self
            .surface
            .as_mut()
            .is_some_and(|surface| surface.request_layout());
        if !laid_out {
            tracing::debug!("no surface to lay out");
        }
    }
}

fn shape(payload: &Payload) -> &'static str {
    match payload {
        Payload::Null => "null",
        Payload::Bool(_) => "bool",
        Payload::Int(_) | Payload::Float(_) => "number",
        Payload::String(_) => "string",
        Payload::Bytes(_) => "bytes",
        Payload::List(_) => "list",
        Payload::Map(_) => "map",
    }
}

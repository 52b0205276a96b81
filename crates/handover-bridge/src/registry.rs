//! Correlation registry: pending calls keyed by correlation id.

use crate::completion::Completion;
use handover_core::{BridgeError, CorrelationId, Payload};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Source of candidate correlation ids.
///
/// Candidates may repeat; the registry regenerates until it finds one that
/// is not pending.
pub trait IdGenerator: Send {
    fn generate(&mut self) -> CorrelationId;
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&mut self) -> CorrelationId {
        CorrelationId::new(Uuid::new_v4().to_string())
    }
}

impl<F> IdGenerator for F
where
    F: FnMut() -> CorrelationId + Send,
{
    fn generate(&mut self) -> CorrelationId {
        self()
    }
}

/// A call waiting for its response.
#[derive(Debug)]
pub struct PendingCall {
    pub id: CorrelationId,
    pub created: Instant,
    completion: Completion<Payload>,
}

/// Pending calls keyed by correlation id.
///
/// Every entry completes at most once: resolving, rejecting or expiring
/// removes it, and later attempts on the same id are no-ops.
pub struct CorrelationRegistry {
    pending: HashMap<CorrelationId, PendingCall>,
    ids: Box<dyn IdGenerator>,
}

impl Default for CorrelationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::with_generator(UuidGenerator)
    }

    pub fn with_generator(ids: impl IdGenerator + 'static) -> Self {
        Self {
            pending: HashMap::new(),
            ids: Box::new(ids),
        }
    }

    /// Store `completion` under a fresh id and return the id.
    pub fn create(&mut self, completion: Completion<Payload>) -> CorrelationId {
        let id = loop {
            let candidate = self.ids.generate();
            if !self.pending.contains_key(&candidate) {
                break candidate;
            }
            tracing::debug!(id = %candidate, "correlation id collision, regenerating");
        };
        self.pending.insert(
            id.clone(),
            PendingCall {
                id: id.clone(),
                created: Instant::now(),
                completion,
            },
        );
        tracing::debug!(id = %id, pending = self.pending.len(), "registered pending call");
        id
    }

    /// Complete the call `id` with `value`. Returns false for unknown ids.
    pub fn resolve(&mut self, id: &str, value: Payload) -> bool {
        match self.pending.remove(id) {
            Some(call) => {
                call.completion.succeed(value);
                true
            }
            None => false,
        }
    }

    /// Fail the call `id`. Returns false for unknown ids.
    pub fn reject(&mut self, id: &str, error: BridgeError) -> bool {
        match self.pending.remove(id) {
            Some(call) => {
                call.completion.fail(error);
                true
            }
            None => false,
        }
    }

    /// Fail every call older than `max_age` with [`BridgeError::TimedOut`].
    pub fn expire(&mut self, max_age: Duration) -> Vec<CorrelationId> {
        let now = Instant::now();
        let expired: Vec<CorrelationId> = self
            .pending
            .values()
            .filter(|call| now.duration_since(call.created) >= max_age)
            .map(|call| call.id.clone())
            .collect();
        for id in &expired {
            self.reject(id.as_str(), BridgeError::TimedOut(id.to_string()));
        }
        expired
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

//! Envelopes wrapping handover events.
//!
//! An outbound [`Envelope`] carries a correlation id only when the sender
//! expects an answer. The UI side echoes that id back inside a
//! [`ResponseEnvelope`].

use crate::{
    COMPLETABLE_EVENT_REQUEST_KEY, COMPLETABLE_EVENT_RESPONSE_KEY, COMPLETABLE_EVENT_UUID_KEY,
    BridgeError, Payload,
};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Opaque token linking a request to its response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CorrelationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Outbound event sent to the UI-framework side.
///
/// Deserializes through [`Payload`] so byte arrays decode the same way as in
/// [`Envelope::from_payload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Payload")]
pub struct Envelope {
    /// Handover name.
    pub name: String,
    #[serde(rename = "_completable_event_request", default)]
    pub request: Payload,
    /// Present only when a response is expected.
    #[serde(
        rename = "_completable_event_uuid",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub correlation_id: Option<CorrelationId>,
}

impl Envelope {
    /// A fire-and-forget notification.
    pub fn notification(name: impl Into<String>, request: Payload) -> Self {
        Self {
            name: name.into(),
            request,
            correlation_id: None,
        }
    }

    /// A request expecting a response under `id`.
    pub fn request(name: impl Into<String>, request: Payload, id: CorrelationId) -> Self {
        Self {
            name: name.into(),
            request,
            correlation_id: Some(id),
        }
    }

    pub fn expects_response(&self) -> bool {
        self.correlation_id.is_some()
    }

    /// The envelope as a payload map, the shape handed to the event primitive.
    pub fn to_payload(&self) -> Payload {
        let mut entries = vec![
            ("name", Payload::from(self.name.as_str())),
            (COMPLETABLE_EVENT_REQUEST_KEY, self.request.clone()),
        ];
        if let Some(id) = &self.correlation_id {
            entries.push((COMPLETABLE_EVENT_UUID_KEY, Payload::from(id.as_str())));
        }
        Payload::map(entries)
    }

    /// Read an envelope out of a payload map. The name is required.
    pub fn from_payload(payload: &Payload) -> Result<Self, BridgeError> {
        let name = payload
            .get("name")
            .and_then(Payload::as_str)
            .ok_or_else(|| BridgeError::IllegalArguments("envelope without a name".into()))?;
        let request = payload
            .get(COMPLETABLE_EVENT_REQUEST_KEY)
            .cloned()
            .unwrap_or_default();
        let correlation_id = match payload.get(COMPLETABLE_EVENT_UUID_KEY) {
            None | Some(Payload::Null) => None,
            Some(Payload::String(id)) => Some(CorrelationId::new(id.as_str())),
            Some(_) => {
                return Err(BridgeError::IllegalArguments(
                    "correlation id must be a string".into(),
                ));
            }
        };
        Ok(Self {
            name: name.to_string(),
            request,
            correlation_id,
        })
    }
}

impl TryFrom<Payload> for Envelope {
    type Error = BridgeError;

    fn try_from(payload: Payload) -> Result<Self, Self::Error> {
        Envelope::from_payload(&payload)
    }
}

/// Inbound answer from the UI-framework side.
///
/// Deserializes through [`ResponseEnvelope::from_payload`], so the response
/// value is decoded with the same byte handling on every path.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Payload")]
pub struct ResponseEnvelope {
    #[serde(rename = "_completable_event_uuid", default)]
    pub correlation_id: Option<CorrelationId>,
    #[serde(rename = "_completable_event_response", default)]
    pub response: Payload,
}

impl ResponseEnvelope {
    pub fn new(id: CorrelationId, response: Payload) -> Self {
        Self {
            correlation_id: Some(id),
            response,
        }
    }

    /// Read a response out of an arbitrary payload.
    ///
    /// Lenient: a missing or non-string id yields `None`, a missing response
    /// yields `Payload::Null`. Responses race with UI teardown, so a malformed
    /// answer is something to drop, not an error.
    pub fn from_payload(payload: &Payload) -> Self {
        let correlation_id = payload
            .get(COMPLETABLE_EVENT_UUID_KEY)
            .and_then(Payload::as_str)
            .map(CorrelationId::from);
        let response = payload
            .get(COMPLETABLE_EVENT_RESPONSE_KEY)
            .cloned()
            .unwrap_or_default();
        Self {
            correlation_id,
            response,
        }
    }

    pub fn to_payload(&self) -> Payload {
        let mut entries = vec![(COMPLETABLE_EVENT_RESPONSE_KEY, self.response.clone())];
        if let Some(id) = &self.correlation_id {
            entries.push((COMPLETABLE_EVENT_UUID_KEY, Payload::from(id.as_str())));
        }
        Payload::map(entries)
    }
}

impl From<Payload> for ResponseEnvelope {
    fn from(payload: Payload) -> Self {
        ResponseEnvelope::from_payload(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_envelope_uses_wire_keys() {
        let envelope = Envelope::request(
            "startOnboarding",
            Payload::map([("step", 1i64)]),
            CorrelationId::new("abc"),
        );
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            json,
            json!({
                "name": "startOnboarding",
                "_completable_event_request": { "step": 1 },
                "_completable_event_uuid": "abc"
            })
        );
        assert_eq!(Payload::from(json), envelope.to_payload());
    }

    #[test]
    fn notification_has_no_correlation_key() {
        let envelope = Envelope::notification("exit", Payload::Null);
        assert!(!envelope.expects_response());
        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json.get(COMPLETABLE_EVENT_UUID_KEY).is_none());
        assert!(envelope.to_payload().get(COMPLETABLE_EVENT_UUID_KEY).is_none());
    }

    #[test]
    fn response_from_payload_reads_id_and_value() {
        let payload = Payload::from(json!({
            "_completable_event_uuid": "abc",
            "_completable_event_response": { "ok": true }
        }));
        let response = ResponseEnvelope::from_payload(&payload);
        assert_eq!(response.correlation_id, Some(CorrelationId::new("abc")));
        assert_eq!(response.response.get("ok"), Some(&Payload::Bool(true)));
    }

    #[test]
    fn malformed_response_is_lenient() {
        let response = ResponseEnvelope::from_payload(&Payload::from(json!({
            "_completable_event_uuid": 42
        })));
        assert_eq!(response.correlation_id, None);
        assert!(response.response.is_null());

        let response = ResponseEnvelope::from_payload(&Payload::from("not a map"));
        assert_eq!(response, ResponseEnvelope::default());
    }

    #[test]
    fn deserialize_matches_payload_route() {
        let json = r#"{"_completable_event_uuid":"abc","_completable_event_response":[1,2,3]}"#;
        let direct: ResponseEnvelope = serde_json::from_str(json).unwrap();
        let via_payload = ResponseEnvelope::from_payload(&serde_json::from_str::<Payload>(json).unwrap());
        assert_eq!(direct, via_payload);
        assert_eq!(direct.response, Payload::Bytes(vec![1, 2, 3]));

        let json = r#"{"name":"receiveAnalyticsEvent","_completable_event_request":{"data":[-1,2]},"_completable_event_uuid":"id-2"}"#;
        let direct: Envelope = serde_json::from_str(json).unwrap();
        let via_payload = Envelope::from_payload(&serde_json::from_str::<Payload>(json).unwrap()).unwrap();
        assert_eq!(direct, via_payload);
        assert_eq!(direct.request.get("data"), Some(&Payload::Bytes(vec![255, 2])));
    }

    #[test]
    fn envelope_needs_a_name() {
        assert!(serde_json::from_str::<Envelope>(r#"{"_completable_event_request":{}}"#).is_err());
        let notification = Envelope::notification("exit", Payload::Null);
        assert_eq!(Envelope::from_payload(&notification.to_payload()), Ok(notification));
    }

    #[test]
    fn response_envelope_roundtrips_through_payload() {
        let original = ResponseEnvelope::new("id-1".into(), Payload::from("token"));
        assert_eq!(ResponseEnvelope::from_payload(&original.to_payload()), original);
    }
}

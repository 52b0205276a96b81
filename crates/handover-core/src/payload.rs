//! Structured values crossing the engine/host boundary.
//!
//! Both runtimes speak "map of any". `Payload` is the typed form of that value
//! on the Rust side, and the JSON conversion here is the only place the two
//! shapes meet.

use crate::{COMPLETABLE_EVENT_RESPONSE_KEY, HANDOVER_DATA_KEY};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Map keys whose numeric arrays are decoded as raw bytes.
const BYTE_ARRAY_KEYS: [&str; 2] = [HANDOVER_DATA_KEY, COMPLETABLE_EVENT_RESPONSE_KEY];

/// A value exchanged through handovers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Payload {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Raw bytes, e.g. a serialized protobuf message.
    Bytes(Vec<u8>),
    List(Vec<Payload>),
    Map(BTreeMap<String, Payload>),
}

impl Payload {
    /// An empty map.
    pub fn empty_map() -> Self {
        Payload::Map(BTreeMap::new())
    }

    /// Build a map from key/value pairs.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Payload>,
    {
        Payload::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Payload::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Payload::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Payload>> {
        match self {
            Payload::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a key when this is a map.
    pub fn get(&self, key: &str) -> Option<&Payload> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Convert from JSON, decoding byte arrays under the well-known keys.
    ///
    /// Elements may be signed (`-128..=-1`, as produced by JVM byte arrays) or
    /// unsigned (`0..=255`); signed values wrap. An array with any other
    /// element stays a list.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Payload::Null,
            Value::Bool(b) => Payload::Bool(b),
            Value::Number(n) => number_to_payload(&n),
            Value::String(s) => Payload::String(s),
            Value::Array(items) => Payload::List(items.into_iter().map(Payload::from_json).collect()),
            Value::Object(map) => Payload::Map(
                map.into_iter()
                    .map(|(key, value)| {
                        let payload = if BYTE_ARRAY_KEYS.contains(&key.as_str()) {
                            bytes_from_json(&value).unwrap_or_else(|| Payload::from_json(value))
                        } else {
                            Payload::from_json(value)
                        };
                        (key, payload)
                    })
                    .collect(),
            ),
        }
    }

    /// Convert to JSON. Bytes become an array of unsigned numbers.
    pub fn into_json(self) -> Value {
        match self {
            Payload::Null => Value::Null,
            Payload::Bool(b) => Value::Bool(b),
            Payload::Int(i) => Value::Number(i.into()),
            Payload::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
            Payload::String(s) => Value::String(s),
            Payload::Bytes(bytes) => Value::Array(bytes.into_iter().map(Value::from).collect()),
            Payload::List(items) => Value::Array(items.into_iter().map(Payload::into_json).collect()),
            Payload::Map(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, v.into_json()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

fn number_to_payload(n: &Number) -> Payload {
    if let Some(i) = n.as_i64() {
        Payload::Int(i)
    } else {
        // u64 beyond i64::MAX or a real float.
        Payload::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn bytes_from_json(value: &Value) -> Option<Payload> {
    let items = value.as_array()?;
    items
        .iter()
        .map(|item| {
            let n = item.as_i64()?;
            match n {
                0..=255 => Some(n as u8),
                -128..=-1 => Some(n as i8 as u8),
                _ => None,
            }
        })
        .collect::<Option<Vec<u8>>>()
        .map(Payload::Bytes)
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::from_json(value)
    }
}

impl From<Payload> for Value {
    fn from(payload: Payload) -> Self {
        payload.into_json()
    }
}

impl From<bool> for Payload {
    fn from(b: bool) -> Self {
        Payload::Bool(b)
    }
}

impl From<i64> for Payload {
    fn from(i: i64) -> Self {
        Payload::Int(i)
    }
}

impl From<f64> for Payload {
    fn from(f: f64) -> Self {
        Payload::Float(f)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::String(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::String(s)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(value: Option<T>) -> Self {
        value.map_or(Payload::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_json_keeps_shape() {
        let payload = Payload::from_json(json!({
            "step": 1,
            "ratio": 0.5,
            "tags": ["a", null, true],
            "inner": { "ok": false }
        }));
        assert_eq!(payload.get("step"), Some(&Payload::Int(1)));
        assert_eq!(payload.get("ratio"), Some(&Payload::Float(0.5)));
        assert_eq!(
            payload.get("tags"),
            Some(&Payload::List(vec!["a".into(), Payload::Null, true.into()]))
        );
        assert_eq!(payload.get("inner").and_then(|i| i.get("ok")), Some(&Payload::Bool(false)));
    }

    #[test]
    fn byte_keys_decode_signed_and_unsigned_arrays() {
        let payload = Payload::from_json(json!({
            "data": [8, -1, 200],
            "_completable_event_response": [1, 2, 3],
        }));
        assert_eq!(payload.get("data").and_then(Payload::as_bytes), Some(&[8u8, 255, 200][..]));
        assert_eq!(
            payload.get(COMPLETABLE_EVENT_RESPONSE_KEY).and_then(Payload::as_bytes),
            Some(&[1u8, 2, 3][..])
        );
    }

    #[test]
    fn other_keys_and_out_of_range_arrays_stay_lists() {
        let payload = Payload::from_json(json!({
            "numbers": [1, 2, 3],
            "data": [1, 300],
        }));
        assert!(matches!(payload.get("numbers"), Some(Payload::List(_))));
        assert_eq!(
            payload.get("data"),
            Some(&Payload::List(vec![Payload::Int(1), Payload::Int(300)]))
        );
    }

    #[test]
    fn non_array_under_byte_key_is_converted_normally() {
        let payload = Payload::from_json(json!({ "data": { "method": "get" } }));
        assert_eq!(payload.get("data").and_then(|d| d.get("method")), Some(&"get".into()));
    }

    #[test]
    fn bytes_serialize_as_unsigned_numbers() {
        let payload = Payload::map([("data", Payload::Bytes(vec![0, 255]))]);
        assert_eq!(serde_json::to_value(&payload).unwrap(), json!({ "data": [0, 255] }));
    }

    #[test]
    fn deserialize_goes_through_byte_aware_conversion() {
        let payload: Payload = serde_json::from_str(r#"{"data":[104,105]}"#).unwrap();
        assert_eq!(payload.get("data"), Some(&Payload::Bytes(b"hi".to_vec())));
    }

    #[test]
    fn non_finite_float_becomes_null() {
        assert_eq!(Payload::Float(f64::INFINITY).into_json(), Value::Null);
    }
}

//! JSON message bodies.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::QueueResult;

/// Serialize a record into a message body.
pub fn encode<T: Serialize>(value: &T) -> QueueResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Parse a message body into a record.
pub fn decode<T: DeserializeOwned>(body: &str) -> QueueResult<T> {
    Ok(serde_json::from_str(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QueueError;

    #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
    struct Ping {
        id: String,
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode::<Ping>("not json").unwrap_err();
        assert!(matches!(err, QueueError::Codec(_)));
    }

    #[test]
    fn encode_is_plain_json() {
        let body = encode(&Ping { id: "abc".into() }).unwrap();
        assert_eq!(body, r#"{"id":"abc"}"#);
    }
}

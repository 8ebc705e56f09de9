use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{AtriumError, Result};

pub const MESSAGE_TYPE_FIELD: &str = "messageType";
const LEGACY_MESSAGE_TYPE_FIELD: &str = "message_type";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    #[serde(alias = "message_type")]
    pub message_type: String,
    #[serde(default, alias = "body_data_type")]
    pub body_data_type: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, alias = "sender_pid", alias = "sender_id")]
    pub sender_id: Value,
    #[serde(default)]
    pub body: Value,
}

impl MessageEnvelope {
    pub fn new(
        message_type: impl Into<String>,
        body_data_type: impl Into<String>,
        sender_id: impl Into<Value>,
        body: Value,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            body_data_type: body_data_type.into(),
            timestamp: current_timestamp(),
            sender_id: sender_id.into(),
            body,
        }
    }

    pub fn has_sender(&self) -> bool {
        !self.sender_id.is_null()
    }
}

pub fn current_timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

pub fn decode(bytes: &[u8]) -> Result<MessageEnvelope> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| AtriumError::MalformedEnvelope(e.to_string()))?;
    let fields = value
        .as_object()
        .ok_or_else(|| AtriumError::MalformedEnvelope("envelope is not an object".to_string()))?;

    match fields
        .get(MESSAGE_TYPE_FIELD)
        .or_else(|| fields.get(LEGACY_MESSAGE_TYPE_FIELD))
    {
        None | Some(Value::Null) => {
            return Err(AtriumError::MissingRequiredField(
                MESSAGE_TYPE_FIELD.to_string(),
            ))
        }
        Some(Value::String(name)) if name.trim().is_empty() => {
            return Err(AtriumError::MissingRequiredField(
                MESSAGE_TYPE_FIELD.to_string(),
            ))
        }
        Some(Value::String(_)) => {}
        Some(other) => {
            return Err(AtriumError::MalformedEnvelope(format!(
                "{MESSAGE_TYPE_FIELD} must be a string, got {other}"
            )))
        }
    }

    serde_json::from_value(value).map_err(|e| AtriumError::MalformedEnvelope(e.to_string()))
}

pub fn encode(envelope: &MessageEnvelope) -> Vec<u8> {
    // strings and Values only; serde_json cannot fail here
    serde_json::to_vec(envelope).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_camel_case_envelope() {
        let raw = br#"{"messageType":"test","bodyDataType":"text/plain","timestamp":"t0","senderId":1,"body":"hi"}"#;
        let envelope = decode(raw).unwrap();
        assert_eq!(envelope.message_type, "test");
        assert_eq!(envelope.body_data_type, "text/plain");
        assert_eq!(envelope.timestamp, "t0");
        assert_eq!(envelope.sender_id, json!(1));
        assert_eq!(envelope.body, json!("hi"));
    }

    #[test]
    fn accepts_legacy_snake_case_fields() {
        let raw = json!({
            "message_type": "test",
            "body_data_type": "text/plain",
            "timestamp": "2024-01-01T00:00:00",
            "sender_pid": 4242,
            "body": "connecting to user 7"
        })
        .to_string();
        let envelope = decode(raw.as_bytes()).unwrap();
        assert_eq!(envelope.message_type, "test");
        assert_eq!(envelope.sender_id, json!(4242));
    }

    #[test]
    fn optional_fields_default() {
        let envelope = decode(br#"{"messageType":"bare"}"#).unwrap();
        assert_eq!(envelope.body_data_type, "");
        assert!(!envelope.has_sender());
        assert!(envelope.body.is_null());
    }

    #[test]
    fn missing_or_empty_type_is_rejected() {
        for raw in [
            r#"{"bodyDataType":"x"}"#,
            r#"{"messageType":""}"#,
            r#"{"messageType":"   "}"#,
            r#"{"messageType":null}"#,
        ] {
            let err = decode(raw.as_bytes()).unwrap_err();
            assert!(
                matches!(&err, AtriumError::MissingRequiredField(f) if f == "messageType"),
                "{raw}: {err}"
            );
        }
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        let cases: [&[u8]; 5] = [
            b"not json",
            b"[1,2,3]",
            b"\"text\"",
            br#"{"messageType":5}"#,
            b"",
        ];
        for raw in cases {
            let err = decode(raw).unwrap_err();
            assert!(matches!(err, AtriumError::MalformedEnvelope(_)));
        }
    }

    #[test]
    fn encode_uses_wire_field_names() {
        let envelope = MessageEnvelope::new("status", "application/json", "node-1", json!({"ok": true}));
        let value: Value = serde_json::from_slice(&encode(&envelope)).unwrap();
        assert_eq!(value["messageType"], "status");
        assert_eq!(value["bodyDataType"], "application/json");
        assert_eq!(value["senderId"], "node-1");
        assert_eq!(value["body"]["ok"], true);
        assert!(!envelope.timestamp.is_empty());
        assert_eq!(decode(&encode(&envelope)).unwrap(), envelope);
    }
}

//! Cross-Context Messages
//!
//! The envelope exchanged between the embedded surface and its host:
//! `{ "type": "payment_success" | "payment_failed" | "close_modal", "data"?: object }`.
//! The tag set is closed. Anything else is a protocol error, which receivers
//! discard without surfacing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CheckoutError, FailurePayload, Result};
use crate::payment::PaymentRecord;

/// Tagged union carried over the cross-context channel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrossContextMessage {
    PaymentSuccess {
        #[serde(default)]
        data: Value,
    },
    PaymentFailed {
        #[serde(default)]
        data: Value,
    },
    CloseModal {},
}

impl CrossContextMessage {
    pub fn payment_success(record: &PaymentRecord) -> Result<Self> {
        Ok(CrossContextMessage::PaymentSuccess {
            data: serde_json::to_value(record)?,
        })
    }

    pub fn payment_failed(failure: &FailurePayload) -> Result<Self> {
        Ok(CrossContextMessage::PaymentFailed {
            data: serde_json::to_value(failure)?,
        })
    }

    pub fn close_modal() -> Self {
        CrossContextMessage::CloseModal {}
    }

    /// Wire tag of this message
    pub fn kind(&self) -> &'static str {
        match self {
            CrossContextMessage::PaymentSuccess { .. } => "payment_success",
            CrossContextMessage::PaymentFailed { .. } => "payment_failed",
            CrossContextMessage::CloseModal {} => "close_modal",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, CrossContextMessage::CloseModal {})
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode a received envelope
    ///
    /// Senders that stringify the envelope are accepted too.
    pub fn decode(raw: &Value) -> Result<Self> {
        let parsed;
        let envelope = match raw {
            Value::String(text) => {
                parsed = serde_json::from_str::<Value>(text)
                    .map_err(|e| CheckoutError::Protocol(format!("unparseable envelope: {e}")))?;
                &parsed
            }
            other => other,
        };

        if !envelope.is_object() {
            return Err(CheckoutError::Protocol("envelope is not an object".into()));
        }

        CrossContextMessage::deserialize(envelope)
            .map_err(|e| CheckoutError::Protocol(format!("unrecognized envelope: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let msg = CrossContextMessage::payment_success(&PaymentRecord::pending("p1")).unwrap();
        let value = msg.to_value().unwrap();
        assert_eq!(value["type"], "payment_success");
        assert_eq!(value["data"]["id"], "p1");

        let close = CrossContextMessage::close_modal().to_value().unwrap();
        assert_eq!(close, json!({"type": "close_modal"}));
    }

    #[test]
    fn test_decode_known_tags() {
        let msg = CrossContextMessage::decode(&json!({"type": "payment_failed", "data": {"code": "X"}}))
            .unwrap();
        assert_eq!(msg.kind(), "payment_failed");

        let msg = CrossContextMessage::decode(&json!({"type": "close_modal", "data": {}})).unwrap();
        assert_eq!(msg, CrossContextMessage::close_modal());

        let msg = CrossContextMessage::decode(&json!({"type": "payment_success"})).unwrap();
        assert_eq!(msg, CrossContextMessage::PaymentSuccess { data: Value::Null });
    }

    #[test]
    fn test_decode_stringified_envelope() {
        let raw = Value::String(r#"{"type":"close_modal"}"#.into());
        assert!(CrossContextMessage::decode(&raw).is_ok());
    }

    #[test]
    fn test_unknown_or_malformed_is_protocol_error() {
        for raw in [
            json!({"type": "payment_refunded"}),
            json!({"data": {}}),
            json!("not json"),
            json!(42),
            json!(null),
        ] {
            let err = CrossContextMessage::decode(&raw).unwrap_err();
            assert!(matches!(err, CheckoutError::Protocol(_)), "{raw}");
        }
    }
}

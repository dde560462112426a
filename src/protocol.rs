//! Typed wire messages for the signaling relay.
//!
//! Every message is a JSON object tagged by `type`. The negotiation
//! payloads (`offer`, `answer`, `candidate`) are opaque JSON values; the
//! relay forwards them without interpretation. Forwarded messages carry
//! `fromUserId`, serialized as `null` when the sender never registered.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message on the relay wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SignalMessage {
    /// Endpoint → relay: bind an identity to this connection.
    #[serde(rename = "register")]
    Register {
        #[serde(rename = "userId")]
        user_id: String,
    },

    /// Relay → endpoint: registration acknowledgment.
    #[serde(rename = "registered")]
    Registered {
        #[serde(rename = "userId")]
        user_id: String,
    },

    /// Session offer. Inbound copies carry `targetUserId`; forwarded
    /// copies drop it and carry `fromUserId` instead.
    #[serde(rename = "offer")]
    Offer {
        #[serde(
            rename = "targetUserId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        target_user_id: Option<String>,
        #[serde(default)]
        offer: Value,
        #[serde(rename = "fromUserId", default)]
        from_user_id: Option<String>,
    },

    /// Session answer, routed like an offer.
    #[serde(rename = "answer")]
    Answer {
        #[serde(
            rename = "targetUserId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        target_user_id: Option<String>,
        #[serde(default)]
        answer: Value,
        #[serde(rename = "fromUserId", default)]
        from_user_id: Option<String>,
    },

    /// Network-path candidate, routed like an offer.
    #[serde(rename = "ice-candidate")]
    IceCandidate {
        #[serde(
            rename = "targetUserId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        target_user_id: Option<String>,
        #[serde(default)]
        candidate: Value,
        #[serde(rename = "fromUserId", default)]
        from_user_id: Option<String>,
    },

    /// Call teardown notice, routed like an offer but payload-free.
    #[serde(rename = "end-call")]
    EndCall {
        #[serde(
            rename = "targetUserId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        target_user_id: Option<String>,
        #[serde(rename = "fromUserId", default)]
        from_user_id: Option<String>,
    },

    /// Relay → endpoint: routing failure report.
    #[serde(rename = "error")]
    Error { message: String },
}

impl SignalMessage {
    /// Build an error reply.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Message type tag, for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Registered { .. } => "registered",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::EndCall { .. } => "end-call",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_roundtrip() {
        let msg = SignalMessage::Register {
            user_id: "alice".to_string(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"type": "register", "userId": "alice"}));

        let decoded: SignalMessage = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn inbound_offer_parses_without_sender_field() {
        let decoded: SignalMessage = serde_json::from_str(
            r#"{"type": "offer", "targetUserId": "bob", "offer": {"sdp": "v=0"}}"#,
        )
        .unwrap();

        assert_eq!(
            decoded,
            SignalMessage::Offer {
                target_user_id: Some("bob".to_string()),
                offer: json!({"sdp": "v=0"}),
                from_user_id: None,
            }
        );
    }

    #[test]
    fn forwarded_offer_wire_shape() {
        let msg = SignalMessage::Offer {
            target_user_id: None,
            offer: json!({"sdp": "v=0"}),
            from_user_id: Some("alice".to_string()),
        };
        let value = serde_json::to_value(&msg).unwrap();

        // Forwarded form: payload + fromUserId, no targetUserId.
        assert_eq!(
            value,
            json!({"type": "offer", "offer": {"sdp": "v=0"}, "fromUserId": "alice"})
        );
    }

    #[test]
    fn unregistered_sender_serializes_as_null() {
        let msg = SignalMessage::IceCandidate {
            target_user_id: None,
            candidate: json!({"candidate": "host 10.0.0.1"}),
            from_user_id: None,
        };
        let value = serde_json::to_value(&msg).unwrap();

        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("fromUserId"));
        assert_eq!(obj["fromUserId"], Value::Null);
        assert!(!obj.contains_key("targetUserId"));
    }

    #[test]
    fn missing_payload_defaults_to_null() {
        let decoded: SignalMessage =
            serde_json::from_str(r#"{"type": "offer", "targetUserId": "bob"}"#).unwrap();
        match decoded {
            SignalMessage::Offer { offer, .. } => assert_eq!(offer, Value::Null),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn hyphenated_type_tags() {
        let end_call = SignalMessage::EndCall {
            target_user_id: None,
            from_user_id: Some("alice".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&end_call).unwrap()["type"],
            json!("end-call")
        );

        let decoded: SignalMessage = serde_json::from_str(
            r#"{"type": "ice-candidate", "targetUserId": "bob", "candidate": "c"}"#,
        )
        .unwrap();
        assert_eq!(decoded.type_name(), "ice-candidate");
    }

    #[test]
    fn unknown_type_is_a_decode_error() {
        assert!(serde_json::from_str::<SignalMessage>(r#"{"type": "hangup"}"#).is_err());
        assert!(serde_json::from_str::<SignalMessage>(r#"{"userId": "alice"}"#).is_err());
    }
}

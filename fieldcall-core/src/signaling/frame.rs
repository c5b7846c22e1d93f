use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{FieldcallError, FieldcallResult};
use crate::models::{Message, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Offer => write!(f, "offer"),
            SignalKind::Answer => write!(f, "answer"),
            SignalKind::IceCandidate => write!(f, "ice_candidate"),
        }
    }
}

/// One JSON frame on the consultation channel, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelFrame {
    UserJoined {
        user_id: String,
        #[serde(default)]
        user_name: String,
        #[serde(default)]
        role: Option<Role>,
    },
    WebrtcSignal {
        signal_type: SignalKind,
        signal_data: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<String>,
    },
    NewMessage {
        message: Message,
    },
}

impl ChannelFrame {
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelFrame::UserJoined { .. } => "user_joined",
            ChannelFrame::WebrtcSignal { .. } => "webrtc_signal",
            ChannelFrame::NewMessage { .. } => "new_message",
        }
    }

    pub fn encode(&self) -> FieldcallResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Malformed or unknown frames are signaling errors, not transport ones.
    pub fn decode(text: &str) -> FieldcallResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| FieldcallError::SignalingError(format!("malformed frame: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_frame_wire_shape() {
        let frame = ChannelFrame::WebrtcSignal {
            signal_type: SignalKind::IceCandidate,
            signal_data: serde_json::json!({"candidate": "candidate:1"}),
            sender_id: Some("f-1".to_string()),
        };

        let value: serde_json::Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "webrtc_signal");
        assert_eq!(value["signal_type"], "ice_candidate");
        assert_eq!(value["sender_id"], "f-1");
    }

    #[test]
    fn test_decode_service_frames() {
        let frame = ChannelFrame::decode(
            r#"{"type":"webrtc_signal","signal_type":"offer","signal_data":{"type":"offer","sdp":"v=0"}}"#,
        )
        .unwrap();
        assert!(matches!(
            frame,
            ChannelFrame::WebrtcSignal {
                signal_type: SignalKind::Offer,
                sender_id: None,
                ..
            }
        ));

        let frame = ChannelFrame::decode(
            r#"{"type":"new_message","message":{"session_id":"s1","sender_role":"farmer","sender_name":"Ravi","message_text":"hi","timestamp":"2024-03-01T10:00:00"}}"#,
        )
        .unwrap();
        assert_eq!(frame.kind(), "new_message");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = ChannelFrame::decode("{\"type\":\"dance\"}").unwrap_err();
        assert!(err.is_signaling_error());
        assert!(!err.forces_transition());

        assert!(ChannelFrame::decode("not json").is_err());
    }
}

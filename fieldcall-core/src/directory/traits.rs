use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FieldcallResult;
use crate::models::{ActiveCall, ChatSession, Message, Responder, Urgency, VideoRequest};
use crate::signaling::SignalKind;

/// Body of a new video request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDraft {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub urgency: Urgency,
}

/// Room handed out when a video call starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRoom {
    #[serde(default)]
    pub room_id: Option<String>,
}

/// Identifiers handed out when a direct chat starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatStart {
    pub session_id: String,
    #[serde(default)]
    pub room_id: Option<String>,
}

/// Body of an outgoing chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub message_type: String,
    pub message_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>, client_message_id: Option<String>) -> Self {
        Self {
            message_type: "text".to_string(),
            message_text: text.into(),
            client_message_id,
        }
    }
}

/// Body of an outbound negotiation signal. The service pushes it to the
/// other participant as a `webrtc_signal` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingSignal {
    pub signal_type: SignalKind,
    pub signal_data: serde_json::Value,
}

/// Request/response access to the consultation service. Implementations
/// hold no session state; every failure maps to a network-category
/// [`crate::FieldcallError`].
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn list_responders(&self) -> FieldcallResult<Vec<Responder>>;

    /// Requests waiting for the calling responder.
    async fn list_pending_requests(&self) -> FieldcallResult<Vec<VideoRequest>>;

    /// Requests created by the calling requester.
    async fn list_own_requests(&self) -> FieldcallResult<Vec<VideoRequest>>;

    async fn list_active_calls(&self) -> FieldcallResult<Vec<ActiveCall>>;

    async fn list_chats(&self) -> FieldcallResult<Vec<ChatSession>>;

    async fn create_request(
        &self,
        responder_id: &str,
        draft: &RequestDraft,
    ) -> FieldcallResult<VideoRequest>;

    async fn accept_request(&self, request_id: &str) -> FieldcallResult<()>;

    async fn start_call(&self, request_id: &str) -> FieldcallResult<CallRoom>;

    async fn start_chat(&self, responder_id: &str, topic: &str) -> FieldcallResult<ChatStart>;

    async fn end_session(&self, session_id: &str) -> FieldcallResult<()>;

    async fn send_message(
        &self,
        session_id: &str,
        message: &OutgoingMessage,
    ) -> FieldcallResult<()>;

    async fn list_messages(&self, session_id: &str) -> FieldcallResult<Vec<Message>>;

    async fn send_signal(&self, session_id: &str, signal: &OutgoingSignal) -> FieldcallResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_body_shape() {
        let draft = RequestDraft {
            topic: "pest".to_string(),
            description: None,
            urgency: Urgency::High,
        };
        let body = serde_json::to_value(&draft).unwrap();
        assert_eq!(body, serde_json::json!({"topic": "pest", "urgency": "high"}));
    }

    #[test]
    fn test_outgoing_message_body_shape() {
        let body =
            serde_json::to_value(OutgoingMessage::text("hello", Some("c-1".to_string()))).unwrap();
        assert_eq!(body["message_type"], "text");
        assert_eq!(body["message_text"], "hello");
        assert_eq!(body["client_message_id"], "c-1");
    }

    #[test]
    fn test_outgoing_signal_body_shape() {
        let signal = OutgoingSignal {
            signal_type: SignalKind::IceCandidate,
            signal_data: serde_json::json!({"candidate": "c1"}),
        };
        assert_eq!(
            serde_json::to_value(&signal).unwrap(),
            serde_json::json!({
                "signal_type": "ice_candidate",
                "signal_data": {"candidate": "c1"}
            })
        );
    }
}

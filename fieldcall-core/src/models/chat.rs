use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity::{Counterpart, Identity, Role};
use super::timestamp;

/// A direct chat thread between a farmer (participant a) and a specialist
/// (participant b).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    #[serde(alias = "_id")]
    pub id: String,

    #[serde(default)]
    pub room_id: Option<String>,

    #[serde(alias = "farmer_id", default)]
    pub participant_a: String,

    #[serde(alias = "farmer_name", default)]
    pub participant_a_name: String,

    #[serde(alias = "specialist_id", default)]
    pub participant_b: String,

    #[serde(alias = "specialist_name", default)]
    pub participant_b_name: String,

    #[serde(default)]
    pub topic: String,

    #[serde(with = "timestamp", default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(alias = "last_message_text", default)]
    pub last_message: Option<String>,

    #[serde(default)]
    pub unread_count: u32,
}

impl ChatSession {
    /// The participant that is not `me`.
    pub fn counterpart_for(&self, me: &Identity) -> Counterpart {
        match me.role {
            Role::Requester => Counterpart::new(&self.participant_b, &self.participant_b_name),
            Role::Responder => Counterpart::new(&self.participant_a, &self.participant_a_name),
        }
    }
}

/// Delivery state of a chat message as seen by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Optimistic local echo, not yet confirmed by the service.
    Pending,
    #[default]
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(alias = "_id", default)]
    pub id: Option<String>,

    /// Client-generated key used to match a server copy to its local echo.
    #[serde(default)]
    pub client_message_id: Option<String>,

    #[serde(default)]
    pub session_id: String,

    #[serde(default)]
    pub sender_id: String,

    pub sender_role: Role,

    #[serde(default)]
    pub sender_name: String,

    #[serde(rename = "message_text", alias = "text", default)]
    pub text: String,

    #[serde(with = "timestamp", default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub delivery: Delivery,
}

impl Message {
    /// Builds the optimistic echo shown before the service confirms the send.
    pub fn local_echo(session_id: &str, me: &Identity, text: &str) -> Self {
        Self {
            id: None,
            client_message_id: Some(Uuid::new_v4().to_string()),
            session_id: session_id.to_string(),
            sender_id: me.user_id.clone(),
            sender_role: me.role,
            sender_name: me.display_name.clone(),
            text: text.to_string(),
            timestamp: Utc::now(),
            delivery: Delivery::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.delivery == Delivery::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_echo_is_pending_with_client_id() {
        let me = Identity::new("f-1", "Ravi", Role::Requester);
        let echo = Message::local_echo("s-1", &me, "hello");

        assert!(echo.is_pending());
        assert_eq!(echo.sender_role, Role::Requester);
        assert_eq!(echo.sender_name, "Ravi");
        assert!(echo.client_message_id.is_some());
        assert!(echo.id.is_none());
    }

    #[test]
    fn test_message_from_service_payload() {
        let message: Message = serde_json::from_value(serde_json::json!({
            "_id": "m1",
            "session_id": "s-1",
            "sender_id": "s-7",
            "sender_name": "Dr. Rao",
            "sender_role": "specialist",
            "message_type": "text",
            "message_text": "spray neem oil",
            "timestamp": "2024-03-01T10:15:00"
        }))
        .unwrap();

        assert_eq!(message.id.as_deref(), Some("m1"));
        assert_eq!(message.text, "spray neem oil");
        assert_eq!(message.delivery, Delivery::Confirmed);
        assert!(message.client_message_id.is_none());
    }

    #[test]
    fn test_chat_counterpart() {
        let chat: ChatSession = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "farmer_id": "f-1",
            "farmer_name": "Ravi",
            "specialist_id": "s-7",
            "specialist_name": "Dr. Rao",
            "topic": "soil",
            "last_message_text": "ok"
        }))
        .unwrap();

        let farmer = Identity::new("f-1", "Ravi", Role::Requester);
        let specialist = Identity::new("s-7", "Dr. Rao", Role::Responder);
        assert_eq!(chat.counterpart_for(&farmer).user_id, "s-7");
        assert_eq!(chat.counterpart_for(&specialist).name, "Ravi");
        assert_eq!(chat.last_message.as_deref(), Some("ok"));
    }
}

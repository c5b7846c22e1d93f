use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::Counterpart;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Chat,
    Video,
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionKind::Chat => write!(f, "chat"),
            SessionKind::Video => write!(f, "video"),
        }
    }
}

/// Controller states. `Requested` and `Accepted` never hold a live session;
/// they are derived from cached requests for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Requested,
    Accepted,
    Connecting,
    Active,
    Ended,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Requested => write!(f, "requested"),
            SessionState::Accepted => write!(f, "accepted"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Active => write!(f, "active"),
            SessionState::Ended => write!(f, "ended"),
        }
    }
}

/// The single live chat or call owned by this client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub room_id: Option<String>,
    pub kind: SessionKind,
    pub counterpart: Counterpart,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        room_id: Option<String>,
        kind: SessionKind,
        counterpart: Counterpart,
        state: SessionState,
    ) -> Self {
        Self {
            id: id.into(),
            room_id,
            kind,
            counterpart,
            state,
            started_at: Utc::now(),
        }
    }

    pub fn is_video(&self) -> bool {
        self.kind == SessionKind::Video
    }

    pub fn is_chat(&self) -> bool {
        self.kind == SessionKind::Chat
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "idle"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMedia {
    pub video: bool,
    pub audio: bool,
}

impl Default for LocalMedia {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NegotiationState {
    pub local_media: LocalMedia,
    pub connection_state: ConnectionState,
    pub elapsed_seconds: u64,
}

/// Formats a call duration as `m:ss`.
pub fn format_call_time(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::Idle.to_string(), "idle");
        assert_eq!(SessionState::Connecting.to_string(), "connecting");
        assert_eq!(SessionState::Ended.to_string(), "ended");
        assert_eq!(ConnectionState::Failed.to_string(), "failed");
    }

    #[test]
    fn test_format_call_time() {
        assert_eq!(format_call_time(0), "0:00");
        assert_eq!(format_call_time(9), "0:09");
        assert_eq!(format_call_time(75), "1:15");
        assert_eq!(format_call_time(3600), "60:00");
    }

    #[test]
    fn test_session_new() {
        let session = Session::new(
            "req-1",
            Some("room-1".to_string()),
            SessionKind::Video,
            Counterpart::new("s-7", "Dr. Rao"),
            SessionState::Connecting,
        );
        assert!(session.is_video());
        assert!(!session.is_chat());
        assert_eq!(session.state, SessionState::Connecting);
    }

    #[test]
    fn test_negotiation_state_default() {
        let state = NegotiationState::default();
        assert_eq!(state.connection_state, ConnectionState::Idle);
        assert!(state.local_media.video && state.local_media.audio);
        assert_eq!(state.elapsed_seconds, 0);
    }
}

use serde::{Deserialize, Serialize};

use crate::models::{
    format_call_time, ConnectionState, Message, NegotiationState, Notification, Session,
    SessionState,
};

/// Everything a renderer needs to draw the session view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// State of the live session; `idle` when there is none.
    pub state: SessionState,
    /// Live state, or the request-derived `requested`/`accepted` view.
    pub flow_state: SessionState,
    pub session: Option<Session>,
    pub negotiation: Option<NegotiationState>,
    pub messages: Vec<Message>,
    pub notification: Option<Notification>,
}

impl SessionSnapshot {
    pub fn is_idle(&self) -> bool {
        self.session.is_none()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.negotiation
            .map(|n| n.connection_state)
            .unwrap_or_default()
    }

    /// Call duration as `m:ss`, when a call is live.
    pub fn call_time(&self) -> Option<String> {
        self.negotiation
            .map(|n| format_call_time(n.elapsed_seconds))
    }
}

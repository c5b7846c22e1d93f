//! Session Store: the client's best-effort mirror of server state plus the
//! zero-or-one live session. No I/O happens here.

use tracing::debug;

use crate::error::{FieldcallError, FieldcallResult};
use crate::models::{
    ActiveCall, ChatSession, Delivery, Message, RequestStatus, Responder, Role, Session,
    SessionState, VideoRequest,
};

/// A request whose status moved forward while merging server facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub request_id: String,
    pub from: RequestStatus,
    pub to: RequestStatus,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    session: Option<Session>,
    requests: Vec<VideoRequest>,
    responders: Vec<Responder>,
    active_calls: Vec<ActiveCall>,
    chats: Vec<ChatSession>,
    messages: Vec<Message>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Live session
    // ------------------------------------------------------------------

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(SessionState::Idle)
    }

    pub fn set_session(&mut self, session: Session) -> FieldcallResult<()> {
        if let Some(existing) = &self.session {
            return Err(FieldcallError::SessionAlreadyActive(existing.id.clone()));
        }
        debug!(
            session_id = %session.id,
            kind = %session.kind,
            state = %session.state,
            "Session created"
        );
        self.session = Some(session);
        Ok(())
    }

    /// Moves the live session to `state`, returning the previous state.
    pub fn set_session_state(&mut self, state: SessionState) -> Option<SessionState> {
        let session = self.session.as_mut()?;
        let previous = session.state;
        session.state = state;
        debug!(session_id = %session.id, from = %previous, to = %state, "Session state changed");
        Some(previous)
    }

    pub fn clear_session(&mut self) -> Option<Session> {
        self.messages.clear();
        self.session.take()
    }

    /// Renderer view of the flow, including the request-derived states.
    pub fn flow_state(&self, role: Role) -> SessionState {
        if let Some(session) = &self.session {
            return session.state;
        }

        let open = self.requests.iter().filter(|r| !r.status.is_terminal());
        let mut state = SessionState::Idle;
        for request in open {
            match request.status {
                RequestStatus::Accepted => return SessionState::Accepted,
                RequestStatus::Pending if role == Role::Requester => {
                    state = SessionState::Requested
                }
                _ => {}
            }
        }
        state
    }

    // ------------------------------------------------------------------
    // Video requests
    // ------------------------------------------------------------------

    pub fn requests(&self) -> &[VideoRequest] {
        &self.requests
    }

    pub fn request(&self, request_id: &str) -> Option<&VideoRequest> {
        self.requests.iter().find(|r| r.id == request_id)
    }

    pub fn pending_requests(&self) -> impl Iterator<Item = &VideoRequest> {
        self.requests.iter().filter(|r| r.is_pending())
    }

    pub fn has_pending_request(&self) -> bool {
        self.requests.iter().any(|r| r.is_pending())
    }

    /// Inserts or merges one request. A stale status never overwrites a
    /// newer one.
    pub fn upsert_request(&mut self, incoming: VideoRequest) -> Option<StatusChange> {
        match self.requests.iter_mut().find(|r| r.id == incoming.id) {
            Some(existing) => {
                let from = existing.status;
                let to = if from.is_forward(incoming.status) {
                    incoming.status
                } else {
                    from
                };
                *existing = VideoRequest {
                    status: to,
                    ..incoming
                };
                (from != to).then(|| StatusChange {
                    request_id: existing.id.clone(),
                    from,
                    to,
                })
            }
            None => {
                self.requests.push(incoming);
                None
            }
        }
    }

    /// Merges a polled request list. Pending entries the server no longer
    /// lists are dropped; accepted and ended ones are kept.
    pub fn sync_requests(&mut self, incoming: Vec<VideoRequest>) -> Vec<StatusChange> {
        self.requests.retain(|existing| {
            !existing.is_pending() || incoming.iter().any(|r| r.id == existing.id)
        });

        incoming
            .into_iter()
            .filter_map(|request| self.upsert_request(request))
            .collect()
    }

    /// Applies a client-driven transition, which must be exactly one step
    /// forward.
    pub fn mark_request(&mut self, request_id: &str, status: RequestStatus) -> FieldcallResult<()> {
        let request = self
            .requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or_else(|| FieldcallError::RequestNotFound(request_id.to_string()))?;

        if !request.status.can_transition_to(status) {
            return Err(FieldcallError::InvalidRequestStatus {
                request_id: request_id.to_string(),
                expected: match status {
                    RequestStatus::Accepted => RequestStatus::Pending.to_string(),
                    _ => RequestStatus::Accepted.to_string(),
                },
                actual: request.status.to_string(),
            });
        }

        request.status = status;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Directory lists
    // ------------------------------------------------------------------

    pub fn responders(&self) -> &[Responder] {
        &self.responders
    }

    pub fn set_responders(&mut self, responders: Vec<Responder>) {
        self.responders = responders;
    }

    pub fn responder(&self, responder_id: &str) -> Option<&Responder> {
        self.responders.iter().find(|r| r.id == responder_id)
    }

    pub fn active_calls(&self) -> &[ActiveCall] {
        &self.active_calls
    }

    pub fn set_active_calls(&mut self, calls: Vec<ActiveCall>) {
        self.active_calls = calls;
    }

    pub fn chats(&self) -> &[ChatSession] {
        &self.chats
    }

    pub fn set_chats(&mut self, chats: Vec<ChatSession>) {
        self.chats = chats;
    }

    // ------------------------------------------------------------------
    // Chat messages of the live session
    // ------------------------------------------------------------------

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Appends a delivered message. A copy of one of our own pending echoes
    /// (same `client_message_id`) or of a message already held (same server
    /// id) confirms the existing entry instead. Returns true when appended.
    pub fn append_message(&mut self, incoming: Message) -> bool {
        self.touch_chat(&incoming);

        let existing = self.messages.iter_mut().find(|m| {
            let same_client_id = incoming.client_message_id.is_some()
                && m.client_message_id == incoming.client_message_id;
            let same_server_id = incoming.id.is_some() && m.id == incoming.id;
            same_client_id || same_server_id
        });

        match existing {
            Some(existing) => {
                if incoming.id.is_some() {
                    existing.id = incoming.id;
                }
                existing.timestamp = incoming.timestamp;
                existing.delivery = Delivery::Confirmed;
                false
            }
            None => {
                self.messages.push(Message {
                    delivery: Delivery::Confirmed,
                    ..incoming
                });
                true
            }
        }
    }

    pub fn push_local_echo(&mut self, echo: Message) {
        self.touch_chat(&echo);
        self.messages.push(echo);
    }

    /// Updates the delivery of a local echo that is still pending.
    pub fn mark_delivery(&mut self, client_message_id: &str, delivery: Delivery) -> bool {
        match self.messages.iter_mut().find(|m| {
            m.client_message_id.as_deref() == Some(client_message_id) && m.is_pending()
        }) {
            Some(message) => {
                message.delivery = delivery;
                true
            }
            None => false,
        }
    }

    fn touch_chat(&mut self, message: &Message) {
        if let Some(chat) = self.chats.iter_mut().find(|c| c.id == message.session_id) {
            chat.last_message = Some(message.text.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Counterpart, Identity, SessionKind, Urgency};
    use chrono::Utc;

    fn request(id: &str, status: RequestStatus) -> VideoRequest {
        VideoRequest {
            id: id.to_string(),
            requester_id: "f-1".to_string(),
            requester_name: "Ravi".to_string(),
            responder_id: Some("s-7".to_string()),
            responder_name: Some("Dr. Rao".to_string()),
            topic: "pest".to_string(),
            description: None,
            urgency: Urgency::High,
            status,
            created_at: Utc::now(),
        }
    }

    fn video_session() -> Session {
        Session::new(
            "r1",
            None,
            SessionKind::Video,
            Counterpart::new("s-7", "Dr. Rao"),
            SessionState::Connecting,
        )
    }

    #[test]
    fn test_single_session() {
        let mut store = SessionStore::new();
        assert_eq!(store.state(), SessionState::Idle);

        store.set_session(video_session()).unwrap();
        assert!(matches!(
            store.set_session(video_session()),
            Err(FieldcallError::SessionAlreadyActive(_))
        ));

        assert_eq!(
            store.set_session_state(SessionState::Active),
            Some(SessionState::Connecting)
        );
        assert!(store.clear_session().is_some());
        assert!(store.clear_session().is_none());
        assert_eq!(store.set_session_state(SessionState::Ended), None);
    }

    #[test]
    fn test_upsert_never_moves_backwards() {
        let mut store = SessionStore::new();
        store.upsert_request(request("r1", RequestStatus::Accepted));

        let change = store.upsert_request(request("r1", RequestStatus::Pending));
        assert!(change.is_none());
        assert_eq!(store.request("r1").unwrap().status, RequestStatus::Accepted);

        let change = store.upsert_request(request("r1", RequestStatus::Ended)).unwrap();
        assert_eq!(change.from, RequestStatus::Accepted);
        assert_eq!(change.to, RequestStatus::Ended);
    }

    #[test]
    fn test_sync_requests_reports_flips_and_drops_stale_pending() {
        let mut store = SessionStore::new();
        store.upsert_request(request("r1", RequestStatus::Pending));
        store.upsert_request(request("r2", RequestStatus::Pending));
        store.upsert_request(request("r3", RequestStatus::Accepted));

        let changes = store.sync_requests(vec![request("r1", RequestStatus::Accepted)]);

        assert_eq!(
            changes,
            vec![StatusChange {
                request_id: "r1".to_string(),
                from: RequestStatus::Pending,
                to: RequestStatus::Accepted,
            }]
        );
        assert!(store.request("r2").is_none());
        assert!(store.request("r3").is_some());
    }

    #[test]
    fn test_mark_request_is_strict() {
        let mut store = SessionStore::new();
        store.upsert_request(request("r1", RequestStatus::Pending));

        assert!(matches!(
            store.mark_request("r1", RequestStatus::Ended),
            Err(FieldcallError::InvalidRequestStatus { .. })
        ));
        store.mark_request("r1", RequestStatus::Accepted).unwrap();
        store.mark_request("r1", RequestStatus::Ended).unwrap();
        assert!(matches!(
            store.mark_request("missing", RequestStatus::Accepted),
            Err(FieldcallError::RequestNotFound(_))
        ));
    }

    #[test]
    fn test_flow_state_derivation() {
        let mut store = SessionStore::new();
        assert_eq!(store.flow_state(Role::Requester), SessionState::Idle);

        store.upsert_request(request("r1", RequestStatus::Pending));
        assert_eq!(store.flow_state(Role::Requester), SessionState::Requested);
        assert_eq!(store.flow_state(Role::Responder), SessionState::Idle);

        store.mark_request("r1", RequestStatus::Accepted).unwrap();
        assert_eq!(store.flow_state(Role::Requester), SessionState::Accepted);
        assert_eq!(store.flow_state(Role::Responder), SessionState::Accepted);

        store.set_session(video_session()).unwrap();
        assert_eq!(store.flow_state(Role::Requester), SessionState::Connecting);
    }

    #[test]
    fn test_server_copy_confirms_local_echo() {
        let me = Identity::new("f-1", "Ravi", Role::Requester);
        let mut store = SessionStore::new();

        let echo = Message::local_echo("s-1", &me, "hello");
        let client_id = echo.client_message_id.clone();
        store.push_local_echo(echo.clone());

        let server_copy = Message {
            id: Some("m-1".to_string()),
            delivery: Delivery::Confirmed,
            ..echo
        };
        assert!(!store.append_message(server_copy.clone()));
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].delivery, Delivery::Confirmed);
        assert_eq!(store.messages()[0].id.as_deref(), Some("m-1"));
        assert_eq!(store.messages()[0].client_message_id, client_id);

        // Same server id again is not a second message.
        assert!(!store.append_message(server_copy));
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn test_messages_without_client_id_are_appended() {
        let me = Identity::new("s-7", "Dr. Rao", Role::Responder);
        let mut store = SessionStore::new();

        let mut message = Message::local_echo("s-1", &me, "hi");
        message.client_message_id = None;
        assert!(store.append_message(message.clone()));
        assert!(store.append_message(message));
        assert_eq!(store.messages().len(), 2);
    }

    #[test]
    fn test_mark_delivery_failed() {
        let me = Identity::new("f-1", "Ravi", Role::Requester);
        let mut store = SessionStore::new();
        let echo = Message::local_echo("s-1", &me, "hello");
        let client_id = echo.client_message_id.clone().unwrap();
        store.push_local_echo(echo);

        assert!(store.mark_delivery(&client_id, Delivery::Failed));
        assert!(!store.mark_delivery(&client_id, Delivery::Confirmed));
        assert_eq!(store.messages()[0].delivery, Delivery::Failed);
    }
}

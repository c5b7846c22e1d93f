//! In-process collaborators: a directory backend, capture devices and a
//! loopback peer connection. The CLI `demo` command and the test suites
//! drive whole sessions with these instead of a live service.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::directory::{
    CallRoom, ChatStart, DirectoryClient, OutgoingMessage, OutgoingSignal, RequestDraft,
};
use crate::error::{FieldcallError, FieldcallResult};
use crate::media::{
    IceCandidate, LocalMediaStream, MediaConstraints, MediaDevices, MediaTrack, PeerConfig,
    PeerConnection, PeerConnectionFactory, PeerConnectionState, PeerEvent, PeerEventCallback,
    SdpType, SessionDescription, TrackKind,
};
use crate::models::{
    ActiveCall, ChatSession, Delivery, Identity, Message, RequestStatus, Responder, Role,
    VideoRequest,
};
use crate::signaling::{ChannelFrame, MemoryHub};

// ----------------------------------------------------------------------
// Capture
// ----------------------------------------------------------------------

pub struct FakeTrack {
    id: String,
    kind: TrackKind,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl FakeTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl MediaTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Capture that hands out fake tracks, or refuses like a denied permission
/// prompt.
#[derive(Default)]
pub struct FakeMediaDevices {
    deny: AtomicBool,
    acquisitions: AtomicUsize,
    tracks: Mutex<Vec<Arc<FakeTrack>>>,
}

impl FakeMediaDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn denying() -> Self {
        let devices = Self::default();
        devices.deny(true);
        devices
    }

    pub fn deny(&self, deny: bool) {
        self.deny.store(deny, Ordering::SeqCst);
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub async fn tracks(&self) -> Vec<Arc<FakeTrack>> {
        self.tracks.lock().await.clone()
    }

    /// True when every track ever handed out has been stopped.
    pub async fn all_stopped(&self) -> bool {
        self.tracks.lock().await.iter().all(|t| t.is_stopped())
    }
}

#[async_trait]
impl MediaDevices for FakeMediaDevices {
    async fn acquire(&self, constraints: &MediaConstraints) -> FieldcallResult<LocalMediaStream> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(FieldcallError::MediaAccessError(
                "permission denied by user".to_string(),
            ));
        }

        let n = self.acquisitions.fetch_add(1, Ordering::SeqCst) + 1;
        let mut created = Vec::new();
        if constraints.video.is_some() {
            created.push(Arc::new(FakeTrack::new(format!("video-{}", n), TrackKind::Video)));
        }
        if constraints.audio {
            created.push(Arc::new(FakeTrack::new(format!("audio-{}", n), TrackKind::Audio)));
        }

        self.tracks.lock().await.extend(created.iter().cloned());
        Ok(LocalMediaStream::new(
            created
                .into_iter()
                .map(|t| t as Arc<dyn MediaTrack>)
                .collect(),
        ))
    }
}

// ----------------------------------------------------------------------
// Peer connection
// ----------------------------------------------------------------------

#[derive(Default)]
struct PeerSides {
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    candidates: Vec<IceCandidate>,
    tracks: usize,
    connected: bool,
}

/// A peer connection that "connects" as soon as both descriptions are set,
/// emitting one local candidate per local description.
pub struct FakePeerConnection {
    id: u64,
    on_event: PeerEventCallback,
    sides: Mutex<PeerSides>,
    offers: AtomicUsize,
    answers: AtomicUsize,
    closed: AtomicBool,
}

impl FakePeerConnection {
    fn new(id: u64, on_event: PeerEventCallback) -> Self {
        Self {
            id,
            on_event,
            sides: Mutex::new(PeerSides::default()),
            offers: AtomicUsize::new(0),
            answers: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn offers_created(&self) -> usize {
        self.offers.load(Ordering::SeqCst)
    }

    pub fn answers_created(&self) -> usize {
        self.answers.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn track_count(&self) -> usize {
        self.sides.lock().await.tracks
    }

    pub async fn remote_candidates(&self) -> Vec<IceCandidate> {
        self.sides.lock().await.candidates.clone()
    }

    pub async fn remote_description(&self) -> Option<SessionDescription> {
        self.sides.lock().await.remote.clone()
    }

    /// Reports an ICE failure the way a real stack would.
    pub fn fail(&self) {
        (self.on_event)(PeerEvent::ConnectionStateChanged(PeerConnectionState::Failed));
    }

    fn ensure_open(&self) -> FieldcallResult<()> {
        if self.is_closed() {
            return Err(FieldcallError::PeerConnectionError(format!(
                "peer {} is closed",
                self.id
            )));
        }
        Ok(())
    }

    async fn maybe_connect(&self) {
        let connect = {
            let mut sides = self.sides.lock().await;
            let ready = sides.local.is_some() && sides.remote.is_some() && !sides.connected;
            if ready {
                sides.connected = true;
            }
            ready
        };

        if connect {
            debug!(peer = self.id, "Loopback peer connected");
            (self.on_event)(PeerEvent::ConnectionStateChanged(
                PeerConnectionState::Connected,
            ));
            (self.on_event)(PeerEvent::RemoteTrack(TrackKind::Video));
        }
    }
}

#[async_trait]
impl PeerConnection for FakePeerConnection {
    async fn add_track(&self, _track: Arc<dyn MediaTrack>) -> FieldcallResult<()> {
        self.ensure_open()?;
        self.sides.lock().await.tracks += 1;
        Ok(())
    }

    async fn create_offer(&self) -> FieldcallResult<SessionDescription> {
        self.ensure_open()?;
        let n = self.offers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionDescription {
            sdp_type: SdpType::Offer,
            sdp: format!("v=0\r\no=peer-{} {} 1 IN IP4 127.0.0.1\r\n", self.id, n),
        })
    }

    async fn create_answer(&self) -> FieldcallResult<SessionDescription> {
        self.ensure_open()?;
        let has_offer = matches!(
            self.sides.lock().await.remote.as_ref().map(|d| d.sdp_type),
            Some(SdpType::Offer)
        );
        if !has_offer {
            return Err(FieldcallError::PeerConnectionError(
                "cannot answer without a remote offer".to_string(),
            ));
        }

        let n = self.answers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionDescription {
            sdp_type: SdpType::Answer,
            sdp: format!("v=0\r\no=peer-{} {} 1 IN IP4 127.0.0.1\r\n", self.id, n),
        })
    }

    async fn set_local_description(&self, description: SessionDescription) -> FieldcallResult<()> {
        self.ensure_open()?;
        self.sides.lock().await.local = Some(description);

        (self.on_event)(PeerEvent::LocalIceCandidate(IceCandidate {
            candidate: format!(
                "candidate:{} 1 udp 2122260223 127.0.0.1 {} typ host",
                self.id,
                50000 + self.id
            ),
            sdp_mid: Some("0".to_string()),
            sdp_mline_index: Some(0),
        }));

        self.maybe_connect().await;
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> FieldcallResult<()> {
        self.ensure_open()?;
        self.sides.lock().await.remote = Some(description);
        self.maybe_connect().await;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> FieldcallResult<()> {
        self.ensure_open()?;
        self.sides.lock().await.candidates.push(candidate);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct LoopbackPeerFactory {
    peers: Mutex<Vec<Arc<FakePeerConnection>>>,
    next_id: AtomicU64,
    fail_create: AtomicBool,
}

impl LoopbackPeerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub async fn peers(&self) -> Vec<Arc<FakePeerConnection>> {
        self.peers.lock().await.clone()
    }

    pub async fn last_peer(&self) -> Option<Arc<FakePeerConnection>> {
        self.peers.lock().await.last().cloned()
    }
}

#[async_trait]
impl PeerConnectionFactory for LoopbackPeerFactory {
    async fn create(
        &self,
        _config: &PeerConfig,
        on_event: PeerEventCallback,
    ) -> FieldcallResult<Arc<dyn PeerConnection>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(FieldcallError::PeerConnectionError(
                "peer connection refused".to_string(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let peer = Arc::new(FakePeerConnection::new(id, on_event));
        self.peers.lock().await.push(peer.clone());
        Ok(peer)
    }
}

// ----------------------------------------------------------------------
// Directory
// ----------------------------------------------------------------------

#[derive(Default)]
struct DirectoryState {
    responders: Vec<Responder>,
    requests: Vec<VideoRequest>,
    active_calls: Vec<ActiveCall>,
    chats: Vec<ChatSession>,
    messages: HashMap<String, Vec<Message>>,
    end_calls: HashMap<String, usize>,
    failing: HashSet<String>,
    next_id: u64,
}

impl DirectoryState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, operation: &str) -> FieldcallResult<()> {
        if self.failing.contains(operation) {
            return Err(FieldcallError::NetworkError(format!(
                "{} failed: connection reset",
                operation
            )));
        }
        Ok(())
    }

    fn responder_name(&self, responder_id: &str) -> Option<String> {
        self.responders
            .iter()
            .find(|r| r.id == responder_id)
            .map(|r| r.name.clone())
    }
}

/// Shared in-memory stand-in for the consultation service. Each actor gets
/// its own client view through [`MemoryDirectory::client_for`].
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<Mutex<DirectoryState>>,
    hub: Option<MemoryHub>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sent messages are pushed to the session room on `hub`.
    pub fn with_hub(hub: MemoryHub) -> Self {
        Self {
            state: Arc::default(),
            hub: Some(hub),
        }
    }

    pub fn client_for(&self, identity: &Identity) -> Arc<dyn DirectoryClient> {
        Arc::new(MemoryDirectoryClient {
            backend: self.clone(),
            identity: identity.clone(),
        })
    }

    pub async fn add_responder(&self, responder: Responder) {
        self.state.lock().await.responders.push(responder);
    }

    /// Subsequent calls of `operation` fail with a network error.
    pub async fn fail_operation(&self, operation: &str) {
        self.state.lock().await.failing.insert(operation.to_string());
    }

    pub async fn recover(&self, operation: &str) {
        self.state.lock().await.failing.remove(operation);
    }

    pub async fn request(&self, request_id: &str) -> Option<VideoRequest> {
        self.state
            .lock()
            .await
            .requests
            .iter()
            .find(|r| r.id == request_id)
            .cloned()
    }

    /// Server-side status change, as another client or an admin would make.
    pub async fn set_request_status(&self, request_id: &str, status: RequestStatus) -> bool {
        let mut state = self.state.lock().await;
        match state.requests.iter_mut().find(|r| r.id == request_id) {
            Some(request) => {
                request.status = status;
                true
            }
            None => false,
        }
    }

    pub async fn add_active_call(&self, call: ActiveCall) {
        self.state.lock().await.active_calls.push(call);
    }

    pub async fn active_calls(&self) -> Vec<ActiveCall> {
        self.state.lock().await.active_calls.clone()
    }

    /// How many times `end_session` reached the service for `session_id`.
    pub async fn end_calls(&self, session_id: &str) -> usize {
        self.state
            .lock()
            .await
            .end_calls
            .get(session_id)
            .copied()
            .unwrap_or(0)
    }

    pub async fn messages(&self, session_id: &str) -> Vec<Message> {
        self.state
            .lock()
            .await
            .messages
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }
}

struct MemoryDirectoryClient {
    backend: MemoryDirectory,
    identity: Identity,
}

impl MemoryDirectoryClient {
    fn rejected(message: impl Into<String>) -> FieldcallError {
        FieldcallError::ApiStatus {
            status: 400,
            message: message.into(),
        }
    }

    fn involves(&self, requester_id: &str, responder_id: Option<&str>) -> bool {
        match self.identity.role {
            Role::Requester => requester_id == self.identity.user_id,
            Role::Responder => responder_id == Some(self.identity.user_id.as_str()),
        }
    }
}

#[async_trait]
impl DirectoryClient for MemoryDirectoryClient {
    async fn list_responders(&self) -> FieldcallResult<Vec<Responder>> {
        let state = self.backend.state.lock().await;
        state.check("list_responders")?;
        Ok(state.responders.clone())
    }

    async fn list_pending_requests(&self) -> FieldcallResult<Vec<VideoRequest>> {
        let state = self.backend.state.lock().await;
        state.check("list_pending_requests")?;
        Ok(state
            .requests
            .iter()
            .filter(|r| r.is_pending())
            .filter(|r| match r.responder_id.as_deref() {
                Some(id) => id == self.identity.user_id,
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn list_own_requests(&self) -> FieldcallResult<Vec<VideoRequest>> {
        let state = self.backend.state.lock().await;
        state.check("list_own_requests")?;
        Ok(state
            .requests
            .iter()
            .filter(|r| r.requester_id == self.identity.user_id)
            .cloned()
            .collect())
    }

    async fn list_active_calls(&self) -> FieldcallResult<Vec<ActiveCall>> {
        let state = self.backend.state.lock().await;
        state.check("list_active_calls")?;
        Ok(state
            .active_calls
            .iter()
            .filter(|c| self.involves(&c.requester_id, c.responder_id.as_deref()))
            .cloned()
            .collect())
    }

    async fn list_chats(&self) -> FieldcallResult<Vec<ChatSession>> {
        let state = self.backend.state.lock().await;
        state.check("list_chats")?;
        let me = &self.identity.user_id;
        Ok(state
            .chats
            .iter()
            .filter(|c| &c.participant_a == me || &c.participant_b == me)
            .cloned()
            .collect())
    }

    async fn create_request(
        &self,
        responder_id: &str,
        draft: &RequestDraft,
    ) -> FieldcallResult<VideoRequest> {
        let mut state = self.backend.state.lock().await;
        state.check("create_request")?;

        let id = format!("req-{}", state.next_id());
        let request = VideoRequest {
            id,
            requester_id: self.identity.user_id.clone(),
            requester_name: self.identity.display_name.clone(),
            responder_id: Some(responder_id.to_string()),
            responder_name: state.responder_name(responder_id),
            topic: draft.topic.clone(),
            description: draft.description.clone(),
            urgency: draft.urgency,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        };
        state.requests.push(request.clone());
        Ok(request)
    }

    async fn accept_request(&self, request_id: &str) -> FieldcallResult<()> {
        let mut state = self.backend.state.lock().await;
        state.check("accept_request")?;

        let request = state
            .requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or_else(|| FieldcallError::ApiStatus {
                status: 404,
                message: format!("request {} not found", request_id),
            })?;
        if !request.is_pending() {
            return Err(Self::rejected(format!(
                "request {} is {}",
                request_id, request.status
            )));
        }

        request.status = RequestStatus::Accepted;
        request.responder_id = Some(self.identity.user_id.clone());
        request.responder_name = Some(self.identity.display_name.clone());
        Ok(())
    }

    async fn start_call(&self, request_id: &str) -> FieldcallResult<CallRoom> {
        let mut state = self.backend.state.lock().await;
        state.check("start_call")?;

        let request = state
            .requests
            .iter()
            .find(|r| r.id == request_id)
            .cloned()
            .ok_or_else(|| FieldcallError::ApiStatus {
                status: 404,
                message: format!("request {} not found", request_id),
            })?;
        if !request.is_accepted() {
            return Err(Self::rejected(format!(
                "request {} is {}",
                request_id, request.status
            )));
        }

        let room_id = format!("room-{}", request_id);
        if !state.active_calls.iter().any(|c| c.id == request_id) {
            state.active_calls.push(ActiveCall {
                id: request.id.clone(),
                room_id: Some(room_id.clone()),
                requester_id: request.requester_id.clone(),
                requester_name: request.requester_name.clone(),
                responder_id: request.responder_id.clone(),
                responder_name: request.responder_name.clone(),
                topic: Some(request.topic.clone()),
                started_at: Some(Utc::now()),
            });
        }

        Ok(CallRoom {
            room_id: Some(room_id),
        })
    }

    async fn start_chat(&self, responder_id: &str, topic: &str) -> FieldcallResult<ChatStart> {
        let mut state = self.backend.state.lock().await;
        state.check("start_chat")?;

        let session_id = format!("chat-{}", state.next_id());
        let room_id = format!("room-{}", session_id);
        let chat = ChatSession {
            id: session_id.clone(),
            room_id: Some(room_id.clone()),
            participant_a: self.identity.user_id.clone(),
            participant_a_name: self.identity.display_name.clone(),
            participant_b: responder_id.to_string(),
            participant_b_name: state.responder_name(responder_id).unwrap_or_default(),
            topic: topic.to_string(),
            created_at: Utc::now(),
            last_message: None,
            unread_count: 0,
        };
        state.chats.push(chat);

        Ok(ChatStart {
            session_id,
            room_id: Some(room_id),
        })
    }

    async fn end_session(&self, session_id: &str) -> FieldcallResult<()> {
        let mut state = self.backend.state.lock().await;
        state.check("end_session")?;

        *state.end_calls.entry(session_id.to_string()).or_default() += 1;
        if let Some(request) = state
            .requests
            .iter_mut()
            .find(|r| r.id == session_id && r.is_accepted())
        {
            request.status = RequestStatus::Ended;
        }
        state.active_calls.retain(|c| c.id != session_id);
        Ok(())
    }

    async fn send_message(
        &self,
        session_id: &str,
        message: &OutgoingMessage,
    ) -> FieldcallResult<()> {
        let stored = {
            let mut state = self.backend.state.lock().await;
            state.check("send_message")?;

            let stored = Message {
                id: Some(format!("msg-{}", state.next_id())),
                client_message_id: message.client_message_id.clone(),
                session_id: session_id.to_string(),
                sender_id: self.identity.user_id.clone(),
                sender_role: self.identity.role,
                sender_name: self.identity.display_name.clone(),
                text: message.message_text.clone(),
                timestamp: Utc::now(),
                delivery: Delivery::Confirmed,
            };
            state
                .messages
                .entry(session_id.to_string())
                .or_default()
                .push(stored.clone());
            if let Some(chat) = state.chats.iter_mut().find(|c| c.id == session_id) {
                chat.last_message = Some(stored.text.clone());
            }
            stored
        };

        if let Some(hub) = &self.backend.hub {
            hub.broadcast(session_id, ChannelFrame::NewMessage { message: stored })
                .await;
        }
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> FieldcallResult<Vec<Message>> {
        let state = self.backend.state.lock().await;
        state.check("list_messages")?;
        Ok(state.messages.get(session_id).cloned().unwrap_or_default())
    }
    async fn send_signal(&self, session_id: &str, signal: &OutgoingSignal) -> FieldcallResult<()> {
        self.backend.state.lock().await.check("send_signal")?;

        if let Some(hub) = &self.backend.hub {
            let frame = ChannelFrame::WebrtcSignal {
                signal_type: signal.signal_type,
                signal_data: signal.signal_data.clone(),
                sender_id: Some(self.identity.user_id.clone()),
            };
            hub.broadcast(session_id, frame).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Urgency;

    fn draft(topic: &str) -> RequestDraft {
        RequestDraft {
            topic: topic.to_string(),
            description: None,
            urgency: Urgency::Normal,
        }
    }

    #[tokio::test]
    async fn test_request_lifecycle() {
        let directory = MemoryDirectory::new();
        let farmer = directory.client_for(&Identity::new("f-1", "Ravi", Role::Requester));
        let specialist = directory.client_for(&Identity::new("s-7", "Dr. Rao", Role::Responder));

        let request = farmer.create_request("s-7", &draft("leaf curl")).await.unwrap();
        assert_eq!(request.id, "req-1");
        assert_eq!(specialist.list_pending_requests().await.unwrap().len(), 1);

        assert!(farmer.start_call(&request.id).await.is_err());
        specialist.accept_request(&request.id).await.unwrap();
        assert!(specialist.accept_request(&request.id).await.is_err());

        let room = farmer.start_call(&request.id).await.unwrap();
        assert_eq!(room.room_id.as_deref(), Some("room-req-1"));
        assert_eq!(specialist.list_active_calls().await.unwrap().len(), 1);

        farmer.end_session(&request.id).await.unwrap();
        assert_eq!(directory.end_calls(&request.id).await, 1);
        assert_eq!(
            directory.request(&request.id).await.map(|r| r.status),
            Some(RequestStatus::Ended)
        );
        assert!(specialist.list_active_calls().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let directory = MemoryDirectory::new();
        let farmer = directory.client_for(&Identity::new("f-1", "Ravi", Role::Requester));

        directory.fail_operation("list_responders").await;
        let err = farmer.list_responders().await.unwrap_err();
        assert!(err.is_network_error());

        directory.recover("list_responders").await;
        assert!(farmer.list_responders().await.is_ok());
    }

    #[tokio::test]
    async fn test_loopback_peer_connects_once_both_sides_set() {
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = events.clone();
        let factory = LoopbackPeerFactory::new();
        let peer = factory
            .create(
                &PeerConfig {
                    ice_servers: vec![],
                },
                Box::new(move |e| sink.lock().unwrap().push(e)),
            )
            .await
            .unwrap();

        assert!(peer.create_answer().await.is_err());

        let offer = peer.create_offer().await.unwrap();
        peer.set_local_description(offer.clone()).await.unwrap();
        peer.set_remote_description(SessionDescription {
            sdp_type: SdpType::Answer,
            sdp: "v=0".to_string(),
        })
        .await
        .unwrap();

        let events = events.lock().unwrap();
        assert!(matches!(events[0], PeerEvent::LocalIceCandidate(_)));
        assert!(events.contains(&PeerEvent::ConnectionStateChanged(
            PeerConnectionState::Connected
        )));
        assert!(events.contains(&PeerEvent::RemoteTrack(TrackKind::Video)));
    }

    #[tokio::test]
    async fn test_denied_capture() {
        let devices = FakeMediaDevices::denying();
        let constraints = MediaConstraints {
            video: None,
            audio: true,
        };
        assert!(devices.acquire(&constraints).await.unwrap_err().is_media_error());

        devices.deny(false);
        let stream = devices.acquire(&constraints).await.unwrap();
        assert_eq!(stream.tracks.len(), 1);
        stream.stop_all();
        assert!(devices.all_stopped().await);
    }
}

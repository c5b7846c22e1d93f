//! Session Controller: the single owner of the live session.
//!
//! User actions arrive as method calls; channel, peer, timer and poller
//! callbacks arrive as [`ControllerEvent`]s on a mailbox drained by one
//! event-loop task. Every mutation of [`ControllerState`] happens under one
//! lock, and every live session carries a generation so that late events
//! from a session that already ended are ignored.

mod builder;
mod events;
mod snapshot;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::FieldcallConfig;
use crate::directory::{DirectoryClient, OutgoingMessage, RequestDraft, SignalRelay};
use crate::error::{FieldcallError, FieldcallResult};
use crate::media::{
    is_offerer, MediaDevices, MediaNegotiator, NegotiatorSettings, PeerConnectionFactory,
    PeerEvent,
};
use crate::models::{
    ActiveCall, ChatSession, Counterpart, Delivery, Identity, Message, NotificationAction,
    RequestStatus, Responder, Role, Session, SessionKind, SessionState, Urgency, VideoRequest,
};
use crate::notifications::NotificationCenter;
use crate::poller::{PollFact, ReconciliationPoller};
use crate::signaling::{ChannelConnector, SignalingChannel};
use crate::store::SessionStore;

pub use builder::SessionControllerBuilder;
pub use events::ControllerEvent;
pub use snapshot::SessionSnapshot;

/// Resources owned by the live session. Dropping them is not enough;
/// [`SessionController::release`] stops each one explicitly.
struct LiveSession {
    generation: u64,
    session_id: String,
    kind: SessionKind,
    channel: Option<Arc<SignalingChannel>>,
    negotiator: Option<Arc<MediaNegotiator>>,
    ticker: Option<JoinHandle<()>>,
}

struct ControllerState {
    store: SessionStore,
    live: Option<LiveSession>,
    view_visible: bool,
    offered_calls: HashSet<String>,
    generation: u64,
}

impl ControllerState {
    fn live_for(&self, generation: u64) -> Option<&LiveSession> {
        self.live.as_ref().filter(|l| l.generation == generation)
    }

    fn live_for_mut(&mut self, generation: u64) -> Option<&mut LiveSession> {
        self.live.as_mut().filter(|l| l.generation == generation)
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

struct Shared {
    identity: Identity,
    config: FieldcallConfig,
    directory: Arc<dyn DirectoryClient>,
    connector: Arc<dyn ChannelConnector>,
    media_devices: Arc<dyn MediaDevices>,
    peer_factory: Arc<dyn PeerConnectionFactory>,
    negotiator_settings: NegotiatorSettings,
    notifications: NotificationCenter,
    poller: ReconciliationPoller,
    state: Mutex<ControllerState>,
    /// Serializes session-starting user actions.
    op_lock: Mutex<()>,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    pub fn builder() -> SessionControllerBuilder {
        SessionControllerBuilder::new()
    }

    pub fn identity(&self) -> &Identity {
        &self.shared.identity
    }

    pub fn config(&self) -> &FieldcallConfig {
        &self.shared.config
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.shared.notifications
    }

    pub fn poller(&self) -> &ReconciliationPoller {
        &self.shared.poller
    }

    fn require_role(&self, role: Role, action: &str) -> FieldcallResult<()> {
        if self.shared.identity.role != role {
            return Err(FieldcallError::RoleNotPermitted {
                action: action.to_string(),
                role: self.shared.identity.role.to_string(),
            });
        }
        Ok(())
    }

    /// Logs `err`, shows it as an error notification and hands it back.
    fn surface(&self, err: FieldcallError) -> FieldcallError {
        err.log();
        self.shared.notifications.error(user_message(&err));
        err
    }

    // ------------------------------------------------------------------
    // List views
    // ------------------------------------------------------------------

    pub async fn refresh_responders(&self) -> FieldcallResult<Vec<Responder>> {
        let responders = self
            .shared
            .directory
            .list_responders()
            .await
            .map_err(|e| self.surface(e))?;

        self.shared
            .state
            .lock()
            .await
            .store
            .set_responders(responders.clone());
        Ok(responders)
    }

    /// Own requests for a requester, pending ones for a responder. Runs
    /// through the same reconciliation as a poll result.
    pub async fn refresh_requests(&self) -> FieldcallResult<Vec<VideoRequest>> {
        let fact = match self.shared.identity.role {
            Role::Requester => self
                .shared
                .directory
                .list_own_requests()
                .await
                .map(PollFact::OwnRequests),
            Role::Responder => self
                .shared
                .directory
                .list_pending_requests()
                .await
                .map(PollFact::PendingRequests),
        }
        .map_err(|e| self.surface(e))?;

        self.reconcile(fact).await;
        Ok(self.requests().await)
    }

    pub async fn refresh_active_calls(&self) -> FieldcallResult<Vec<ActiveCall>> {
        let calls = self
            .shared
            .directory
            .list_active_calls()
            .await
            .map_err(|e| self.surface(e))?;

        self.reconcile(PollFact::ActiveCalls(calls.clone())).await;
        Ok(calls)
    }

    pub async fn refresh_chats(&self) -> FieldcallResult<Vec<ChatSession>> {
        let chats = self
            .shared
            .directory
            .list_chats()
            .await
            .map_err(|e| self.surface(e))?;

        self.shared
            .state
            .lock()
            .await
            .store
            .set_chats(chats.clone());
        Ok(chats)
    }

    pub async fn requests(&self) -> Vec<VideoRequest> {
        self.shared.state.lock().await.store.requests().to_vec()
    }

    pub async fn responders(&self) -> Vec<Responder> {
        self.shared.state.lock().await.store.responders().to_vec()
    }

    pub async fn active_calls(&self) -> Vec<ActiveCall> {
        self.shared.state.lock().await.store.active_calls().to_vec()
    }

    pub async fn chats(&self) -> Vec<ChatSession> {
        self.shared.state.lock().await.store.chats().to_vec()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.shared.state.lock().await.store.messages().to_vec()
    }

    // ------------------------------------------------------------------
    // Video requests
    // ------------------------------------------------------------------

    /// Creates a pending video request. The controller stays idle; the
    /// requester learns about acceptance through polling.
    pub async fn request_call(
        &self,
        responder_id: &str,
        topic: &str,
        description: Option<String>,
        urgency: Urgency,
    ) -> FieldcallResult<VideoRequest> {
        self.require_role(Role::Requester, "request_call")
            .map_err(|e| self.surface(e))?;

        let topic = topic.trim();
        if topic.is_empty() {
            return Err(self.surface(FieldcallError::ValidationError(
                "Please enter a topic".to_string(),
            )));
        }

        let _op = self.shared.op_lock.lock().await;
        let draft = RequestDraft {
            topic: topic.to_string(),
            description: description.filter(|d| !d.trim().is_empty()),
            urgency,
        };

        let mut request = self
            .shared
            .directory
            .create_request(responder_id, &draft)
            .await
            .map_err(|e| self.surface(e))?;

        if request.requester_id.is_empty() {
            request.requester_id = self.shared.identity.user_id.clone();
            request.requester_name = self.shared.identity.display_name.clone();
        }
        if request.responder_id.is_none() {
            request.responder_id = Some(responder_id.to_string());
        }

        {
            let mut state = self.shared.state.lock().await;
            if request.responder_name.is_none() {
                request.responder_name =
                    state.store.responder(responder_id).map(|r| r.name.clone());
            }
            state.store.upsert_request(request.clone());
        }

        info!(
            request_id = %request.id,
            responder_id = %responder_id,
            urgency = %urgency,
            "Video request created"
        );
        self.shared.notifications.success("Video call request sent!");
        self.update_polling().await;
        Ok(request)
    }

    /// Approves a pending request. No session is created for either side.
    pub async fn accept_call(&self, request_id: &str) -> FieldcallResult<()> {
        self.require_role(Role::Responder, "accept_call")
            .map_err(|e| self.surface(e))?;

        let _op = self.shared.op_lock.lock().await;
        let request = {
            let state = self.shared.state.lock().await;
            let request = state
                .store
                .request(request_id)
                .cloned()
                .ok_or_else(|| FieldcallError::RequestNotFound(request_id.to_string()))
                .map_err(|e| self.surface(e))?;
            if !request.is_pending() {
                return Err(self.surface(FieldcallError::InvalidRequestStatus {
                    request_id: request_id.to_string(),
                    expected: RequestStatus::Pending.to_string(),
                    actual: request.status.to_string(),
                }));
            }
            request
        };

        self.shared
            .directory
            .accept_request(request_id)
            .await
            .map_err(|e| self.surface(e))?;

        self.shared
            .state
            .lock()
            .await
            .store
            .mark_request(request_id, RequestStatus::Accepted)?;

        info!(request_id = %request_id, "Video request accepted");
        let who = if request.requester_name.is_empty() {
            "The farmer".to_string()
        } else {
            request.requester_name.clone()
        };
        self.shared
            .notifications
            .success(format!("Request accepted! {} can now start the call.", who));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Video sessions
    // ------------------------------------------------------------------

    /// Starts the call for an accepted request. Either side may call this;
    /// the offer always comes from the requester.
    pub async fn start_call(&self, request_id: &str) -> FieldcallResult<Session> {
        let _op = self.shared.op_lock.lock().await;
        self.ensure_idle().await.map_err(|e| self.surface(e))?;

        let mut request = self.shared.state.lock().await.store.request(request_id).cloned();
        if self.shared.identity.is_requester()
            && !request.as_ref().is_some_and(|r| r.is_accepted())
        {
            // The acceptance may not have been polled yet.
            if let Ok(own) = self.shared.directory.list_own_requests().await {
                self.reconcile(PollFact::OwnRequests(own)).await;
                request = self.shared.state.lock().await.store.request(request_id).cloned();
            }
        }

        let request = request
            .ok_or_else(|| FieldcallError::RequestNotFound(request_id.to_string()))
            .map_err(|e| self.surface(e))?;
        if !request.is_accepted() {
            return Err(self.surface(FieldcallError::InvalidRequestStatus {
                request_id: request_id.to_string(),
                expected: RequestStatus::Accepted.to_string(),
                actual: request.status.to_string(),
            }));
        }

        let room = self
            .shared
            .directory
            .start_call(request_id)
            .await
            .map_err(|e| self.surface(e))?;

        let counterpart = match self.shared.identity.role {
            Role::Requester => Counterpart::new(
                request.responder_id.clone().unwrap_or_default(),
                request.responder_name.clone().unwrap_or_default(),
            ),
            Role::Responder => Counterpart::new(&request.requester_id, &request.requester_name),
        };

        let session = Session::new(
            request_id,
            room.room_id,
            SessionKind::Video,
            counterpart,
            SessionState::Connecting,
        );
        self.launch_video(session).await
    }

    /// Joins a call that is already active. Only responders join; they
    /// never offer and wait for the requester's offer instead.
    pub async fn join_active_call(&self, call: &ActiveCall) -> FieldcallResult<Session> {
        self.require_role(Role::Responder, "join_active_call")
            .map_err(|e| self.surface(e))?;

        let _op = self.shared.op_lock.lock().await;
        self.ensure_idle().await.map_err(|e| self.surface(e))?;

        self.shared
            .state
            .lock()
            .await
            .offered_calls
            .insert(call.id.clone());

        let session = Session::new(
            &call.id,
            call.room_id.clone(),
            SessionKind::Video,
            Counterpart::new(&call.requester_id, &call.requester_name),
            SessionState::Connecting,
        );
        self.launch_video(session).await
    }

    async fn ensure_idle(&self) -> FieldcallResult<()> {
        match self.shared.state.lock().await.store.session() {
            Some(existing) => Err(FieldcallError::SessionAlreadyActive(existing.id.clone())),
            None => Ok(()),
        }
    }

    /// Installs a connecting video session, opens its channel and starts
    /// media negotiation.
    async fn launch_video(&self, session: Session) -> FieldcallResult<Session> {
        let session_id = session.id.clone();

        let (generation, negotiator) = {
            let mut state = self.shared.state.lock().await;
            state.store.set_session(session.clone())?;
            let generation = state.next_generation();

            let tx = self.shared.events_tx.clone();
            let negotiator = Arc::new(MediaNegotiator::new(
                self.shared.media_devices.clone(),
                self.shared.peer_factory.clone(),
                Arc::new(SignalRelay::new(
                    self.shared.directory.clone(),
                    session_id.clone(),
                )),
                self.shared.negotiator_settings.clone(),
                Arc::new(move |event: PeerEvent| {
                    let _ = tx.send(ControllerEvent::Peer { generation, event });
                }),
            ));
            if let Err(e) = negotiator.begin(&session_id).await {
                state.store.clear_session();
                return Err(e);
            }

            state.live = Some(LiveSession {
                generation,
                session_id: session_id.clone(),
                kind: SessionKind::Video,
                channel: None,
                negotiator: Some(negotiator.clone()),
                ticker: None,
            });
            (generation, negotiator)
        };
        info!(session_id = %session_id, state = %SessionState::Connecting, "Video session created");
        self.shared.poller.stop().await;

        if let Err(e) = self.open_channel(&session_id, generation).await {
            if self.abort_session(generation).await {
                return Err(self.surface(e));
            }
            debug!(session_id = %session_id, "Session ended while its channel was opening");
            return Err(e);
        }

        match negotiator
            .initialize(&session_id, is_offerer(self.shared.identity.role))
            .await
        {
            Ok(()) => {}
            Err(e @ FieldcallError::MediaAccessError(_)) => {
                if self.abort_session(generation).await {
                    self.shared
                        .notifications
                        .error("Failed to access camera/microphone");
                }
                e.log();
                return Err(e);
            }
            Err(e) => {
                // The session stays until the user ends it.
                warn!(
                    session_id = %session_id,
                    error_code = e.error_code(),
                    "Media negotiation failed: {}",
                    e
                );
                self.shared.notifications.error("Connection failed");
            }
        }

        let state = self.shared.state.lock().await;
        Ok(state.store.session().cloned().unwrap_or(session))
    }

    async fn open_channel(
        &self,
        session_id: &str,
        generation: u64,
    ) -> FieldcallResult<Arc<SignalingChannel>> {
        let tx = self.shared.events_tx.clone();
        let channel = SignalingChannel::open(
            self.shared.connector.as_ref(),
            session_id,
            &self.shared.identity,
            Box::new(move |event| {
                let _ = tx.send(ControllerEvent::Channel { generation, event });
            }),
        )
        .await?;

        let mut state = self.shared.state.lock().await;
        match state.live_for_mut(generation) {
            Some(live) => {
                live.channel = Some(channel.clone());
                Ok(channel)
            }
            None => {
                drop(state);
                channel.close().await;
                Err(FieldcallError::NoActiveSession)
            }
        }
    }

    /// Drops the live session of `generation` without notifying the
    /// service. Returns false when that session was already gone.
    async fn abort_session(&self, generation: u64) -> bool {
        let live = {
            let mut state = self.shared.state.lock().await;
            if state.live_for(generation).is_none() {
                return false;
            }
            state.store.clear_session();
            state.live.take()
        };

        if let Some(live) = live {
            info!(session_id = %live.session_id, "Session aborted");
            Self::release(live).await;
        }
        self.update_polling().await;
        true
    }

    /// Cancels the call timer, tears down media and closes the channel.
    async fn release(mut live: LiveSession) {
        if let Some(ticker) = live.ticker.take() {
            ticker.abort();
        }
        if let Some(negotiator) = live.negotiator.take() {
            negotiator.teardown().await;
        }
        if let Some(channel) = live.channel.take() {
            channel.close().await;
        }
        debug!(session_id = %live.session_id, kind = %live.kind, "Session resources released");
    }

    fn spawn_ticker(&self, generation: u64) -> JoinHandle<()> {
        let tx = self.shared.events_tx.clone();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(ControllerEvent::Tick { generation }).is_err() {
                    break;
                }
            }
        })
    }

    pub async fn toggle_video(&self) -> Option<bool> {
        self.live_negotiator().await?.toggle_video().await
    }

    pub async fn toggle_audio(&self) -> Option<bool> {
        self.live_negotiator().await?.toggle_audio().await
    }

    async fn live_negotiator(&self) -> Option<Arc<MediaNegotiator>> {
        self.shared
            .state
            .lock()
            .await
            .live
            .as_ref()
            .and_then(|l| l.negotiator.clone())
    }

    // ------------------------------------------------------------------
    // Chat sessions
    // ------------------------------------------------------------------

    /// Starts a direct chat with a responder and opens it.
    pub async fn start_chat(&self, responder_id: &str, topic: &str) -> FieldcallResult<Session> {
        self.require_role(Role::Requester, "start_chat")
            .map_err(|e| self.surface(e))?;

        let _op = self.shared.op_lock.lock().await;
        self.ensure_idle().await.map_err(|e| self.surface(e))?;

        let name = self
            .shared
            .state
            .lock()
            .await
            .store
            .responder(responder_id)
            .map(|r| r.name.clone())
            .unwrap_or_default();
        let topic = match topic.trim() {
            "" if name.is_empty() => "Direct chat".to_string(),
            "" => format!("Chat with {}", name),
            topic => topic.to_string(),
        };

        let started = self
            .shared
            .directory
            .start_chat(responder_id, &topic)
            .await
            .map_err(|e| self.surface(e))?;

        let session = self
            .enter_chat(
                &started.session_id,
                started.room_id,
                Counterpart::new(responder_id, name),
            )
            .await?;
        self.shared.notifications.success("Chat started!");
        Ok(session)
    }

    /// Reopens an existing chat thread.
    pub async fn open_chat(&self, chat: &ChatSession) -> FieldcallResult<Session> {
        let _op = self.shared.op_lock.lock().await;
        self.ensure_idle().await.map_err(|e| self.surface(e))?;

        let counterpart = chat.counterpart_for(&self.shared.identity);
        self.enter_chat(&chat.id, chat.room_id.clone(), counterpart)
            .await
    }

    async fn enter_chat(
        &self,
        session_id: &str,
        room_id: Option<String>,
        counterpart: Counterpart,
    ) -> FieldcallResult<Session> {
        let session = Session::new(
            session_id,
            room_id,
            SessionKind::Chat,
            counterpart,
            SessionState::Active,
        );

        let generation = {
            let mut state = self.shared.state.lock().await;
            state.store.set_session(session.clone())?;
            let generation = state.next_generation();
            state.live = Some(LiveSession {
                generation,
                session_id: session_id.to_string(),
                kind: SessionKind::Chat,
                channel: None,
                negotiator: None,
                ticker: None,
            });
            generation
        };
        info!(session_id = %session_id, state = %SessionState::Active, "Chat session opened");
        self.shared.poller.stop().await;

        match self.shared.directory.list_messages(session_id).await {
            Ok(history) => {
                let mut state = self.shared.state.lock().await;
                if state.live_for(generation).is_some() {
                    state.store.set_messages(history);
                }
            }
            Err(e) => {
                self.surface(e);
            }
        }

        if let Err(e) = self.open_channel(session_id, generation).await {
            if self.abort_session(generation).await {
                return Err(self.surface(e));
            }
            debug!(session_id = %session_id, "Session ended while its channel was opening");
            return Err(e);
        }
        Ok(session)
    }

    /// Sends a chat message with an optimistic local echo. Empty text is
    /// ignored.
    pub async fn send_chat(&self, text: &str) -> FieldcallResult<()> {
        let text = text.trim();
        if text.is_empty() {
            debug!("Ignoring empty chat message");
            return Ok(());
        }

        let echo = {
            let mut state = self.shared.state.lock().await;
            let session = match state.store.session() {
                Some(session) if session.is_chat() => session.clone(),
                Some(session) => {
                    return Err(FieldcallError::InvalidTransition {
                        from: session.kind.to_string(),
                        to: SessionKind::Chat.to_string(),
                    })
                }
                None => return Err(FieldcallError::NoActiveSession),
            };

            let echo = Message::local_echo(&session.id, &self.shared.identity, text);
            state.store.push_local_echo(echo.clone());
            echo
        };

        let client_id = echo.client_message_id.clone().unwrap_or_default();
        let outgoing = OutgoingMessage::text(text, echo.client_message_id.clone());
        let result = self
            .shared
            .directory
            .send_message(&echo.session_id, &outgoing)
            .await;

        let delivery = if result.is_ok() {
            Delivery::Confirmed
        } else {
            Delivery::Failed
        };
        self.shared
            .state
            .lock()
            .await
            .store
            .mark_delivery(&client_id, delivery);

        result.map_err(|e| self.surface(e))
    }

    // ------------------------------------------------------------------
    // Ending
    // ------------------------------------------------------------------

    /// Ends the live session. Idempotent: a second call finds nothing to
    /// release and does not contact the service again.
    pub async fn end_session(&self) -> FieldcallResult<()> {
        let live = {
            let mut state = self.shared.state.lock().await;
            match state.live.take() {
                Some(live) => {
                    state.store.set_session_state(SessionState::Ended);
                    live
                }
                None => {
                    debug!("end_session with no live session");
                    return Ok(());
                }
            }
        };

        let session_id = live.session_id.clone();
        let kind = live.kind;
        Self::release(live).await;

        if let Err(e) = self.shared.directory.end_session(&session_id).await {
            warn!(
                session_id = %session_id,
                error_code = e.error_code(),
                "Failed to report session end: {}",
                e
            );
        }

        {
            let mut state = self.shared.state.lock().await;
            if kind == SessionKind::Video
                && state
                    .store
                    .request(&session_id)
                    .is_some_and(|r| r.is_accepted())
            {
                let _ = state.store.mark_request(&session_id, RequestStatus::Ended);
            }
            state.store.clear_session();
        }

        info!(session_id = %session_id, kind = %kind, "Session ended");
        self.shared.notifications.success("Session ended");
        self.update_polling().await;
        Ok(())
    }

    /// Ends any live session, stops polling and the event loop.
    pub async fn shutdown(&self) {
        if let Err(e) = self.end_session().await {
            warn!("Failed to end session during shutdown: {}", e);
        }
        self.shared.poller.stop().await;
        if let Some(handle) = self.shared.event_loop.lock().await.take() {
            handle.abort();
        }
    }

    // ------------------------------------------------------------------
    // View and notifications
    // ------------------------------------------------------------------

    /// Polling only runs while the owning view is visible.
    pub async fn set_view_visible(&self, visible: bool) {
        self.shared.state.lock().await.view_visible = visible;
        self.update_polling().await;
    }

    pub async fn flow_state(&self) -> SessionState {
        self.shared
            .state
            .lock()
            .await
            .store
            .flow_state(self.shared.identity.role)
    }

    pub async fn state(&self) -> SessionState {
        self.shared.state.lock().await.store.state()
    }

    pub async fn session(&self) -> Option<Session> {
        self.shared.state.lock().await.store.session().cloned()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let (state, flow_state, session, messages, negotiator) = {
            let guard = self.shared.state.lock().await;
            (
                guard.store.state(),
                guard.store.flow_state(self.shared.identity.role),
                guard.store.session().cloned(),
                guard.store.messages().to_vec(),
                guard.live.as_ref().and_then(|l| l.negotiator.clone()),
            )
        };

        let negotiation = match negotiator {
            Some(negotiator) => Some(negotiator.state().await),
            None => None,
        };

        SessionSnapshot {
            state,
            flow_state,
            session,
            negotiation,
            messages,
            notification: self.shared.notifications.current(),
        }
    }

    pub fn acknowledge_notification(&self, id: u64) -> bool {
        self.shared.notifications.acknowledge(id)
    }

    /// Runs the follow-up attached to a notification.
    pub async fn perform_action(&self, action: &NotificationAction) -> FieldcallResult<Session> {
        match action {
            NotificationAction::JoinCall { call } => self.join_active_call(call).await,
            NotificationAction::StartCall { request_id } => self.start_call(request_id).await,
        }
    }

    /// Starts or stops the poller to match the current state.
    async fn update_polling(&self) {
        let should_run = {
            let state = self.shared.state.lock().await;
            self.shared.config.polling.enabled
                && state.view_visible
                && state.live.is_none()
                && (self.shared.identity.is_responder() || state.store.has_pending_request())
        };

        if should_run {
            self.shared.poller.start().await;
        } else {
            self.shared.poller.stop().await;
        }
    }
}

/// Short text for a notification; the code and suggestion stay in logs.
fn user_message(err: &FieldcallError) -> String {
    match err {
        FieldcallError::ValidationError(message) => message.clone(),
        FieldcallError::MediaAccessError(_) => "Failed to access camera/microphone".to_string(),
        FieldcallError::ApiStatus { message, .. } if !message.is_empty() => message.clone(),
        other => {
            let text = other.to_string();
            match text.split_once("] ") {
                Some((_, rest)) => rest.to_string(),
                None => text,
            }
        }
    }
}

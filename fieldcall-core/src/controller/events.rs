use std::sync::Weak;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::media::PeerEvent;
use crate::models::{
    ConnectionState, Notification, NotificationAction, RequestStatus, SessionKind, SessionState,
};
use crate::poller::PollFact;
use crate::signaling::ChannelEvent;

use super::{SessionController, Shared};

/// Asynchronous inputs to the controller. Session-scoped events carry the
/// generation of the session that produced them.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    Channel { generation: u64, event: ChannelEvent },
    Peer { generation: u64, event: PeerEvent },
    Tick { generation: u64 },
    Poll(PollFact),
}

/// Drains the mailbox one event at a time until the controller is dropped.
pub(super) async fn run_event_loop(
    shared: Weak<Shared>,
    mut events_rx: mpsc::UnboundedReceiver<ControllerEvent>,
) {
    while let Some(event) = events_rx.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        SessionController { shared }.handle_event(event).await;
    }
    debug!("Controller event loop finished");
}

impl SessionController {
    pub(super) async fn handle_event(&self, event: ControllerEvent) {
        match event {
            ControllerEvent::Channel { generation, event } => {
                self.on_channel_event(generation, event).await
            }
            ControllerEvent::Peer { generation, event } => {
                self.on_peer_event(generation, event).await
            }
            ControllerEvent::Tick { generation } => self.on_tick(generation).await,
            ControllerEvent::Poll(fact) => self.reconcile(fact).await,
        }
    }

    async fn on_channel_event(&self, generation: u64, event: ChannelEvent) {
        match event {
            ChannelEvent::Joined { user_name, role, .. } => {
                if self.shared.state.lock().await.live_for(generation).is_none() {
                    return;
                }
                let who = if user_name.is_empty() {
                    role.map(|r| r.to_string()).unwrap_or_else(|| "Participant".to_string())
                } else {
                    user_name
                };
                self.shared
                    .notifications
                    .info(format!("{} joined the session", who));
            }
            ChannelEvent::Signal { kind, payload } => {
                let negotiator = {
                    let state = self.shared.state.lock().await;
                    state.live_for(generation).and_then(|l| l.negotiator.clone())
                };
                let Some(negotiator) = negotiator else {
                    debug!(kind = %kind, "Signal without a media session, dropping");
                    return;
                };
                if let Err(e) = negotiator.apply_remote_signal(kind, payload).await {
                    warn!(
                        kind = %kind,
                        error_code = e.error_code(),
                        "Failed to apply signal: {}",
                        e
                    );
                }
            }
            ChannelEvent::Message(message) => {
                let mut state = self.shared.state.lock().await;
                let Some(live) = state.live_for(generation) else {
                    return;
                };
                if live.kind != SessionKind::Chat || live.session_id != message.session_id {
                    trace!(session_id = %message.session_id, "Message for another session");
                    return;
                }
                state.store.append_message(message);
            }
            ChannelEvent::Closed { reason } => self.on_remote_close(generation, reason).await,
        }
    }

    /// A close nobody asked for ends the session as if the other party
    /// had ended it. The service is not notified.
    async fn on_remote_close(&self, generation: u64, reason: String) {
        let live = {
            let mut state = self.shared.state.lock().await;
            if state.live_for(generation).is_none() {
                return;
            }
            state.store.set_session_state(SessionState::Ended);
            state.live.take()
        };
        let Some(live) = live else {
            return;
        };

        let session_id = live.session_id.clone();
        warn!(session_id = %session_id, reason = %reason, "Session ended by remote close");
        Self::release(live).await;

        self.shared.state.lock().await.store.clear_session();
        self.shared
            .notifications
            .error("Connection lost. The session has ended.");
        self.update_polling().await;
    }

    async fn on_peer_event(&self, generation: u64, event: PeerEvent) {
        let negotiator = {
            let state = self.shared.state.lock().await;
            state.live_for(generation).and_then(|l| l.negotiator.clone())
        };
        let Some(negotiator) = negotiator else {
            return;
        };

        match negotiator.handle_peer_event(event).await {
            Some(ConnectionState::Connected) => {
                let mut state = self.shared.state.lock().await;
                if state.store.state() != SessionState::Connecting {
                    return;
                }
                state.store.set_session_state(SessionState::Active);
                let ticker = self.spawn_ticker(generation);
                match state.live_for_mut(generation) {
                    Some(live) => {
                        if let Some(previous) = live.ticker.replace(ticker) {
                            previous.abort();
                        }
                        info!(session_id = %live.session_id, "Call connected");
                    }
                    None => ticker.abort(),
                }
            }
            Some(ConnectionState::Failed) => {
                self.shared.notifications.error("Connection failed");
            }
            _ => {}
        }
    }

    async fn on_tick(&self, generation: u64) {
        let negotiator = {
            let state = self.shared.state.lock().await;
            state.live_for(generation).and_then(|l| l.negotiator.clone())
        };
        if let Some(negotiator) = negotiator {
            let elapsed = negotiator.tick().await;
            trace!(elapsed, "Call tick");
        }
    }

    /// Merges one server fact into the store. Poll results and explicit
    /// refreshes both land here; nothing in this path starts or ends a
    /// session.
    pub(super) async fn reconcile(&self, fact: PollFact) {
        match fact {
            PollFact::OwnRequests(requests) => {
                let accepted: Vec<String> = {
                    let mut state = self.shared.state.lock().await;
                    state
                        .store
                        .sync_requests(requests)
                        .into_iter()
                        .filter(|c| {
                            c.from == RequestStatus::Pending && c.to == RequestStatus::Accepted
                        })
                        .map(|c| c.request_id)
                        .collect()
                };

                for request_id in accepted {
                    info!(request_id = %request_id, "Video request accepted by responder");
                    self.shared.notifications.show(
                        Notification::success(
                            "Video call request accepted! You can now start the call.",
                        )
                        .with_action(NotificationAction::StartCall { request_id }),
                    );
                }
                self.update_polling().await;
            }
            PollFact::PendingRequests(requests) => {
                let mut state = self.shared.state.lock().await;
                let changes = state.store.sync_requests(requests);
                if !changes.is_empty() {
                    debug!(changes = changes.len(), "Pending requests reconciled");
                }
            }
            PollFact::ActiveCalls(calls) => {
                let offer = {
                    let mut state = self.shared.state.lock().await;
                    state
                        .offered_calls
                        .retain(|id| calls.iter().any(|c| &c.id == id));
                    state.store.set_active_calls(calls.clone());

                    if state.live.is_some() || !self.shared.identity.is_responder() {
                        None
                    } else {
                        let next = calls
                            .iter()
                            .find(|c| !state.offered_calls.contains(&c.id))
                            .cloned();
                        if let Some(call) = &next {
                            state.offered_calls.insert(call.id.clone());
                        }
                        next
                    }
                };

                if let Some(call) = offer {
                    info!(call_id = %call.id, "Offering to join active call");
                    let topic = call.topic.clone().unwrap_or_default();
                    let message = if topic.is_empty() {
                        format!("{} is waiting in a video call", call.requester_name)
                    } else {
                        format!("{} is waiting in a video call: {}", call.requester_name, topic)
                    };
                    self.shared.notifications.show(
                        Notification::info(message)
                            .with_action(NotificationAction::JoinCall { call }),
                    );
                }
            }
        }
    }
}

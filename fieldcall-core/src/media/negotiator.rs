//! Media Negotiator: local capture, one peer connection, and the
//! offer/answer/ICE exchange over a [`SignalSender`].
//!
//! The requester always offers and the responder always answers; see
//! [`is_offerer`]. Signals that arrive before the peer connection exists
//! are dropped or queued according to [`EarlySignalPolicy`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{EarlySignalPolicy, FieldcallConfig};
use crate::error::{FieldcallError, FieldcallResult};
use crate::models::{ConnectionState, LocalMedia, NegotiationState, Role};
use crate::signaling::{SignalKind, SignalSender};

use super::traits::{
    IceCandidate, LocalMediaStream, MediaConstraints, MediaDevices, PeerConfig, PeerConnection,
    PeerConnectionFactory, PeerConnectionState, PeerEvent, SessionDescription, TrackKind,
};

/// The offerer is a pure function of role, never of who pressed "start".
pub fn is_offerer(role: Role) -> bool {
    role == Role::Requester
}

#[derive(Debug, Clone)]
pub struct NegotiatorSettings {
    pub constraints: MediaConstraints,
    pub peer_config: PeerConfig,
    pub offer_delay: Duration,
    pub early_signal_policy: EarlySignalPolicy,
    pub early_signal_capacity: usize,
}

impl NegotiatorSettings {
    pub fn from_config(config: &FieldcallConfig) -> Self {
        Self {
            constraints: MediaConstraints::from(&config.media),
            peer_config: PeerConfig::from(&config.media),
            offer_delay: config.session.offer_delay(),
            early_signal_policy: config.session.early_signal_policy,
            early_signal_capacity: config.session.early_signal_capacity,
        }
    }
}

#[derive(Default)]
struct NegotiatorInner {
    session_id: Option<String>,
    stream: Option<LocalMediaStream>,
    peer: Option<Arc<dyn PeerConnection>>,
    state: NegotiationState,
    early_signals: VecDeque<(SignalKind, serde_json::Value)>,
    offer_task: Option<JoinHandle<()>>,
    started: bool,
    torn_down: bool,
}

impl NegotiatorInner {
    fn begin(&mut self, session_id: &str) -> FieldcallResult<()> {
        if self.torn_down || self.session_id.is_some() {
            return Err(FieldcallError::InvalidTransition {
                from: self.state.connection_state.to_string(),
                to: ConnectionState::Connecting.to_string(),
            });
        }
        self.session_id = Some(session_id.to_string());
        self.state.connection_state = ConnectionState::Connecting;
        Ok(())
    }
}

pub struct MediaNegotiator {
    devices: Arc<dyn MediaDevices>,
    factory: Arc<dyn PeerConnectionFactory>,
    signals: Arc<dyn SignalSender>,
    settings: NegotiatorSettings,
    on_peer_event: Arc<dyn Fn(PeerEvent) + Send + Sync>,
    inner: Mutex<NegotiatorInner>,
}

impl MediaNegotiator {
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        factory: Arc<dyn PeerConnectionFactory>,
        signals: Arc<dyn SignalSender>,
        settings: NegotiatorSettings,
        on_peer_event: Arc<dyn Fn(PeerEvent) + Send + Sync>,
    ) -> Self {
        Self {
            devices,
            factory,
            signals,
            settings,
            on_peer_event,
            inner: Mutex::new(NegotiatorInner::default()),
        }
    }

    /// Binds the negotiator to a session and moves it to `connecting`
    /// before any media or channel work starts.
    pub async fn begin(&self, session_id: &str) -> FieldcallResult<()> {
        self.inner.lock().await.begin(session_id)
    }

    /// Acquires capture and builds the peer connection. Calls [`Self::begin`]
    /// first when the caller has not. For the offerer the
    /// offer is sent from a background task after the settling delay, so
    /// this returns as soon as the peer connection is ready.
    ///
    /// `MediaAccessError` is fatal to the call. Other failures mark the
    /// connection failed and are returned for the caller to surface.
    pub async fn initialize(
        self: &Arc<Self>,
        session_id: &str,
        is_offerer: bool,
    ) -> FieldcallResult<()> {
        {
            let mut inner = self.inner.lock().await;
            let begun = !inner.torn_down
                && !inner.started
                && inner.session_id.as_deref() == Some(session_id);
            if !begun {
                inner.begin(session_id)?;
            }
            inner.started = true;
        }

        debug!(session_id = %session_id, is_offerer, "Acquiring local media");
        let stream = self
            .devices
            .acquire(&self.settings.constraints)
            .await
            .map_err(|e| match e {
                FieldcallError::MediaAccessError(_) => e,
                other => FieldcallError::MediaAccessError(other.to_string()),
            })?;

        let callback = self.on_peer_event.clone();
        let peer = match self
            .factory
            .create(&self.settings.peer_config, Box::new(move |event| callback(event)))
            .await
        {
            Ok(peer) => peer,
            Err(e) => {
                stream.stop_all();
                self.mark_failed().await;
                return Err(e);
            }
        };

        for track in &stream.tracks {
            if let Err(e) = peer.add_track(track.clone()).await {
                stream.stop_all();
                peer.close().await;
                self.mark_failed().await;
                return Err(e);
            }
        }

        let queued = {
            let mut inner = self.inner.lock().await;
            if inner.torn_down {
                drop(inner);
                debug!(session_id = %session_id, "Torn down during initialize, releasing media");
                stream.stop_all();
                peer.close().await;
                return Ok(());
            }

            inner.state.local_media = LocalMedia {
                video: stream
                    .track(TrackKind::Video)
                    .map(|t| t.is_enabled())
                    .unwrap_or(false),
                audio: stream
                    .track(TrackKind::Audio)
                    .map(|t| t.is_enabled())
                    .unwrap_or(false),
            };
            inner.stream = Some(stream);
            inner.peer = Some(peer);
            std::mem::take(&mut inner.early_signals)
        };

        if !queued.is_empty() {
            debug!(session_id = %session_id, count = queued.len(), "Flushing queued signals");
        }
        for (kind, payload) in queued {
            if let Err(e) = self.apply_remote_signal(kind, payload).await {
                warn!(session_id = %session_id, kind = %kind, "Queued signal failed: {}", e);
            }
        }

        if is_offerer {
            let negotiator = Arc::clone(self);
            let delay = self.settings.offer_delay;
            let task = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(e) = negotiator.send_offer().await {
                    warn!(error_code = e.error_code(), "Offer failed: {}", e);
                }
            });

            let mut inner = self.inner.lock().await;
            if inner.torn_down {
                task.abort();
            } else {
                inner.offer_task = Some(task);
            }
        }

        info!(session_id = %session_id, is_offerer, "Media negotiator initialized");
        Ok(())
    }

    async fn send_offer(&self) -> FieldcallResult<()> {
        let Some(peer) = self.live_peer().await else {
            return Ok(());
        };

        let offer = match create_local(&*peer, SignalKind::Offer).await {
            Ok(offer) => offer,
            Err(e) => {
                self.mark_failed().await;
                return Err(e);
            }
        };

        if let Err(e) = self
            .signals
            .send_signal(SignalKind::Offer, serde_json::to_value(&offer)?)
            .await
        {
            warn!(error_code = e.error_code(), "Failed to send offer: {}", e);
        }
        Ok(())
    }

    /// Applies an inbound signal. An offer is answered, an answer completes
    /// the local side and a candidate is added to the peer.
    pub async fn apply_remote_signal(
        &self,
        kind: SignalKind,
        payload: serde_json::Value,
    ) -> FieldcallResult<()> {
        let peer = {
            let mut inner = self.inner.lock().await;
            if inner.torn_down {
                debug!(kind = %kind, "Ignoring signal after teardown");
                return Ok(());
            }

            match inner.peer.clone() {
                Some(peer) => peer,
                None => {
                    match self.settings.early_signal_policy {
                        EarlySignalPolicy::Drop => {
                            debug!(kind = %kind, "Dropping signal received before peer connection");
                        }
                        EarlySignalPolicy::Queue => {
                            if inner.early_signals.len() >= self.settings.early_signal_capacity {
                                inner.early_signals.pop_front();
                                warn!(kind = %kind, "Early signal queue full, dropped oldest");
                            }
                            inner.early_signals.push_back((kind, payload));
                        }
                    }
                    return Ok(());
                }
            }
        };

        match kind {
            SignalKind::Offer => {
                let offer: SessionDescription = parse_payload(kind, payload)?;
                peer.set_remote_description(offer).await?;
                let answer = create_local(&*peer, SignalKind::Answer).await?;
                self.signals
                    .send_signal(SignalKind::Answer, serde_json::to_value(&answer)?)
                    .await?;
            }
            SignalKind::Answer => {
                let answer: SessionDescription = parse_payload(kind, payload)?;
                peer.set_remote_description(answer).await?;
            }
            SignalKind::IceCandidate => {
                let candidate: IceCandidate = parse_payload(kind, payload)?;
                peer.add_ice_candidate(candidate).await?;
            }
        }
        Ok(())
    }

    /// Reacts to a peer connection callback. Returns the new connection
    /// state when it changed. `Failed` is reported once and is final.
    pub async fn handle_peer_event(&self, event: PeerEvent) -> Option<ConnectionState> {
        match event {
            PeerEvent::LocalIceCandidate(candidate) => {
                if self.inner.lock().await.torn_down {
                    return None;
                }
                match serde_json::to_value(&candidate) {
                    Ok(payload) => {
                        if let Err(e) = self
                            .signals
                            .send_signal(SignalKind::IceCandidate, payload)
                            .await
                        {
                            warn!(
                                error_code = e.error_code(),
                                "Failed to send ICE candidate: {}",
                                e
                            );
                        }
                    }
                    Err(e) => warn!("Failed to encode ICE candidate: {}", e),
                }
                None
            }
            PeerEvent::RemoteTrack(kind) => {
                debug!(kind = %kind, "Remote track received");
                self.transition(ConnectionState::Connected).await
            }
            PeerEvent::ConnectionStateChanged(PeerConnectionState::Connected) => {
                self.transition(ConnectionState::Connected).await
            }
            PeerEvent::ConnectionStateChanged(PeerConnectionState::Failed) => {
                self.transition(ConnectionState::Failed).await
            }
            PeerEvent::ConnectionStateChanged(other) => {
                debug!(state = ?other, "Peer connection state changed");
                None
            }
        }
    }

    async fn transition(&self, next: ConnectionState) -> Option<ConnectionState> {
        let mut inner = self.inner.lock().await;
        if inner.torn_down {
            return None;
        }

        let current = inner.state.connection_state;
        let allowed = matches!(
            (current, next),
            (ConnectionState::Connecting, ConnectionState::Connected)
                | (ConnectionState::Connecting, ConnectionState::Failed)
                | (ConnectionState::Connected, ConnectionState::Failed)
        );
        if !allowed {
            return None;
        }

        inner.state.connection_state = next;
        info!(
            session_id = inner.session_id.as_deref().unwrap_or_default(),
            from = %current,
            to = %next,
            "Connection state changed"
        );
        Some(next)
    }

    async fn mark_failed(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.torn_down {
            inner.state.connection_state = ConnectionState::Failed;
        }
    }

    pub async fn toggle_video(&self) -> Option<bool> {
        self.toggle(TrackKind::Video).await
    }

    pub async fn toggle_audio(&self) -> Option<bool> {
        self.toggle(TrackKind::Audio).await
    }

    /// Flips the track's enabled flag. No renegotiation happens and the
    /// connection state is untouched.
    async fn toggle(&self, kind: TrackKind) -> Option<bool> {
        let mut inner = self.inner.lock().await;
        let enabled = {
            let track = inner.stream.as_ref()?.track(kind)?;
            let enabled = !track.is_enabled();
            track.set_enabled(enabled);
            enabled
        };

        match kind {
            TrackKind::Video => inner.state.local_media.video = enabled,
            TrackKind::Audio => inner.state.local_media.audio = enabled,
        }
        debug!(kind = %kind, enabled, "Local track toggled");
        Some(enabled)
    }

    /// One second of call time; counts only while connected.
    pub async fn tick(&self) -> u64 {
        let mut inner = self.inner.lock().await;
        if inner.state.connection_state == ConnectionState::Connected {
            inner.state.elapsed_seconds += 1;
        }
        inner.state.elapsed_seconds
    }

    pub async fn state(&self) -> NegotiationState {
        self.inner.lock().await.state
    }

    /// Stops local tracks and closes the peer connection. Returns true only
    /// for the call that actually released resources.
    pub async fn teardown(&self) -> bool {
        let (stream, peer, session_id) = {
            let mut inner = self.inner.lock().await;
            if inner.torn_down {
                return false;
            }
            inner.torn_down = true;
            inner.early_signals.clear();
            if let Some(task) = inner.offer_task.take() {
                task.abort();
            }
            inner.state.connection_state = ConnectionState::Idle;
            (inner.stream.take(), inner.peer.take(), inner.session_id.clone())
        };

        if let Some(stream) = stream {
            stream.stop_all();
        }
        if let Some(peer) = peer {
            peer.close().await;
        }

        info!(
            session_id = session_id.as_deref().unwrap_or_default(),
            "Media negotiator torn down"
        );
        true
    }

    async fn live_peer(&self) -> Option<Arc<dyn PeerConnection>> {
        let inner = self.inner.lock().await;
        if inner.torn_down {
            return None;
        }
        inner.peer.clone()
    }
}

async fn create_local(
    peer: &dyn PeerConnection,
    kind: SignalKind,
) -> FieldcallResult<SessionDescription> {
    let description = match kind {
        SignalKind::Offer => peer.create_offer().await?,
        _ => peer.create_answer().await?,
    };
    peer.set_local_description(description.clone()).await?;
    Ok(description)
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    kind: SignalKind,
    payload: serde_json::Value,
) -> FieldcallResult<T> {
    serde_json::from_value(payload)
        .map_err(|e| FieldcallError::SignalingError(format!("malformed {} payload: {}", kind, e)))
}

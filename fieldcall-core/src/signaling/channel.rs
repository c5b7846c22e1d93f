use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::{FieldcallError, FieldcallResult};
use crate::models::{Identity, Message, Role};

use super::frame::{ChannelFrame, SignalKind};
use super::traits::{ChannelConnector, ChannelTransport};

/// Inbound events, already filtered of our own frames.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Joined {
        user_id: String,
        user_name: String,
        role: Option<Role>,
    },
    Signal {
        kind: SignalKind,
        payload: serde_json::Value,
    },
    Message(Message),
    /// The connection closed without a local `close()`.
    Closed { reason: String },
}

pub type ChannelEventCallback = Box<dyn Fn(ChannelEvent) + Send + Sync>;

/// The session-scoped channel: announces the local actor on open, reads
/// frames in a background task and is closed exactly once.
pub struct SignalingChannel {
    session_id: String,
    identity: Identity,
    transport: Arc<dyn ChannelTransport>,
    closed: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SignalingChannel {
    pub async fn open(
        connector: &dyn ChannelConnector,
        session_id: &str,
        identity: &Identity,
        on_event: ChannelEventCallback,
    ) -> FieldcallResult<Arc<Self>> {
        let transport = connector.connect(session_id).await?;

        let joined = ChannelFrame::UserJoined {
            user_id: identity.user_id.clone(),
            user_name: identity.display_name.clone(),
            role: Some(identity.role),
        };
        if let Err(e) = transport.send(&joined).await {
            let _ = transport.close().await;
            return Err(FieldcallError::ChannelConnectFailed(e.to_string()));
        }

        let channel = Arc::new(Self {
            session_id: session_id.to_string(),
            identity: identity.clone(),
            transport: transport.clone(),
            closed: Arc::new(AtomicBool::new(false)),
            reader: Mutex::new(None),
        });

        let handle = tokio::spawn(read_loop(
            transport,
            channel.closed.clone(),
            channel.session_id.clone(),
            channel.identity.user_id.clone(),
            on_event,
        ));
        *channel.reader.lock().await = Some(handle);

        info!(session_id = %session_id, "Signaling channel opened");
        Ok(channel)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes the channel. Only the first call does anything; it returns
    /// true. No `Closed` event is emitted for a local close.
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            if let Some(reader) = self.reader.lock().await.take() {
                reader.abort();
            }
            return false;
        }

        if let Err(e) = self.transport.close().await {
            debug!(session_id = %self.session_id, "Transport close reported: {}", e);
        }
        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }

        info!(session_id = %self.session_id, "Signaling channel closed");
        true
    }
}

async fn read_loop(
    transport: Arc<dyn ChannelTransport>,
    closed: Arc<AtomicBool>,
    session_id: String,
    own_id: String,
    on_event: ChannelEventCallback,
) {
    loop {
        match transport.recv().await {
            Ok(Some(frame)) => {
                if let Some(event) = to_event(frame, &own_id) {
                    on_event(event);
                }
            }
            Ok(None) => {
                if !closed.swap(true, Ordering::SeqCst) {
                    warn!(session_id = %session_id, "Signaling channel closed by remote");
                    on_event(ChannelEvent::Closed {
                        reason: "connection closed by remote".to_string(),
                    });
                }
                break;
            }
            Err(FieldcallError::TransportClosed(reason)) => {
                if !closed.swap(true, Ordering::SeqCst) {
                    warn!(session_id = %session_id, "Signaling channel dropped: {}", reason);
                    on_event(ChannelEvent::Closed { reason });
                }
                break;
            }
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    error_code = e.error_code(),
                    "Ignoring frame: {}",
                    e
                );
            }
        }
    }
}

fn to_event(frame: ChannelFrame, own_id: &str) -> Option<ChannelEvent> {
    match frame {
        ChannelFrame::UserJoined {
            user_id,
            user_name,
            role,
        } => (user_id != own_id).then_some(ChannelEvent::Joined {
            user_id,
            user_name,
            role,
        }),
        ChannelFrame::WebrtcSignal {
            signal_type,
            signal_data,
            sender_id,
        } => {
            if sender_id.as_deref() == Some(own_id) {
                trace!(kind = %signal_type, "Ignoring own signal");
                return None;
            }
            Some(ChannelEvent::Signal {
                kind: signal_type,
                payload: signal_data,
            })
        }
        ChannelFrame::NewMessage { message } => Some(ChannelEvent::Message(message)),
    }
}

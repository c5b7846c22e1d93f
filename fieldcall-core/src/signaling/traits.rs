use std::sync::Arc;

use async_trait::async_trait;

use crate::error::FieldcallResult;

use super::frame::{ChannelFrame, SignalKind};

/// One open bidirectional connection for a session id.
///
/// `recv` returns `Ok(None)` once the connection has closed cleanly,
/// `Err(SignalingError)` for a frame that could not be decoded (the
/// connection is still usable) and `Err(TransportClosed)` when the
/// connection dropped.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn send(&self, frame: &ChannelFrame) -> FieldcallResult<()>;

    async fn recv(&self) -> FieldcallResult<Option<ChannelFrame>>;

    async fn close(&self) -> FieldcallResult<()>;
}

/// Opens transports addressed by session id. Reconnection is not this
/// trait's concern; an unexpected close ends the session.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(&self, session_id: &str) -> FieldcallResult<Arc<dyn ChannelTransport>>;
}

/// Outbound half used by the media negotiator.
#[async_trait]
pub trait SignalSender: Send + Sync {
    async fn send_signal(&self, kind: SignalKind, payload: serde_json::Value)
        -> FieldcallResult<()>;
}

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::error::FieldcallResult;
use crate::signaling::{SignalKind, SignalSender};

use super::traits::{DirectoryClient, OutgoingSignal};

/// Sends a session's negotiation signals through the consultation service,
/// which pushes each one to the other participant's channel.
pub struct SignalRelay {
    directory: Arc<dyn DirectoryClient>,
    session_id: String,
}

impl SignalRelay {
    pub fn new(directory: Arc<dyn DirectoryClient>, session_id: impl Into<String>) -> Self {
        Self {
            directory,
            session_id: session_id.into(),
        }
    }
}

#[async_trait]
impl SignalSender for SignalRelay {
    async fn send_signal(
        &self,
        kind: SignalKind,
        payload: serde_json::Value,
    ) -> FieldcallResult<()> {
        trace!(session_id = %self.session_id, kind = %kind, "Relaying signal");
        let signal = OutgoingSignal {
            signal_type: kind,
            signal_data: payload,
        };
        self.directory.send_signal(&self.session_id, &signal).await
    }
}

//! In-process relay standing in for the consultation service's channel
//! endpoint. Frames a member sends are relayed to the other members of the
//! same session room; [`MemoryHub::broadcast`] pushes a server-originated
//! frame to every member. When any member closes, the room is torn down and
//! the remaining members observe a clean close.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::error::{FieldcallError, FieldcallResult};

use super::frame::ChannelFrame;
use super::traits::{ChannelConnector, ChannelTransport};

struct Member {
    id: u64,
    tx: mpsc::UnboundedSender<ChannelFrame>,
}

#[derive(Default)]
struct HubInner {
    rooms: Mutex<HashMap<String, Vec<Member>>>,
    next_member: AtomicU64,
    refuse_connections: AtomicBool,
}

#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<HubInner>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `connect` calls fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    pub async fn member_count(&self, session_id: &str) -> usize {
        self.inner
            .rooms
            .lock()
            .await
            .get(session_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Delivers a server-originated frame to every member of the room.
    pub async fn broadcast(&self, session_id: &str, frame: ChannelFrame) -> usize {
        let rooms = self.inner.rooms.lock().await;
        rooms
            .get(session_id)
            .map(|members| {
                members
                    .iter()
                    .filter(|m| m.tx.send(frame.clone()).is_ok())
                    .count()
            })
            .unwrap_or(0)
    }

    /// Simulates a network drop: every member sees the connection end.
    pub async fn drop_room(&self, session_id: &str) -> bool {
        self.inner.rooms.lock().await.remove(session_id).is_some()
    }

    async fn relay(
        &self,
        session_id: &str,
        from: u64,
        frame: &ChannelFrame,
    ) -> FieldcallResult<()> {
        let rooms = self.inner.rooms.lock().await;
        let members = rooms
            .get(session_id)
            .filter(|members| members.iter().any(|m| m.id == from))
            .ok_or_else(|| FieldcallError::TransportClosed("room no longer exists".to_string()))?;

        for member in members.iter().filter(|m| m.id != from) {
            let _ = member.tx.send(frame.clone());
        }
        Ok(())
    }

    async fn leave(&self, session_id: &str, member_id: u64) {
        let mut rooms = self.inner.rooms.lock().await;
        let was_member = rooms
            .get(session_id)
            .map(|members| members.iter().any(|m| m.id == member_id))
            .unwrap_or(false);

        if was_member {
            rooms.remove(session_id);
            debug!(session_id = %session_id, member_id, "Memory room closed");
        }
    }
}

#[async_trait]
impl ChannelConnector for MemoryHub {
    async fn connect(&self, session_id: &str) -> FieldcallResult<Arc<dyn ChannelTransport>> {
        if self.inner.refuse_connections.load(Ordering::SeqCst) {
            return Err(FieldcallError::ChannelConnectFailed(
                "memory hub refused the connection".to_string(),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_member.fetch_add(1, Ordering::SeqCst);

        self.inner
            .rooms
            .lock()
            .await
            .entry(session_id.to_string())
            .or_default()
            .push(Member { id, tx });

        Ok(Arc::new(MemoryTransport {
            hub: self.clone(),
            session_id: session_id.to_string(),
            member_id: id,
            rx: Mutex::new(rx),
        }))
    }
}

pub struct MemoryTransport {
    hub: MemoryHub,
    session_id: String,
    member_id: u64,
    rx: Mutex<mpsc::UnboundedReceiver<ChannelFrame>>,
}

#[async_trait]
impl ChannelTransport for MemoryTransport {
    async fn send(&self, frame: &ChannelFrame) -> FieldcallResult<()> {
        self.hub.relay(&self.session_id, self.member_id, frame).await
    }

    async fn recv(&self) -> FieldcallResult<Option<ChannelFrame>> {
        Ok(self.rx.lock().await.recv().await)
    }

    async fn close(&self) -> FieldcallResult<()> {
        self.hub.leave(&self.session_id, self.member_id).await;
        Ok(())
    }
}

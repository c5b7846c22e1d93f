use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::info;

use crate::config::FieldcallConfig;
use crate::directory::DirectoryClient;
use crate::error::{FieldcallError, FieldcallResult};
use crate::media::{
    HeadlessMediaDevices, HeadlessPeerFactory, MediaDevices, NegotiatorSettings,
    PeerConnectionFactory,
};
use crate::models::Identity;
use crate::notifications::NotificationCenter;
use crate::poller::ReconciliationPoller;
use crate::signaling::ChannelConnector;
use crate::store::SessionStore;

use super::events::{run_event_loop, ControllerEvent};
use super::{ControllerState, SessionController, Shared};

/// Assembles a [`SessionController`] from its collaborators. Capture and
/// peer connections default to the headless backends.
pub struct SessionControllerBuilder {
    identity: Option<Identity>,
    config: FieldcallConfig,
    directory: Option<Arc<dyn DirectoryClient>>,
    connector: Option<Arc<dyn ChannelConnector>>,
    media_devices: Option<Arc<dyn MediaDevices>>,
    peer_factory: Option<Arc<dyn PeerConnectionFactory>>,
    view_visible: bool,
}

impl SessionControllerBuilder {
    pub fn new() -> Self {
        Self {
            identity: None,
            config: FieldcallConfig::default(),
            directory: None,
            connector: None,
            media_devices: None,
            peer_factory: None,
            view_visible: false,
        }
    }

    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn config(mut self, config: FieldcallConfig) -> Self {
        self.config = config;
        self
    }

    pub fn directory(mut self, directory: Arc<dyn DirectoryClient>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn connector(mut self, connector: Arc<dyn ChannelConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn media_devices(mut self, devices: Arc<dyn MediaDevices>) -> Self {
        self.media_devices = Some(devices);
        self
    }

    pub fn peer_factory(mut self, factory: Arc<dyn PeerConnectionFactory>) -> Self {
        self.peer_factory = Some(factory);
        self
    }

    /// Whether the owning view starts out visible. Defaults to hidden, so
    /// nothing polls until a renderer says so.
    pub fn view_visible(mut self, visible: bool) -> Self {
        self.view_visible = visible;
        self
    }

    /// Builds the controller and spawns its event loop. Must be called
    /// inside a Tokio runtime.
    pub async fn build(self) -> FieldcallResult<SessionController> {
        let identity = self
            .identity
            .ok_or_else(|| FieldcallError::ValidationError("identity is required".to_string()))?;
        if identity.user_id.trim().is_empty() {
            return Err(FieldcallError::ValidationError(
                "identity user_id is empty".to_string(),
            ));
        }
        let directory = self.directory.ok_or_else(|| {
            FieldcallError::ValidationError("a directory client is required".to_string())
        })?;
        let connector = self.connector.ok_or_else(|| {
            FieldcallError::ValidationError("a channel connector is required".to_string())
        })?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let poll_tx = events_tx.clone();
        let poller = ReconciliationPoller::new(
            directory.clone(),
            identity.role,
            self.config.polling.interval(),
            Arc::new(move |fact| {
                let _ = poll_tx.send(ControllerEvent::Poll(fact));
            }),
        );

        let shared = Arc::new(Shared {
            negotiator_settings: NegotiatorSettings::from_config(&self.config),
            notifications: NotificationCenter::new(&self.config.notifications),
            media_devices: self
                .media_devices
                .unwrap_or_else(|| Arc::new(HeadlessMediaDevices)),
            peer_factory: self
                .peer_factory
                .unwrap_or_else(|| Arc::new(HeadlessPeerFactory)),
            identity,
            config: self.config,
            directory,
            connector,
            poller,
            state: Mutex::new(ControllerState {
                store: SessionStore::new(),
                live: None,
                view_visible: self.view_visible,
                offered_calls: HashSet::new(),
                generation: 0,
            }),
            op_lock: Mutex::new(()),
            events_tx,
            event_loop: Mutex::new(None),
        });

        let handle = tokio::spawn(run_event_loop(Arc::downgrade(&shared), events_rx));
        *shared.event_loop.lock().await = Some(handle);

        let controller = SessionController { shared };
        info!(
            user_id = %controller.identity().user_id,
            role = %controller.identity().role,
            "Session controller ready"
        );
        controller.update_polling().await;
        Ok(controller)
    }
}

impl Default for SessionControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

use std::sync::Arc;

use anyhow::{Context, Result};
use fieldcall_core::{
    DirectoryClient, FieldcallConfig, HttpDirectoryClient, Identity, SessionController,
    WebSocketConnector,
};

/// Collaborators for commands that talk to the consultation service.
pub struct CliContext {
    pub config: FieldcallConfig,
    pub identity: Identity,
    pub directory: Arc<dyn DirectoryClient>,
}

impl CliContext {
    pub fn new(config: &FieldcallConfig) -> Result<Self> {
        let identity = config
            .identity()
            .context("An identity is required for this command")?;
        let directory =
            HttpDirectoryClient::new(&config.api, config.token().map(str::to_string))?;

        tracing::debug!(
            user_id = %identity.user_id,
            role = %identity.role,
            base_url = %directory.base_url(),
            "CLI context ready"
        );

        Ok(Self {
            config: config.clone(),
            identity,
            directory: Arc::new(directory),
        })
    }

    /// A controller over the HTTP directory and the WebSocket channel.
    /// The terminal has no capture devices, so video calls fail with a
    /// media access error.
    pub async fn controller(&self) -> Result<SessionController> {
        let connector = WebSocketConnector::new(
            &self.config.api,
            self.config.token().map(str::to_string),
        );

        let controller = SessionController::builder()
            .identity(self.identity.clone())
            .config(self.config.clone())
            .directory(self.directory.clone())
            .connector(Arc::new(connector))
            .build()
            .await?;
        Ok(controller)
    }
}

//! Capture and peer backends for hosts without a media stack. Every
//! acquisition is refused, so video sessions end with a media error while
//! chat keeps working.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{FieldcallError, FieldcallResult};

use super::traits::{
    LocalMediaStream, MediaConstraints, MediaDevices, PeerConfig, PeerConnection,
    PeerConnectionFactory, PeerEventCallback,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessMediaDevices;

#[async_trait]
impl MediaDevices for HeadlessMediaDevices {
    async fn acquire(&self, _constraints: &MediaConstraints) -> FieldcallResult<LocalMediaStream> {
        Err(FieldcallError::MediaAccessError(
            "no capture devices available on this host".to_string(),
        ))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessPeerFactory;

#[async_trait]
impl PeerConnectionFactory for HeadlessPeerFactory {
    async fn create(
        &self,
        _config: &PeerConfig,
        _on_event: PeerEventCallback,
    ) -> FieldcallResult<Arc<dyn PeerConnection>> {
        Err(FieldcallError::PeerConnectionError(
            "peer connections are not supported on this host".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaConfig;

    #[tokio::test]
    async fn test_headless_acquire_is_media_error() {
        let err = HeadlessMediaDevices
            .acquire(&MediaConstraints::from(&MediaConfig::default()))
            .await
            .unwrap_err();
        assert!(err.is_media_error());
        assert!(err.forces_transition());
    }
}

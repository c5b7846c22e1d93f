use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::MediaConfig;
use crate::error::FieldcallResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// A local capture track. Disabling a track mutes it without renegotiation.
pub trait MediaTrack: Send + Sync {
    fn id(&self) -> &str;

    fn kind(&self) -> TrackKind;

    fn set_enabled(&self, enabled: bool);

    fn is_enabled(&self) -> bool;

    fn stop(&self);
}

#[derive(Clone, Default)]
pub struct LocalMediaStream {
    pub tracks: Vec<Arc<dyn MediaTrack>>,
}

impl LocalMediaStream {
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self { tracks }
    }

    pub fn track(&self, kind: TrackKind) -> Option<&Arc<dyn MediaTrack>> {
        self.tracks.iter().find(|t| t.kind() == kind)
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

impl fmt::Debug for LocalMediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.tracks.iter().map(|t| (t.kind(), t.id().to_string())))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub video: Option<VideoConstraints>,
    pub audio: bool,
}

impl From<&MediaConfig> for MediaConstraints {
    fn from(config: &MediaConfig) -> Self {
        Self {
            video: Some(VideoConstraints {
                width: config.video_width,
                height: config.video_height,
            }),
            audio: config.audio,
        }
    }
}

/// Platform capture. Fails with `MediaAccessError` when permission is
/// denied or no device is available.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn acquire(&self, constraints: &MediaConstraints) -> FieldcallResult<LocalMediaStream>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// `{type, sdp}` as exchanged in offer and answer signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_mline_index: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    pub ice_servers: Vec<String>,
}

impl From<&MediaConfig> for PeerConfig {
    fn from(config: &MediaConfig) -> Self {
        Self {
            ice_servers: config.ice_servers.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    LocalIceCandidate(IceCandidate),
    RemoteTrack(TrackKind),
    ConnectionStateChanged(PeerConnectionState),
}

pub type PeerEventCallback = Box<dyn Fn(PeerEvent) + Send + Sync>;

#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn add_track(&self, track: Arc<dyn MediaTrack>) -> FieldcallResult<()>;

    async fn create_offer(&self) -> FieldcallResult<SessionDescription>;

    async fn create_answer(&self) -> FieldcallResult<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> FieldcallResult<()>;

    async fn set_remote_description(&self, description: SessionDescription)
        -> FieldcallResult<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> FieldcallResult<()>;

    async fn close(&self);
}

#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(
        &self,
        config: &PeerConfig,
        on_event: PeerEventCallback,
    ) -> FieldcallResult<Arc<dyn PeerConnection>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_wire_shape() {
        let offer = SessionDescription {
            sdp_type: SdpType::Offer,
            sdp: "v=0".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&offer).unwrap(),
            serde_json::json!({"type": "offer", "sdp": "v=0"})
        );
    }

    #[test]
    fn test_candidate_wire_shape() {
        let candidate: IceCandidate = serde_json::from_value(serde_json::json!({
            "candidate": "candidate:1 1 udp 2122260223 10.0.0.2 54321 typ host",
            "sdpMid": "0",
            "sdpMLineIndex": 0
        }))
        .unwrap();
        assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
        assert_eq!(candidate.sdp_mline_index, Some(0));
    }

    #[test]
    fn test_constraints_from_config() {
        let constraints = MediaConstraints::from(&MediaConfig::default());
        assert_eq!(
            constraints.video,
            Some(VideoConstraints {
                width: 1280,
                height: 720
            })
        );
        assert!(constraints.audio);
    }
}

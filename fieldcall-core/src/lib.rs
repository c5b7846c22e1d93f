#![allow(
    clippy::needless_borrows_for_generic_args,
    clippy::type_complexity,
    clippy::new_without_default,
    clippy::large_enum_variant
)]

pub mod config;
pub mod controller;
pub mod directory;
pub mod error;
pub mod media;
pub mod models;
pub mod notifications;
pub mod poller;
pub mod signaling;
pub mod store;
pub mod testing;

pub use config::{
    get_config_dir, ApiConfig, ConfigLoadError, EarlySignalPolicy, FieldcallConfig,
    IdentityConfig, LoggingConfig, MediaConfig, NotificationsConfig, PollingConfig,
    SessionConfig,
};
pub use controller::{ControllerEvent, SessionController, SessionControllerBuilder, SessionSnapshot};
pub use directory::{
    CallRoom, ChatStart, DirectoryClient, HttpDirectoryClient, OutgoingMessage, OutgoingSignal,
    RequestDraft, SignalRelay,
};
pub use error::{CliErrorDisplay, FieldcallError, FieldcallResult};
pub use media::{
    is_offerer, HeadlessMediaDevices, HeadlessPeerFactory, IceCandidate, LocalMediaStream,
    MediaConstraints, MediaDevices, MediaNegotiator, MediaTrack, NegotiatorSettings, PeerConfig,
    PeerConnection, PeerConnectionFactory, PeerConnectionState, PeerEvent, PeerEventCallback,
    SdpType, SessionDescription, TrackKind,
};
pub use models::{
    format_call_time, ActiveCall, ChatSession, ConnectionState, Counterpart, Delivery, Identity,
    LocalMedia, Message, NegotiationState, Notification, NotificationAction, NotificationKind,
    RequestStatus, Responder, Role, Session, SessionKind, SessionState, Urgency, VideoRequest,
};
pub use notifications::{NotificationCenter, NotificationFeed};
pub use poller::{PollFact, PollFactCallback, PollerStatus, ReconciliationPoller};
pub use signaling::{
    ChannelConnector, ChannelEvent, ChannelEventCallback, ChannelFrame, ChannelTransport,
    MemoryHub, SignalKind, SignalSender, SignalingChannel, WebSocketConnector,
};
pub use store::{SessionStore, StatusChange};

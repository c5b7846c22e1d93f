pub mod headless;
pub mod negotiator;
pub mod traits;

pub use headless::{HeadlessMediaDevices, HeadlessPeerFactory};
pub use negotiator::{is_offerer, MediaNegotiator, NegotiatorSettings};
pub use traits::{
    IceCandidate, LocalMediaStream, MediaConstraints, MediaDevices, MediaTrack, PeerConfig,
    PeerConnection, PeerConnectionFactory, PeerConnectionState, PeerEvent, PeerEventCallback,
    SdpType, SessionDescription, TrackKind, VideoConstraints,
};

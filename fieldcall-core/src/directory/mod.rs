pub mod http;
pub mod relay;
pub mod traits;

pub use http::HttpDirectoryClient;
pub use relay::SignalRelay;
pub use traits::{
    CallRoom, ChatStart, DirectoryClient, OutgoingMessage, OutgoingSignal, RequestDraft,
};

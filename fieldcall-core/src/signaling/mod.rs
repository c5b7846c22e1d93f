pub mod channel;
pub mod frame;
pub mod memory;
pub mod traits;
pub mod websocket;

pub use channel::{ChannelEvent, ChannelEventCallback, SignalingChannel};
pub use frame::{ChannelFrame, SignalKind};
pub use memory::{MemoryHub, MemoryTransport};
pub use traits::{ChannelConnector, ChannelTransport, SignalSender};
pub use websocket::{WebSocketConnector, WebSocketTransport};

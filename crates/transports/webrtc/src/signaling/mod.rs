//! Signaling protocol, message channel, and WebSocket transport
//!
//! - [`protocol`]: the `{Key, Value}` envelope and typed messages
//! - [`channel`]: readiness gate, deferred sends, and subscriber fan-out
//! - [`websocket`]: the physical socket feeding the channel

pub mod channel;
pub mod protocol;
pub mod websocket;

pub use channel::{ChannelState, MessageChannel, SendOutcome, SignalingSink};
pub use protocol::{
    validate_channel_name, ChannelMessage, ChatMessage, IceCandidate, MessageKind,
    PublisherConnectParams, RelayConnectParams, SdpType, SessionDescription,
    SubscriberConnectParams,
};
pub use websocket::{SocketEvent, WebSocketSink};

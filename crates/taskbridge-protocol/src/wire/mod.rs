//! Wire schema for both transports.
//!
//! - [`message`]: [`WireMessage`] with its parallel subtype enums and oneof payload
//! - [`state`]: [`WireState`]
//! - [`control`]: streaming RPC frames ([`CommandRequest`], [`ExtensionMessage`])
//! - [`socket`]: the duplex socket envelope ([`SocketFrame`])

pub mod control;
pub mod message;
pub mod socket;
pub mod state;

pub use control::{
    CommandRequest, ControlCommand, ExtensionMessage, ExtensionMessageType, ExtensionPayload,
};
pub use message::{AskKind, MessagePayload, SayKind, WireMessage, WireMessageType};
pub use socket::SocketFrame;
pub use state::WireState;

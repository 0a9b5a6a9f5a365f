//! Protocol Translation Layer.
//!
//! - [`body`]: one-shot typed decoding of engine message bodies
//! - [`message`]: [`to_wire`] for single messages
//! - [`state`]: [`state_to_wire`] for full snapshots
//! - [`settings`]: provider enum mapping and [`settings_from_wire`]
//! - [`command`]: inbound frames to [`taskbridge_core::BridgeCommand`]

pub mod body;
pub mod command;
pub mod message;
pub mod settings;
pub mod state;

pub use body::{MessageBody, decode};
pub use command::{SocketRequest, from_control, from_socket};
pub use message::to_wire;
pub use settings::settings_from_wire;
pub use state::state_to_wire;

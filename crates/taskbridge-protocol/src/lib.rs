//! # taskbridge-protocol
//!
//! Wire schema and the Protocol Translation Layer.
//!
//! - **Wire schema** ([`wire`]): message, state, socket and streaming-RPC frames
//! - **Translation** ([`translate`]): engine model to wire (`to_wire`, `state_to_wire`)
//!   and wire frames to [`taskbridge_core::BridgeCommand`] (`from_socket`, `from_control`)
//! - **Errors** ([`errors`]): wire error codes, `ErrorBody`, `DecodeError`
//!
//! Translation never fails on outbound data: malformed engine payloads degrade to
//! the generic fallback text. Inbound commands with missing required fields are
//! rejected with a [`errors::DecodeError`].

#![deny(unsafe_code)]

pub mod errors;
pub mod translate;
pub mod wire;

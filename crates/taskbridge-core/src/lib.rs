//! # taskbridge-core
//!
//! Foundation types shared by every taskbridge crate.
//!
//! - **Branded IDs**: `ClientId`, `TaskId`, `ConnectionId` as newtypes for type safety
//! - **Engine model**: [`message::EngineMessage`] and [`state::EngineState`], the shapes the
//!   task engine emits before any wire translation
//! - **Commands**: [`command::BridgeCommand`], the transport-neutral command set
//! - **Engine boundary**: the [`engine::TaskEngine`] and [`engine::EditorHost`] traits, plus
//!   [`engine::memory::InMemoryEngine`] for standalone runs and tests
//! - **Errors**: [`errors::BridgeError`] taxonomy via `thiserror`
//! - **Logging**: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod command;
pub mod engine;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod message;
pub mod state;

pub use command::BridgeCommand;
pub use errors::{BridgeError, EngineError};
pub use ids::{ClientId, ConnectionId, TaskId};

//! # taskbridge-server
//!
//! The external control bridge: many clients, one task engine.
//!
//! - **Router**: [`router::BridgeService`] validates commands, binds each
//!   client to at most one task and is the only caller of the engine
//! - **Reconciliation**: [`reconcile::Reconciler`] folds partial updates into
//!   exactly one message per `(task, ts)`
//! - **Dispatch**: [`dispatch`] fans events out per task, per client or to
//!   everyone, honoring event-type subscriptions
//! - **Transports**: the duplex socket channel (`/ws`) and the streaming RPC
//!   channel (`/control`), both on axum WebSockets
//! - **Background**: the engine event pump and the periodic state resync

#![deny(unsafe_code)]

pub mod config;
pub mod dispatch;
pub mod health;
pub mod metrics;
pub mod pump;
pub mod reconcile;
pub mod resync;
pub mod router;
pub mod server;
pub mod shutdown;
pub mod transport;

pub use router::{BridgeService, CommandReply};
pub use server::{BridgeServer, RunningServer, ServerError};

//! Error taxonomy for the bridge.
//!
//! [`BridgeError`] covers everything a command can fail with, classified by
//! how it propagates:
//!
//! - `Validation`, `Unauthorized`, `NoActiveTask`, `NotFound`: terminal for the
//!   single command, reported to the originating client only
//! - `Engine`: the task engine raised during a command; reported as an error
//!   event to the originating client
//! - `Translation`: a payload could not be mapped; callers degrade to a
//!   fallback representation instead of propagating
//! - `Transport`: a write to a client failed; triggers cleanup of that client

use std::time::Duration;

use thiserror::Error;

use crate::ids::{ClientId, TaskId};

// ── Error code constants ────────────────────────────────────────────

/// Malformed or incomplete command payload.
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
/// Command targets a task owned by another client.
pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
/// Command requires a bound task and the client has none.
pub const NO_ACTIVE_TASK: &str = "NO_ACTIVE_TASK";
/// Referenced resource does not exist.
pub const NOT_FOUND: &str = "NOT_FOUND";
/// The task engine failed.
pub const ENGINE_ERROR: &str = "ENGINE_ERROR";
/// A payload could not be mapped to or from the wire.
pub const TRANSLATION_ERROR: &str = "TRANSLATION_ERROR";
/// A client stream could not be written.
pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";

/// Failure raised by a task engine implementation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Generic engine failure with a message.
    #[error("{0}")]
    Failed(String),

    /// The referenced task is unknown to the engine.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// There is no persisted task to resume.
    #[error("no task available to resume")]
    NothingToResume,

    /// The engine is not ready to accept calls.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete within the allowed time.
    #[error("engine call timed out after {0:?}")]
    Timeout(Duration),
}

/// Error returned by bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Malformed or incomplete command payload. No engine call was made.
    #[error("{message}")]
    Validation {
        /// What is wrong with the payload.
        message: String,
    },

    /// The command targets a task the requesting client does not own.
    #[error("{message}")]
    Unauthorized {
        /// Description.
        message: String,
    },

    /// The command needs a bound task and the client has none.
    #[error("no active task for client {client_id}")]
    NoActiveTask {
        /// The requesting client.
        client_id: ClientId,
    },

    /// A referenced task or resource does not exist.
    #[error("{message}")]
    NotFound {
        /// Description.
        message: String,
    },

    /// The task engine raised during the command.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// A payload could not be translated.
    #[error("translation failed: {message}")]
    Translation {
        /// Description.
        message: String,
    },

    /// Writing to a client stream failed.
    #[error("transport error: {message}")]
    Transport {
        /// Description.
        message: String,
    },
}

impl BridgeError {
    /// Shorthand for a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for an authorization error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => INVALID_PARAMS,
            Self::Unauthorized { .. } => PERMISSION_DENIED,
            Self::NoActiveTask { .. } => NO_ACTIVE_TASK,
            Self::NotFound { .. } => NOT_FOUND,
            Self::Engine(_) => ENGINE_ERROR,
            Self::Translation { .. } => TRANSLATION_ERROR,
            Self::Transport { .. } => TRANSPORT_ERROR,
        }
    }

    /// Error-event kind reported to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Unauthorized { .. } => "unauthorized",
            Self::NoActiveTask { .. } => "no_active_task",
            Self::NotFound { .. } => "not_found",
            Self::Engine(_) => "engine_error",
            Self::Translation { .. } => "translation_error",
            Self::Transport { .. } => "transport_error",
        }
    }
}

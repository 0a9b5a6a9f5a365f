//! Wire error codes and the error body both transports render.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskbridge_core::errors::BridgeError;
use thiserror::Error;

pub use taskbridge_core::errors::{
    ENGINE_ERROR, INVALID_PARAMS, NO_ACTIVE_TASK, NOT_FOUND, PERMISSION_DENIED,
    TRANSLATION_ERROR, TRANSPORT_ERROR,
};

// ── Transport-level codes ───────────────────────────────────────────

/// Unexpected internal error.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
/// Missing or invalid credentials or client identity.
pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
/// Socket frame type not recognised.
pub const UNKNOWN_MESSAGE_TYPE: &str = "UNKNOWN_MESSAGE_TYPE";

/// Structured error carried in replies and error events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code (e.g. `NO_ACTIVE_TASK`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Error-event kind (e.g. `validation_error`).
    pub kind: String,
    /// Optional structured details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorBody {
    /// Build an error body.
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            kind: kind.into(),
            details: None,
        }
    }

    /// Attach details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<&BridgeError> for ErrorBody {
    fn from(err: &BridgeError) -> Self {
        Self::new(err.code(), err.to_string(), err.kind())
    }
}

/// An inbound frame could not be turned into a command.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The frame's type is not one the channel understands.
    #[error("unknown message type: {0}")]
    UnknownType(String),
    /// The frame is malformed or misses a required field.
    #[error("{0}")]
    Invalid(String),
}

impl DecodeError {
    /// Shorthand for [`DecodeError::Invalid`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// Machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownType(_) => UNKNOWN_MESSAGE_TYPE,
            Self::Invalid(_) => INVALID_PARAMS,
        }
    }
}

impl From<DecodeError> for BridgeError {
    fn from(err: DecodeError) -> Self {
        BridgeError::validation(err.to_string())
    }
}

impl From<&DecodeError> for ErrorBody {
    fn from(err: &DecodeError) -> Self {
        Self::new(err.code(), err.to_string(), "validation_error")
    }
}

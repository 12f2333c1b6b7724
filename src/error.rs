use crate::types::CallShape;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A payload could not be converted to or from wire bytes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MarshallingError {
    codec: String,
    type_name: String,
    message: String,
}

impl MarshallingError {
    pub fn new(codec: &str, type_name: &str, message: impl fmt::Display) -> Self {
        Self {
            codec: codec.to_owned(),
            type_name: type_name.to_owned(),
            message: message.to_string(),
        }
    }

    pub fn codec(&self) -> &str {
        &self.codec
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl fmt::Display for MarshallingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} codec cannot handle {}: {}",
            self.codec, self.type_name, self.message
        )
    }
}

impl std::error::Error for MarshallingError {}

/// Building a registry, or binding a stub against one, went wrong.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("method {0} is declared more than once")]
    DuplicateMethod(String),

    #[error("service {0} is already registered")]
    DuplicateService(String),

    #[error("method {method} belongs to service {actual}, not {expected}")]
    ServiceMismatch {
        method: String,
        expected: String,
        actual: String,
    },

    #[error("method {0} cannot be addressed by its full name")]
    InvalidName(String),

    #[error("method {0} is not part of the registry")]
    UnknownMethod(String),

    #[error("method {method} is {actual}, cannot be used as {expected}")]
    ShapeMismatch {
        method: String,
        expected: CallShape,
        actual: CallShape,
    },
}

/// The terminal error of a single call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("marshalling: {0}")]
    Marshalling(#[from] MarshallingError),

    #[error("method {0} is unimplemented")]
    Unimplemented(String),

    #[error("call cancelled")]
    Cancelled,

    #[error("transport: {0}")]
    Transport(String),

    #[error("handler failed: {0}")]
    Failed(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("binding: {0}")]
    Registry(#[from] RegistryError),
}

impl CallError {
    /// Wrap an error raised by a handler.
    pub fn failed(err: impl fmt::Display) -> Self {
        CallError::Failed(err.to_string())
    }

    /// Wrap an error raised by the underlying channel.
    pub fn transport(err: impl fmt::Display) -> Self {
        CallError::Transport(err.to_string())
    }
}

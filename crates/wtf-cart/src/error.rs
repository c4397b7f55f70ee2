use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wtf_core::ValidationError;

/// The cart operation an error or event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Fetch,
    Add,
    Change,
    Clear,
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Fetch => "fetch",
            Operation::Add => "add",
            Operation::Change => "change",
            Operation::Clear => "clear",
            Operation::Update => "update",
        };
        f.write_str(name)
    }
}

/// Coarse classification used for retry decisions and `cart:error` payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Timeout,
    InvalidVariant,
    ProductNotFound,
    Server,
    Rejected,
    Validation,
    Decode,
}

#[derive(Debug, Error)]
pub enum CartError {
    #[error("network error during cart {operation}: {source}")]
    Network {
        operation: Operation,
        #[source]
        source: reqwest::Error,
    },

    #[error("cart {operation} timed out after {after_secs}s")]
    Timeout { operation: Operation, after_secs: u64 },

    #[error("variant unavailable: {description}")]
    InvalidVariant { description: String },

    #[error("product not found")]
    ProductNotFound,

    #[error("failed to fetch cart (HTTP {status})")]
    Fetch { status: u16 },

    #[error("failed to add item to cart (HTTP {status}): {description}")]
    Add { status: u16, description: String },

    #[error("failed to change cart line (HTTP {status}): {description}")]
    Change { status: u16, description: String },

    #[error("failed to clear cart (HTTP {status})")]
    Clear { status: u16 },

    #[error("failed to update cart (HTTP {status}): {description}")]
    Update { status: u16, description: String },

    #[error("invalid cart request: {0}")]
    Validation(#[from] ValidationError),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid cart response for {context}: {source}")]
    InvalidResponse {
        context: String,
        #[source]
        source: ValidationError,
    },

    #[error("invalid store URL \"{store_url}\": {reason}")]
    InvalidStoreUrl { store_url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl CartError {
    /// Maps a transport failure, folding reqwest timeouts into
    /// [`CartError::Timeout`].
    pub(crate) fn transport(operation: Operation, err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            CartError::Timeout {
                operation,
                after_secs: timeout_secs,
            }
        } else {
            CartError::Network {
                operation,
                source: err,
            }
        }
    }

    /// HTTP status carried by the error, if the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            CartError::InvalidVariant { .. } => Some(422),
            CartError::ProductNotFound => Some(404),
            CartError::Fetch { status }
            | CartError::Add { status, .. }
            | CartError::Change { status, .. }
            | CartError::Clear { status }
            | CartError::Update { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The operation that failed, when the error is tied to one.
    #[must_use]
    pub fn operation(&self) -> Option<Operation> {
        match self {
            CartError::Network { operation, .. } | CartError::Timeout { operation, .. } => {
                Some(*operation)
            }
            CartError::InvalidVariant { .. } | CartError::ProductNotFound | CartError::Add { .. } => {
                Some(Operation::Add)
            }
            CartError::Fetch { .. } => Some(Operation::Fetch),
            CartError::Change { .. } => Some(Operation::Change),
            CartError::Clear { .. } => Some(Operation::Clear),
            CartError::Update { .. } => Some(Operation::Update),
            CartError::Validation(_)
            | CartError::Deserialize { .. }
            | CartError::InvalidResponse { .. }
            | CartError::InvalidStoreUrl { .. }
            | CartError::Client(_) => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            CartError::Network { .. } | CartError::Client(_) => ErrorKind::Network,
            CartError::Timeout { .. } => ErrorKind::Timeout,
            CartError::InvalidVariant { .. } => ErrorKind::InvalidVariant,
            CartError::ProductNotFound => ErrorKind::ProductNotFound,
            CartError::Fetch { .. }
            | CartError::Add { .. }
            | CartError::Change { .. }
            | CartError::Clear { .. }
            | CartError::Update { .. } => {
                if self.status().is_some_and(|s| s >= 500) {
                    ErrorKind::Server
                } else {
                    ErrorKind::Rejected
                }
            }
            CartError::Validation(_) | CartError::InvalidStoreUrl { .. } => ErrorKind::Validation,
            CartError::Deserialize { .. } | CartError::InvalidResponse { .. } => ErrorKind::Decode,
        }
    }
}

//! Error types for the datastore client.

use datastore_protocol::ProtocolError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while batching or committing mutations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Entity passed to `put` has no key.
    #[error("entity must have a key")]
    MissingKey,

    /// Key belongs to a different dataset than the batch.
    #[error("key dataset {actual:?} does not match batch dataset {expected:?}")]
    DatasetMismatch {
        /// Dataset of the batch.
        expected: String,
        /// Dataset of the offending key.
        actual: String,
    },

    /// Operation requires a complete key.
    #[error("key must be complete")]
    PartialKey,

    /// A completed copy was requested for a key that already has an identifier.
    #[error("only a partial key can be completed")]
    KeyNotPartial,

    /// The same partial-key entity was put twice into one batch.
    #[error("entity with a partial key is already queued in this batch")]
    DuplicatePut,

    /// The batch has already been committed.
    #[error("batch {batch_id} has already been committed")]
    BatchCommitted {
        /// Identifier of the batch.
        batch_id: String,
    },

    /// Network or transport error reported by a connection.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Not connected.
    #[error("not connected to server")]
    NotConnected,

    /// Timeout.
    #[error("operation timed out")]
    Timeout,

    /// The server answered with something the client cannot use.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Encoding or decoding a wire message failed.
    #[error("codec error: {0}")]
    Codec(#[from] ProtocolError),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true for errors raised before anything was buffered or sent.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ClientError::MissingKey
                | ClientError::DatasetMismatch { .. }
                | ClientError::PartialKey
                | ClientError::KeyNotPartial
                | ClientError::DuplicatePut
        )
    }

    /// Returns true for failures of the connection itself.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Transport { .. } | ClientError::NotConnected | ClientError::Timeout
        )
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { retryable, .. } => *retryable,
            ClientError::Timeout => true,
            _ => false,
        }
    }
}

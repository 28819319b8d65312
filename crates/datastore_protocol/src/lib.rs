//! # Datastore Protocol
//!
//! Wire messages exchanged with the remote datastore on commit.
//!
//! This crate provides:
//! - `KeyMessage` and `PathElement` for entity keys
//! - `EntityMessage`, `Property` and `ValueMessage` for entity payloads
//! - `Mutation` with its five disjoint mutation lists
//! - `CommitRequest` / `CommitResponse`
//! - CBOR encoding/decoding for every message
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Usage
//!
//! ```
//! use datastore_protocol::{CommitRequest, KeyMessage, Mutation, WireMessage};
//!
//! let mut mutation = Mutation::new();
//! mutation.delete.push(KeyMessage::with_id("Person", 42));
//!
//! let request = CommitRequest::non_transactional(mutation);
//! let bytes = request.encode().unwrap();
//! let decoded = CommitRequest::decode(&bytes).unwrap();
//! assert_eq!(decoded, request);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
mod error;
mod key;
mod messages;
mod mutation;

pub use entity::{EntityMessage, Property, ValueKind, ValueMessage};
pub use error::{ProtocolError, ProtocolResult};
pub use key::{KeyMessage, PartitionId, PathElement};
pub use messages::{CommitMode, CommitRequest, CommitResponse, MutationResult};
pub use mutation::Mutation;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A message that travels over the wire as CBOR.
///
/// Every protocol message implements this through the blanket impl below;
/// the trait only exists so callers can name the capability.
pub trait WireMessage: Sized {
    /// Encodes this message to CBOR bytes.
    fn encode(&self) -> ProtocolResult<Vec<u8>>;

    /// Decodes a message from CBOR bytes.
    fn decode(bytes: &[u8]) -> ProtocolResult<Self>;
}

impl<T> WireMessage for T
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let mut buffer = Vec::new();
        ciborium::ser::into_writer(self, &mut buffer)
            .map_err(|e| ProtocolError::encoding_failed(e.to_string()))?;
        Ok(buffer)
    }

    fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::decoding_failed(e.to_string()))
    }
}

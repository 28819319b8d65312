//! # Datastore Client
//!
//! Client-side write batching for a remote entity datastore.
//!
//! This crate provides:
//! - `Key` and `Entity` model types
//! - `Batch`, which buffers saves and deletes and commits them together
//! - Completion of partial keys with server-assigned identifiers
//! - A per-client stack of active batches with scoped activation
//! - `Connection` abstraction with mock and HTTP implementations
//!
//! ## Usage
//!
//! ```
//! use datastore_client::{Client, ClientResult, Entity, Key, MockConnection, SharedEntity};
//! use std::sync::Arc;
//!
//! let connection = Arc::new(MockConnection::with_assigned_ids([1234]));
//! let client = Client::new("my-dataset", connection);
//!
//! let person = SharedEntity::new(
//!     Entity::with_key(Key::new("my-dataset", "Person")).with_property("name", "Alice"),
//! );
//!
//! let batch = client.batch();
//! let result: ClientResult<()> = batch.scoped(|batch| batch.put(&person));
//! result.unwrap();
//!
//! assert_eq!(person.key().and_then(|key| key.id()), Some(1234));
//! ```
//!
//! ## Key Invariants
//!
//! - A batch appends exactly one mutation per successful `put` or `delete`
//! - Nothing is sent until `commit`
//! - Assigned identifiers are matched to partial-key entities by position
//! - A scoped batch is always popped, whether or not it commits

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod client;
mod config;
mod connection;
mod convert;
mod entity;
mod error;
mod http;
mod key;
mod mutation;
mod stack;

pub use batch::{ActiveBatch, Batch, BatchId, BatchStatus, CommitOutcome};
pub use client::Client;
pub use config::{
    ClientConfig, ConnectionConfig, DATASET_ENV_VAR, DEFAULT_API_VERSION, DEFAULT_BASE_URL,
    GCLOUD_DATASET_ENV_VAR, HOST_ENV_VAR, NAMESPACE_ENV_VAR,
};
pub use connection::{CommitCall, Connection, MockConnection};
pub use convert::{entity_to_wire, value_to_wire};
pub use entity::{Entity, PropertyValue, SharedEntity};
pub use error::{ClientError, ClientResult};
pub use http::{HttpClient, HttpConnection, LoopbackClient, LoopbackServer};
pub use key::{dataset_ids_match, Identifier, Key, KeyPathElement};
pub use mutation::MutationBuffer;
pub use stack::BatchStack;

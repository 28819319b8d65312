//! # Datastore Testkit
//!
//! Test utilities for the datastore client.
//!
//! This crate provides:
//! - `MemoryDatastore`, an in-memory server for the loopback HTTP path
//! - Client fixtures and common entity shapes
//! - Property-based test generators using proptest
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```
//! use datastore_testkit::prelude::*;
//!
//! let (datastore, client) = loopback_client("DATASET");
//! let entity = partial_entity("DATASET", "Person");
//! client.put(&entity).unwrap();
//! assert_eq!(datastore.len("DATASET"), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod datastore;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::datastore::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
}

pub use datastore::*;
pub use fixtures::*;
pub use generators::*;

/// Installs a `tracing` subscriber writing to the test output.
///
/// Filtering follows `RUST_LOG`. Calling this more than once is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

//! Test fixtures and client helpers.
//!
//! Provides clients wired to a mock connection or to an in-memory datastore
//! over the loopback HTTP path, plus common entity shapes.

use crate::datastore::MemoryDatastore;
use datastore_client::{
    Client, ClientConfig, Entity, Key, LoopbackClient, MockConnection, PropertyValue,
    SharedEntity,
};
use std::sync::Arc;

/// Creates a client backed by a [`MockConnection`].
///
/// The returned connection records every commit the client sends.
pub fn mock_client(dataset_id: &str) -> (Arc<MockConnection>, Client) {
    let connection = Arc::new(MockConnection::new());
    let client = Client::new(dataset_id, connection.clone());
    (connection, client)
}

/// Creates a client that commits to an in-memory datastore through the
/// HTTP connection and a loopback client.
pub fn loopback_client(dataset_id: &str) -> (Arc<MemoryDatastore>, Client) {
    let datastore = Arc::new(MemoryDatastore::new());
    let client = Client::connect(
        &ClientConfig::new(dataset_id),
        LoopbackClient::new(datastore.clone()),
    );
    (datastore, client)
}

/// Creates an entity with a partial key of `kind`.
pub fn partial_entity(dataset_id: &str, kind: &str) -> SharedEntity {
    SharedEntity::new(Entity::with_key(Key::new(dataset_id, kind)))
}

/// Creates an entity with a complete numeric key.
pub fn entity_with_id(dataset_id: &str, kind: &str, id: i64) -> SharedEntity {
    SharedEntity::new(Entity::with_key(Key::with_id(dataset_id, kind, id)))
}

/// Creates an entity exercising every index rule under `key`.
///
/// Properties: `foo` (indexed text), `baz` (excluded text), `spam`
/// (excluded list of three integers) and `frotz` (empty list).
pub fn sample_entity(key: Key) -> SharedEntity {
    SharedEntity::new(
        Entity::with_key(key)
            .with_property("foo", "bar")
            .with_property("baz", "qux")
            .with_property(
                "spam",
                vec![
                    PropertyValue::from(1),
                    PropertyValue::from(2),
                    PropertyValue::from(3),
                ],
            )
            .with_property("frotz", PropertyValue::List(Vec::new()))
            .excluding("baz")
            .excluding("spam"),
    )
}

//! Buffer of pending mutations for one commit.

use datastore_protocol::{EntityMessage, KeyMessage, Mutation};

/// Accumulates the mutations of one batch.
///
/// Exactly one record is appended per `put` or `delete`. The `update` and
/// `insert` lists of the underlying message are never filled by the batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationBuffer {
    mutation: Mutation,
}

impl MutationBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entity whose ID the server should assign.
    pub fn push_insert_auto_id(&mut self, entity: EntityMessage) {
        self.mutation.insert_auto_id.push(entity);
    }

    /// Appends an entity to insert or overwrite.
    pub fn push_upsert(&mut self, entity: EntityMessage) {
        self.mutation.upsert.push(entity);
    }

    /// Appends a key to delete.
    pub fn push_delete(&mut self, key: KeyMessage) {
        self.mutation.delete.push(key);
    }

    /// Returns the `insert_auto_id` records.
    pub fn insert_auto_id(&self) -> &[EntityMessage] {
        &self.mutation.insert_auto_id
    }

    /// Returns the `upsert` records.
    pub fn upsert(&self) -> &[EntityMessage] {
        &self.mutation.upsert
    }

    /// Returns the `delete` records.
    pub fn delete(&self) -> &[KeyMessage] {
        &self.mutation.delete
    }

    /// Returns the total number of records.
    pub fn len(&self) -> usize {
        self.mutation.len()
    }

    /// Returns true if nothing has been buffered.
    pub fn is_empty(&self) -> bool {
        self.mutation.is_empty()
    }

    /// Returns the wire message.
    pub fn as_mutation(&self) -> &Mutation {
        &self.mutation
    }

    /// Consumes the buffer, returning the wire message.
    pub fn into_mutation(self) -> Mutation {
        self.mutation
    }
}

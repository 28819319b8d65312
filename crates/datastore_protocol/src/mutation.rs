//! The mutation message carried by a commit.

use crate::entity::EntityMessage;
use crate::key::KeyMessage;
use serde::{Deserialize, Serialize};

/// A set of writes applied atomically by one commit.
///
/// The five lists are disjoint: every mutated entity or key appears in
/// exactly one of them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mutation {
    /// Entities to insert or overwrite. Keys must be complete.
    #[serde(default)]
    pub upsert: Vec<EntityMessage>,
    /// Entities to overwrite; the server fails if one does not exist.
    #[serde(default)]
    pub update: Vec<EntityMessage>,
    /// Entities to insert; the server fails if one already exists.
    #[serde(default)]
    pub insert: Vec<EntityMessage>,
    /// Entities with partial keys; the server assigns their ids.
    #[serde(default)]
    pub insert_auto_id: Vec<EntityMessage>,
    /// Keys to delete. Keys must be complete.
    #[serde(default)]
    pub delete: Vec<KeyMessage>,
}

impl Mutation {
    /// Creates an empty mutation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of mutations across all lists.
    pub fn len(&self) -> usize {
        self.upsert.len()
            + self.update.len()
            + self.insert.len()
            + self.insert_auto_id.len()
            + self.delete.len()
    }

    /// Returns true if no mutation has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

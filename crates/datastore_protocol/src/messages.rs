//! Commit request and response messages.

use crate::key::KeyMessage;
use crate::mutation::Mutation;
use serde::{Deserialize, Serialize};

/// How the server should apply a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitMode {
    /// The commit finishes a transaction started earlier.
    Transactional,
    /// A standalone batch of writes.
    NonTransactional,
}

/// Commit request sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRequest {
    /// Opaque transaction handle, present for transactional commits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Vec<u8>>,
    /// The writes to apply.
    pub mutation: Mutation,
    /// Commit mode.
    pub mode: CommitMode,
}

impl CommitRequest {
    /// Creates a request for a standalone batch.
    pub fn non_transactional(mutation: Mutation) -> Self {
        Self {
            transaction: None,
            mutation,
            mode: CommitMode::NonTransactional,
        }
    }

    /// Creates a request that finishes the given transaction.
    pub fn transactional(mutation: Mutation, transaction: Vec<u8>) -> Self {
        Self {
            transaction: Some(transaction),
            mutation,
            mode: CommitMode::Transactional,
        }
    }

    /// Creates a request, choosing the mode from the transaction handle.
    pub fn for_transaction(mutation: Mutation, transaction: Option<&[u8]>) -> Self {
        match transaction {
            Some(id) => Self::transactional(mutation, id.to_vec()),
            None => Self::non_transactional(mutation),
        }
    }
}

/// Result of applying a mutation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MutationResult {
    /// Number of index rows written or removed.
    pub index_updates: i32,
    /// Keys assigned to the `insert_auto_id` entities, in request order.
    #[serde(default)]
    pub insert_auto_id_key: Vec<KeyMessage>,
}

/// Commit response from the server.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommitResponse {
    /// Result of the mutation.
    pub mutation_result: MutationResult,
}

impl CommitResponse {
    /// Creates a commit response.
    pub fn new(index_updates: i32, insert_auto_id_key: Vec<KeyMessage>) -> Self {
        Self {
            mutation_result: MutationResult {
                index_updates,
                insert_auto_id_key,
            },
        }
    }

    /// Returns the number of index updates.
    pub fn index_updates(&self) -> i32 {
        self.mutation_result.index_updates
    }

    /// Returns the assigned keys, in request order.
    pub fn insert_auto_id_keys(&self) -> &[KeyMessage] {
        &self.mutation_result.insert_auto_id_key
    }

    /// Consumes the response, returning `(index_updates, assigned_keys)`.
    pub fn into_parts(self) -> (i32, Vec<KeyMessage>) {
        (
            self.mutation_result.index_updates,
            self.mutation_result.insert_auto_id_key,
        )
    }
}

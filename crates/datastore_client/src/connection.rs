//! Connection abstraction for commit requests.

use crate::error::{ClientError, ClientResult};
use datastore_protocol::{CommitResponse, KeyMessage, Mutation, PathElement};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// A connection sends commit requests to the datastore.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, in-process loopback, mock for testing, etc.).
/// Retries, authentication and timeouts are the implementation's concern;
/// the batch calls `commit` exactly once per `Batch::commit`.
pub trait Connection: Send + Sync {
    /// Commits `mutation` to `dataset_id`.
    ///
    /// Returns the number of index updates and the keys assigned to the
    /// `insert_auto_id` entities, in request order.
    fn commit(
        &self,
        dataset_id: &str,
        mutation: &Mutation,
        transaction: Option<&[u8]>,
    ) -> ClientResult<CommitResponse>;
}

/// A commit call recorded by [`MockConnection`].
#[derive(Debug, Clone, PartialEq)]
pub struct CommitCall {
    /// Dataset the commit was addressed to.
    pub dataset_id: String,
    /// The mutation that was sent.
    pub mutation: Mutation,
    /// The transaction handle that was sent.
    pub transaction: Option<Vec<u8>>,
}

/// A mock connection for testing.
///
/// Records every commit and answers with a configurable list of assigned
/// IDs, whatever the request contained.
#[derive(Debug)]
pub struct MockConnection {
    connected: AtomicBool,
    assigned_ids: Mutex<Vec<i64>>,
    index_updates: AtomicI32,
    fail_next: Mutex<Option<(String, bool)>>,
    committed: Mutex<Vec<CommitCall>>,
}

impl MockConnection {
    /// Creates a new mock connection that assigns no IDs.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            assigned_ids: Mutex::new(Vec::new()),
            index_updates: AtomicI32::new(0),
            fail_next: Mutex::new(None),
            committed: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock connection answering every commit with `ids`.
    pub fn with_assigned_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        let connection = Self::new();
        connection.set_assigned_ids(ids);
        connection
    }

    /// Sets the IDs returned by subsequent commits.
    pub fn set_assigned_ids(&self, ids: impl IntoIterator<Item = i64>) {
        *self.assigned_ids.lock() = ids.into_iter().collect();
    }

    /// Sets the index update count returned by subsequent commits.
    pub fn set_index_updates(&self, count: i32) {
        self.index_updates.store(count, Ordering::SeqCst);
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Makes the next commit fail with a transport error.
    pub fn fail_next_commit(&self, message: impl Into<String>, retryable: bool) {
        *self.fail_next.lock() = Some((message.into(), retryable));
    }

    /// Returns every commit received so far, oldest first.
    pub fn committed(&self) -> Vec<CommitCall> {
        self.committed.lock().clone()
    }

    /// Returns the number of commits received so far.
    pub fn commit_count(&self) -> usize {
        self.committed.lock().len()
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for MockConnection {
    fn commit(
        &self,
        dataset_id: &str,
        mutation: &Mutation,
        transaction: Option<&[u8]>,
    ) -> ClientResult<CommitResponse> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected);
        }
        if let Some((message, retryable)) = self.fail_next.lock().take() {
            return Err(ClientError::Transport { message, retryable });
        }

        self.committed.lock().push(CommitCall {
            dataset_id: dataset_id.to_string(),
            mutation: mutation.clone(),
            transaction: transaction.map(<[u8]>::to_vec),
        });

        let keys = self
            .assigned_ids
            .lock()
            .iter()
            .enumerate()
            .map(|(index, id)| {
                let kind = mutation
                    .insert_auto_id
                    .get(index)
                    .and_then(|entity| entity.key.terminal())
                    .map(|element| element.kind.clone())
                    .unwrap_or_default();
                KeyMessage::new(vec![PathElement::with_id(kind, *id)])
            })
            .collect();

        Ok(CommitResponse::new(
            self.index_updates.load(Ordering::SeqCst),
            keys,
        ))
    }
}

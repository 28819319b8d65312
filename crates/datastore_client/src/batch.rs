//! Write batches.
//!
//! A [`Batch`] buffers `put` and `delete` calls and sends them to the
//! datastore in a single commit. Entities inserted with a partial key are
//! remembered so the identifiers assigned by the server can be written back
//! to them once the commit succeeds.
//!
//! ```text
//!   Open ──put/delete──▶ Open ──commit ok──▶ Committed
//!     ▲                    │
//!     └── commit failed ───┘
//! ```

use crate::client::Client;
use crate::connection::Connection;
use crate::convert::entity_to_wire;
use crate::entity::SharedEntity;
use crate::error::{ClientError, ClientResult};
use crate::key::{dataset_ids_match, Identifier, Key};
use crate::mutation::MutationBuffer;
use crate::stack::BatchStack;
use parking_lot::Mutex;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Unique identifier of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(Uuid);

impl BatchId {
    /// Generates a new random batch ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Accepting mutations.
    Open,
    /// Commit succeeded; the batch accepts nothing further.
    Committed,
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitOutcome {
    /// Number of index rows the server updated.
    pub index_updates: i32,
    /// Completed keys written back to the partial-key entities, in put order.
    pub assigned_keys: Vec<Key>,
}

#[derive(Debug)]
struct BatchState {
    status: BatchStatus,
    mutations: MutationBuffer,
    partial_key_entities: Vec<SharedEntity>,
}

struct BatchInner {
    id: BatchId,
    dataset_id: String,
    namespace: Option<String>,
    connection: Arc<dyn Connection>,
    stack: Arc<BatchStack>,
    transaction_id: Option<Vec<u8>>,
    state: Mutex<BatchState>,
}

/// A set of mutations committed together.
///
/// `Batch` is a cheap handle; clones refer to the same batch.
#[derive(Clone)]
pub struct Batch {
    inner: Arc<BatchInner>,
}

impl Batch {
    /// Creates an empty batch writing to the client's dataset.
    pub fn new(client: &Client) -> Self {
        Self::build(client, None)
    }

    /// Creates a batch that commits as part of an existing transaction.
    pub fn with_transaction(client: &Client, transaction_id: impl Into<Vec<u8>>) -> Self {
        Self::build(client, Some(transaction_id.into()))
    }

    fn build(client: &Client, transaction_id: Option<Vec<u8>>) -> Self {
        Self {
            inner: Arc::new(BatchInner {
                id: BatchId::new(),
                dataset_id: client.dataset_id().to_string(),
                namespace: client.namespace().map(str::to_string),
                connection: client.connection().clone(),
                stack: client.batch_stack().clone(),
                transaction_id,
                state: Mutex::new(BatchState {
                    status: BatchStatus::Open,
                    mutations: MutationBuffer::new(),
                    partial_key_entities: Vec::new(),
                }),
            }),
        }
    }

    /// Returns the batch ID.
    pub fn id(&self) -> BatchId {
        self.inner.id
    }

    /// Returns the dataset the batch writes to.
    pub fn dataset_id(&self) -> &str {
        &self.inner.dataset_id
    }

    /// Returns the namespace inherited from the client.
    pub fn namespace(&self) -> Option<&str> {
        self.inner.namespace.as_deref()
    }

    /// Returns the connection used to commit.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.inner.connection
    }

    /// Returns the transaction the batch commits into, if any.
    pub fn transaction_id(&self) -> Option<&[u8]> {
        self.inner.transaction_id.as_deref()
    }

    /// Returns the lifecycle state.
    pub fn status(&self) -> BatchStatus {
        self.inner.state.lock().status
    }

    /// Returns true once a commit has succeeded.
    pub fn is_committed(&self) -> bool {
        self.status() == BatchStatus::Committed
    }

    /// Returns a snapshot of the buffered mutations.
    pub fn mutations(&self) -> MutationBuffer {
        self.inner.state.lock().mutations.clone()
    }

    /// Returns handles to the entities put with a partial key, in put order.
    pub fn partial_key_entities(&self) -> Vec<SharedEntity> {
        self.inner.state.lock().partial_key_entities.clone()
    }

    /// Returns the client's current batch.
    pub fn current(&self) -> Option<Batch> {
        self.inner.stack.current()
    }

    /// Returns true if this batch is the client's current batch.
    pub fn is_current(&self) -> bool {
        self.current().is_some_and(|batch| batch.id() == self.id())
    }

    fn ensure_open(&self, state: &BatchState) -> ClientResult<()> {
        match state.status {
            BatchStatus::Open => Ok(()),
            BatchStatus::Committed => Err(ClientError::BatchCommitted {
                batch_id: self.id().to_string(),
            }),
        }
    }

    fn check_dataset(&self, key: &Key) -> ClientResult<()> {
        if dataset_ids_match(key.dataset_id(), self.dataset_id()) {
            Ok(())
        } else {
            Err(ClientError::DatasetMismatch {
                expected: self.dataset_id().to_string(),
                actual: key.dataset_id().to_string(),
            })
        }
    }

    /// Buffers a save of `entity`.
    ///
    /// An entity with a partial key is queued for insertion with an
    /// automatically assigned ID, and its key is completed in place after
    /// commit. An entity with a complete key is queued as an upsert.
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::MissingKey`] if the entity has no key,
    /// [`ClientError::DatasetMismatch`] if the key belongs to another dataset
    /// and [`ClientError::BatchCommitted`] after commit. Putting the same
    /// partial-key entity twice fails with [`ClientError::DuplicatePut`],
    /// since the server would assign it two identifiers. Nothing is buffered
    /// on error.
    pub fn put(&self, entity: &SharedEntity) -> ClientResult<()> {
        let (message, partial) = {
            let entity = entity.read();
            let key = entity.key().ok_or(ClientError::MissingKey)?;
            self.check_dataset(key)?;
            (entity_to_wire(&entity, key), key.is_partial())
        };

        let mut state = self.inner.state.lock();
        self.ensure_open(&state)?;
        if partial {
            if state
                .partial_key_entities
                .iter()
                .any(|queued| queued.ptr_eq(entity))
            {
                return Err(ClientError::DuplicatePut);
            }
            state.mutations.push_insert_auto_id(message);
            state.partial_key_entities.push(entity.clone());
        } else {
            state.mutations.push_upsert(message);
        }
        trace!(batch_id = %self.id(), partial, "buffered put");
        Ok(())
    }

    /// Buffers a delete of `key`.
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::PartialKey`] if the key has no identifier,
    /// [`ClientError::DatasetMismatch`] if it belongs to another dataset and
    /// [`ClientError::BatchCommitted`] after commit.
    pub fn delete(&self, key: &Key) -> ClientResult<()> {
        if key.is_partial() {
            return Err(ClientError::PartialKey);
        }
        self.check_dataset(key)?;

        let mut state = self.inner.state.lock();
        self.ensure_open(&state)?;
        state.mutations.push_delete(key.to_wire());
        trace!(batch_id = %self.id(), "buffered delete");
        Ok(())
    }

    /// Sends the buffered mutations to the datastore.
    ///
    /// On success the identifiers assigned by the server are written back to
    /// the partial-key entities, in put order, and the batch becomes
    /// committed. If the connection fails the batch is left untouched and
    /// `commit` may be called again.
    ///
    /// # Errors
    ///
    /// Connection failures are returned unchanged. A response whose assigned
    /// keys do not line up with the partial-key entities is a
    /// [`ClientError::Protocol`] error; no entity is touched in that case.
    pub fn commit(&self) -> ClientResult<CommitOutcome> {
        let mut state = self.inner.state.lock();
        self.ensure_open(&state)?;

        debug!(
            batch_id = %self.id(),
            dataset_id = %self.dataset_id(),
            mutations = state.mutations.len(),
            "committing batch"
        );
        let response = self.inner.connection.commit(
            self.dataset_id(),
            state.mutations.as_mutation(),
            self.transaction_id(),
        )?;

        // The server has applied the mutations; nothing may be resent.
        state.status = BatchStatus::Committed;

        let (index_updates, assigned) = response.into_parts();
        if assigned.len() != state.partial_key_entities.len() {
            return Err(ClientError::Protocol(format!(
                "expected {} assigned keys, got {}",
                state.partial_key_entities.len(),
                assigned.len()
            )));
        }

        let mut completed = Vec::with_capacity(assigned.len());
        for (entity, message) in state.partial_key_entities.iter().zip(&assigned) {
            let identifier = message
                .terminal()
                .and_then(Identifier::from_element)
                .ok_or_else(|| {
                    ClientError::Protocol("assigned key has no identifier".to_string())
                })?;
            let key = entity.key().ok_or(ClientError::MissingKey)?;
            completed.push(key.completed_key(identifier)?);
        }

        for (entity, key) in state.partial_key_entities.iter().zip(&completed) {
            entity.write().set_key(key.clone());
        }

        debug!(
            batch_id = %self.id(),
            index_updates,
            assigned_keys = completed.len(),
            "batch committed"
        );
        Ok(CommitOutcome {
            index_updates,
            assigned_keys: completed,
        })
    }

    /// Makes this batch the client's current batch until the guard is
    /// finished or dropped.
    pub fn begin(&self) -> ActiveBatch {
        self.inner.stack.push(self.clone());
        debug!(batch_id = %self.id(), depth = self.inner.stack.len(), "batch pushed");
        ActiveBatch {
            batch: self.clone(),
        }
    }

    /// Runs `body` with this batch current, committing if it succeeds.
    ///
    /// If `body` returns an error the batch is not committed. If `body`
    /// committed the batch itself, nothing is sent again and `scoped`
    /// succeeds. Either way the batch is no longer current when `scoped`
    /// returns.
    pub fn scoped<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(&Batch) -> Result<T, E>,
        E: From<ClientError>,
    {
        let active = self.begin();
        let value = body(active.batch())?;
        active.finish()?;
        Ok(value)
    }

    fn leave(&self) {
        let stack = &self.inner.stack;
        match stack.current() {
            Some(top) if top.id() == self.id() => {
                stack.pop();
                debug!(batch_id = %self.id(), depth = stack.len(), "batch popped");
            }
            top => {
                warn!(
                    batch_id = %self.id(),
                    current = ?top.map(|batch| batch.id()),
                    "batch scopes are not well nested"
                );
                stack.remove(&self.id());
                debug_assert!(
                    std::thread::panicking(),
                    "batch {} left scope while not current",
                    self.id()
                );
            }
        }
    }
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("id", &self.inner.id)
            .field("dataset_id", &self.inner.dataset_id)
            .field("namespace", &self.inner.namespace)
            .field("transaction_id", &self.inner.transaction_id)
            .field("state", &*self.inner.state.lock())
            .finish()
    }
}

/// Guard keeping a batch current.
///
/// Created by [`Batch::begin`]. [`finish`](ActiveBatch::finish) commits the
/// batch; dropping the guard without finishing discards the scope without
/// committing. The batch is popped from the client's stack in both cases.
#[must_use = "dropping the guard ends the scope without committing"]
pub struct ActiveBatch {
    batch: Batch,
}

impl ActiveBatch {
    /// Returns the batch.
    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Commits the batch, then ends the scope.
    ///
    /// Returns `Ok(None)` without sending anything if the batch was already
    /// committed inside the scope.
    pub fn finish(self) -> ClientResult<Option<CommitOutcome>> {
        if self.batch.is_committed() {
            debug!(batch_id = %self.batch.id(), "batch already committed in scope");
            return Ok(None);
        }
        self.batch.commit().map(Some)
    }
}

impl Deref for ActiveBatch {
    type Target = Batch;

    fn deref(&self) -> &Batch {
        &self.batch
    }
}

impl Drop for ActiveBatch {
    fn drop(&mut self) {
        self.batch.leave();
    }
}

impl fmt::Debug for ActiveBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActiveBatch").field(&self.batch.id()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MockConnection;
    use crate::entity::{Entity, PropertyValue};
    use datastore_protocol::{CommitResponse, KeyMessage, Mutation, PathElement};
    use std::panic::AssertUnwindSafe;

    const DATASET: &str = "DATASET";

    fn setup() -> (Arc<MockConnection>, Client) {
        let connection = Arc::new(MockConnection::new());
        let client = Client::new(DATASET, connection.clone());
        (connection, client)
    }

    fn shared(key: Key) -> SharedEntity {
        SharedEntity::new(Entity::with_key(key))
    }

    #[test]
    fn new_batch_inherits_client_settings() {
        let connection = Arc::new(MockConnection::new());
        let client = Client::with_namespace(DATASET, "NAMESPACE", connection.clone());
        let batch = client.batch();

        assert_eq!(batch.dataset_id(), DATASET);
        assert_eq!(batch.namespace(), Some("NAMESPACE"));
        assert!(Arc::ptr_eq(batch.connection(), client.connection()));
        assert_eq!(batch.transaction_id(), None);
        assert_eq!(batch.status(), BatchStatus::Open);
        assert!(batch.mutations().is_empty());
        assert!(batch.partial_key_entities().is_empty());
        assert!(!batch.is_current());
    }

    #[test]
    fn batches_have_distinct_ids() {
        let (_, client) = setup();
        assert_ne!(client.batch().id(), client.batch().id());
    }

    #[test]
    fn current_follows_nesting() {
        let (_, client) = setup();
        let outer = client.batch();
        let inner = client.batch();
        assert!(outer.current().is_none());

        let outer_scope = outer.begin();
        assert!(outer.is_current());
        assert_eq!(inner.current().map(|b| b.id()), Some(outer.id()));

        let inner_scope = inner.begin();
        assert!(inner.is_current());
        assert!(!outer.is_current());

        drop(inner_scope);
        assert!(outer.is_current());
        drop(outer_scope);
        assert!(outer.current().is_none());
    }

    #[test]
    fn put_without_key_fails() {
        let (_, client) = setup();
        let batch = client.batch();

        let result = batch.put(&SharedEntity::new(Entity::new()));
        assert!(matches!(result, Err(ClientError::MissingKey)));
        assert!(batch.mutations().is_empty());
    }

    #[test]
    fn put_with_wrong_dataset_fails() {
        let (_, client) = setup();
        let batch = client.batch();

        let result = batch.put(&shared(Key::with_id("OTHER", "Kind", 1)));
        assert!(matches!(result, Err(ClientError::DatasetMismatch { .. })));
        assert!(batch.mutations().is_empty());
    }

    #[test]
    fn put_with_partial_key_queues_insert_auto_id() {
        let (_, client) = setup();
        let batch = client.batch();
        let entity = SharedEntity::new(
            Entity::with_key(Key::new(DATASET, "Kind")).with_property("foo", "bar"),
        );

        batch.put(&entity).unwrap();

        let mutations = batch.mutations();
        assert_eq!(mutations.insert_auto_id().len(), 1);
        assert!(mutations.upsert().is_empty());
        assert!(mutations.delete().is_empty());
        assert!(mutations.insert_auto_id()[0].key.is_partial());

        let partial = batch.partial_key_entities();
        assert_eq!(partial.len(), 1);
        assert!(partial[0].ptr_eq(&entity));
    }

    #[test]
    fn put_with_complete_key_queues_upsert() {
        let (_, client) = setup();
        let batch = client.batch();
        let key = Key::with_id(DATASET, "Kind", 1234);
        let entity = SharedEntity::new(
            Entity::with_key(key.clone())
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
                .with_property("frotz", PropertyValue::List(vec![]))
                .excluding("baz")
                .excluding("spam"),
        );

        batch.put(&entity).unwrap();

        let mutations = batch.mutations();
        assert!(mutations.insert_auto_id().is_empty());
        assert!(mutations.delete().is_empty());
        assert!(batch.partial_key_entities().is_empty());

        let upsert = &mutations.upsert()[0];
        assert_eq!(upsert.key, key.to_wire());
        assert_eq!(upsert.property.len(), 3);
        assert!(upsert.property("foo").unwrap().indexed);
        assert!(!upsert.property("baz").unwrap().indexed);
        let spam = upsert.property("spam").unwrap();
        assert!(spam.indexed);
        assert!(spam.list_value().unwrap().iter().all(|v| !v.indexed));
        assert!(upsert.property("frotz").is_none());
    }

    #[test]
    fn put_accepts_prefixed_dataset() {
        let (_, client) = setup();
        let batch = client.batch();
        let key = Key::with_id("s~DATASET", "Kind", 1234);

        batch.put(&shared(key.clone())).unwrap();

        let mutations = batch.mutations();
        assert_eq!(mutations.upsert().len(), 1);
        assert_eq!(mutations.upsert()[0].key, key.to_wire());
    }

    #[test]
    fn delete_with_partial_key_fails() {
        let (_, client) = setup();
        let batch = client.batch();

        let result = batch.delete(&Key::new(DATASET, "Kind"));
        assert!(matches!(result, Err(ClientError::PartialKey)));
        assert!(batch.mutations().is_empty());
    }

    #[test]
    fn delete_with_wrong_dataset_fails() {
        let (_, client) = setup();
        let batch = client.batch();

        let result = batch.delete(&Key::with_id("OTHER", "Kind", 1234));
        assert!(matches!(result, Err(ClientError::DatasetMismatch { .. })));
        assert!(batch.mutations().is_empty());
    }

    #[test]
    fn delete_with_complete_key() {
        let (_, client) = setup();
        let batch = client.batch();
        let key = Key::with_id(DATASET, "Kind", 1234);

        batch.delete(&key).unwrap();

        let mutations = batch.mutations();
        assert!(mutations.insert_auto_id().is_empty());
        assert!(mutations.upsert().is_empty());
        assert_eq!(mutations.delete(), &[key.to_wire()]);
    }

    #[test]
    fn delete_accepts_prefixed_dataset() {
        let (_, client) = setup();
        let batch = client.batch();
        let key = Key::with_id("s~DATASET", "Kind", 1234);

        batch.delete(&key).unwrap();
        assert_eq!(batch.mutations().delete(), &[key.to_wire()]);
    }

    #[test]
    fn commit_sends_buffer() {
        let (connection, client) = setup();
        let batch = client.batch();
        batch.delete(&Key::with_id(DATASET, "Kind", 1)).unwrap();

        let outcome = batch.commit().unwrap();
        assert_eq!(outcome.index_updates, 0);
        assert!(outcome.assigned_keys.is_empty());
        assert!(batch.is_committed());

        let calls = connection.committed();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].dataset_id, DATASET);
        assert_eq!(&calls[0].mutation, batch.mutations().as_mutation());
        assert_eq!(calls[0].transaction, None);
    }

    #[test]
    fn commit_completes_partial_keys() {
        let (connection, client) = setup();
        connection.set_assigned_ids([1234]);
        connection.set_index_updates(1);
        let batch = client.batch();
        let entity = shared(Key::new(DATASET, "Kind"));
        let bystander = shared(Key::with_id(DATASET, "Kind", 7));

        batch.put(&entity).unwrap();
        batch.put(&bystander).unwrap();
        let outcome = batch.commit().unwrap();

        let key = entity.key().unwrap();
        assert!(!key.is_partial());
        assert_eq!(key.id(), Some(1234));
        assert_eq!(key.dataset_id(), DATASET);
        assert_eq!(outcome.index_updates, 1);
        assert_eq!(outcome.assigned_keys, vec![key]);
        assert_eq!(bystander.key().and_then(|k| k.id()), Some(7));
    }

    #[test]
    fn commit_completes_in_put_order() {
        let (connection, client) = setup();
        connection.set_assigned_ids([10, 20, 30]);
        let batch = client.batch();
        let entities: Vec<SharedEntity> = (0..3).map(|_| shared(Key::new(DATASET, "Kind"))).collect();
        for entity in &entities {
            batch.put(entity).unwrap();
        }

        batch.commit().unwrap();

        let ids: Vec<Option<i64>> = entities
            .iter()
            .map(|e| e.key().and_then(|k| k.id()))
            .collect();
        assert_eq!(ids, vec![Some(10), Some(20), Some(30)]);
    }

    #[test]
    fn commit_passes_transaction() {
        let (connection, client) = setup();
        let batch = Batch::with_transaction(&client, b"TXN".to_vec());
        assert_eq!(batch.transaction_id(), Some(&b"TXN"[..]));

        batch.commit().unwrap();
        assert_eq!(
            connection.committed()[0].transaction.as_deref(),
            Some(&b"TXN"[..])
        );
    }

    #[test]
    fn committed_batch_rejects_further_use() {
        let (connection, client) = setup();
        let batch = client.batch();
        batch.commit().unwrap();

        let key = Key::with_id(DATASET, "Kind", 1);
        assert!(matches!(
            batch.put(&shared(key.clone())),
            Err(ClientError::BatchCommitted { .. })
        ));
        assert!(matches!(
            batch.delete(&key),
            Err(ClientError::BatchCommitted { .. })
        ));
        assert!(matches!(
            batch.commit(),
            Err(ClientError::BatchCommitted { .. })
        ));
        assert!(batch.mutations().is_empty());
        assert_eq!(connection.commit_count(), 1);
    }

    #[test]
    fn failed_commit_can_be_retried() {
        let (connection, client) = setup();
        connection.set_assigned_ids([1234]);
        connection.fail_next_commit("connection reset", true);
        let batch = client.batch();
        let entity = shared(Key::new(DATASET, "Kind"));
        batch.put(&entity).unwrap();

        let err = batch.commit().unwrap_err();
        assert!(err.is_transport());
        assert!(!batch.is_committed());
        assert!(entity.key().unwrap().is_partial());
        assert_eq!(batch.mutations().len(), 1);
        assert_eq!(batch.partial_key_entities().len(), 1);

        batch.commit().unwrap();
        assert_eq!(entity.key().and_then(|k| k.id()), Some(1234));
    }

    #[test]
    fn assigned_key_count_mismatch_is_protocol_error() {
        let (connection, client) = setup();
        connection.set_assigned_ids([1, 2]);
        let batch = client.batch();
        let entity = shared(Key::new(DATASET, "Kind"));
        batch.put(&entity).unwrap();

        let result = batch.commit();
        assert!(matches!(result, Err(ClientError::Protocol(_))));
        assert!(entity.key().unwrap().is_partial());
        assert!(batch.is_committed());
    }

    #[test]
    fn assigned_key_without_identifier_is_protocol_error() {
        struct Anonymous;
        impl Connection for Anonymous {
            fn commit(
                &self,
                _dataset_id: &str,
                _mutation: &Mutation,
                _transaction: Option<&[u8]>,
            ) -> ClientResult<CommitResponse> {
                Ok(CommitResponse::new(
                    0,
                    vec![KeyMessage::new(vec![PathElement::new("Kind")])],
                ))
            }
        }

        let client = Client::new(DATASET, Arc::new(Anonymous));
        let batch = client.batch();
        let entity = shared(Key::new(DATASET, "Kind"));
        batch.put(&entity).unwrap();

        assert!(matches!(batch.commit(), Err(ClientError::Protocol(_))));
        assert!(entity.key().unwrap().is_partial());
    }

    #[test]
    fn scoped_commits_on_success() {
        let (connection, client) = setup();
        connection.set_assigned_ids([1234]);
        let batch = client.batch();
        let entity = shared(Key::new(DATASET, "Kind"));

        let result: ClientResult<()> = batch.scoped(|b| {
            assert!(b.is_current());
            b.put(&entity)
        });

        result.unwrap();
        assert!(batch.current().is_none());
        assert_eq!(connection.commit_count(), 1);
        assert_eq!(entity.key().and_then(|k| k.id()), Some(1234));
    }

    #[test]
    fn scoped_nesting() {
        let (connection, client) = setup();
        let outer = client.batch();
        let inner = client.batch();

        let result: ClientResult<()> = outer.scoped(|outer| {
            assert!(outer.is_current());
            inner.scoped(|inner| {
                assert!(inner.is_current());
                inner.delete(&Key::with_id(DATASET, "Kind", 1))
            })?;
            assert!(outer.is_current());
            assert!(inner.is_committed());
            Ok(())
        });

        result.unwrap();
        assert!(client.current_batch().is_none());
        assert_eq!(connection.commit_count(), 2);
    }

    #[test]
    fn scoped_error_skips_commit() {
        #[derive(Debug)]
        #[allow(dead_code)]
        enum AppError {
            Testing,
            Client(ClientError),
        }
        impl From<ClientError> for AppError {
            fn from(err: ClientError) -> Self {
                AppError::Client(err)
            }
        }

        let (connection, client) = setup();
        let batch = client.batch();

        let result: Result<(), AppError> = batch.scoped(|b| {
            b.delete(&Key::with_id(DATASET, "Kind", 1))?;
            Err(AppError::Testing)
        });

        assert!(matches!(result, Err(AppError::Testing)));
        assert!(batch.current().is_none());
        assert_eq!(connection.commit_count(), 0);
        assert!(!batch.is_committed());
    }

    #[test]
    fn scoped_commit_failure_still_pops() {
        let (connection, client) = setup();
        connection.fail_next_commit("unavailable", false);
        let batch = client.batch();

        let result: ClientResult<()> = batch.scoped(|_| Ok(()));

        assert!(matches!(result, Err(ClientError::Transport { .. })));
        assert!(batch.current().is_none());
    }

    #[test]
    fn dropped_guard_pops_without_commit() {
        let (connection, client) = setup();
        let batch = client.batch();
        {
            let active = batch.begin();
            active.delete(&Key::with_id(DATASET, "Kind", 1)).unwrap();
            assert!(batch.is_current());
        }
        assert!(batch.current().is_none());
        assert_eq!(connection.commit_count(), 0);
    }

    #[test]
    fn finish_commits_and_pops() {
        let (connection, client) = setup();
        let batch = client.batch();
        let active = batch.begin();
        active.delete(&Key::with_id(DATASET, "Kind", 1)).unwrap();

        active.finish().unwrap();
        assert!(batch.current().is_none());
        assert_eq!(connection.commit_count(), 1);
    }

    #[test]
    fn put_same_partial_entity_twice_fails() {
        let (connection, client) = setup();
        connection.set_assigned_ids([11]);
        let batch = client.batch();
        let entity = shared(Key::new(DATASET, "Kind"));

        batch.put(&entity).unwrap();
        let result = batch.put(&entity.clone());
        assert!(matches!(result, Err(ClientError::DuplicatePut)));
        assert_eq!(batch.mutations().insert_auto_id().len(), 1);
        assert_eq!(batch.partial_key_entities().len(), 1);

        batch.commit().unwrap();
        assert_eq!(entity.key().and_then(|k| k.id()), Some(11));
        assert_eq!(connection.committed()[0].mutation.insert_auto_id.len(), 1);
    }

    #[test]
    fn put_same_complete_entity_twice_upserts_twice() {
        let (_, client) = setup();
        let batch = client.batch();
        let entity = shared(Key::with_id(DATASET, "Kind", 1));

        batch.put(&entity).unwrap();
        batch.put(&entity).unwrap();
        assert_eq!(batch.mutations().upsert().len(), 2);
    }

    #[test]
    fn scoped_after_commit_in_body_succeeds() {
        let (connection, client) = setup();
        let batch = client.batch();

        let result: ClientResult<()> = batch.scoped(|batch| {
            batch.delete(&Key::with_id(DATASET, "Kind", 1))?;
            batch.commit()?;
            Ok(())
        });

        result.unwrap();
        assert!(batch.is_committed());
        assert!(batch.current().is_none());
        assert_eq!(connection.commit_count(), 1);
    }

    #[test]
    fn finish_after_commit_sends_nothing() {
        let (connection, client) = setup();
        let batch = client.batch();
        let active = batch.begin();
        active.commit().unwrap();

        assert_eq!(active.finish().unwrap(), None);
        assert!(batch.current().is_none());
        assert_eq!(connection.commit_count(), 1);
    }

    #[test]
    fn guard_dropped_during_panic_pops_without_commit() {
        let (connection, client) = setup();
        let batch = client.batch();

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let active = batch.begin();
            active.delete(&Key::with_id(DATASET, "Kind", 1)).unwrap();
            panic!("body failed");
        }));

        assert!(result.is_err());
        assert!(batch.current().is_none());
        assert!(!batch.is_committed());
        assert_eq!(connection.commit_count(), 0);
    }

    #[test]
    fn ill_nested_guards_still_clean_up() {
        let (connection, client) = setup();
        let outer = client.batch();
        let inner = client.batch();

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let outer_guard = outer.begin();
            let inner_guard = inner.begin();
            drop(outer_guard);
            drop(inner_guard);
        }));

        assert_eq!(result.is_err(), cfg!(debug_assertions));
        assert!(client.batches().is_empty());
        assert_eq!(connection.commit_count(), 0);
    }
}

//! Datastore client.

use crate::batch::Batch;
use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::entity::SharedEntity;
use crate::error::ClientResult;
use crate::http::{HttpClient, HttpConnection};
use crate::key::Key;
use crate::stack::BatchStack;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

struct ClientInner {
    dataset_id: String,
    namespace: Option<String>,
    connection: Arc<dyn Connection>,
    batches: Arc<BatchStack>,
}

/// Entry point for writing to one dataset.
///
/// The client owns the connection and the stack of batches currently in
/// scope. `Client` is a cheap handle; clones share both.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Creates a client for `dataset_id`.
    pub fn new(dataset_id: impl Into<String>, connection: Arc<dyn Connection>) -> Self {
        Self::build(dataset_id.into(), None, connection)
    }

    /// Creates a client for `dataset_id` scoped to `namespace`.
    pub fn with_namespace(
        dataset_id: impl Into<String>,
        namespace: impl Into<String>,
        connection: Arc<dyn Connection>,
    ) -> Self {
        Self::build(dataset_id.into(), Some(namespace.into()), connection)
    }

    /// Creates a client from configuration.
    pub fn from_config(config: &ClientConfig, connection: Arc<dyn Connection>) -> Self {
        Self::build(
            config.dataset_id.clone(),
            config.namespace.clone(),
            connection,
        )
    }

    /// Creates a client talking HTTP through `http`.
    pub fn connect<C: HttpClient + 'static>(config: &ClientConfig, http: C) -> Self {
        let connection = HttpConnection::new(config.connection.clone(), http);
        Self::from_config(config, Arc::new(connection))
    }

    fn build(
        dataset_id: String,
        namespace: Option<String>,
        connection: Arc<dyn Connection>,
    ) -> Self {
        debug!(%dataset_id, ?namespace, "creating datastore client");
        Self {
            inner: Arc::new(ClientInner {
                dataset_id,
                namespace,
                connection,
                batches: Arc::new(BatchStack::new()),
            }),
        }
    }

    /// Returns the dataset ID.
    pub fn dataset_id(&self) -> &str {
        &self.inner.dataset_id
    }

    /// Returns the namespace.
    pub fn namespace(&self) -> Option<&str> {
        self.inner.namespace.as_deref()
    }

    /// Returns the connection.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.inner.connection
    }

    /// Returns the stack of batches in scope.
    pub fn batch_stack(&self) -> &Arc<BatchStack> {
        &self.inner.batches
    }

    /// Creates a new batch bound to this client.
    pub fn batch(&self) -> Batch {
        Batch::new(self)
    }

    /// Pushes `batch` onto the stack, making it current.
    ///
    /// Prefer [`Batch::begin`] or [`Batch::scoped`], which pop again
    /// automatically.
    pub fn push_batch(&self, batch: Batch) {
        self.inner.batches.push(batch);
    }

    /// Pops the current batch.
    pub fn pop_batch(&self) -> Option<Batch> {
        self.inner.batches.pop()
    }

    /// Returns the current batch.
    pub fn current_batch(&self) -> Option<Batch> {
        self.inner.batches.current()
    }

    /// Returns every batch in scope, current batch first.
    pub fn batches(&self) -> Vec<Batch> {
        self.inner.batches.batches()
    }

    /// Saves an entity.
    ///
    /// Joins the current batch if there is one; otherwise the entity is
    /// committed right away.
    pub fn put(&self, entity: &SharedEntity) -> ClientResult<()> {
        self.put_multi(std::slice::from_ref(entity))
    }

    /// Saves several entities in one commit.
    pub fn put_multi(&self, entities: &[SharedEntity]) -> ClientResult<()> {
        self.write(entities, Batch::put)
    }

    /// Deletes the entity stored under `key`.
    pub fn delete(&self, key: &Key) -> ClientResult<()> {
        self.delete_multi(std::slice::from_ref(key))
    }

    /// Deletes several keys in one commit.
    pub fn delete_multi(&self, keys: &[Key]) -> ClientResult<()> {
        self.write(keys, Batch::delete)
    }

    fn write<T, F>(&self, items: &[T], apply: F) -> ClientResult<()>
    where
        F: Fn(&Batch, &T) -> ClientResult<()>,
    {
        if items.is_empty() {
            return Ok(());
        }

        if let Some(batch) = self.current_batch() {
            for item in items {
                apply(&batch, item)?;
            }
            return Ok(());
        }

        let batch = self.batch();
        for item in items {
            apply(&batch, item)?;
        }
        batch.commit()?;
        Ok(())
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("dataset_id", &self.inner.dataset_id)
            .field("namespace", &self.inner.namespace)
            .field("batches", &self.inner.batches.len())
            .finish()
    }
}

//! Per-client stack of active batches.

use crate::batch::{Batch, BatchId};
use parking_lot::Mutex;

/// LIFO stack of the batches currently in scope for a client.
///
/// The top of the stack is the *current* batch: client-level writes join it
/// instead of committing on their own. Nesting depth is unbounded.
#[derive(Debug, Default)]
pub struct BatchStack {
    batches: Mutex<Vec<Batch>>,
}

impl BatchStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a batch, making it current.
    pub fn push(&self, batch: Batch) {
        self.batches.lock().push(batch);
    }

    /// Pops the current batch.
    pub fn pop(&self) -> Option<Batch> {
        self.batches.lock().pop()
    }

    /// Removes the batch with the given ID wherever it sits in the stack.
    pub(crate) fn remove(&self, id: &BatchId) -> Option<Batch> {
        let mut batches = self.batches.lock();
        let position = batches.iter().rposition(|batch| batch.id() == *id)?;
        Some(batches.remove(position))
    }

    /// Returns the current batch.
    pub fn current(&self) -> Option<Batch> {
        self.batches.lock().last().cloned()
    }

    /// Returns the stack depth.
    pub fn len(&self) -> usize {
        self.batches.lock().len()
    }

    /// Returns true if no batch is in scope.
    pub fn is_empty(&self) -> bool {
        self.batches.lock().is_empty()
    }

    /// Returns every batch in scope, current batch first.
    pub fn batches(&self) -> Vec<Batch> {
        self.batches.lock().iter().rev().cloned().collect()
    }
}

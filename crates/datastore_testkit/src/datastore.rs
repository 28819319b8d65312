//! In-memory datastore answering commit requests.
//!
//! Behaves like a minimal server: every commit is validated as a whole and
//! then applied atomically. Partial keys in `insert_auto_id` receive
//! sequential IDs starting at 1, per dataset.

use datastore_client::LoopbackServer;
use datastore_protocol::{
    CommitRequest, CommitResponse, EntityMessage, KeyMessage, Mutation, ValueKind, ValueMessage,
    WireMessage,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
struct Dataset {
    next_id: i64,
    entities: HashMap<KeyMessage, EntityMessage>,
}

impl Dataset {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
struct State {
    datasets: HashMap<String, Dataset>,
    commits: Vec<(String, CommitRequest)>,
}

/// A thread-safe in-memory datastore.
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    state: Mutex<State>,
}

impl MemoryDatastore {
    /// Creates an empty datastore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a commit to `dataset_id`.
    ///
    /// Nothing is written unless the whole request is valid.
    pub fn commit(
        &self,
        dataset_id: &str,
        request: &CommitRequest,
    ) -> Result<CommitResponse, String> {
        let mutation = &request.mutation;
        validate(mutation)?;

        let mut state = self.state.lock();
        let dataset = state.datasets.entry(dataset_id.to_string()).or_default();

        for entity in &mutation.update {
            if !dataset.entities.contains_key(&storage_key(&entity.key)) {
                return Err(format!("update of missing entity {:?}", entity.key));
            }
        }
        for entity in &mutation.insert {
            if dataset.entities.contains_key(&storage_key(&entity.key)) {
                return Err(format!("insert of existing entity {:?}", entity.key));
            }
        }

        let mut index_updates = 0;
        for entity in mutation
            .upsert
            .iter()
            .chain(&mutation.update)
            .chain(&mutation.insert)
        {
            index_updates += store(dataset, entity.clone());
        }

        let mut assigned = Vec::with_capacity(mutation.insert_auto_id.len());
        for entity in &mutation.insert_auto_id {
            let mut entity = entity.clone();
            let id = dataset.allocate_id();
            if let Some(terminal) = entity.key.path_element.last_mut() {
                terminal.id = Some(id);
            }
            assigned.push(storage_key(&entity.key));
            index_updates += store(dataset, entity);
        }

        for key in &mutation.delete {
            if let Some(removed) = dataset.entities.remove(&storage_key(key)) {
                index_updates += indexed_values(&removed);
            }
        }

        debug!(
            dataset_id,
            mutations = mutation.len(),
            assigned = assigned.len(),
            index_updates,
            "applied commit"
        );
        state.commits.push((dataset_id.to_string(), request.clone()));
        Ok(CommitResponse::new(index_updates, assigned))
    }

    /// Returns the stored entity under `key`.
    pub fn get(&self, dataset_id: &str, key: &KeyMessage) -> Option<EntityMessage> {
        let state = self.state.lock();
        state
            .datasets
            .get(dataset_id)
            .and_then(|dataset| dataset.entities.get(&storage_key(key)))
            .cloned()
    }

    /// Returns true if an entity is stored under `key`.
    pub fn contains(&self, dataset_id: &str, key: &KeyMessage) -> bool {
        self.get(dataset_id, key).is_some()
    }

    /// Returns the number of entities stored in `dataset_id`.
    pub fn len(&self, dataset_id: &str) -> usize {
        self.state
            .lock()
            .datasets
            .get(dataset_id)
            .map_or(0, |dataset| dataset.entities.len())
    }

    /// Returns true if `dataset_id` holds no entities.
    pub fn is_empty(&self, dataset_id: &str) -> bool {
        self.len(dataset_id) == 0
    }

    /// Returns every accepted commit as `(dataset_id, request)`, oldest first.
    pub fn commits(&self) -> Vec<(String, CommitRequest)> {
        self.state.lock().commits.clone()
    }

    /// Returns the number of accepted commits.
    pub fn commit_count(&self) -> usize {
        self.state.lock().commits.len()
    }
}

impl LoopbackServer for MemoryDatastore {
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String> {
        let dataset_id = path
            .strip_prefix("/datasets/")
            .and_then(|rest| rest.strip_suffix("/commit"))
            .filter(|id| !id.is_empty() && !id.contains('/'))
            .ok_or_else(|| format!("no such endpoint: {path}"))?;

        let request = CommitRequest::decode(body).map_err(|e| e.to_string())?;
        let response = self.commit(dataset_id, &request)?;
        response.encode().map_err(|e| e.to_string())
    }
}

fn validate(mutation: &Mutation) -> Result<(), String> {
    for entity in mutation
        .upsert
        .iter()
        .chain(&mutation.update)
        .chain(&mutation.insert)
    {
        check_key(&entity.key, false)?;
    }
    for entity in &mutation.insert_auto_id {
        check_key(&entity.key, true)?;
    }
    for key in &mutation.delete {
        check_key(key, false)?;
    }
    Ok(())
}

fn check_key(key: &KeyMessage, partial: bool) -> Result<(), String> {
    let Some((_, ancestors)) = key.path_element.split_last() else {
        return Err("key has an empty path".into());
    };
    if ancestors.iter().any(|element| !element.has_identifier()) {
        return Err(format!("incomplete ancestor in {key:?}"));
    }
    match (partial, key.is_partial()) {
        (true, false) => Err(format!("insert_auto_id key must be partial: {key:?}")),
        (false, true) => Err(format!("key must be complete: {key:?}")),
        _ => Ok(()),
    }
}

/// Keys are stored without their partition; the dataset is the map key.
fn storage_key(key: &KeyMessage) -> KeyMessage {
    KeyMessage::new(key.path_element.clone())
}

fn store(dataset: &mut Dataset, mut entity: EntityMessage) -> i32 {
    entity.key = storage_key(&entity.key);
    let mut updates = indexed_values(&entity);
    if let Some(previous) = dataset.entities.insert(entity.key.clone(), entity) {
        updates += indexed_values(&previous);
    }
    updates
}

/// Counts index rows for an entity: one per indexed value, list elements
/// counted individually.
fn indexed_values(entity: &EntityMessage) -> i32 {
    entity
        .property
        .iter()
        .map(|property| count_indexed(&property.value))
        .sum()
}

fn count_indexed(value: &ValueMessage) -> i32 {
    match &value.kind {
        ValueKind::List(elements) => elements.iter().map(count_indexed).sum(),
        _ => i32::from(value.indexed),
    }
}

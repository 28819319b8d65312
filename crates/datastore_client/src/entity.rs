//! Entities and their property values.

use crate::key::Key;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// A property value stored on an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Explicit null.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Signed 64-bit integer.
    Integer(i64),
    /// Double-precision float.
    Double(f64),
    /// UTF-8 string.
    Text(String),
    /// Opaque bytes.
    Blob(Vec<u8>),
    /// Reference to another entity.
    Key(Key),
    /// Ordered list of values.
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Returns true for list values.
    pub fn is_list(&self) -> bool {
        matches!(self, PropertyValue::List(_))
    }

    /// Returns true for an empty list.
    pub fn is_empty_list(&self) -> bool {
        matches!(self, PropertyValue::List(values) if values.is_empty())
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Boolean(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        PropertyValue::Integer(n)
    }
}

impl From<i32> for PropertyValue {
    fn from(n: i32) -> Self {
        PropertyValue::Integer(i64::from(n))
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::Double(n)
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(b: Vec<u8>) -> Self {
        PropertyValue::Blob(b)
    }
}

impl From<Key> for PropertyValue {
    fn from(key: Key) -> Self {
        PropertyValue::Key(key)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(values: Vec<PropertyValue>) -> Self {
        PropertyValue::List(values)
    }
}

impl From<()> for PropertyValue {
    fn from((): ()) -> Self {
        PropertyValue::Null
    }
}

/// A set of named properties, optionally bound to a key.
///
/// Properties are kept in name order. Names listed in
/// `exclude_from_indexes` are sent to the server as unindexed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entity {
    key: Option<Key>,
    properties: BTreeMap<String, PropertyValue>,
    exclude_from_indexes: BTreeSet<String>,
}

impl Entity {
    /// Creates an entity without a key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an entity bound to `key`.
    pub fn with_key(key: Key) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }

    /// Adds a property, builder style.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Marks a property as excluded from indexes, builder style.
    pub fn excluding(mut self, name: impl Into<String>) -> Self {
        self.exclude_from_indexes.insert(name.into());
        self
    }

    /// Returns the key, if bound.
    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Rebinds the entity to a different key.
    pub fn set_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    /// Unbinds the key.
    pub fn clear_key(&mut self) -> Option<Key> {
        self.key.take()
    }

    /// Returns a property value.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Sets a property, returning the previous value.
    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        self.properties.insert(name.into(), value.into())
    }

    /// Removes a property.
    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        self.properties.remove(name)
    }

    /// Iterates over properties in name order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns true if the entity has no properties.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Excludes a property from indexes.
    pub fn exclude_from_index(&mut self, name: impl Into<String>) {
        self.exclude_from_indexes.insert(name.into());
    }

    /// Returns the names excluded from indexes.
    pub fn exclude_from_indexes(&self) -> &BTreeSet<String> {
        &self.exclude_from_indexes
    }

    /// Returns true if `name` is excluded from indexes.
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude_from_indexes.contains(name)
    }
}

/// A shared, mutable handle to an [`Entity`].
///
/// Cloning the handle does not copy the entity. A batch keeps a handle to
/// every entity it inserted with a partial key and completes the key in
/// place after commit, so every holder sees the assigned identifier.
#[derive(Clone, Default)]
pub struct SharedEntity(Arc<RwLock<Entity>>);

impl SharedEntity {
    /// Wraps an entity.
    pub fn new(entity: Entity) -> Self {
        Self(Arc::new(RwLock::new(entity)))
    }

    /// Locks the entity for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Entity> {
        self.0.read()
    }

    /// Locks the entity for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, Entity> {
        self.0.write()
    }

    /// Returns a copy of the current key.
    pub fn key(&self) -> Option<Key> {
        self.0.read().key().cloned()
    }

    /// Returns true if both handles point at the same entity.
    pub fn ptr_eq(&self, other: &SharedEntity) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Entity> for SharedEntity {
    fn from(entity: Entity) -> Self {
        Self::new(entity)
    }
}

impl fmt::Debug for SharedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedEntity").field(&*self.0.read()).finish()
    }
}

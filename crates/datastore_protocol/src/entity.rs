//! Entity payload messages.

use crate::key::KeyMessage;
use serde::{Deserialize, Serialize};

/// The typed content of a property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueKind {
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
    Key(KeyMessage),
    /// Ordered list of values. Each element carries its own `indexed` flag.
    List(Vec<ValueMessage>),
}

/// A property value together with its indexing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueMessage {
    /// The value itself.
    pub kind: ValueKind,
    /// Whether the server should index this value.
    #[serde(default = "indexed_default")]
    pub indexed: bool,
}

fn indexed_default() -> bool {
    true
}

impl ValueMessage {
    /// Creates an indexed value.
    pub fn new(kind: ValueKind) -> Self {
        Self {
            kind,
            indexed: true,
        }
    }

    /// Sets the indexed flag.
    pub fn with_indexed(mut self, indexed: bool) -> Self {
        self.indexed = indexed;
        self
    }

    /// Returns the list elements if this is a list value.
    pub fn list_value(&self) -> Option<&[ValueMessage]> {
        match &self.kind {
            ValueKind::List(values) => Some(values),
            _ => None,
        }
    }
}

/// A named property of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Property name.
    pub name: String,
    /// Property value.
    pub value: ValueMessage,
}

/// Wire form of an entity: its key plus its properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMessage {
    /// Key of the entity.
    pub key: KeyMessage,
    /// Properties, in the order they were emitted.
    #[serde(default)]
    pub property: Vec<Property>,
}

impl EntityMessage {
    /// Creates an entity message without properties.
    pub fn new(key: KeyMessage) -> Self {
        Self {
            key,
            property: Vec::new(),
        }
    }

    /// Looks up a property by name.
    pub fn property(&self, name: &str) -> Option<&ValueMessage> {
        self.property
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// Iterates over `(name, value)` pairs.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &ValueMessage)> {
        self.property.iter().map(|p| (p.name.as_str(), &p.value))
    }
}

//! Key messages.

use serde::{Deserialize, Serialize};

/// Dataset and namespace a key lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PartitionId {
    /// Dataset ID.
    pub dataset_id: Option<String>,
    /// Namespace within the dataset.
    pub namespace: Option<String>,
}

/// One `(kind, identifier)` step of a key path.
///
/// At most one of `id` and `name` is set. An element with neither is the
/// terminal element of a partial key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathElement {
    /// Entity kind.
    pub kind: String,
    /// Numeric identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Name identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PathElement {
    /// Creates an element without an identifier.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            name: None,
        }
    }

    /// Creates an element with a numeric identifier.
    pub fn with_id(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id: Some(id),
            name: None,
        }
    }

    /// Creates an element with a name identifier.
    pub fn with_name(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            name: Some(name.into()),
        }
    }

    /// Returns true if this element carries an id or a name.
    pub fn has_identifier(&self) -> bool {
        self.id.is_some() || self.name.is_some()
    }
}

/// Wire form of an entity key.
///
/// Keys produced by the client leave `partition_id` unset; the connection
/// layer (or the server) fills it in from the request's dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeyMessage {
    /// Partition the key belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_id: Option<PartitionId>,
    /// Path from the root ancestor to the entity itself.
    pub path_element: Vec<PathElement>,
}

impl KeyMessage {
    /// Creates a key message from a path.
    pub fn new(path_element: Vec<PathElement>) -> Self {
        Self {
            partition_id: None,
            path_element,
        }
    }

    /// Creates a single-element key with a numeric identifier.
    pub fn with_id(kind: impl Into<String>, id: i64) -> Self {
        Self::new(vec![PathElement::with_id(kind, id)])
    }

    /// Creates a single-element key with a name identifier.
    pub fn with_name(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(vec![PathElement::with_name(kind, name)])
    }

    /// Creates a single-element key without an identifier.
    pub fn partial(kind: impl Into<String>) -> Self {
        Self::new(vec![PathElement::new(kind)])
    }

    /// Returns the terminal path element, if any.
    pub fn terminal(&self) -> Option<&PathElement> {
        self.path_element.last()
    }

    /// Returns the numeric identifier of the terminal element.
    pub fn terminal_id(&self) -> Option<i64> {
        self.terminal().and_then(|element| element.id)
    }

    /// Returns true if the terminal element has no identifier.
    pub fn is_partial(&self) -> bool {
        self.terminal()
            .map(|element| !element.has_identifier())
            .unwrap_or(true)
    }
}

//! Entity keys.

use crate::error::{ClientError, ClientResult};
use datastore_protocol::{KeyMessage, PathElement};
use std::fmt;

/// Partition markers the server may prepend to a dataset ID.
const DATASET_PREFIXES: [&str; 2] = ["s~", "e~"];

/// Server-assigned (or caller-chosen) identifier of a key path element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identifier {
    /// Numeric identifier.
    Id(i64),
    /// String identifier.
    Name(String),
}

impl Identifier {
    /// Returns the numeric identifier, if this is one.
    pub fn as_id(&self) -> Option<i64> {
        match self {
            Identifier::Id(id) => Some(*id),
            Identifier::Name(_) => None,
        }
    }

    /// Returns the name identifier, if this is one.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Identifier::Name(name) => Some(name),
            Identifier::Id(_) => None,
        }
    }

    /// Reads the identifier carried by a wire path element.
    pub fn from_element(element: &PathElement) -> Option<Self> {
        match (&element.id, &element.name) {
            (Some(id), _) => Some(Identifier::Id(*id)),
            (None, Some(name)) => Some(Identifier::Name(name.clone())),
            (None, None) => None,
        }
    }
}

impl From<i64> for Identifier {
    fn from(id: i64) -> Self {
        Identifier::Id(id)
    }
}

impl From<i32> for Identifier {
    fn from(id: i32) -> Self {
        Identifier::Id(i64::from(id))
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier::Name(name.to_string())
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Identifier::Name(name)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Id(id) => write!(f, "{id}"),
            Identifier::Name(name) => write!(f, "{name:?}"),
        }
    }
}

/// One `(kind, identifier)` step of a key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPathElement {
    kind: String,
    identifier: Option<Identifier>,
}

impl KeyPathElement {
    /// Returns the kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the identifier, if assigned.
    pub fn identifier(&self) -> Option<&Identifier> {
        self.identifier.as_ref()
    }

    fn to_wire(&self) -> PathElement {
        match &self.identifier {
            Some(Identifier::Id(id)) => PathElement::with_id(self.kind.clone(), *id),
            Some(Identifier::Name(name)) => PathElement::with_name(self.kind.clone(), name.clone()),
            None => PathElement::new(self.kind.clone()),
        }
    }
}

/// Identifies an entity in a dataset.
///
/// A key is a path of `(kind, identifier)` elements. Every ancestor element
/// is complete; only the terminal element may lack an identifier, in which
/// case the key is *partial* and the server assigns an ID on insert.
///
/// Keys are values: completing a partial key produces a new key and leaves
/// the original untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    dataset_id: String,
    namespace: Option<String>,
    path: Vec<KeyPathElement>,
}

impl Key {
    /// Creates a partial key of the given kind.
    pub fn new(dataset_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::from_element(dataset_id.into(), kind.into(), None)
    }

    /// Creates a complete key with a numeric identifier.
    pub fn with_id(dataset_id: impl Into<String>, kind: impl Into<String>, id: i64) -> Self {
        Self::from_element(dataset_id.into(), kind.into(), Some(Identifier::Id(id)))
    }

    /// Creates a complete key with a name identifier.
    pub fn with_name(
        dataset_id: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::from_element(
            dataset_id.into(),
            kind.into(),
            Some(Identifier::Name(name.into())),
        )
    }

    fn from_element(dataset_id: String, kind: String, identifier: Option<Identifier>) -> Self {
        Self {
            dataset_id,
            namespace: None,
            path: vec![KeyPathElement { kind, identifier }],
        }
    }

    /// Sets the namespace.
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Creates a partial child key under this key.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::PartialKey`] if this key is partial; ancestors
    /// must be complete.
    pub fn child(&self, kind: impl Into<String>) -> ClientResult<Key> {
        self.push_child(kind.into(), None)
    }

    /// Creates a child key with a numeric identifier under this key.
    pub fn child_with_id(&self, kind: impl Into<String>, id: i64) -> ClientResult<Key> {
        self.push_child(kind.into(), Some(Identifier::Id(id)))
    }

    /// Creates a child key with a name identifier under this key.
    pub fn child_with_name(
        &self,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> ClientResult<Key> {
        self.push_child(kind.into(), Some(Identifier::Name(name.into())))
    }

    fn push_child(&self, kind: String, identifier: Option<Identifier>) -> ClientResult<Key> {
        if self.is_partial() {
            return Err(ClientError::PartialKey);
        }
        let mut child = self.clone();
        child.path.push(KeyPathElement { kind, identifier });
        Ok(child)
    }

    /// Returns the dataset ID.
    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    /// Returns the namespace.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns the full path, root ancestor first.
    pub fn path(&self) -> &[KeyPathElement] {
        &self.path
    }

    fn terminal(&self) -> &KeyPathElement {
        // Constructors never produce an empty path.
        &self.path[self.path.len() - 1]
    }

    /// Returns the kind of the entity this key identifies.
    pub fn kind(&self) -> &str {
        &self.terminal().kind
    }

    /// Returns the terminal identifier, if assigned.
    pub fn identifier(&self) -> Option<&Identifier> {
        self.terminal().identifier.as_ref()
    }

    /// Returns the numeric identifier, if assigned.
    pub fn id(&self) -> Option<i64> {
        self.identifier().and_then(Identifier::as_id)
    }

    /// Returns the name identifier, if assigned.
    pub fn name(&self) -> Option<&str> {
        self.identifier().and_then(Identifier::as_name)
    }

    /// Returns true if no identifier has been assigned yet.
    pub fn is_partial(&self) -> bool {
        self.identifier().is_none()
    }

    /// Returns the parent key, or `None` for a root key.
    pub fn parent(&self) -> Option<Key> {
        if self.path.len() < 2 {
            return None;
        }
        let mut parent = self.clone();
        parent.path.pop();
        Some(parent)
    }

    /// Returns a complete copy of this partial key carrying `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::KeyNotPartial`] if this key already has an
    /// identifier.
    pub fn completed_key(&self, identifier: impl Into<Identifier>) -> ClientResult<Key> {
        if !self.is_partial() {
            return Err(ClientError::KeyNotPartial);
        }
        let mut completed = self.clone();
        let last = completed.path.len() - 1;
        completed.path[last].identifier = Some(identifier.into());
        Ok(completed)
    }

    /// Builds the wire form of this key.
    ///
    /// The partition is left unset; the connection layer supplies the
    /// dataset from the commit request.
    pub fn to_wire(&self) -> KeyMessage {
        KeyMessage::new(self.path.iter().map(KeyPathElement::to_wire).collect())
    }

    /// Builds a key from its wire form.
    ///
    /// The partition carried by the message, if any, takes precedence over
    /// `dataset_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] if the path is empty or an ancestor
    /// element lacks an identifier.
    pub fn from_wire(dataset_id: &str, message: &KeyMessage) -> ClientResult<Key> {
        if message.path_element.is_empty() {
            return Err(ClientError::Protocol("key has an empty path".into()));
        }
        let last = message.path_element.len() - 1;
        let mut path = Vec::with_capacity(message.path_element.len());
        for (index, element) in message.path_element.iter().enumerate() {
            let identifier = Identifier::from_element(element);
            if identifier.is_none() && index != last {
                return Err(ClientError::Protocol(format!(
                    "ancestor {:?} has no identifier",
                    element.kind
                )));
            }
            path.push(KeyPathElement {
                kind: element.kind.clone(),
                identifier,
            });
        }

        let partition = message.partition_id.as_ref();
        Ok(Key {
            dataset_id: partition
                .and_then(|p| p.dataset_id.clone())
                .unwrap_or_else(|| dataset_id.to_string()),
            namespace: partition.and_then(|p| p.namespace.clone()),
            path,
        })
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({}", self.dataset_id)?;
        for element in &self.path {
            match &element.identifier {
                Some(identifier) => write!(f, ", {}:{}", element.kind, identifier)?,
                None => write!(f, ", {}:?", element.kind)?,
            }
        }
        write!(f, ")")
    }
}

/// Compares two dataset IDs, ignoring a leading partition marker.
///
/// The server may report `s~DATASET` or `e~DATASET` for a dataset the
/// client knows as `DATASET`. Two prefixed IDs only match if they are
/// identical.
pub fn dataset_ids_match(left: &str, right: &str) -> bool {
    if left == right {
        return true;
    }
    if let Some(stripped) = strip_dataset_prefix(left) {
        return stripped == right;
    }
    if let Some(stripped) = strip_dataset_prefix(right) {
        return left == stripped;
    }
    false
}

fn strip_dataset_prefix(dataset_id: &str) -> Option<&str> {
    DATASET_PREFIXES
        .iter()
        .find_map(|prefix| dataset_id.strip_prefix(prefix))
}

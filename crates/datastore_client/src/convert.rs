//! Conversion of entities and property values to their wire form.

use crate::entity::{Entity, PropertyValue};
use crate::key::Key;
use datastore_protocol::{EntityMessage, Property, ValueKind, ValueMessage};

/// Converts a property value, marking every value indexed.
pub fn value_to_wire(value: &PropertyValue) -> ValueMessage {
    let kind = match value {
        PropertyValue::Null => ValueKind::Null,
        PropertyValue::Boolean(b) => ValueKind::Boolean(*b),
        PropertyValue::Integer(n) => ValueKind::Integer(*n),
        PropertyValue::Double(n) => ValueKind::Double(*n),
        PropertyValue::Text(s) => ValueKind::Text(s.clone()),
        PropertyValue::Blob(b) => ValueKind::Blob(b.clone()),
        PropertyValue::Key(key) => ValueKind::Key(key.to_wire()),
        PropertyValue::List(values) => ValueKind::List(values.iter().map(value_to_wire).collect()),
    };
    ValueMessage::new(kind)
}

/// Converts an entity to its wire form under `key`.
///
/// Empty lists are dropped. For an excluded property, a scalar value is
/// marked unindexed; a list keeps its own flag and every element is marked
/// unindexed instead.
pub fn entity_to_wire(entity: &Entity, key: &Key) -> EntityMessage {
    let mut message = EntityMessage::new(key.to_wire());

    for (name, value) in entity.properties() {
        if value.is_empty_list() {
            continue;
        }

        let mut wire = value_to_wire(value);
        if entity.is_excluded(name) {
            match &mut wire.kind {
                ValueKind::List(elements) => {
                    for element in elements.iter_mut() {
                        element.indexed = false;
                    }
                }
                _ => wire.indexed = false,
            }
        }

        message.property.push(Property {
            name: name.to_string(),
            value: wire,
        });
    }

    message
}

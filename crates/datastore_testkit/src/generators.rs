//! Property-based test generators using proptest.

use datastore_client::{Entity, Key, PropertyValue};
use proptest::prelude::*;

/// Strategy for generating dataset IDs without a partition prefix.
pub fn dataset_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,15}").expect("Invalid regex")
}

/// Strategy for generating `(dataset_id, key_dataset_id)` pairs that must be
/// treated as the same dataset.
///
/// The key side is either identical or carries an `s~` / `e~` prefix.
pub fn matching_dataset_strategy() -> impl Strategy<Value = (String, String)> {
    (dataset_id_strategy(), prop::sample::select(vec!["", "s~", "e~"]))
        .prop_map(|(dataset, prefix)| (dataset.clone(), format!("{prefix}{dataset}")))
}

/// Strategy for generating kind names.
pub fn kind_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-zA-Z0-9]{0,11}").expect("Invalid regex")
}

/// Strategy for generating partial keys in `dataset_id`.
pub fn partial_key_strategy(dataset_id: String) -> impl Strategy<Value = Key> {
    kind_strategy().prop_map(move |kind| Key::new(dataset_id.clone(), kind))
}

/// Strategy for generating complete keys in `dataset_id`.
pub fn complete_key_strategy(dataset_id: String) -> impl Strategy<Value = Key> {
    let by_id = {
        let dataset_id = dataset_id.clone();
        (kind_strategy(), 1..i64::MAX)
            .prop_map(move |(kind, id)| Key::with_id(dataset_id.clone(), kind, id))
    };
    let by_name = (kind_strategy(), "[a-z]{1,12}")
        .prop_map(move |(kind, name)| Key::with_name(dataset_id.clone(), kind, name));
    prop_oneof![by_id, by_name]
}

/// Strategy for generating keys in `dataset_id`, partial or complete.
pub fn key_strategy(dataset_id: String) -> impl Strategy<Value = Key> {
    prop_oneof![
        partial_key_strategy(dataset_id.clone()),
        complete_key_strategy(dataset_id),
    ]
}

/// Strategy for generating scalar property values.
pub fn scalar_value_strategy() -> impl Strategy<Value = PropertyValue> {
    prop_oneof![
        Just(PropertyValue::Null),
        any::<bool>().prop_map(PropertyValue::Boolean),
        any::<i64>().prop_map(PropertyValue::Integer),
        (-1.0e9..1.0e9f64).prop_map(PropertyValue::Double),
        "[a-zA-Z0-9 ]{0,24}".prop_map(PropertyValue::Text),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(PropertyValue::Blob),
    ]
}

/// Strategy for generating property values: scalars or lists of scalars.
pub fn property_value_strategy() -> impl Strategy<Value = PropertyValue> {
    prop_oneof![
        4 => scalar_value_strategy(),
        1 => prop::collection::vec(scalar_value_strategy(), 0..5).prop_map(PropertyValue::List),
    ]
}

/// Strategy for generating entities bound to keys from `keys`.
///
/// Roughly a third of the properties are excluded from indexes.
pub fn entity_strategy<S>(keys: S) -> impl Strategy<Value = Entity>
where
    S: Strategy<Value = Key>,
{
    (
        keys,
        prop::collection::vec(
            ("[a-z]{1,8}", property_value_strategy(), prop::bool::weighted(0.3)),
            0..6,
        ),
    )
        .prop_map(|(key, properties)| {
            let mut entity = Entity::with_key(key);
            for (name, value, excluded) in properties {
                if excluded {
                    entity.exclude_from_index(name.clone());
                }
                entity.set(name, value);
            }
            entity
        })
}

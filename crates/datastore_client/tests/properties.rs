//! Property tests for batch behavior.

use datastore_client::{ClientError, ClientResult, SharedEntity};
use datastore_testkit::{
    complete_key_strategy, entity_strategy, key_strategy, kind_strategy,
    matching_dataset_strategy, mock_client, partial_entity, partial_key_strategy,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn put_with_matching_dataset_appends_one_mutation(
        (dataset, entity) in matching_dataset_strategy().prop_flat_map(|(dataset, key_dataset)| {
            (Just(dataset), entity_strategy(key_strategy(key_dataset)))
        })
    ) {
        let (_, client) = mock_client(&dataset);
        let batch = client.batch();
        let partial = entity.key().map(|k| k.is_partial()).unwrap_or(false);
        let shared = SharedEntity::new(entity);

        batch.put(&shared).unwrap();

        let mutations = batch.mutations();
        prop_assert_eq!(mutations.len(), 1);
        if partial {
            prop_assert_eq!(mutations.insert_auto_id().len(), 1);
            prop_assert_eq!(batch.partial_key_entities().len(), 1);
        } else {
            prop_assert_eq!(mutations.upsert().len(), 1);
            prop_assert!(batch.partial_key_entities().is_empty());
        }
    }

    #[test]
    fn delete_of_partial_key_always_fails(key in partial_key_strategy("DATASET".into())) {
        let (_, client) = mock_client("DATASET");
        let batch = client.batch();

        prop_assert!(matches!(batch.delete(&key), Err(ClientError::PartialKey)));
        prop_assert!(batch.mutations().is_empty());
    }

    #[test]
    fn delete_of_complete_key_appends_one_mutation(key in complete_key_strategy("DATASET".into())) {
        let (_, client) = mock_client("DATASET");
        let batch = client.batch();

        batch.delete(&key).unwrap();
        let mutations = batch.mutations();
        prop_assert_eq!(mutations.delete(), &[key.to_wire()][..]);
    }

    #[test]
    fn nesting_restores_previous_batch(depth in 1usize..12) {
        let (_, client) = mock_client("DATASET");
        let batches: Vec<_> = (0..depth).map(|_| client.batch()).collect();

        let mut guards = Vec::new();
        for batch in &batches {
            guards.push(batch.begin());
            prop_assert!(batch.is_current());
        }
        prop_assert_eq!(client.batches().len(), depth);

        for index in (0..depth).rev() {
            prop_assert!(batches[index].is_current());
            drop(guards.pop());
            let expected = index.checked_sub(1).map(|i| batches[i].id());
            prop_assert_eq!(client.current_batch().map(|b| b.id()), expected);
        }
    }

    #[test]
    fn commit_completes_keys_by_position(
        kinds in prop::collection::vec(kind_strategy(), 0..8),
        complete in prop::collection::vec(complete_key_strategy("DATASET".into()), 0..4),
    ) {
        let (connection, client) = mock_client("DATASET");
        let ids: Vec<i64> = (0..kinds.len() as i64).map(|i| 1000 + i * 7).collect();
        connection.set_assigned_ids(ids.clone());

        let partial: Vec<SharedEntity> = kinds
            .iter()
            .map(|kind| partial_entity("DATASET", kind))
            .collect();
        let others: Vec<SharedEntity> = complete
            .iter()
            .map(|key| SharedEntity::new(datastore_client::Entity::with_key(key.clone())))
            .collect();

        let batch = client.batch();
        let result: ClientResult<()> = batch.scoped(|batch| {
            // Interleave complete keys between the partial ones.
            for i in 0..partial.len().max(others.len()) {
                if let Some(entity) = partial.get(i) {
                    batch.put(entity)?;
                }
                if let Some(other) = others.get(i) {
                    batch.put(other)?;
                }
            }
            Ok(())
        });
        result.unwrap();

        for ((entity, kind), id) in partial.iter().zip(&kinds).zip(&ids) {
            let key = entity.key().unwrap();
            prop_assert!(!key.is_partial());
            prop_assert_eq!(key.id(), Some(*id));
            prop_assert_eq!(key.kind(), kind.as_str());
        }
        for (entity, key) in others.iter().zip(&complete) {
            let current = entity.key();
            prop_assert_eq!(current.as_ref(), Some(key));
        }
    }

    #[test]
    fn failed_scope_never_commits(count in 0usize..5) {
        let (connection, client) = mock_client("DATASET");
        let batch = client.batch();

        let result: ClientResult<()> = batch.scoped(|batch| {
            for _ in 0..count {
                batch.put(&partial_entity("DATASET", "Kind"))?;
            }
            Err(ClientError::Protocol("aborted".into()))
        });

        prop_assert!(result.is_err());
        prop_assert_eq!(connection.commit_count(), 0);
        prop_assert!(client.current_batch().is_none());
    }
}

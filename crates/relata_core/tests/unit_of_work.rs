//! Identity map, dirty checking and write ordering through the session API.

use proptest::prelude::*;
use relata_core::{CoreError, EntityStatus};
use relata_testkit::prelude::*;

#[test]
fn modified_member_is_updated_exactly_once() {
    init_test_logging();
    let db = TestDatabase::memory();
    let mut em = db.create_entity_manager().unwrap();
    em.begin().unwrap();

    let alice = member(1, "A");
    em.persist(&alice).unwrap();
    let stats = em.flush().unwrap();
    assert_eq!(stats.inserted, 1);

    alice.write().name = "B".into();
    db.provider.clear_statements();
    let stats = em.flush().unwrap();
    assert_eq!(stats.updated, 1);
    assert_eq!(db.provider.statements_starting_with("UPDATE").len(), 1);
    assert_eq!(
        em.persistence_context().snapshot(&alice).unwrap().to_vec(),
        vec!["B".into(), relata_core::Value::Null]
    );

    db.provider.clear_statements();
    let stats = em.flush().unwrap();
    assert_eq!(stats.total(), 0);
    assert!(db.provider.statements().is_empty());
    em.commit().unwrap();

    em.begin().unwrap();
    let stored = em.find::<Member>(1).unwrap().unwrap();
    assert_eq!(stored.read().name, "B");
    em.commit().unwrap();
}

#[test]
fn changing_a_managed_identifier_fails_the_commit() {
    let db = TestDatabase::memory();
    let mut em = db.create_entity_manager().unwrap();
    em.begin().unwrap();
    em.persist(&member(1, "A")).unwrap();
    em.commit().unwrap();

    em.begin().unwrap();
    let stored = em.find::<Member>(1).unwrap().unwrap();
    {
        let mut guard = stored.write();
        guard.id = 99;
        guard.name = "B".into();
    }
    db.provider.clear_statements();
    assert!(matches!(em.commit(), Err(CoreError::InvalidState { .. })));
    assert!(db.provider.statements_starting_with("UPDATE").is_empty());
    assert!(!em.is_transaction_active());

    em.begin().unwrap();
    assert_eq!(em.find::<Member>(1).unwrap().unwrap().read().name, "A");
    assert!(em.find::<Member>(99).unwrap().is_none());
    em.commit().unwrap();
}

#[test]
fn removed_member_is_gone_after_flush() {
    let db = TestDatabase::memory();
    let mut em = db.create_entity_manager().unwrap();
    em.begin().unwrap();

    let bob = member(2, "Bob");
    em.persist(&bob).unwrap();
    em.remove(&bob).unwrap();
    assert_eq!(em.persistence_context().status(&bob), Some(EntityStatus::Removed));
    assert!(em
        .persistence_context()
        .get_entity::<Member>(2)
        .unwrap()
        .is_some());

    let stats = em.flush().unwrap();
    assert_eq!((stats.inserted, stats.deleted), (1, 1));
    assert!(em
        .persistence_context()
        .get_entity::<Member>(2)
        .unwrap()
        .is_none());
    assert!(em.find::<Member>(2).unwrap().is_none());
    em.commit().unwrap();
}

#[test]
fn insertions_run_before_updates_before_deletions() {
    let db = TestDatabase::memory();
    let mut em = db.create_entity_manager().unwrap();
    em.begin().unwrap();
    em.persist(&member(1, "Kept")).unwrap();
    em.persist(&member(2, "Doomed")).unwrap();
    em.commit().unwrap();

    em.begin().unwrap();
    let kept = em.find::<Member>(1).unwrap().unwrap();
    let doomed = em.find::<Member>(2).unwrap().unwrap();
    db.provider.clear_statements();

    em.remove(&doomed).unwrap();
    kept.write().age = Some(40);
    em.persist(&member(3, "New")).unwrap();
    em.flush().unwrap();

    let verbs: Vec<String> = db
        .provider
        .statements()
        .iter()
        .filter_map(|sql| sql.split_whitespace().next().map(str::to_string))
        .collect();
    assert_eq!(verbs, vec!["INSERT", "UPDATE", "DELETE"]);
    em.commit().unwrap();
}

#[test]
fn removal_errors_follow_entry_status() {
    let db = TestDatabase::memory();
    let mut em = db.create_entity_manager().unwrap();
    em.begin().unwrap();

    let stranger = member(9, "Stranger");
    assert!(matches!(
        em.remove(&stranger),
        Err(CoreError::NotManaged { .. })
    ));

    em.persist(&stranger).unwrap();
    em.remove(&stranger).unwrap();
    assert!(matches!(
        em.remove(&stranger),
        Err(CoreError::InvalidState { .. })
    ));
    em.rollback().unwrap();
}

#[test]
fn distinct_instance_with_same_key_is_rejected() {
    let db = TestDatabase::memory();
    let mut em = db.create_entity_manager().unwrap();
    em.begin().unwrap();
    em.persist(&member(1, "First")).unwrap();
    assert!(matches!(
        em.persist(&member(1, "Second")),
        Err(CoreError::DuplicateIdentity { .. })
    ));
    em.rollback().unwrap();
}

#[test]
fn generated_id_enters_identity_map_on_flush() {
    let db = TestDatabase::memory();
    let mut em = db.create_entity_manager().unwrap();
    em.begin().unwrap();

    let red = team("Red");
    em.persist(&red).unwrap();
    assert!(em.contains(&red).unwrap());
    assert!(red.read().id.is_none());

    em.flush().unwrap();
    let id = red.read().id.unwrap();
    let found = em.find::<Team>(id).unwrap().unwrap();
    assert!(found.ptr_eq(&red));

    red.write().active = false;
    assert_eq!(em.flush().unwrap().updated, 1);
    em.commit().unwrap();

    em.begin().unwrap();
    let stored = em.find::<Team>(id).unwrap().unwrap();
    assert!(!stored.read().active);
    em.commit().unwrap();
}

#[test]
fn clear_detaches_everything() {
    let db = TestDatabase::memory();
    let mut em = db.create_entity_manager().unwrap();
    em.begin().unwrap();
    let alice = member(1, "Alice");
    em.persist(&alice).unwrap();

    let entry = em.persistence_context().entry(&alice).unwrap();
    em.clear().unwrap();
    assert_eq!(entry.status(), EntityStatus::Detached);
    assert!(!em.contains(&alice).unwrap());
    assert_eq!(em.persistence_context().pending_actions(), 0);
    em.commit().unwrap();

    em.begin().unwrap();
    assert!(em.find::<Member>(1).unwrap().is_none());
    em.commit().unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn update_issued_only_when_state_changed(
        original in member_strategy(),
        edits in prop::collection::vec(member_edit_strategy(), 0..4),
    ) {
        let db = TestDatabase::memory();
        let mut em = db.create_entity_manager().unwrap();
        em.begin().unwrap();

        let entity = relata_core::EntityRef::new(original.clone());
        em.persist(&entity).unwrap();
        em.flush().unwrap();

        for edit in &edits {
            edit.apply(&mut entity.write());
        }
        let changed = *entity.read() != original;

        let stats = em.flush().unwrap();
        prop_assert_eq!(stats.updated, usize::from(changed));
        prop_assert_eq!(em.flush().unwrap().total(), 0);
        em.rollback().unwrap();
    }
}

//! Transaction lifecycle and connection release through the session API.

use relata_core::{CoreError, TransactionStatus};
use relata_testkit::prelude::*;

#[test]
fn begin_twice_fails() {
    let db = TestDatabase::memory();
    let mut em = db.create_entity_manager().unwrap();
    em.begin().unwrap();
    assert!(matches!(em.begin(), Err(CoreError::IllegalState { .. })));
    assert_eq!(db.provider.acquire_count(), 1);
    em.rollback().unwrap();
}

#[test]
fn rollback_before_begin_is_a_no_op() {
    let db = TestDatabase::memory();
    let mut em = db.create_entity_manager().unwrap();
    em.rollback().unwrap();
    assert_eq!(em.transaction_status(), TransactionStatus::NotActive);
    assert_eq!(db.provider.acquire_count(), 0);
}

#[test]
fn successful_commit_releases_once() {
    let db = TestDatabase::memory();
    let mut em = db.create_entity_manager().unwrap();
    em.begin().unwrap();
    em.persist(&member(1, "Alice")).unwrap();
    em.commit().unwrap();

    assert_eq!(em.transaction_status(), TransactionStatus::Committed);
    assert_eq!(db.provider.commit_count(), 1);
    assert_eq!(db.provider.release_count(), 1);
    assert_eq!(db.provider.outstanding(), 0);
    assert!(matches!(em.flush(), Err(CoreError::IllegalState { .. })));
}

#[test]
fn failed_commit_rolls_back_and_releases_once() {
    let db = TestDatabase::memory();
    let mut em = db.create_entity_manager().unwrap();
    em.begin().unwrap();
    em.persist(&member(1, "Alice")).unwrap();
    db.provider.fail_commit(true);

    assert!(matches!(em.commit(), Err(CoreError::Transaction { .. })));
    assert_eq!(em.transaction_status(), TransactionStatus::RolledBack);
    assert_eq!(db.provider.rollback_count(), 1);
    assert_eq!(db.provider.release_count(), 1);
    assert!(em.persistence_context().is_empty());

    db.provider.fail_commit(false);
    em.begin().unwrap();
    assert!(em.find::<Member>(1).unwrap().is_none());
    em.commit().unwrap();
    assert_eq!(db.provider.outstanding(), 0);
}

#[test]
fn failed_rollback_still_releases_once() {
    let db = TestDatabase::memory();
    let mut em = db.create_entity_manager().unwrap();
    em.begin().unwrap();
    db.provider.fail_rollback(true);

    assert!(matches!(em.rollback(), Err(CoreError::Transaction { .. })));
    assert_eq!(em.transaction_status(), TransactionStatus::RolledBack);
    assert_eq!(db.provider.release_count(), 1);

    em.rollback().unwrap();
    assert_eq!(db.provider.release_count(), 1);
}

#[test]
fn failed_flush_rolls_back_the_unit_of_work() {
    let db = TestDatabase::memory();
    let mut em = db.create_entity_manager().unwrap();
    em.begin().unwrap();
    em.persist(&member(1, "Alice")).unwrap();
    em.persist(&member(2, "Bob")).unwrap();
    db.provider.fail_statements_containing(Some("INSERT INTO members"));

    let err = em.commit().unwrap_err();
    assert!(matches!(err, CoreError::PersistenceIo { ref sql, .. } if sql.starts_with("INSERT")));
    assert_eq!(db.provider.commit_count(), 0);
    assert_eq!(db.provider.release_count(), 1);
    assert!(em.persistence_context().is_empty());

    db.provider.fail_statements_containing(None);
    em.begin().unwrap();
    assert!(em.find::<Member>(1).unwrap().is_none());
    em.commit().unwrap();
}

#[test]
fn terminal_transaction_is_replaced_on_begin() {
    let db = TestDatabase::memory();
    let mut em = db.create_entity_manager().unwrap();
    for round in 0..3 {
        em.begin().unwrap();
        assert!(em.is_transaction_active());
        em.persist(&member(round, "Member")).unwrap();
        if round % 2 == 0 {
            em.commit().unwrap();
        } else {
            em.rollback().unwrap();
        }
    }
    assert_eq!(db.provider.acquire_count(), 3);
    assert_eq!(db.provider.release_count(), 3);

    em.begin().unwrap();
    assert!(em.find::<Member>(0).unwrap().is_some());
    assert!(em.find::<Member>(1).unwrap().is_none());
    assert!(em.find::<Member>(2).unwrap().is_some());
    em.commit().unwrap();
}

#[test]
fn dropping_an_active_manager_releases_its_connection() {
    let db = TestDatabase::memory();
    {
        let mut em = db.create_entity_manager().unwrap();
        em.begin().unwrap();
        em.persist(&member(1, "Alice")).unwrap();
        em.flush().unwrap();
    }
    assert_eq!(db.provider.rollback_count(), 1);
    assert_eq!(db.provider.outstanding(), 0);

    let mut em = db.create_entity_manager().unwrap();
    em.begin().unwrap();
    assert!(em.find::<Member>(1).unwrap().is_none());
    em.commit().unwrap();
}

#[test]
fn unavailable_provider_leaves_transaction_inactive() {
    let db = TestDatabase::memory();
    let mut em = db.create_entity_manager().unwrap();
    db.provider.fail_acquire(true);
    assert!(matches!(em.begin(), Err(CoreError::Transaction { .. })));
    assert_eq!(em.transaction_status(), TransactionStatus::NotActive);

    db.provider.fail_acquire(false);
    em.begin().unwrap();
    em.commit().unwrap();
}

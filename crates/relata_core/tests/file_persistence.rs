//! Data written through one factory is visible to another over the same file.

use relata_testkit::prelude::*;

#[test]
fn committed_rows_survive_a_new_factory() {
    let db = TestDatabase::file();
    let team_id = {
        let mut em = db.create_entity_manager().unwrap();
        em.begin().unwrap();
        em.persist(&member(1, "Alice")).unwrap();
        let blue = team("Blue");
        em.persist(&blue).unwrap();
        em.commit().unwrap();
        let id = blue.read().id.unwrap();
        em.close().unwrap();
        id
    };
    db.close().unwrap();

    let reopened = db.reopen();
    let mut em = reopened.create_entity_manager().unwrap();
    em.begin().unwrap();
    assert_eq!(em.find::<Member>(1).unwrap().unwrap().read().name, "Alice");
    let blue = em.find::<Team>(team_id).unwrap().unwrap();
    assert_eq!(blue.read().name, "Blue");
    assert!(blue.read().active);
    em.commit().unwrap();
    reopened.close().unwrap();
}

#[test]
fn rolled_back_rows_are_not_written() {
    let db = TestDatabase::file();
    let mut em = db.create_entity_manager().unwrap();
    em.begin().unwrap();
    em.persist(&member(1, "Ghost")).unwrap();
    em.flush().unwrap();
    em.rollback().unwrap();

    let reopened = db.reopen();
    let mut other = reopened.create_entity_manager().unwrap();
    other.begin().unwrap();
    assert!(other.find::<Member>(1).unwrap().is_none());
    other.commit().unwrap();
}

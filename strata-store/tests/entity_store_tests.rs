use serde_json::json;
use strata_model::Entity;
use strata_store::{Change, EntityStore};
use strata_types::EntityId;

fn make_entity(entity_type: &str, title: &str) -> Entity {
    Entity::new(entity_type, json!({ "title": title }))
}

#[test]
fn save_and_retrieve_entity() {
    let store = EntityStore::open_in_memory().unwrap();
    let entity = make_entity("note", "first");

    store.apply(&[Change::Upsert(entity.clone())]).unwrap();
    let loaded = store.get(&entity.id).unwrap().unwrap();
    assert_eq!(loaded.id, entity.id);
    assert_eq!(loaded.get_str("/title"), Some("first"));
}

#[test]
fn get_missing_returns_none() {
    let store = EntityStore::open_in_memory().unwrap();
    assert!(store.get(&EntityId::new()).unwrap().is_none());
}

#[test]
fn upsert_replaces_existing_document() {
    let store = EntityStore::open_in_memory().unwrap();
    let mut entity = make_entity("note", "before");
    store.apply(&[Change::Upsert(entity.clone())]).unwrap();

    entity.data = json!({ "title": "after" });
    entity.touch();
    store.apply(&[Change::Upsert(entity.clone())]).unwrap();

    let loaded = store.get(&entity.id).unwrap().unwrap();
    assert_eq!(loaded.get_str("/title"), Some("after"));
    assert_eq!(store.count_by_type("note").unwrap(), 1);
}

#[test]
fn delete_removes_entity() {
    let store = EntityStore::open_in_memory().unwrap();
    let entity = make_entity("note", "gone");
    store.apply(&[Change::Upsert(entity.clone())]).unwrap();
    store.apply(&[Change::Delete(entity.id)]).unwrap();
    assert!(store.get(&entity.id).unwrap().is_none());
}

#[test]
fn batch_apply_is_atomic_per_call() {
    let store = EntityStore::open_in_memory().unwrap();
    let a = make_entity("note", "a");
    let b = make_entity("note", "b");

    store
        .apply(&[Change::Upsert(a.clone()), Change::Upsert(b.clone())])
        .unwrap();

    assert_eq!(store.count_by_type("note").unwrap(), 2);
}

#[test]
fn fetch_by_type_filters_and_orders() {
    let store = EntityStore::open_in_memory().unwrap();
    let first = make_entity("note", "first");
    let second = make_entity("note", "second");
    let other = make_entity("task", "other");

    store
        .apply(&[
            Change::Upsert(second.clone()),
            Change::Upsert(first.clone()),
            Change::Upsert(other),
        ])
        .unwrap();

    let notes = store.fetch_by_type("note").unwrap();
    assert_eq!(notes.len(), 2);
    let ids: Vec<_> = notes.iter().map(|n| n.id).collect();
    assert!(ids.contains(&first.id));
    assert!(ids.contains(&second.id));
}

#[test]
fn store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("entities.sqlite");

    let entity = make_entity("note", "durable");
    {
        let store = EntityStore::open(&path).unwrap();
        store.apply(&[Change::Upsert(entity.clone())]).unwrap();
    }

    let store = EntityStore::open(&path).unwrap();
    let loaded = store.get(&entity.id).unwrap().unwrap();
    assert_eq!(loaded.get_str("/title"), Some("durable"));
}

use serde_json::json;
use std::sync::Arc;
use strata_core::{Query, SpawnPolicy, Stack, StackConfig, StackRegistry};
use strata_store::EntityStore;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn disk_stack(name: &str, dir: &std::path::Path) -> Arc<Stack> {
    StackRegistry::new()
        .register(StackConfig::new(name).store_location(dir))
        .unwrap()
}

#[test]
fn background_save_is_visible_in_main_but_not_on_disk() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let stack = disk_stack("propagation", dir.path());
    let store_path = dir.path().join("propagation.sqlite");

    let entity = stack
        .write(|tx| tx.insert("note", json!({"title": "staged"})))
        .unwrap();

    // Main reflects the background context's commit immediately.
    assert!(stack.get(&entity.id).unwrap().is_some());

    // The physical store does not: the merge stopped at main.
    let raw = EntityStore::open(&store_path).unwrap();
    assert!(raw.get(&entity.id).unwrap().is_none());

    // Saving main and then root reaches the store.
    stack.checkpoint().unwrap();
    let raw = EntityStore::open(&store_path).unwrap();
    let persisted = raw.get(&entity.id).unwrap().unwrap();
    assert_eq!(persisted.get_str("/title"), Some("staged"));
}

#[test]
fn uncommitted_changes_are_invisible_outside_their_context() {
    let stack = StackRegistry::new()
        .register(StackConfig::new("isolation").memory_only(true))
        .unwrap();

    let observer = Arc::clone(&stack);
    stack
        .write(move |tx| {
            let staged = tx.insert("note", json!({"title": "private"}))?;
            // Before this transaction commits, main must not see the insert.
            assert!(observer.get(&staged.id)?.is_none());
            assert_eq!(observer.count(&Query::of("note"))?, 0);
            Ok(())
        })
        .unwrap();

    assert_eq!(stack.count(&Query::of("note")).unwrap(), 1);
}

#[test]
fn later_merge_wins_for_the_same_entity() {
    let stack = StackRegistry::new()
        .register(StackConfig::new("last-wins").memory_only(true))
        .unwrap();

    let entity = stack
        .write(|tx| tx.insert("counter", json!({"value": 0})))
        .unwrap();

    // Two sibling background contexts edit the same entity; their commits
    // are ordered here, and the later merge replaces the earlier one.
    for value in [1, 2] {
        let context = stack.background_context().unwrap();
        let id = entity.id;
        stack
            .write_on(&context, move |tx| {
                let mut found = tx.get(&id)?.unwrap();
                let mut updates = serde_json::Map::new();
                updates.insert("value".into(), json!(value));
                tx.update(&mut found, updates)?;
                Ok(())
            })
            .unwrap();
    }

    let merged = stack.get(&entity.id).unwrap().unwrap();
    assert_eq!(merged.get_number("/value"), Some(2.0));
}

#[test]
fn merge_refreshes_entities_already_materialized_in_the_parent() {
    let dir = tempfile::tempdir().unwrap();
    let stack = disk_stack("refresh", dir.path());

    let entity = stack
        .write(|tx| tx.insert("person", json!({"name": "Ada"})))
        .unwrap();
    stack.checkpoint().unwrap();

    // Reference the entity from main so it is materialized there.
    assert!(stack.get(&entity.id).unwrap().is_some());

    let id = entity.id;
    stack
        .write(move |tx| {
            let mut person = tx.get(&id)?.unwrap();
            let mut updates = serde_json::Map::new();
            updates.insert("name".into(), json!("Lovelace"));
            tx.update(&mut person, updates)?;
            Ok(())
        })
        .unwrap();

    // Flush main's pending upward; the refreshed materialized row is what
    // main still reads afterwards.
    stack.checkpoint().unwrap();
    let refreshed = stack.get(&entity.id).unwrap().unwrap();
    assert_eq!(refreshed.get_str("/name"), Some("Lovelace"));
}

#[test]
fn deletion_propagates_to_main_then_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let stack = disk_stack("deletion", dir.path());
    let store_path = dir.path().join("deletion.sqlite");

    let entity = stack
        .write(|tx| tx.insert("note", json!({"title": "doomed"})))
        .unwrap();
    stack.checkpoint().unwrap();

    let doomed = entity.clone();
    stack
        .write(move |tx| {
            tx.delete(&doomed);
            Ok(())
        })
        .unwrap();

    // Gone from main's view, still on disk.
    assert!(stack.get(&entity.id).unwrap().is_none());
    let raw = EntityStore::open(&store_path).unwrap();
    assert!(raw.get(&entity.id).unwrap().is_some());

    stack.checkpoint().unwrap();
    let raw = EntityStore::open(&store_path).unwrap();
    assert!(raw.get(&entity.id).unwrap().is_none());
}

#[test]
fn child_of_root_contexts_bypass_main_on_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let stack = StackRegistry::new()
        .register(
            StackConfig::new("manual")
                .store_location(dir.path())
                .spawn_policy(SpawnPolicy::ChildOfRoot),
        )
        .unwrap();
    let store_path = dir.path().join("manual.sqlite");

    let entity = stack
        .write(|tx| tx.insert("note", json!({"title": "direct"})))
        .unwrap();

    // The background context merged into the root, so only the root save
    // stands between the commit and the disk.
    stack.checkpoint().unwrap();
    let raw = EntityStore::open(&store_path).unwrap();
    assert!(raw.get(&entity.id).unwrap().is_some());
}

#[test]
fn save_of_clean_context_is_a_no_op() {
    let stack = StackRegistry::new()
        .register(StackConfig::new("clean").memory_only(true))
        .unwrap();
    assert!(!stack.main_context().has_changes());
    stack.main_context().save().unwrap();
    stack.checkpoint().unwrap();
}

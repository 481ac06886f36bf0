use serde_json::json;
use std::sync::Arc;
use strata_core::bridge::{identities_of, resolve, resolve_all, resolve_required, to_identity};
use strata_core::{Stack, StackConfig, StackError, StackRegistry};

fn memory_stack(name: &str) -> Arc<Stack> {
    StackRegistry::new()
        .register(StackConfig::new(name).memory_only(true))
        .unwrap()
}

#[test]
fn identity_round_trip_returns_the_same_persisted_entity() {
    let stack = memory_stack("bridge-roundtrip");
    let entity = stack
        .write(|tx| tx.insert("person", json!({"name": "Ada"})))
        .unwrap();

    let identity = to_identity(&entity);
    let resolved = resolve(&identity, stack.main_context()).unwrap().unwrap();

    assert_eq!(resolved.id, entity.id);
    assert_eq!(resolved.entity_type, entity.entity_type);
    assert_eq!(resolved.get_str("/name"), Some("Ada"));
}

#[test]
fn resolution_materializes_into_the_target_context() {
    let stack = memory_stack("bridge-materialize");
    let entity = stack
        .write(|tx| tx.insert("person", json!({"name": "Ada"})))
        .unwrap();

    // A context spawned after the commit has never seen the entity; the
    // bridge faults it in rather than handing the original across.
    let background = stack.background_context().unwrap();
    let resolved = resolve(&to_identity(&entity), &background)
        .unwrap()
        .unwrap();
    assert_eq!(resolved.id, entity.id);
}

#[test]
fn batch_resolution_preserves_shape_and_order() {
    let stack = memory_stack("bridge-batch");
    let (a, b) = stack
        .write(|tx| {
            let a = tx.insert("note", json!({"title": "a"}))?;
            let b = tx.insert("note", json!({"title": "b"}))?;
            Ok((a, b))
        })
        .unwrap();

    let identities = identities_of(&[a.clone(), b.clone()]);
    assert_eq!(identities.len(), 2);

    let resolved = resolve_all(&identities, stack.main_context()).unwrap();
    assert_eq!(resolved[0].as_ref().unwrap().id, a.id);
    assert_eq!(resolved[1].as_ref().unwrap().id, b.id);
}

#[test]
fn deleted_entity_resolves_absent_without_failing_siblings() {
    let stack = memory_stack("bridge-absent");
    let (kept, deleted) = stack
        .write(|tx| {
            let kept = tx.insert("note", json!({"title": "kept"}))?;
            let deleted = tx.insert("note", json!({"title": "deleted"}))?;
            Ok((kept, deleted))
        })
        .unwrap();

    // Delete one of the two upstream of any future resolution target.
    let doomed = deleted.clone();
    stack
        .write(move |tx| {
            tx.delete(&doomed);
            Ok(())
        })
        .unwrap();

    let identities = identities_of(&[kept.clone(), deleted.clone()]);
    let resolved = resolve_all(&identities, stack.main_context()).unwrap();

    assert_eq!(resolved[0].as_ref().unwrap().id, kept.id);
    assert!(resolved[1].is_none());
}

#[test]
fn resolution_in_a_descendant_reflects_ancestor_deletes() {
    let stack = memory_stack("bridge-descendant");
    let entity = stack
        .write(|tx| tx.insert("note", json!({"title": "transient"})))
        .unwrap();

    let doomed = entity.clone();
    stack
        .write(move |tx| {
            tx.delete(&doomed);
            Ok(())
        })
        .unwrap();

    // A fresh descendant of main faults through the parent chain and sees
    // the pending deletion.
    let background = stack.background_context().unwrap();
    assert!(resolve(&to_identity(&entity), &background).unwrap().is_none());
}

#[test]
fn resolve_required_errors_on_absence() {
    let stack = memory_stack("bridge-required");
    let entity = stack
        .write(|tx| tx.insert("note", json!({"title": "gone soon"})))
        .unwrap();

    let doomed = entity.clone();
    stack
        .write(move |tx| {
            tx.delete(&doomed);
            Ok(())
        })
        .unwrap();

    let result = resolve_required(&to_identity(&entity), stack.main_context());
    assert!(matches!(result, Err(StackError::UnresolvedIdentity(_))));
}

#[test]
fn unsaved_entity_resolves_absent_in_other_contexts() {
    let stack = memory_stack("bridge-unsaved");

    // Create an entity but fail the transaction so it never commits. Its
    // identity token exists from birth, yet no context can reach it.
    let identity = std::sync::Mutex::new(None);
    let identity_slot = Arc::new(identity);
    let slot = Arc::clone(&identity_slot);
    let _: Result<(), _> = stack.write(move |tx| {
        let staged = tx.insert("note", json!({"title": "never"}))?;
        *slot.lock().unwrap() = Some(to_identity(&staged));
        Err(StackError::aborted("abandon"))
    });

    let identity = identity_slot.lock().unwrap().take().unwrap();
    assert!(resolve(&identity, stack.main_context()).unwrap().is_none());
}

use strata_core::{StackConfig, StackError, StackRegistry};

#[test]
fn register_and_look_up_by_name() {
    let registry = StackRegistry::new();
    let stack = registry
        .register(StackConfig::new("alpha").memory_only(true))
        .unwrap();
    assert_eq!(stack.name(), "alpha");

    let found = registry.stack_named("alpha").unwrap();
    assert!(std::sync::Arc::ptr_eq(&stack, &found));
}

#[test]
fn duplicate_name_is_rejected_first_writer_wins() {
    let registry = StackRegistry::new();
    let first = registry
        .register(StackConfig::new("alpha").memory_only(true))
        .unwrap();

    let second = registry.register(StackConfig::new("alpha").memory_only(true));
    assert!(matches!(second, Err(StackError::DuplicateName(name)) if name == "alpha"));

    // The first registration is untouched.
    let found = registry.stack_named("alpha").unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &found));
}

#[test]
fn unknown_name_is_absent_not_an_error() {
    let registry = StackRegistry::new();
    assert!(registry.stack_named("never-registered").is_none());
}

#[test]
fn store_open_failure_is_fatal_to_registration() {
    let dir = tempfile::tempdir().unwrap();
    let bad_path = dir.path().join("missing-subdir").join("stack.sqlite");

    let registry = StackRegistry::new();
    let result = registry.register(StackConfig::new("broken").store_location(bad_path));

    assert!(matches!(result, Err(StackError::StoreOpen { name, .. }) if name == "broken"));
    // Nothing half-registered.
    assert!(registry.stack_named("broken").is_none());
}

#[test]
fn memory_stack_is_a_lazy_singleton() {
    let registry = StackRegistry::new();
    let a = registry.memory_stack().unwrap();
    let b = registry.memory_stack().unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
    assert_eq!(a.name(), "memory");
}

#[test]
fn unregister_frees_the_name() {
    let registry = StackRegistry::new();
    registry
        .register(StackConfig::new("alpha").memory_only(true))
        .unwrap();

    assert!(registry.unregister("alpha").is_some());
    assert!(registry.stack_named("alpha").is_none());

    // The name can be claimed again after explicit teardown.
    registry
        .register(StackConfig::new("alpha").memory_only(true))
        .unwrap();
}

#[test]
fn clear_tears_down_every_stack() {
    let registry = StackRegistry::new();
    registry
        .register(StackConfig::new("a").memory_only(true))
        .unwrap();
    registry
        .register(StackConfig::new("b").memory_only(true))
        .unwrap();

    registry.clear();
    assert!(registry.stack_named("a").is_none());
    assert!(registry.stack_named("b").is_none());
}

#[test]
fn disk_backed_stack_uses_explicit_location() {
    let dir = tempfile::tempdir().unwrap();
    let registry = StackRegistry::new();
    let stack = registry
        .register(StackConfig::new("ondisk").store_location(dir.path()))
        .unwrap();
    assert_eq!(stack.name(), "ondisk");
    assert!(dir.path().join("ondisk.sqlite").exists());
}

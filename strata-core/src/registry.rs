//! Process-wide catalog of named stacks.
//!
//! An explicit registry object (not thread-local statics): create-on-first-
//! use singletons for the default and memory stacks, idempotent lookup by
//! name, and explicit teardown for tests. Registration is first-writer-wins;
//! a second registration under the same name is an error, never silently
//! merged.

use crate::stack::{Stack, StackConfig};
use crate::{StackError, StackResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

const DEFAULT_STACK_NAME: &str = "default";
const MEMORY_STACK_NAME: &str = "memory";

/// Catalog of named stacks with process lifetime.
#[derive(Default)]
pub struct StackRegistry {
    stacks: RwLock<HashMap<String, Arc<Stack>>>,
}

impl StackRegistry {
    /// An empty registry. Tests use private registries; production code
    /// normally goes through [`global`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new stack under `config`'s name.
    ///
    /// Eagerly opens the physical store; open failure surfaces as
    /// [`StackError::StoreOpen`] and nothing is registered. A name already
    /// in use fails with [`StackError::DuplicateName`] — first writer wins.
    pub fn register(&self, config: StackConfig) -> StackResult<Arc<Stack>> {
        let mut stacks = self.stacks.write();
        if stacks.contains_key(&config.name) {
            warn!(stack = %config.name, "rejected duplicate stack registration");
            return Err(StackError::DuplicateName(config.name));
        }

        let stack = Stack::open(config)?;
        stacks.insert(stack.name().to_string(), Arc::clone(&stack));
        Ok(stack)
    }

    /// Looks up a stack by name. Absence is not an error.
    #[must_use]
    pub fn stack_named(&self, name: &str) -> Option<Arc<Stack>> {
        self.stacks.read().get(name).cloned()
    }

    /// The process-wide disk-backed stack, created lazily on first access.
    pub fn default_stack(&self) -> StackResult<Arc<Stack>> {
        self.singleton(DEFAULT_STACK_NAME, false)
    }

    /// The process-wide memory-only stack, created lazily on first access.
    pub fn memory_stack(&self) -> StackResult<Arc<Stack>> {
        self.singleton(MEMORY_STACK_NAME, true)
    }

    fn singleton(&self, name: &str, memory_only: bool) -> StackResult<Arc<Stack>> {
        if let Some(stack) = self.stack_named(name) {
            return Ok(stack);
        }

        let mut stacks = self.stacks.write();
        // Re-check under the write lock; another thread may have won.
        if let Some(stack) = stacks.get(name) {
            return Ok(Arc::clone(stack));
        }
        let stack = Stack::open(StackConfig::new(name).memory_only(memory_only))?;
        stacks.insert(name.to_string(), Arc::clone(&stack));
        info!(stack = %name, "created singleton stack");
        Ok(stack)
    }

    /// Removes a stack from the registry, returning it if present.
    pub fn unregister(&self, name: &str) -> Option<Arc<Stack>> {
        self.stacks.write().remove(name)
    }

    /// Drops every registered stack. Teardown hook for tests.
    pub fn clear(&self) {
        self.stacks.write().clear();
    }
}

/// The process-wide registry, initialized on first use.
pub fn global() -> &'static StackRegistry {
    static GLOBAL: OnceLock<StackRegistry> = OnceLock::new();
    GLOBAL.get_or_init(StackRegistry::new)
}

/// Registers a stack in the global registry.
pub fn register_stack(config: StackConfig) -> StackResult<Arc<Stack>> {
    global().register(config)
}

/// Looks up a stack in the global registry.
#[must_use]
pub fn stack_named(name: &str) -> Option<Arc<Stack>> {
    global().stack_named(name)
}

/// The global disk-backed default stack.
pub fn default_stack() -> StackResult<Arc<Stack>> {
    global().default_stack()
}

/// The global memory-only stack.
pub fn memory_stack() -> StackResult<Arc<Stack>> {
    global().memory_stack()
}

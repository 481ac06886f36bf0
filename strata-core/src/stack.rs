//! Stacks: named persistence configurations owning a context tree.
//!
//! A stack owns the root context (bound to the physical store), one
//! long-lived main context for read/UI-facing work, and spawns ephemeral
//! background contexts per write transaction. Where background contexts
//! hang in the tree is configurable; children of main is the default.

use crate::context::Context;
use crate::query::Query;
use crate::transaction::{self, Transaction};
use crate::{StackError, StackResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use strata_model::{DomainHandler, Entity, Schema};
use strata_store::EntityStore;
use strata_types::EntityId;
use tracing::info;

/// Where per-transaction background contexts attach in the context tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpawnPolicy {
    /// Background contexts are children of the main context; their saves
    /// become visible to main before anything reaches the root.
    #[default]
    ChildOfMain,
    /// Background contexts are children of the root; main only observes
    /// their changes once it refetches after a root save.
    ChildOfRoot,
}

/// Configuration for registering a stack.
pub struct StackConfig {
    pub(crate) name: String,
    pub(crate) schema: Schema,
    pub(crate) location: Option<PathBuf>,
    pub(crate) memory_only: bool,
    pub(crate) spawn_policy: SpawnPolicy,
    pub(crate) handlers: HashMap<String, Arc<dyn DomainHandler>>,
}

impl StackConfig {
    /// A disk-backed configuration with a permissive schema. The store
    /// location defaults to the platform data directory.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: Schema::new(),
            location: None,
            memory_only: false,
            spawn_policy: SpawnPolicy::default(),
            handlers: HashMap::new(),
        }
    }

    /// Sets the entity schema, fixed for the stack's lifetime.
    #[must_use]
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Sets the directory or file path for the physical store.
    #[must_use]
    pub fn store_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Keeps the stack entirely in memory; nothing touches disk.
    #[must_use]
    pub fn memory_only(mut self, memory_only: bool) -> Self {
        self.memory_only = memory_only;
        self
    }

    /// Chooses where background contexts attach.
    #[must_use]
    pub fn spawn_policy(mut self, policy: SpawnPolicy) -> Self {
        self.spawn_policy = policy;
        self
    }

    /// Attaches a validation handler for one entity type.
    #[must_use]
    pub fn handler(mut self, entity_type: impl Into<String>, handler: Arc<dyn DomainHandler>) -> Self {
        self.handlers.insert(entity_type.into(), handler);
        self
    }

    fn resolved_location(&self) -> StackResult<PathBuf> {
        if let Some(location) = &self.location {
            if location.extension().is_some() {
                return Ok(location.clone());
            }
            return Ok(location.join(format!("{}.sqlite", self.name)));
        }

        let base = directories::ProjectDirs::from("", "", "strata")
            .map(|dirs| dirs.data_local_dir().to_path_buf())
            .unwrap_or_else(std::env::temp_dir);
        std::fs::create_dir_all(&base).map_err(|source| StackError::StoreOpen {
            name: self.name.clone(),
            source: source.into(),
        })?;
        Ok(base.join(format!("{}.sqlite", self.name)))
    }
}

/// A named persistence configuration owning a context tree and,
/// optionally, a physical store on disk.
pub struct Stack {
    name: String,
    root: Arc<Context>,
    main: Arc<Context>,
    spawn_policy: SpawnPolicy,
    background_seq: AtomicU64,
}

impl Stack {
    /// Opens the physical store and builds the root and main contexts.
    ///
    /// Store-open failure is fatal to the registration that requested it.
    pub(crate) fn open(config: StackConfig) -> StackResult<Arc<Self>> {
        let store = if config.memory_only {
            EntityStore::open_in_memory()
        } else {
            let location = config.resolved_location()?;
            EntityStore::open(location)
        }
        .map_err(|source| StackError::StoreOpen {
            name: config.name.clone(),
            source,
        })?;

        let schema = Arc::new(config.schema);
        let handlers = Arc::new(config.handlers);
        let root = Context::root(
            format!("{}.root", config.name),
            Arc::new(store),
            schema,
            handlers,
        )?;
        let main = Context::child(format!("{}.main", config.name), &root)?;

        info!(
            stack = %config.name,
            memory_only = config.memory_only,
            "stack opened"
        );

        Ok(Arc::new(Self {
            name: config.name,
            root,
            main,
            spawn_policy: config.spawn_policy,
            background_seq: AtomicU64::new(0),
        }))
    }

    /// The stack's registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The long-lived main context for read/UI-facing work.
    #[must_use]
    pub fn main_context(&self) -> &Arc<Context> {
        &self.main
    }

    /// Spawns an ephemeral background context for a write transaction.
    ///
    /// Discard it (drop the handle) after commit or rollback.
    pub fn background_context(&self) -> StackResult<Arc<Context>> {
        let seq = self.background_seq.fetch_add(1, Ordering::Relaxed);
        let parent = match self.spawn_policy {
            SpawnPolicy::ChildOfMain => &self.main,
            SpawnPolicy::ChildOfRoot => &self.root,
        };
        Context::child(format!("{}.bg-{seq}", self.name), parent)
    }

    // ── transactions ─────────────────────────────────────────────────

    /// Runs a write transaction on a fresh background context, blocking
    /// until commit and save complete. The context is discarded afterward.
    pub fn write<T, F>(&self, block: F) -> StackResult<T>
    where
        F: FnOnce(&mut Transaction) -> StackResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let context = self.background_context()?;
        transaction::run(&context, block)
    }

    /// Runs a transaction on a specific context. Calling this from inside
    /// a transaction already on `context`'s lane nests inline.
    pub fn write_on<T, F>(&self, context: &Arc<Context>, block: F) -> StackResult<T>
    where
        F: FnOnce(&mut Transaction) -> StackResult<T> + Send + 'static,
        T: Send + 'static,
    {
        transaction::run(context, block)
    }

    /// Asynchronous write: returns once the transaction is enqueued on a
    /// fresh background context and reports the outcome through
    /// `completion` when commit/save (or rollback) finishes.
    pub fn write_async<F, C>(&self, block: F, completion: C) -> StackResult<()>
    where
        F: FnOnce(&mut Transaction) -> StackResult<()> + Send + 'static,
        C: FnOnce(StackResult<()>) + Send + 'static,
    {
        let context = self.background_context()?;
        transaction::run_async(&context, block, completion)
    }

    // ── reads (main-context view) ────────────────────────────────────

    /// Fetches one entity by id through the main context.
    pub fn get(&self, id: &EntityId) -> StackResult<Option<Entity>> {
        let context = Arc::clone(&self.main);
        let id = *id;
        self.main.lane().run_sync(move || context.get(&id))?
    }

    /// Executes a query against the main context's view.
    pub fn fetch(&self, query: &Query) -> StackResult<Vec<Entity>> {
        query.run(&self.main)
    }

    /// Executes a query and returns the first result.
    pub fn first(&self, query: &Query) -> StackResult<Option<Entity>> {
        Ok(self.fetch(query)?.into_iter().next())
    }

    /// Counts the results a query would return against the main context.
    pub fn count(&self, query: &Query) -> StackResult<usize> {
        Ok(self.fetch(query)?.len())
    }

    // ── persistence ──────────────────────────────────────────────────

    /// Flushes merged changes to disk: saves the main context into the
    /// root, then saves the root into the physical store.
    pub fn checkpoint(&self) -> StackResult<()> {
        self.main.save()?;
        self.root.save()
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("name", &self.name)
            .field("spawn_policy", &self.spawn_policy)
            .finish()
    }
}

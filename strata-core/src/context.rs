//! Contexts: single-lane confinement domains over a view of the entity graph.
//!
//! Every context owns one execution lane and two pieces of state: a
//! materialized-row cache (its store-of-record view) and a pending
//! change-set (uncommitted mutations). Reads fault through the parent
//! chain down to the physical store; saves commit locally and merge the
//! delta one level up. A child's saved changes stay invisible beyond its
//! parent until the parent itself saves.
//!
//! Merge absorption is the one mutation that arrives from outside the
//! owning lane: it is serialized by the parent's state lock, applied in
//! the order child saves complete. Everything else asserts lane ownership
//! in debug builds.

use crate::lane::Lane;
use crate::{StackError, StackResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use strata_model::{DomainHandler, Entity, Schema};
use strata_store::{Change, EntityStore};
use strata_types::EntityId;
use tracing::{debug, trace};

#[derive(Default)]
struct ContextState {
    /// Entities materialized into this context's view.
    rows: HashMap<EntityId, Entity>,
    /// Uncommitted mutations staged by this context's own transactions,
    /// collapsed per entity.
    pending: HashMap<EntityId, Change>,
    /// Changes absorbed from descendant saves, not yet saved upward.
    /// Kept apart from `pending` so a rollback cannot discard a sibling's
    /// merge that arrived mid-transaction.
    merged: HashMap<EntityId, Change>,
}

impl ContextState {
    /// The full delta a save would carry: absorbed merges overlaid with
    /// this context's own staging, which wins per entity.
    fn combined_delta(&self) -> HashMap<EntityId, Change> {
        let mut delta = self.merged.clone();
        for (id, change) in &self.pending {
            delta.insert(*id, change.clone());
        }
        delta
    }
}

/// A single-lane confinement domain over a view of the entity graph.
pub struct Context {
    name: String,
    parent: Option<Arc<Context>>,
    /// The physical store. Present only on the root context, which is its
    /// exclusive writer.
    store: Option<Arc<EntityStore>>,
    schema: Arc<Schema>,
    handlers: Arc<HashMap<String, Arc<dyn DomainHandler>>>,
    lane: Lane,
    state: Mutex<ContextState>,
    /// Transaction nesting depth. Only touched from the owning lane.
    tx_depth: AtomicU32,
}

impl Context {
    pub(crate) fn root(
        name: impl Into<String>,
        store: Arc<EntityStore>,
        schema: Arc<Schema>,
        handlers: Arc<HashMap<String, Arc<dyn DomainHandler>>>,
    ) -> StackResult<Arc<Self>> {
        let name = name.into();
        Ok(Arc::new(Self {
            lane: Lane::spawn(name.clone())?,
            name,
            parent: None,
            store: Some(store),
            schema,
            handlers,
            state: Mutex::new(ContextState::default()),
            tx_depth: AtomicU32::new(0),
        }))
    }

    pub(crate) fn child(name: impl Into<String>, parent: &Arc<Context>) -> StackResult<Arc<Self>> {
        let name = name.into();
        Ok(Arc::new(Self {
            lane: Lane::spawn(name.clone())?,
            name,
            parent: Some(Arc::clone(parent)),
            store: None,
            schema: Arc::clone(&parent.schema),
            handlers: Arc::clone(&parent.handlers),
            state: Mutex::new(ContextState::default()),
            tx_depth: AtomicU32::new(0),
        }))
    }

    /// The context's name, used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parent context, absent only for the root.
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<Context>> {
        self.parent.as_ref()
    }

    pub(crate) fn lane(&self) -> &Lane {
        &self.lane
    }

    pub(crate) fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Whether the calling thread is this context's lane.
    #[must_use]
    pub fn is_on_lane(&self) -> bool {
        self.lane.is_current()
    }

    // ── reads ────────────────────────────────────────────────────────

    /// Fetches one entity by id, faulting through the parent chain and
    /// materializing a local copy on an ancestor hit.
    ///
    /// The returned entity is an owned instance belonging to this
    /// context's view; it is never a reference shared with another lane.
    pub fn get(&self, id: &EntityId) -> StackResult<Option<Entity>> {
        {
            let state = self.state.lock();
            for layer in [&state.pending, &state.merged] {
                match layer.get(id) {
                    Some(Change::Upsert(entity)) => return Ok(Some(entity.clone())),
                    Some(Change::Delete(_)) => return Ok(None),
                    None => {}
                }
            }
            if let Some(entity) = state.rows.get(id) {
                return Ok(Some(entity.clone()));
            }
        }

        // Fault: not materialized here. Ask upward, then cache locally.
        let fetched = match (&self.parent, &self.store) {
            (Some(parent), _) => parent.get(id)?,
            (None, Some(store)) => store.get(id)?,
            (None, None) => None,
        };

        if let Some(entity) = &fetched {
            trace!(context = %self.name, id = %id, "materialized entity");
            self.state.lock().rows.insert(*id, entity.clone());
        }
        Ok(fetched)
    }

    /// Builds this context's view of every entity of one type.
    ///
    /// Starts from the physical store and overlays each level's
    /// materialized rows and pending changes from the root down to this
    /// context, so descendants shadow ancestors and pending shadows
    /// committed state within a level.
    pub(crate) fn snapshot_of_type(&self, entity_type: &str) -> StackResult<Vec<Entity>> {
        let mut chain: Vec<&Context> = Vec::new();
        let mut cursor: &Context = self;
        loop {
            chain.push(cursor);
            match &cursor.parent {
                Some(parent) => cursor = parent,
                None => break,
            }
        }
        // chain is self..=root; the root's store seeds the base view.
        let root = chain[chain.len() - 1];
        let mut view: HashMap<EntityId, Entity> = match &root.store {
            Some(store) => store
                .fetch_by_type(entity_type)?
                .into_iter()
                .map(|e| (e.id, e))
                .collect(),
            None => HashMap::new(),
        };

        for context in chain.iter().rev() {
            let state = context.state.lock();
            for entity in state.rows.values() {
                if entity.entity_type == entity_type {
                    view.insert(entity.id, entity.clone());
                }
            }
            for layer in [&state.merged, &state.pending] {
                for (id, change) in layer {
                    match change {
                        Change::Upsert(entity) if entity.entity_type == entity_type => {
                            view.insert(*id, entity.clone());
                        }
                        // A staged upsert of another type still shadows any
                        // older document under the same id.
                        Change::Upsert(_) | Change::Delete(_) => {
                            view.remove(id);
                        }
                    }
                }
            }
        }

        Ok(view.into_values().collect())
    }

    // ── staging (transaction-side mutations) ─────────────────────────

    pub(crate) fn stage(&self, change: Change) {
        debug_assert!(
            self.lane.is_current(),
            "context '{}' mutated off its lane",
            self.name
        );
        let mut state = self.state.lock();
        state.pending.insert(change.entity_id(), change);
    }

    pub(crate) fn pending_snapshot(&self) -> HashMap<EntityId, Change> {
        self.state.lock().pending.clone()
    }

    pub(crate) fn restore_pending(&self, snapshot: HashMap<EntityId, Change>) {
        debug_assert!(self.lane.is_current());
        self.state.lock().pending = snapshot;
    }

    /// Whether any uncommitted mutations are staged or absorbed.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        let state = self.state.lock();
        !state.pending.is_empty() || !state.merged.is_empty()
    }

    pub(crate) fn begin_transaction(&self) -> u32 {
        self.tx_depth.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn end_transaction(&self) {
        self.tx_depth.fetch_sub(1, Ordering::SeqCst);
    }

    // ── save / merge ─────────────────────────────────────────────────

    /// Commits this context's pending changes and merges them one level up.
    ///
    /// Dispatches to the owning lane; safe to call from any thread. At the
    /// root the delta is applied to the physical store instead — the only
    /// operation that reaches disk.
    pub fn save(self: &Arc<Self>) -> StackResult<()> {
        let context = Arc::clone(self);
        self.lane.run_sync(move || context.save_on_lane())?
    }

    pub(crate) fn save_on_lane(&self) -> StackResult<()> {
        debug_assert!(self.lane.is_current());

        let delta = self.state.lock().combined_delta();
        if delta.is_empty() {
            return Ok(());
        }

        for change in delta.values() {
            if let Change::Upsert(entity) = change {
                self.validate(entity)?;
            }
        }

        match (&self.parent, &self.store) {
            (Some(parent), _) => {
                self.commit_locally(&delta);
                debug!(
                    context = %self.name,
                    parent = %parent.name,
                    changes = delta.len(),
                    "saved context; merging into parent"
                );
                parent.absorb(delta);
                Ok(())
            }
            (None, Some(store)) => {
                let batch: Vec<Change> = delta.values().cloned().collect();
                store
                    .apply(&batch)
                    .map_err(|e| StackError::SaveConflict(e.to_string()))?;
                self.commit_locally(&delta);
                debug!(context = %self.name, changes = delta.len(), "root saved to store");
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }

    /// Clears the saved delta out of the staging layers and refreshes the
    /// materialized view with the committed values.
    ///
    /// A merged entry that no longer matches the saved value was absorbed
    /// after the delta was taken; it stays staged for the next save.
    fn commit_locally(&self, delta: &HashMap<EntityId, Change>) {
        let mut state = self.state.lock();
        for (id, change) in delta {
            state.pending.remove(id);
            if state.merged.get(id).is_some_and(|current| current != change) {
                continue;
            }
            state.merged.remove(id);
            match change {
                Change::Upsert(entity) => {
                    state.rows.insert(*id, entity.clone());
                }
                Change::Delete(_) => {
                    state.rows.remove(id);
                }
            }
        }
    }

    /// Absorbs a descendant's committed delta into this context's pending
    /// state.
    ///
    /// Entities already materialized here are refreshed in place; anything
    /// else stays faulted until referenced. Last merge wins for the same
    /// entity — siblings saving conflicting edits are ordered by save
    /// completion, nothing more.
    fn absorb(&self, changes: HashMap<EntityId, Change>) {
        let mut state = self.state.lock();
        for (id, change) in changes {
            match &change {
                Change::Upsert(entity) => {
                    if state.rows.contains_key(&id) {
                        state.rows.insert(id, entity.clone());
                    }
                }
                Change::Delete(_) => {
                    state.rows.remove(&id);
                }
            }
            state.merged.insert(id, change);
        }
        trace!(context = %self.name, "absorbed descendant changes");
    }

    fn validate(&self, entity: &Entity) -> StackResult<()> {
        if !self.schema.accepts(&entity.entity_type) {
            return Err(StackError::SaveConflict(format!(
                "entity type '{}' is not in the schema",
                entity.entity_type
            )));
        }
        if let Some(descriptor) = self.schema.descriptor(&entity.entity_type) {
            if let Some(pointer) = &descriptor.identifier_field {
                if entity.data.pointer(pointer).is_none() {
                    return Err(StackError::SaveConflict(format!(
                        "entity type '{}' requires identifier attribute '{}'",
                        entity.entity_type, pointer
                    )));
                }
            }
        }
        if let Some(handler) = self.handlers.get(&entity.entity_type) {
            handler
                .validate(entity)
                .map_err(StackError::SaveConflict)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name.clone()))
            .field("root", &self.store.is_some())
            .finish()
    }
}

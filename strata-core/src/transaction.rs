//! Transactions: nestable units of work bound to one context.
//!
//! A transaction moves `Pending → {Committed, RolledBack}` and never
//! leaves that path. The coordinator dispatches the caller's block to the
//! context's lane; a block that opens another transaction on the same
//! context runs inline at depth+1 — it never re-enters the queue and never
//! deadlocks. Only the outermost commit saves; failure at any depth
//! restores the pending snapshot taken at that depth's entry and
//! re-signals the error. Nothing is ever partially saved.

use crate::context::Context;
use crate::query::Query;
use crate::{StackError, StackResult};
use serde_json::{Map, Value};
use std::sync::Arc;
use strata_model::{Entity, Persistable};
use strata_store::Change;
use strata_types::EntityId;
use tracing::debug;

/// Runs `block` as a transaction on `context`, blocking until the commit
/// (and, for the outermost transaction, the save) completes.
pub(crate) fn run<T, F>(context: &Arc<Context>, block: F) -> StackResult<T>
where
    F: FnOnce(&mut Transaction) -> StackResult<T> + Send + 'static,
    T: Send + 'static,
{
    let ctx = Arc::clone(context);
    context.lane().run_sync(move || execute_on_lane(&ctx, block))?
}

/// Asynchronous variant: enqueues the transaction and reports the outcome
/// through `completion` once commit/save (or rollback) finishes off-lane.
pub(crate) fn run_async<F, C>(context: &Arc<Context>, block: F, completion: C) -> StackResult<()>
where
    F: FnOnce(&mut Transaction) -> StackResult<()> + Send + 'static,
    C: FnOnce(StackResult<()>) + Send + 'static,
{
    let ctx = Arc::clone(context);
    context.lane().run_async(move || {
        let outcome = execute_on_lane(&ctx, block);
        completion(outcome);
    })
}

fn execute_on_lane<T, F>(context: &Arc<Context>, block: F) -> StackResult<T>
where
    F: FnOnce(&mut Transaction) -> StackResult<T>,
{
    let depth = context.begin_transaction();
    let snapshot = context.pending_snapshot();

    let result = {
        let mut transaction = Transaction { context, depth };
        block(&mut transaction)
    };

    let outcome = match result {
        Ok(value) => {
            if depth == 0 {
                match context.save_on_lane() {
                    Ok(()) => Ok(value),
                    Err(error) => {
                        context.restore_pending(snapshot);
                        Err(error)
                    }
                }
            } else {
                // Nested commit: defer the save to the outermost transaction.
                Ok(value)
            }
        }
        Err(error) => {
            debug!(context = %context.name(), depth, "transaction rolled back");
            context.restore_pending(snapshot);
            Err(error)
        }
    };

    context.end_transaction();
    outcome
}

/// A unit of work bound to one context, handed to transaction blocks.
///
/// All mutations stage into the context's pending change-set and become
/// durable only through the outermost commit's save.
pub struct Transaction<'ctx> {
    context: &'ctx Arc<Context>,
    depth: u32,
}

impl Transaction<'_> {
    /// The nesting depth of this transaction; 0 is outermost.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// The context this transaction is bound to.
    #[must_use]
    pub fn context(&self) -> &Arc<Context> {
        self.context
    }

    // ── writes ───────────────────────────────────────────────────────

    /// Inserts a new entity of the given type.
    pub fn insert(&mut self, entity_type: &str, data: Value) -> StackResult<Entity> {
        if !self.context.schema().accepts(entity_type) {
            return Err(StackError::UnknownEntityType(entity_type.to_string()));
        }
        let entity = Entity::new(entity_type, data);
        self.context.stage(Change::Upsert(entity.clone()));
        Ok(entity)
    }

    /// Inserts a typed value through its [`Persistable`] mapping.
    pub fn insert_typed<T: Persistable>(&mut self, value: &T) -> StackResult<Entity> {
        let data = value
            .to_data()
            .map_err(|e| StackError::Aborted(e.to_string()))?;
        self.insert(T::ENTITY, data)
    }

    /// Stages the given entity document, replacing any prior staged or
    /// committed version under the same id.
    pub fn put(&mut self, entity: Entity) -> StackResult<()> {
        if !self.context.schema().accepts(&entity.entity_type) {
            return Err(StackError::UnknownEntityType(entity.entity_type));
        }
        self.context.stage(Change::Upsert(entity));
        Ok(())
    }

    /// Applies a dictionary of attribute updates to `entity` and stages
    /// the result.
    pub fn update(&mut self, entity: &mut Entity, attributes: Map<String, Value>) -> StackResult<()> {
        entity.apply_attributes(attributes);
        self.context.stage(Change::Upsert(entity.clone()));
        Ok(())
    }

    /// Deletes one entity.
    pub fn delete(&mut self, entity: &Entity) {
        self.context.stage(Change::Delete(entity.id));
    }

    /// Deletes several entities.
    pub fn delete_all(&mut self, entities: &[Entity]) {
        for entity in entities {
            self.context.stage(Change::Delete(entity.id));
        }
    }

    /// Fetches an entity with the given identifier-key value, inserting a
    /// fresh one when no match exists.
    ///
    /// `key` is a JSON pointer to a top-level attribute (e.g. "/email").
    pub fn fetch_or_insert(
        &mut self,
        entity_type: &str,
        key: &str,
        value: &Value,
    ) -> StackResult<Entity> {
        let mut results = self.fetch_or_insert_all(entity_type, key, std::slice::from_ref(value))?;
        Ok(results.remove(0))
    }

    /// Batch variant of [`fetch_or_insert`](Self::fetch_or_insert); the
    /// result preserves the order of `values`.
    pub fn fetch_or_insert_all(
        &mut self,
        entity_type: &str,
        key: &str,
        values: &[Value],
    ) -> StackResult<Vec<Entity>> {
        let existing = self.context.snapshot_of_type(entity_type)?;
        let attribute = key.trim_start_matches('/');

        let mut results = Vec::with_capacity(values.len());
        for value in values {
            match existing.iter().find(|e| e.data.pointer(key) == Some(value)) {
                Some(entity) => results.push(entity.clone()),
                None => {
                    let mut data = Map::new();
                    data.insert(attribute.to_string(), value.clone());
                    results.push(self.insert(entity_type, Value::Object(data))?);
                }
            }
        }
        Ok(results)
    }

    // ── reads ────────────────────────────────────────────────────────

    /// Fetches one entity by id through this context's view.
    pub fn get(&self, id: &EntityId) -> StackResult<Option<Entity>> {
        self.context.get(id)
    }

    /// Executes a query against this context's view.
    pub fn fetch(&self, query: &Query) -> StackResult<Vec<Entity>> {
        query.run(self.context)
    }

    /// Executes a query and returns the first result.
    pub fn first(&self, query: &Query) -> StackResult<Option<Entity>> {
        Ok(self.fetch(query)?.into_iter().next())
    }

    /// Counts the results a query would return.
    pub fn count(&self, query: &Query) -> StackResult<usize> {
        Ok(self.fetch(query)?.len())
    }
}

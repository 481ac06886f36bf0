//! Transactional context hierarchy for Strata.
//!
//! This crate organizes access to a persisted entity graph through a tree
//! of execution-confined contexts:
//! - [`StackRegistry`] — process-wide catalog of named [`Stack`]s
//! - [`Context`] — a single-lane confinement domain over the graph
//! - [`Transaction`] — nestable units of work bound to one context
//! - [`bridge`] — the object-identity bridge, the only sanctioned way to
//!   move an entity reference between lanes
//! - [`Query`] — predicate/sort/limit/offset convenience over a context
//!
//! Entity payloads, descriptors, and the physical store live in
//! `strata-model` and `strata-store`; this crate only governs how contexts
//! are structured, how transactions compose, and how references cross
//! contexts safely.

pub mod bridge;
mod context;
mod error;
mod lane;
mod query;
mod registry;
mod stack;
mod transaction;

pub use context::Context;
pub use error::{StackError, StackResult};
pub use query::Query;
pub use registry::{
    StackRegistry, default_stack, global, memory_stack, register_stack, stack_named,
};
pub use stack::{SpawnPolicy, Stack, StackConfig};
pub use transaction::Transaction;

pub use strata_model::{
    DomainHandler, Entity, EntityDescriptor, Persistable, Schema, entity_name_for,
};
pub use strata_types::{EntityId, ObjectIdentity};

//! Core entity model for Strata.
//!
//! Defines the universal types the context and storage layers depend on:
//! - [`Entity`] — the generic data container (id, type, JSON payload, timestamps)
//! - [`EntityDescriptor`] / [`Schema`] — per-type metadata fixed at stack registration
//! - [`Persistable`] — typed veneer over the generic container
//! - [`DomainHandler`] — optional trait for custom pre-persist validation
//!
//! These types are consumed by the store and by the context hierarchy; they
//! form the contract between application entity types and the engine.

mod descriptor;
mod entity;
mod handler;

pub use descriptor::{EntityDescriptor, Persistable, Schema, entity_name_for};
pub use entity::Entity;
pub use handler::DomainHandler;

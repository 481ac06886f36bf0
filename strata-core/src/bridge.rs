//! The object-identity bridge.
//!
//! The only sanctioned way to hand an entity reference from one execution
//! lane to another: extract its [`ObjectIdentity`], cross the boundary with
//! the token, and re-materialize in the target context. The bridge never
//! returns the original instance — always a lane-local copy — so live
//! entities can never be shared across lanes by accident.

use crate::context::Context;
use crate::{StackError, StackResult};
use std::sync::Arc;
use strata_model::Entity;
use strata_types::ObjectIdentity;

/// Extracts the stable identity token of one entity.
#[must_use]
pub fn to_identity(entity: &Entity) -> ObjectIdentity {
    entity.identity()
}

/// Extracts identity tokens for an ordered collection, preserving order.
#[must_use]
pub fn identities_of(entities: &[Entity]) -> Vec<ObjectIdentity> {
    entities.iter().map(Entity::identity).collect()
}

/// Resolves an identity into the equivalent live entity in
/// `context`, materializing it there if not already present.
///
/// Returns `None` when the target context's reachable store no longer
/// holds the entity (e.g. deleted upstream) — absence, not failure.
pub fn resolve(identity: &ObjectIdentity, context: &Arc<Context>) -> StackResult<Option<Entity>> {
    let ctx = Arc::clone(context);
    let id = identity.id();
    let entity_type = identity.entity_type().to_string();

    let found = context.lane().run_sync(move || ctx.get(&id))??;
    // A token never changes meaning; a type mismatch means the id now
    // belongs to nothing this identity ever named.
    Ok(found.filter(|entity| entity.entity_type == entity_type))
}

/// Resolves an identity, treating absence as an error.
pub fn resolve_required(identity: &ObjectIdentity, context: &Arc<Context>) -> StackResult<Entity> {
    resolve(identity, context)?.ok_or_else(|| StackError::UnresolvedIdentity(identity.clone()))
}

/// Resolves an ordered collection of identities, preserving shape and
/// order.
///
/// Per-element failures stay per-element: a token the target context
/// cannot locate yields `None` in its slot without failing the rest of the
/// batch.
pub fn resolve_all(
    identities: &[ObjectIdentity],
    context: &Arc<Context>,
) -> StackResult<Vec<Option<Entity>>> {
    identities
        .iter()
        .map(|identity| resolve(identity, context))
        .collect()
}

use crate::Entity;

/// Optional trait for entity types that need validation beyond what the
/// descriptor expresses.
///
/// Most types do NOT need this — descriptor-driven checks cover the common
/// case. Implement it for things like field-format validation or
/// cross-attribute consistency, and attach it to the stack at registration.
pub trait DomainHandler: Send + Sync {
    /// Validate an entity before it is committed.
    /// Return `Err(message)` to reject the write.
    fn validate(&self, entity: &Entity) -> Result<(), String> {
        let _ = entity;
        Ok(())
    }
}

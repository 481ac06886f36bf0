//! Stable, context-independent entity references.
//!
//! An [`ObjectIdentity`] names one persisted entity without binding the
//! reference to any particular context. Live entity instances never cross
//! execution lanes; only their identity does, and the receiving side
//! re-materializes a fresh instance in its own context.

use crate::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A store-stable token uniquely identifying one persisted entity.
///
/// Identities are immutable once assigned and are never reused for a
/// different logical entity. The same identity may be materialized as
/// distinct live instances in different contexts simultaneously.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectIdentity {
    entity_type: String,
    id: EntityId,
}

impl ObjectIdentity {
    /// Creates an identity for the given entity type and id.
    #[must_use]
    pub fn new(entity_type: impl Into<String>, id: EntityId) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
        }
    }

    /// The entity type this identity refers to.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// The underlying entity id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.id)
    }
}

impl FromStr for ObjectIdentity {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (entity_type, id) = s
            .rsplit_once('/')
            .ok_or_else(|| crate::Error::InvalidIdentity(s.to_string()))?;
        if entity_type.is_empty() {
            return Err(crate::Error::InvalidIdentity(s.to_string()));
        }
        Ok(Self {
            entity_type: entity_type.to_string(),
            id: EntityId::parse(id)?,
        })
    }
}

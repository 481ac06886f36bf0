use crate::Entity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Describes one entity type for the context and storage layers.
///
/// The descriptor is fixed at stack registration. The optional
/// `identifier_field` names the JSON attribute that acts as the type's
/// external identifier; when absent, the entity's
/// [`ObjectIdentity`](strata_types::ObjectIdentity) token is the identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub entity_type: String,
    /// JSON pointer to the external-identifier attribute (e.g., "/email").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier_field: Option<String>,
}

impl EntityDescriptor {
    /// Creates a descriptor identified by its ObjectIdentity token.
    #[must_use]
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            identifier_field: None,
        }
    }

    /// Declares an external-identifier attribute for this type.
    #[must_use]
    pub fn with_identifier_field(mut self, pointer: impl Into<String>) -> Self {
        self.identifier_field = Some(pointer.into());
        self
    }

    /// Returns the external identifier of `entity`, if this type declares
    /// one and the attribute is present.
    pub fn external_identifier<'a>(&self, entity: &'a Entity) -> Option<&'a Value> {
        let pointer = self.identifier_field.as_deref()?;
        entity.data.pointer(pointer)
    }
}

/// The fixed set of entity descriptors a stack is registered with.
///
/// The schema is handed over once at registration and never reloaded.
/// An empty schema is permissive: any entity type may be stored, with no
/// descriptor-driven validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    descriptors: HashMap<String, EntityDescriptor>,
}

impl Schema {
    /// An empty, permissive schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a schema from descriptors. Later duplicates replace earlier ones.
    #[must_use]
    pub fn with_descriptors(descriptors: impl IntoIterator<Item = EntityDescriptor>) -> Self {
        let mut schema = Self::new();
        for descriptor in descriptors {
            schema.register(descriptor);
        }
        schema
    }

    /// Registers a descriptor.
    pub fn register(&mut self, descriptor: EntityDescriptor) {
        self.descriptors
            .insert(descriptor.entity_type.clone(), descriptor);
    }

    /// Looks up the descriptor for an entity type.
    #[must_use]
    pub fn descriptor(&self, entity_type: &str) -> Option<&EntityDescriptor> {
        self.descriptors.get(entity_type)
    }

    /// Whether the schema carries any descriptors at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Whether `entity_type` may be stored under this schema.
    ///
    /// An empty schema accepts everything; a non-empty schema accepts only
    /// registered types.
    #[must_use]
    pub fn accepts(&self, entity_type: &str) -> bool {
        self.descriptors.is_empty() || self.descriptors.contains_key(entity_type)
    }
}

/// Typed veneer over the generic [`Entity`] container.
///
/// Application types implement this to move between their own struct shape
/// and the JSON payload the engine stores.
pub trait Persistable: Serialize + for<'de> Deserialize<'de> {
    /// The entity type name this Rust type maps to.
    const ENTITY: &'static str;

    /// Serializes `self` into an entity payload.
    fn to_data(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Deserializes a typed value back out of an entity.
    fn from_entity(entity: &Entity) -> serde_json::Result<Self> {
        serde_json::from_value(entity.data.clone())
    }
}

/// Returns the entity type name registered for a Rust type.
#[must_use]
pub fn entity_name_for<T: Persistable>() -> &'static str {
    T::ENTITY
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use strata_types::{EntityId, ObjectIdentity};

/// A generic entity held in a Strata context.
///
/// All application data flows through this type. The `data` field holds
/// arbitrary JSON whose structure is described by the entity type's
/// [`EntityDescriptor`](crate::EntityDescriptor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub entity_type: String,
    pub data: Value,
    pub created_at: i64,
    pub modified_at: i64,
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl Entity {
    /// Creates a new, not-yet-persisted entity with a fresh id.
    #[must_use]
    pub fn new(entity_type: impl Into<String>, data: Value) -> Self {
        let now = now_millis();
        Self {
            id: EntityId::new(),
            entity_type: entity_type.into(),
            data,
            created_at: now,
            modified_at: now,
        }
    }

    /// The store-stable identity of this entity.
    ///
    /// Assigned at creation; it never changes, including across the first
    /// save.
    #[must_use]
    pub fn identity(&self) -> ObjectIdentity {
        ObjectIdentity::new(self.entity_type.clone(), self.id)
    }

    /// Extract a string value from `data` using a JSON pointer (e.g., "/title").
    pub fn get_str(&self, pointer: &str) -> Option<&str> {
        self.data.pointer(pointer).and_then(|v| v.as_str())
    }

    /// Extract a boolean value from `data` using a JSON pointer.
    pub fn get_bool(&self, pointer: &str) -> Option<bool> {
        self.data.pointer(pointer).and_then(|v| v.as_bool())
    }

    /// Extract a numeric value from `data` using a JSON pointer.
    pub fn get_number(&self, pointer: &str) -> Option<f64> {
        self.data.pointer(pointer).and_then(|v| v.as_f64())
    }

    /// Applies a dictionary of top-level attribute updates to `data` and
    /// bumps `modified_at`.
    ///
    /// Non-object payloads are replaced by an object holding the updates.
    pub fn apply_attributes(&mut self, attributes: serde_json::Map<String, Value>) {
        match self.data.as_object_mut() {
            Some(map) => {
                for (key, value) in attributes {
                    map.insert(key, value);
                }
            }
            None => {
                self.data = Value::Object(attributes);
            }
        }
        self.touch();
    }

    /// Bumps `modified_at` to the current time.
    pub fn touch(&mut self) {
        self.modified_at = now_millis().max(self.modified_at + 1);
    }
}

//! Core type definitions for Strata.
//!
//! This crate defines the fundamental, store-agnostic types used throughout
//! the engine:
//! - Entity identifiers (UUID v7)
//! - Object identities — stable, context-independent entity tokens
//!
//! Everything domain-specific (entity payloads, schemas, descriptors)
//! belongs in `strata-model`, not here.

mod identity;
mod ids;

pub use identity::ObjectIdentity;
pub use ids::EntityId;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid object identity: {0}")]
    InvalidIdentity(String),
}

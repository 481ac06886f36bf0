//! Error types for the context and transaction layers.

use strata_store::StoreError;
use strata_types::ObjectIdentity;
use thiserror::Error;

/// Result type for stack operations.
pub type StackResult<T> = Result<T, StackError>;

/// Errors surfaced by the context hierarchy, transactions, and registry.
#[derive(Debug, Error)]
pub enum StackError {
    /// A stack with this name is already registered. First writer wins;
    /// re-registration is never silently idempotent.
    #[error("a stack named '{0}' is already registered")]
    DuplicateName(String),

    /// The physical store could not be opened or created. Fatal to the
    /// registration that attempted it.
    #[error("unable to open the physical store for stack '{name}': {source}")]
    StoreOpen {
        name: String,
        #[source]
        source: StoreError,
    },

    /// A save or merge was rejected — descriptor/handler validation failed
    /// or the underlying engine refused the batch. Rolls back only the
    /// failing transaction's pending changes.
    #[error("save failed: {0}")]
    SaveConflict(String),

    /// An insert named an entity type the stack's schema does not carry.
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    /// An object identity could not be resolved in the target context.
    #[error("object identity could not be resolved: {0}")]
    UnresolvedIdentity(ObjectIdentity),

    /// An execution lane could not be started.
    #[error("failed to start execution lane '{name}': {source}")]
    LaneStart {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A job was submitted to a lane that is no longer running, or the
    /// lane aborted before delivering a result.
    #[error("execution lane '{0}' is no longer running")]
    LaneClosed(String),

    /// A transaction block signaled failure.
    #[error("transaction aborted: {0}")]
    Aborted(String),

    /// Read-path store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl StackError {
    /// Convenience constructor for failing a transaction block.
    #[must_use]
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted(reason.into())
    }
}

//! Error types for removal operations.

use cabinet_store::StoreError;
use cabinet_types::NodeId;

/// Errors surfaced to callers of the removal engine.
///
/// Per-node failures inside a subtree run are never errors: they land in the
/// [`FailureLedger`](crate::FailureLedger). These variants describe requests
/// that cannot start or calls made out of order.
#[derive(Debug, thiserror::Error)]
pub enum RemovalError {
    /// A store call needed to start the operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The request asks for something the engine refuses to do.
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// The target is in a state that forbids the operation.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// The target of a tree removal is missing or not a folder.
    #[error("folder not valid: {0}")]
    FolderNotValid(NodeId),

    /// The single-object delete was refused by the store.
    #[error("permission denied on {node}: {reason}")]
    PermissionDenied { node: NodeId, reason: String },

    /// `remove()` was called without a node returned by `next()`.
    #[error("no current node: call next() before remove()")]
    NoCurrentNode,

    /// Configuration could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias for removal results.
pub type RemovalResult<T> = Result<T, RemovalError>;

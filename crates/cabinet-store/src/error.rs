use cabinet_types::{NodeId, Principal};

/// Errors from node store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The node does not exist (or no longer exists).
    #[error("node not found: {0}")]
    NotFound(NodeId),

    /// The acting identity may not perform the operation on this node.
    #[error("permission denied on {node}: {reason}")]
    PermissionDenied { node: NodeId, reason: String },

    /// The node is locked against the acting identity.
    #[error("node {node} is locked against {principal}")]
    Locked { node: NodeId, principal: Principal },

    /// A folder still has children and cannot be deleted.
    #[error("folder {0} is not empty")]
    NotEmpty(NodeId),

    /// The operation requires a folder.
    #[error("node {0} is not a folder")]
    NotAFolder(NodeId),

    /// The named parent/child association does not exist or may not be removed.
    #[error("invalid association {parent} -> {child}: {reason}")]
    InvalidAssociation {
        parent: NodeId,
        child: NodeId,
        reason: String,
    },

    /// Any other failure of the backing store.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// `true` when the error means the node vanished.
    ///
    /// Removal treats a vanished node as already removed.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

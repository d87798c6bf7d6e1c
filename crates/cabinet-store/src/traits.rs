use cabinet_types::{Association, NodeId, NodeKind, Principal, VersionLabel};

use crate::error::StoreResult;

/// Repository node storage as seen by the removal engine.
///
/// All implementations must satisfy these invariants:
/// - Every operation on a node that does not exist fails with
///   [`StoreError::NotFound`](crate::StoreError::NotFound) (queries that
///   return `bool` or `Option` may instead answer `false`/`None`).
/// - `delete` and `detach` are safe to call against a node that vanished
///   concurrently: they report `NotFound` and change nothing.
/// - `delete` of a checked-out working copy cancels the check-out instead of
///   deleting an ordinary node.
/// - Child listings are atomic per call; the engine never assumes a listing
///   stays valid across calls.
/// - Folders may be filed under more than one parent, even cyclically. The
///   engines expand each folder at most once per run.
pub trait NodeStore: Send + Sync {
    /// Check whether a node exists.
    fn exists(&self, node: &NodeId) -> StoreResult<bool>;

    /// Structural kind of a node.
    fn kind_of(&self, node: &NodeId) -> StoreResult<NodeKind>;

    /// Convenience over [`NodeStore::kind_of`].
    fn is_folder(&self, node: &NodeId) -> StoreResult<bool> {
        Ok(self.kind_of(node)?.is_folder())
    }

    /// Child associations of a folder, in filing order.
    fn children_of(&self, folder: &NodeId) -> StoreResult<Vec<Association>>;

    /// The association through which the node was created, if any.
    fn primary_parent_of(&self, node: &NodeId) -> StoreResult<Option<Association>>;

    /// Current version label of a node, if it is versioned.
    fn version_label_of(&self, node: &NodeId) -> StoreResult<Option<VersionLabel>>;

    /// Fully remove a node. For a checked-out working copy this cancels the
    /// check-out.
    fn delete(&self, node: &NodeId) -> StoreResult<()>;

    /// Remove only the `parent -> node` association.
    fn detach(&self, node: &NodeId, parent: &NodeId) -> StoreResult<()>;

    /// `true` when a lock on the node prevents `principal` from changing it.
    fn is_locked_against(&self, node: &NodeId, principal: &Principal) -> StoreResult<bool>;

    /// `true` when `principal` may override locks.
    fn identity_has_override(&self, principal: &Principal) -> StoreResult<bool>;

    /// `true` when the node is itself a checked-out working copy.
    fn is_checked_out_working_copy(&self, node: &NodeId) -> StoreResult<bool>;

    /// The working copy checked out from this node, if any.
    fn find_checked_out_copy(&self, node: &NodeId) -> StoreResult<Option<NodeId>>;

    /// Purge every historical version of the node.
    fn purge_version_history(&self, node: &NodeId) -> StoreResult<()>;

    /// The repository root folder, which may never be removed.
    ///
    /// Default implementation reports no protected root.
    fn repository_root(&self) -> StoreResult<Option<NodeId>> {
        Ok(None)
    }
}

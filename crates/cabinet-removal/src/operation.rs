//! The physical removal of one node, shared by both engines.

use serde::Serialize;
use tracing::debug;

use cabinet_store::{NodeStore, StoreError, StoreResult};
use cabinet_types::{Association, NodeId};

use crate::config::RemovalConfig;
use crate::policy::Removal;

/// What actually happened to a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Applied {
    Deleted,
    Unfiled,
    /// The node was already gone; counts as removed.
    Vanished,
}

/// Carry out `removal` for `node`, reached through `exact`.
///
/// A `NotFound` from any step means the node vanished underneath us and is
/// reported as [`Applied::Vanished`].
pub fn apply<S: NodeStore + ?Sized>(
    store: &S,
    config: &RemovalConfig,
    node: &NodeId,
    exact: Option<&Association>,
    removal: Removal,
) -> StoreResult<Applied> {
    let result = match (removal, exact) {
        (Removal::Unfile, Some(edge)) => store
            .detach(node, &edge.parent)
            .map(|()| Applied::Unfiled),
        _ => delete(store, config, node).map(|()| Applied::Deleted),
    };
    match result {
        Err(e) if e.is_not_found() => {
            debug!(node = %node.short_id(), "node vanished before removal");
            Ok(Applied::Vanished)
        }
        other => other,
    }
}

/// Full delete: lock gate, optional version purge, then delete (which the
/// store turns into cancel-checkout for working copies).
fn delete<S: NodeStore + ?Sized>(
    store: &S,
    config: &RemovalConfig,
    node: &NodeId,
) -> StoreResult<()> {
    let principal = &config.principal;
    if store.is_locked_against(node, principal)? && !store.identity_has_override(principal)? {
        return Err(StoreError::Locked {
            node: *node,
            principal: principal.clone(),
        });
    }

    if config.delete_all_versions
        && !store.is_checked_out_working_copy(node)?
        && store.find_checked_out_copy(node)?.is_none()
    {
        debug!(node = %node.short_id(), "purging version history");
        store.purge_version_history(node)?;
    }

    store.delete(node)
}

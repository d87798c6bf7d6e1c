//! Repository-facing removal operations.
//!
//! [`RemovalService`] validates single-object and whole-tree removal
//! requests before handing them to the engines. Rejections are
//! [`RemovalError`]s; once a tree run has started, per-node problems only
//! show up in the returned [`FailureLedger`].

use tracing::{debug, info};

use cabinet_store::NodeStore;
use cabinet_types::NodeId;

use crate::config::RemovalConfig;
use crate::enumerator::HierarchyEnumerator;
use crate::error::{RemovalError, RemovalResult};
use crate::ledger::FailureLedger;
use crate::operation::{self, Applied};
use crate::policy::{Removal, UnfileMode};
use crate::queue::{QueueRemover, QueueReport};

/// Removal entry points over a [`NodeStore`].
pub struct RemovalService<'s, S: NodeStore + ?Sized> {
    store: &'s S,
    config: RemovalConfig,
}

impl<'s, S: NodeStore + ?Sized> RemovalService<'s, S> {
    pub fn new(store: &'s S, config: RemovalConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    /// Delete one object.
    ///
    /// A working copy is cancelled rather than deleted. Folders must be
    /// empty, and a document with a checked-out working copy must have the
    /// check-out cancelled first.
    pub fn delete_object(&self, node: &NodeId) -> RemovalResult<Applied> {
        debug!(node = %node.short_id(), "delete object requested");
        self.refuse_root(node, "the repository root cannot be deleted")?;

        if self.store.is_folder(node)? {
            if !self.store.children_of(node)?.is_empty() {
                return Err(RemovalError::ConstraintViolation(format!(
                    "could not delete folder {node} with at least one child"
                )));
            }
        } else if self.store.find_checked_out_copy(node)?.is_some() {
            return Err(RemovalError::ConstraintViolation(format!(
                "could not delete checked-out document {node}; cancel the check-out first"
            )));
        }

        let applied = operation::apply(self.store, &self.config, node, None, Removal::Delete)
            .map_err(|e| RemovalError::PermissionDenied {
                node: *node,
                reason: e.to_string(),
            })?;
        info!(node = %node.short_id(), ?applied, "object removed");
        Ok(applied)
    }

    /// Delete a folder and everything under it with the queue remover.
    ///
    /// `UnfileMode::Unfile` is refused: a tree removal must delete at least
    /// the documents primarily filed in it.
    pub fn delete_tree(
        &self,
        folder: &NodeId,
        mode: UnfileMode,
        continue_on_failure: bool,
    ) -> RemovalResult<FailureLedger> {
        Ok(self.delete_tree_report(folder, mode, continue_on_failure)?.failures)
    }

    /// [`delete_tree`](Self::delete_tree) returning the full run report.
    pub fn delete_tree_report(
        &self,
        folder: &NodeId,
        mode: UnfileMode,
        continue_on_failure: bool,
    ) -> RemovalResult<QueueReport> {
        debug!(folder = %folder.short_id(), %mode, "delete tree requested");
        if !self.config.delete_all_versions {
            return Err(RemovalError::NotSupported(
                "only all-versions tree deletion is supported".into(),
            ));
        }
        if mode == UnfileMode::Unfile {
            return Err(RemovalError::NotSupported("unfiling not supported".into()));
        }
        self.refuse_root(folder, "the repository root cannot be deleted")?;
        if !self.store.exists(folder)? || !self.store.is_folder(folder)? {
            return Err(RemovalError::FolderNotValid(*folder));
        }

        let remover = QueueRemover::new(self.store, self.config.clone());
        Ok(remover.run(folder, mode, continue_on_failure))
    }

    /// A pull enumerator over `root` using this service's configuration.
    pub fn enumerate(&self, root: &NodeId) -> RemovalResult<HierarchyEnumerator<'s, S>> {
        self.refuse_root(root, "the repository root cannot be removed")?;
        Ok(HierarchyEnumerator::new(self.store, *root, self.config.clone()))
    }

    fn refuse_root(&self, node: &NodeId, message: &str) -> RemovalResult<()> {
        if self.store.repository_root()? == Some(*node) {
            return Err(RemovalError::NotSupported(message.into()));
        }
        Ok(())
    }
}

//! In-memory node store for tests, fixtures and embedding.
//!
//! [`InMemoryNodeStore`] keeps the whole repository in a `HashMap` behind a
//! `RwLock`. Besides the [`NodeStore`] contract it offers builder methods
//! (folders, documents, extra filings, versions, check-outs, locks) and
//! fault injection so removal behavior can be exercised end to end.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use cabinet_types::{Association, NodeId, NodeKind, Principal, VersionLabel};

use crate::error::{StoreError, StoreResult};
use crate::traits::NodeStore;

/// A mutation applied through the [`NodeStore`] contract.
///
/// Builder calls and [`InMemoryNodeStore::remove_externally`] are not
/// journaled, and neither is a purge that found no versions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreOp {
    Delete(NodeId),
    CancelCheckout { working_copy: NodeId, original: NodeId },
    Detach { node: NodeId, parent: NodeId },
    PurgeVersions { node: NodeId, purged: usize },
}

#[derive(Clone, Debug)]
struct NodeRecord {
    kind: NodeKind,
    name: String,
    primary: Option<NodeId>,
    parents: Vec<NodeId>,
    children: Vec<NodeId>,
    versions: Vec<VersionLabel>,
    working_copy: Option<NodeId>,
    checked_out_from: Option<NodeId>,
    lock_owner: Option<Principal>,
    denied: bool,
}

impl NodeRecord {
    fn new(kind: NodeKind, name: String, primary: Option<NodeId>) -> Self {
        Self {
            kind,
            name,
            primary,
            parents: primary.into_iter().collect(),
            children: Vec::new(),
            versions: Vec::new(),
            working_copy: None,
            checked_out_from: None,
            lock_owner: None,
            denied: false,
        }
    }
}

#[derive(Debug)]
struct Inner {
    nodes: HashMap<NodeId, NodeRecord>,
    root: NodeId,
    administrators: HashSet<Principal>,
    broken_listings: HashSet<NodeId>,
    vanish_triggers: Vec<(NodeId, NodeId)>,
    journal: Vec<StoreOp>,
}

impl Inner {
    fn node(&self, id: &NodeId) -> StoreResult<&NodeRecord> {
        self.nodes.get(id).ok_or(StoreError::NotFound(*id))
    }

    fn node_mut(&mut self, id: &NodeId) -> StoreResult<&mut NodeRecord> {
        self.nodes.get_mut(id).ok_or(StoreError::NotFound(*id))
    }

    fn folder(&self, id: &NodeId) -> StoreResult<&NodeRecord> {
        let record = self.node(id)?;
        if !record.kind.is_folder() {
            return Err(StoreError::NotAFolder(*id));
        }
        Ok(record)
    }

    fn insert(&mut self, parent: &NodeId, kind: NodeKind, name: &str) -> StoreResult<NodeId> {
        self.folder(parent)?;
        let id = NodeId::new();
        self.nodes
            .insert(id, NodeRecord::new(kind, name.to_string(), Some(*parent)));
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    fn link(&mut self, node: &NodeId, parent: &NodeId) -> StoreResult<()> {
        if self.node(node)?.parents.contains(parent) {
            return Err(StoreError::InvalidAssociation {
                parent: *parent,
                child: *node,
                reason: "already filed".into(),
            });
        }
        self.node_mut(node)?.parents.push(*parent);
        self.node_mut(parent)?.children.push(*node);
        Ok(())
    }

    fn unlink_edge(&mut self, node: &NodeId, parent: &NodeId) {
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|c| c != node);
        }
        if let Some(n) = self.nodes.get_mut(node) {
            n.parents.retain(|p| p != parent);
            if n.primary == Some(*parent) {
                n.primary = None;
            }
        }
    }

    /// Drop a node and every edge touching it. Primary-filed children go
    /// with it; secondary filings are only unlinked.
    fn remove_subtree(&mut self, id: &NodeId) {
        let Some(record) = self.nodes.get(id).cloned() else {
            return;
        };
        for child in &record.children {
            let primary_here = self
                .nodes
                .get(child)
                .is_some_and(|c| c.primary == Some(*id));
            if primary_here {
                self.remove_subtree(child);
            } else {
                self.unlink_edge(child, id);
            }
        }
        for parent in &record.parents {
            self.unlink_edge(id, parent);
        }
        if let Some(wc) = record.working_copy {
            self.remove_subtree(&wc);
        }
        if let Some(original) = record.checked_out_from {
            if let Some(o) = self.nodes.get_mut(&original) {
                o.working_copy = None;
            }
        }
        self.nodes.remove(id);
    }

    fn check_permitted(&self, id: &NodeId, action: &str) -> StoreResult<()> {
        if self.node(id)?.denied {
            return Err(StoreError::PermissionDenied {
                node: *id,
                reason: format!("{action} not permitted"),
            });
        }
        Ok(())
    }
}

/// In-memory, `HashMap`-based node store.
///
/// A fresh store contains only the repository root folder.
pub struct InMemoryNodeStore {
    inner: RwLock<Inner>,
}

impl InMemoryNodeStore {
    /// Create a store holding just the repository root folder.
    pub fn new() -> Self {
        let root = NodeId::new();
        let mut nodes = HashMap::new();
        nodes.insert(root, NodeRecord::new(NodeKind::Folder, String::new(), None));
        Self {
            inner: RwLock::new(Inner {
                nodes,
                root,
                administrators: HashSet::new(),
                broken_listings: HashSet::new(),
                vanish_triggers: Vec::new(),
                journal: Vec::new(),
            }),
        }
    }

    /// The repository root folder.
    pub fn root(&self) -> NodeId {
        self.inner.read().expect("lock poisoned").root
    }

    /// Number of nodes currently stored, root included.
    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").nodes.len()
    }

    /// Returns `true` if only the root folder remains.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    /// Create a folder primarily filed under `parent`.
    pub fn create_folder(&self, parent: &NodeId, name: &str) -> StoreResult<NodeId> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.insert(parent, NodeKind::Folder, name)
    }

    /// Create a document primarily filed under `parent`.
    pub fn create_document(&self, parent: &NodeId, name: &str) -> StoreResult<NodeId> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.insert(parent, NodeKind::Document, name)
    }

    /// File an existing document under an additional (secondary) parent.
    /// Folders have exactly one parent.
    pub fn file(&self, node: &NodeId, parent: &NodeId) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.folder(parent)?;
        if inner.node(node)?.kind.is_folder() {
            return Err(StoreError::InvalidAssociation {
                parent: *parent,
                child: *node,
                reason: "folders cannot be multi-filed".into(),
            });
        }
        inner.link(node, parent)
    }

    /// Record a new version of a document; the last label is current.
    pub fn add_version(&self, node: &NodeId, label: VersionLabel) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        let record = inner.node_mut(node)?;
        if record.kind.is_folder() {
            return Err(StoreError::Backend(format!("folder {node} is not versionable")));
        }
        record.versions.push(label);
        Ok(())
    }

    /// Check out a document, creating a working copy next to it.
    pub fn check_out(&self, node: &NodeId) -> StoreResult<NodeId> {
        let mut inner = self.inner.write().expect("lock poisoned");
        let record = inner.node(node)?.clone();
        if record.kind.is_folder() || record.checked_out_from.is_some() {
            return Err(StoreError::Backend(format!("{node} cannot be checked out")));
        }
        if record.working_copy.is_some() {
            return Err(StoreError::Backend(format!("{node} is already checked out")));
        }
        let parent = record
            .primary
            .ok_or_else(|| StoreError::Backend(format!("{node} has no primary parent")))?;
        let name = format!("{} (Working Copy)", record.name);
        let wc = inner.insert(&parent, NodeKind::Document, &name)?;
        inner.node_mut(&wc)?.checked_out_from = Some(*node);
        inner.node_mut(node)?.working_copy = Some(wc);
        Ok(wc)
    }

    /// Lock a node on behalf of `owner`.
    pub fn lock(&self, node: &NodeId, owner: Principal) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.node_mut(node)?.lock_owner = Some(owner);
        Ok(())
    }

    /// Allow `principal` to override locks.
    pub fn grant_override(&self, principal: Principal) {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.administrators.insert(principal);
    }

    // -----------------------------------------------------------------------
    // Fault injection
    // -----------------------------------------------------------------------

    /// Make every delete, detach and purge of `node` fail with
    /// [`StoreError::PermissionDenied`].
    pub fn deny(&self, node: &NodeId) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.node_mut(node)?.denied = true;
        Ok(())
    }

    /// Make `children_of(folder)` fail with a backend error.
    pub fn break_listing(&self, folder: &NodeId) {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.broken_listings.insert(*folder);
    }

    /// Remove `victim` right after the next listing of `folder` is served,
    /// as if another session deleted it concurrently.
    pub fn vanish_after_listing(&self, folder: &NodeId, victim: &NodeId) {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.vanish_triggers.push((*folder, *victim));
    }

    /// File a folder under a second parent, skipping the single-parent rule.
    /// Lets a backend that tolerates multi-filed folders, and the cycles
    /// they allow, be imitated.
    pub fn link_folder(&self, folder: &NodeId, parent: &NodeId) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.folder(parent)?;
        inner.folder(folder)?;
        inner.link(folder, parent)
    }

    /// Remove a node (and its primary-filed subtree) without going through
    /// the removal contract.
    pub fn remove_externally(&self, node: &NodeId) {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.remove_subtree(node);
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Mutations applied through the [`NodeStore`] contract, in order.
    pub fn journal(&self) -> Vec<StoreOp> {
        self.inner.read().expect("lock poisoned").journal.clone()
    }

    pub fn clear_journal(&self) {
        self.inner.write().expect("lock poisoned").journal.clear();
    }

    pub fn name_of(&self, node: &NodeId) -> Option<String> {
        let inner = self.inner.read().expect("lock poisoned");
        inner.nodes.get(node).map(|r| r.name.clone())
    }

    /// Every parent the node is filed under, primary first.
    pub fn parents_of(&self, node: &NodeId) -> Vec<NodeId> {
        let inner = self.inner.read().expect("lock poisoned");
        inner
            .nodes
            .get(node)
            .map(|r| r.parents.clone())
            .unwrap_or_default()
    }

    /// Number of versions still held for a node.
    pub fn version_count(&self, node: &NodeId) -> usize {
        let inner = self.inner.read().expect("lock poisoned");
        inner.nodes.get(node).map_or(0, |r| r.versions.len())
    }

    /// Slash-separated path following primary parents, e.g. `/R/A`.
    pub fn path_of(&self, node: &NodeId) -> Option<String> {
        let inner = self.inner.read().expect("lock poisoned");
        let mut segments = Vec::new();
        let mut current = inner.nodes.get(node)?;
        let mut id = *node;
        while id != inner.root {
            segments.push(current.name.clone());
            id = current.primary?;
            current = inner.nodes.get(&id)?;
        }
        segments.reverse();
        Some(format!("/{}", segments.join("/")))
    }

    /// Resolve a slash-separated path from the root by child names.
    pub fn resolve(&self, path: &str) -> Option<NodeId> {
        let inner = self.inner.read().expect("lock poisoned");
        let mut current = inner.root;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let record = inner.nodes.get(&current)?;
            current = *record
                .children
                .iter()
                .find(|c| inner.nodes.get(*c).is_some_and(|r| r.name == segment))?;
        }
        Some(current)
    }
}

impl Default for InMemoryNodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore for InMemoryNodeStore {
    fn exists(&self, node: &NodeId) -> StoreResult<bool> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.nodes.contains_key(node))
    }

    fn kind_of(&self, node: &NodeId) -> StoreResult<NodeKind> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.node(node)?.kind)
    }

    fn children_of(&self, folder: &NodeId) -> StoreResult<Vec<Association>> {
        let mut inner = self.inner.write().expect("lock poisoned");
        if inner.broken_listings.contains(folder) {
            return Err(StoreError::Backend(format!("listing of {folder} failed")));
        }
        let listing: Vec<Association> = inner
            .folder(folder)?
            .children
            .iter()
            .map(|child| Association::new(*folder, *child))
            .collect();

        let (fired, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.vanish_triggers)
            .into_iter()
            .partition(|(f, _)| f == folder);
        inner.vanish_triggers = pending;
        for (_, victim) in fired {
            debug!(victim = %victim.short_id(), "removing node after listing");
            inner.remove_subtree(&victim);
        }
        Ok(listing)
    }

    fn primary_parent_of(&self, node: &NodeId) -> StoreResult<Option<Association>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner
            .node(node)?
            .primary
            .map(|parent| Association::new(parent, *node)))
    }

    fn version_label_of(&self, node: &NodeId) -> StoreResult<Option<VersionLabel>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.node(node)?.versions.last().cloned())
    }

    fn delete(&self, node: &NodeId) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.check_permitted(node, "delete")?;
        let record = inner.node(node)?.clone();
        if !record.children.is_empty() {
            return Err(StoreError::NotEmpty(*node));
        }
        inner.remove_subtree(node);
        let op = match record.checked_out_from {
            Some(original) => StoreOp::CancelCheckout {
                working_copy: *node,
                original,
            },
            None => StoreOp::Delete(*node),
        };
        debug!(?op, "applied");
        inner.journal.push(op);
        Ok(())
    }

    fn detach(&self, node: &NodeId, parent: &NodeId) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.check_permitted(node, "unfile")?;
        let record = inner.node(node)?;
        if !record.parents.contains(parent) {
            return Err(StoreError::NotFound(*node));
        }
        if record.primary == Some(*parent) {
            return Err(StoreError::InvalidAssociation {
                parent: *parent,
                child: *node,
                reason: "primary association cannot be unfiled".into(),
            });
        }
        inner.unlink_edge(node, parent);
        inner.journal.push(StoreOp::Detach {
            node: *node,
            parent: *parent,
        });
        Ok(())
    }

    fn is_locked_against(&self, node: &NodeId, principal: &Principal) -> StoreResult<bool> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner
            .node(node)?
            .lock_owner
            .as_ref()
            .is_some_and(|owner| owner != principal))
    }

    fn identity_has_override(&self, principal: &Principal) -> StoreResult<bool> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.administrators.contains(principal))
    }

    fn is_checked_out_working_copy(&self, node: &NodeId) -> StoreResult<bool> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.node(node)?.checked_out_from.is_some())
    }

    fn find_checked_out_copy(&self, node: &NodeId) -> StoreResult<Option<NodeId>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.node(node)?.working_copy)
    }

    fn purge_version_history(&self, node: &NodeId) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.check_permitted(node, "version purge")?;
        let record = inner.node_mut(node)?;
        let purged = record.versions.len();
        record.versions.clear();
        if purged > 0 {
            inner.journal.push(StoreOp::PurgeVersions {
                node: *node,
                purged,
            });
        }
        Ok(())
    }

    fn repository_root(&self) -> StoreResult<Option<NodeId>> {
        Ok(Some(self.root()))
    }
}

impl std::fmt::Debug for InMemoryNodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryNodeStore")
            .field("node_count", &self.len())
            .finish()
    }
}

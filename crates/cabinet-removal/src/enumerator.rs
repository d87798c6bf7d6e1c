//! Pull-model removal: a post-order cursor over a folder tree.
//!
//! [`HierarchyEnumerator`] lazily expands one or more traversal roots into a
//! depth-first sequence in which a folder is only offered once the store
//! reports it has no children left. The caller drives it like an iterator
//! and calls [`HierarchyEnumerator::remove`] after each node it wants gone.
//!
//! `remove()` is a repository mutation, not a collection edit: it unfiles or
//! deletes the node in the store. Skipping `remove()` for a node leaves it in
//! place, and its folder can then never become eligible.
//!
//! # Frontier states
//!
//! ```text
//! Undiscovered -> Expanded -> Eligible -> Offered -> Removed
//!                                                 \-> Failed
//! ```
//!
//! A folder moves from `Expanded` to `Eligible` only once every child
//! discovered under it has been removed.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, info, warn};

use cabinet_store::{NodeStore, StoreError};
use cabinet_types::{Association, NodeId, NodeKind};

use crate::arena::{Arena, SlotId};
use crate::config::RemovalConfig;
use crate::error::{RemovalError, RemovalResult};
use crate::ledger::{identify, FailureLedger};
use crate::operation::{self, Applied};
use crate::policy::RemovalPolicy;

/// Where a node is in the traversal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrontierState {
    Undiscovered,
    Expanded,
    Eligible,
    Offered,
    Removed,
    Failed,
}

/// A node together with the exact association it was reached through in
/// this traversal.
///
/// The exact parent is the edge walked to get here, which need not be the
/// node's primary association.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentedNode {
    node: NodeId,
    kind: NodeKind,
    exact_parent: Option<Association>,
    depth: usize,
}

impl ParentedNode {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// The association walked to reach this node; `None` for a traversal root.
    pub fn exact_parent(&self) -> Option<&Association> {
        self.exact_parent.as_ref()
    }

    /// Distance from the traversal root (0 for the root itself).
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_root(&self) -> bool {
        self.exact_parent.is_none()
    }
}

#[derive(Debug)]
struct FrontierEntry {
    node: NodeId,
    exact_parent: Option<Association>,
    kind: Option<NodeKind>,
    state: FrontierState,
}

/// Depth-first, children-before-parent removal cursor.
pub struct HierarchyEnumerator<'s, S: NodeStore + ?Sized> {
    store: &'s S,
    policy: RemovalPolicy,
    config: RemovalConfig,
    arena: Arena<FrontierEntry>,
    worklist: VecDeque<SlotId>,
    expanded: HashSet<NodeId>,
    found: Option<SlotId>,
    current: Option<SlotId>,
    last_removed: bool,
    ledger: FailureLedger,
}

impl<'s, S: NodeStore + ?Sized> HierarchyEnumerator<'s, S> {
    /// Enumerate the tree under `root`, the root itself last.
    pub fn new(store: &'s S, root: NodeId, config: RemovalConfig) -> Self {
        Self::with_roots(store, [root], config)
    }

    /// Enumerate several traversal roots in order.
    pub fn with_roots(
        store: &'s S,
        roots: impl IntoIterator<Item = NodeId>,
        config: RemovalConfig,
    ) -> Self {
        let mut arena = Arena::new();
        let worklist = roots
            .into_iter()
            .map(|node| {
                arena.insert(
                    FrontierEntry {
                        node,
                        exact_parent: None,
                        kind: None,
                        state: FrontierState::Undiscovered,
                    },
                    None,
                )
            })
            .collect();
        info!(
            mode = %config.unfile_mode,
            continue_on_failure = config.continue_on_failure,
            "starting hierarchy enumeration"
        );
        Self {
            store,
            policy: RemovalPolicy::new(config.unfile_mode),
            config,
            arena,
            worklist,
            expanded: HashSet::new(),
            found: None,
            current: None,
            last_removed: false,
            ledger: FailureLedger::new(),
        }
    }

    /// Find the next eligible node, expanding folders as needed.
    ///
    /// Returns `false` once the frontier is exhausted, or as soon as a
    /// failure has been recorded when continuation is disabled. Calling it
    /// repeatedly without `next()` does not advance.
    pub fn has_next(&mut self) -> bool {
        if self.found.is_some() {
            return true;
        }
        loop {
            if !self.config.continue_on_failure && !self.ledger.is_empty() {
                return false;
            }
            let Some(slot) = self.worklist.pop_front() else {
                return false;
            };
            if !self.arena.is_live(slot) {
                continue;
            }
            if self.scan(slot) {
                self.arena.get_mut(slot).state = FrontierState::Offered;
                self.found = Some(slot);
                return true;
            }
        }
    }

    /// Remove the node most recently returned by `next()`, unfiling or
    /// deleting it according to the policy.
    ///
    /// Returns whether the removal succeeded. Failures are recorded in the
    /// ledger (and propagated to traversal ancestors when continuation is
    /// enabled); they are not errors. Calling `remove()` twice for the same
    /// node, or before any `next()`, is [`RemovalError::NoCurrentNode`].
    pub fn remove(&mut self) -> RemovalResult<bool> {
        let slot = self.current.take().ok_or(RemovalError::NoCurrentNode)?;
        let item = self.parented(slot);

        let outcome = self
            .policy
            .decide(self.store, item.kind, item.exact_parent())
            .and_then(|removal| {
                debug!(
                    node = %item.node.short_id(),
                    kind = %item.kind,
                    ?removal,
                    "removing"
                );
                operation::apply(
                    self.store,
                    &self.config,
                    &item.node,
                    item.exact_parent(),
                    removal,
                )
            });

        match outcome {
            Ok(applied) => {
                debug!(node = %item.node.short_id(), ?applied, "removed");
                self.settle(slot);
                self.last_removed = true;
            }
            Err(e) if e.is_not_found() => {
                debug!(node = %item.node.short_id(), applied = ?Applied::Vanished, "removed");
                self.settle(slot);
                self.last_removed = true;
            }
            Err(e) => {
                self.fail(slot, &e);
                self.last_removed = false;
            }
        }
        Ok(self.last_removed)
    }

    /// Whether the last `remove()` succeeded.
    pub fn was_last_removed(&self) -> bool {
        self.last_removed
    }

    /// Objects that could not be removed so far, in the order they failed.
    ///
    /// With continuation disabled this holds only the first failed node;
    /// its traversal ancestors, the root included, are never recorded even
    /// though they remain. Only an empty ledger means everything is gone.
    pub fn failures(&self) -> &FailureLedger {
        &self.ledger
    }

    pub fn into_failures(self) -> FailureLedger {
        self.ledger
    }

    /// Drive the traversal to the end, removing every offered node.
    pub fn remove_all(mut self) -> FailureLedger {
        while self.next().is_some() {
            // Only fails when there is no current node, which next() just set.
            let _ = self.remove();
        }
        info!(failed = self.ledger.len(), "hierarchy enumeration finished");
        self.ledger
    }

    /// State of the most recent frontier entry for `node`, if it was ever
    /// discovered.
    pub fn state_of(&self, node: &NodeId) -> Option<FrontierState> {
        self.arena
            .iter()
            .rev()
            .find(|(_, e)| e.node == *node)
            .map(|(_, e)| e.state)
    }

    // -----------------------------------------------------------------------
    // Frontier internals
    // -----------------------------------------------------------------------

    /// Examine a popped entry. Returns `true` when it is eligible to offer.
    fn scan(&mut self, slot: SlotId) -> bool {
        let node = self.arena.get(slot).node;
        match self.store.exists(&node) {
            Ok(true) => {}
            Ok(false) => {
                debug!(node = %node.short_id(), "skipping vanished node");
                self.settle(slot);
                return false;
            }
            Err(e) => {
                self.fail(slot, &e);
                return false;
            }
        }

        let kind = match self.arena.get(slot).kind {
            Some(kind) => kind,
            None => match self.store.kind_of(&node) {
                Ok(kind) => {
                    self.arena.get_mut(slot).kind = Some(kind);
                    kind
                }
                Err(e) if e.is_not_found() => {
                    self.settle(slot);
                    return false;
                }
                Err(e) => {
                    self.fail(slot, &e);
                    return false;
                }
            },
        };
        if !kind.is_folder() {
            self.arena.get_mut(slot).state = FrontierState::Eligible;
            return true;
        }

        let children = match self.store.children_of(&node) {
            Ok(children) => children,
            Err(e) if e.is_not_found() => {
                self.settle(slot);
                return false;
            }
            Err(e) => {
                self.fail(slot, &e);
                return false;
            }
        };
        if children.is_empty() {
            self.arena.get_mut(slot).state = FrontierState::Eligible;
            return true;
        }

        // Children remain. Expand the ones this traversal has not seen under
        // this folder yet, skipping folders already expanded elsewhere in the
        // run. If there are none, the folder can never empty.
        let seen: HashSet<NodeId> = self
            .arena
            .children(slot)
            .iter()
            .map(|c| self.arena.get(*c).node)
            .collect();
        let fresh: Vec<Association> = children
            .into_iter()
            .filter(|edge| !seen.contains(&edge.child) && !self.expanded.contains(&edge.child))
            .collect();
        if fresh.is_empty() {
            self.fail(slot, &StoreError::NotEmpty(node));
            return false;
        }

        debug!(node = %node.short_id(), children = fresh.len(), "expanding folder");
        self.expanded.insert(node);
        self.arena.get_mut(slot).state = FrontierState::Expanded;
        self.worklist.push_front(slot);
        for edge in fresh.into_iter().rev() {
            let child = self.arena.insert(
                FrontierEntry {
                    node: edge.child,
                    exact_parent: Some(edge),
                    kind: None,
                    state: FrontierState::Undiscovered,
                },
                Some(slot),
            );
            self.worklist.push_front(child);
        }
        false
    }

    fn parented(&self, slot: SlotId) -> ParentedNode {
        let entry = self.arena.get(slot);
        ParentedNode {
            node: entry.node,
            // Only scanned entries are offered, and scanning resolves the kind.
            kind: entry.kind.unwrap_or(NodeKind::Document),
            exact_parent: entry.exact_parent,
            depth: self.arena.depth(slot),
        }
    }

    fn settle(&mut self, slot: SlotId) {
        self.arena.get_mut(slot).state = FrontierState::Removed;
        self.arena.retire(slot);
    }

    fn mark_failed(&mut self, slot: SlotId) -> bool {
        let node = self.arena.get(slot).node;
        self.arena.get_mut(slot).state = FrontierState::Failed;
        self.ledger.record(identify(self.store, &node))
    }

    fn fail(&mut self, slot: SlotId, error: &StoreError) {
        let entry = self.arena.get(slot);
        let node = entry.node;
        let is_root_folder = entry.exact_parent.is_none() && entry.kind == Some(NodeKind::Folder);
        warn!(node = %node.short_id(), %error, "could not remove node");
        self.mark_failed(slot);

        if is_root_folder {
            let purged = self.arena.retire_subtree(slot);
            debug!(node = %node.short_id(), purged = purged.len(), "dropping failed root subtree");
        } else {
            self.arena.retire(slot);
        }

        if !self.config.continue_on_failure {
            return;
        }
        let ancestors: Vec<SlotId> = self.arena.ancestors(slot).collect();
        for ancestor in ancestors {
            if self.mark_failed(ancestor) {
                warn!(
                    node = %self.arena.get(ancestor).node.short_id(),
                    because = %node.short_id(),
                    "poisoning traversal ancestor"
                );
            }
            self.arena.retire(ancestor);
        }
    }
}

impl<S: NodeStore + ?Sized> Iterator for HierarchyEnumerator<'_, S> {
    type Item = ParentedNode;

    /// Take the node found by `has_next()`. Does not scan past it: the next
    /// call resumes from the frontier.
    fn next(&mut self) -> Option<ParentedNode> {
        if !self.has_next() {
            return None;
        }
        let slot = self.found.take()?;
        self.current = Some(slot);
        self.last_removed = false;
        Some(self.parented(slot))
    }
}

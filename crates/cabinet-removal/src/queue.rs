//! Push-model removal: breadth-first bulk deletion of a folder subtree.
//!
//! [`QueueRemover`] seeds a FIFO queue with the traversal root and works
//! through it. A non-empty folder enqueues its children and is parked; once
//! every child in that batch has resolved (removed, unfiled or vanished) the
//! folder goes back on the end of the queue for its single retry. A folder
//! that is still not empty on retry has failed.
//!
//! Failures are recorded in a [`FailureLedger`]. With continuation enabled
//! every traversal ancestor of a failed element is recorded too and dropped
//! from the queue, since its subtree can no longer be emptied.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, info, warn};

use cabinet_store::{NodeStore, StoreError, StoreResult};
use cabinet_types::{Association, NodeId};

use crate::arena::{Arena, SlotId};
use crate::config::RemovalConfig;
use crate::ledger::{identify, FailureLedger};
use crate::operation::{self, Applied};
use crate::policy::{RemovalPolicy, UnfileMode};

/// One node reached through one association in a queue run.
#[derive(Debug)]
struct QueueElement {
    node: NodeId,
    association: Option<Association>,
    children_enqueued: bool,
    outstanding: usize,
}

/// Outcome of a queue run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QueueReport {
    pub deleted: usize,
    pub unfiled: usize,
    pub vanished: usize,
    pub failures: FailureLedger,
}

impl QueueReport {
    /// `true` when nothing failed, so everything under the root is gone.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn count(&mut self, applied: Applied) {
        match applied {
            Applied::Deleted => self.deleted += 1,
            Applied::Unfiled => self.unfiled += 1,
            Applied::Vanished => self.vanished += 1,
        }
    }
}

/// Breadth-first, self-requeuing subtree remover.
///
/// Holds no state between runs; each call to [`QueueRemover::delete_subtree`]
/// builds and discards its own queue and ancestry.
pub struct QueueRemover<'s, S: NodeStore + ?Sized> {
    store: &'s S,
    config: RemovalConfig,
}

impl<'s, S: NodeStore + ?Sized> QueueRemover<'s, S> {
    pub fn new(store: &'s S, config: RemovalConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    /// Remove everything under `root`, then `root` itself.
    ///
    /// With `total_deletion` every document is deleted; otherwise documents
    /// reached through a secondary filing are only unfiled. Returns the
    /// identifiers that could not be removed, in failure order.
    ///
    /// Without `continue_on_failure` the run stops at the first failure and
    /// only that node is recorded: its ancestors, `root` included, are left
    /// in place but absent from the ledger. Only an empty ledger means the
    /// subtree is gone.
    pub fn delete_subtree(
        &self,
        root: &NodeId,
        total_deletion: bool,
        continue_on_failure: bool,
    ) -> FailureLedger {
        self.run(
            root,
            UnfileMode::from_total_deletion(total_deletion),
            continue_on_failure,
        )
        .failures
    }

    /// [`delete_subtree`](Self::delete_subtree) with an explicit unfile mode
    /// and a full report.
    pub fn run(&self, root: &NodeId, mode: UnfileMode, continue_on_failure: bool) -> QueueReport {
        info!(
            root = %root.short_id(),
            %mode,
            continue_on_failure,
            "starting subtree removal"
        );
        let mut run = Run {
            store: self.store,
            config: &self.config,
            policy: RemovalPolicy::new(mode),
            continue_on_failure,
            arena: Arena::new(),
            queue: VecDeque::new(),
            expanded: HashSet::new(),
            report: QueueReport::default(),
        };
        let seed = run.arena.insert(QueueElement::new(*root, None), None);
        run.queue.push_back(seed);
        run.drive();

        let report = run.report;
        info!(
            deleted = report.deleted,
            unfiled = report.unfiled,
            vanished = report.vanished,
            failed = report.failures.len(),
            "subtree removal finished"
        );
        report
    }
}

impl QueueElement {
    fn new(node: NodeId, association: Option<Association>) -> Self {
        Self {
            node,
            association,
            children_enqueued: false,
            outstanding: 0,
        }
    }
}

/// What a dequeued element turned into.
enum Step {
    Resolved(Applied),
    Parked,
    Failed(StoreError),
}

struct Run<'r, S: NodeStore + ?Sized> {
    store: &'r S,
    config: &'r RemovalConfig,
    policy: RemovalPolicy,
    continue_on_failure: bool,
    arena: Arena<QueueElement>,
    queue: VecDeque<SlotId>,
    expanded: HashSet<NodeId>,
    report: QueueReport,
}

impl<S: NodeStore + ?Sized> Run<'_, S> {
    fn drive(&mut self) {
        while let Some(slot) = self.queue.pop_front() {
            if !self.continue_on_failure && !self.report.failures.is_empty() {
                break;
            }
            if !self.arena.is_live(slot) {
                continue;
            }
            match self.step(slot) {
                Ok(Step::Resolved(applied)) => self.resolve(slot, applied),
                Ok(Step::Parked) => {}
                Ok(Step::Failed(e)) => self.fail(slot, &e),
                Err(e) if e.is_not_found() => self.resolve(slot, Applied::Vanished),
                Err(e) => self.fail(slot, &e),
            }
        }
    }

    fn step(&mut self, slot: SlotId) -> StoreResult<Step> {
        let element = self.arena.get(slot);
        let node = element.node;
        let exact = element.association;

        if !self.store.exists(&node)? {
            debug!(node = %node.short_id(), "skipping vanished node");
            return Ok(Step::Resolved(Applied::Vanished));
        }

        let kind = self.store.kind_of(&node)?;
        if kind.is_folder() {
            let children = self.store.children_of(&node)?;
            if !children.is_empty() {
                if self.arena.get(slot).children_enqueued {
                    return Ok(Step::Failed(StoreError::NotEmpty(node)));
                }
                // A folder expanded elsewhere in this run is still being
                // emptied there; it cannot resolve from under this one.
                let fresh: Vec<Association> = children
                    .into_iter()
                    .filter(|edge| !self.expanded.contains(&edge.child))
                    .collect();
                if fresh.is_empty() {
                    return Ok(Step::Failed(StoreError::NotEmpty(node)));
                }
                self.expanded.insert(node);
                self.park(slot, fresh);
                return Ok(Step::Parked);
            }
        }

        let removal = self.policy.decide(self.store, kind, exact.as_ref())?;
        debug!(node = %node.short_id(), %kind, ?removal, "removing");
        match operation::apply(self.store, self.config, &node, exact.as_ref(), removal) {
            Ok(applied) => Ok(Step::Resolved(applied)),
            Err(e) => Ok(Step::Failed(e)),
        }
    }

    fn park(&mut self, slot: SlotId, children: Vec<Association>) {
        let element = self.arena.get_mut(slot);
        element.children_enqueued = true;
        element.outstanding = children.len();
        debug!(
            node = %element.node.short_id(),
            children = children.len(),
            "deferring folder until its children resolve"
        );
        for edge in children {
            let child = self
                .arena
                .insert(QueueElement::new(edge.child, Some(edge)), Some(slot));
            self.queue.push_back(child);
        }
    }

    fn resolve(&mut self, slot: SlotId, applied: Applied) {
        debug!(node = %self.arena.get(slot).node.short_id(), ?applied, "resolved");
        self.report.count(applied);
        self.arena.retire(slot);

        let Some(parent) = self.arena.parent(slot) else {
            return;
        };
        let element = self.arena.get_mut(parent);
        element.outstanding = element.outstanding.saturating_sub(1);
        if element.outstanding == 0 && self.arena.is_live(parent) {
            self.queue.push_back(parent);
        }
    }

    fn fail(&mut self, slot: SlotId, error: &StoreError) {
        let node = self.arena.get(slot).node;
        warn!(node = %node.short_id(), %error, "could not remove node");
        self.report.failures.record(identify(self.store, &node));
        self.arena.retire(slot);

        if !self.continue_on_failure {
            return;
        }
        let ancestors: Vec<SlotId> = self.arena.ancestors(slot).collect();
        for ancestor in ancestors {
            let ancestor_node = self.arena.get(ancestor).node;
            if self.report.failures.record(identify(self.store, &ancestor_node)) {
                warn!(
                    node = %ancestor_node.short_id(),
                    because = %node.short_id(),
                    "poisoning traversal ancestor"
                );
            }
            self.arena.retire(ancestor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cabinet_store::{InMemoryNodeStore, StoreOp};
    use cabinet_types::{NodeKind, ObjectIdentifier, Principal, VersionLabel};
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn remover(store: &InMemoryNodeStore) -> QueueRemover<'_, InMemoryNodeStore> {
        QueueRemover::new(store, RemovalConfig::default())
    }

    fn ids(nodes: &[NodeId]) -> Vec<ObjectIdentifier> {
        nodes.iter().copied().map(ObjectIdentifier::unversioned).collect()
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    #[test]
    fn secondary_filing_is_unfiled_and_root_deleted_last() {
        let store = InMemoryNodeStore::new();
        let root = store.root();
        let s = store.create_folder(&root, "S").unwrap();
        let r = store.create_folder(&root, "R").unwrap();
        let a = store.create_folder(&r, "A").unwrap();
        let doc = store.create_document(&s, "doc").unwrap();
        store.file(&doc, &r).unwrap();

        let report = remover(&store).run(&r, UnfileMode::DeleteSingleFiled, true);
        assert!(report.is_complete());
        assert_eq!((report.deleted, report.unfiled, report.vanished), (2, 1, 0));
        assert_eq!(
            store.journal(),
            vec![
                StoreOp::Delete(a),
                StoreOp::Detach { node: doc, parent: r },
                StoreOp::Delete(r)
            ]
        );
        assert_eq!(store.children_of(&s).unwrap(), vec![Association::new(s, doc)]);
    }

    #[test]
    fn folders_are_retried_after_their_children() {
        let store = InMemoryNodeStore::new();
        let r = store.create_folder(&store.root(), "R").unwrap();
        let a = store.create_folder(&r, "A").unwrap();
        let b = store.create_folder(&r, "B").unwrap();
        let a1 = store.create_document(&a, "a1").unwrap();
        let b1 = store.create_document(&b, "b1").unwrap();

        assert!(remover(&store).delete_subtree(&r, false, true).is_empty());
        let deleted: Vec<_> = store
            .journal()
            .into_iter()
            .map(|op| match op {
                StoreOp::Delete(n) => n,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(deleted, vec![a1, b1, a, b, r]);
        assert!(store.is_empty());
    }

    #[test]
    fn document_root_is_deleted() {
        let store = InMemoryNodeStore::new();
        let doc = store.create_document(&store.root(), "doc").unwrap();
        assert!(remover(&store).delete_subtree(&doc, false, true).is_empty());
        assert!(!store.exists(&doc).unwrap());
    }

    // -----------------------------------------------------------------------
    // Filing policy
    // -----------------------------------------------------------------------

    /// `doc` primary under `/B`, also filed under `/A`.
    fn filed_twice(store: &InMemoryNodeStore) -> (NodeId, NodeId, NodeId) {
        let a = store.create_folder(&store.root(), "A").unwrap();
        let b = store.create_folder(&store.root(), "B").unwrap();
        let doc = store.create_document(&b, "doc").unwrap();
        store.file(&doc, &a).unwrap();
        (a, b, doc)
    }

    #[test]
    fn multi_filed_document_survives_under_other_parent() {
        let store = InMemoryNodeStore::new();
        let (a, b, doc) = filed_twice(&store);

        assert!(remover(&store).delete_subtree(&a, false, true).is_empty());
        assert!(store.exists(&doc).unwrap());
        assert_eq!(store.parents_of(&doc), vec![b]);
        assert_eq!(store.resolve("/B/doc"), Some(doc));
    }

    #[test]
    fn total_deletion_removes_document_everywhere() {
        let store = InMemoryNodeStore::new();
        let (a, b, doc) = filed_twice(&store);

        assert!(remover(&store).delete_subtree(&a, true, true).is_empty());
        assert!(!store.exists(&doc).unwrap());
        assert!(store.children_of(&b).unwrap().is_empty());
    }

    #[test]
    fn primary_only_document_is_deleted_not_unfiled() {
        let store = InMemoryNodeStore::new();
        let r = store.create_folder(&store.root(), "R").unwrap();
        let doc = store.create_document(&r, "doc").unwrap();

        assert!(remover(&store).delete_subtree(&r, false, true).is_empty());
        assert_eq!(store.journal(), vec![StoreOp::Delete(doc), StoreOp::Delete(r)]);
    }

    // -----------------------------------------------------------------------
    // Versions and working copies
    // -----------------------------------------------------------------------

    #[test]
    fn versions_are_purged_before_delete() {
        let store = InMemoryNodeStore::new();
        let r = store.create_folder(&store.root(), "R").unwrap();
        let doc = store.create_document(&r, "doc").unwrap();
        for v in ["1.0", "1.1", "2.0"] {
            store.add_version(&doc, VersionLabel::new(v).unwrap()).unwrap();
        }

        remover(&store).delete_subtree(&r, false, true);
        assert_eq!(
            store.journal(),
            vec![
                StoreOp::PurgeVersions { node: doc, purged: 3 },
                StoreOp::Delete(doc),
                StoreOp::Delete(r)
            ]
        );
    }

    #[test]
    fn working_copy_is_cancelled_without_purge() {
        let store = InMemoryNodeStore::new();
        let s = store.create_folder(&store.root(), "S").unwrap();
        let r = store.create_folder(&store.root(), "R").unwrap();
        let doc = store.create_document(&s, "doc").unwrap();
        for v in ["1.0", "1.1", "2.0"] {
            store.add_version(&doc, VersionLabel::new(v).unwrap()).unwrap();
        }
        let wc = store.check_out(&doc).unwrap();
        store.file(&wc, &r).unwrap();

        remover(&store).delete_subtree(&r, true, true);
        assert_eq!(
            store.journal(),
            vec![
                StoreOp::CancelCheckout {
                    working_copy: wc,
                    original: doc
                },
                StoreOp::Delete(r)
            ]
        );
        assert_eq!(store.version_count(&doc), 3);
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[test]
    fn failure_poisons_ancestors_but_not_siblings() {
        let store = InMemoryNodeStore::new();
        let r = store.create_folder(&store.root(), "R").unwrap();
        let a = store.create_folder(&r, "A").unwrap();
        let b = store.create_folder(&a, "B").unwrap();
        let bad = store.create_document(&b, "bad").unwrap();
        let c = store.create_folder(&r, "C").unwrap();
        let d = store.create_document(&c, "d").unwrap();
        store.deny(&bad).unwrap();

        let failures = remover(&store).delete_subtree(&r, false, true);
        assert_eq!(failures.into_vec(), ids(&[bad, b, a, r]));
        assert!(!store.exists(&c).unwrap());
        assert!(!store.exists(&d).unwrap());
        assert!(store.exists(&bad).unwrap());
    }

    #[test]
    fn first_failure_stops_without_continuation() {
        let store = InMemoryNodeStore::new();
        let r = store.create_folder(&store.root(), "R").unwrap();
        let bad = store.create_document(&r, "bad").unwrap();
        let ok = store.create_document(&r, "ok").unwrap();
        store.lock(&bad, Principal::new("alice")).unwrap();

        let failures = remover(&store).delete_subtree(&r, false, false);
        assert_eq!(failures.into_vec(), ids(&[bad]));
        assert!(store.exists(&ok).unwrap());
        assert!(store.exists(&r).unwrap());
    }

    #[test]
    fn broken_listing_fails_folder_and_ancestors() {
        let store = InMemoryNodeStore::new();
        let r = store.create_folder(&store.root(), "R").unwrap();
        let a = store.create_folder(&r, "A").unwrap();
        let d = store.create_document(&r, "d").unwrap();
        store.break_listing(&a);

        let failures = remover(&store).delete_subtree(&r, false, true);
        assert_eq!(failures.into_vec(), ids(&[a, r]));
        assert!(!store.exists(&d).unwrap());
    }

    #[test]
    fn vanished_node_is_not_a_failure() {
        let store = InMemoryNodeStore::new();
        let r = store.create_folder(&store.root(), "R").unwrap();
        let a = store.create_folder(&r, "A").unwrap();
        let d = store.create_document(&r, "d").unwrap();
        store.vanish_after_listing(&r, &d);

        let report = remover(&store).run(&r, UnfileMode::DeleteSingleFiled, true);
        assert!(report.is_complete());
        assert_eq!(report.vanished, 1);
        assert_eq!(store.journal(), vec![StoreOp::Delete(a), StoreOp::Delete(r)]);
    }

    #[test]
    fn folder_cycle_fails_instead_of_requeuing() {
        let store = InMemoryNodeStore::new();
        let r = store.create_folder(&store.root(), "R").unwrap();
        let a = store.create_folder(&r, "A").unwrap();
        let d = store.create_document(&r, "d").unwrap();
        store.link_folder(&r, &a).unwrap();

        let report = remover(&store).run(&r, UnfileMode::DeleteSingleFiled, true);
        assert_eq!(report.failures.into_vec(), ids(&[a, r]));
        assert_eq!(report.deleted, 1);
        assert!(!store.exists(&d).unwrap());
        assert!(store.exists(&a).unwrap());
    }

    #[test]
    fn folder_cycle_stops_at_first_failure_without_continuation() {
        let store = InMemoryNodeStore::new();
        let r = store.create_folder(&store.root(), "R").unwrap();
        let a = store.create_folder(&r, "A").unwrap();
        let d = store.create_document(&r, "d").unwrap();
        store.link_folder(&r, &a).unwrap();

        let failures = remover(&store).delete_subtree(&r, false, false);
        assert_eq!(failures.into_vec(), ids(&[a]));
        assert!(store.exists(&r).unwrap());
        assert!(store.exists(&d).unwrap());
    }

    /// A store whose `detach` claims success without unfiling anything.
    struct StickyFilings(InMemoryNodeStore);

    impl NodeStore for StickyFilings {
        fn exists(&self, node: &NodeId) -> StoreResult<bool> {
            self.0.exists(node)
        }
        fn kind_of(&self, node: &NodeId) -> StoreResult<NodeKind> {
            self.0.kind_of(node)
        }
        fn children_of(&self, folder: &NodeId) -> StoreResult<Vec<Association>> {
            self.0.children_of(folder)
        }
        fn primary_parent_of(&self, node: &NodeId) -> StoreResult<Option<Association>> {
            self.0.primary_parent_of(node)
        }
        fn version_label_of(&self, node: &NodeId) -> StoreResult<Option<VersionLabel>> {
            self.0.version_label_of(node)
        }
        fn delete(&self, node: &NodeId) -> StoreResult<()> {
            self.0.delete(node)
        }
        fn detach(&self, _node: &NodeId, _parent: &NodeId) -> StoreResult<()> {
            Ok(())
        }
        fn is_locked_against(&self, node: &NodeId, principal: &Principal) -> StoreResult<bool> {
            self.0.is_locked_against(node, principal)
        }
        fn identity_has_override(&self, principal: &Principal) -> StoreResult<bool> {
            self.0.identity_has_override(principal)
        }
        fn is_checked_out_working_copy(&self, node: &NodeId) -> StoreResult<bool> {
            self.0.is_checked_out_working_copy(node)
        }
        fn find_checked_out_copy(&self, node: &NodeId) -> StoreResult<Option<NodeId>> {
            self.0.find_checked_out_copy(node)
        }
        fn purge_version_history(&self, node: &NodeId) -> StoreResult<()> {
            self.0.purge_version_history(node)
        }
    }

    #[test]
    fn folder_that_stays_full_is_retried_once() {
        let inner = InMemoryNodeStore::new();
        let (a, _, doc) = filed_twice(&inner);
        let store = StickyFilings(inner);

        let remover = QueueRemover::new(&store, RemovalConfig::default());
        let report = remover.run(&a, UnfileMode::DeleteSingleFiled, true);
        assert_eq!(report.unfiled, 1);
        assert_eq!(report.failures.into_vec(), ids(&[a]));
        assert_eq!(store.0.parents_of(&doc).len(), 2);
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn unlisted_nodes_are_gone_and_failures_reach_the_root(
            shape in prop::collection::vec(
                (any::<prop::sample::Index>(), 0u8..3, prop::bool::weighted(0.15)),
                0..40,
            )
        ) {
            let store = InMemoryNodeStore::new();
            let r = store.create_folder(&store.root(), "R").unwrap();
            let mut folders = vec![r];
            let mut parent_of = HashMap::new();
            let mut denied = Vec::new();
            for (i, (pick, kind, deny)) in shape.iter().enumerate() {
                let parent = folders[pick.index(folders.len())];
                let name = format!("n{i}");
                let node = if *kind == 0 {
                    let f = store.create_folder(&parent, &name).unwrap();
                    folders.push(f);
                    f
                } else {
                    store.create_document(&parent, &name).unwrap()
                };
                if *deny && *kind != 0 {
                    store.deny(&node).unwrap();
                    denied.push(node);
                }
                parent_of.insert(node, parent);
            }

            let failures = remover(&store).delete_subtree(&r, false, true);

            for node in parent_of.keys().chain([&r]) {
                if !failures.contains_node(node) {
                    prop_assert!(!store.exists(node).unwrap());
                }
            }
            for bad in &denied {
                prop_assert!(failures.contains_node(bad));
                let mut up = parent_of.get(bad);
                while let Some(p) = up {
                    prop_assert!(failures.contains_node(p));
                    up = parent_of.get(p);
                }
            }
            prop_assert_eq!(failures.is_empty(), denied.is_empty());
        }
    }
}

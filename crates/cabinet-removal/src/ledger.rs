//! The failure ledger shared by both removal engines.

use std::collections::HashSet;

use serde::{Serialize, Serializer};

use cabinet_store::NodeStore;
use cabinet_types::{NodeId, ObjectIdentifier};

/// Append-only, insertion-ordered set of objects that could not be removed.
///
/// Once an identifier is recorded it is never retried or recorded again in
/// the same run. Nothing is ever taken out of a ledger.
#[derive(Clone, Debug, Default)]
pub struct FailureLedger {
    order: Vec<ObjectIdentifier>,
    seen: HashSet<ObjectIdentifier>,
}

impl FailureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. Returns `false` if it was already recorded.
    pub fn record(&mut self, id: ObjectIdentifier) -> bool {
        if !self.seen.insert(id.clone()) {
            return false;
        }
        self.order.push(id);
        true
    }

    pub fn contains(&self, id: &ObjectIdentifier) -> bool {
        self.seen.contains(id)
    }

    /// `true` if any identifier for `node` was recorded, whatever its
    /// version label.
    pub fn contains_node(&self, node: &NodeId) -> bool {
        self.order.iter().any(|id| id.node() == *node)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Identifiers in the order they were recorded.
    pub fn iter(&self) -> std::slice::Iter<'_, ObjectIdentifier> {
        self.order.iter()
    }

    pub fn as_slice(&self) -> &[ObjectIdentifier] {
        &self.order
    }

    pub fn into_vec(self) -> Vec<ObjectIdentifier> {
        self.order
    }
}

impl PartialEq for FailureLedger {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
    }
}

impl Eq for FailureLedger {}

impl<'a> IntoIterator for &'a FailureLedger {
    type Item = &'a ObjectIdentifier;
    type IntoIter = std::slice::Iter<'a, ObjectIdentifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.iter()
    }
}

impl IntoIterator for FailureLedger {
    type Item = ObjectIdentifier;
    type IntoIter = std::vec::IntoIter<ObjectIdentifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.into_iter()
    }
}

impl Serialize for FailureLedger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.order)
    }
}

/// Identifier for a node at the moment of failure: its id plus the current
/// version label when the store still knows one.
pub fn identify<S: NodeStore + ?Sized>(store: &S, node: &NodeId) -> ObjectIdentifier {
    let version = store.version_label_of(node).ok().flatten();
    ObjectIdentifier::new(*node, version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cabinet_store::InMemoryNodeStore;
    use cabinet_types::VersionLabel;

    #[test]
    fn record_keeps_insertion_order() {
        let mut ledger = FailureLedger::new();
        let ids: Vec<_> = (0..3)
            .map(|_| ObjectIdentifier::unversioned(NodeId::new()))
            .collect();
        for id in ids.iter().rev() {
            assert!(ledger.record(id.clone()));
        }
        let recorded: Vec<_> = ledger.iter().cloned().collect();
        assert_eq!(recorded, ids.into_iter().rev().collect::<Vec<_>>());
    }

    #[test]
    fn duplicates_are_ignored() {
        let mut ledger = FailureLedger::new();
        let id = ObjectIdentifier::unversioned(NodeId::new());
        assert!(ledger.record(id.clone()));
        assert!(!ledger.record(id.clone()));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains(&id));
    }

    #[test]
    fn contains_node_ignores_version() {
        let mut ledger = FailureLedger::new();
        let node = NodeId::new();
        ledger.record(ObjectIdentifier::new(
            node,
            Some(VersionLabel::new("1.2").unwrap()),
        ));
        assert!(ledger.contains_node(&node));
        assert!(!ledger.contains(&ObjectIdentifier::unversioned(node)));
        assert!(!ledger.contains_node(&NodeId::new()));
    }

    #[test]
    fn identify_uses_current_label() {
        let store = InMemoryNodeStore::new();
        let doc = store.create_document(&store.root(), "doc").unwrap();
        assert_eq!(identify(&store, &doc), ObjectIdentifier::unversioned(doc));

        store.add_version(&doc, VersionLabel::new("1.0").unwrap()).unwrap();
        assert_eq!(identify(&store, &doc).to_string(), format!("{doc}/1.0"));
    }

    #[test]
    fn identify_vanished_node_is_unversioned() {
        let store = InMemoryNodeStore::new();
        let ghost = NodeId::new();
        assert_eq!(identify(&store, &ghost), ObjectIdentifier::unversioned(ghost));
    }

    #[test]
    fn serializes_as_list_of_strings() {
        let mut ledger = FailureLedger::new();
        let node = NodeId::new();
        ledger.record(ObjectIdentifier::unversioned(node));
        let json = serde_json::to_string(&ledger).unwrap();
        assert_eq!(json, format!("[\"{node}\"]"));
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// A parent/child filing edge.
///
/// Associations carry no primary flag of their own: whether an edge is the
/// child's primary filing is a property of the child, looked up from the
/// store and compared with [`Association::is_same_edge`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Association {
    pub parent: NodeId,
    pub child: NodeId,
}

impl Association {
    pub fn new(parent: NodeId, child: NodeId) -> Self {
        Self { parent, child }
    }

    /// `true` when `other` names the same parent and child.
    pub fn is_same_edge(&self, other: &Association) -> bool {
        self.parent == other.parent && self.child == other.child
    }

    /// `true` when this edge is the child's primary association.
    pub fn is_primary(&self, primary: Option<&Association>) -> bool {
        primary.is_some_and(|p| self.is_same_edge(p))
    }
}

impl fmt::Display for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.parent.short_id(), self.child.short_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_edge_compares_both_ends() {
        let (p, q, c) = (NodeId::new(), NodeId::new(), NodeId::new());
        let a = Association::new(p, c);
        assert!(a.is_same_edge(&Association::new(p, c)));
        assert!(!a.is_same_edge(&Association::new(q, c)));
    }

    #[test]
    fn primary_requires_matching_edge() {
        let (p, q, c) = (NodeId::new(), NodeId::new(), NodeId::new());
        let primary = Association::new(p, c);
        assert!(Association::new(p, c).is_primary(Some(&primary)));
        assert!(!Association::new(q, c).is_primary(Some(&primary)));
        assert!(!Association::new(p, c).is_primary(None));
    }

    #[test]
    fn display_shows_both_ends() {
        let a = Association::new(NodeId::new(), NodeId::new());
        let s = a.to_string();
        assert!(s.contains(&a.parent.short_id()));
        assert!(s.contains(&a.child.short_id()));
    }
}

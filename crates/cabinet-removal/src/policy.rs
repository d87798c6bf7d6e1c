//! Unfile-or-delete decisions.
//!
//! A node reached through a folder tree is either *unfiled* (only the
//! association it was reached through is removed) or *deleted* (the node and
//! its version history go away everywhere). A node that is still validly
//! filed elsewhere is never deleted unless total deletion was requested.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use cabinet_store::{NodeStore, StoreResult};
use cabinet_types::{Association, NodeKind};

/// How documents filed in a removed tree are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnfileMode {
    /// Unfile every document from the tree; never delete documents.
    Unfile,
    /// Delete documents reached through their primary filing, unfile the
    /// rest so they stay filed elsewhere.
    #[default]
    DeleteSingleFiled,
    /// Delete every document everywhere it is filed.
    Delete,
}

impl UnfileMode {
    /// Map the bulk API's `total_deletion` flag onto a mode.
    pub fn from_total_deletion(total_deletion: bool) -> Self {
        if total_deletion {
            UnfileMode::Delete
        } else {
            UnfileMode::DeleteSingleFiled
        }
    }

    pub fn is_total(&self) -> bool {
        matches!(self, UnfileMode::Delete)
    }
}

impl fmt::Display for UnfileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnfileMode::Unfile => write!(f, "unfile"),
            UnfileMode::DeleteSingleFiled => write!(f, "delete-single-filed"),
            UnfileMode::Delete => write!(f, "delete"),
        }
    }
}

impl FromStr for UnfileMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unfile" => Ok(UnfileMode::Unfile),
            "delete-single-filed" | "delete_single_filed" | "deletesinglefiled" => {
                Ok(UnfileMode::DeleteSingleFiled)
            }
            "delete" => Ok(UnfileMode::Delete),
            other => Err(format!("unknown unfile mode: {other}")),
        }
    }
}

/// The physical operation chosen for one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Removal {
    /// Detach only the association the node was reached through.
    Unfile,
    /// Remove the node (and, if configured, its version history).
    Delete,
}

/// Decides between [`Removal::Unfile`] and [`Removal::Delete`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RemovalPolicy {
    mode: UnfileMode,
}

impl RemovalPolicy {
    pub fn new(mode: UnfileMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> UnfileMode {
        self.mode
    }

    /// The decision rule over already-fetched state.
    ///
    /// `exact` is the association the node was reached through in the
    /// current traversal (`None` for a traversal root) and `primary` is the
    /// node's primary association.
    pub fn rule(
        &self,
        kind: NodeKind,
        exact: Option<&Association>,
        primary: Option<&Association>,
    ) -> Removal {
        let Some(exact) = exact else {
            return Removal::Delete;
        };
        if kind.is_folder() {
            return Removal::Delete;
        }
        match self.mode {
            UnfileMode::Unfile => Removal::Unfile,
            UnfileMode::Delete => Removal::Delete,
            UnfileMode::DeleteSingleFiled if exact.is_primary(primary) => Removal::Delete,
            UnfileMode::DeleteSingleFiled => Removal::Unfile,
        }
    }

    /// Decide for a node, looking up its primary association only when the
    /// answer depends on it.
    pub fn decide<S: NodeStore + ?Sized>(
        &self,
        store: &S,
        kind: NodeKind,
        exact: Option<&Association>,
    ) -> StoreResult<Removal> {
        let needs_primary = self.mode == UnfileMode::DeleteSingleFiled && !kind.is_folder();
        let primary = match exact {
            Some(edge) if needs_primary => store.primary_parent_of(&edge.child)?,
            _ => None,
        };
        Ok(self.rule(kind, exact, primary.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cabinet_store::InMemoryNodeStore;
    use cabinet_types::NodeId;

    fn edges() -> (Association, Association) {
        let child = NodeId::new();
        (
            Association::new(NodeId::new(), child),
            Association::new(NodeId::new(), child),
        )
    }

    // -----------------------------------------------------------------------
    // Rule
    // -----------------------------------------------------------------------

    #[test]
    fn traversal_root_is_always_deleted() {
        for mode in [UnfileMode::Unfile, UnfileMode::DeleteSingleFiled, UnfileMode::Delete] {
            let policy = RemovalPolicy::new(mode);
            assert_eq!(policy.rule(NodeKind::Document, None, None), Removal::Delete);
            assert_eq!(policy.rule(NodeKind::Folder, None, None), Removal::Delete);
        }
    }

    #[test]
    fn folders_are_never_unfiled() {
        let (primary, _) = edges();
        let policy = RemovalPolicy::new(UnfileMode::Unfile);
        assert_eq!(
            policy.rule(NodeKind::Folder, Some(&primary), Some(&primary)),
            Removal::Delete
        );
    }

    #[test]
    fn single_filed_mode_deletes_through_primary() {
        let (primary, _) = edges();
        let policy = RemovalPolicy::new(UnfileMode::DeleteSingleFiled);
        assert_eq!(
            policy.rule(NodeKind::Document, Some(&primary), Some(&primary)),
            Removal::Delete
        );
    }

    #[test]
    fn single_filed_mode_unfiles_through_secondary() {
        let (primary, secondary) = edges();
        let policy = RemovalPolicy::new(UnfileMode::DeleteSingleFiled);
        assert_eq!(
            policy.rule(NodeKind::Document, Some(&secondary), Some(&primary)),
            Removal::Unfile
        );
    }

    #[test]
    fn total_mode_deletes_through_secondary() {
        let (primary, secondary) = edges();
        let policy = RemovalPolicy::new(UnfileMode::Delete);
        assert_eq!(
            policy.rule(NodeKind::Document, Some(&secondary), Some(&primary)),
            Removal::Delete
        );
    }

    #[test]
    fn unfile_mode_unfiles_even_primary() {
        let (primary, _) = edges();
        let policy = RemovalPolicy::new(UnfileMode::Unfile);
        assert_eq!(
            policy.rule(NodeKind::Document, Some(&primary), Some(&primary)),
            Removal::Unfile
        );
    }

    // -----------------------------------------------------------------------
    // Store-backed decisions
    // -----------------------------------------------------------------------

    #[test]
    fn decide_looks_up_primary_parent() {
        let store = InMemoryNodeStore::new();
        let root = store.root();
        let s = store.create_folder(&root, "S").unwrap();
        let r = store.create_folder(&root, "R").unwrap();
        let doc = store.create_document(&s, "doc").unwrap();
        store.file(&doc, &r).unwrap();

        let policy = RemovalPolicy::default();
        let via_r = Association::new(r, doc);
        let via_s = Association::new(s, doc);
        assert_eq!(
            policy.decide(&store, NodeKind::Document, Some(&via_r)).unwrap(),
            Removal::Unfile
        );
        assert_eq!(
            policy.decide(&store, NodeKind::Document, Some(&via_s)).unwrap(),
            Removal::Delete
        );
    }

    #[test]
    fn decide_skips_lookup_when_not_needed() {
        let store = InMemoryNodeStore::new();
        let ghost = Association::new(store.root(), NodeId::new());
        let policy = RemovalPolicy::new(UnfileMode::Delete);
        assert_eq!(
            policy.decide(&store, NodeKind::Document, Some(&ghost)).unwrap(),
            Removal::Delete
        );
    }

    #[test]
    fn mode_parsing_and_display() {
        for mode in [UnfileMode::Unfile, UnfileMode::DeleteSingleFiled, UnfileMode::Delete] {
            assert_eq!(mode.to_string().parse::<UnfileMode>().unwrap(), mode);
        }
        assert!("shred".parse::<UnfileMode>().is_err());
        assert_eq!(UnfileMode::from_total_deletion(true), UnfileMode::Delete);
        assert_eq!(
            UnfileMode::from_total_deletion(false),
            UnfileMode::DeleteSingleFiled
        );
    }
}

//! Hierarchical removal for Cabinet.
//!
//! Removes a folder subtree from a [`NodeStore`](cabinet_store::NodeStore)
//! children first, unfiling documents that stay filed elsewhere and deleting
//! the rest. Two engines share one policy, one removal operation and one
//! failure ledger:
//!
//! - [`HierarchyEnumerator`] -- pull model; depth-first, each node offered
//!   after its whole subtree, the caller decides when to `remove()`
//! - [`QueueRemover`] -- push model; breadth-first bulk deletion with
//!   one retry per folder
//!
//! [`RemovalService`] validates requests and picks the engine.
//!
//! # Invariants
//!
//! 1. A folder is only removed once the store reports it empty.
//! 2. With continuation enabled, a failure marks every traversal ancestor
//!    as failed too.
//! 3. A node that vanished concurrently counts as removed.
//! 4. Absence from the returned ledger means the node was removed.

pub mod arena;
pub mod config;
pub mod enumerator;
pub mod error;
pub mod ledger;
pub mod operation;
pub mod policy;
pub mod queue;
pub mod service;

pub use arena::{Arena, SlotId};
pub use config::RemovalConfig;
pub use enumerator::{FrontierState, HierarchyEnumerator, ParentedNode};
pub use error::{RemovalError, RemovalResult};
pub use ledger::{identify, FailureLedger};
pub use operation::Applied;
pub use policy::{Removal, RemovalPolicy, UnfileMode};
pub use queue::{QueueRemover, QueueReport};
pub use service::RemovalService;

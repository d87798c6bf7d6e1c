//! Node storage for Cabinet.
//!
//! The removal engine never touches repository storage directly: it sees
//! nodes only through the narrow [`NodeStore`] trait defined here.
//!
//! # Storage Backends
//!
//! - [`InMemoryNodeStore`] -- `HashMap`-based store for tests, fixtures and
//!   embedding, with fault injection and an operation journal
//!
//! # Design Rules
//!
//! 1. Folders own association edges, never copies of their children.
//! 2. A node has at most one primary parent; any number of secondary filings.
//! 3. Removing a vanished node reports `NotFound` and changes nothing.
//! 4. Deleting a working copy cancels its check-out.
//! 5. Errors carry a kind, never just a message.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryNodeStore, StoreOp};
pub use traits::NodeStore;

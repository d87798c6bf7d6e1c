//! Foundation types for Cabinet.
//!
//! This crate provides the identity and structural vocabulary shared by the
//! node store and the removal engine. Every other Cabinet crate depends on
//! `cabinet-types`.
//!
//! # Key Types
//!
//! - [`NodeId`] -- Opaque, time-ordered node identifier (UUID v7)
//! - [`NodeKind`] -- Folder or document
//! - [`Association`] -- A parent/child filing edge
//! - [`VersionLabel`] -- Label of a document version ("1.0", "2.3", ...)
//! - [`ObjectIdentifier`] -- `nodeId[/versionLabel]`, the key reported for
//!   objects that could not be removed
//! - [`Principal`] -- The acting identity for lock evaluation

pub mod association;
pub mod error;
pub mod identifier;
pub mod node;
pub mod principal;

pub use association::Association;
pub use error::TypeError;
pub use identifier::{ObjectIdentifier, VersionLabel};
pub use node::{NodeId, NodeKind};
pub use principal::Principal;

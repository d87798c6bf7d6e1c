use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("invalid object identifier: {0}")]
    InvalidIdentifier(String),

    #[error("version label must not be empty")]
    EmptyVersionLabel,

    #[error("invalid version label {label:?}: {reason}")]
    InvalidVersionLabel { label: String, reason: String },
}

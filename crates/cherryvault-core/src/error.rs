//! Error taxonomy shared by every vault component.
//!
//! Read-side denials deliberately collapse into [`VaultError::NotFound`]:
//! a caller must not be able to tell an ACL-hidden secret apart from one
//! that never existed.

use thiserror::Error;

/// Errors surfaced by the vault core.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Malformed input: an empty required field, an unparseable compound
    /// address, a group with no targets.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The recomputed digest of a sealed record differs from its stored
    /// checksum. Fatal to the write; never retried.
    #[error("entry '{ident}' is sealed and read only")]
    Immutability { ident: String },

    /// Unknown or ACL-invisible secret/target.
    #[error("secret not found")]
    NotFound,

    /// An operation requiring an elevated context was attempted without one.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// A capability adaptation the source cannot satisfy.
    #[error("source '{source_name}' does not support capability {capability}")]
    NotSupported {
        source_name: String,
        capability: String,
    },

    /// Backing-engine I/O or serialization failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl VaultError {
    /// Shorthand for a validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

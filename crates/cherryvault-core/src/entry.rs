//! The versioned, multi-target secret record.
//!
//! An entry moves through exactly two states, enforced at the type level:
//!
//! - [`EntryDraft`] — under construction, mutable, no checksum.
//! - [`VaultEntry`] — sealed: checksum present, every field read-only.
//!
//! Mutating an identity field on a sealed entry is not representable in the
//! API. The digest remains as a defense against store-level corruption or
//! tampering of deserialized records: [`VaultEntry::verify`] must run as the
//! last step before every persist attempt.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checksum::compute_checksum;
use crate::error::VaultError;

// ---------------------------------------------------------------------------
// Draft state
// ---------------------------------------------------------------------------

/// An entry under construction. The validity window and `meta` are settable
/// here and only here; [`EntryDraft::seal`] fixes the checksum and produces
/// the immutable record.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    target: String,
    group: String,
    secret_key_id: String,
    secret_id: String,
    secret: String,
    meta: BTreeMap<String, String>,
    valid_from: Option<DateTime<Utc>>,
    valid_to: Option<DateTime<Utc>>,
}

impl EntryDraft {
    /// Start a draft. Fails with a validation error if any of the five
    /// identity-bearing fields is empty.
    pub fn new(
        target: impl Into<String>,
        group: impl Into<String>,
        secret_key_id: impl Into<String>,
        secret_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self, VaultError> {
        let draft = Self {
            target: target.into(),
            group: group.into(),
            secret_key_id: secret_key_id.into(),
            secret_id: secret_id.into(),
            secret: secret.into(),
            meta: BTreeMap::new(),
            valid_from: None,
            valid_to: None,
        };

        for (name, value) in [
            ("secret", &draft.secret),
            ("secretKeyId", &draft.secret_key_id),
            ("secretId", &draft.secret_id),
            ("target", &draft.target),
            ("group", &draft.group),
        ] {
            if value.is_empty() {
                return Err(VaultError::validation(format!("{name} must not be empty")));
            }
        }

        Ok(draft)
    }

    /// Replace the meta map.
    pub fn with_meta(mut self, meta: BTreeMap<String, String>) -> Self {
        self.meta = meta;
        self
    }

    /// Insert a single meta entry.
    pub fn insert_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.meta.insert(key.into(), value.into());
    }

    /// Set the start of the validity window.
    pub fn set_valid_from(&mut self, valid_from: Option<DateTime<Utc>>) {
        self.valid_from = valid_from;
    }

    /// Set the end of the validity window.
    pub fn set_valid_to(&mut self, valid_to: Option<DateTime<Utc>>) {
        self.valid_to = valid_to;
    }

    /// Builder form of the validity window.
    pub fn with_window(
        mut self,
        valid_from: Option<DateTime<Utc>>,
        valid_to: Option<DateTime<Utc>>,
    ) -> Self {
        self.valid_from = valid_from;
        self.valid_to = valid_to;
        self
    }

    /// Fix the checksum and produce the immutable record.
    pub fn seal(self) -> VaultEntry {
        let checksum = compute_checksum(
            &self.secret,
            &self.secret_key_id,
            &self.secret_id,
            &self.target,
            &self.group,
        );
        VaultEntry {
            target: self.target,
            group: self.group,
            secret_key_id: self.secret_key_id,
            secret_id: self.secret_id,
            secret: self.secret,
            meta: self.meta,
            valid_from: self.valid_from,
            valid_to: self.valid_to,
            checksum,
        }
    }
}

// ---------------------------------------------------------------------------
// Sealed state
// ---------------------------------------------------------------------------

/// A sealed secret record. One exists per `(secret_id, target)` pair and
/// version; updates insert new sealed versions, never mutate old ones.
///
/// Serde deserialization can reconstruct arbitrary field/checksum
/// combinations (that is how records come back from a backing store) —
/// which is exactly why stores call [`VaultEntry::verify`] before
/// persisting anything.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VaultEntry {
    target: String,
    group: String,
    secret_key_id: String,
    secret_id: String,
    secret: String,
    meta: BTreeMap<String, String>,
    valid_from: Option<DateTime<Utc>>,
    valid_to: Option<DateTime<Utc>>,
    checksum: String,
}

impl VaultEntry {
    /// The consuming system/use this encoded copy belongs to.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The producing policy/group name.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Identity of the key or generator instance used.
    pub fn secret_key_id(&self) -> &str {
        &self.secret_key_id
    }

    /// The logical identity shared by all targets and versions.
    pub fn secret_id(&self) -> &str {
        &self.secret_id
    }

    /// The encoded secret payload.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Free-form metadata.
    pub fn meta(&self) -> &BTreeMap<String, String> {
        &self.meta
    }

    /// Start of the validity window, if any.
    pub fn valid_from(&self) -> Option<DateTime<Utc>> {
        self.valid_from
    }

    /// End of the validity window, if any.
    pub fn valid_to(&self) -> Option<DateTime<Utc>> {
        self.valid_to
    }

    /// The sealed checksum.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Storage identity used in error reporting: `secretId:target`.
    pub fn ident(&self) -> String {
        format!("{}:{}", self.secret_id, self.target)
    }

    /// Recompute the digest and compare against the sealed checksum.
    ///
    /// A mismatch means one of the frozen fields changed after sealing —
    /// the record must not be persisted.
    pub fn verify(&self) -> Result<(), VaultError> {
        let expected = compute_checksum(
            &self.secret,
            &self.secret_key_id,
            &self.secret_id,
            &self.target,
            &self.group,
        );
        if expected != self.checksum {
            return Err(VaultError::Immutability {
                ident: self.ident(),
            });
        }
        Ok(())
    }

    /// Copy every field except the checksum, producing a draft that must
    /// re-establish its own seal before it can be persisted. Used for
    /// archive/history copies.
    pub fn clone_for_archive(&self) -> EntryDraft {
        EntryDraft {
            target: self.target.clone(),
            group: self.group.clone(),
            secret_key_id: self.secret_key_id.clone(),
            secret_id: self.secret_id.clone(),
            secret: self.secret.clone(),
            meta: self.meta.clone(),
            valid_from: self.valid_from,
            valid_to: self.valid_to,
        }
    }
}

// The encoded payload is still secret material; keep it out of Debug output.
impl fmt::Debug for VaultEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultEntry")
            .field("target", &self.target)
            .field("group", &self.group)
            .field("secret_key_id", &self.secret_key_id)
            .field("secret_id", &self.secret_id)
            .field("secret", &"[REDACTED]")
            .field("valid_from", &self.valid_from)
            .field("valid_to", &self.valid_to)
            .field("checksum", &self.checksum)
            .finish_non_exhaustive()
    }
}

//! Access-controlled key sources over pluggable storage engines.
//!
//! A [`VaultSource`] stores and enumerates [`VaultKey`] records — generic
//! named key material, not vault entries; the two concepts stay separate.
//! Reads are filtered by the record's `read_acl`: ACL denial, absence, and
//! per-record decode failure all surface as the same "not there" result,
//! so a caller can never probe for the existence of restricted keys.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cherryvault_core::VaultError;
use cherryvault_core::access::AccessContext;

/// Enumeration examines at most this many records per call.
pub const ENUMERATION_PAGE_BOUND: usize = 100;

// ---------------------------------------------------------------------------
// VaultKey
// ---------------------------------------------------------------------------

/// A generic named key-material record.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VaultKey {
    /// Stable identifier.
    pub ident: Uuid,

    /// The key material.
    pub value: String,

    /// Human-readable description.
    pub description: String,

    /// Free-form type tag (e.g. `"rsa-public"`, `"aes-256"`).
    pub kind: String,

    /// Ordered read-access rules; `None` means unrestricted.
    pub read_acl: Option<Vec<String>>,
}

impl VaultKey {
    /// Create an unrestricted key with a fresh ident.
    pub fn new(
        value: impl Into<String>,
        description: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            ident: Uuid::new_v4(),
            value: value.into(),
            description: description.into(),
            kind: kind.into(),
            read_acl: None,
        }
    }

    /// Attach a read ACL.
    pub fn with_read_acl(mut self, rules: Vec<String>) -> Self {
        self.read_acl = Some(rules);
        self
    }
}

// Key material stays out of Debug output.
impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultKey")
            .field("ident", &self.ident)
            .field("value", &"[REDACTED]")
            .field("description", &self.description)
            .field("kind", &self.kind)
            .field("read_acl", &self.read_acl)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Capabilities a caller can request from a source via
/// [`VaultSource::adapt_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCapability {
    /// Entries can be added and removed.
    Mutate,

    /// `load`/`save` round-trip through durable storage.
    Persist,
}

impl fmt::Display for SourceCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mutate => write!(f, "mutate"),
            Self::Persist => write!(f, "persist"),
        }
    }
}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// A pluggable, ACL-filtered store of key material.
pub trait VaultSource: fmt::Debug + Send + Sync {
    /// The source's name, used in errors and logging.
    fn name(&self) -> &str;

    /// Look up a key by ident, filtered by the caller's context.
    ///
    /// Returns `None` for an absent id, an ACL denial, and a record that
    /// fails to decode — indistinguishably. Internal causes are logged at
    /// debug level only.
    fn get_entry(&self, ctx: &dyn AccessContext, id: Uuid) -> Option<VaultKey>;

    /// Enumerate the idents visible to the caller, examining at most
    /// [`ENUMERATION_PAGE_BOUND`] records. A record that fails to decode
    /// or evaluate is logged and skipped; it never aborts the rest.
    fn get_entry_ids(&self, ctx: &dyn AccessContext) -> Vec<Uuid>;

    /// Store a key.
    fn add_entry(&self, key: VaultKey) -> Result<(), VaultError>;

    /// Remove a key. Requires an elevated context irrespective of the
    /// record's `read_acl`; removing an absent id is a no-op.
    fn remove_entry(&self, ctx: &dyn AccessContext, id: Uuid) -> Result<(), VaultError>;

    /// Read the source's durable state, if it has any.
    fn load(&self) -> Result<(), VaultError> {
        Ok(())
    }

    /// Write the source's durable state, if it has any.
    fn save(&self) -> Result<(), VaultError> {
        Ok(())
    }

    /// Whether the source holds its records in memory only.
    fn is_memory_based(&self) -> bool;

    /// Request a richer capability set: the source itself if it satisfies
    /// the capability, else a not-supported error naming both.
    fn adapt_to(&self, capability: SourceCapability) -> Result<&dyn VaultSource, VaultError>;
}

/// Whether the context may read the record. `None` means unrestricted.
fn acl_permits(ctx: &dyn AccessContext, key: &VaultKey) -> bool {
    match &key.read_acl {
        None => true,
        Some(rules) => ctx.has_access(rules),
    }
}

fn require_elevated(ctx: &dyn AccessContext) -> Result<(), VaultError> {
    if ctx.is_elevated() {
        Ok(())
    } else {
        Err(VaultError::Authorization(
            "only an elevated context can remove entries".to_owned(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Memory engine
// ---------------------------------------------------------------------------

/// A memory-based source: a mutex-guarded ident map. Supports mutation
/// but not persistence.
#[derive(Debug)]
pub struct MemoryVaultSource {
    name: String,
    keys: Mutex<HashMap<Uuid, VaultKey>>,
}

impl MemoryVaultSource {
    /// Create an empty memory source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, VaultKey>> {
        self.keys.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl VaultSource for MemoryVaultSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_entry(&self, ctx: &dyn AccessContext, id: Uuid) -> Option<VaultKey> {
        let keys = self.lock();
        let key = keys.get(&id)?;
        if !acl_permits(ctx, key) {
            tracing::debug!(source = %self.name, %id, "read acl denied; hiding entry");
            return None;
        }
        Some(key.clone())
    }

    fn get_entry_ids(&self, ctx: &dyn AccessContext) -> Vec<Uuid> {
        self.lock()
            .values()
            .take(ENUMERATION_PAGE_BOUND)
            .filter(|key| acl_permits(ctx, key))
            .map(|key| key.ident)
            .collect()
    }

    fn add_entry(&self, key: VaultKey) -> Result<(), VaultError> {
        self.lock().insert(key.ident, key);
        Ok(())
    }

    fn remove_entry(&self, ctx: &dyn AccessContext, id: Uuid) -> Result<(), VaultError> {
        require_elevated(ctx)?;
        self.lock().remove(&id);
        Ok(())
    }

    fn is_memory_based(&self) -> bool {
        true
    }

    fn adapt_to(&self, capability: SourceCapability) -> Result<&dyn VaultSource, VaultError> {
        match capability {
            SourceCapability::Mutate => Ok(self),
            SourceCapability::Persist => Err(VaultError::NotSupported {
                source_name: self.name.clone(),
                capability: capability.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// File engine
// ---------------------------------------------------------------------------

/// A JSON-file-persisted source. Records are held raw and decoded on
/// access, so one corrupt record hides itself without poisoning the rest.
/// Mutations write through eagerly; `load`/`save` remain available for
/// explicit refresh and flush.
#[derive(Debug)]
pub struct FileVaultSource {
    name: String,
    path: PathBuf,
    records: Mutex<HashMap<Uuid, serde_json::Value>>,
}

impl FileVaultSource {
    /// Create a source backed by `path` and read its current state.
    /// A missing file is an empty source, not an error.
    pub fn open(name: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let source = Self {
            name: name.into(),
            path: path.into(),
            records: Mutex::new(HashMap::new()),
        };
        source.load()?;
        Ok(source)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, serde_json::Value>> {
        self.records.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn decode(&self, id: Uuid, value: &serde_json::Value) -> Option<VaultKey> {
        match serde_json::from_value::<VaultKey>(value.clone()) {
            Ok(key) => Some(key),
            Err(err) => {
                tracing::warn!(source = %self.name, %id, %err, "skipping undecodable key record");
                None
            }
        }
    }

    fn write_file(&self, records: &HashMap<Uuid, serde_json::Value>) -> Result<(), VaultError> {
        let by_ident: HashMap<String, &serde_json::Value> = records
            .iter()
            .map(|(id, value)| (id.to_string(), value))
            .collect();
        let json = serde_json::to_string_pretty(&by_ident)
            .map_err(|e| VaultError::Storage(format!("failed to serialize key records: {e}")))?;
        std::fs::write(&self.path, json).map_err(|e| {
            VaultError::Storage(format!("failed to write {}: {e}", self.path.display()))
        })
    }
}

impl VaultSource for FileVaultSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_entry(&self, ctx: &dyn AccessContext, id: Uuid) -> Option<VaultKey> {
        let records = self.lock();
        let key = self.decode(id, records.get(&id)?)?;
        if !acl_permits(ctx, &key) {
            tracing::debug!(source = %self.name, %id, "read acl denied; hiding entry");
            return None;
        }
        Some(key)
    }

    fn get_entry_ids(&self, ctx: &dyn AccessContext) -> Vec<Uuid> {
        self.lock()
            .iter()
            .take(ENUMERATION_PAGE_BOUND)
            .filter_map(|(id, value)| self.decode(*id, value))
            .filter(|key| acl_permits(ctx, key))
            .map(|key| key.ident)
            .collect()
    }

    fn add_entry(&self, key: VaultKey) -> Result<(), VaultError> {
        let mut records = self.lock();
        let value = serde_json::to_value(&key)
            .map_err(|e| VaultError::Storage(format!("failed to serialize key: {e}")))?;
        records.insert(key.ident, value);
        self.write_file(&records)
    }

    fn remove_entry(&self, ctx: &dyn AccessContext, id: Uuid) -> Result<(), VaultError> {
        require_elevated(ctx)?;
        let mut records = self.lock();
        records.remove(&id);
        self.write_file(&records)
    }

    fn load(&self) -> Result<(), VaultError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(VaultError::Storage(format!(
                    "failed to read {}: {err}",
                    self.path.display()
                )));
            }
        };
        let by_ident: HashMap<String, serde_json::Value> = serde_json::from_str(&raw)
            .map_err(|e| {
                VaultError::Storage(format!("failed to parse {}: {e}", self.path.display()))
            })?;

        let mut records = self.lock();
        records.clear();
        for (raw_id, value) in by_ident {
            match Uuid::parse_str(&raw_id) {
                Ok(id) => {
                    records.insert(id, value);
                }
                Err(err) => {
                    tracing::warn!(source = %self.name, %raw_id, %err, "skipping record with malformed ident");
                }
            }
        }
        Ok(())
    }

    fn save(&self) -> Result<(), VaultError> {
        let records = self.lock();
        self.write_file(&records)
    }

    fn is_memory_based(&self) -> bool {
        false
    }

    fn adapt_to(&self, capability: SourceCapability) -> Result<&dyn VaultSource, VaultError> {
        match capability {
            SourceCapability::Mutate | SourceCapability::Persist => Ok(self),
        }
    }
}

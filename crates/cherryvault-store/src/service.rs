//! The secret lifecycle service.
//!
//! One cohesive state machine over a secret identity:
//!
//! ```text
//! nonexistent -> active -> active' (repeatable) -> deleted <-> active
//! ```
//!
//! Creation resolves the group's generator and target pipeline, produces
//! one secret, and persists one sealed entry per target under a freshly
//! minted id. Updates re-run the pipeline under the existing id; prior
//! versions stay retrievable. Deletion only toggles the soft-delete
//! marker — there is no hard-delete transition.
//!
//! Every operation takes the caller's [`AccessContext`] explicitly.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use cherryvault_core::access::AccessContext;
use cherryvault_core::audit::{AuditEvent, AuditEventKind, AuditSink, TracingAuditEmitter};
use cherryvault_core::{EntryDraft, SecretContent, VaultEntry, VaultError};

use crate::entry_store::VaultEntryStore;
use crate::groups::{ContentDecoder, GroupRegistry, PlaintextDecoder, ProcessorConfig, TargetBinding};
use crate::source::VaultSource;

/// `secret_key_id` marker for entries produced from imported material.
pub const IMPORTED_KEY_ID: &str = "imported";

/// The lifecycle service over a secret identity.
pub struct CherryVault {
    entries: VaultEntryStore,
    source: Arc<dyn VaultSource>,
    groups: Arc<dyn GroupRegistry>,
    decoder: Arc<dyn ContentDecoder>,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for CherryVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CherryVault")
            .field("source", &self.source.name())
            .finish_non_exhaustive()
    }
}

impl CherryVault {
    /// Assemble the service. Raw imports default to plaintext decoding and
    /// audit events go to the tracing emitter; both are replaceable.
    pub fn new(
        entries: VaultEntryStore,
        source: Arc<dyn VaultSource>,
        groups: Arc<dyn GroupRegistry>,
    ) -> Self {
        Self {
            entries,
            source,
            groups,
            decoder: Arc::new(PlaintextDecoder),
            audit: Arc::new(TracingAuditEmitter::new()),
        }
    }

    /// Replace the raw-import decoder.
    pub fn with_decoder(mut self, decoder: Arc<dyn ContentDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Replace the audit sink.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Create a new secret: generate once, encode per target, persist one
    /// sealed entry per target, and return the freshly minted id.
    pub fn create_secret(
        &self,
        ctx: &dyn AccessContext,
        group: &str,
        valid_from: Option<DateTime<Utc>>,
        valid_to: Option<DateTime<Utc>>,
        config: &ProcessorConfig,
    ) -> Result<String, VaultError> {
        let generator = self.groups.resolve_generator(group)?;
        let content = generator.generate(config)?;
        let secret_id = Uuid::new_v4().to_string();
        self.write_versions(
            ctx,
            group,
            &secret_id,
            &content,
            generator.name(),
            valid_from,
            valid_to,
            config,
        )?;
        self.audit.emit(
            AuditEvent::new(AuditEventKind::SecretCreated)
                .with_principal(ctx.principal())
                .with_secret_id(&secret_id)
                .with_group(group),
        );
        Ok(secret_id)
    }

    /// Generate a new value for an existing secret. Every target receives
    /// a new sealed version; old versions remain retrievable as history.
    pub fn create_update(
        &self,
        ctx: &dyn AccessContext,
        secret_id: &str,
        valid_from: Option<DateTime<Utc>>,
        valid_to: Option<DateTime<Utc>>,
        config: &ProcessorConfig,
    ) -> Result<(), VaultError> {
        let group = self.active_group(secret_id)?;
        let generator = self.groups.resolve_generator(&group)?;
        let content = generator.generate(config)?;
        self.write_versions(
            ctx,
            &group,
            secret_id,
            &content,
            generator.name(),
            valid_from,
            valid_to,
            config,
        )?;
        self.audit.emit(
            AuditEvent::new(AuditEventKind::SecretUpdated)
                .with_principal(ctx.principal())
                .with_secret_id(secret_id)
                .with_group(&group),
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Import
    // -----------------------------------------------------------------------

    /// Store caller-supplied secret material as a new secret.
    pub fn import_secret(
        &self,
        ctx: &dyn AccessContext,
        group: &str,
        valid_from: Option<DateTime<Utc>>,
        valid_to: Option<DateTime<Utc>>,
        content: &SecretContent,
        config: &ProcessorConfig,
    ) -> Result<String, VaultError> {
        let secret_id = Uuid::new_v4().to_string();
        self.write_versions(
            ctx,
            group,
            &secret_id,
            content,
            IMPORTED_KEY_ID,
            valid_from,
            valid_to,
            config,
        )?;
        self.audit.emit(
            AuditEvent::new(AuditEventKind::SecretImported)
                .with_principal(ctx.principal())
                .with_secret_id(&secret_id)
                .with_group(group),
        );
        Ok(secret_id)
    }

    /// Store caller-supplied secret material as a new version of an
    /// existing secret.
    pub fn import_update(
        &self,
        ctx: &dyn AccessContext,
        secret_id: &str,
        valid_from: Option<DateTime<Utc>>,
        valid_to: Option<DateTime<Utc>>,
        content: &SecretContent,
        config: &ProcessorConfig,
    ) -> Result<(), VaultError> {
        let group = self.active_group(secret_id)?;
        self.write_versions(
            ctx,
            &group,
            secret_id,
            content,
            IMPORTED_KEY_ID,
            valid_from,
            valid_to,
            config,
        )?;
        self.audit.emit(
            AuditEvent::new(AuditEventKind::SecretUpdated)
                .with_principal(ctx.principal())
                .with_secret_id(secret_id)
                .with_group(&group)
                .with_detail("imported"),
        );
        Ok(())
    }

    /// Import a raw string, decoding it with the caller's content decoder
    /// before processing.
    pub fn import_secret_raw(
        &self,
        ctx: &dyn AccessContext,
        group: &str,
        valid_from: Option<DateTime<Utc>>,
        valid_to: Option<DateTime<Utc>>,
        raw: &str,
        config: &ProcessorConfig,
    ) -> Result<String, VaultError> {
        let content = self.decoder.decode(ctx, raw)?;
        self.import_secret(ctx, group, valid_from, valid_to, &content, config)
    }

    /// Import a raw string as a new version of an existing secret.
    pub fn import_update_raw(
        &self,
        ctx: &dyn AccessContext,
        secret_id: &str,
        valid_from: Option<DateTime<Utc>>,
        valid_to: Option<DateTime<Utc>>,
        raw: &str,
        config: &ProcessorConfig,
    ) -> Result<(), VaultError> {
        let content = self.decoder.decode(ctx, raw)?;
        self.import_update(ctx, secret_id, valid_from, valid_to, &content, config)
    }

    // -----------------------------------------------------------------------
    // Deletion
    // -----------------------------------------------------------------------

    /// Soft-delete every entry sharing the id. The sealed records are never
    /// discarded, only hidden from reads.
    pub fn delete_secret(
        &self,
        ctx: &dyn AccessContext,
        secret_id: &str,
    ) -> Result<(), VaultError> {
        if !self.entries.has_versions(secret_id)? {
            return Err(VaultError::NotFound);
        }
        self.entries.set_removed(secret_id, true)?;
        self.audit.emit(
            AuditEvent::new(AuditEventKind::SecretDeleted)
                .with_principal(ctx.principal())
                .with_secret_id(secret_id),
        );
        Ok(())
    }

    /// Restore a soft-deleted secret.
    pub fn undelete_secret(
        &self,
        ctx: &dyn AccessContext,
        secret_id: &str,
    ) -> Result<(), VaultError> {
        if !self.entries.has_versions(secret_id)? {
            return Err(VaultError::NotFound);
        }
        self.entries.set_removed(secret_id, false)?;
        self.audit.emit(
            AuditEvent::new(AuditEventKind::SecretUndeleted)
                .with_principal(ctx.principal())
                .with_secret_id(secret_id),
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// The latest non-deleted entry for the pair, visible to the caller.
    ///
    /// Absence, deletion, and ACL denial all collapse into `NotFound`;
    /// the internal cause is recorded in the audit trail only.
    pub fn get_secret(
        &self,
        ctx: &dyn AccessContext,
        secret_id: &str,
        target: &str,
    ) -> Result<VaultEntry, VaultError> {
        let Some(record) = self.entries.find_latest(secret_id, target)? else {
            return Err(VaultError::NotFound);
        };

        // Entries encoded with stored key material are only visible to
        // callers who can read that key through the source's ACL filter.
        if let Ok(key_ident) = Uuid::parse_str(record.entry.secret_key_id())
            && self.source.get_entry(ctx, key_ident).is_none()
        {
            self.audit.emit(
                AuditEvent::new(AuditEventKind::AccessDenied)
                    .with_principal(ctx.principal())
                    .with_secret_id(secret_id)
                    .with_target(target)
                    .with_detail("key material not visible to caller"),
            );
            return Err(VaultError::NotFound);
        }

        self.audit.emit(
            AuditEvent::new(AuditEventKind::SecretRead)
                .with_principal(ctx.principal())
                .with_secret_id(secret_id)
                .with_target(target),
        );
        Ok(record.entry)
    }

    /// Resolve a compound `secretId:target` address and read it.
    pub fn get_secret_at(
        &self,
        ctx: &dyn AccessContext,
        address: &str,
    ) -> Result<VaultEntry, VaultError> {
        let addr = cherryvault_core::address::SecretAddress::parse(address)?;
        self.get_secret(ctx, &addr.secret_id, &addr.target)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// The group of the id's latest active entry. `NotFound` when the id
    /// has no entries or only removed ones (a deleted secret only accepts
    /// `undelete`).
    fn active_group(&self, secret_id: &str) -> Result<String, VaultError> {
        self.entries
            .find_latest_any_target(secret_id)?
            .map(|record| record.entry.group().to_owned())
            .ok_or(VaultError::NotFound)
    }

    /// Run the target pipeline and persist one sealed version per target.
    ///
    /// Per-record atomicity only: a failure midway leaves the versions
    /// written so far in place, as the backing store offers no
    /// cross-record transactions.
    #[allow(clippy::too_many_arguments)]
    fn write_versions(
        &self,
        ctx: &dyn AccessContext,
        group: &str,
        secret_id: &str,
        content: &SecretContent,
        origin_key_id: &str,
        valid_from: Option<DateTime<Utc>>,
        valid_to: Option<DateTime<Utc>>,
        config: &ProcessorConfig,
    ) -> Result<(), VaultError> {
        let bindings = self.groups.resolve_target_processors(group)?;
        if bindings.is_empty() {
            return Err(VaultError::validation(format!(
                "group '{group}' has no targets configured"
            )));
        }

        for binding in &bindings {
            let key = self.resolve_binding_key(ctx, binding)?;
            let encoded = binding.processor.process(content, key.as_ref(), config)?;
            let secret_key_id = binding
                .key_ident
                .map(|ident| ident.to_string())
                .unwrap_or_else(|| origin_key_id.to_owned());

            let draft = EntryDraft::new(&binding.target, group, secret_key_id, secret_id, encoded)?
                .with_meta(config.clone())
                .with_window(valid_from, valid_to);
            self.entries.create(draft)?;
            tracing::debug!(secret_id, target = %binding.target, group, "sealed new entry version");
        }
        Ok(())
    }

    /// Resolve a binding's key material through the ACL-filtered source.
    /// The failure message does not reveal whether the key exists.
    fn resolve_binding_key(
        &self,
        ctx: &dyn AccessContext,
        binding: &TargetBinding,
    ) -> Result<Option<crate::source::VaultKey>, VaultError> {
        let Some(ident) = binding.key_ident else {
            return Ok(None);
        };
        match self.source.get_entry(ctx, ident) {
            Some(key) => Ok(Some(key)),
            None => Err(VaultError::validation(format!(
                "key material for target '{}' is not available",
                binding.target
            ))),
        }
    }
}

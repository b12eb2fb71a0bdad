//! Group policy collaborators: secret generation and per-target encoding.
//!
//! A group name binds one [`SecretGenerator`] to an ordered list of
//! [`TargetBinding`]s. The concrete algorithms are pluggable; this module
//! defines the contracts, a static registry, and two simple built-ins.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use uuid::Uuid;

use cherryvault_core::access::AccessContext;
use cherryvault_core::{SecretContent, SecretValue, VaultError};

use crate::source::VaultKey;

/// Free-form processing configuration handed through the lifecycle service.
pub type ProcessorConfig = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Produces fresh secret material for a group.
pub trait SecretGenerator: Send + Sync {
    /// The generator instance's identity, recorded as an entry's
    /// `secret_key_id` when no target key material is involved.
    fn name(&self) -> &str;

    /// Produce one new secret.
    fn generate(&self, config: &ProcessorConfig) -> Result<SecretContent, VaultError>;
}

/// Generates opaque random tokens (UUID v4 text).
#[derive(Debug)]
pub struct UuidTokenGenerator;

impl SecretGenerator for UuidTokenGenerator {
    fn name(&self) -> &str {
        "uuid-token"
    }

    fn generate(&self, _config: &ProcessorConfig) -> Result<SecretContent, VaultError> {
        let token = Uuid::new_v4().to_string();
        Ok(SecretContent::new(SecretValue::from_string(token)))
    }
}

// ---------------------------------------------------------------------------
// Target processor
// ---------------------------------------------------------------------------

/// Encodes one secret for one consuming target.
pub trait TargetProcessor: Send + Sync {
    /// Produce the encoded payload stored in the target's entry. `key` is
    /// the binding's key material, already resolved and ACL-checked.
    fn process(
        &self,
        secret: &SecretContent,
        key: Option<&VaultKey>,
        config: &ProcessorConfig,
    ) -> Result<String, VaultError>;
}

/// Encodes the secret bytes as base64 for transport-safe storage.
#[derive(Debug)]
pub struct Base64TargetProcessor;

impl TargetProcessor for Base64TargetProcessor {
    fn process(
        &self,
        secret: &SecretContent,
        _key: Option<&VaultKey>,
        _config: &ProcessorConfig,
    ) -> Result<String, VaultError> {
        Ok(STANDARD.encode(secret.value().as_bytes()))
    }
}

/// One target's slot in a group's processing pipeline.
#[derive(Clone)]
pub struct TargetBinding {
    /// The consuming system/use this slot encodes for.
    pub target: String,

    /// Key material handed to the processor, resolved through the
    /// ACL-filtered key source at processing time.
    pub key_ident: Option<Uuid>,

    /// The encoding step.
    pub processor: Arc<dyn TargetProcessor>,
}

impl TargetBinding {
    /// A binding without key material.
    pub fn new(target: impl Into<String>, processor: Arc<dyn TargetProcessor>) -> Self {
        Self {
            target: target.into(),
            key_ident: None,
            processor,
        }
    }

    /// A binding whose processor uses stored key material.
    pub fn with_key(
        target: impl Into<String>,
        key_ident: Uuid,
        processor: Arc<dyn TargetProcessor>,
    ) -> Self {
        Self {
            target: target.into(),
            key_ident: Some(key_ident),
            processor,
        }
    }
}

impl std::fmt::Debug for TargetBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetBinding")
            .field("target", &self.target)
            .field("key_ident", &self.key_ident)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Resolves group names to their generation strategy and target pipeline.
pub trait GroupRegistry: Send + Sync {
    /// The group's secret generator.
    fn resolve_generator(&self, group: &str) -> Result<Arc<dyn SecretGenerator>, VaultError>;

    /// The group's ordered target pipeline.
    fn resolve_target_processors(&self, group: &str) -> Result<Vec<TargetBinding>, VaultError>;
}

/// A fixed, in-memory registry.
#[derive(Default)]
pub struct StaticGroupRegistry {
    groups: HashMap<String, GroupDefinition>,
}

struct GroupDefinition {
    generator: Arc<dyn SecretGenerator>,
    targets: Vec<TargetBinding>,
}

impl StaticGroupRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group.
    pub fn with_group(
        mut self,
        name: impl Into<String>,
        generator: Arc<dyn SecretGenerator>,
        targets: Vec<TargetBinding>,
    ) -> Self {
        self.groups
            .insert(name.into(), GroupDefinition { generator, targets });
        self
    }

    fn definition(&self, group: &str) -> Result<&GroupDefinition, VaultError> {
        self.groups
            .get(group)
            .ok_or_else(|| VaultError::validation(format!("unknown group '{group}'")))
    }
}

impl GroupRegistry for StaticGroupRegistry {
    fn resolve_generator(&self, group: &str) -> Result<Arc<dyn SecretGenerator>, VaultError> {
        Ok(Arc::clone(&self.definition(group)?.generator))
    }

    fn resolve_target_processors(&self, group: &str) -> Result<Vec<TargetBinding>, VaultError> {
        Ok(self.definition(group)?.targets.clone())
    }
}

// ---------------------------------------------------------------------------
// Raw import decoding
// ---------------------------------------------------------------------------

/// Decodes caller-supplied raw secret material (models decryption with the
/// caller's own key material, performed by an outer layer).
pub trait ContentDecoder: Send + Sync {
    /// Turn the raw input into processable secret content.
    fn decode(&self, ctx: &dyn AccessContext, raw: &str) -> Result<SecretContent, VaultError>;
}

/// Treats the raw input as plaintext. Stands in where transport protection
/// is handled upstream of the vault.
#[derive(Debug)]
pub struct PlaintextDecoder;

impl ContentDecoder for PlaintextDecoder {
    fn decode(&self, _ctx: &dyn AccessContext, raw: &str) -> Result<SecretContent, VaultError> {
        if raw.is_empty() {
            return Err(VaultError::validation(
                "imported secret must not be empty".to_owned(),
            ));
        }
        Ok(SecretContent::new(SecretValue::from_string(raw.to_owned())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cherryvault_core::access::StaticAccessContext;

    #[test]
    fn uuid_generator_produces_distinct_tokens() {
        let generator = UuidTokenGenerator;
        let config = ProcessorConfig::new();
        let a = generator.generate(&config).unwrap();
        let b = generator.generate(&config).unwrap();
        assert_ne!(a.value().as_bytes(), b.value().as_bytes());
        assert_eq!(generator.name(), "uuid-token");
    }

    #[test]
    fn base64_processor_encodes_value() {
        let content = SecretContent::new(SecretValue::from_string("hello".into()));
        let encoded = Base64TargetProcessor
            .process(&content, None, &ProcessorConfig::new())
            .unwrap();
        assert_eq!(encoded, "aGVsbG8=");
    }

    #[test]
    fn registry_resolves_registered_group() {
        let registry = StaticGroupRegistry::new().with_group(
            "g1",
            Arc::new(UuidTokenGenerator),
            vec![TargetBinding::new("web", Arc::new(Base64TargetProcessor))],
        );
        assert!(registry.resolve_generator("g1").is_ok());
        let targets = registry.resolve_target_processors("g1").unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].target, "web");
    }

    #[test]
    fn registry_unknown_group_is_validation_error() {
        let registry = StaticGroupRegistry::new();
        let err = registry.resolve_generator("nope").err().unwrap();
        assert!(matches!(err, VaultError::Validation(_)), "got {err}");
    }

    #[test]
    fn target_order_is_preserved() {
        let processor: Arc<dyn TargetProcessor> = Arc::new(Base64TargetProcessor);
        let registry = StaticGroupRegistry::new().with_group(
            "g1",
            Arc::new(UuidTokenGenerator),
            vec![
                TargetBinding::new("web", Arc::clone(&processor)),
                TargetBinding::new("db", Arc::clone(&processor)),
                TargetBinding::new("batch", processor),
            ],
        );
        let targets: Vec<_> = registry
            .resolve_target_processors("g1")
            .unwrap()
            .into_iter()
            .map(|b| b.target)
            .collect();
        assert_eq!(targets, vec!["web", "db", "batch"]);
    }

    #[test]
    fn plaintext_decoder_wraps_raw_input() {
        let ctx = StaticAccessContext::guest();
        let content = PlaintextDecoder.decode(&ctx, "raw-secret").unwrap();
        assert_eq!(content.value().as_str(), Some("raw-secret"));
    }

    #[test]
    fn plaintext_decoder_rejects_empty_input() {
        let ctx = StaticAccessContext::guest();
        let err = PlaintextDecoder.decode(&ctx, "").unwrap_err();
        assert!(matches!(err, VaultError::Validation(_)), "got {err}");
    }
}

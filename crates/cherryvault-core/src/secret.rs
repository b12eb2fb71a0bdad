//! Secret value wrapper with automatic zeroing on drop.
//!
//! `SecretValue` wraps plaintext secret material in a `Zeroizing<Vec<u8>>`
//! that is cleared from memory when dropped. Debug and Display always show
//! `[REDACTED]`. `SecretContent` is the unit produced by generators and
//! accepted by imports: a value plus free-form string properties.

use std::collections::BTreeMap;
use std::fmt;

use zeroize::Zeroizing;

/// A secret value that is automatically zeroed from memory on drop.
pub struct SecretValue(Zeroizing<Vec<u8>>);

impl SecretValue {
    /// Create a `SecretValue` from raw bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(Zeroizing::new(data))
    }

    /// Create a `SecretValue` from a String, consuming the String.
    pub fn from_string(s: String) -> Self {
        Self(Zeroizing::new(s.into_bytes()))
    }

    /// Access the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Try to interpret the bytes as a UTF-8 string.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl Clone for SecretValue {
    fn clone(&self) -> Self {
        Self(Zeroizing::new(self.0.to_vec()))
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

// ---------------------------------------------------------------------------
// SecretContent
// ---------------------------------------------------------------------------

/// The product of secret generation or import: the plaintext material plus
/// free-form properties the target processors may consult.
#[derive(Debug, Clone)]
pub struct SecretContent {
    value: SecretValue,
    properties: BTreeMap<String, String>,
}

impl SecretContent {
    /// Wrap a secret value with no properties.
    pub fn new(value: SecretValue) -> Self {
        Self {
            value,
            properties: BTreeMap::new(),
        }
    }

    /// Wrap a secret value with properties.
    pub fn with_properties(value: SecretValue, properties: BTreeMap<String, String>) -> Self {
        Self { value, properties }
    }

    /// The plaintext secret material.
    pub fn value(&self) -> &SecretValue {
        &self.value
    }

    /// Properties attached by the producer.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_shows_redacted() {
        let secret = SecretValue::from_string("hunter2".into());
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
    }

    #[test]
    fn display_shows_redacted() {
        let secret = SecretValue::from_string("hunter2".into());
        assert_eq!(format!("{secret}"), "[REDACTED]");
    }

    #[test]
    fn as_bytes_returns_content() {
        let secret = SecretValue::new(vec![1, 2, 3]);
        assert_eq!(secret.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn as_str_returns_content() {
        let secret = SecretValue::from_string("hello".into());
        assert_eq!(secret.as_str(), Some("hello"));
    }

    #[test]
    fn as_str_invalid_utf8_returns_none() {
        let secret = SecretValue::new(vec![0xFF, 0xFE]);
        assert!(secret.as_str().is_none());
    }

    #[test]
    fn clone_preserves_content() {
        let secret = SecretValue::from_string("my-secret".into());
        let copy = secret.clone();
        assert_eq!(copy.as_bytes(), secret.as_bytes());
    }

    #[test]
    fn content_debug_is_redacted() {
        let content = SecretContent::new(SecretValue::from_string("hunter2".into()));
        let dbg = format!("{content:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn content_carries_properties() {
        let mut props = BTreeMap::new();
        props.insert("cipher".into(), "none".into());
        let content =
            SecretContent::with_properties(SecretValue::from_string("s".into()), props);
        assert_eq!(content.properties()["cipher"], "none");
        assert_eq!(content.value().as_str(), Some("s"));
    }
}

//! Compound secret addressing and request parameter translation.
//!
//! External callers address an encoded copy as `"<secretId>:<target>"`.
//! Generic request parameters follow an underscore convention: plain keys
//! become `meta` entries verbatim, single-`_` keys are control parameters
//! (consumed, never stored), and `__`-prefixed keys have one underscore
//! stripped and land in `meta` — the escape hatch for meta keys that
//! collide with control-parameter names.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::VaultError;

// ---------------------------------------------------------------------------
// Compound address
// ---------------------------------------------------------------------------

/// A parsed `secretId:target` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretAddress {
    pub secret_id: String,
    pub target: String,
}

impl SecretAddress {
    /// Split on the first `:`. The secret id must be non-empty; the target
    /// may be empty only via a literal trailing colon.
    pub fn parse(raw: &str) -> Result<Self, VaultError> {
        let Some((secret_id, target)) = raw.split_once(':') else {
            return Err(VaultError::validation(format!(
                "address '{raw}' must have the form <secretId>:<target>"
            )));
        };
        if secret_id.is_empty() {
            return Err(VaultError::validation(
                "address has an empty secret id".to_owned(),
            ));
        }
        Ok(Self {
            secret_id: secret_id.to_owned(),
            target: target.to_owned(),
        })
    }
}

impl std::fmt::Display for SecretAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.secret_id, self.target)
    }
}

// ---------------------------------------------------------------------------
// Request parameter translation
// ---------------------------------------------------------------------------

/// Control parameter: the group to create under.
pub const PARAM_GROUP: &str = "_group";
/// Control parameter: raw secret material for imports.
pub const PARAM_SECRET: &str = "_secret";
/// Control parameter: an explicit secret id.
pub const PARAM_SECRET_ID: &str = "_secretId";
/// Control parameter: validity window start.
pub const PARAM_VALID_FROM: &str = "_validFrom";
/// Control parameter: validity window end.
pub const PARAM_VALID_TO: &str = "_validTo";

/// The lifecycle-service configuration extracted from a generic parameter
/// map. Control keys are consumed; everything else becomes `meta`.
#[derive(Debug, Clone, Default)]
pub struct RequestTranslation {
    pub group: Option<String>,
    pub secret: Option<String>,
    pub secret_id: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub meta: BTreeMap<String, String>,
}

impl RequestTranslation {
    /// Translate a generic key/value parameter map.
    pub fn from_params<I>(params: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut out = Self::default();
        for (key, value) in params {
            if let Some(stripped) = key.strip_prefix("__") {
                // One leading underscore stripped, stored verbatim.
                out.meta.insert(format!("_{stripped}"), value);
            } else if key.starts_with('_') {
                match key.as_str() {
                    PARAM_GROUP => out.group = Some(value),
                    PARAM_SECRET => out.secret = Some(value),
                    PARAM_SECRET_ID => out.secret_id = Some(value),
                    PARAM_VALID_FROM => out.valid_from = parse_date(&value),
                    PARAM_VALID_TO => out.valid_to = parse_date(&value),
                    _ => tracing::debug!(%key, "ignoring unknown control parameter"),
                }
            } else {
                out.meta.insert(key, value);
            }
        }
        out
    }
}

/// Parse the documented request date formats: RFC 3339, or a bare
/// `YYYY-MM-DD` taken as midnight UTC. Anything else resolves to no bound.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    None
}

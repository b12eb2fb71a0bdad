//! Caller access context and read-rule evaluation.
//!
//! Every operation that needs the caller's identity takes an explicit
//! [`AccessContext`] — there is no process-wide "current caller" lookup.
//! A read ACL is an ordered list of rule strings; a context must satisfy
//! at least one rule to be granted access. The rule language is not fixed
//! beyond that boolean contract; the shipped [`StaticAccessContext`]
//! matches rules as glob patterns against its granted claims.

use std::fmt;

use glob_match::glob_match;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Context trait
// ---------------------------------------------------------------------------

/// The caller's access context, resolved by an outer authentication layer
/// and passed explicitly into every read and destructive operation.
pub trait AccessContext: fmt::Debug + Send + Sync {
    /// Identity label used in audit events. Never secret material.
    fn principal(&self) -> &str;

    /// Whether this context may perform destructive operations
    /// (e.g. removing key-source entries), irrespective of any read ACL.
    fn is_elevated(&self) -> bool;

    /// Whether this context satisfies at least one rule in the list.
    /// An empty rule list grants nothing.
    fn has_access(&self, rules: &[String]) -> bool;
}

// ---------------------------------------------------------------------------
// Static context
// ---------------------------------------------------------------------------

/// A context carrying a fixed set of granted claims (e.g. `"role:ops"`).
/// Each ACL rule is treated as a glob pattern; one matching claim grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticAccessContext {
    principal: String,
    claims: Vec<String>,
    elevated: bool,
}

impl StaticAccessContext {
    /// A regular context with the given claims.
    pub fn new(principal: impl Into<String>, claims: Vec<String>) -> Self {
        Self {
            principal: principal.into(),
            claims,
            elevated: false,
        }
    }

    /// An elevated (admin-mode) context with the given claims.
    pub fn elevated(principal: impl Into<String>, claims: Vec<String>) -> Self {
        Self {
            principal: principal.into(),
            claims,
            elevated: true,
        }
    }

    /// The anonymous fallback context: no claims, not elevated.
    pub fn guest() -> Self {
        Self::new("guest", vec![])
    }
}

impl AccessContext for StaticAccessContext {
    fn principal(&self) -> &str {
        &self.principal
    }

    fn is_elevated(&self) -> bool {
        self.elevated
    }

    fn has_access(&self, rules: &[String]) -> bool {
        rules
            .iter()
            .any(|rule| self.claims.iter().any(|claim| glob_match(rule, claim)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_has_no_access() {
        let ctx = StaticAccessContext::guest();
        assert_eq!(ctx.principal(), "guest");
        assert!(!ctx.is_elevated());
        assert!(!ctx.has_access(&["role:ops".into()]));
    }

    #[test]
    fn exact_claim_grants() {
        let ctx = StaticAccessContext::new("alice", vec!["role:ops".into()]);
        assert!(ctx.has_access(&["role:ops".into()]));
        assert!(!ctx.has_access(&["role:admin".into()]));
    }

    #[test]
    fn any_rule_suffices() {
        let ctx = StaticAccessContext::new("alice", vec!["role:dev".into()]);
        assert!(ctx.has_access(&["role:ops".into(), "role:dev".into()]));
    }

    #[test]
    fn glob_rule_matches_claims() {
        let ctx = StaticAccessContext::new("bot", vec!["service:billing".into()]);
        assert!(ctx.has_access(&["service:*".into()]));
        assert!(!ctx.has_access(&["user:*".into()]));
    }

    #[test]
    fn empty_rule_list_grants_nothing() {
        let ctx = StaticAccessContext::elevated("root", vec!["role:ops".into()]);
        assert!(!ctx.has_access(&[]));
    }

    #[test]
    fn elevated_flag_is_independent_of_claims() {
        let ctx = StaticAccessContext::elevated("root", vec![]);
        assert!(ctx.is_elevated());
        assert!(!ctx.has_access(&["role:ops".into()]));
    }
}

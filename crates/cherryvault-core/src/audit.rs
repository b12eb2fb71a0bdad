//! Audit event model and emission.
//!
//! The lifecycle service emits one structured event per state-changing
//! operation and per denied read. Events carry names and identifiers only —
//! secret values NEVER appear in audit events.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Audit event kind
// ---------------------------------------------------------------------------

/// The kind of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    /// A new secret was generated and stored.
    SecretCreated,

    /// New versions were generated for an existing secret id.
    SecretUpdated,

    /// Caller-supplied secret material was stored as a new secret.
    SecretImported,

    /// A secret's entries were soft-deleted.
    SecretDeleted,

    /// A secret's entries were restored.
    SecretUndeleted,

    /// An encoded copy was handed out.
    SecretRead,

    /// A read or destructive operation was denied.
    AccessDenied,
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SecretCreated => "secret.created",
            Self::SecretUpdated => "secret.updated",
            Self::SecretImported => "secret.imported",
            Self::SecretDeleted => "secret.deleted",
            Self::SecretUndeleted => "secret.undeleted",
            Self::SecretRead => "secret.read",
            Self::AccessDenied => "access.denied",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AuditEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "secret.created" => Ok(Self::SecretCreated),
            "secret.updated" => Ok(Self::SecretUpdated),
            "secret.imported" => Ok(Self::SecretImported),
            "secret.deleted" => Ok(Self::SecretDeleted),
            "secret.undeleted" => Ok(Self::SecretUndeleted),
            "secret.read" => Ok(Self::SecretRead),
            "access.denied" => Ok(Self::AccessDenied),
            _ => Err(format!("unknown audit event kind: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Audit event
// ---------------------------------------------------------------------------

/// A structured audit event. Identifiers and names only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event identifier.
    pub event_id: Uuid,

    /// Monotonically increasing sequence number assigned by the emitter.
    pub sequence_number: u64,

    /// UTC timestamp in milliseconds since epoch.
    pub ts_utc_ms: i64,

    /// The kind of event.
    pub kind: AuditEventKind,

    /// The acting caller's principal label.
    pub principal: Option<String>,

    /// The secret identity involved.
    pub secret_id: Option<String>,

    /// The target involved, for per-target operations.
    pub target: Option<String>,

    /// The group involved.
    pub group: Option<String>,

    /// Human-readable detail (never secret material).
    pub detail: Option<String>,
}

impl AuditEvent {
    /// Create a new event of the given kind; id and timestamp are set
    /// automatically, the sequence number by the emitter.
    pub fn new(kind: AuditEventKind) -> Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();

        Self {
            event_id: Uuid::new_v4(),
            sequence_number: 0,
            ts_utc_ms: now.as_millis() as i64,
            kind,
            principal: None,
            secret_id: None,
            target: None,
            group: None,
            detail: None,
        }
    }

    /// Set the acting principal.
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// Set the secret identity.
    pub fn with_secret_id(mut self, secret_id: impl Into<String>) -> Self {
        self.secret_id = Some(secret_id.into());
        self
    }

    /// Set the target.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Set the group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set a detail message.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Audit sink trait
// ---------------------------------------------------------------------------

/// Trait for emitting audit events. Implementations must not block.
pub trait AuditSink: Send + Sync + fmt::Debug {
    /// Emit an audit event.
    fn emit(&self, event: AuditEvent);
}

// ---------------------------------------------------------------------------
// In-memory emitter (testing)
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct InMemoryAuditState {
    events: Vec<AuditEvent>,
    next_sequence: u64,
}

/// An in-memory audit emitter storing events behind a mutex, with
/// monotonically increasing sequence numbers. Useful for testing.
#[derive(Debug, Clone)]
pub struct InMemoryAuditEmitter {
    state: std::sync::Arc<std::sync::Mutex<InMemoryAuditState>>,
}

impl InMemoryAuditEmitter {
    /// Create a new empty emitter.
    pub fn new() -> Self {
        Self {
            state: std::sync::Arc::new(std::sync::Mutex::new(InMemoryAuditState {
                events: Vec::new(),
                next_sequence: 0,
            })),
        }
    }

    /// Snapshot of all emitted events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.state
            .lock()
            .expect("audit mutex poisoned")
            .events
            .clone()
    }

    /// Number of emitted events.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .expect("audit mutex poisoned")
            .events
            .len()
    }

    /// Whether any events have been emitted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events of a specific kind.
    pub fn events_of_kind(&self, kind: AuditEventKind) -> Vec<AuditEvent> {
        self.state
            .lock()
            .expect("audit mutex poisoned")
            .events
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

impl Default for InMemoryAuditEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for InMemoryAuditEmitter {
    fn emit(&self, mut event: AuditEvent) {
        let mut state = self.state.lock().expect("audit mutex poisoned");
        event.sequence_number = state.next_sequence;
        state.next_sequence += 1;
        state.events.push(event);
    }
}

// ---------------------------------------------------------------------------
// Tracing emitter
// ---------------------------------------------------------------------------

/// An audit emitter that logs events via the `tracing` crate.
#[derive(Debug)]
pub struct TracingAuditEmitter {
    next_sequence: AtomicU64,
}

impl TracingAuditEmitter {
    /// Create a new tracing audit emitter.
    pub fn new() -> Self {
        Self {
            next_sequence: AtomicU64::new(0),
        }
    }
}

impl Default for TracingAuditEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for TracingAuditEmitter {
    fn emit(&self, mut event: AuditEvent) {
        event.sequence_number = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            event_id = %event.event_id,
            sequence_number = event.sequence_number,
            kind = %event.kind,
            principal = ?event.principal,
            secret_id = ?event.secret_id,
            target = ?event.target,
            group = ?event.group,
            "audit event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let event = AuditEvent::new(AuditEventKind::SecretCreated)
            .with_principal("alice")
            .with_secret_id("id1")
            .with_target("web")
            .with_group("g1")
            .with_detail("two targets");
        assert_eq!(event.kind, AuditEventKind::SecretCreated);
        assert_eq!(event.principal.as_deref(), Some("alice"));
        assert_eq!(event.secret_id.as_deref(), Some("id1"));
        assert_eq!(event.target.as_deref(), Some("web"));
        assert_eq!(event.group.as_deref(), Some("g1"));
        assert_eq!(event.detail.as_deref(), Some("two targets"));
    }

    #[test]
    fn kind_display_from_str_round_trip() {
        let kinds = [
            AuditEventKind::SecretCreated,
            AuditEventKind::SecretUpdated,
            AuditEventKind::SecretImported,
            AuditEventKind::SecretDeleted,
            AuditEventKind::SecretUndeleted,
            AuditEventKind::SecretRead,
            AuditEventKind::AccessDenied,
        ];
        for kind in kinds {
            let parsed: AuditEventKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("nonexistent.kind".parse::<AuditEventKind>().is_err());
    }

    #[test]
    fn in_memory_emitter_collects() {
        let emitter = InMemoryAuditEmitter::new();
        assert!(emitter.is_empty());

        emitter.emit(AuditEvent::new(AuditEventKind::SecretCreated));
        emitter.emit(AuditEvent::new(AuditEventKind::AccessDenied));
        emitter.emit(AuditEvent::new(AuditEventKind::SecretRead));

        assert_eq!(emitter.len(), 3);
        assert_eq!(emitter.events_of_kind(AuditEventKind::AccessDenied).len(), 1);
    }

    #[test]
    fn sequence_numbers_monotonic() {
        let emitter = InMemoryAuditEmitter::new();
        for _ in 0..5 {
            emitter.emit(AuditEvent::new(AuditEventKind::SecretRead));
        }
        for (i, event) in emitter.events().iter().enumerate() {
            assert_eq!(event.sequence_number, i as u64);
        }
    }

    #[test]
    fn tracing_emitter_assigns_sequence_numbers() {
        let emitter = TracingAuditEmitter::new();
        emitter.emit(AuditEvent::new(AuditEventKind::SecretCreated));
        emitter.emit(AuditEvent::new(AuditEventKind::SecretDeleted));
        assert_eq!(emitter.next_sequence.load(Ordering::Relaxed), 2);
    }
}

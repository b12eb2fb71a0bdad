pub mod backend;
pub mod entry_store;
pub mod groups;
pub mod service;
pub mod source;

pub use backend::{EntryBackend, MemoryEntryBackend, StoredEntry};
pub use entry_store::VaultEntryStore;
pub use service::CherryVault;
pub use source::{FileVaultSource, MemoryVaultSource, SourceCapability, VaultKey, VaultSource};

pub mod access;
pub mod address;
pub mod audit;
pub mod checksum;
pub mod entry;
pub mod error;
pub mod secret;

pub use entry::{EntryDraft, VaultEntry};
pub use error::VaultError;
pub use secret::{SecretContent, SecretValue};

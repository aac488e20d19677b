//! Credential persistence for the Dentalink session core.
//!
//! This crate provides:
//! - A `SecureStorage` trait over simple string key-value backends
//! - A file-backed implementation with atomic whole-file writes
//! - `CredentialStore`, the high-level API the session layer uses for
//!   token pairs, the cached user record, and the biometric flag

mod credentials;
mod file;
mod keys;
mod traits;

pub use credentials::CredentialStore;
pub use file::FileStorage;
pub use keys::StorageKeys;
pub use traits::SecureStorage;

use thiserror::Error;

/// Error type for storage operations.
///
/// Medium failures (`Platform`, `Io`) are distinct from every network
/// error class so callers can tell "the disk failed" apart from
/// "the server said no". Missing keys are not errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Storage-medium error
    #[error("Storage medium error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

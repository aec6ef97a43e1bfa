//! Error types for the sealtrail audit subsystem.
//!
//! All fallible operations return `SealResult<T>`.  Integrity violations
//! (a broken chain, a forged token) are deliberately absent from this enum:
//! they are expected outcomes and are reported as data by the verifier.

use thiserror::Error;

/// The unified error type for the sealtrail crates.
#[derive(Debug, Error)]
pub enum SealError {
    /// A required configuration value is missing or unusable.
    ///
    /// Raised for an empty or absent secret key when ephemeral key
    /// generation is not acceptable, and for malformed config files.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A persisted record could not be parsed, or the store ends in a torn
    /// record when read under the writer lock.
    ///
    /// `offset` is the byte offset at which the offending record starts.
    #[error("corrupted store at byte offset {offset}: {reason}")]
    CorruptedStore { offset: u64, reason: String },

    /// The backing store could not be opened, read, written, or flushed.
    #[error("storage error: {reason}")]
    StorageError { reason: String },

    /// The exclusive writer lock could not be acquired.
    #[error("lock error: {reason}")]
    LockError { reason: String },

    /// A value could not be encoded into its canonical form.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

impl SealError {
    /// True for errors that mean the store exists but cannot be trusted to
    /// parse, as opposed to an empty or unreachable store.
    pub fn is_corruption(&self) -> bool {
        matches!(self, SealError::CorruptedStore { .. })
    }
}

/// Convenience alias used throughout the sealtrail crates.
pub type SealResult<T> = Result<T, SealError>;

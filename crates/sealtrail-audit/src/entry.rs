//! Chained entry and export types.
//!
//! `ChainedEntry` is a single record in the hash chain.  It embeds the
//! consent token that authorized the operation and the SHA-256 hashes that
//! make tampering detectable.  `TrailExport` is a sealed snapshot of a whole
//! trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sealtrail_contracts::{
    error::{SealError, SealResult},
    token::{ConsentToken, Payload},
};

use crate::chain::hash_entry;

/// Operation name of the synthetic first record.
pub const GENESIS_OPERATION: &str = "genesis";

/// Subject of the genesis record's consent token.
pub const GENESIS_SUBJECT: &str = "system";

/// A single record in an audit trail's SHA-256 hash chain.
///
/// Each entry commits to the previous entry via `previous_hash`.  Modifying
/// any field, including any field of the embedded token, invalidates
/// `entry_hash` and every later `previous_hash`.
///
/// Fields are crate-private: entries are created only by
/// `AuditTrail::append` (or parsed back from a store) and expose read-only
/// accessors, so no public API path mutates a persisted entry.
///
/// The serialized field names are the durable on-disk contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainedEntry {
    pub(crate) sequence_number: u64,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) operation: String,
    pub(crate) payload: Payload,
    pub(crate) consent_token: ConsentToken,
    pub(crate) previous_hash: String,
    pub(crate) entry_hash: String,
}

impl ChainedEntry {
    /// The sentinel `previous_hash` of the genesis entry.
    ///
    /// 64 hex zeros, a value that can never be the SHA-256 of real data,
    /// making genesis detection unambiguous.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";

    /// Build an entry and compute its `entry_hash`.
    pub(crate) fn seal(
        sequence_number: u64,
        timestamp: DateTime<Utc>,
        operation: &str,
        payload: Payload,
        consent_token: ConsentToken,
        previous_hash: String,
    ) -> SealResult<Self> {
        let entry_hash = hash_entry(
            sequence_number,
            &timestamp,
            operation,
            &payload,
            &consent_token,
            &previous_hash,
        )?;

        Ok(Self {
            sequence_number,
            timestamp,
            operation: operation.to_string(),
            payload,
            consent_token,
            previous_hash,
            entry_hash,
        })
    }

    /// 0-based position in the chain.
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Wall-clock time (UTC) the entry was appended.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn consent_token(&self) -> &ConsentToken {
        &self.consent_token
    }

    /// `entry_hash` of the predecessor, or `GENESIS_HASH` for entry 0.
    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    /// The stored hash of this entry.
    pub fn entry_hash(&self) -> &str {
        &self.entry_hash
    }

    /// True if this is the chain's first record.
    pub fn is_genesis(&self) -> bool {
        self.sequence_number == 0 && self.previous_hash == Self::GENESIS_HASH
    }

    /// Recompute the hash from this entry's fields.
    ///
    /// Equals `entry_hash()` for every untampered entry.
    pub fn recompute_hash(&self) -> SealResult<String> {
        hash_entry(
            self.sequence_number,
            &self.timestamp,
            &self.operation,
            &self.payload,
            &self.consent_token,
            &self.previous_hash,
        )
    }

    /// Serialize to a single newline-free JSON record.
    pub fn to_record(&self) -> SealResult<String> {
        serde_json::to_string(self).map_err(|e| SealError::Serialization {
            reason: format!("failed to serialize entry {}: {}", self.sequence_number, e),
        })
    }

    /// Parse one persisted record.  `offset` is only used for error context.
    pub fn from_record(record: &str, offset: u64) -> SealResult<Self> {
        serde_json::from_str(record).map_err(|e| SealError::CorruptedStore {
            offset,
            reason: format!("record is not a well-formed entry: {}", e),
        })
    }
}

/// A sealed snapshot of an audit trail.
///
/// Produced by `AuditTrail::export()`.  The `terminal_hash` is the
/// `entry_hash` of the last entry and can be used as a compact commitment to
/// the entire trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailExport {
    /// All entries in chain order (sequence 0 first).
    pub entries: Vec<ChainedEntry>,

    /// Wall-clock time (UTC) the snapshot was taken.
    pub exported_at: DateTime<Utc>,

    /// The `entry_hash` of the last entry.  Empty string if there are none.
    pub terminal_hash: String,
}

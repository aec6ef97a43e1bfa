//! Hash-chain primitives.
//!
//! Every field that contributes to an entry's hash is listed explicitly so
//! nothing is accidentally omitted.
//!
//! Hash input: the canonical JSON (sorted keys, no whitespace) of an object
//! with exactly these members:
//!
//!   `sequence_number`, `timestamp`, `operation`, `payload`,
//!   `consent_token` (all six token fields, including `signature`),
//!   `previous_hash`
//!
//! Because keys are sorted, the digest is independent of field declaration
//! order and of payload map insertion order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use sealtrail_contracts::{
    canonical::canonical_json,
    error::SealResult,
    token::{ConsentToken, Payload},
};

#[derive(Serialize)]
struct HashedFields<'a> {
    sequence_number: u64,
    timestamp: &'a DateTime<Utc>,
    operation: &'a str,
    payload: &'a Payload,
    consent_token: &'a ConsentToken,
    previous_hash: &'a str,
}

/// Compute the SHA-256 hash for a single chained entry.
///
/// Returns a lowercase 64-character hex string.
pub fn hash_entry(
    sequence_number: u64,
    timestamp: &DateTime<Utc>,
    operation: &str,
    payload: &Payload,
    consent_token: &ConsentToken,
    previous_hash: &str,
) -> SealResult<String> {
    let canonical = canonical_json(&HashedFields {
        sequence_number,
        timestamp,
        operation,
        payload,
        consent_token,
        previous_hash,
    })?;

    Ok(hex::encode(Sha256::digest(&canonical)))
}

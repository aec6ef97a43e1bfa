//! Verification results.
//!
//! Integrity violations are expected, actionable outcomes, so they are
//! returned as data rather than errors.  Chain and token results are kept in
//! separate reports: a broken chain points at file-level damage or deletion,
//! a bad token at forged authorization on an otherwise well-formed entry.

use std::fmt;

use serde::Serialize;

/// Which chain check an entry failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// `sequence_number` differs from the entry's position.
    SequenceGap,
    /// The recomputed hash differs from the stored `entry_hash`.
    HashMismatch,
    /// `previous_hash` differs from the predecessor's `entry_hash` (or from
    /// the sentinel, for the first entry).
    BrokenLinkage,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::SequenceGap => "sequence gap",
            FailureKind::HashMismatch => "hash mismatch",
            FailureKind::BrokenLinkage => "broken linkage",
        };
        f.write_str(s)
    }
}

/// The first chain failure found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityFailure {
    /// 0-based position of the offending entry.
    pub index: u64,
    pub kind: FailureKind,
    /// Human-readable description naming the entry.
    pub message: String,
}

/// Outcome of a chain verification pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    /// True only if every entry passed every check.
    pub is_valid: bool,
    /// Entries examined before the walk stopped.
    pub entries_checked: u64,
    /// The failure that stopped the walk.  `None` when valid.
    pub failure: Option<IntegrityFailure>,
}

impl ChainReport {
    pub(crate) fn valid(entries_checked: u64) -> Self {
        Self { is_valid: true, entries_checked, failure: None }
    }

    pub(crate) fn invalid(entries_checked: u64, failure: IntegrityFailure) -> Self {
        Self { is_valid: false, entries_checked, failure: Some(failure) }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.message.as_str())
    }

    pub fn failed_index(&self) -> Option<u64> {
        self.failure.as_ref().map(|f| f.index)
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }
}

/// Outcome of a token verification pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenReport {
    pub entries_checked: u64,
    /// Positions of entries whose consent token failed verification, in order.
    pub invalid_indices: Vec<u64>,
}

impl TokenReport {
    pub fn all_valid(&self) -> bool {
        self.invalid_indices.is_empty()
    }
}

/// Both independent checks over one trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub chain: ChainReport,
    pub tokens: TokenReport,
}

impl AuditReport {
    /// True only when the chain is intact AND every token verifies.
    pub fn is_trusted(&self) -> bool {
        self.chain.is_valid && self.tokens.all_valid()
    }
}

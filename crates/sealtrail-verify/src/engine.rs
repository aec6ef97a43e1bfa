//! Integrity verifier for sealtrail audit trails.
//!
//! Two independent passes:
//!
//! 1. **Chain**: for every entry `i`, in order, check
//!    (a) `sequence_number == i`,
//!    (b) the recomputed hash equals the stored `entry_hash`,
//!    (c) `previous_hash` equals entry `i - 1`'s `entry_hash`, or the
//!    genesis sentinel for `i == 0`.
//!    The walk stops at the first failure; no partial recovery is attempted.
//! 2. **Tokens**: every entry's consent token is checked against the
//!    authority.  All failures are collected.
//!
//! A forger who rewrites a token and then recomputes the entry hash passes
//! pass 1 but not pass 2, so both must run for full coverage.
//!
//! Entries are streamed; memory use does not grow with trail length.

use tracing::{debug, info, warn};

use sealtrail_audit::{AuditTrail, ChainedEntry};
use sealtrail_contracts::error::SealResult;
use sealtrail_core::traits::ConsentVerifier;

use crate::report::{AuditReport, ChainReport, FailureKind, IntegrityFailure, TokenReport};

/// Certifies that an audit trail has not been tampered with.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntegrityVerifier;

impl IntegrityVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Verify the hash chain of `trail`.
    ///
    /// Returns `Err` only when the store cannot be read (I/O failure or a
    /// record that does not parse); tampering is reported in the
    /// `ChainReport`.
    pub fn verify(&self, trail: &AuditTrail) -> SealResult<ChainReport> {
        let report = self.verify_stream(trail.stream()?)?;
        self.log_chain(&trail.describe(), &report);
        Ok(report)
    }

    /// Verify an already loaded sequence of entries, e.g. a `TrailExport`.
    pub fn verify_entries(&self, entries: &[ChainedEntry]) -> SealResult<ChainReport> {
        let report = self.verify_stream(entries.iter().cloned().map(Ok))?;
        self.log_chain("<entries>", &report);
        Ok(report)
    }

    /// Check every entry's consent token against `authority`.
    ///
    /// Returns the positions of entries whose token does not verify, in
    /// order.  Independent of the chain check.
    pub fn verify_tokens(
        &self,
        trail: &AuditTrail,
        authority: &dyn ConsentVerifier,
    ) -> SealResult<Vec<u64>> {
        Ok(self.token_report(trail, authority)?.invalid_indices)
    }

    /// Run both checks and report them separately.
    pub fn audit(
        &self,
        trail: &AuditTrail,
        authority: &dyn ConsentVerifier,
    ) -> SealResult<AuditReport> {
        let chain = self.verify(trail)?;
        let tokens = self.token_report(trail, authority)?;
        let report = AuditReport { chain, tokens };

        if report.is_trusted() {
            info!(store = %trail.describe(), "audit trail trusted");
        } else {
            warn!(
                store = %trail.describe(),
                chain_valid = report.chain.is_valid,
                invalid_tokens = report.tokens.invalid_indices.len(),
                "audit trail NOT trusted"
            );
        }
        Ok(report)
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    fn verify_stream<I>(&self, entries: I) -> SealResult<ChainReport>
    where
        I: IntoIterator<Item = SealResult<ChainedEntry>>,
    {
        let mut expected_previous = ChainedEntry::GENESIS_HASH.to_string();
        let mut checked: u64 = 0;

        for entry in entries {
            let entry = entry?;
            let index = checked;
            checked += 1;

            if let Some(failure) = check_entry(index, &entry, &expected_previous)? {
                return Ok(ChainReport::invalid(checked, failure));
            }
            expected_previous = entry.entry_hash().to_string();
        }

        Ok(ChainReport::valid(checked))
    }

    fn token_report(
        &self,
        trail: &AuditTrail,
        authority: &dyn ConsentVerifier,
    ) -> SealResult<TokenReport> {
        let mut invalid_indices = Vec::new();
        let mut checked: u64 = 0;

        for entry in trail.stream()? {
            let entry = entry?;
            let index = checked;
            checked += 1;

            if !authority.verify(entry.consent_token()) {
                warn!(
                    index,
                    operation = %entry.operation(),
                    subject = %entry.consent_token().subject,
                    "consent token failed verification"
                );
                invalid_indices.push(index);
            }
        }

        debug!(
            store = %trail.describe(),
            entries_checked = checked,
            invalid = invalid_indices.len(),
            "token verification complete"
        );
        Ok(TokenReport { entries_checked: checked, invalid_indices })
    }

    fn log_chain(&self, store: &str, report: &ChainReport) {
        match &report.failure {
            None => info!(store, entries_checked = report.entries_checked, "hash chain valid"),
            Some(failure) => warn!(
                store,
                index = failure.index,
                kind = %failure.kind,
                message = %failure.message,
                "hash chain verification failed"
            ),
        }
    }
}

/// Run the three chain checks on one entry, in order.
fn check_entry(
    index: u64,
    entry: &ChainedEntry,
    expected_previous: &str,
) -> SealResult<Option<IntegrityFailure>> {
    if entry.sequence_number() != index {
        return Ok(Some(IntegrityFailure {
            index,
            kind: FailureKind::SequenceGap,
            message: format!(
                "entry {} has sequence number {}, expected {}",
                index,
                entry.sequence_number(),
                index
            ),
        }));
    }

    let recomputed = entry.recompute_hash()?;
    if recomputed != entry.entry_hash() {
        return Ok(Some(IntegrityFailure {
            index,
            kind: FailureKind::HashMismatch,
            message: format!("hash mismatch at entry {}", index),
        }));
    }

    if entry.previous_hash() != expected_previous {
        let expected = if index == 0 { "the genesis sentinel" } else { "its predecessor's hash" };
        return Ok(Some(IntegrityFailure {
            index,
            kind: FailureKind::BrokenLinkage,
            message: format!(
                "chain broken at entry {}: previous_hash does not match {}",
                index, expected
            ),
        }));
    }

    Ok(None)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

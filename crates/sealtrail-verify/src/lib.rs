//! # sealtrail-verify
//!
//! Tamper detection for sealtrail audit trails.
//!
//! This crate provides [`engine::IntegrityVerifier`], which runs two
//! independent checks:
//!
//! 1. **Chain**: sequence numbering, per-entry hash, and linkage to the
//!    predecessor, stopping at the first failure.
//! 2. **Tokens**: every embedded consent token against the authority's key.
//!
//! Results are data ([`ChainReport`], [`AuditReport`]), never errors.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use sealtrail_verify::IntegrityVerifier;
//!
//! let verifier = IntegrityVerifier::new();
//! let report = verifier.audit(&trail, &authority)?;
//! if !report.is_trusted() {
//!     eprintln!("{:?} / invalid tokens at {:?}",
//!         report.chain.failure_reason(), report.tokens.invalid_indices);
//! }
//! ```

pub mod engine;
pub mod report;

pub use engine::IntegrityVerifier;
pub use report::{AuditReport, ChainReport, FailureKind, IntegrityFailure, TokenReport};

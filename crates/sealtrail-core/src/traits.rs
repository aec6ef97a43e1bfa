//! Core trait definitions for the sealtrail subsystem.
//!
//! Two traits define the trust boundary around consent tokens:
//!
//! - `ConsentIssuer`: mints signed tokens for operations
//! - `ConsentVerifier`: checks a token against the key that signed it
//!
//! Both are implemented by `ConsentTokenAuthority` in `sealtrail-consent`.
//! They are split so a read-only auditor can be handed verification power
//! without also being able to issue.

use sealtrail_contracts::{
    error::SealResult,
    token::{ConsentToken, HumanApproval},
};

/// Issues signed consent tokens.
///
/// Implementations are **trusted** and hold a secret key.  Issuing performs
/// no I/O and never blocks.
pub trait ConsentIssuer: Send + Sync {
    /// Issue a token for `operation`, timestamped now.
    ///
    /// Fails only if the token cannot be canonically encoded; an unusable
    /// key is rejected when the issuer is constructed, not here.
    fn issue(
        &self,
        operation: &str,
        ethics_verified: bool,
        human_approval: Option<HumanApproval>,
        subject: &str,
    ) -> SealResult<ConsentToken>;
}

/// Verifies consent tokens.
///
/// Verification is pure: it returns `false` for any token whose signature
/// does not match the recomputed tag, whether the signature itself or any
/// signed field was altered.
pub trait ConsentVerifier: Send + Sync {
    /// Return true only if `token.signature` authenticates every other field.
    fn verify(&self, token: &ConsentToken) -> bool;
}

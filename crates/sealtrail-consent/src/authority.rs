//! The consent token authority.
//!
//! `ConsentTokenAuthority` holds one secret key for its lifetime and uses it
//! to sign and verify `ConsentToken`s with HMAC-SHA256 over the token's
//! canonical message.  It has no other state and performs no I/O after
//! construction.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use sealtrail_contracts::{
    error::{SealError, SealResult},
    token::{ConsentToken, HumanApproval},
};
use sealtrail_core::traits::{ConsentIssuer, ConsentVerifier};

use crate::key::{AuthorityConfig, KeySource};

type HmacSha256 = Hmac<Sha256>;

/// Length in bytes of an HMAC-SHA256 tag.
pub const SIGNATURE_LEN: usize = 32;

/// Issues and verifies HMAC-SHA256 signed consent tokens.
///
/// Construct one explicitly and pass it to whatever needs it; tests use a
/// distinct key per authority.
///
/// ```rust,ignore
/// let authority = ConsentTokenAuthority::new(b"trust-root".to_vec())?;
/// let token = authority.issue("data_write", true, Some(true.into()), "alice")?;
/// assert!(authority.verify(&token));
/// ```
pub struct ConsentTokenAuthority {
    key: Vec<u8>,
    source: KeySource,
}

impl std::fmt::Debug for ConsentTokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsentTokenAuthority")
            .field("key", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

impl ConsentTokenAuthority {
    /// Create an authority from explicit key material.
    ///
    /// Returns `SealError::ConfigError` if `key` is empty.
    pub fn new(key: impl Into<Vec<u8>>) -> SealResult<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(SealError::ConfigError {
                reason: "consent key must not be empty".to_string(),
            });
        }
        Ok(Self { key, source: KeySource::Explicit })
    }

    /// Create an authority from configuration, falling back through the
    /// key-file, environment, and ephemeral sources.
    pub fn from_config(config: &AuthorityConfig) -> SealResult<Self> {
        let resolved = config.resolve()?;
        Ok(Self { key: resolved.material, source: resolved.source })
    }

    /// Create an authority from `SEALTRAIL_TRUST_ROOT_KEY`, or an ephemeral
    /// key when the variable is unset.
    pub fn from_env() -> SealResult<Self> {
        Self::from_config(&AuthorityConfig::default())
    }

    /// Where this authority's key came from.
    pub fn key_source(&self) -> &KeySource {
        &self.source
    }

    /// Issue a signed token for `operation`, timestamped now.
    pub fn issue(
        &self,
        operation: &str,
        ethics_verified: bool,
        human_approval: Option<HumanApproval>,
        subject: &str,
    ) -> SealResult<ConsentToken> {
        let mut token = ConsentToken {
            operation: operation.to_string(),
            ethics_verified,
            human_approval,
            issued_at: Utc::now(),
            subject: subject.to_string(),
            signature: String::new(),
        };

        let tag = self.sign(&token.canonical_message()?)?;
        token.signature = hex::encode(tag);

        debug!(
            operation = %token.operation,
            subject = %token.subject,
            ethics_verified = token.ethics_verified,
            "consent token issued"
        );
        Ok(token)
    }

    /// Verify `token` against this authority's key.
    ///
    /// Recomputes the tag over the token's canonical message and compares its
    /// lowercase hex encoding with the stored signature, byte for byte, in
    /// constant time.  Any other spelling of the same bytes (uppercase hex,
    /// surrounding whitespace) is a different signature and is rejected.
    pub fn verify(&self, token: &ConsentToken) -> bool {
        if token.signature.len() != SIGNATURE_LEN * 2 {
            return false;
        }

        let expected = match token.canonical_message().and_then(|m| self.sign(&m)) {
            Ok(tag) => hex::encode(tag),
            Err(e) => {
                warn!(operation = %token.operation, error = %e, "could not recompute token signature");
                return false;
            }
        };

        expected.as_bytes().ct_eq(token.signature.as_bytes()).into()
    }

    /// Verify a token given in its persisted JSON form.
    ///
    /// Malformed input (missing fields, wrong types) verifies as `false`.
    pub fn verify_value(&self, value: &serde_json::Value) -> bool {
        match serde_json::from_value::<ConsentToken>(value.clone()) {
            Ok(token) => self.verify(&token),
            Err(_) => false,
        }
    }

    fn sign(&self, message: &[u8]) -> SealResult<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|e| SealError::ConfigError {
            reason: format!("consent key rejected by HMAC: {}", e),
        })?;
        mac.update(message);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl ConsentIssuer for ConsentTokenAuthority {
    fn issue(
        &self,
        operation: &str,
        ethics_verified: bool,
        human_approval: Option<HumanApproval>,
        subject: &str,
    ) -> SealResult<ConsentToken> {
        ConsentTokenAuthority::issue(self, operation, ethics_verified, human_approval, subject)
    }
}

impl ConsentVerifier for ConsentTokenAuthority {
    fn verify(&self, token: &ConsentToken) -> bool {
        ConsentTokenAuthority::verify(self, token)
    }
}

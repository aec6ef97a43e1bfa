//! Consent token types.
//!
//! A `ConsentToken` attests that one operation was ethically checked and/or
//! approved by a human.  Tokens are issued and verified by an authority in
//! `sealtrail-consent`; this module only defines their shape and the
//! canonical message their signature covers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{canonical::canonical_json, error::SealResult};

/// Subject recorded when the caller does not name an acting principal.
pub const DEFAULT_SUBJECT: &str = "system_placeholder";

/// Operation-specific data stored alongside an audited operation.
///
/// Always a JSON object; the runtime never inspects its contents.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// The human-oversight status attached to a consent token.
///
/// Persisted untagged, so the on-disk form is a bare JSON boolean or string.
/// Absence of any human decision is modelled as `Option::None` on the token
/// and persisted as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HumanApproval {
    /// A yes/no decision.
    Decision(bool),
    /// A free-text rationale, e.g. `"approved_by_admin"`.
    Rationale(String),
}

impl From<bool> for HumanApproval {
    fn from(decision: bool) -> Self {
        HumanApproval::Decision(decision)
    }
}

impl From<&str> for HumanApproval {
    fn from(rationale: &str) -> Self {
        HumanApproval::Rationale(rationale.to_string())
    }
}

impl std::fmt::Display for HumanApproval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HumanApproval::Decision(d) => write!(f, "{}", d),
            HumanApproval::Rationale(r) => write!(f, "{}", r),
        }
    }
}

/// A signed attestation of authorization for one operation.
///
/// `signature` is the lowercase hex HMAC-SHA256 tag over
/// [`ConsentToken::canonical_message`].  Changing any other field without
/// re-signing makes the token fail verification.  Fields are public because
/// tokens are plain data: a hand-built or edited token is exactly what
/// verification is meant to reject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentToken {
    /// Identifier of the operation this token authorizes.
    pub operation: String,

    /// Whether the ethics check passed.
    pub ethics_verified: bool,

    /// Human approval status, if any human was involved.
    pub human_approval: Option<HumanApproval>,

    /// Wall-clock issuance time (UTC).
    pub issued_at: DateTime<Utc>,

    /// Identifier of the acting principal.
    pub subject: String,

    /// Hex-encoded authentication tag.
    pub signature: String,
}

/// Borrowed view of the fields a signature covers.
#[derive(Serialize)]
struct SigningFields<'a> {
    operation: &'a str,
    ethics_verified: bool,
    human_approval: &'a Option<HumanApproval>,
    issued_at: &'a DateTime<Utc>,
    subject: &'a str,
}

impl ConsentToken {
    /// The exact bytes the signature is computed over.
    ///
    /// Canonical JSON of every field except `signature`.  This layout is the
    /// signing contract for every token ever issued; changing it invalidates
    /// all historical signatures.
    pub fn canonical_message(&self) -> SealResult<Vec<u8>> {
        canonical_json(&SigningFields {
            operation: &self.operation,
            ethics_verified: self.ethics_verified,
            human_approval: &self.human_approval,
            issued_at: &self.issued_at,
            subject: &self.subject,
        })
    }

    /// The first `len` characters of the signature followed by `...`, for
    /// display.  Short signatures are returned unchanged.
    pub fn truncated_signature(&self, len: usize) -> String {
        match self.signature.get(..len) {
            Some(prefix) if self.signature.len() > len => format!("{}...", prefix),
            _ => self.signature.clone(),
        }
    }
}

//! # sealtrail-consent
//!
//! HMAC-SHA256 consent token issuance and verification.
//!
//! ## Overview
//!
//! A [`ConsentTokenAuthority`] signs the canonical message of each
//! [`ConsentToken`](sealtrail_contracts::ConsentToken) with a secret key and
//! later checks that signature in constant time.  Any change to a signed
//! field, not just to the signature, makes verification fail.
//!
//! Keys come from explicit configuration, a key file, or the
//! `SEALTRAIL_TRUST_ROOT_KEY` environment variable.  When none is present an
//! ephemeral key is generated, which is only suitable for development.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sealtrail_consent::{AuthorityConfig, ConsentTokenAuthority};
//!
//! let authority = ConsentTokenAuthority::from_config(&AuthorityConfig::default())?;
//! let token = authority.issue("data_write", true, Some(true.into()), "alice")?;
//! assert!(authority.verify(&token));
//! ```

pub mod authority;
pub mod key;

pub use authority::{ConsentTokenAuthority, SIGNATURE_LEN};
pub use key::{
    generate_trust_root_key, AuthorityConfig, KeySource, ResolvedKey, DEFAULT_KEY_ENV,
    TRUST_ROOT_KEY_LEN,
};

// ── Tests ─────────────────────────────────────────────────────────────────────

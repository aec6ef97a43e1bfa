//! # sealtrail-core
//!
//! Trait seams for the sealtrail audit subsystem.
//!
//! The audit trail never depends on a concrete authority: it asks a
//! [`ConsentIssuer`](traits::ConsentIssuer) for its genesis token, and the
//! verifier asks a [`ConsentVerifier`](traits::ConsentVerifier) to check the
//! tokens embedded in each entry.  Authorities are constructed by the host
//! and passed in explicitly; there is no process-wide instance.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sealtrail_core::traits::{ConsentIssuer, ConsentVerifier};
//! ```

pub mod traits;

pub use traits::{ConsentIssuer, ConsentVerifier};

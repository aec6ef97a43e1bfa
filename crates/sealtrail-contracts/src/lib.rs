//! # sealtrail-contracts
//!
//! Shared types, canonical encoding, and errors for the sealtrail audit
//! subsystem.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate: only data definitions, the canonical JSON encoder both
//! signatures and chain hashes are computed over, and error types.

pub mod canonical;
pub mod error;
pub mod token;

pub use canonical::canonical_json;
pub use error::{SealError, SealResult};
pub use token::{ConsentToken, HumanApproval, Payload, DEFAULT_SUBJECT};

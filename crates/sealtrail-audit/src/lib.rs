//! # sealtrail-audit
//!
//! Append-only, SHA-256 hash-chained audit trail of consented operations.
//!
//! ## Overview
//!
//! Every operation recorded through [`AuditTrail::append`] becomes a
//! [`ChainedEntry`] that embeds its consent token and links to the previous
//! entry via its SHA-256 hash.  Changing any stored byte of any entry breaks
//! the chain and is detected by `sealtrail-verify`.
//!
//! Two backends share one chaining algorithm:
//!
//! - [`FileStore`]: durable JSONL file, writers serialized by an advisory
//!   lock on `<path>.lock`, every record fsynced before it is acknowledged
//! - [`MemoryStore`]: ephemeral, for tests and short-lived sessions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sealtrail_audit::AuditTrail;
//! use sealtrail_consent::ConsentTokenAuthority;
//!
//! let authority = ConsentTokenAuthority::from_env()?;
//! let trail = AuditTrail::open_or_initialize("audit.jsonl", &authority)?;
//!
//! let token = authority.issue("data_write", true, Some(true.into()), "alice")?;
//! trail.append("data_write", payload, token)?;
//!
//! for entry in trail.stream()? {
//!     println!("{}", entry?.operation());
//! }
//! ```

pub mod chain;
pub mod entry;
pub mod file;
mod lock;
pub mod memory;
pub mod store;
pub mod trail;

pub use chain::hash_entry;
pub use entry::{ChainedEntry, TrailExport, GENESIS_OPERATION, GENESIS_SUBJECT};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::{Commit, EntryStream, StoreTail, TrailStore};
pub use trail::AuditTrail;

// ── Tests ─────────────────────────────────────────────────────────────────────

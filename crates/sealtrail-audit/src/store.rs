//! The storage seam behind `AuditTrail`.
//!
//! A `TrailStore` persists fully formed `ChainedEntry` records and knows
//! nothing about hashing or tokens.  The chaining algorithm lives once, in
//! `AuditTrail`, and runs unchanged over every backend.

use std::sync::Arc;

use sealtrail_contracts::error::{SealError, SealResult};

use crate::entry::ChainedEntry;

/// Bookkeeping derived from a store's last committed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreTail {
    /// Number of committed entries (last `sequence_number + 1`).
    pub entry_count: u64,

    /// `entry_hash` of the last entry, or `ChainedEntry::GENESIS_HASH` for an
    /// empty store.
    pub last_hash: String,
}

impl StoreTail {
    /// The tail of a store holding no entries.
    pub fn empty() -> Self {
        Self {
            entry_count: 0,
            last_hash: ChainedEntry::GENESIS_HASH.to_string(),
        }
    }

    /// The tail of a store whose last record is `entry`, found at byte
    /// `offset`.
    ///
    /// A record numbered `u64::MAX` leaves no room for a successor and is
    /// reported as `SealError::CorruptedStore`.
    pub fn after(entry: &ChainedEntry, offset: u64) -> SealResult<Self> {
        let entry_count =
            entry
                .sequence_number()
                .checked_add(1)
                .ok_or_else(|| SealError::CorruptedStore {
                    offset,
                    reason: format!(
                        "sequence_number {} leaves no room for another entry",
                        entry.sequence_number()
                    ),
                })?;
        Ok(Self {
            entry_count,
            last_hash: entry.entry_hash().to_string(),
        })
    }
}

/// The outcome of one `TrailStore::commit` call.
#[derive(Debug, Clone)]
pub struct Commit {
    /// The store's tail after the commit.
    pub tail: StoreTail,

    /// The entry written, if the builder produced one.
    pub appended: Option<ChainedEntry>,
}

/// Lazy, ordered sequence of entries read from a store.
pub type EntryStream<'a> = Box<dyn Iterator<Item = SealResult<ChainedEntry>> + Send + 'a>;

/// Callback run inside `TrailStore::commit` with the freshest tail.
///
/// Returning `Ok(None)` commits nothing; returning an error aborts the
/// commit without writing.
pub type EntryBuilder<'a> = dyn FnMut(&StoreTail) -> SealResult<Option<ChainedEntry>> + 'a;

/// Append-only storage for chained entries.
pub trait TrailStore: Send + Sync {
    /// Run `build` inside the store's exclusive write section.
    ///
    /// Implementations must:
    /// 1. acquire exclusive write access scoped to the physical store,
    /// 2. read the true current tail from the store itself (never a cache),
    /// 3. call `build` exactly once with that tail,
    /// 4. durably persist any returned entry before releasing access.
    ///
    /// Access must be released on every exit path, including errors.
    fn commit(&self, build: &mut EntryBuilder<'_>) -> SealResult<Commit>;

    /// Read the true current tail without writing anything.
    fn tail(&self) -> SealResult<StoreTail> {
        self.commit(&mut |_| Ok(None)).map(|commit| commit.tail)
    }

    /// Stream every committed entry from the start, without taking the
    /// write lock.  Each call re-reads from the beginning.
    fn entries(&self) -> SealResult<EntryStream<'_>>;

    /// Short human-readable location, used in log fields.
    fn describe(&self) -> String;
}

/// A shared store, e.g. one `MemoryStore` observed by several trails.
impl<S: TrailStore + ?Sized> TrailStore for Arc<S> {
    fn commit(&self, build: &mut EntryBuilder<'_>) -> SealResult<Commit> {
        (**self).commit(build)
    }

    fn tail(&self) -> SealResult<StoreTail> {
        (**self).tail()
    }

    fn entries(&self) -> SealResult<EntryStream<'_>> {
        (**self).entries()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

//! In-memory implementation of `TrailStore`.
//!
//! `MemoryStore` keeps all entries in a `Vec` protected by a `Mutex`, making
//! it safe to share across threads.  It runs the exact chaining algorithm
//! the file store does; only durability differs.  Everything is lost when
//! the store is dropped.

use std::sync::Mutex;

use sealtrail_contracts::error::{SealError, SealResult};

use crate::{
    entry::ChainedEntry,
    store::{Commit, EntryBuilder, EntryStream, StoreTail, TrailStore},
};

/// An ephemeral, process-local entry store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub(crate) entries: Mutex<Vec<ChainedEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> SealError {
    SealError::LockError {
        reason: format!("memory store lock poisoned: {}", e),
    }
}

impl TrailStore for MemoryStore {
    fn commit(&self, build: &mut EntryBuilder<'_>) -> SealResult<Commit> {
        let mut entries = self.entries.lock().map_err(poisoned)?;

        // No byte positions in memory; corruption is reported at offset 0.
        let tail = match entries.last() {
            Some(last) => StoreTail::after(last, 0)?,
            None => StoreTail::empty(),
        };
        let Some(entry) = build(&tail)? else {
            return Ok(Commit { tail, appended: None });
        };

        let next = StoreTail::after(&entry, 0)?;
        entries.push(entry.clone());
        Ok(Commit { tail: next, appended: Some(entry) })
    }

    /// Streams a snapshot taken at call time.
    fn entries(&self) -> SealResult<EntryStream<'_>> {
        let snapshot = self.entries.lock().map_err(poisoned)?.clone();
        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}

//! The append-only audit trail.
//!
//! `AuditTrail` owns the chaining algorithm: it numbers entries, links each
//! to its predecessor's hash, and delegates durable storage to a
//! `TrailStore`.  The same code runs over the file and in-memory backends.
//!
//! Consent tokens are NOT verified on append.  Writing stays fast and
//! auditing stays an explicit, independently repeatable step
//! (`sealtrail-verify`).  An entry recorded with a forged token is caught by
//! a later token audit, not refused here.

use std::{path::Path, sync::Mutex};

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use sealtrail_contracts::{
    error::{SealError, SealResult},
    token::{ConsentToken, Payload},
};
use sealtrail_core::traits::ConsentIssuer;

use crate::{
    entry::{ChainedEntry, TrailExport, GENESIS_OPERATION, GENESIS_SUBJECT},
    file::FileStore,
    memory::MemoryStore,
    store::{EntryStream, StoreTail, TrailStore},
};

/// An append-only, sequentially numbered, hash-linked audit trail.
///
/// # Thread safety
///
/// `append` may be called concurrently from many threads on one trail, from
/// many trails over the same file, or from many processes.  The store's
/// exclusive write section serializes them; no two entries ever share a
/// `sequence_number` or a `previous_hash`.
///
/// `entry_count()` and `last_hash()` are a cache of the store tail as last
/// seen by this instance.  Another process may have appended since; call
/// `refresh()` before relying on them.
pub struct AuditTrail {
    store: Box<dyn TrailStore>,
    cached: Mutex<StoreTail>,
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("store", &self.store.describe())
            .field("cached", &self.cached)
            .finish()
    }
}

fn genesis_payload() -> Payload {
    let mut payload = Payload::new();
    payload.insert("note".to_string(), json!("Audit log initialized"));
    payload
}

impl AuditTrail {
    /// Open the JSONL store at `path`, creating it with a genesis entry if it
    /// does not exist or is empty.
    ///
    /// An existing store is not re-validated: only its final record is read
    /// to recover `entry_count` and `last_hash`.  A final record that is torn
    /// or unparseable yields `SealError::CorruptedStore`.
    pub fn open_or_initialize(
        path: impl AsRef<Path>,
        issuer: &dyn ConsentIssuer,
    ) -> SealResult<Self> {
        Self::with_store(Box::new(FileStore::new(path)?), issuer)
    }

    /// Open the JSONL store at `path` for reading and auditing, without ever
    /// writing to it.
    ///
    /// Unlike `open_or_initialize`, a missing file is a
    /// `SealError::StorageError` and a file holding no entries is a
    /// `SealError::CorruptedStore`: an existing trail always starts with its
    /// genesis entry, so an empty one has been wiped.  Appending through the
    /// returned trail works as usual.
    pub fn open_existing(path: impl AsRef<Path>) -> SealResult<Self> {
        let store = FileStore::open_existing(path)?;
        let tail = store.tail()?;
        if tail.entry_count == 0 {
            return Err(SealError::CorruptedStore {
                offset: 0,
                reason: format!(
                    "store '{}' holds no entries; its genesis entry is missing",
                    store.path().display()
                ),
            });
        }

        debug!(
            store = %store.path().display(),
            entry_count = tail.entry_count,
            last_hash = %tail.last_hash,
            "audit trail opened read-only"
        );
        Ok(Self { store: Box::new(store), cached: Mutex::new(tail) })
    }

    /// Create an ephemeral trail holding only its genesis entry.
    pub fn in_memory(issuer: &dyn ConsentIssuer) -> SealResult<Self> {
        Self::with_store(Box::new(MemoryStore::new()), issuer)
    }

    /// Open a trail over any backend, writing the genesis entry if the
    /// backend holds no entries.
    ///
    /// The genesis check and write happen inside one commit, so two callers
    /// initializing the same store concurrently produce exactly one genesis.
    pub fn with_store(store: Box<dyn TrailStore>, issuer: &dyn ConsentIssuer) -> SealResult<Self> {
        let commit = store.commit(&mut |tail| {
            if tail.entry_count > 0 {
                return Ok(None);
            }
            let genesis_token = issuer.issue(GENESIS_OPERATION, true, None, GENESIS_SUBJECT)?;
            ChainedEntry::seal(
                0,
                Utc::now(),
                GENESIS_OPERATION,
                genesis_payload(),
                genesis_token,
                ChainedEntry::GENESIS_HASH.to_string(),
            )
            .map(Some)
        })?;

        if commit.appended.is_some() {
            info!(store = %store.describe(), "audit trail initialized with genesis entry");
        } else {
            info!(
                store = %store.describe(),
                entry_count = commit.tail.entry_count,
                last_hash = %commit.tail.last_hash,
                "audit trail loaded"
            );
        }

        Ok(Self { store, cached: Mutex::new(commit.tail) })
    }

    /// Append one authorized operation to the trail.
    ///
    /// Inside the store's write section this reads the true tail, assigns
    /// `sequence_number = entry_count` and `previous_hash = last_hash`,
    /// computes `entry_hash`, and persists the entry durably.  Only then is
    /// the entry returned; on any error nothing is committed.
    ///
    /// Returns `SealError::CorruptedStore` if the store has lost its genesis
    /// entry or ends in a damaged record.
    pub fn append(
        &self,
        operation: &str,
        payload: Payload,
        consent_token: ConsentToken,
    ) -> SealResult<ChainedEntry> {
        let commit = self.store.commit(&mut |tail| {
            if tail.entry_count == 0 {
                return Err(SealError::CorruptedStore {
                    offset: 0,
                    reason: "store holds no genesis entry".to_string(),
                });
            }
            ChainedEntry::seal(
                tail.entry_count,
                Utc::now(),
                operation,
                payload.clone(),
                consent_token.clone(),
                tail.last_hash.clone(),
            )
            .map(Some)
        })?;

        let entry = commit.appended.ok_or_else(|| SealError::StorageError {
            reason: format!("store '{}' accepted no entry", self.store.describe()),
        })?;
        self.advance_cache(commit.tail)?;

        debug!(
            store = %self.store.describe(),
            sequence_number = entry.sequence_number(),
            operation = %entry.operation(),
            entry_hash = %entry.entry_hash(),
            "entry appended"
        );
        Ok(entry)
    }

    /// Re-read the store tail so `entry_count()` and `last_hash()` reflect
    /// appends made by other instances or processes.
    pub fn refresh(&self) -> SealResult<()> {
        let tail = self.store.tail()?;
        self.advance_cache(tail)
    }

    /// Number of entries, including genesis, as last seen by this instance.
    pub fn entry_count(&self) -> u64 {
        self.cached_tail().entry_count
    }

    /// `entry_hash` of the last entry, as last seen by this instance.
    pub fn last_hash(&self) -> String {
        self.cached_tail().last_hash
    }

    /// Every entry in sequence order.
    ///
    /// Does not take the writer lock; a record still being appended by
    /// another writer is not returned.
    pub fn read_all(&self) -> SealResult<Vec<ChainedEntry>> {
        self.stream()?.collect()
    }

    /// Entries in sequence order, produced lazily.  Each call re-reads the
    /// store from the start.
    pub fn stream(&self) -> SealResult<EntryStream<'_>> {
        self.store.entries()
    }

    /// Entries whose `operation` equals `name`, in sequence order.
    pub fn filter_by_operation(&self, name: &str) -> SealResult<Vec<ChainedEntry>> {
        let mut matching = Vec::new();
        for entry in self.stream()? {
            let entry = entry?;
            if entry.operation() == name {
                matching.push(entry);
            }
        }
        Ok(matching)
    }

    /// Take a sealed snapshot of the whole trail.
    pub fn export(&self) -> SealResult<TrailExport> {
        let entries = self.read_all()?;
        let terminal_hash = entries
            .last()
            .map(|e| e.entry_hash().to_string())
            .unwrap_or_default();

        Ok(TrailExport {
            entries,
            exported_at: Utc::now(),
            terminal_hash,
        })
    }

    /// Human-readable store location.
    pub fn describe(&self) -> String {
        self.store.describe()
    }

    fn cached_tail(&self) -> StoreTail {
        match self.cached.lock() {
            Ok(tail) => tail.clone(),
            // The cache is only ever replaced wholesale, so a poisoned value
            // is still internally consistent.
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the cache unless it already reflects a later commit from a
    /// concurrent append on this instance.
    fn advance_cache(&self, tail: StoreTail) -> SealResult<()> {
        let mut cached = self.cached.lock().map_err(|e| SealError::LockError {
            reason: format!("audit trail cache lock poisoned: {}", e),
        })?;
        if tail.entry_count >= cached.entry_count {
            *cached = tail;
        }
        Ok(())
    }
}

//! File-backed trail behaviour: persistence across reopen, damaged stores,
//! and concurrent writers sharing one JSONL file.

use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};

use serde_json::json;
use tempfile::TempDir;

use sealtrail_audit::{AuditTrail, ChainedEntry, FileStore, TrailStore};
use sealtrail_consent::ConsentTokenAuthority;
use sealtrail_contracts::{error::SealError, token::Payload};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn authority() -> ConsentTokenAuthority {
    ConsentTokenAuthority::new(b"file-store-test-key".to_vec()).unwrap()
}

fn store_path(dir: &TempDir) -> PathBuf {
    dir.path().join("audit.jsonl")
}

fn payload(value: serde_json::Value) -> Payload {
    value.as_object().cloned().expect("payload must be an object")
}

fn record(trail: &AuditTrail, authority: &ConsentTokenAuthority, operation: &str) -> ChainedEntry {
    let token = authority
        .issue(operation, true, Some(true.into()), "alice")
        .unwrap();
    trail
        .append(operation, payload(json!({ "key": "value" })), token)
        .unwrap()
}

fn lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn append_raw(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}

fn assert_intact(entries: &[ChainedEntry]) {
    assert_eq!(entries[0].previous_hash(), ChainedEntry::GENESIS_HASH);
    for (idx, entry) in entries.iter().enumerate() {
        assert_eq!(entry.sequence_number(), idx as u64);
        assert_eq!(entry.recompute_hash().unwrap(), entry.entry_hash());
        if idx > 0 {
            assert_eq!(entry.previous_hash(), entries[idx - 1].entry_hash());
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/// A fresh store holds one genesis record, newline-terminated.
#[test]
fn fresh_store_holds_genesis() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let trail = AuditTrail::open_or_initialize(&path, &authority()).unwrap();

    assert_eq!(trail.entry_count(), 1);
    let entries = trail.read_all().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation(), "genesis");
    assert_eq!(entries[0].sequence_number(), 0);

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.ends_with('\n'));
    assert_eq!(raw.lines().count(), 1);
}

/// The persisted record exposes exactly the entry and token field names.
#[test]
fn record_schema_is_stable() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    AuditTrail::open_or_initialize(&path, &authority()).unwrap();

    let value: serde_json::Value = serde_json::from_str(&lines(&path)[0]).unwrap();
    let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec![
            "consent_token",
            "entry_hash",
            "operation",
            "payload",
            "previous_hash",
            "sequence_number",
            "timestamp",
        ]
    );

    let mut token_keys: Vec<&str> = value["consent_token"]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    token_keys.sort_unstable();
    assert_eq!(
        token_keys,
        vec!["ethics_verified", "human_approval", "issued_at", "operation", "signature", "subject"]
    );
}

/// Appending one approved operation grows the store to two entries.
#[test]
fn append_persists_entry() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let authority = authority();
    let trail = AuditTrail::open_or_initialize(&path, &authority).unwrap();

    let entry = record(&trail, &authority, "data_write");
    assert_eq!(trail.entry_count(), 2);
    assert_eq!(entry.payload().get("key"), Some(&json!("value")));
    assert_eq!(lines(&path).len(), 2);
    assert_intact(&trail.read_all().unwrap());
}

/// Reopening continues numbering and linkage where the last process stopped.
#[test]
fn reopen_continues_chain() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let authority = authority();

    let last_before = {
        let trail = AuditTrail::open_or_initialize(&path, &authority).unwrap();
        record(&trail, &authority, "first");
        record(&trail, &authority, "second")
    };

    let reopened = AuditTrail::open_or_initialize(&path, &authority).unwrap();
    assert_eq!(reopened.entry_count(), 3);
    assert_eq!(reopened.last_hash(), last_before.entry_hash());

    let next = record(&reopened, &authority, "third");
    assert_eq!(next.sequence_number(), 3);
    assert_eq!(next.previous_hash(), last_before.entry_hash());

    let entries = reopened.read_all().unwrap();
    assert_eq!(entries.len(), 4);
    assert_intact(&entries);
}

/// Reopening does not write a second genesis entry.
#[test]
fn reopen_does_not_reinitialize() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let authority = authority();

    AuditTrail::open_or_initialize(&path, &authority).unwrap();
    AuditTrail::open_or_initialize(&path, &authority).unwrap();

    let trail = AuditTrail::open_or_initialize(&path, &authority).unwrap();
    assert_eq!(trail.filter_by_operation("genesis").unwrap().len(), 1);
    assert_eq!(lines(&path).len(), 1);
}

/// An existing zero-byte file is initialised like a missing one.
#[test]
fn zero_byte_store_is_initialized() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    std::fs::write(&path, b"").unwrap();

    let trail = AuditTrail::open_or_initialize(&path, &authority()).unwrap();
    assert_eq!(trail.entry_count(), 1);
    assert!(trail.read_all().unwrap()[0].is_genesis());
}

/// Parent directories are created on demand.
#[test]
fn nested_path_is_created() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("var").join("log").join("audit.jsonl");

    let trail = AuditTrail::open_or_initialize(&path, &authority()).unwrap();
    assert_eq!(trail.entry_count(), 1);
    assert!(path.exists());
}

/// Filtering keeps only matching operations in their original order.
#[test]
fn filter_by_operation_on_file() {
    let dir = TempDir::new().unwrap();
    let authority = authority();
    let trail = AuditTrail::open_or_initialize(store_path(&dir), &authority).unwrap();

    for op in ["data_write", "other", "data_write", "other", "data_write"] {
        record(&trail, &authority, op);
    }

    let writes = trail.filter_by_operation("data_write").unwrap();
    assert_eq!(writes.len(), 3);
    assert!(writes.iter().all(|e| e.operation() == "data_write"));
    let seqs: Vec<u64> = writes.iter().map(|e| e.sequence_number()).collect();
    assert_eq!(seqs, vec![1, 3, 5]);
}

/// A record that is not a well-formed entry is reported, not skipped.
#[test]
fn garbage_record_is_corruption() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let authority = authority();
    let trail = AuditTrail::open_or_initialize(&path, &authority).unwrap();
    record(&trail, &authority, "data_write");

    let mut content = lines(&path);
    let genesis_len = content[0].len() as u64 + 1;
    content[1] = "{\"this\": \"is not an entry\"}".to_string();
    std::fs::write(&path, content.join("\n") + "\n").unwrap();

    let err = trail.read_all().unwrap_err();
    match err {
        SealError::CorruptedStore { offset, .. } => assert_eq!(offset, genesis_len),
        other => panic!("expected CorruptedStore, got {:?}", other),
    }

    let err = AuditTrail::open_or_initialize(&path, &authority).unwrap_err();
    assert!(err.is_corruption(), "got {:?}", err);
}

/// A blank line in the middle of the store is corruption.
#[test]
fn blank_line_is_corruption() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let authority = authority();
    let trail = AuditTrail::open_or_initialize(&path, &authority).unwrap();

    // A blank line followed by an otherwise valid record.
    let genesis = lines(&path)[0].clone();
    append_raw(&path, format!("\n{}\n", genesis).as_bytes());

    let err = trail.read_all().unwrap_err();
    assert!(err.is_corruption(), "got {:?}", err);
}

/// A torn final record is ignored by readers but refused by writers.
#[test]
fn torn_tail_is_skipped_by_readers_and_refused_by_writers() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let authority = authority();
    let trail = AuditTrail::open_or_initialize(&path, &authority).unwrap();
    record(&trail, &authority, "data_write");

    let size_before = std::fs::metadata(&path).unwrap().len();
    append_raw(&path, b"{\"sequence_number\": 2, \"timest");

    let entries = trail.read_all().unwrap();
    assert_eq!(entries.len(), 2, "readers return only complete records");
    assert_intact(&entries);

    let token = authority.issue("data_write", true, None, "alice").unwrap();
    match trail.append("data_write", Payload::new(), token).unwrap_err() {
        SealError::CorruptedStore { offset, .. } => assert_eq!(offset, size_before),
        other => panic!("expected CorruptedStore, got {:?}", other),
    }

    let err = AuditTrail::open_or_initialize(&path, &authority).unwrap_err();
    assert!(err.is_corruption(), "got {:?}", err);
}

/// Streaming a missing file yields nothing rather than an error.
#[test]
fn missing_file_streams_empty() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(store_path(&dir)).unwrap();
    assert_eq!(store.entries().unwrap().count(), 0);
    assert!(!store.path().exists());
}

/// Eight threads appending through one shared trail.
#[test]
fn concurrent_appends_shared_trail() {
    let dir = TempDir::new().unwrap();
    let authority = Arc::new(authority());
    let trail = Arc::new(AuditTrail::open_or_initialize(store_path(&dir), authority.as_ref()).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let trail = Arc::clone(&trail);
            let authority = Arc::clone(&authority);
            thread::spawn(move || {
                let token = authority.issue("worker", true, None, "alice").unwrap();
                trail.append("worker", payload(json!({ "worker": i })), token).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(trail.entry_count(), 9);
    let entries = trail.read_all().unwrap();
    assert_eq!(entries.len(), 9);
    assert_intact(&entries);
}

/// Eight threads, each with its own trail over the same file, as separate
/// processes would be.
#[test]
fn concurrent_appends_separate_trails() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let authority = Arc::new(authority());
    AuditTrail::open_or_initialize(&path, authority.as_ref()).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let path = path.clone();
            let authority = Arc::clone(&authority);
            thread::spawn(move || {
                let trail = AuditTrail::open_or_initialize(&path, authority.as_ref()).unwrap();
                for round in 0..4 {
                    let token = authority.issue("worker", true, None, "alice").unwrap();
                    trail
                        .append("worker", payload(json!({ "worker": i, "round": round })), token)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let trail = AuditTrail::open_or_initialize(&path, authority.as_ref()).unwrap();
    assert_eq!(trail.entry_count(), 33);
    let entries = trail.read_all().unwrap();
    assert_eq!(entries.len(), 33);
    assert_intact(&entries);
}

/// Concurrent first opens of a new file produce a single genesis.
#[test]
fn concurrent_initialization_single_genesis() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let authority = Arc::new(authority());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let path = path.clone();
            let authority = Arc::clone(&authority);
            thread::spawn(move || {
                AuditTrail::open_or_initialize(&path, authority.as_ref()).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(lines(&path).len(), 1);
}

/// A stale instance appends after the true tail, not its cached one.
#[test]
fn stale_instance_does_not_fork() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let authority = authority();

    let stale = AuditTrail::open_or_initialize(&path, &authority).unwrap();
    let other = AuditTrail::open_or_initialize(&path, &authority).unwrap();
    let latest = record(&other, &authority, "from_other");

    assert_eq!(stale.entry_count(), 1, "cache is stale until refreshed");
    let next = record(&stale, &authority, "from_stale");
    assert_eq!(next.sequence_number(), 2);
    assert_eq!(next.previous_hash(), latest.entry_hash());
    assert_eq!(stale.entry_count(), 3);

    assert_intact(&stale.read_all().unwrap());
}

/// Floats in a payload re-parse to the exact value that was hashed.
#[test]
fn float_payload_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let authority = authority();
    let reading = 1.0715660391465826e-75_f64;

    {
        let trail = AuditTrail::open_or_initialize(&path, &authority).unwrap();
        let token = authority.issue("sensor_read", true, None, "alice").unwrap();
        trail
            .append("sensor_read", payload(json!({ "reading": reading })), token)
            .unwrap();
    }

    let reopened = AuditTrail::open_or_initialize(&path, &authority).unwrap();
    let entries = reopened.read_all().unwrap();
    assert_intact(&entries);
    assert_eq!(entries[1].payload()["reading"].as_f64(), Some(reading));
}

/// A last record numbered `u64::MAX` is reported as corruption at its offset.
#[test]
fn max_sequence_number_is_corruption() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    AuditTrail::open_or_initialize(&path, &authority()).unwrap();

    let mut genesis: serde_json::Value = serde_json::from_str(&lines(&path)[0]).unwrap();
    genesis["sequence_number"] = json!(u64::MAX);
    std::fs::write(&path, format!("{}\n", genesis)).unwrap();

    match AuditTrail::open_or_initialize(&path, &authority()).unwrap_err() {
        SealError::CorruptedStore { offset, .. } => assert_eq!(offset, 0),
        other => panic!("expected CorruptedStore, got {:?}", other),
    }
    assert!(AuditTrail::open_existing(&path).unwrap_err().is_corruption());
}

/// Opening an existing store read-only recovers its tail and writes nothing.
#[test]
fn open_existing_loads_without_writing() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let authority = authority();
    let last = {
        let trail = AuditTrail::open_or_initialize(&path, &authority).unwrap();
        record(&trail, &authority, "data_write")
    };
    let before = std::fs::read(&path).unwrap();

    let trail = AuditTrail::open_existing(&path).unwrap();
    assert_eq!(trail.entry_count(), 2);
    assert_eq!(trail.last_hash(), last.entry_hash());
    assert_intact(&trail.read_all().unwrap());
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

/// A missing store is an error and is not created.
#[test]
fn open_existing_missing_store_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent").join("audit.jsonl");

    let err = AuditTrail::open_existing(&path).unwrap_err();
    assert!(matches!(err, SealError::StorageError { .. }), "got {:?}", err);
    assert!(!path.exists());
    assert!(!path.parent().unwrap().exists());
}

/// A wiped store is corruption for read-only opens and stays wiped.
#[test]
fn open_existing_wiped_store_is_corruption() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let authority = authority();
    {
        let trail = AuditTrail::open_or_initialize(&path, &authority).unwrap();
        record(&trail, &authority, "data_write");
    }
    std::fs::write(&path, b"").unwrap();

    match AuditTrail::open_existing(&path).unwrap_err() {
        SealError::CorruptedStore { offset, reason } => {
            assert_eq!(offset, 0);
            assert!(reason.contains("genesis entry is missing"), "got {}", reason);
        }
        other => panic!("expected CorruptedStore, got {:?}", other),
    }
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0, "no genesis rewritten");
}

/// A torn tail is refused by read-only opens, which read it under the lock.
#[test]
fn open_existing_torn_tail_is_corruption() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    AuditTrail::open_or_initialize(&path, &authority()).unwrap();
    append_raw(&path, b"{\"sequence_number\": 1");

    assert!(AuditTrail::open_existing(&path).unwrap_err().is_corruption());
}

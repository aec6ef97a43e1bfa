//! File-backed, durable `TrailStore`.
//!
//! One JSON record per line (JSONL).  Appends happen under an exclusive
//! advisory lock on `<path>.lock`, and every written record is fsynced
//! before the lock is released, so an acknowledged entry survives a crash.
//!
//! Torn records:
//! - Lock-free readers stop silently at a final record with no trailing
//!   newline; it may be an append still in flight.
//! - Under the lock no append can be in flight, so the same torn record is
//!   reported as `SealError::CorruptedStore`.

use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use sealtrail_contracts::error::{SealError, SealResult};

use crate::{
    entry::ChainedEntry,
    lock::{lock_path_for, FileLockGuard},
    store::{Commit, EntryBuilder, EntryStream, StoreTail, TrailStore},
};

/// Bytes read per step when scanning backwards for the last record.
const TAIL_CHUNK: u64 = 4096;

/// A JSONL file holding one `ChainedEntry` per line.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileStore {
    /// Point a store at `path`, creating parent directories if needed.
    ///
    /// The file itself is created by the first `commit`.
    pub fn new(path: impl AsRef<Path>) -> SealResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SealError::StorageError {
                reason: format!("failed to create store directory '{}': {}", parent.display(), e),
            })?;
        }
        let lock_path = lock_path_for(&path);
        Ok(Self { path, lock_path })
    }

    /// Point a store at an existing file without creating anything.
    ///
    /// Returns `SealError::StorageError` if `path` is not an existing file.
    pub fn open_existing(path: impl AsRef<Path>) -> SealResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(SealError::StorageError {
                reason: format!("no audit trail at '{}'", path.display()),
            });
        }
        let lock_path = lock_path_for(&path);
        Ok(Self { path, lock_path })
    }

    /// Location of the JSONL file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_error(&self, action: &str, e: std::io::Error) -> SealError {
        SealError::StorageError {
            reason: format!("failed to {} '{}': {}", action, self.path.display(), e),
        }
    }

    /// Read the tail of `file` from its last record.
    ///
    /// Scans backwards from the end in `TAIL_CHUNK` steps until the start of
    /// the final line is found, so the cost is independent of store size.
    fn read_tail(&self, file: &mut File) -> SealResult<StoreTail> {
        let len = file
            .metadata()
            .map_err(|e| self.storage_error("stat", e))?
            .len();
        if len == 0 {
            return Ok(StoreTail::empty());
        }

        let mut buf: Vec<u8> = Vec::new();
        let mut pos = len;
        let record_start = loop {
            let start = pos.saturating_sub(TAIL_CHUNK);
            let mut chunk = vec![0u8; (pos - start) as usize];
            file.seek(SeekFrom::Start(start))
                .and_then(|_| file.read_exact(&mut chunk))
                .map_err(|e| self.storage_error("read tail of", e))?;
            chunk.extend_from_slice(&buf);
            buf = chunk;
            pos = start;

            let body_end = if buf.ends_with(b"\n") { buf.len() - 1 } else { buf.len() };
            if let Some(i) = buf[..body_end].iter().rposition(|b| *b == b'\n') {
                break i + 1;
            }
            if pos == 0 {
                break 0;
            }
        };

        let offset = pos + record_start as u64;
        if !buf.ends_with(b"\n") {
            return Err(SealError::CorruptedStore {
                offset,
                reason: "trailing record is incomplete (no terminating newline)".to_string(),
            });
        }

        let record = std::str::from_utf8(&buf[record_start..buf.len() - 1]).map_err(|e| {
            SealError::CorruptedStore {
                offset,
                reason: format!("trailing record is not valid UTF-8: {}", e),
            }
        })?;
        let last = parse_record(record, offset)?;
        StoreTail::after(&last, offset)
    }

    /// Flush the directory entry of a newly created store file.
    #[cfg(unix)]
    fn sync_parent_dir(&self) -> SealResult<()> {
        let parent = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent,
            None => Path::new("."),
        };
        File::open(parent)
            .and_then(|dir| dir.sync_all())
            .map_err(|e| SealError::StorageError {
                reason: format!("failed to fsync directory '{}': {}", parent.display(), e),
            })
    }

    #[cfg(not(unix))]
    fn sync_parent_dir(&self) -> SealResult<()> {
        Ok(())
    }
}

/// Parse one newline-stripped record, rejecting blank lines.
fn parse_record(record: &str, offset: u64) -> SealResult<ChainedEntry> {
    if record.trim().is_empty() {
        return Err(SealError::CorruptedStore {
            offset,
            reason: "blank record".to_string(),
        });
    }
    ChainedEntry::from_record(record, offset)
}

impl TrailStore for FileStore {
    fn commit(&self, build: &mut EntryBuilder<'_>) -> SealResult<Commit> {
        let _guard = FileLockGuard::exclusive(&self.lock_path)?;

        let created = !self.path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.storage_error("open", e))?;
        if created {
            self.sync_parent_dir()?;
        }

        let tail = self.read_tail(&mut file)?;
        let Some(entry) = build(&tail)? else {
            return Ok(Commit { tail, appended: None });
        };

        let size_before = file
            .metadata()
            .map_err(|e| self.storage_error("stat", e))?
            .len();
        let next = StoreTail::after(&entry, size_before)?;

        let mut record = entry.to_record()?;
        record.push('\n');
        file.write_all(record.as_bytes())
            .map_err(|e| self.storage_error("append to", e))?;
        file.sync_all().map_err(|e| self.storage_error("fsync", e))?;

        debug!(
            store = %self.path.display(),
            sequence_number = entry.sequence_number(),
            bytes = record.len(),
            "entry persisted"
        );

        Ok(Commit { tail: next, appended: Some(entry) })
    }

    /// Reads the tail under the lock without creating or writing the file.
    fn tail(&self) -> SealResult<StoreTail> {
        let _guard = FileLockGuard::exclusive(&self.lock_path)?;
        let mut file = File::open(&self.path).map_err(|e| self.storage_error("open", e))?;
        self.read_tail(&mut file)
    }

    fn entries(&self) -> SealResult<EntryStream<'_>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Box::new(std::iter::empty()));
            }
            Err(e) => return Err(self.storage_error("open", e)),
        };

        Ok(Box::new(FileEntries {
            path: self.path.clone(),
            reader: BufReader::new(file),
            offset: 0,
            done: false,
        }))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Lazy reader over a store's complete records.
struct FileEntries {
    path: PathBuf,
    reader: BufReader<File>,
    offset: u64,
    done: bool,
}

impl Iterator for FileEntries {
    type Item = SealResult<ChainedEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut line = Vec::new();
        let read = match self.reader.read_until(b'\n', &mut line) {
            Ok(n) => n,
            Err(e) => {
                self.done = true;
                return Some(Err(SealError::StorageError {
                    reason: format!("failed to read '{}': {}", self.path.display(), e),
                }));
            }
        };

        if read == 0 {
            self.done = true;
            return None;
        }
        if !line.ends_with(b"\n") {
            debug!(
                store = %self.path.display(),
                offset = self.offset,
                "ignoring unterminated trailing record"
            );
            self.done = true;
            return None;
        }

        let offset = self.offset;
        self.offset += read as u64;

        let parsed = std::str::from_utf8(&line[..line.len() - 1])
            .map_err(|e| SealError::CorruptedStore {
                offset,
                reason: format!("record is not valid UTF-8: {}", e),
            })
            .and_then(|record| parse_record(record, offset));

        if parsed.is_err() {
            self.done = true;
        }
        Some(parsed)
    }
}
